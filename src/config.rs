use crate::signing::DEFAULT_EXPIRY_SECS;
use crate::storage::{StorageBackend, StorageConfig};
use anyhow::{Result, anyhow};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable holding the signing secret
pub const SECRET_ENV: &str = "SIGNED_STORAGE_SECRET";

/// Main configuration structure that can be loaded from CLI, config file, or environment
///
/// Example configuration file content
/// # Signed Storage Configuration
///
/// # Server configuration
/// listen_on_port = 32145
/// workspace = "./data"
///
/// # Signed URL configuration
/// secret = "change-me"          # or set SIGNED_STORAGE_SECRET
/// url_expiry_secs = 600
///
/// # Storage configuration
/// storage_backend = "s3"  # Options: "local", "memory" or "s3"
///
/// # S3 configuration (required when storage_backend = "s3")
/// s3_bucket = "my-bucket"
/// s3_endpoint = "http://localhost:9000"  # Optional: for MinIO or custom S3
/// s3_region = "us-east-1"                # Optional
/// s3_access_key_id = "minioadmin"
/// s3_secret_access_key = "minioadmin"
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[serde(default)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Port to listen on
    #[arg(short, long, default_value_t = 32145)]
    #[serde(default = "default_port")]
    pub listen_on_port: u16,

    /// Root directory of the local storage backend
    #[arg(short = 'w', long, default_value = ".")]
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Configuration file path (overrides all other arguments)
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Storage backend: local, memory or s3
    #[arg(short, long, default_value = "local")]
    #[serde(default = "default_storage_backend")]
    pub storage_backend: String,

    /// S3 bucket name (required when storage-backend is s3)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_bucket: Option<String>,

    /// S3 endpoint (for MinIO/custom S3)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_endpoint: Option<String>,

    /// S3 region
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_region: Option<String>,

    /// S3 access key ID
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_access_key_id: Option<String>,

    /// S3 secret access key
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_secret_access_key: Option<String>,

    /// Shared secret used to sign and verify URLs
    #[arg(long, env = SECRET_ENV, hide_env_values = true)]
    #[serde(skip_serializing)]
    pub secret: Option<Secret>,

    /// Lifetime of a signed URL in seconds
    #[arg(short = 'e', long, default_value_t = DEFAULT_EXPIRY_SECS)]
    #[serde(default = "default_url_expiry_secs")]
    pub url_expiry_secs: u64,
}

/// Signing secret; never printed
#[derive(Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for Secret {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_on_port: default_port(),
            workspace: default_workspace(),
            config: None,
            storage_backend: default_storage_backend(),
            s3_bucket: None,
            s3_endpoint: None,
            s3_region: None,
            s3_access_key_id: None,
            s3_secret_access_key: None,
            secret: None,
            url_expiry_secs: default_url_expiry_secs(),
        }
    }
}

impl Config {
    /// Load configuration from CLI args, optionally merging with a config file
    pub fn load() -> Result<Self> {
        // First parse CLI args
        let mut config = Config::parse();

        // If a config file is specified, load it and merge
        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge with file config, CLI args take precedence
    fn merge_with_file(mut self, file_config: Config) -> Self {
        // If CLI value is default, use file value
        if self.listen_on_port == default_port() {
            self.listen_on_port = file_config.listen_on_port;
        }
        if self.workspace == default_workspace() {
            self.workspace = file_config.workspace;
        }
        if self.storage_backend == default_storage_backend() {
            self.storage_backend = file_config.storage_backend;
        }
        if self.url_expiry_secs == default_url_expiry_secs() {
            self.url_expiry_secs = file_config.url_expiry_secs;
        }

        // For Option fields, CLI takes precedence if Some
        if self.s3_bucket.is_none() {
            self.s3_bucket = file_config.s3_bucket;
        }
        if self.s3_endpoint.is_none() {
            self.s3_endpoint = file_config.s3_endpoint;
        }
        if self.s3_region.is_none() {
            self.s3_region = file_config.s3_region;
        }
        if self.s3_access_key_id.is_none() {
            self.s3_access_key_id = file_config.s3_access_key_id;
        }
        if self.s3_secret_access_key.is_none() {
            self.s3_secret_access_key = file_config.s3_secret_access_key;
        }
        if self.secret.is_none() {
            self.secret = file_config.secret;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Validate storage configuration
        match self.storage_backend.as_str() {
            "local" | "memory" => {}
            "s3" => {
                if self
                    .s3_bucket
                    .as_ref()
                    .map(|s| s.is_empty())
                    .unwrap_or(true)
                {
                    return Err(anyhow!("S3 bucket name is required when backend is 's3'"));
                }
                if self
                    .s3_access_key_id
                    .as_ref()
                    .map(|s| s.is_empty())
                    .unwrap_or(true)
                {
                    return Err(anyhow!(
                        "S3 access key ID is required when backend is 's3'"
                    ));
                }
                if self
                    .s3_secret_access_key
                    .as_ref()
                    .map(|s| s.is_empty())
                    .unwrap_or(true)
                {
                    return Err(anyhow!(
                        "S3 secret access key is required when backend is 's3'"
                    ));
                }
            }
            backend => {
                return Err(anyhow!(
                    "Unsupported storage backend: {backend}. Use 'local', 'memory' or 's3'"
                ));
            }
        }

        if self.secret.as_ref().map(Secret::is_empty).unwrap_or(true) {
            return Err(anyhow!(
                "Signing secret is required: pass --secret or set {SECRET_ENV}"
            ));
        }

        if self.url_expiry_secs == 0 {
            return Err(anyhow!("url_expiry_secs must be greater than 0"));
        }

        Ok(())
    }

    /// Storage settings for the configured backend
    pub fn to_storage_config(&self) -> Result<StorageConfig> {
        let backend = match self.storage_backend.as_str() {
            "local" => StorageBackend::Local,
            "memory" => StorageBackend::Memory,
            "s3" => {
                let s3_config = self
                    .to_s3_config()
                    .ok_or_else(|| anyhow!("S3 configuration is required when using S3 backend"))?;
                StorageBackend::S3 {
                    bucket: s3_config.bucket,
                    endpoint: s3_config.endpoint,
                    region: s3_config.region,
                    access_key_id: s3_config.access_key_id,
                    secret_access_key: s3_config.secret_access_key,
                }
            }
            backend => {
                return Err(anyhow!(
                    "Unsupported storage backend: {backend}. Use 'local', 'memory' or 's3'"
                ));
            }
        };

        Ok(StorageConfig {
            backend,
            workspace: PathBuf::from(&self.workspace),
        })
    }

    /// Convert to S3 storage backend configuration
    pub fn to_s3_config(&self) -> Option<S3Config> {
        if self.storage_backend != "s3" {
            return None;
        }

        Some(S3Config {
            bucket: self.s3_bucket.clone()?,
            endpoint: self.s3_endpoint.clone(),
            region: self.s3_region.clone(),
            access_key_id: self.s3_access_key_id.clone()?,
            secret_access_key: self.s3_secret_access_key.clone()?,
        })
    }
}

// S3 configuration subset
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

// Default value functions
fn default_port() -> u16 {
    32145
}

fn default_workspace() -> String {
    ".".to_string()
}

fn default_storage_backend() -> String {
    "local".to_string()
}

fn default_url_expiry_secs() -> u64 {
    DEFAULT_EXPIRY_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_secret(secret: &str) -> Config {
        Config {
            secret: Some(Secret::new(secret)),
            ..Default::default()
        }
    }

    #[test]
    fn test_args_from_cli() {
        let config = Config::try_parse_from([
            "CLI",
            "--listen-on-port",
            "8080",
            "--workspace",
            "/tmp/test",
            "--storage-backend",
            "memory",
            "--secret",
            "test-secret",
            "--url-expiry-secs",
            "120",
        ])
        .unwrap();

        assert_eq!(config.listen_on_port, 8080);
        assert_eq!(config.workspace, "/tmp/test");
        assert_eq!(config.storage_backend, "memory");
        assert_eq!(config.secret, Some(Secret::new("test-secret")));
        assert_eq!(config.url_expiry_secs, 120);
        config.validate().unwrap();
    }

    #[test]
    fn test_cli_defaults() {
        let config = Config::try_parse_from(["CLI", "--secret", "s"]).unwrap();
        assert_eq!(config.listen_on_port, 32145);
        assert_eq!(config.storage_backend, "local");
        assert_eq!(config.url_expiry_secs, DEFAULT_EXPIRY_SECS);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_content = r#"
            listen_on_port = 8080
            workspace = "/tmp/test"
            storage_backend = "local"
            secret = "file-secret"
            url_expiry_secs = 60
        "#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.listen_on_port, 8080);
        assert_eq!(config.secret, Some(Secret::new("file-secret")));
        assert_eq!(config.url_expiry_secs, 60);

        // omitted keys fall back to defaults
        let config: Config = toml::from_str("secret = \"x\"").unwrap();
        assert_eq!(config.listen_on_port, 32145);
        assert_eq!(config.url_expiry_secs, DEFAULT_EXPIRY_SECS);
    }

    #[test]
    fn test_config_merge_with_file() {
        let file_config = Config {
            listen_on_port: 7000,
            url_expiry_secs: 30,
            ..with_secret("file-secret")
        };

        let cli_config = Config {
            listen_on_port: 9000,
            ..Default::default()
        };

        let merged = cli_config.merge_with_file(file_config);
        assert_eq!(merged.listen_on_port, 9000); // CLI value takes precedence
        assert_eq!(merged.url_expiry_secs, 30);
        assert_eq!(merged.secret, Some(Secret::new("file-secret"))); // File value used when CLI is None

        let merged = with_secret("cli-secret").merge_with_file(with_secret("file-secret"));
        assert_eq!(merged.secret, Some(Secret::new("cli-secret")));
    }

    #[test]
    fn test_validate_requires_secret() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains(SECRET_ENV));

        assert!(with_secret("").validate().is_err());
        assert!(with_secret("test-secret").validate().is_ok());
    }

    #[test]
    fn test_secret_env_binding() {
        use clap::CommandFactory;

        let command = Config::command();
        let secret = command
            .get_arguments()
            .find(|arg| arg.get_id() == "secret")
            .unwrap();
        assert_eq!(secret.get_env(), Some(std::ffi::OsStr::new(SECRET_ENV)));
        assert!(secret.is_hide_env_values_set());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            url_expiry_secs: 0,
            ..with_secret("s")
        };
        assert!(config.validate().is_err());

        let config = Config {
            storage_backend: "ftp".to_string(),
            ..with_secret("s")
        };
        assert!(config.validate().is_err());

        let config = Config {
            storage_backend: "s3".to_string(),
            ..with_secret("s")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_storage_config() {
        let config = Config {
            storage_backend: "s3".to_string(),
            s3_bucket: Some("bucket".to_string()),
            s3_access_key_id: Some("id".to_string()),
            s3_secret_access_key: Some("key".to_string()),
            ..with_secret("s")
        };
        config.validate().unwrap();
        assert!(matches!(
            config.to_storage_config().unwrap().backend,
            StorageBackend::S3 { ref bucket, .. } if bucket == "bucket"
        ));

        let config = with_secret("s");
        assert!(matches!(
            config.to_storage_config().unwrap().backend,
            StorageBackend::Local
        ));
    }

    #[test]
    fn test_secret_is_redacted() {
        let config = with_secret("hunter2");
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("Secret(***)"));

        let toml = toml::to_string(&config).unwrap();
        assert!(!toml.contains("hunter2"));
    }
}
