use crate::signing::error::{SigningError, VerifyError};
use crate::signing::key::{MAC_LEN, SigningKey};
use crate::signing::token::Token;
use hmac::Mac;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Default lifetime of an issued URL in seconds
pub const DEFAULT_EXPIRY_SECS: u64 = 600;

/// Query parameter carrying the token
pub const VERIFY_PARAM: &str = "verify";

/// Current Unix time in whole seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Message covered by the MAC: the path immediately followed by the decimal
/// timestamp.
pub fn canonical_message(path: &str, timestamp: u64) -> String {
    format!("{path}{timestamp}")
}

/// A relative URL granting temporary access to `path`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignedUrl {
    pub path: String,
    pub token: Token,
}

impl fmt::Display for SignedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = self.token.to_string();
        let encoded: String = url::form_urlencoded::byte_serialize(token.as_bytes()).collect();
        write!(f, "{}?{VERIFY_PARAM}={encoded}", self.path)
    }
}

/// Issues and verifies signed URLs under a single shared key
#[derive(Clone, Debug)]
pub struct UrlSigner {
    key: SigningKey,
    expiry_secs: u64,
}

impl UrlSigner {
    pub fn new(key: SigningKey, expiry_secs: u64) -> Self {
        Self { key, expiry_secs }
    }

    pub fn expiry_secs(&self) -> u64 {
        self.expiry_secs
    }

    /// Sign `path` at the current time
    pub fn issue(&self, path: &str) -> Result<SignedUrl, SigningError> {
        self.issue_at(path, unix_now())
    }

    /// Sign `path` as if issued at `timestamp`
    pub fn issue_at(&self, path: &str, timestamp: u64) -> Result<SignedUrl, SigningError> {
        if path.is_empty() {
            return Err(SigningError::EmptyPath);
        }

        let mac = self.compute_mac(path, timestamp);
        debug!(%path, timestamp, "Issued signed URL");

        Ok(SignedUrl {
            path: path.to_string(),
            token: Token { timestamp, mac },
        })
    }

    /// Check the raw `verify` parameter against the path actually requested.
    ///
    /// The MAC is checked before the time window, so a tampered token reports
    /// `MacMismatch` even when it is also stale.
    pub fn verify(&self, path: &str, raw: Option<&str>, now: u64) -> Result<Token, VerifyError> {
        let raw = raw.ok_or(VerifyError::MissingToken)?;
        let token = raw.parse::<Token>().map_err(|error| {
            debug!(%path, %error, "Malformed verify parameter");
            VerifyError::InvalidToken
        })?;

        let mut mac = self.key.mac();
        mac.update(canonical_message(path, token.timestamp).as_bytes());
        // verify_slice compares in constant time
        mac.verify_slice(&token.mac)
            .map_err(|_| VerifyError::MacMismatch)?;

        if token.timestamp > now {
            return Err(VerifyError::NotYetValid);
        }

        let expired_at = token.timestamp.saturating_add(self.expiry_secs);
        if now > expired_at {
            return Err(VerifyError::Expired { expired_at });
        }

        Ok(token)
    }

    fn compute_mac(&self, path: &str, timestamp: u64) -> [u8; MAC_LEN] {
        let mut mac = self.key.mac();
        mac.update(canonical_message(path, timestamp).as_bytes());

        let mut out = [0u8; MAC_LEN];
        out.copy_from_slice(&mac.finalize().into_bytes());
        out
    }
}
