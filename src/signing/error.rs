use axum::http::StatusCode;
use chrono::DateTime;
use thiserror::Error;

/// Errors raised while building a signer or issuing a URL
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SigningError {
    #[error("No signing secret configured")]
    MissingSecret,

    #[error("Target path must not be empty")]
    EmptyPath,
}

/// Signed URL verification failures
#[derive(Debug, Error, Eq, PartialEq)]
pub enum VerifyError {
    #[error("Missing verification token")]
    MissingToken,

    #[error("Malformed verification token")]
    InvalidToken,

    #[error("MAC mismatch")]
    MacMismatch,

    #[error("Token is not yet valid")]
    NotYetValid,

    #[error("URL expired at {}", format_unix(.expired_at))]
    Expired { expired_at: u64 },
}

impl VerifyError {
    /// Every verification failure is a 403
    pub fn to_err_code(&self) -> StatusCode {
        StatusCode::FORBIDDEN
    }

    /// Message returned to the client.
    ///
    /// A malformed token and a forged one read the same from outside.
    pub fn public_reason(&self) -> String {
        match self {
            VerifyError::InvalidToken | VerifyError::MacMismatch => "Invalid MAC".to_string(),
            other => other.to_string(),
        }
    }
}

fn format_unix(secs: &u64) -> String {
    i64::try_from(*secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}
