pub mod error;
pub mod key;
pub mod signer;
pub mod token;

// Re-export public types and functions
pub use error::{SigningError, VerifyError};
pub use key::{MAC_LEN, SigningKey};
pub use signer::{
    DEFAULT_EXPIRY_SECS, SignedUrl, UrlSigner, VERIFY_PARAM, canonical_message, unix_now,
};
pub use token::{Token, TokenError};
