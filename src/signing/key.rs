use crate::signing::error::SigningError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 tag in bytes
pub const MAC_LEN: usize = 32;

/// Process-wide signing key.
///
/// Holds the HMAC state already keyed with the secret; every operation
/// starts from a clone of it.
#[derive(Clone)]
pub struct SigningKey {
    mac: HmacSha256,
}

impl SigningKey {
    /// Build the key from the configured secret.
    ///
    /// A missing or empty secret is a startup error; there is no fallback key.
    pub fn load(secret: Option<&[u8]>) -> Result<Self, SigningError> {
        let secret = secret
            .filter(|secret| !secret.is_empty())
            .ok_or(SigningError::MissingSecret)?;

        let mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
        Ok(Self { mac })
    }

    /// Fresh MAC state for one message
    pub(crate) fn mac(&self) -> HmacSha256 {
        self.mac.clone()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(***)")
    }
}
