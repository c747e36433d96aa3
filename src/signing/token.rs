use crate::signing::key::MAC_LEN;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// Standard base64 never produces '-', so the first one ends the timestamp.
const SEPARATOR: char = '-';

#[derive(Debug, Error, Eq, PartialEq)]
pub enum TokenError {
    #[error("Missing '-' separator")]
    MissingSeparator,

    #[error("Timestamp is not a non-negative integer")]
    InvalidTimestamp,

    #[error("MAC is not a base64 encoded {MAC_LEN}-byte tag")]
    InvalidMac,
}

/// Capability token carried in the `verify` query parameter.
///
/// Wire form: `<timestamp>-<base64(mac)>`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    /// Issue time, seconds since the Unix epoch
    pub timestamp: u64,
    pub mac: [u8; MAC_LEN],
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}",
            self.timestamp,
            STANDARD.encode(self.mac)
        )
    }
}

impl FromStr for Token {
    type Err = TokenError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (timestamp, mac) = raw
            .split_once(SEPARATOR)
            .ok_or(TokenError::MissingSeparator)?;

        // u64::from_str would also take a leading '+'
        if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TokenError::InvalidTimestamp);
        }
        let timestamp = timestamp
            .parse::<u64>()
            .map_err(|_| TokenError::InvalidTimestamp)?;

        let mac: [u8; MAC_LEN] = STANDARD
            .decode(mac)
            .map_err(|_| TokenError::InvalidMac)?
            .try_into()
            .map_err(|_| TokenError::InvalidMac)?;

        Ok(Self { timestamp, mac })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Token {
        let mut mac = [0u8; MAC_LEN];
        for (i, b) in mac.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(250);
        }
        Token {
            timestamp: 1700000000,
            mac,
        }
    }

    #[test]
    fn test_wire_format() {
        let token = Token {
            timestamp: 42,
            mac: [0xff; MAC_LEN],
        };
        let wire = token.to_string();
        assert!(wire.starts_with("42-"));
        // 32 bytes -> 44 chars with one '=' pad, standard alphabet
        assert_eq!(wire.len(), 3 + 44);
        assert!(wire.ends_with('='));
        assert!(wire[3..].contains('/'));

        assert_eq!(wire.parse::<Token>().unwrap(), token);
    }

    #[test]
    fn test_split_on_first_separator_only() {
        let token = sample();
        let wire = token.to_string();
        let (ts, rest) = wire.split_once('-').unwrap();
        assert_eq!(ts, "1700000000");
        assert!(!rest.contains('-'));

        // anything after the first '-' belongs to the MAC and must be valid base64
        assert_eq!(
            format!("1-2-{}", STANDARD.encode([0u8; MAC_LEN])).parse::<Token>(),
            Err(TokenError::InvalidMac)
        );
    }

    #[test]
    fn test_rejects_malformed_timestamps() {
        let mac = STANDARD.encode([7u8; MAC_LEN]);
        for ts in ["", "+5", "-5", "12a", " 1", "99999999999999999999999"] {
            assert_eq!(
                format!("{ts}-{mac}").parse::<Token>(),
                Err(TokenError::InvalidTimestamp),
                "timestamp {ts:?}"
            );
        }
    }

    #[test]
    fn test_rejects_malformed_macs() {
        assert_eq!(
            "1700000000".parse::<Token>(),
            Err(TokenError::MissingSeparator)
        );
        assert_eq!(
            "1700000000-".parse::<Token>(),
            Err(TokenError::InvalidMac)
        );
        assert_eq!(
            "1700000000-not base64!".parse::<Token>(),
            Err(TokenError::InvalidMac)
        );

        // wrong length
        let short = STANDARD.encode([1u8; 16]);
        assert_eq!(
            format!("1700000000-{short}").parse::<Token>(),
            Err(TokenError::InvalidMac)
        );

        // url-safe alphabet is not accepted
        let url_safe = STANDARD
            .encode([0xfbu8; MAC_LEN])
            .replace('+', "-")
            .replace('/', "_");
        assert!(format!("1700000000-{url_safe}").parse::<Token>().is_err());
    }
}
