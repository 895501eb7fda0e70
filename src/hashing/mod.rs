//! Content fingerprinting
//!
//! A fingerprint is the SHA-256 digest of the full file content, rendered as
//! 64 lowercase hex characters. It is the idempotency key joining storage
//! locators, ledger receipts, and index records: identical bytes always
//! produce the identical fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Canonical content fingerprint: 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parse a candidate fingerprint string.
    ///
    /// Rejects anything that is not exactly 64 lowercase hex characters,
    /// before any lookup happens downstream.
    pub fn parse(candidate: &str) -> Result<Self, String> {
        if candidate.len() != 64 {
            return Err(format!(
                "fingerprint must be 64 hex chars, got {}",
                candidate.len()
            ));
        }
        if !candidate
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err("fingerprint must be lowercase hex".to_string());
        }
        Ok(Self(candidate.to_string()))
    }

    /// Hex string form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of a byte slice.
///
/// Deterministic and pure. The empty slice is valid input and hashes to the
/// well-defined digest of the empty string.
pub fn fingerprint(data: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Fingerprint(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_fingerprint_deterministic() {
        let a = fingerprint(b"hello");
        let b = fingerprint(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), HELLO_SHA256);
    }

    #[test]
    fn test_empty_input_is_valid() {
        let fp = fingerprint(b"");
        assert_eq!(
            fp.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_parse_rejects_short() {
        assert!(Fingerprint::parse(&HELLO_SHA256[..63]).is_err());
    }

    #[test]
    fn test_parse_rejects_uppercase() {
        assert!(Fingerprint::parse(&HELLO_SHA256.to_uppercase()).is_err());
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        let bad = format!("{}g", &HELLO_SHA256[..63]);
        assert!(Fingerprint::parse(&bad).is_err());
    }

    #[test]
    fn test_parse_accepts_canonical() {
        let fp = Fingerprint::parse(HELLO_SHA256).unwrap();
        assert_eq!(fp.as_str(), HELLO_SHA256);
    }
}
