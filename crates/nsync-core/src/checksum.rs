//! Content checksum type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Size in bytes of a content checksum (an MD5 digest).
pub const CHECKSUM_SIZE: usize = 16;

/// A 16-byte content digest used to decide whether a file really changed.
///
/// The digest is only a change detector. Two files with equal checksums are
/// treated as carrying the same content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(pub [u8; CHECKSUM_SIZE]);

impl Checksum {
    /// Create a checksum from raw digest bytes.
    pub const fn from_bytes(bytes: [u8; CHECKSUM_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; CHECKSUM_SIZE] {
        &self.0
    }

    /// Convert to lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 32-character hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidChecksum(e.to_string()))?;
        let arr: [u8; CHECKSUM_SIZE] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidChecksum(format!("expected {CHECKSUM_SIZE} bytes")))?;
        Ok(Self(arr))
    }

    /// The all-zero checksum.
    pub const ZERO: Self = Self([0u8; CHECKSUM_SIZE]);
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<[u8; CHECKSUM_SIZE]> for Checksum {
    fn from(bytes: [u8; CHECKSUM_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Checksum {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_hex_roundtrip() {
        let checksum = Checksum::from_bytes([0x5d; CHECKSUM_SIZE]);
        let parsed = Checksum::from_hex(&checksum.to_hex()).unwrap();
        assert_eq!(checksum, parsed);
    }

    #[test]
    fn test_checksum_from_hex_rejects_wrong_length() {
        assert!(Checksum::from_hex("abcd").is_err());
        assert!(Checksum::from_hex("zz").is_err());
    }

    #[test]
    fn test_checksum_display() {
        let checksum = Checksum::from_bytes([0xab; CHECKSUM_SIZE]);
        assert_eq!(checksum.to_string(), "ab".repeat(CHECKSUM_SIZE));
    }
}
