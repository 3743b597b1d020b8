//! The single lookup table every entry point that accepts a hash-algorithm
//! name goes through, including the legacy `"sha"` alias.

use std::fmt;

use digest::Digest;

use crate::error::{DeltaRepoError, Result};

/// A content-hash / checksum algorithm recognised by deltarepo.
///
/// These are exactly the checksum types a `repomd.xml` `<checksum type>`
/// may declare, so content-hash type and repomd checksum type share this
/// one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
    Sha1,
    Md5,
}

impl HashAlgorithm {
    /// Parse an algorithm name, applying the legacy `"sha" -> "sha1"` alias.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            "sha1" | "sha" => Ok(HashAlgorithm::Sha1),
            "md5" => Ok(HashAlgorithm::Md5),
            other => Err(DeltaRepoError::UnknownAlgorithm(other.to_string())),
        }
    }

    pub fn canonical_name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Md5 => "md5",
        }
    }

    /// Hash `data` and return the lower-case hex digest.
    pub fn hex_digest(self, data: &[u8]) -> String {
        match self {
            HashAlgorithm::Sha256 => hex::encode(sha2::Sha256::digest(data)),
            HashAlgorithm::Sha512 => hex::encode(sha2::Sha512::digest(data)),
            HashAlgorithm::Sha1 => hex::encode(sha1::Sha1::digest(data)),
            HashAlgorithm::Md5 => hex::encode(md5::Md5::digest(data)),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_alias() {
        assert_eq!(HashAlgorithm::parse("sha").unwrap(), HashAlgorithm::Sha1);
        assert_eq!(
            HashAlgorithm::parse("sha").unwrap(),
            HashAlgorithm::parse("sha1").unwrap()
        );
    }

    #[test]
    fn test_unknown_algorithm() {
        assert!(HashAlgorithm::parse("whirlpool").is_err());
    }

    #[test]
    fn test_empty_digest_is_stable() {
        let digest = HashAlgorithm::Sha256.hex_digest(b"");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, HashAlgorithm::Sha256.hex_digest(b""));
        assert_ne!(digest, HashAlgorithm::Sha1.hex_digest(b""));
    }
}
