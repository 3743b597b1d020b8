//! Stable fingerprinting of a repository snapshot from its primary package
//! listing (component A).

use std::path::Path;

use rpmrepo_metadata::{PrimaryXml, Repository};

use crate::hashalgo::HashAlgorithm;
use crate::Result;

/// Compute the content hash of a `primary.xml[.gz]` document.
///
/// Loads just the primary-package-list metadata into a fresh [`Repository`]
/// (ignoring filelists/updateinfo for speed), building `pkgid ‖
/// location_href ‖ location_base` for each package (each field defaulting to
/// the empty string when absent), sorts the resulting strings
/// lexicographically, and hashes their concatenation. Malformed or
/// non-primary input falls back to the hash of the empty string rather than
/// failing — two snapshots that enumerate no packages are defined to agree.
pub fn content_hash(primary_path: &Path, algorithm: HashAlgorithm) -> Result<String> {
    let mut pieces: Vec<String> = Vec::new();

    let mut repo = Repository::new();
    match repo.load_metadata_file::<PrimaryXml>(primary_path) {
        Ok(()) => {
            for package in repo.packages().values() {
                let pkgid = package.pkgid();
                let href = package.location_href();
                let base = package.location_base().unwrap_or("");

                if pkgid.is_empty() {
                    tracing::warn!(path = %primary_path.display(), "package missing pkgId");
                }
                if href.is_empty() {
                    tracing::warn!(path = %primary_path.display(), "package missing location_href");
                }

                let mut piece = String::with_capacity(pkgid.len() + href.len() + base.len());
                piece.push_str(pkgid);
                piece.push_str(href);
                piece.push_str(base);
                pieces.push(piece);
            }
        }
        Err(err) => {
            tracing::warn!(path = %primary_path.display(), error = %err, "could not read primary.xml, falling back to empty-input hash");
        }
    }

    pieces.sort();
    let concatenated = pieces.concat();
    Ok(algorithm.hex_digest(concatenated.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("primary.xml");
        std::fs::write(&path, "not xml at all").unwrap();

        let digest = content_hash(&path, HashAlgorithm::Sha256).unwrap();
        assert_eq!(digest, HashAlgorithm::Sha256.hex_digest(b""));
    }

    #[test]
    fn test_legacy_alias_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("primary.xml");
        std::fs::write(&path, "not xml at all").unwrap();

        let via_sha = content_hash(&path, HashAlgorithm::parse("sha").unwrap()).unwrap();
        let via_sha1 = content_hash(&path, HashAlgorithm::parse("sha1").unwrap()).unwrap();
        assert_eq!(via_sha, via_sha1);
    }
}
