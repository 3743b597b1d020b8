//! Repository probe (component C): reads a local snapshot's `repomd.xml`
//! and surfaces the facts the rest of the pipeline needs without requiring
//! a content-hash computation up front.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rpmrepo_metadata::{RepomdData, RepomdXml};

use crate::contenthash;
use crate::error::DeltaRepoError;
use crate::hashalgo::HashAlgorithm;
use crate::Result;

/// A transient view of one snapshot, populated from its `repomd.xml`.
#[derive(Debug, Clone)]
pub struct SnapshotProbe {
    pub path: PathBuf,
    pub revision: Option<String>,
    /// Highest per-record timestamp across the listed metadata documents.
    pub timestamp: Option<i64>,
    /// Metadata types the `repomd.xml` declares.
    pub declared_types: Vec<String>,
    /// Of those, the ones actually present as files on disk.
    pub present_types: Vec<String>,
    pub repomd_size: u64,
    /// Content hash the snapshot itself declares, if any (rare — most
    /// snapshots don't advertise one; see [`crate::solver::guess_fingerprint`]
    /// for the fallback).
    pub declared_contenthash: Option<String>,
    /// Computed content hash, present only when [`SnapshotProbe::probe`] was
    /// asked to compute one.
    pub computed_contenthash: Option<String>,

    sizes: std::collections::BTreeMap<String, u64>,
}

impl SnapshotProbe {
    /// Probe `path` (a directory containing `repodata/repomd.xml`).
    /// `hash_algorithm` is `Some` to additionally compute the content hash
    /// from the `primary` document; the cache gardener never needs this and
    /// passes `None`.
    pub fn probe(path: &Path, hash_algorithm: Option<HashAlgorithm>) -> Result<Self> {
        let repomd_path = path.join("repodata").join("repomd.xml");
        if !repomd_path.exists() {
            return Err(DeltaRepoError::NotARepository(path.to_path_buf()));
        }

        let repomd_size = std::fs::metadata(&repomd_path)?.len();
        let repomd: RepomdData = RepomdXml::open(&repomd_path)
            .map_err(|e| DeltaRepoError::Repomd(e.to_string()))?;

        let mut timestamp = None;
        let mut declared_types = Vec::new();
        let mut sizes = std::collections::BTreeMap::new();

        for record in repomd.records() {
            declared_types.push(record.mdtype.clone());
            if let Some(size) = record.size {
                sizes.insert(record.mdtype.clone(), size);
            }
            if let Some(ts) = record.timestamp {
                timestamp = Some(timestamp.map_or(ts, |cur: i64| cur.max(ts)));
            }
        }

        let present_types = declared_types
            .iter()
            .filter(|ty| {
                repomd
                    .get_record(ty)
                    .map(|r| path.join(&r.location_href).exists())
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        let computed_contenthash = match hash_algorithm {
            Some(algo) => {
                if let Some(primary) = repomd.get_record("primary") {
                    let primary_path = path.join(&primary.location_href);
                    Some(contenthash::content_hash(&primary_path, algo)?)
                } else {
                    tracing::warn!(path = %path.display(), "snapshot has no primary record; hashing empty input");
                    Some(algo.hex_digest(b""))
                }
            }
            None => None,
        };

        Ok(Self {
            path: path.to_path_buf(),
            revision: repomd.revision().map(|s| s.to_string()),
            timestamp,
            declared_types,
            present_types,
            repomd_size,
            declared_contenthash: None,
            computed_contenthash,
            sizes,
        })
    }

    /// Byte cost of a full download of this snapshot: the sum of the
    /// whitelisted metadata documents' advertised sizes (or all of them
    /// when the whitelist is empty), plus `repomd.xml`'s size when
    /// `include_repomd` is set. This is the baseline the updater compares
    /// delta costs against.
    pub fn cost(&self, whitelist: &HashSet<String>, include_repomd: bool) -> u64 {
        let metadata_cost: u64 = if whitelist.is_empty() {
            self.sizes.values().sum()
        } else {
            self.sizes
                .iter()
                .filter(|(ty, _)| whitelist.contains(ty.as_str()))
                .map(|(_, size)| *size)
                .sum()
        };
        metadata_cost + if include_repomd { self.repomd_size } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_minimal_repo(dir: &Path) {
        let repodata = dir.join("repodata");
        std::fs::create_dir_all(&repodata).unwrap();
        std::fs::write(
            repodata.join("repomd.xml"),
            r#"<?xml version="1.0"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo">
  <revision>42</revision>
  <data type="primary">
    <location href="repodata/primary.xml"/>
    <timestamp>1000</timestamp>
    <size>12</size>
  </data>
</repomd>"#,
        )
        .unwrap();
        std::fs::write(repodata.join("primary.xml"), "<metadata/>").unwrap();
    }

    #[test]
    fn test_not_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        let err = SnapshotProbe::probe(dir.path(), None).unwrap_err();
        assert!(matches!(err, DeltaRepoError::NotARepository(_)));
    }

    #[test]
    fn test_probe_reads_basic_facts() {
        let dir = tempfile::tempdir().unwrap();
        write_minimal_repo(dir.path());

        let probe = SnapshotProbe::probe(dir.path(), None).unwrap();
        assert_eq!(probe.revision.as_deref(), Some("42"));
        assert_eq!(probe.timestamp, Some(1000));
        assert_eq!(probe.declared_types, vec!["primary".to_string()]);
        assert_eq!(probe.present_types, vec!["primary".to_string()]);
    }

    #[test]
    fn test_cost_whitelist_restricts_sum() {
        let dir = tempfile::tempdir().unwrap();
        write_minimal_repo(dir.path());
        let probe = SnapshotProbe::probe(dir.path(), None).unwrap();

        let empty = HashSet::new();
        let all_cost = probe.cost(&empty, false);
        assert_eq!(all_cost, 12);

        let mut whitelist = HashSet::new();
        whitelist.insert("filelists".to_string());
        assert_eq!(probe.cost(&whitelist, false), 0);
    }
}
