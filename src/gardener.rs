//! Cache gardener (component G): retention by count and/or age over a
//! directory of materialised snapshots (§4.G).

use std::path::{Path, PathBuf};

use crate::probe::SnapshotProbe;
use crate::Result;

/// Retention policy. Negative or absent limits disable the corresponding
/// rule; both rules may fire together and removals are unioned.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionPolicy {
    pub max_num: Option<i64>,
    pub max_age: Option<i64>,
}

/// One snapshot found under the cache root, with enough info to decide
/// whether it survives.
pub struct CacheEntry {
    pub path: PathBuf,
    pub timestamp: Option<i64>,
}

/// Enumerate `cache_dir`'s immediate subdirectories, probing each (without
/// hashing — the gardener never needs a content hash) and skipping
/// non-directories and directories lacking `repodata/` silently.
pub fn scan(cache_dir: &Path) -> Result<Vec<CacheEntry>> {
    let mut entries = Vec::new();

    for dir_entry in std::fs::read_dir(cache_dir)? {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        if !path.is_dir() {
            continue;
        }
        match SnapshotProbe::probe(&path, None) {
            Ok(probe) => entries.push(CacheEntry {
                path,
                timestamp: probe.timestamp,
            }),
            Err(_) => continue,
        }
    }

    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(entries)
}

/// Result of one `clear` invocation.
#[derive(Debug, Default)]
pub struct ClearResult {
    pub removed: Vec<PathBuf>,
    pub retained: Vec<PathBuf>,
    pub errors: Vec<(PathBuf, String)>,
}

/// Apply `policy` to `cache_dir`'s snapshots, deleting the union of
/// removals in descending-timestamp order. A failure to delete one entry
/// does not prevent attempts on the others (§5).
pub fn clear(cache_dir: &Path, policy: RetentionPolicy, now: i64) -> Result<ClearResult> {
    let entries = scan(cache_dir)?;
    let mut to_remove: std::collections::HashSet<PathBuf> = std::collections::HashSet::new();

    if let Some(max_num) = policy.max_num {
        if max_num >= 0 {
            for entry in entries.iter().skip(max_num as usize) {
                to_remove.insert(entry.path.clone());
            }
        }
    }

    if let Some(max_age) = policy.max_age {
        if max_age >= 0 {
            for entry in &entries {
                let age = entry.timestamp.map(|ts| now - ts);
                if age.map(|a| a > max_age).unwrap_or(false) {
                    to_remove.insert(entry.path.clone());
                }
            }
        }
    }

    let mut result = ClearResult::default();
    for entry in &entries {
        if to_remove.contains(&entry.path) {
            match std::fs::remove_dir_all(&entry.path) {
                Ok(()) => result.removed.push(entry.path.clone()),
                Err(err) => result.errors.push((entry.path.clone(), err.to_string())),
            }
        } else {
            result.retained.push(entry.path.clone());
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_snapshot(cache_dir: &Path, name: &str, timestamp: i64) {
        let repodata = cache_dir.join(name).join("repodata");
        std::fs::create_dir_all(&repodata).unwrap();
        std::fs::write(
            repodata.join("repomd.xml"),
            format!(
                r#"<?xml version="1.0"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo">
  <data type="primary">
    <location href="repodata/primary.xml"/>
    <timestamp>{timestamp}</timestamp>
  </data>
</repomd>"#
            ),
        )
        .unwrap();
        std::fs::write(repodata.join("primary.xml"), "<metadata/>").unwrap();
    }

    #[test]
    fn test_max_age_removes_all_when_too_old() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(dir.path(), "a", 100);
        write_snapshot(dir.path(), "b", 200);
        write_snapshot(dir.path(), "c", 300);

        let result = clear(dir.path(), RetentionPolicy { max_num: None, max_age: Some(1) }, 10_000).unwrap();
        assert_eq!(result.removed.len(), 3);
        assert!(result.retained.is_empty());
    }

    #[test]
    fn test_max_num_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(dir.path(), "a", 100);
        write_snapshot(dir.path(), "b", 200);
        write_snapshot(dir.path(), "c", 300);

        let result = clear(dir.path(), RetentionPolicy { max_num: Some(1), max_age: None }, 10_000).unwrap();
        assert_eq!(result.retained.len(), 1);
        assert!(result.retained[0].ends_with("c"));
        assert_eq!(result.removed.len(), 2);
    }

    #[test]
    fn test_non_repository_directories_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(dir.path(), "a", 100);
        std::fs::create_dir_all(dir.path().join("not-a-snapshot")).unwrap();

        let entries = scan(dir.path()).unwrap();
        assert_eq!(entries.len(), 1);
    }
}
