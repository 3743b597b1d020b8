//! Generator (component I): walks a mirror directory and emits a fresh or
//! updated `deltarepos.xml.xz` (§4.I).

use std::collections::HashMap;
use std::path::Path;

use crate::builder;
use crate::compression::Compression;
use crate::error::DeltaRepoError;
use crate::index::{DeltaIndex, DeltaRecord};
use crate::Result;

/// Which mode [`generate`] runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Produce a fresh index from scratch containing exactly the
    /// repositories currently on disk.
    Regenerate,
    /// Load any existing index, retain externally-hosted records verbatim,
    /// keep locally-hosted records whose directory still exists, and add
    /// records for newly discovered directories.
    Update,
}

/// Walk `mirror_dir`, invoking the record builder at every directory
/// containing a `repodata/` child, and write `deltarepos.xml.xz` at its
/// root. Invalid records are warned; `force` makes them non-fatal.
pub fn generate(mirror_dir: &Path, mode: Mode, force: bool) -> Result<std::path::PathBuf> {
    let index_path = mirror_dir.join("deltarepos.xml.xz");

    let mut listed: HashMap<String, DeltaRecord> = HashMap::new();
    let mut records: Vec<DeltaRecord> = Vec::new();

    if mode == Mode::Update && index_path.exists() {
        let existing = DeltaIndex::load(&index_path, true)?;
        for rec in existing.records {
            if rec.location_base.is_some() {
                // externally hosted: outside this mirror's view, keep as-is
                records.push(rec);
            } else {
                listed.insert(normalize(&rec.location_href), rec);
            }
        }
    }

    for entry in walkdir::WalkDir::new(mirror_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_dir() {
            continue;
        }
        if !entry.path().join("repodata").is_dir() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(mirror_dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();
        let relative = normalize(&relative);
        if relative.is_empty() {
            continue;
        }

        if mode == Mode::Update {
            if let Some(existing) = listed.remove(&relative) {
                records.push(existing);
                continue;
            }
        }

        match builder::build_record(entry.path(), Some(mirror_dir)) {
            Ok(record) => match record.validate(force) {
                Ok(()) => records.push(record),
                Err(err) if force => {
                    tracing::warn!(path = %entry.path().display(), error = %err, "skipping invalid delta repository")
                }
                Err(err) => {
                    return Err(DeltaRepoError::Validation(format!(
                        "{}: {err}",
                        entry.path().display()
                    )))
                }
            },
            Err(err) if force => {
                tracing::warn!(path = %entry.path().display(), error = %err, "skipping bad delta repository")
            }
            Err(err) => return Err(err),
        }
    }

    // In update mode, any `listed` entry not matched by a walked directory
    // is implicitly dropped — its directory no longer exists on disk.

    records.sort_by(|a, b| a.location_href.cmp(&b.location_href));

    let mut index = DeltaIndex::new();
    index.records = records;
    index.dump(&mirror_dir.join("deltarepos.xml"), Compression::Xz)
}

fn normalize(href: &str) -> String {
    href.trim_matches('/').replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_delta_repo(root: &Path, sub: &str, src: &str, dst: &str) {
        let repo_dir = root.join(sub);
        let repodata = repo_dir.join("repodata");
        std::fs::create_dir_all(&repodata).unwrap();

        let dm = crate::deltametadata::DeltaMetadata {
            revision_src: Some("1".to_string()),
            revision_dst: Some("2".to_string()),
            contenthash_src: Some(src.to_string()),
            contenthash_dst: Some(dst.to_string()),
            contenthash_type: Some("sha256".to_string()),
            timestamp_src: Some(100),
            timestamp_dst: Some(200),
            plugins: vec![],
        };
        dm.dump(&repodata.join("deltametadata.xml")).unwrap();

        std::fs::write(
            repodata.join("repomd.xml"),
            r#"<?xml version="1.0"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo">
  <data type="deltametadata">
    <location href="repodata/deltametadata.xml"/>
    <size>10</size>
  </data>
</repomd>"#,
        )
        .unwrap();
    }

    #[test]
    fn test_regenerate_lists_current_directories() {
        let dir = tempfile::tempdir().unwrap();
        write_delta_repo(dir.path(), "01_01", "a", "b");

        let index_path = generate(dir.path(), Mode::Regenerate, false).unwrap();
        let index = DeltaIndex::load(&index_path, false).unwrap();
        assert_eq!(index.records.len(), 1);
        assert_eq!(index.records[0].location_href, "01_01");
    }

    #[test]
    fn test_generator_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_delta_repo(dir.path(), "01_01", "a", "b");
        write_delta_repo(dir.path(), "01_02", "b", "c");

        let first = generate(dir.path(), Mode::Regenerate, false).unwrap();
        let bytes_first = std::fs::read(&first).unwrap();
        // regenerate again: must be byte-identical
        let second = generate(dir.path(), Mode::Regenerate, false).unwrap();
        let bytes_second = std::fs::read(&second).unwrap();
        assert_eq!(bytes_first, bytes_second);
    }

    #[test]
    fn test_update_mode_adds_and_drops() {
        let dir = tempfile::tempdir().unwrap();
        write_delta_repo(dir.path(), "01_01", "a", "b");
        generate(dir.path(), Mode::Regenerate, false).unwrap();

        write_delta_repo(dir.path(), "01_02", "b", "c");
        let path = generate(dir.path(), Mode::Update, false).unwrap();
        let index = DeltaIndex::load(&path, false).unwrap();
        assert_eq!(index.records.len(), 2);

        std::fs::remove_dir_all(dir.path().join("01_01")).unwrap();
        let path = generate(dir.path(), Mode::Update, false).unwrap();
        let index = DeltaIndex::load(&path, false).unwrap();
        assert_eq!(index.records.len(), 1);
        assert_eq!(index.records[0].location_href, "01_02");
    }
}
