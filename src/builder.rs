//! Record builder (component H): constructs a [`DeltaRecord`] from an
//! on-disk delta repository's `repomd.xml` + `deltametadata.xml` (§4.H).

use std::path::Path;

use rpmrepo_metadata::{RepomdData, RepomdXml};

use crate::deltametadata::DeltaMetadata;
use crate::error::DeltaRepoError;
use crate::hashalgo::HashAlgorithm;
use crate::index::{DataRecord, DeltaRecord};
use crate::Result;

/// Build a [`DeltaRecord`] describing the delta repository rooted at
/// `path`. `strip_prefix`, when given, is removed from `location_href` so
/// the record is relative to a mirror root rather than an absolute path.
pub fn build_record(path: &Path, strip_prefix: Option<&Path>) -> Result<DeltaRecord> {
    let repomd_path = path.join("repodata").join("repomd.xml");
    let repomd: RepomdData =
        RepomdXml::open(&repomd_path).map_err(|e| DeltaRepoError::Repomd(e.to_string()))?;

    let deltametadata_record = repomd
        .get_record("deltametadata")
        .ok_or_else(|| DeltaRepoError::NotADeltaRepository(path.to_path_buf()))?;
    let deltametadata_path = path.join(&deltametadata_record.location_href);
    let dm = DeltaMetadata::load(&deltametadata_path)?;

    let location_href = match strip_prefix {
        Some(prefix) => path
            .strip_prefix(prefix)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned(),
        None => path.to_string_lossy().into_owned(),
    };

    let mut record = DeltaRecord {
        location_base: None,
        location_href,
        revision_src: dm.revision_src,
        revision_dst: dm.revision_dst,
        contenthash_src: dm.contenthash_src,
        contenthash_dst: dm.contenthash_dst,
        contenthash_type: dm.contenthash_type,
        timestamp_src: dm.timestamp_src,
        timestamp_dst: dm.timestamp_dst,
        data: Default::default(),
        repomd_timestamp: None,
        repomd_size: None,
        repomd_checksums: Vec::new(),
    };

    for rec in repomd.records() {
        if rec.mdtype.is_empty() {
            continue;
        }
        let size = rec.size.or(rec.open_size);
        if let Some(size) = size {
            record.data.insert(rec.mdtype.clone(), DataRecord { size });
        }
    }

    let repomd_metadata = std::fs::metadata(&repomd_path)?;
    record.repomd_size = Some(repomd_metadata.len());
    record.repomd_timestamp = Some(mtime_unix(&repomd_metadata));

    let repomd_bytes = std::fs::read(&repomd_path)?;
    let digest = HashAlgorithm::Sha256.hex_digest(&repomd_bytes);
    record.repomd_checksums = vec![("sha256".to_string(), digest)];

    Ok(record)
}

fn mtime_unix(metadata: &std::fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_delta_repo(dir: &Path) {
        let repodata = dir.join("repodata");
        std::fs::create_dir_all(&repodata).unwrap();

        let dm = DeltaMetadata {
            revision_src: Some("1".to_string()),
            revision_dst: Some("2".to_string()),
            contenthash_src: Some("aaa".to_string()),
            contenthash_dst: Some("bbb".to_string()),
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
  <data type="primary">
    <location href="repodata/primary.xml"/>
    <size>500</size>
  </data>
</repomd>"#,
        )
        .unwrap();
        std::fs::write(repodata.join("primary.xml"), "<metadata/>").unwrap();
    }

    #[test]
    fn test_build_record_from_delta_repo() {
        let dir = tempfile::tempdir().unwrap();
        let repo_dir = dir.path().join("deltas").join("A-B");
        write_delta_repo(&repo_dir);

        let record = build_record(&repo_dir, Some(dir.path())).unwrap();
        assert_eq!(record.contenthash_src.as_deref(), Some("aaa"));
        assert_eq!(record.contenthash_dst.as_deref(), Some("bbb"));
        assert_eq!(record.data.get("primary").unwrap().size, 500);
        assert_eq!(record.repomd_checksums.len(), 1);
        assert_eq!(record.repomd_checksums[0].0, "sha256");
        assert_eq!(record.location_href, "deltas/A-B");
    }

    #[test]
    fn test_not_a_delta_repository() {
        let dir = tempfile::tempdir().unwrap();
        let repodata = dir.path().join("repodata");
        std::fs::create_dir_all(&repodata).unwrap();
        std::fs::write(
            repodata.join("repomd.xml"),
            r#"<?xml version="1.0"?><repomd xmlns="http://linux.duke.edu/metadata/repo"></repomd>"#,
        )
        .unwrap();

        let err = build_record(dir.path(), None).unwrap_err();
        assert!(matches!(err, DeltaRepoError::NotADeltaRepository(_)));
    }
}
