//! Delta-mirror client (component D): fetches one mirror's
//! `deltarepos.xml.xz`, parses it in forgiving mode by default, and wraps
//! each record as a [`Link`] attributed to that mirror.

use std::path::Path;

use crate::index::{DeltaIndex, DeltaRecord};
use crate::Result;

/// A view over one [`DeltaRecord`] paired with the mirror URL that
/// advertised it — one edge of the update graph.
#[derive(Debug, Clone)]
pub struct Link {
    pub mirror_url: String,
    pub record: DeltaRecord,
}

impl Link {
    pub fn src(&self) -> Option<&str> {
        self.record.contenthash_src.as_deref()
    }

    pub fn dst(&self) -> Option<&str> {
        self.record.contenthash_dst.as_deref()
    }

    pub fn contenthash_type(&self) -> Option<&str> {
        self.record.contenthash_type.as_deref()
    }

    /// The delta repository's URL, resolved against the mirror base when
    /// the record carries no absolute `location_base` of its own.
    pub fn delta_repo_url(&self) -> String {
        match &self.record.location_base {
            Some(base) => join_url(base, &self.record.location_href),
            None => join_url(&self.mirror_url, &self.record.location_href),
        }
    }

    /// Byte cost of applying this link restricted to `whitelist` (empty
    /// whitelist means "every document this record advertises").
    pub fn cost(&self, whitelist: &std::collections::HashSet<String>) -> u64 {
        let repomd_size = self.record.repomd_size.unwrap_or(0);
        if whitelist.is_empty() {
            self.record.size_total()
        } else {
            repomd_size
                + self
                    .record
                    .data
                    .iter()
                    .filter(|(ty, _)| whitelist.contains(ty.as_str()))
                    .map(|(_, d)| d.size)
                    .sum::<u64>()
        }
    }
}

fn join_url(base: &str, href: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{href}")
    } else {
        format!("{base}/{href}")
    }
}

/// Fetch `deltarepos.xml.xz` from `mirror_url` into a scratch file, parse
/// it, and return the links it advertises. The scratch file is always
/// removed, even when parsing fails. `strict` disables the default
/// forgiving (skip-invalid-record) parse mode.
pub fn fetch_links(
    client: &crate::download::Downloader,
    mirror_url: &str,
    strict: bool,
) -> Result<Vec<Link>> {
    let index_url = join_url(mirror_url, "deltarepos.xml.xz");
    let scratch = client.fetch_to_tempfile(&index_url)?;

    let result = load_links(scratch.path(), mirror_url, strict);
    // scratch file is removed when `scratch` (a `tempfile::NamedTempFile`)
    // drops here, regardless of `result`.
    result
}

/// Parse an already-downloaded `deltarepos.xml[.xz]` file into [`Link`]s
/// attributed to `mirror_url`. Split out from [`fetch_links`] for testing
/// without a network round-trip.
pub fn load_links(path: &Path, mirror_url: &str, strict: bool) -> Result<Vec<Link>> {
    let index = DeltaIndex::load(path, !strict)?;
    Ok(index
        .records
        .into_iter()
        .map(|record| Link {
            mirror_url: mirror_url.to_string(),
            record,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::Compression;

    fn sample_index() -> DeltaIndex {
        let mut index = DeltaIndex::new();
        let mut data = std::collections::BTreeMap::new();
        data.insert("primary".to_string(), crate::index::DataRecord { size: 100 });
        index.records.push(DeltaRecord {
            location_base: None,
            location_href: "deltas/A-B".to_string(),
            revision_src: Some("1".to_string()),
            revision_dst: Some("2".to_string()),
            contenthash_src: Some("aaa".to_string()),
            contenthash_dst: Some("bbb".to_string()),
            contenthash_type: Some("sha256".to_string()),
            timestamp_src: Some(1),
            timestamp_dst: Some(2),
            data,
            repomd_timestamp: Some(3),
            repomd_size: Some(50),
            repomd_checksums: vec![],
        });
        index
    }

    #[test]
    fn test_load_links_wraps_mirror_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deltarepos.xml");
        index_to_file(&sample_index(), &path);

        let links = load_links(&path, "https://mirror.example/deltas", false).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].mirror_url, "https://mirror.example/deltas");
        assert_eq!(
            links[0].delta_repo_url(),
            "https://mirror.example/deltas/deltas/A-B"
        );
    }

    #[test]
    fn test_cost_matches_whitelist_rules() {
        let link = Link {
            mirror_url: "https://mirror.example".to_string(),
            record: sample_index().records.remove(0),
        };
        let empty = std::collections::HashSet::new();
        assert_eq!(link.cost(&empty), 150);

        let mut whitelist = std::collections::HashSet::new();
        whitelist.insert("primary".to_string());
        assert_eq!(link.cost(&whitelist), 150);

        let mut other = std::collections::HashSet::new();
        other.insert("filelists".to_string());
        assert_eq!(link.cost(&other), 50);
    }

    fn index_to_file(index: &DeltaIndex, path: &Path) {
        std::fs::write(path, index.serialise()).unwrap();
        let _ = Compression::None;
    }
}
