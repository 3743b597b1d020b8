//! Apply engine (component F): the largest single piece of the pipeline.
//! Downloads each delta in a resolved path onto a scratch copy of the
//! previous intermediate, invokes the per-document plugin, and finally
//! swaps the result into place atomically (§4.F, tested property 8).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rpmrepo_metadata::{ChecksumType, RepomdData, RepomdRecord, RepomdXml};

use crate::deltametadata::DeltaMetadata;
use crate::download::Downloader;
use crate::error::DeltaRepoError;
use crate::hashalgo::HashAlgorithm;
use crate::mirror::Link;
use crate::plugin::PluginRegistry;
use crate::solver::ResolvedPath;
use crate::Result;

/// Tunables for one `apply` invocation.
pub struct ApplyOptions {
    /// Metadata document types this client actually consumes; empty means
    /// "everything advertised".
    pub whitelist: HashSet<String>,
    /// Tolerate a step's delta lacking an optional metadata document.
    pub ignore_missing: bool,
    /// Write the result here instead of back onto `local_snapshot`.
    pub output_dir: Option<PathBuf>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            whitelist: HashSet::new(),
            ignore_missing: true,
            output_dir: None,
        }
    }
}

pub struct ApplyEngine<'a> {
    downloader: &'a Downloader,
    registry: &'a PluginRegistry,
}

impl<'a> ApplyEngine<'a> {
    pub fn new(downloader: &'a Downloader, registry: &'a PluginRegistry) -> Self {
        Self { downloader, registry }
    }

    /// Walk `path` atop `local_snapshot`, producing an updated snapshot
    /// either back at `local_snapshot` or at `options.output_dir`.
    pub fn apply(&self, local_snapshot: &Path, path: &ResolvedPath, options: &ApplyOptions) -> Result<PathBuf> {
        let scratch = tempfile::tempdir()?;

        let mut current = scratch.path().join("step-0");
        copy_dir_recursive(local_snapshot, &current)?;

        for (i, link) in path.links.iter().enumerate() {
            let step_dir = scratch.path().join(format!("step-{}", i + 1));
            let delta_dir = scratch.path().join(format!("delta-{}", i + 1));

            self.download_delta_repository(link, &delta_dir, &options.whitelist, options.ignore_missing)?;
            self.apply_step(&current, &delta_dir, &step_dir, options)?;

            current = step_dir;
        }

        let final_parent = options
            .output_dir
            .clone()
            .unwrap_or_else(|| local_snapshot.to_path_buf());
        let result = self.atomic_swap(&current.join("repodata"), &final_parent)?;

        // scratch (and every intermediate/delta step beneath it) is removed
        // recursively once we leave this scope.
        drop(scratch);

        Ok(result)
    }

    fn download_delta_repository(
        &self,
        link: &Link,
        dest_dir: &Path,
        whitelist: &HashSet<String>,
        ignore_missing: bool,
    ) -> Result<()> {
        let repodata_dir = dest_dir.join("repodata");
        std::fs::create_dir_all(&repodata_dir)?;

        let repomd_path = repodata_dir.join("repomd.xml");
        self.downloader
            .fetch_to_path(&format!("{}/repodata/repomd.xml", link.delta_repo_url()), &repomd_path)?;

        for (algo_name, expected) in &link.record.repomd_checksums {
            if let Ok(algo) = HashAlgorithm::parse(algo_name) {
                let bytes = std::fs::read(&repomd_path)?;
                let actual = algo.hex_digest(&bytes);
                if !actual.eq_ignore_ascii_case(expected) {
                    return Err(DeltaRepoError::ChecksumMismatch {
                        expected: expected.clone(),
                        actual,
                    });
                }
            }
        }

        let repomd: RepomdData =
            RepomdXml::open(&repomd_path).map_err(|e| DeltaRepoError::Repomd(e.to_string()))?;

        let deltametadata_record = repomd
            .get_record("deltametadata")
            .ok_or_else(|| DeltaRepoError::NotADeltaRepository(dest_dir.to_path_buf()))?;
        self.downloader.fetch_to_path(
            &format!("{}/{}", link.delta_repo_url(), deltametadata_record.location_href.display()),
            &dest_dir.join(&deltametadata_record.location_href),
        )?;

        let wanted: Vec<String> = repomd
            .records()
            .map(|r| r.mdtype.clone())
            .filter(|ty| ty != "deltametadata")
            .filter(|ty| whitelist.is_empty() || whitelist.contains(ty))
            .collect();

        for ty in wanted {
            match repomd.get_record(&ty) {
                Some(record) => {
                    self.downloader.fetch_to_path(
                        &format!("{}/{}", link.delta_repo_url(), record.location_href.display()),
                        &dest_dir.join(&record.location_href),
                    )?;
                }
                None if ignore_missing => continue,
                None => {
                    return Err(DeltaRepoError::NotADeltaRepository(dest_dir.to_path_buf()));
                }
            }
        }

        Ok(())
    }

    fn apply_step(&self, prev_dir: &Path, delta_dir: &Path, new_dir: &Path, options: &ApplyOptions) -> Result<()> {
        let new_repodata = new_dir.join("repodata");
        std::fs::create_dir_all(&new_repodata)?;

        let delta_meta = DeltaMetadata::load(&delta_dir.join("repodata").join("deltametadata.xml"))?;
        let prev_repomd: RepomdData = RepomdXml::open(&prev_dir.join("repodata").join("repomd.xml"))
            .map_err(|e| DeltaRepoError::Repomd(e.to_string()))?;
        let delta_repomd: RepomdData = RepomdXml::open(&delta_dir.join("repodata").join("repomd.xml"))
            .map_err(|e| DeltaRepoError::Repomd(e.to_string()))?;

        let mut types: Vec<String> = prev_repomd.records().map(|r| r.mdtype.clone()).collect();
        for ty in delta_repomd.records().map(|r| r.mdtype.clone()) {
            if !types.contains(&ty) {
                types.push(ty);
            }
        }
        types.retain(|ty| ty != "deltametadata");
        if !options.whitelist.is_empty() {
            types.retain(|ty| options.whitelist.contains(ty));
        }

        let mut new_repomd = RepomdData::default();

        for ty in &types {
            let out_path = new_repodata.join(format!("{ty}.xml"));
            let plugin_bundle = delta_meta
                .plugins
                .iter()
                .find(|bundle| bundle.attributes.get("type").map(String::as_str) == Some(ty.as_str()));

            match plugin_bundle {
                Some(bundle) => {
                    let plugin = self.registry.get(&bundle.name, &bundle.version)?;
                    let source_file = match prev_repomd.get_record(ty) {
                        Some(rec) => prev_dir.join(&rec.location_href),
                        None => prev_dir.join("repodata").join(format!("{ty}.xml.missing")),
                    };
                    let delta_file = delta_repomd
                        .get_record(ty)
                        .map(|rec| delta_dir.join(&rec.location_href))
                        .ok_or_else(|| DeltaRepoError::NotADeltaRepository(delta_dir.to_path_buf()))?;
                    plugin.apply(&source_file, &delta_file, &out_path, bundle)?;
                }
                None => {
                    // no diff for this type: it is unchanged since the
                    // previous intermediate, carry its file forward.
                    match prev_repomd.get_record(ty) {
                        Some(rec) => {
                            std::fs::copy(prev_dir.join(&rec.location_href), &out_path)?;
                        }
                        None if options.ignore_missing => continue,
                        None => return Err(DeltaRepoError::NotADeltaRepository(prev_dir.to_path_buf())),
                    }
                }
            }

            let record = RepomdRecord::new(ty, &out_path, &new_repodata, ChecksumType::Sha256)
                .map_err(|e| DeltaRepoError::Repomd(e.to_string()))?;
            new_repomd.add_record(record);
        }

        let (_, mut writer) = rpmrepo_metadata::utils::xml_writer_for_path(
            &new_repodata.join("repomd.xml"),
            rpmrepo_metadata::CompressionType::None,
        )
        .map_err(|e| DeltaRepoError::Repomd(e.to_string()))?;
        RepomdXml::write_data(&new_repomd, &mut writer).map_err(|e| DeltaRepoError::Repomd(e.to_string()))?;

        Ok(())
    }

    /// Atomically replace `final_parent/repodata` with `new_repodata`.
    /// The rename sequence guarantees `repodata` is never observably
    /// missing; a crash between the two renames leaves a `-backup` sibling
    /// as recovery residue (tested property 8).
    fn atomic_swap(&self, new_repodata: &Path, final_parent: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(final_parent)?;
        let epoch = chrono::Utc::now().timestamp();
        let pid = std::process::id();

        let tmp_dst = final_parent.join(format!(".deltarepo-repodata-{epoch}-{pid}"));
        let tmp_backup = final_parent.join(format!(".deltarepo-repodata-{epoch}-{pid}-backup"));
        let live = final_parent.join("repodata");

        copy_dir_recursive(new_repodata, &tmp_dst)?;

        if live.exists() {
            std::fs::rename(&live, &tmp_backup)?;
        }
        if let Err(err) = std::fs::rename(&tmp_dst, &live) {
            // restore the pre-update tree before giving up
            if tmp_backup.exists() {
                let _ = std::fs::rename(&tmp_backup, &live);
            }
            return Err(DeltaRepoError::Io(err));
        }
        if tmp_backup.exists() {
            std::fs::remove_dir_all(&tmp_backup)?;
        }

        Ok(live)
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in walkdir::WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| DeltaRepoError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        let rel = entry.path().strip_prefix(src).expect("walkdir yields paths under src");
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_dir_recursive() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("repodata")).unwrap();
        std::fs::write(src.path().join("repodata").join("repomd.xml"), b"hi").unwrap();

        let dst = tempfile::tempdir().unwrap();
        let target = dst.path().join("copy");
        copy_dir_recursive(src.path(), &target).unwrap();

        assert_eq!(
            std::fs::read(target.join("repodata").join("repomd.xml")).unwrap(),
            b"hi"
        );
    }

    #[test]
    fn test_atomic_swap_replaces_repodata() {
        let downloader_config = crate::config::Config::default();
        let downloader = Downloader::new(&downloader_config).unwrap();
        let registry = PluginRegistry::new();
        let engine = ApplyEngine::new(&downloader, &registry);

        let final_parent = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(final_parent.path().join("repodata")).unwrap();
        std::fs::write(
            final_parent.path().join("repodata").join("repomd.xml"),
            b"old",
        )
        .unwrap();

        let new_repodata = tempfile::tempdir().unwrap();
        std::fs::write(new_repodata.path().join("repomd.xml"), b"new").unwrap();

        let result = engine.atomic_swap(new_repodata.path(), final_parent.path()).unwrap();
        assert_eq!(std::fs::read(result.join("repomd.xml")).unwrap(), b"new");

        // no leftover backup/tmp dirs
        let leftovers: Vec<_> = std::fs::read_dir(final_parent.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".deltarepo-"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
