//! Per-document diff plugin dispatch (§9). The apply engine treats the
//! actual byte-diff encoding of a metadata stream as a black-box: this
//! module only models the registry and the contract every plugin honours,
//! not any concrete diff algorithm (explicitly out of scope, §1).

use std::collections::HashSet;
use std::path::Path;

use crate::deltametadata::PluginBundle;
use crate::error::DeltaRepoError;
use crate::Result;

/// A handler for one `(name, version)` plugin pair.
pub trait Plugin {
    /// Apply this plugin's diff: `source_file` is the previous intermediate's
    /// copy of the document, `delta_file` the downloaded diff, `out_file`
    /// where the new intermediate's copy should be written.
    fn apply(&self, source_file: &Path, delta_file: &Path, out_file: &Path, bundle: &PluginBundle) -> Result<()>;

    /// The metadata-document types this plugin needs in order to apply.
    fn needed_metadata(&self, bundle: &PluginBundle) -> HashSet<String>;
}

/// A trivial plugin that treats the "delta" as the complete replacement
/// document — the degenerate diff encoding used when a stream changed so
/// much that a real diff wouldn't be smaller. Registered under
/// `("replace", "1")`.
pub struct ReplacePlugin;

impl Plugin for ReplacePlugin {
    fn apply(&self, _source_file: &Path, delta_file: &Path, out_file: &Path, _bundle: &PluginBundle) -> Result<()> {
        std::fs::copy(delta_file, out_file)?;
        Ok(())
    }

    fn needed_metadata(&self, _bundle: &PluginBundle) -> HashSet<String> {
        HashSet::new()
    }
}

/// Registry of known plugins, keyed by `(name, version)`. Unknown names
/// fail the update; version mismatches are the plugin's own concern (it
/// either handles the version in `bundle` or this lookup misses and the
/// update fails the same way).
pub struct PluginRegistry {
    handlers: std::collections::HashMap<(String, String), Box<dyn Plugin + Send + Sync>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        let mut handlers: std::collections::HashMap<(String, String), Box<dyn Plugin + Send + Sync>> =
            std::collections::HashMap::new();
        handlers.insert(("replace".to_string(), "1".to_string()), Box::new(ReplacePlugin));
        Self { handlers }
    }

    pub fn register(&mut self, name: &str, version: &str, handler: Box<dyn Plugin + Send + Sync>) {
        self.handlers.insert((name.to_string(), version.to_string()), handler);
    }

    pub fn get(&self, name: &str, version: &str) -> Result<&(dyn Plugin + Send + Sync)> {
        self.handlers
            .get(&(name.to_string(), version.to_string()))
            .map(|b| b.as_ref())
            .ok_or_else(|| DeltaRepoError::UnknownPlugin {
                name: name.to_string(),
                version: version.to_string(),
            })
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_plugin_rejected() {
        let registry = PluginRegistry::new();
        let err = registry.get("nonexistent", "9").unwrap_err();
        assert!(matches!(err, DeltaRepoError::UnknownPlugin { .. }));
    }

    #[test]
    fn test_replace_plugin_copies_delta_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let delta = dir.path().join("delta.xml");
        let out = dir.path().join("out.xml");
        std::fs::write(&delta, b"new contents").unwrap();

        let registry = PluginRegistry::new();
        let plugin = registry.get("replace", "1").unwrap();
        let bundle = PluginBundle::default();
        plugin.apply(Path::new("/nonexistent"), &delta, &out, &bundle).unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), b"new contents");
    }
}
