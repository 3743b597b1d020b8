//! `deltametadata.xml` data model and codec (component B, per-delta half).
//!
//! Each delta repository carries one `deltametadata.xml`, referenced from its
//! own `repomd.xml` under the metadata type `deltametadata`. Besides the
//! revision/contenthash/timestamp triple it carries an arbitrary number of
//! `<plugin>` bundles: opaque payload that drives the per-document diff
//! plugin (§9) and is otherwise untouched by this crate.

use std::io::Read;
use std::path::Path;

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::compression;
use crate::error::DeltaRepoError;
use crate::Result;

/// An ordered `key -> value` attribute bag, as carried by a `<plugin>`
/// element or one of its named subelements.
pub type AttributeBag = IndexMap<String, String>;

/// One `<plugin>` bundle: a name/version pair, free-form top-level
/// attributes, and any number of named, repeated subelements. Subelements
/// sharing a name are collected in encounter order under that name; relative
/// ordering *between* distinct subelement names is not preserved, matching
/// the "mapping from sublist-name to ordered sequence of attribute bags"
/// representation the design calls for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginBundle {
    pub name: String,
    pub version: String,
    pub attributes: AttributeBag,
    pub sublists: IndexMap<String, Vec<AttributeBag>>,
}

impl PluginBundle {
    /// The metadata document types this bundle's plugin needs in order to
    /// apply — delegated entirely to the plugin registry (§9); this crate
    /// has no built-in knowledge of any specific plugin's payload shape.
    pub fn needed_metadata(&self) -> Vec<String> {
        Vec::new()
    }
}

/// The `<deltametadata>` document for one delta repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaMetadata {
    pub revision_src: Option<String>,
    pub revision_dst: Option<String>,

    pub contenthash_src: Option<String>,
    pub contenthash_dst: Option<String>,
    pub contenthash_type: Option<String>,

    pub timestamp_src: Option<i64>,
    pub timestamp_dst: Option<i64>,

    pub plugins: Vec<PluginBundle>,
}

impl DeltaMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `deltametadata.xml`, auto-detecting compression.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = compression::open_reader(path)?;
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut xml = Reader::from_str(content);
        xml.config_mut().trim_text(true);

        let mut meta = DeltaMetadata::default();
        // stack of (element name, in-progress bundle/bag state)
        let mut current_plugin: Option<PluginBundle> = None;
        let mut current_sublist_name: Option<String> = None;

        loop {
            match xml.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    let name = local_name(&e);
                    match name.as_str() {
                        "revision" => {
                            meta.revision_src = attr(&e, "src");
                            meta.revision_dst = attr(&e, "dst");
                        }
                        "contenthash" => {
                            meta.contenthash_src = attr(&e, "src");
                            meta.contenthash_dst = attr(&e, "dst");
                            meta.contenthash_type = attr(&e, "type");
                        }
                        "timestamp" => {
                            meta.timestamp_src = attr(&e, "src").and_then(|v| v.parse().ok());
                            meta.timestamp_dst = attr(&e, "dst").and_then(|v| v.parse().ok());
                        }
                        "usedplugins" => {}
                        "plugin" => {
                            let mut bundle = PluginBundle::default();
                            for (k, v) in all_attrs(&e) {
                                match k.as_str() {
                                    "name" => bundle.name = v,
                                    "version" => bundle.version = v,
                                    _ => {
                                        bundle.attributes.insert(k, v);
                                    }
                                }
                            }
                            current_plugin = Some(bundle);
                        }
                        other => {
                            // any other element nested inside <plugin> is a
                            // named subelement carrying a free-form bag
                            if current_plugin.is_some() {
                                let bag: AttributeBag = all_attrs(&e).into_iter().collect();
                                if let Some(plugin) = current_plugin.as_mut() {
                                    plugin
                                        .sublists
                                        .entry(other.to_string())
                                        .or_default()
                                        .push(bag);
                                }
                                current_sublist_name = Some(other.to_string());
                            }
                        }
                    }
                }
                Ok(Event::End(e)) => {
                    let name = local_name(&e);
                    match name.as_str() {
                        "plugin" => {
                            if let Some(bundle) = current_plugin.take() {
                                meta.plugins.push(bundle);
                            }
                        }
                        other if Some(other.to_string()) == current_sublist_name => {
                            current_sublist_name = None;
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(DeltaRepoError::Parse {
                        location: "deltametadata.xml".to_string(),
                        reason: err.to_string(),
                    })
                }
            }
        }

        Ok(meta)
    }

    pub fn serialise(&self) -> String {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .create_element("deltametadata")
            .write_inner_content::<_, std::convert::Infallible>(|w| {
                if self.revision_src.is_some() || self.revision_dst.is_some() {
                    let mut el = BytesStart::new("revision");
                    if let Some(v) = &self.revision_src {
                        el.push_attribute(("src", v.as_str()));
                    }
                    if let Some(v) = &self.revision_dst {
                        el.push_attribute(("dst", v.as_str()));
                    }
                    w.write_event(Event::Empty(el)).ok();
                }
                if self.contenthash_src.is_some() || self.contenthash_dst.is_some() {
                    let mut el = BytesStart::new("contenthash");
                    if let Some(v) = &self.contenthash_src {
                        el.push_attribute(("src", v.as_str()));
                    }
                    if let Some(v) = &self.contenthash_dst {
                        el.push_attribute(("dst", v.as_str()));
                    }
                    if let Some(v) = &self.contenthash_type {
                        el.push_attribute(("type", v.as_str()));
                    }
                    w.write_event(Event::Empty(el)).ok();
                }
                if self.timestamp_src.is_some() || self.timestamp_dst.is_some() {
                    let mut el = BytesStart::new("timestamp");
                    if let Some(v) = self.timestamp_src {
                        el.push_attribute(("src", v.to_string().as_str()));
                    }
                    if let Some(v) = self.timestamp_dst {
                        el.push_attribute(("dst", v.to_string().as_str()));
                    }
                    w.write_event(Event::Empty(el)).ok();
                }
                if !self.plugins.is_empty() {
                    w.create_element("usedplugins")
                        .write_inner_content::<_, std::convert::Infallible>(|w| {
                            for plugin in &self.plugins {
                                let mut el = BytesStart::new("plugin");
                                el.push_attribute(("name", plugin.name.as_str()));
                                el.push_attribute(("version", plugin.version.as_str()));
                                for (k, v) in &plugin.attributes {
                                    el.push_attribute((k.as_str(), v.as_str()));
                                }
                                if plugin.sublists.is_empty() {
                                    w.write_event(Event::Empty(el)).ok();
                                } else {
                                    w.write_event(Event::Start(el.clone())).ok();
                                    for (sub_name, bags) in &plugin.sublists {
                                        for bag in bags {
                                            let mut sub_el = BytesStart::new(sub_name.as_str());
                                            for (k, v) in bag {
                                                sub_el.push_attribute((k.as_str(), v.as_str()));
                                            }
                                            w.write_event(Event::Empty(sub_el)).ok();
                                        }
                                    }
                                    w.write_event(Event::End(el.to_end())).ok();
                                }
                            }
                            Ok(())
                        })
                        .ok();
                }
                Ok(())
            })
            .expect("in-memory XML write cannot fail");

        let bytes = writer.into_inner();
        String::from_utf8(bytes).expect("serialised XML is valid UTF-8")
    }

    pub fn dump(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.serialise())?;
        Ok(())
    }
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn attr(e: &BytesStart, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key.as_bytes())
        .map(|a| a.unescape_value().unwrap_or_default().to_string())
}

fn all_attrs(e: &BytesStart) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.local_name().as_ref()).to_string();
            let value = a.unescape_value().unwrap_or_default().to_string();
            (key, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeltaMetadata {
        let mut plugin = PluginBundle {
            name: "primary_diff".to_string(),
            version: "1".to_string(),
            ..Default::default()
        };
        plugin.attributes.insert("format".to_string(), "bsdiff".to_string());
        plugin
            .sublists
            .entry("file".to_string())
            .or_default()
            .push(AttributeBag::from([("name".to_string(), "a.rpm".to_string())]));
        plugin
            .sublists
            .entry("file".to_string())
            .or_default()
            .push(AttributeBag::from([("name".to_string(), "b.rpm".to_string())]));

        DeltaMetadata {
            revision_src: Some("1".to_string()),
            revision_dst: Some("2".to_string()),
            contenthash_src: Some("aaa".to_string()),
            contenthash_dst: Some("bbb".to_string()),
            contenthash_type: Some("sha256".to_string()),
            timestamp_src: Some(100),
            timestamp_dst: Some(200),
            plugins: vec![plugin],
        }
    }

    #[test]
    fn test_round_trip_with_plugin() {
        let meta = sample();
        let xml = meta.serialise();
        let parsed = DeltaMetadata::parse(&xml).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn test_round_trip_no_plugins() {
        let meta = DeltaMetadata {
            revision_src: Some("1".to_string()),
            revision_dst: Some("2".to_string()),
            ..Default::default()
        };
        let xml = meta.serialise();
        let parsed = DeltaMetadata::parse(&xml).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn test_plugin_sublist_preserves_order() {
        let meta = sample();
        let files = &meta.plugins[0].sublists["file"];
        assert_eq!(files[0]["name"], "a.rpm");
        assert_eq!(files[1]["name"], "b.rpm");
    }
}
