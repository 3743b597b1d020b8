//! `deltarepos.xml` data model and codec (component B, mirror-index half).

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::compression::{self, Compression};
use crate::error::DeltaRepoError;
use crate::hashalgo::HashAlgorithm;
use crate::Result;

/// One metadata document's advertised size within a delta record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataRecord {
    pub size: u64,
}

/// One entry in a mirror index: a single published delta repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaRecord {
    pub location_base: Option<String>,
    pub location_href: String,

    pub revision_src: Option<String>,
    pub revision_dst: Option<String>,

    pub contenthash_src: Option<String>,
    pub contenthash_dst: Option<String>,
    pub contenthash_type: Option<String>,

    pub timestamp_src: Option<i64>,
    pub timestamp_dst: Option<i64>,

    /// Metadata-document type -> advertised size; a `BTreeMap` so iteration
    /// is already in ascending `type` order as the grammar requires on emit.
    pub data: BTreeMap<String, DataRecord>,

    pub repomd_timestamp: Option<i64>,
    pub repomd_size: Option<u64>,
    pub repomd_checksums: Vec<(String, String)>,
}

impl DeltaRecord {
    /// Identity of a record within an index: `(location_base, location_href)`.
    pub fn identity(&self) -> (Option<&str>, &str) {
        (self.location_base.as_deref(), self.location_href.as_str())
    }

    /// Byte cost of downloading every advertised metadata document plus
    /// `repomd.xml` itself — the baseline a delta is compared against.
    pub fn size_total(&self) -> u64 {
        self.repomd_size.unwrap_or(0)
            + self.data.values().map(|d| d.size).sum::<u64>()
    }

    /// Validate mandatory fields and value ranges. `force` tolerates a
    /// missing `repomd_timestamp` (the spec's stricter-of-two-copies rule,
    /// §9).
    pub fn validate(&self, force: bool) -> Result<()> {
        if self.location_href.is_empty() {
            return Err(DeltaRepoError::Validation(
                "location_href must not be blank".to_string(),
            ));
        }
        let contenthash_type = self.contenthash_type.as_deref().ok_or_else(|| {
            DeltaRepoError::Validation(format!(
                "{}: missing contenthash_type",
                self.location_href
            ))
        })?;
        HashAlgorithm::parse(contenthash_type)?;

        if self.contenthash_src.is_none() || self.contenthash_dst.is_none() {
            return Err(DeltaRepoError::Validation(format!(
                "{}: missing contenthash_src/dst",
                self.location_href
            )));
        }

        match self.repomd_timestamp {
            Some(ts) if ts < 0 => {
                return Err(DeltaRepoError::Validation(format!(
                    "{}: repomd_timestamp must be non-negative",
                    self.location_href
                )))
            }
            None if !force => {
                return Err(DeltaRepoError::Validation(format!(
                    "{}: missing repomd_timestamp",
                    self.location_href
                )))
            }
            _ => {}
        }

        for ts in [self.timestamp_src, self.timestamp_dst].into_iter().flatten() {
            if ts < 0 {
                return Err(DeltaRepoError::Validation(format!(
                    "{}: timestamps must be non-negative",
                    self.location_href
                )));
            }
        }

        Ok(())
    }
}

/// Which `<repomd>` text-content child the parser is about to read, set on
/// the matching Start event and consumed by the following Text event.
enum RepomdTextTarget {
    Timestamp,
    Size,
}

/// An ordered sequence of `DeltaRecord`s. Order is purely presentational;
/// identity of a member is `(location_base, location_href)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaIndex {
    pub records: Vec<DeltaRecord>,
}

impl DeltaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, location_base: Option<&str>, location_href: &str) -> Option<&DeltaRecord> {
        self.records
            .iter()
            .find(|r| r.identity() == (location_base, location_href))
    }

    /// Load a `deltarepos.xml[.xz|.gz|.bz2]` document, auto-detecting
    /// compression. `force` downgrades per-record validation failures to a
    /// warning-and-skip instead of aborting the whole load.
    pub fn load(path: &Path, force: bool) -> Result<Self> {
        let mut reader = compression::open_reader(path)?;
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::parse(&content, force)
    }

    /// Parse `deltarepos.xml` content already decompressed into memory.
    pub fn parse(content: &str, force: bool) -> Result<Self> {
        let mut xml = Reader::from_str(content);
        xml.config_mut().trim_text(true);

        let mut index = DeltaIndex::new();
        let mut current: Option<DeltaRecord> = None;
        // element-name stack used to disambiguate e.g. <timestamp> inside
        // <deltarepo> from <timestamp> inside <repomd>
        let mut in_repomd = false;
        // which <repomd> text-content child the next Event::Text belongs to
        let mut repomd_text_target: Option<RepomdTextTarget> = None;

        loop {
            match xml.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    let name = local_name(&e);
                    match name.as_str() {
                        "deltarepo" => current = Some(DeltaRecord::default()),
                        "location" => {
                            if let Some(rec) = current.as_mut() {
                                rec.location_href = attr(&e, "href").unwrap_or_default();
                                rec.location_base = attr(&e, "base");
                            }
                        }
                        "revision" => {
                            if let Some(rec) = current.as_mut() {
                                rec.revision_src = attr(&e, "src");
                                rec.revision_dst = attr(&e, "dst");
                            }
                        }
                        "contenthash" => {
                            if let Some(rec) = current.as_mut() {
                                rec.contenthash_src = attr(&e, "src");
                                rec.contenthash_dst = attr(&e, "dst");
                                rec.contenthash_type = attr(&e, "type");
                            }
                        }
                        "timestamp" if !in_repomd => {
                            if let Some(rec) = current.as_mut() {
                                rec.timestamp_src = attr(&e, "src").and_then(|v| v.parse().ok());
                                rec.timestamp_dst = attr(&e, "dst").and_then(|v| v.parse().ok());
                            }
                        }
                        "timestamp" if in_repomd => {
                            repomd_text_target = Some(RepomdTextTarget::Timestamp);
                        }
                        "size" if in_repomd => {
                            repomd_text_target = Some(RepomdTextTarget::Size);
                        }
                        "data" => {
                            if let Some(rec) = current.as_mut() {
                                if let (Some(ty), Some(size)) = (attr(&e, "type"), attr(&e, "size")) {
                                    if let Ok(size) = size.parse::<u64>() {
                                        rec.data.insert(ty, DataRecord { size });
                                    }
                                }
                            }
                        }
                        "repomd" => in_repomd = true,
                        "checksum" => {
                            repomd_text_target = None;
                            if let Some(rec) = current.as_mut() {
                                if let Some(ty) = attr(&e, "type") {
                                    // text content read on the following Text event
                                    rec.repomd_checksums.push((ty, String::new()));
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Text(t)) => {
                    if let Some(rec) = current.as_mut() {
                        if let Some(target) = repomd_text_target.take() {
                            let text = decode_text(&t);
                            match target {
                                RepomdTextTarget::Timestamp => rec.repomd_timestamp = text.parse().ok(),
                                RepomdTextTarget::Size => rec.repomd_size = text.parse().ok(),
                            }
                        } else if let Some(last) = rec.repomd_checksums.last_mut() {
                            if last.1.is_empty() {
                                last.1 = decode_text(&t);
                            }
                        }
                    }
                }
                Ok(Event::End(e)) => {
                    let name = local_name(&e);
                    match name.as_str() {
                        "deltarepo" => {
                            if let Some(rec) = current.take() {
                                match rec.validate(force) {
                                    Ok(()) => index.records.push(rec),
                                    Err(err) if force => {
                                        tracing::warn!(error = %err, "skipping invalid delta record")
                                    }
                                    Err(err) => {
                                        return Err(DeltaRepoError::Parse {
                                            location: rec.location_href,
                                            reason: err.to_string(),
                                        })
                                    }
                                }
                            }
                        }
                        "repomd" => in_repomd = false,
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(DeltaRepoError::Parse {
                        location: "deltarepos.xml".to_string(),
                        reason: err.to_string(),
                    })
                }
            }
        }

        Ok(index)
    }

    /// Emit `deltarepos.xml`, compressed as requested, at `path`. The
    /// compression suffix is appended to `path` if the caller omitted it.
    /// Auto-detect/unknown are rejected by [`Compression::parse`] before
    /// this is ever reached.
    pub fn dump(&self, path: &Path, compression: Compression) -> Result<std::path::PathBuf> {
        let full_path = compression::with_suffix(path, compression);
        let xml = self.serialise();
        let mut writer = compression::create_writer(&full_path, compression)?;
        use std::io::Write;
        writer.write_all(xml.as_bytes())?;
        Ok(full_path)
    }

    /// Serialise to an in-memory XML string (used directly by tests and by
    /// [`DeltaIndex::dump`]).
    pub fn serialise(&self) -> String {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .create_element("deltarepos")
            .write_inner_content::<_, std::convert::Infallible>(|w| {
                for rec in &self.records {
                    w.create_element("deltarepo")
                        .write_inner_content::<_, std::convert::Infallible>(|w| {
                            {
                                let mut el = BytesStart::new("location");
                                el.push_attribute(("href", rec.location_href.as_str()));
                                if let Some(base) = &rec.location_base {
                                    el.push_attribute(("base", base.as_str()));
                                }
                                w.write_event(Event::Empty(el)).ok();
                            }
                            if rec.revision_src.is_some() || rec.revision_dst.is_some() {
                                let mut el = BytesStart::new("revision");
                                if let Some(v) = &rec.revision_src {
                                    el.push_attribute(("src", v.as_str()));
                                }
                                if let Some(v) = &rec.revision_dst {
                                    el.push_attribute(("dst", v.as_str()));
                                }
                                w.write_event(Event::Empty(el)).ok();
                            }
                            if rec.contenthash_src.is_some() || rec.contenthash_dst.is_some() {
                                let mut el = BytesStart::new("contenthash");
                                if let Some(v) = &rec.contenthash_src {
                                    el.push_attribute(("src", v.as_str()));
                                }
                                if let Some(v) = &rec.contenthash_dst {
                                    el.push_attribute(("dst", v.as_str()));
                                }
                                if let Some(v) = &rec.contenthash_type {
                                    el.push_attribute(("type", v.as_str()));
                                }
                                w.write_event(Event::Empty(el)).ok();
                            }
                            if rec.timestamp_src.is_some() || rec.timestamp_dst.is_some() {
                                let mut el = BytesStart::new("timestamp");
                                if let Some(v) = rec.timestamp_src {
                                    el.push_attribute(("src", v.to_string().as_str()));
                                }
                                if let Some(v) = rec.timestamp_dst {
                                    el.push_attribute(("dst", v.to_string().as_str()));
                                }
                                w.write_event(Event::Empty(el)).ok();
                            }
                            for (ty, data) in &rec.data {
                                let mut el = BytesStart::new("data");
                                el.push_attribute(("type", ty.as_str()));
                                el.push_attribute(("size", data.size.to_string().as_str()));
                                w.write_event(Event::Empty(el)).ok();
                            }
                            w.create_element("repomd")
                                .write_inner_content::<_, std::convert::Infallible>(|w| {
                                    if let Some(ts) = rec.repomd_timestamp {
                                        w.create_element("timestamp")
                                            .write_text_content(BytesText::new(&ts.to_string()))
                                            .ok();
                                    }
                                    if let Some(sz) = rec.repomd_size {
                                        w.create_element("size")
                                            .write_text_content(BytesText::new(&sz.to_string()))
                                            .ok();
                                    }
                                    for (ty, digest) in &rec.repomd_checksums {
                                        w.create_element("checksum")
                                            .with_attribute(("type", ty.as_str()))
                                            .write_text_content(BytesText::new(digest))
                                            .ok();
                                    }
                                    Ok(())
                                })
                                .ok();
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

fn decode_text(t: &BytesText) -> String {
    t.unescape().map(|s| s.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> DeltaRecord {
        let mut data = BTreeMap::new();
        data.insert("primary".to_string(), DataRecord { size: 7766 });
        DeltaRecord {
            location_base: None,
            location_href: "deltarepos/A-B".to_string(),
            revision_src: Some("1387077123".to_string()),
            revision_dst: Some("1387087456".to_string()),
            contenthash_src: Some("a".to_string()),
            contenthash_dst: Some("b".to_string()),
            contenthash_type: Some("md5".to_string()),
            timestamp_src: Some(1387075111),
            timestamp_dst: Some(1387086222),
            data,
            repomd_timestamp: Some(123456789),
            repomd_size: Some(963),
            repomd_checksums: vec![("sha256".to_string(), "foobarchecksum".to_string())],
        }
    }

    #[test]
    fn test_empty_index_round_trip() {
        let index = DeltaIndex::new();
        let xml = index.serialise();
        assert!(xml.contains("<deltarepos"));
        let parsed = DeltaIndex::parse(&xml, false).unwrap();
        assert!(parsed.records.is_empty());
    }

    #[test]
    fn test_single_record_round_trip() {
        let mut index = DeltaIndex::new();
        index.records.push(sample_record());

        let xml = index.serialise();
        let parsed = DeltaIndex::parse(&xml, false).unwrap();

        assert_eq!(parsed.records.len(), 1);
        let rec = &parsed.records[0];
        assert_eq!(rec.location_href, "deltarepos/A-B");
        assert_eq!(rec.contenthash_src.as_deref(), Some("a"));
        assert_eq!(rec.contenthash_dst.as_deref(), Some("b"));
        assert_eq!(rec.repomd_timestamp, Some(123456789));
        assert_eq!(rec.repomd_size, Some(963));
        assert_eq!(rec.size_total(), 963 + 7766);
        assert_eq!(
            rec.repomd_checksums,
            vec![("sha256".to_string(), "foobarchecksum".to_string())]
        );
    }

    #[test]
    fn test_force_mode_skips_invalid_record() {
        let xml = r#"<deltarepos>
  <deltarepo>
    <location href="deltarepos/bad" />
  </deltarepo>
</deltarepos>"#;
        assert!(DeltaIndex::parse(xml, false).is_err());
        let parsed = DeltaIndex::parse(xml, true).unwrap();
        assert!(parsed.records.is_empty());
    }

    #[test]
    fn test_data_emitted_in_ascending_type_order() {
        let mut rec = sample_record();
        rec.data.insert("updateinfo".to_string(), DataRecord { size: 10 });
        rec.data.insert("filelists".to_string(), DataRecord { size: 20 });

        let mut index = DeltaIndex::new();
        index.records.push(rec);
        let xml = index.serialise();

        let filelists_pos = xml.find("type=\"filelists\"").unwrap();
        let primary_pos = xml.find("type=\"primary\"").unwrap();
        let updateinfo_pos = xml.find("type=\"updateinfo\"").unwrap();
        assert!(filelists_pos < primary_pos);
        assert!(primary_pos < updateinfo_pos);
    }
}
