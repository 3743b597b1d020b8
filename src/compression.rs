//! Shared compression helper for the delta-index codec and delta payloads.
//!
//! Reads always auto-detect the codec from the file's magic bytes; writes
//! require an explicit, known codec.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use crate::error::DeltaRepoError;
use crate::Result;

/// The compression choices a caller may request on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gz,
    Bz2,
    Xz,
}

impl Compression {
    /// Parse a logical compression name. `"auto"`/`"unknown"` are rejected:
    /// auto-detect only makes sense on read.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "none" | "" => Ok(Compression::None),
            "gz" | "gzip" => Ok(Compression::Gz),
            "bz2" | "bzip2" => Ok(Compression::Bz2),
            "xz" => Ok(Compression::Xz),
            "auto" | "unknown" => Err(DeltaRepoError::BadCompression(name.to_string())),
            other => Err(DeltaRepoError::BadCompression(other.to_string())),
        }
    }

    /// The filename suffix this codec implies, appended on write when the
    /// caller's chosen path doesn't already carry it.
    pub fn suffix(self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gz => ".gz",
            Compression::Bz2 => ".bz2",
            Compression::Xz => ".xz",
        }
    }

    fn as_niffler_format(self) -> niffler::compression::Format {
        match self {
            Compression::None => niffler::compression::Format::No,
            Compression::Gz => niffler::compression::Format::Gzip,
            Compression::Bz2 => niffler::compression::Format::Bzip,
            Compression::Xz => niffler::compression::Format::Lzma,
        }
    }
}

/// Ensure `path` carries the suffix implied by `compression`, appending it
/// if the caller passed the bare logical name.
pub fn with_suffix(path: &Path, compression: Compression) -> std::path::PathBuf {
    let suffix = compression.suffix();
    if suffix.is_empty() || path.to_string_lossy().ends_with(suffix) {
        path.to_path_buf()
    } else {
        let mut s = path.as_os_str().to_owned();
        s.push(suffix);
        std::path::PathBuf::from(s)
    }
}

/// Open `path` for reading with codec auto-detection.
pub fn open_reader(path: &Path) -> Result<Box<dyn std::io::Read>> {
    let file = File::open(path)?;
    let (reader, _format) = niffler::get_reader(Box::new(BufReader::new(file)))
        .map_err(|e| DeltaRepoError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())))?;
    Ok(reader)
}

/// Open `path` for writing with the chosen codec. The returned writer must
/// be flushed/dropped before the file is considered complete.
pub fn create_writer(path: &Path, compression: Compression) -> Result<Box<dyn Write>> {
    let file = File::create(path)?;
    let level = niffler::compression::Level::Six;
    let writer = niffler::get_writer(Box::new(file), compression.as_niffler_format(), level)
        .map_err(|e| DeltaRepoError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())))?;
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_parse_rejects_auto() {
        assert!(Compression::parse("auto").is_err());
        assert!(Compression::parse("unknown").is_err());
    }

    #[test]
    fn test_with_suffix_appends_once() {
        let p = Path::new("deltarepos.xml");
        let with = with_suffix(p, Compression::Xz);
        assert_eq!(with, Path::new("deltarepos.xml.xz"));

        let already = Path::new("deltarepos.xml.xz");
        let with2 = with_suffix(already, Compression::Xz);
        assert_eq!(with2, Path::new("deltarepos.xml.xz"));
    }

    #[test]
    fn test_round_trip_xz() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.xz");

        let mut writer = create_writer(&path, Compression::Xz).unwrap();
        writer.write_all(b"hello deltarepo").unwrap();
        drop(writer);

        let mut reader = open_reader(&path).unwrap();
        let mut contents = String::new();
        reader.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello deltarepo");
    }

    #[test]
    fn test_round_trip_uncompressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");

        let mut writer = create_writer(&path, Compression::None).unwrap();
        writer.write_all(b"plain").unwrap();
        drop(writer);

        let mut reader = open_reader(&path).unwrap();
        let mut contents = String::new();
        reader.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "plain");
    }
}
