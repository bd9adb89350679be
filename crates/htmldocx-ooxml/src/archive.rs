//! Package container
//!
//! A `.docx` is a ZIP archive of XML parts and binary resources. Parts are
//! collected through the [`PartWriter`] seam and serialized with `zip`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::read::ZipArchive;
use zip::write::ZipWriter;
use zip::CompressionMethod;

use crate::error::Result;

/// Sink for named package parts
pub trait PartWriter {
    /// Store `bytes` under `path`, replacing any earlier part with that path
    fn write_part(&mut self, path: &str, bytes: Vec<u8>) -> Result<()>;
}

/// In-memory OOXML package
#[derive(Debug, Default, Clone)]
pub struct OoxmlPackage {
    /// All parts, keyed by path
    files: HashMap<String, Vec<u8>>,
}

impl OoxmlPackage {
    /// Create an empty package
    pub fn new() -> Self {
        Self::default()
    }

    /// Open and unpack a package file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Create from any reader that implements Read + Seek
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut files = HashMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();
            if name.ends_with('/') {
                continue;
            }
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            files.insert(name, contents);
        }

        Ok(Self { files })
    }

    /// Get a part's contents by path
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(|v| v.as_slice())
    }

    /// Get a part's contents as a string
    pub fn get_string(&self, path: &str) -> Option<String> {
        self.files
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Check if a part exists
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Part paths in sorted order
    pub fn file_list(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.files.keys().map(|s| s.as_str()).collect();
        paths.sort_unstable();
        paths
    }

    /// Number of parts
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check whether the package holds no parts
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Set a part's contents
    pub fn set(&mut self, path: impl Into<String>, contents: Vec<u8>) {
        self.files.insert(path.into(), contents);
    }

    /// Set a part's contents from a string
    pub fn set_string(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into().into_bytes());
    }

    /// Parse every `.xml` and `.rels` part and report the first syntax error
    pub fn check_well_formed(&self) -> Result<()> {
        for path in self.file_list() {
            if !(path.ends_with(".xml") || path.ends_with(".rels")) {
                continue;
            }
            let mut reader = Reader::from_reader(self.files[path].as_slice());
            let mut buf = Vec::new();
            loop {
                match reader.read_event_into(&mut buf) {
                    Ok(Event::Eof) => break,
                    Ok(_) => {}
                    Err(e) => {
                        log::warn!("Malformed part {}: {}", path, e);
                        return Err(e.into());
                    }
                }
                buf.clear();
            }
        }
        Ok(())
    }

    /// Write the package to a file
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(file)
    }

    /// Write the package to any writer
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated);

        // Sorted for deterministic output; `[Content_Types].xml` sorts first
        for path in self.file_list() {
            zip.start_file(path, options)?;
            zip.write_all(&self.files[path])?;
        }

        zip.finish()?;
        Ok(())
    }

    /// Serialize the package to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_to(&mut buffer)?;
        Ok(buffer.into_inner())
    }
}

impl PartWriter for OoxmlPackage {
    fn write_part(&mut self, path: &str, bytes: Vec<u8>) -> Result<()> {
        log::debug!("Part {} ({} bytes)", path, bytes.len());
        self.set(path, bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_operations() {
        let mut package = OoxmlPackage::new();
        package.set_string("word/document.xml", "<w:document/>");
        assert!(package.contains("word/document.xml"));
        assert_eq!(
            package.get_string("word/document.xml"),
            Some("<w:document/>".to_string())
        );
        assert_eq!(package.len(), 1);
        assert!(package.get("missing.xml").is_none());
    }

    #[test]
    fn test_write_part_replaces() {
        let mut package = OoxmlPackage::new();
        package.write_part("a.xml", b"one".to_vec()).unwrap();
        package.write_part("a.xml", b"two".to_vec()).unwrap();
        assert_eq!(package.get("a.xml"), Some(&b"two"[..]));
    }

    #[test]
    fn test_roundtrip_through_zip() {
        let mut package = OoxmlPackage::new();
        package.set_string("word/document.xml", "<w:document/>");
        package.set_string("[Content_Types].xml", "<Types/>");
        package.set("word/media/image-1.png", vec![0x89, b'P', b'N', b'G']);

        let bytes = package.to_bytes().unwrap();
        let restored = OoxmlPackage::from_reader(Cursor::new(bytes.clone())).unwrap();
        assert_eq!(restored.len(), 3);
        assert_eq!(
            restored.get("word/media/image-1.png"),
            Some(&[0x89, b'P', b'N', b'G'][..])
        );

        // Content types come first in the archive
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), "[Content_Types].xml");
    }

    #[test]
    fn test_check_well_formed() {
        let mut package = OoxmlPackage::new();
        package.set_string("word/document.xml", "<w:document><w:body/></w:document>");
        package.set("word/media/image-1.png", vec![b'<', b'x']);
        assert!(package.check_well_formed().is_ok());

        package.set_string("word/styles.xml", "<w:styles><w:style></w:styles>");
        assert!(matches!(
            package.check_well_formed(),
            Err(crate::error::ConvertError::Xml(_))
        ));
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.docx");
        let mut package = OoxmlPackage::new();
        package.set_string("word/document.xml", "<w:document/>");
        package.write_to_file(&path).unwrap();

        let restored = OoxmlPackage::open(&path).unwrap();
        assert!(restored.contains("word/document.xml"));
    }
}
