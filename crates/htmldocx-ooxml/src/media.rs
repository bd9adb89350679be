//! Media files
//!
//! Images arrive either as `data:<mime>;base64,<payload>` URIs or as bytes
//! fetched from a remote URL. Both end up as a [`MediaFile`] stored under
//! `word/media/`.

use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;

use crate::error::{ConvertError, Result};

fn data_uri_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^data:([A-Za-z0-9.+/-]+)(?:;[^;,]*)*;base64,(.+)$")
            .expect("valid data URI regex")
    })
}

/// A media part of the package
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFile {
    /// Sequential media id, starting at 1
    pub id: u32,
    /// Raw bytes
    pub content: Vec<u8>,
    /// Unique file name including extension (e.g. `image-1.png`)
    pub file_name: String,
}

impl MediaFile {
    /// Relationship target relative to `word/`
    pub fn target(&self) -> String {
        format!("media/{}", self.file_name)
    }

    /// Path inside the package
    pub fn part_path(&self) -> String {
        format!("word/media/{}", self.file_name)
    }

    /// File extension
    pub fn extension(&self) -> &str {
        self.file_name.rsplit('.').next().unwrap_or("png")
    }
}

/// A decoded `data:` URI
#[derive(Debug, Clone, PartialEq)]
pub struct DataUri {
    pub mime: String,
    pub payload: Vec<u8>,
}

/// Decode a `data:<mime>;base64,<payload>` URI
///
/// Whitespace inside the payload is ignored.
pub fn parse_data_uri(uri: &str) -> Result<DataUri> {
    let caps = data_uri_regex()
        .captures(uri.trim())
        .ok_or_else(|| ConvertError::InvalidDataUri(truncate(uri)))?;

    let encoded: String = caps[2].chars().filter(|c| !c.is_whitespace()).collect();
    let payload = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| ConvertError::InvalidDataUri(format!("{}: {}", truncate(uri), e)))?;

    Ok(DataUri {
        mime: caps[1].to_ascii_lowercase(),
        payload,
    })
}

/// Check whether a source string is a `data:` URI
pub fn is_data_uri(src: &str) -> bool {
    src.trim_start().starts_with("data:")
}

/// File extension for a MIME type
///
/// The extension is the MIME subtype; `octet-stream` and unknown shapes
/// default to `png`.
pub fn extension_for_mime(mime: &str) -> String {
    let subtype = mime
        .split(';')
        .next()
        .and_then(|m| m.split('/').nth(1))
        .map(|s| s.trim().to_ascii_lowercase())
        .unwrap_or_default();
    match subtype.as_str() {
        "" | "octet-stream" => "png".to_string(),
        "svg+xml" => "svg".to_string(),
        "x-icon" | "vnd.microsoft.icon" => "ico".to_string(),
        other => other.to_string(),
    }
}

/// Get the MIME content type for an image extension
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        "tiff" | "tif" => "image/tiff",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}

fn truncate(uri: &str) -> String {
    uri.chars().take(48).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_uri() {
        let uri = parse_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(uri.mime, "image/png");
        assert_eq!(uri.payload, b"hello");
    }

    #[test]
    fn test_parse_data_uri_ignores_whitespace_and_parameters() {
        let uri = parse_data_uri("data:image/jpeg;name=a.jpg;base64,aGVs\n bG8=").unwrap();
        assert_eq!(uri.mime, "image/jpeg");
        assert_eq!(uri.payload, b"hello");
    }

    #[test]
    fn test_invalid_data_uri() {
        assert!(matches!(
            parse_data_uri("https://example.com/a.png"),
            Err(ConvertError::InvalidDataUri(_))
        ));
        assert!(matches!(
            parse_data_uri("data:image/png,rawtext"),
            Err(ConvertError::InvalidDataUri(_))
        ));
        assert!(matches!(
            parse_data_uri("data:image/png;base64,!!!"),
            Err(ConvertError::InvalidDataUri(_))
        ));
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("image/jpeg"), "jpeg");
        assert_eq!(extension_for_mime("application/octet-stream"), "png");
        assert_eq!(extension_for_mime("image/svg+xml"), "svg");
        assert_eq!(extension_for_mime("garbage"), "png");
    }

    #[test]
    fn test_content_type_for_extension() {
        assert_eq!(content_type_for_extension("PNG"), "image/png");
        assert_eq!(content_type_for_extension("jpeg"), "image/jpeg");
        assert_eq!(content_type_for_extension("xyz"), "application/octet-stream");
    }

    #[test]
    fn test_media_paths() {
        let media = MediaFile {
            id: 3,
            content: vec![],
            file_name: "image-3.gif".to_string(),
        };
        assert_eq!(media.target(), "media/image-3.gif");
        assert_eq!(media.part_path(), "word/media/image-3.gif");
        assert_eq!(media.extension(), "gif");
    }
}
