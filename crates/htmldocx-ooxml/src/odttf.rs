//! Obfuscated TrueType fonts
//!
//! Embedded fonts are stored as `.odttf` parts: the first 32 bytes of the
//! font are XORed with a key derived from a GUID, and the GUID is written to
//! the font table as `w:fontKey`. The rest of the file is stored unchanged.

use std::path::Path;

use uuid::Uuid;

use crate::error::{ConvertError, Result};

/// Number of leading bytes that are obfuscated
pub const OBFUSCATED_LENGTH: usize = 32;

/// sfnt version of TrueType outlines
const TRUETYPE_MAGIC: [u8; 4] = [0x00, 0x01, 0x00, 0x00];
/// sfnt version used by older Apple TrueType fonts
const APPLE_TRUETYPE_MAGIC: [u8; 4] = *b"true";

/// An obfuscated font ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct ObfuscatedFont {
    pub bytes: Vec<u8>,
    /// Braced upper-case GUID (`{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}`)
    pub font_key: String,
}

/// Key bytes for a GUID
///
/// The GUID fields are reordered as
/// `timeLow[0] ‖ node ‖ clockSeq ‖ timeHi ‖ timeMid ‖ timeLow[1..4]`.
pub fn guid_key(guid: &Uuid) -> [u8; 16] {
    let b = guid.as_bytes();
    let (time_low, time_mid, time_hi, clock_seq, node) =
        (&b[0..4], &b[4..6], &b[6..8], &b[8..10], &b[10..16]);

    let mut key = [0u8; 16];
    let ordered = std::iter::once(&time_low[0])
        .chain(node)
        .chain(clock_seq)
        .chain(time_hi)
        .chain(time_mid)
        .chain(&time_low[1..]);
    for (slot, byte) in key.iter_mut().zip(ordered) {
        *slot = *byte;
    }
    key
}

/// XOR the first 32 bytes of `font` with the GUID key repeated twice
pub fn obfuscate(font: &[u8], guid: &Uuid) -> Vec<u8> {
    let key = guid_key(guid);
    let mut out = font.to_vec();
    for (i, byte) in out.iter_mut().take(OBFUSCATED_LENGTH).enumerate() {
        *byte ^= key[i % key.len()];
    }
    out
}

/// Check for a raw TrueType sfnt header
pub fn is_truetype(font: &[u8]) -> bool {
    font.len() >= 4 && (font[..4] == TRUETYPE_MAGIC || font[..4] == APPLE_TRUETYPE_MAGIC)
}

/// Read a TrueType file and obfuscate it with a fresh GUID
pub fn obfuscate_font_file(path: &Path) -> Result<ObfuscatedFont> {
    let font = std::fs::read(path).map_err(|source| ConvertError::FontRead {
        path: path.to_path_buf(),
        source,
    })?;
    if !is_truetype(&font) {
        return Err(ConvertError::UnsupportedFontFormat(format!(
            "{} is not a TrueType font",
            path.display()
        )));
    }

    let guid = Uuid::new_v4();
    Ok(ObfuscatedFont {
        bytes: obfuscate(&font, &guid),
        font_key: format!("{{{}}}", guid.hyphenated()).to_uppercase(),
    })
}

/// Part file name for an embedded font (`Open Sans` -> `open_sans.odttf`)
pub fn font_file_name(name: &str) -> String {
    let stem: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("{}.odttf", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const GUID: &str = "09014A78-CABC-4EF0-12AC-5CD89AEFDE09";

    fn font(len: usize) -> Vec<u8> {
        let mut bytes = TRUETYPE_MAGIC.to_vec();
        bytes.extend((4..len).map(|i| (i % 251) as u8));
        bytes
    }

    #[test]
    fn test_guid_key_order() {
        let guid = Uuid::parse_str(GUID).unwrap();
        assert_eq!(
            guid_key(&guid),
            [
                0x09, 0x5C, 0xD8, 0x9A, 0xEF, 0xDE, 0x09, 0x12, 0xAC, 0x4E, 0xF0, 0xCA, 0xBC,
                0x01, 0x4A, 0x78
            ]
        );
    }

    #[test]
    fn test_obfuscate_only_touches_header() {
        let guid = Uuid::parse_str(GUID).unwrap();
        let original = font(100);
        let obfuscated = obfuscate(&original, &guid);
        assert_eq!(obfuscated.len(), original.len());
        assert_eq!(obfuscated[32..], original[32..]);
        assert_ne!(obfuscated[..32], original[..32]);

        let key = guid_key(&guid);
        for i in 0..32 {
            assert_eq!(obfuscated[i], original[i] ^ key[i % 16]);
        }
    }

    #[test]
    fn test_obfuscate_is_deterministic_and_reversible() {
        let guid = Uuid::parse_str(GUID).unwrap();
        let original = font(64);
        let once = obfuscate(&original, &guid);
        assert_eq!(once, obfuscate(&original, &guid));
        assert_eq!(obfuscate(&once, &guid), original);
    }

    #[test]
    fn test_short_font() {
        let guid = Uuid::parse_str(GUID).unwrap();
        let original = font(10);
        assert_eq!(obfuscate(&original, &guid).len(), 10);
    }

    #[test]
    fn test_font_file_name() {
        assert_eq!(font_file_name("Open Sans"), "open_sans.odttf");
        assert_eq!(font_file_name("Roboto"), "roboto.odttf");
    }

    #[test]
    fn test_obfuscate_font_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&font(80)).unwrap();
        let result = obfuscate_font_file(file.path()).unwrap();
        assert_eq!(result.bytes.len(), 80);
        assert_eq!(result.font_key.len(), 38);
        assert!(result.font_key.starts_with('{') && result.font_key.ends_with('}'));
        assert_eq!(result.font_key, result.font_key.to_uppercase());
    }

    #[test]
    fn test_rejects_non_truetype() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"wOFF0000rest-of-file").unwrap();
        assert!(matches!(
            obfuscate_font_file(file.path()),
            Err(ConvertError::UnsupportedFontFormat(_))
        ));
        assert!(is_truetype(b"true...."));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            obfuscate_font_file(Path::new("/nonexistent/font.ttf")),
            Err(ConvertError::FontRead { .. })
        ));
    }
}
