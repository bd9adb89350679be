//! Font table
//!
//! CSS `font-family` lists are reduced to the first concrete family name.
//! Generic keywords map to a common concrete font and every entry keeps a
//! generic classification, which `fontTable.xml` exposes as `w:family` so a
//! word processor can pick a fallback.

use crate::relationships::RelationshipId;
use crate::xml::{escape_xml, NS_R, NS_W, XML_DECLARATION};

/// Generic font classification (`w:family`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericFamily {
    /// Serif faces
    Roman,
    /// Sans-serif faces
    Swiss,
    /// Monospace faces
    Modern,
    /// Handwriting faces
    Script,
    /// Display faces
    Decorative,
    /// Unknown
    Auto,
}

impl GenericFamily {
    /// Classify a CSS generic keyword
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "serif" => Some(GenericFamily::Roman),
            "sans-serif" | "system-ui" | "ui-sans-serif" => Some(GenericFamily::Swiss),
            "monospace" | "ui-monospace" => Some(GenericFamily::Modern),
            "cursive" => Some(GenericFamily::Script),
            "fantasy" => Some(GenericFamily::Decorative),
            _ => None,
        }
    }

    /// Concrete font used when only a generic keyword is given
    pub fn fallback_font(self) -> &'static str {
        match self {
            GenericFamily::Roman | GenericFamily::Auto => "Times New Roman",
            GenericFamily::Swiss => "Arial",
            GenericFamily::Modern => "Courier New",
            GenericFamily::Script => "Comic Sans MS",
            GenericFamily::Decorative => "Impact",
        }
    }

    /// The `w:family` value
    pub fn as_ooxml(self) -> &'static str {
        match self {
            GenericFamily::Roman => "roman",
            GenericFamily::Swiss => "swiss",
            GenericFamily::Modern => "modern",
            GenericFamily::Script => "script",
            GenericFamily::Decorative => "decorative",
            GenericFamily::Auto => "auto",
        }
    }

    fn pitch(self) -> &'static str {
        match self {
            GenericFamily::Modern => "fixed",
            _ => "variable",
        }
    }
}

/// A font referenced by document content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontTableEntry {
    /// Concrete family name
    pub name: String,
    pub family: GenericFamily,
}

/// A font embedded as an obfuscated part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedFont {
    pub name: String,
    /// Relationship in the `fontTable` part
    pub rel_id: RelationshipId,
    /// Braced uppercase GUID used as the obfuscation key; `None` when the
    /// font was stored unobfuscated
    pub font_key: Option<String>,
}

/// Resolve a CSS `font-family` value to a font table entry
///
/// The first concrete family wins. When the list holds only generic
/// keywords, the first keyword's fallback font is used. An empty value
/// resolves to `default_font`.
pub fn resolve_font_family(font_family: &str, default_font: &str) -> FontTableEntry {
    let names: Vec<String> = font_family
        .split(',')
        .map(|name| name.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    let generic = names
        .iter()
        .find_map(|name| GenericFamily::from_keyword(&name.to_ascii_lowercase()));

    if let Some(concrete) = names
        .iter()
        .find(|name| GenericFamily::from_keyword(&name.to_ascii_lowercase()).is_none())
    {
        return FontTableEntry {
            name: concrete.clone(),
            family: generic.unwrap_or_else(|| guess_family(concrete)),
        };
    }

    match generic {
        Some(family) => FontTableEntry {
            name: family.fallback_font().to_string(),
            family,
        },
        None => FontTableEntry {
            name: default_font.to_string(),
            family: guess_family(default_font),
        },
    }
}

/// Classify well-known fonts when the CSS list carries no generic keyword
fn guess_family(name: &str) -> GenericFamily {
    let lower = name.to_ascii_lowercase();
    if lower.contains("mono") || lower.contains("courier") || lower.contains("consolas") {
        GenericFamily::Modern
    } else if lower.contains("times")
        || lower.contains("georgia")
        || lower.contains("garamond")
        || (lower.contains("serif") && !lower.contains("sans"))
    {
        GenericFamily::Roman
    } else if lower.contains("arial")
        || lower.contains("helvetica")
        || lower.contains("calibri")
        || lower.contains("verdana")
        || lower.contains("sans")
        || lower.contains("segoe")
    {
        GenericFamily::Swiss
    } else {
        GenericFamily::Auto
    }
}

/// Generate `fontTable.xml`
///
/// Entries are listed once per name in first-use order. Embedded fonts carry
/// an `embedRegular` reference to their obfuscated part.
pub fn font_table_xml(entries: &[FontTableEntry], embedded: &[EmbeddedFont]) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(&format!(
        r#"<w:fonts xmlns:w="{}" xmlns:r="{}">"#,
        NS_W, NS_R
    ));
    xml.push('\n');

    let mut seen: Vec<&str> = Vec::new();
    for entry in entries {
        if seen.contains(&entry.name.as_str()) {
            continue;
        }
        seen.push(&entry.name);
        let embed = embedded.iter().find(|f| f.name == entry.name);
        push_font(&mut xml, &entry.name, entry.family, embed);
    }
    for font in embedded {
        if seen.contains(&font.name.as_str()) {
            continue;
        }
        seen.push(&font.name);
        push_font(&mut xml, &font.name, guess_family(&font.name), Some(font));
    }

    xml.push_str("</w:fonts>");
    xml
}

fn push_font(xml: &mut String, name: &str, family: GenericFamily, embed: Option<&EmbeddedFont>) {
    xml.push_str(&format!(r#"  <w:font w:name="{}">"#, escape_xml(name)));
    xml.push_str(r#"<w:charset w:val="00"/>"#);
    xml.push_str(&format!(r#"<w:family w:val="{}"/>"#, family.as_ooxml()));
    xml.push_str(&format!(r#"<w:pitch w:val="{}"/>"#, family.pitch()));
    if let Some(font) = embed {
        match &font.font_key {
            Some(key) => xml.push_str(&format!(
                r#"<w:embedRegular r:id="{}" w:fontKey="{}"/>"#,
                font.rel_id, key
            )),
            None => xml.push_str(&format!(r#"<w:embedRegular r:id="{}"/>"#, font.rel_id)),
        }
    }
    xml.push_str("</w:font>\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_concrete_family_wins() {
        let entry = resolve_font_family("'Open Sans', Arial, sans-serif", "Times New Roman");
        assert_eq!(entry.name, "Open Sans");
        assert_eq!(entry.family, GenericFamily::Swiss);
    }

    #[test]
    fn test_generic_keyword_maps_to_concrete_font() {
        let entry = resolve_font_family("monospace", "Times New Roman");
        assert_eq!(entry.name, "Courier New");
        assert_eq!(entry.family, GenericFamily::Modern);

        let entry = resolve_font_family("serif", "Arial");
        assert_eq!(entry.name, "Times New Roman");
        assert_eq!(entry.family, GenericFamily::Roman);
    }

    #[test]
    fn test_empty_family_uses_default() {
        let entry = resolve_font_family("  ", "Calibri");
        assert_eq!(entry.name, "Calibri");
        assert_eq!(entry.family, GenericFamily::Swiss);
    }

    #[test]
    fn test_guess_family_without_keyword() {
        assert_eq!(
            resolve_font_family("Georgia", "Arial").family,
            GenericFamily::Roman
        );
        assert_eq!(
            resolve_font_family("\"Fira Mono\"", "Arial").family,
            GenericFamily::Modern
        );
    }

    #[test]
    fn test_font_table_deduplicates_and_embeds() {
        let entries = vec![
            resolve_font_family("Arial", "Arial"),
            resolve_font_family("Open Sans, sans-serif", "Arial"),
            resolve_font_family("Arial", "Arial"),
        ];
        let embedded = vec![EmbeddedFont {
            name: "Open Sans".to_string(),
            rel_id: RelationshipId::Named("OpenSans".to_string()),
            font_key: Some("{01234567-89AB-CDEF-0123-456789ABCDEF}".to_string()),
        }];
        let xml = font_table_xml(&entries, &embedded);
        assert_eq!(xml.matches(r#"w:name="Arial""#).count(), 1);
        assert!(xml.contains(r#"<w:embedRegular r:id="rIdOpenSans" w:fontKey="{01234567-89AB-CDEF-0123-456789ABCDEF}"/>"#));
        assert_eq!(xml.matches("<w:font ").count(), 2);
    }
}
