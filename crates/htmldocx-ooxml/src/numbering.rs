//! Numbering definitions
//!
//! Every list instance gets its own `w:abstractNum`/`w:num` pair with all
//! eight levels populated up front. Nested lists register their own
//! definitions, so a level is only ever used by the list that owns it.

use htmldocx_dom::Element;

use crate::color;
use crate::css;
use crate::xml::{escape_xml, NS_W, XML_DECLARATION};

/// Levels per numbering definition
pub const LEVEL_COUNT: u8 = 8;

/// Per-level default bullet glyphs
pub const DEFAULT_BULLETS: [&str; LEVEL_COUNT as usize] = [
    "\u{F0B7}", "\u{F0B7}", "\u{25E6}", "\u{25AA}", "\u{25AB}", "\u{2713}", "\u{25B8}", "\u{2192}",
];

/// Bullet used when nothing else resolves
pub const LITERAL_BULLET: &str = "\u{2022}";

/// Glyphs that render through the Symbol font
const SYMBOL_BULLETS: &[&str] = &[
    "\u{2022}", "\u{25CB}", "\u{25A0}", "\u{25A1}", "\u{25CA}", "\u{25AA}", "\u{25AB}", "\u{25E6}",
    "\u{F0B7}",
];

/// Indentation step per level, in TWIP
const LEVEL_INDENT: i64 = 480;
/// Hanging indent of the number/bullet, in TWIP
const HANGING_INDENT: i64 = 260;

/// Ordered or unordered list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Ordered,
    Unordered,
}

impl ListKind {
    /// Map a list tag (`ol`/`ul`)
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ol" => Some(ListKind::Ordered),
            "ul" => Some(ListKind::Unordered),
            _ => None,
        }
    }
}

/// Number format of a level (`w:numFmt`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    Decimal,
    UpperRoman,
    LowerRoman,
    UpperLetter,
    LowerLetter,
    Bullet,
}

impl NumberFormat {
    /// Map CSS `list-style-type`; unresolved values give `decimal`
    pub fn from_list_style_type(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("upper-roman") => NumberFormat::UpperRoman,
            Some("lower-roman") => NumberFormat::LowerRoman,
            Some("upper-alpha") | Some("upper-latin") | Some("upper-alpha-bracket-end") => {
                NumberFormat::UpperLetter
            }
            Some("lower-alpha") | Some("lower-latin") | Some("lower-alpha-bracket-end") => {
                NumberFormat::LowerLetter
            }
            _ => NumberFormat::Decimal,
        }
    }

    /// The `w:numFmt` value
    pub fn as_ooxml(self) -> &'static str {
        match self {
            NumberFormat::Decimal => "decimal",
            NumberFormat::UpperRoman => "upperRoman",
            NumberFormat::LowerRoman => "lowerRoman",
            NumberFormat::UpperLetter => "upperLetter",
            NumberFormat::LowerLetter => "lowerLetter",
            NumberFormat::Bullet => "bullet",
        }
    }
}

/// List-level settings read from a list (or item) element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListProperties {
    /// Explicit start value (`data-start`, then `start`)
    pub start: Option<u32>,
    /// CSS `list-style-type`
    pub list_style_type: Option<String>,
    /// `data-bullet-style` attribute
    pub bullet_style: Option<String>,
    /// `data-bullet-font` attribute
    pub bullet_font: Option<String>,
    /// Resolved hex color for numbers/bullets
    pub color: Option<String>,
    /// Number/bullet size in half-points
    pub font_size: Option<u32>,
}

impl ListProperties {
    /// Read list settings from an element
    pub fn from_element(element: &Element, parent_font_size: u32) -> Self {
        let start = element
            .attr("data-start")
            .or_else(|| element.attr("start"))
            .and_then(|s| s.trim().parse().ok());
        let color = element
            .attr("data-primary-colour")
            .or_else(|| element.css("color"))
            .filter(|c| !color::is_colorless(c))
            .and_then(color::resolve_color);
        let font_size = element
            .css("font-size")
            .and_then(|v| css::font_size_to_hip(v, parent_font_size));

        Self {
            start,
            list_style_type: element.css("list-style-type").map(str::to_string),
            bullet_style: element.attr("data-bullet-style").map(str::to_string),
            bullet_font: element.attr("data-bullet-font").map(str::to_string),
            color,
            font_size,
        }
    }

    /// Explicitly declared custom bullet, if any
    pub fn custom_bullet(&self) -> Option<String> {
        self.list_style_type
            .as_deref()
            .and_then(custom_bullet_char)
            .or_else(|| self.bullet_style.as_deref().and_then(custom_bullet_char))
    }
}

/// One level of a numbering definition
#[derive(Debug, Clone, PartialEq)]
pub struct NumberingLevel {
    pub level: u8,
    pub start: u32,
    pub format: NumberFormat,
    /// `w:lvlText` template (`%1.`) or bullet glyph
    pub text: String,
    /// Font for the bullet glyph (unordered lists only)
    pub font: Option<String>,
    /// Left indent in TWIP
    pub indent: i64,
    /// Hanging indent in TWIP
    pub hanging: i64,
}

/// A numbering definition covering eight levels
#[derive(Debug, Clone, PartialEq)]
pub struct NumberingDefinition {
    pub id: u32,
    pub kind: ListKind,
    pub levels: Vec<NumberingLevel>,
    pub color: Option<String>,
    pub font_size: Option<u32>,
}

impl NumberingDefinition {
    /// Build a definition with all levels populated
    pub fn new(id: u32, kind: ListKind, properties: &ListProperties, default_font: &str) -> Self {
        let custom_bullet = properties.custom_bullet();
        let levels = (0..LEVEL_COUNT)
            .map(|level| {
                let indent = (level as i64 + 1) * LEVEL_INDENT;
                match kind {
                    ListKind::Ordered => NumberingLevel {
                        level,
                        start: properties.start.unwrap_or(1),
                        format: NumberFormat::from_list_style_type(
                            properties.list_style_type.as_deref(),
                        ),
                        text: level_text(properties.list_style_type.as_deref(), level),
                        font: None,
                        indent,
                        hanging: HANGING_INDENT,
                    },
                    ListKind::Unordered => {
                        let bullet = custom_bullet
                            .clone()
                            .or_else(|| DEFAULT_BULLETS.get(level as usize).map(|b| b.to_string()))
                            .unwrap_or_else(|| LITERAL_BULLET.to_string());
                        let font = bullet_font(
                            &bullet,
                            properties.bullet_font.as_deref().unwrap_or(default_font),
                        );
                        NumberingLevel {
                            level,
                            start: 1,
                            format: NumberFormat::Bullet,
                            text: bullet,
                            font: Some(font),
                            indent,
                            hanging: HANGING_INDENT,
                        }
                    }
                }
            })
            .collect();

        Self {
            id,
            kind,
            levels,
            color: properties.color.clone(),
            font_size: properties.font_size,
        }
    }
}

/// Level text template for ordered lists
fn level_text(list_style_type: Option<&str>, level: u8) -> String {
    let n = level + 1;
    match list_style_type.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some(t) if t.ends_with("-bracket-end") => format!("%{})", n),
        Some("decimal-bracket") => format!("(%{})", n),
        _ => format!("%{}.", n),
    }
}

/// Extract a custom bullet from a `list-style-type` or `data-bullet-style` value
///
/// Named styles map to glyphs, quoted strings yield their content, and a
/// single glyph or emoji is used as-is.
pub fn custom_bullet_char(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.to_ascii_lowercase().as_str() {
        "disc" => return Some("\u{2022}".to_string()),
        "circle" => return Some("\u{25CB}".to_string()),
        "square" => return Some("\u{25A0}".to_string()),
        "none" => return Some(" ".to_string()),
        _ => {}
    }

    let bytes = value.as_bytes();
    if value.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[value.len() - 1] == bytes[0]
    {
        return Some(value[1..value.len() - 1].to_string());
    }

    if value.chars().count() == 1 || value.chars().any(is_pictographic) {
        return Some(value.to_string());
    }
    None
}

/// Font for a bullet glyph
///
/// Standard bullet shapes render through Symbol, pictographs through
/// Segoe UI Emoji, anything else through the surrounding text font.
pub fn bullet_font(bullet: &str, text_font: &str) -> String {
    if SYMBOL_BULLETS.contains(&bullet) {
        "Symbol".to_string()
    } else if bullet.chars().any(is_pictographic) {
        "Segoe UI Emoji".to_string()
    } else {
        text_font.to_string()
    }
}

fn is_pictographic(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF | 0x2600..=0x26FF | 0x2705 | 0x2714 | 0x2716 | 0x2728 | 0x2764 | 0x2B50 | 0x2B55
    )
}

/// Generate `numbering.xml`
pub fn numbering_xml(definitions: &[NumberingDefinition]) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(&format!(r#"<w:numbering xmlns:w="{}">"#, NS_W));
    xml.push('\n');

    for def in definitions {
        xml.push_str(&format!(r#"  <w:abstractNum w:abstractNumId="{}">"#, def.id));
        xml.push_str(r#"<w:multiLevelType w:val="hybridMultilevel"/>"#);
        for level in &def.levels {
            push_level(&mut xml, def, level);
        }
        xml.push_str("</w:abstractNum>\n");
    }

    for def in definitions {
        xml.push_str(&format!(
            r#"  <w:num w:numId="{0}"><w:abstractNumId w:val="{0}"/></w:num>"#,
            def.id
        ));
        xml.push('\n');
    }

    xml.push_str("</w:numbering>");
    xml
}

fn push_level(xml: &mut String, def: &NumberingDefinition, level: &NumberingLevel) {
    xml.push_str(&format!(r#"<w:lvl w:ilvl="{}">"#, level.level));
    xml.push_str(&format!(r#"<w:start w:val="{}"/>"#, level.start));
    xml.push_str(&format!(r#"<w:numFmt w:val="{}"/>"#, level.format.as_ooxml()));
    xml.push_str(&format!(r#"<w:lvlText w:val="{}"/>"#, escape_xml(&level.text)));
    xml.push_str(r#"<w:lvlJc w:val="left"/>"#);
    xml.push_str(&format!(
        r#"<w:pPr><w:tabs><w:tab w:val="num" w:pos="{0}"/></w:tabs><w:ind w:left="{0}" w:hanging="{1}"/></w:pPr>"#,
        level.indent, level.hanging
    ));

    let mut rpr = String::new();
    if let Some(font) = &level.font {
        let font = escape_xml(font);
        rpr.push_str(&format!(
            r#"<w:rFonts w:ascii="{0}" w:hAnsi="{0}" w:hint="default"/>"#,
            font
        ));
    }
    if let Some(color) = &def.color {
        rpr.push_str(&format!(r#"<w:color w:val="{}"/>"#, color));
    }
    if let Some(size) = def.font_size {
        rpr.push_str(&format!(r#"<w:sz w:val="{}"/>"#, size));
    }
    if !rpr.is_empty() {
        xml.push_str("<w:rPr>");
        xml.push_str(&rpr);
        xml.push_str("</w:rPr>");
    }
    xml.push_str("</w:lvl>");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> ListProperties {
        ListProperties::default()
    }

    #[test]
    fn test_eight_levels_are_populated() {
        let def = NumberingDefinition::new(1, ListKind::Unordered, &props(), "Arial");
        assert_eq!(def.levels.len(), 8);
        assert_eq!(def.levels[0].text, "\u{F0B7}");
        assert_eq!(def.levels[2].text, "\u{25E6}");
        assert_eq!(def.levels[0].font.as_deref(), Some("Symbol"));
        assert_eq!(def.levels[7].indent, 8 * 480);
    }

    #[test]
    fn test_ordered_format_and_text() {
        let properties = ListProperties {
            list_style_type: Some("upper-roman".to_string()),
            start: Some(4),
            ..props()
        };
        let def = NumberingDefinition::new(2, ListKind::Ordered, &properties, "Arial");
        assert_eq!(def.levels[0].format, NumberFormat::UpperRoman);
        assert_eq!(def.levels[0].start, 4);
        assert_eq!(def.levels[1].text, "%2.");
    }

    #[test]
    fn test_bracket_suffixes() {
        assert_eq!(level_text(Some("lower-alpha-bracket-end"), 0), "%1)");
        assert_eq!(level_text(Some("decimal-bracket"), 2), "(%3)");
        assert_eq!(
            NumberFormat::from_list_style_type(Some("lower-alpha-bracket-end")),
            NumberFormat::LowerLetter
        );
        assert_eq!(
            NumberFormat::from_list_style_type(Some("armenian")),
            NumberFormat::Decimal
        );
    }

    #[test]
    fn test_custom_bullet_chars() {
        assert_eq!(custom_bullet_char("square").as_deref(), Some("\u{25A0}"));
        assert_eq!(custom_bullet_char("'→'").as_deref(), Some("→"));
        assert_eq!(custom_bullet_char("\"-\"").as_deref(), Some("-"));
        assert_eq!(custom_bullet_char("★").as_deref(), Some("★"));
        assert_eq!(custom_bullet_char("🚀").as_deref(), Some("🚀"));
        assert_eq!(custom_bullet_char("decimal"), None);
    }

    #[test]
    fn test_custom_bullet_overrides_level_table() {
        let properties = ListProperties {
            bullet_style: Some("'»'".to_string()),
            bullet_font: Some("Calibri".to_string()),
            ..props()
        };
        let def = NumberingDefinition::new(3, ListKind::Unordered, &properties, "Arial");
        assert!(def.levels.iter().all(|l| l.text == "»"));
        assert_eq!(def.levels[0].font.as_deref(), Some("Calibri"));
    }

    #[test]
    fn test_bullet_fonts() {
        assert_eq!(bullet_font("\u{2022}", "Arial"), "Symbol");
        assert_eq!(bullet_font("🚀", "Arial"), "Segoe UI Emoji");
        assert_eq!(bullet_font("\u{2713}", "Arial"), "Arial");
    }

    #[test]
    fn test_numbering_xml() {
        let properties = ListProperties {
            color: Some("FF0000".to_string()),
            font_size: Some(20),
            ..props()
        };
        let defs = vec![
            NumberingDefinition::new(1, ListKind::Unordered, &properties, "Arial"),
            NumberingDefinition::new(2, ListKind::Ordered, &props(), "Arial"),
        ];
        let xml = numbering_xml(&defs);
        assert_eq!(xml.matches("<w:abstractNum ").count(), 2);
        assert_eq!(xml.matches("<w:lvl ").count(), 16);
        assert!(xml.contains(r#"<w:num w:numId="2"><w:abstractNumId w:val="2"/></w:num>"#));
        assert!(xml.contains(r#"<w:color w:val="FF0000"/>"#));
        assert!(xml.contains(r#"<w:sz w:val="20"/>"#));
        assert!(xml.contains(r#"<w:ind w:left="480" w:hanging="260"/>"#));
        // Abstract definitions precede the num instances
        assert!(xml.find("<w:abstractNum ").unwrap() < xml.find("<w:num ").unwrap());
    }
}
