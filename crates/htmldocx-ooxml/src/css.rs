//! Typed CSS property values
//!
//! Each recognized property is parsed into a tagged variant with an explicit
//! per-unit-family parser. Anything outside the mapped subset is ignored by
//! callers, never treated as an error.

use std::sync::OnceLock;

use regex::Regex;

use crate::color;
use crate::units;

/// Base font size for `em`/`rem` resolution, in points
const EM_BASE_PT: f64 = 12.0;

fn length_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(-?\d*\.?\d+)\s*(px|pt|cm|mm|in|em|rem|%)?$").expect("valid length regex")
    })
}

/// A CSS length
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Px(f64),
    Pt(f64),
    Cm(f64),
    Mm(f64),
    In(f64),
    Em(f64),
    Percent(f64),
    Auto,
}

impl Length {
    /// Parse a length, returning `None` for anything unrecognized
    ///
    /// A bare number is taken as pixels.
    pub fn try_parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if value == "auto" {
            return Some(Length::Auto);
        }
        let caps = length_regex().captures(&value)?;
        let n: f64 = caps[1].parse().ok()?;
        Some(match caps.get(2).map(|m| m.as_str()) {
            None | Some("px") => Length::Px(n),
            Some("pt") => Length::Pt(n),
            Some("cm") => Length::Cm(n),
            Some("mm") => Length::Mm(n),
            Some("in") => Length::In(n),
            Some("em") | Some("rem") => Length::Em(n),
            Some("%") => Length::Percent(n),
            Some(_) => return None,
        })
    }

    /// Parse a length, falling back to a zero length
    pub fn parse(value: &str) -> Self {
        Self::try_parse(value).unwrap_or(Length::Px(0.0))
    }

    /// Convert an absolute length to TWIP
    ///
    /// Percentages and `auto` have no absolute size and return `None`.
    pub fn to_twip(self) -> Option<i64> {
        match self {
            Length::Px(n) => Some(units::pixel_to_twip(n)),
            Length::Pt(n) => Some(units::point_to_twip(n)),
            Length::Cm(n) => Some(units::cm_to_twip(n)),
            Length::Mm(n) => Some(units::cm_to_twip(n / 10.0)),
            Length::In(n) => Some(units::inch_to_twip(n)),
            Length::Em(n) => Some(units::point_to_twip(n * EM_BASE_PT)),
            Length::Percent(_) | Length::Auto => None,
        }
    }

    /// Convert to TWIP, resolving percentages against `base`
    pub fn to_twip_of(self, base: i64) -> Option<i64> {
        match self {
            Length::Percent(p) => Some((base as f64 * p / 100.0).round() as i64),
            other => other.to_twip(),
        }
    }

    /// Convert to CSS pixels, resolving percentages against `base_px`
    pub fn to_px_of(self, base_px: f64) -> Option<f64> {
        match self {
            Length::Px(n) => Some(n),
            Length::Percent(p) => Some(base_px * p / 100.0),
            Length::Auto => None,
            other => other.to_twip().map(|t| t as f64 / 15.0),
        }
    }

    /// Check if this length is `auto`
    pub fn is_auto(self) -> bool {
        matches!(self, Length::Auto)
    }

    /// Check if this is a strictly positive length
    pub fn is_positive(self) -> bool {
        match self {
            Length::Px(n)
            | Length::Pt(n)
            | Length::Cm(n)
            | Length::Mm(n)
            | Length::In(n)
            | Length::Em(n)
            | Length::Percent(n) => n > 0.0,
            Length::Auto => false,
        }
    }
}

/// Parse a `font-size` value into half-points
///
/// `em` and `%` are relative to `parent_hip`. Keywords map to the usual
/// browser sizes.
pub fn font_size_to_hip(value: &str, parent_hip: u32) -> Option<u32> {
    let keyword = match value.trim().to_ascii_lowercase().as_str() {
        "xx-small" => Some(7.0),
        "x-small" => Some(7.5),
        "small" => Some(10.0),
        "medium" => Some(12.0),
        "large" => Some(13.5),
        "x-large" => Some(18.0),
        "xx-large" => Some(24.0),
        _ => None,
    };
    if let Some(pt) = keyword {
        return Some(units::point_to_hip(pt));
    }

    match Length::try_parse(value)? {
        Length::Pt(n) => Some(units::point_to_hip(n)),
        Length::Px(n) => Some(units::pixel_to_hip(n)),
        Length::Em(n) => Some((parent_hip as f64 * n).round() as u32),
        Length::Percent(p) => Some((parent_hip as f64 * p / 100.0).round() as u32),
        Length::Cm(_) | Length::Mm(_) | Length::In(_) => {
            let twip = Length::try_parse(value)?.to_twip()?;
            Some(units::point_to_hip(units::twip_to_point(twip)))
        }
        Length::Auto => None,
    }
}

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Right,
    Center,
    Justify,
}

impl TextAlign {
    /// Parse a `text-align` value
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Some(TextAlign::Left),
            "right" | "end" => Some(TextAlign::Right),
            "center" => Some(TextAlign::Center),
            "justify" => Some(TextAlign::Justify),
            _ => None,
        }
    }

    /// The `w:jc` value
    pub fn as_ooxml(self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Right => "right",
            TextAlign::Center => "center",
            TextAlign::Justify => "both",
        }
    }
}

/// Run-level vertical alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertAlign {
    Subscript,
    Superscript,
}

impl VertAlign {
    /// Parse a `vertical-align` value as it applies to text runs
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sub" => Some(VertAlign::Subscript),
            "super" => Some(VertAlign::Superscript),
            _ => None,
        }
    }

    /// The `w:vertAlign` value
    pub fn as_ooxml(self) -> &'static str {
        match self {
            VertAlign::Subscript => "subscript",
            VertAlign::Superscript => "superscript",
        }
    }
}

/// Table cell vertical alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellAlign {
    Top,
    Center,
    Bottom,
}

impl CellAlign {
    /// Map the HTML `valign` attribute
    pub fn from_valign(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "top" | "baseline" => Some(CellAlign::Top),
            "middle" => Some(CellAlign::Center),
            "bottom" => Some(CellAlign::Bottom),
            _ => None,
        }
    }

    /// Map the CSS `vertical-align` property
    pub fn from_css(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "top" | "super" | "text-top" => Some(CellAlign::Top),
            "middle" | "center" | "inherit" => Some(CellAlign::Center),
            "bottom" | "baseline" | "sub" | "text-bottom" => Some(CellAlign::Bottom),
            _ => None,
        }
    }

    /// The `w:vAlign` value
    pub fn as_ooxml(self) -> &'static str {
        match self {
            CellAlign::Top => "top",
            CellAlign::Center => "center",
            CellAlign::Bottom => "bottom",
        }
    }
}

/// Parse `font-weight` into a bold flag
pub fn is_bold_weight(value: &str) -> Option<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "bold" | "bolder" => Some(true),
        "normal" | "lighter" => Some(false),
        _ => value.parse::<u32>().ok().map(|w| w >= 600),
    }
}

/// `display` values that matter for paragraph shading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Display {
    Block,
    Inline,
    Other(String),
}

impl Display {
    /// Parse a `display` value
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "block" => Display::Block,
            "inline" | "inline-block" => Display::Inline,
            other => Display::Other(other.to_string()),
        }
    }
}

/// Border line style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderStroke {
    Solid,
    Dashed,
    Dotted,
    Double,
    Groove,
    Ridge,
    Inset,
    Outset,
    None,
    Hidden,
}

impl BorderStroke {
    /// Parse a `border-style` keyword
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "solid" => Some(BorderStroke::Solid),
            "dashed" => Some(BorderStroke::Dashed),
            "dotted" => Some(BorderStroke::Dotted),
            "double" => Some(BorderStroke::Double),
            "groove" => Some(BorderStroke::Groove),
            "ridge" => Some(BorderStroke::Ridge),
            "inset" => Some(BorderStroke::Inset),
            "outset" => Some(BorderStroke::Outset),
            "none" => Some(BorderStroke::None),
            "hidden" => Some(BorderStroke::Hidden),
            _ => None,
        }
    }

    /// The `w:val` of a border element
    pub fn as_ooxml(self) -> &'static str {
        match self {
            BorderStroke::Solid => "single",
            BorderStroke::Dashed => "dashed",
            BorderStroke::Dotted => "dotted",
            BorderStroke::Double => "double",
            BorderStroke::Groove => "threeDEngrave",
            BorderStroke::Ridge => "threeDEmboss",
            BorderStroke::Inset => "inset",
            BorderStroke::Outset => "outset",
            BorderStroke::None | BorderStroke::Hidden => "none",
        }
    }

    /// Check whether this style draws nothing
    pub fn is_invisible(self) -> bool {
        matches!(self, BorderStroke::None | BorderStroke::Hidden)
    }
}

/// A border declaration, from `border` or `border-{side}` shorthand
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BorderDecl {
    /// Width in CSS pixels
    pub width: Option<f64>,
    pub stroke: Option<BorderStroke>,
    /// Resolved hex color
    pub color: Option<String>,
}

impl BorderDecl {
    /// Parse border shorthand such as `1px solid #ccc`
    ///
    /// Color functions may contain spaces, so they are lifted out before the
    /// remaining tokens are classified.
    pub fn parse(value: &str) -> Self {
        let mut decl = BorderDecl::default();
        let mut rest = value.trim().to_string();

        for func in ["rgba(", "rgb(", "hsla(", "hsl("] {
            if let Some(start) = rest.to_ascii_lowercase().find(func) {
                if let Some(len) = rest[start..].find(')') {
                    let color_fn = rest[start..=start + len].to_string();
                    decl.color = color::resolve_color(&color_fn);
                    rest.replace_range(start..=start + len, " ");
                }
            }
        }

        for token in rest.split_whitespace() {
            if let Some(stroke) = BorderStroke::parse(token) {
                decl.stroke = Some(stroke);
            } else if let Some(width) = parse_border_width(token) {
                decl.width = Some(width);
            } else if decl.color.is_none() {
                decl.color = color::resolve_color(token);
            }
        }
        decl
    }

    /// Check whether this declaration forces the border off
    pub fn is_suppressed(&self) -> bool {
        self.stroke.is_some_and(BorderStroke::is_invisible) || self.width == Some(0.0)
    }
}

/// Parse a `border-width` token into CSS pixels
pub fn parse_border_width(value: &str) -> Option<f64> {
    match value.trim().to_ascii_lowercase().as_str() {
        "thin" => return Some(1.0),
        "medium" => return Some(3.0),
        "thick" => return Some(5.0),
        _ => {}
    }
    match Length::try_parse(value)? {
        Length::Px(n) => Some(n),
        Length::Pt(n) => Some(n / 0.75),
        Length::Em(n) => Some(n * 16.0),
        Length::Auto | Length::Percent(_) => None,
        other => other.to_twip().map(|t| t as f64 / 15.0),
    }
}

/// Four box sides, in CSS order
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoxSides<T> {
    pub top: T,
    pub right: T,
    pub bottom: T,
    pub left: T,
}

impl BoxSides<Option<Length>> {
    /// Parse 1-, 2-, 3- or 4-value shorthand (`margin`, `padding`)
    pub fn parse_shorthand(value: &str) -> Self {
        let parts: Vec<Option<Length>> = value.split_whitespace().map(Length::try_parse).collect();
        match parts.as_slice() {
            [all] => BoxSides {
                top: *all,
                right: *all,
                bottom: *all,
                left: *all,
            },
            [v, h] => BoxSides {
                top: *v,
                right: *h,
                bottom: *v,
                left: *h,
            },
            [t, h, b] => BoxSides {
                top: *t,
                right: *h,
                bottom: *b,
                left: *h,
            },
            [t, r, b, l, ..] => BoxSides {
                top: *t,
                right: *r,
                bottom: *b,
                left: *l,
            },
            [] => BoxSides::default(),
        }
    }
}

/// Background fill
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    /// A solid color
    Solid(String),
    /// A gradient, reduced to its first color stop
    Gradient(String),
}

impl Background {
    /// Parse `background`, `background-color` or `background-image`
    ///
    /// Colorless values (`transparent`, `inherit`, ...) yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() || color::is_colorless(trimmed) {
            return None;
        }
        let lower = trimmed.to_ascii_lowercase();
        if let Some(start) = lower.find("linear-gradient(") {
            let inner = &trimmed[start + "linear-gradient(".len()..];
            return first_gradient_stop(inner).map(Background::Gradient);
        }
        if lower.starts_with("url(") {
            return None;
        }
        color::resolve_color(trimmed)
            .or_else(|| {
                // `background: #fff url(...) no-repeat` carries the color first
                trimmed.split_whitespace().find_map(color::resolve_color)
            })
            .map(Background::Solid)
    }

    /// The hex fill color
    pub fn fill(&self) -> &str {
        match self {
            Background::Solid(c) | Background::Gradient(c) => c,
        }
    }
}

fn first_gradient_stop(args: &str) -> Option<String> {
    // Split top-level arguments so rgb(...) commas are kept together
    let mut depth = 0usize;
    let mut start = 0;
    let mut args_list = Vec::new();
    for (i, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => {
                args_list.push(&args[start..i]);
                break;
            }
            ')' => depth -= 1,
            ',' if depth == 0 => {
                args_list.push(&args[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    args_list.into_iter().find_map(|arg| {
        let arg = arg.trim();
        color::resolve_color(arg).or_else(|| {
            // A stop may carry a position: `#fff 20%`
            arg.rsplit_once(' ')
                .and_then(|(color, _)| color::resolve_color(color))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_parse() {
        assert_eq!(Length::try_parse("12px"), Some(Length::Px(12.0)));
        assert_eq!(Length::try_parse("1.5pt"), Some(Length::Pt(1.5)));
        assert_eq!(Length::try_parse("50%"), Some(Length::Percent(50.0)));
        assert_eq!(Length::try_parse("auto"), Some(Length::Auto));
        assert_eq!(Length::try_parse("10"), Some(Length::Px(10.0)));
        assert_eq!(Length::try_parse("wide"), None);
        assert_eq!(Length::parse("wide"), Length::Px(0.0));
    }

    #[test]
    fn test_length_to_twip() {
        assert_eq!(Length::Px(96.0).to_twip(), Some(1440));
        assert_eq!(Length::In(1.0).to_twip(), Some(1440));
        assert_eq!(Length::Cm(2.54).to_twip(), Some(1440));
        assert_eq!(Length::Percent(50.0).to_twip(), None);
        assert_eq!(Length::Percent(50.0).to_twip_of(9000), Some(4500));
    }

    #[test]
    fn test_font_size_to_hip() {
        assert_eq!(font_size_to_hip("12pt", 24), Some(24));
        assert_eq!(font_size_to_hip("16px", 24), Some(24));
        assert_eq!(font_size_to_hip("2em", 24), Some(48));
        assert_eq!(font_size_to_hip("50%", 24), Some(12));
        assert_eq!(font_size_to_hip("medium", 20), Some(24));
        assert_eq!(font_size_to_hip("huge", 24), None);
    }

    #[test]
    fn test_text_align() {
        assert_eq!(TextAlign::parse("justify").map(TextAlign::as_ooxml), Some("both"));
        assert_eq!(TextAlign::parse("CENTER"), Some(TextAlign::Center));
        assert_eq!(TextAlign::parse("inherit"), None);
    }

    #[test]
    fn test_cell_align_tables() {
        assert_eq!(CellAlign::from_valign("middle"), Some(CellAlign::Center));
        assert_eq!(CellAlign::from_valign("baseline"), Some(CellAlign::Top));
        assert_eq!(CellAlign::from_css("baseline"), Some(CellAlign::Bottom));
        assert_eq!(CellAlign::from_css("text-top"), Some(CellAlign::Top));
        assert_eq!(CellAlign::from_css("sideways"), None);
    }

    #[test]
    fn test_bold_weight() {
        assert_eq!(is_bold_weight("bold"), Some(true));
        assert_eq!(is_bold_weight("700"), Some(true));
        assert_eq!(is_bold_weight("400"), Some(false));
        assert_eq!(is_bold_weight("heavy"), None);
    }

    #[test]
    fn test_border_shorthand() {
        let decl = BorderDecl::parse("2px dashed rgb(255, 0, 0)");
        assert_eq!(decl.width, Some(2.0));
        assert_eq!(decl.stroke, Some(BorderStroke::Dashed));
        assert_eq!(decl.color.as_deref(), Some("FF0000"));

        let decl = BorderDecl::parse("thin solid navy");
        assert_eq!(decl.width, Some(1.0));
        assert_eq!(decl.color.as_deref(), Some("000080"));
    }

    #[test]
    fn test_border_suppression() {
        assert!(BorderDecl::parse("hidden").is_suppressed());
        assert!(BorderDecl::parse("0 solid black").is_suppressed());
        assert!(!BorderDecl::parse("1px solid black").is_suppressed());
    }

    #[test]
    fn test_box_shorthand() {
        let sides = BoxSides::parse_shorthand("1px 2px");
        assert_eq!(sides.top, Some(Length::Px(1.0)));
        assert_eq!(sides.right, Some(Length::Px(2.0)));
        assert_eq!(sides.bottom, Some(Length::Px(1.0)));
        assert_eq!(sides.left, Some(Length::Px(2.0)));

        let sides = BoxSides::parse_shorthand("1px 2px 3px 4px");
        assert_eq!(sides.left, Some(Length::Px(4.0)));

        let sides = BoxSides::parse_shorthand("0 auto");
        assert_eq!(sides.left, Some(Length::Auto));
    }

    #[test]
    fn test_background() {
        assert_eq!(
            Background::parse("#ff0000"),
            Some(Background::Solid("FF0000".to_string()))
        );
        assert_eq!(
            Background::parse("linear-gradient(to right, rgb(0, 0, 255) 0%, white 100%)"),
            Some(Background::Gradient("0000FF".to_string()))
        );
        assert_eq!(Background::parse("transparent"), None);
        assert_eq!(Background::parse("url(a.png)"), None);
    }
}
