//! Style cascade
//!
//! A [`StyleBag`] is the resolved formatting for one point of a descent
//! through the tree. Each element's bag starts as a copy of its parent's and
//! its own declarations (inline style, utility classes, tag semantics) are
//! applied on top. Values that do not parse are ignored.

use std::sync::OnceLock;

use htmldocx_dom::Element;
use regex::Regex;

use crate::color;
use crate::context::DocumentContext;
use crate::css::{self, Background, BorderDecl, BoxSides, Display, Length, TextAlign, VertAlign};
use crate::units;

/// Left indent applied to block quotes, in TWIP
pub const BLOCKQUOTE_INDENT: i64 = 284;
/// Font used for preformatted text
pub const PREFORMATTED_FONT: &str = "Courier";

/// Line spacing rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRule {
    /// Multiple of single spacing (240 = single)
    Auto,
    /// Minimum height in TWIP
    AtLeast,
    /// Fixed height in TWIP
    Exact,
}

impl LineRule {
    /// The `w:lineRule` value
    pub fn as_ooxml(self) -> &'static str {
        match self {
            LineRule::Auto => "auto",
            LineRule::AtLeast => "atLeast",
            LineRule::Exact => "exact",
        }
    }
}

/// Resolved `line-height`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpacing {
    pub line: i64,
    pub rule: LineRule,
}

impl LineSpacing {
    /// Parse `line-height` against a font size in half-points
    pub fn parse(value: &str, font_size: u32) -> Option<Self> {
        let value = value.trim();
        if let Ok(factor) = value.parse::<f64>() {
            // Unitless: a multiple of the font size
            let hip = (factor * font_size as f64).round() as u32;
            return Some(LineSpacing {
                line: units::hip_to_twip(hip),
                rule: LineRule::AtLeast,
            });
        }
        match Length::try_parse(value)? {
            Length::Percent(p) => Some(LineSpacing {
                line: (p / 100.0 * 240.0).round() as i64,
                rule: LineRule::Auto,
            }),
            Length::Auto => None,
            length => length.to_twip().map(|line| LineSpacing {
                line,
                rule: LineRule::Exact,
            }),
        }
    }
}

/// Numbering reference of a list paragraph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberingRef {
    pub level: usize,
    pub num_id: u32,
}

/// Resolved formatting for one element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleBag {
    pub font: Option<String>,
    /// Half-points
    pub font_size: Option<u32>,
    pub color: Option<String>,
    /// Shading fill
    pub background: Option<String>,
    pub highlight: Option<&'static str>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    pub vert_align: Option<VertAlign>,
    pub text_align: Option<TextAlign>,
    pub line_spacing: Option<LineSpacing>,
    /// TWIP
    pub spacing_before: Option<i64>,
    /// TWIP
    pub spacing_after: Option<i64>,
    /// TWIP
    pub indent_left: Option<i64>,
    /// TWIP
    pub indent_right: Option<i64>,
    pub display: Option<Display>,
    pub border: Option<BorderDecl>,
    /// Runs are inside a hyperlink
    pub hyperlink: bool,
    /// Named paragraph style (`Heading1`..)
    pub paragraph_style: Option<String>,
    pub numbering: Option<NumberingRef>,
    /// Keep whitespace and line breaks as written
    pub preserve_whitespace: bool,
}

impl StyleBag {
    /// Resolve `element` on top of this bag
    ///
    /// Paragraph-only tag semantics (block quotes) apply when
    /// `is_paragraph` is set.
    pub fn cascade(
        &self,
        ctx: &mut DocumentContext,
        element: &Element,
        is_paragraph: bool,
    ) -> StyleBag {
        let mut bag = self.clone();
        bag.apply_tag(ctx, element, is_paragraph);
        bag.apply_classes(element);
        bag.apply_style(ctx, element);
        bag
    }

    /// Effective font size in half-points
    pub fn effective_font_size(&self, ctx: &DocumentContext) -> u32 {
        self.font_size.unwrap_or(ctx.defaults.font_size)
    }

    /// Check whether the paragraph is shaded as a block
    pub fn is_block(&self) -> bool {
        self.display == Some(Display::Block)
    }

    /// Copy of the bag for content nested in a block container
    ///
    /// Box properties stay with the container; text properties cascade.
    pub fn without_box(mut self) -> StyleBag {
        self.background = None;
        self.border = None;
        self.display = None;
        self.indent_left = None;
        self.indent_right = None;
        self.spacing_before = None;
        self.spacing_after = None;
        self.paragraph_style = None;
        self
    }

    /// Check whether any spacing was declared explicitly
    pub fn has_explicit_spacing(&self) -> bool {
        self.line_spacing.is_some() || self.spacing_before.is_some() || self.spacing_after.is_some()
    }

    fn apply_tag(&mut self, ctx: &mut DocumentContext, element: &Element, is_paragraph: bool) {
        match element.tag.as_str() {
            "b" | "strong" | "th" => self.bold = true,
            "i" | "em" | "cite" | "var" | "dfn" => self.italic = true,
            "u" | "ins" => self.underline = true,
            "s" | "strike" | "del" => self.strike = true,
            "sub" => self.vert_align = Some(VertAlign::Subscript),
            "sup" => self.vert_align = Some(VertAlign::Superscript),
            "mark" => self.highlight = Some("yellow"),
            "code" | "kbd" | "samp" => self.highlight = Some("lightGray"),
            "pre" => {
                self.font = Some(ctx.register_font(PREFORMATTED_FONT));
                self.preserve_whitespace = true;
            }
            "small" => {
                let size = self.effective_font_size(ctx);
                self.font_size = Some((size as f64 * 0.8333).round() as u32);
            }
            "blockquote" if is_paragraph => {
                self.indent_left = Some(BLOCKQUOTE_INDENT);
                self.text_align = Some(TextAlign::Justify);
            }
            tag @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6") if is_paragraph => {
                self.paragraph_style = Some(format!("Heading{}", &tag[1..]));
            }
            _ => {}
        }
    }

    fn apply_classes(&mut self, element: &Element) {
        static SPACING_CLASS: OnceLock<Regex> = OnceLock::new();
        let re = SPACING_CLASS
            .get_or_init(|| Regex::new(r"^m([tb])-(\d+)$").expect("valid spacing class regex"));

        for class in element.classes() {
            if let Some(caps) = re.captures(class) {
                let steps: f64 = caps[2].parse().unwrap_or(0.0);
                let twip = units::pixel_to_twip(steps * 4.0);
                match &caps[1] {
                    "t" => self.spacing_before = Some(twip),
                    _ => self.spacing_after = Some(twip),
                }
            }
        }
    }

    fn apply_style(&mut self, ctx: &mut DocumentContext, element: &Element) {
        let style = &element.style;

        if let Some(family) = style.get("font-family") {
            self.font = Some(ctx.register_font(family));
        }
        if let Some(size) = style.get("font-size") {
            let parent = self.effective_font_size(ctx);
            if let Some(hip) = css::font_size_to_hip(size, parent) {
                self.font_size = Some(hip);
            }
        }
        if let Some(value) = style.get("color") {
            if !color::is_colorless(value) {
                if let Some(c) = color::resolve_color(value) {
                    self.color = Some(c);
                }
            }
        }
        let background = style
            .get("background-color")
            .or_else(|| style.get("background"))
            .or_else(|| style.get("background-image"));
        if let Some(fill) = background.and_then(Background::parse) {
            self.background = Some(fill.fill().to_string());
        }
        if let Some(bold) = style.get("font-weight").and_then(css::is_bold_weight) {
            self.bold = bold;
        }
        if let Some(font_style) = style.get("font-style") {
            match font_style.trim().to_ascii_lowercase().as_str() {
                "italic" | "oblique" => self.italic = true,
                "normal" => self.italic = false,
                _ => {}
            }
        }
        let decoration = style
            .get("text-decoration")
            .or_else(|| style.get("text-decoration-line"));
        if let Some(decoration) = decoration {
            let decoration = decoration.to_ascii_lowercase();
            if decoration.contains("none") {
                self.underline = false;
                self.strike = false;
            }
            if decoration.contains("underline") {
                self.underline = true;
            }
            if decoration.contains("line-through") {
                self.strike = true;
            }
        }
        if let Some(value) = style.get("vertical-align") {
            match VertAlign::parse(value) {
                Some(v) => self.vert_align = Some(v),
                None if value.trim() == "baseline" => self.vert_align = None,
                None => {}
            }
        }
        if let Some(align) = style.get("text-align").and_then(TextAlign::parse) {
            self.text_align = Some(align);
        }
        if let Some(value) = style.get("line-height") {
            let size = self.effective_font_size(ctx);
            if let Some(spacing) = LineSpacing::parse(value, size) {
                self.line_spacing = Some(spacing);
            }
        }

        let margin = style
            .get("margin")
            .map(BoxSides::parse_shorthand)
            .unwrap_or_default();
        let padding = style
            .get("padding")
            .map(BoxSides::parse_shorthand)
            .unwrap_or_default();
        let side = |name: &str, shorthand: Option<Length>| {
            style.get(name).and_then(Length::try_parse).or(shorthand)
        };

        if let Some(twip) = side("margin-top", margin.top).and_then(Length::to_twip) {
            self.spacing_before = Some(twip);
        }
        if let Some(twip) = side("margin-bottom", margin.bottom).and_then(Length::to_twip) {
            self.spacing_after = Some(twip);
        }

        let content_width = ctx.content_width();
        let left = side("margin-left", margin.left)
            .filter(|l| !l.is_auto())
            .or_else(|| side("padding-left", padding.left));
        if let Some(twip) = left.and_then(|l| l.to_twip_of(content_width)) {
            self.indent_left = Some(twip);
        }
        let right = side("margin-right", margin.right)
            .filter(|l| !l.is_auto())
            .or_else(|| side("padding-right", padding.right));
        if let Some(twip) = right.and_then(|l| l.to_twip_of(content_width)) {
            self.indent_right = Some(twip);
        }

        if let Some(value) = style.get("white-space") {
            self.preserve_whitespace = value.trim().starts_with("pre");
        }
        if let Some(display) = style.get("display") {
            self.display = Some(Display::parse(display));
        }
        if let Some(border) = style.get("border") {
            let decl = BorderDecl::parse(border);
            self.border = if decl.is_suppressed() {
                None
            } else {
                Some(decl)
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DocumentOptions;

    fn context() -> DocumentContext {
        DocumentContext::new(&DocumentOptions::default()).unwrap()
    }

    #[test]
    fn test_own_declarations_override_inherited() {
        let mut ctx = context();
        let parent = StyleBag {
            color: Some("FF0000".to_string()),
            bold: true,
            ..Default::default()
        };
        let element = Element::new("span")
            .with_style("color", "#00f")
            .with_style("font-weight", "normal");
        let bag = parent.cascade(&mut ctx, &element, false);
        assert_eq!(bag.color.as_deref(), Some("0000FF"));
        assert!(!bag.bold);
    }

    #[test]
    fn test_inherited_values_pass_through() {
        let mut ctx = context();
        let parent = StyleBag {
            italic: true,
            font_size: Some(30),
            ..Default::default()
        };
        let bag = parent.cascade(&mut ctx, &Element::new("span"), false);
        assert!(bag.italic);
        assert_eq!(bag.font_size, Some(30));
    }

    #[test]
    fn test_tag_formatting() {
        let mut ctx = context();
        let base = StyleBag::default();
        assert!(base.cascade(&mut ctx, &Element::new("strong"), false).bold);
        assert_eq!(
            base.cascade(&mut ctx, &Element::new("mark"), false).highlight,
            Some("yellow")
        );
        assert_eq!(
            base.cascade(&mut ctx, &Element::new("code"), false).highlight,
            Some("lightGray")
        );
        assert_eq!(
            base.cascade(&mut ctx, &Element::new("pre"), false).font.as_deref(),
            Some("Courier")
        );
        assert_eq!(
            base.cascade(&mut ctx, &Element::new("sup"), false).vert_align,
            Some(VertAlign::Superscript)
        );
    }

    #[test]
    fn test_blockquote_only_on_paragraphs() {
        let mut ctx = context();
        let element = Element::new("blockquote");
        let para = StyleBag::default().cascade(&mut ctx, &element, true);
        assert_eq!(para.indent_left, Some(BLOCKQUOTE_INDENT));
        assert_eq!(para.text_align, Some(TextAlign::Justify));
        let run = StyleBag::default().cascade(&mut ctx, &element, false);
        assert_eq!(run.indent_left, None);
    }

    #[test]
    fn test_heading_style() {
        let mut ctx = context();
        let bag = StyleBag::default().cascade(&mut ctx, &Element::new("h3"), true);
        assert_eq!(bag.paragraph_style.as_deref(), Some("Heading3"));
    }

    #[test]
    fn test_spacing_classes() {
        let mut ctx = context();
        let element = Element::new("p").with_attr("class", "mt-2 mb-4 lead");
        let bag = StyleBag::default().cascade(&mut ctx, &element, true);
        assert_eq!(bag.spacing_before, Some(120));
        assert_eq!(bag.spacing_after, Some(240));
    }

    #[test]
    fn test_inline_margin_beats_class() {
        let mut ctx = context();
        let element = Element::new("p")
            .with_attr("class", "mb-4")
            .with_style("margin-bottom", "10px");
        let bag = StyleBag::default().cascade(&mut ctx, &element, true);
        assert_eq!(bag.spacing_after, Some(150));
    }

    #[test]
    fn test_indentation_prefers_margin_over_padding() {
        let mut ctx = context();
        let element = Element::new("p")
            .with_style("padding-left", "20px")
            .with_style("margin-left", "10px")
            .with_style("padding-right", "2pt");
        let bag = StyleBag::default().cascade(&mut ctx, &element, true);
        assert_eq!(bag.indent_left, Some(150));
        assert_eq!(bag.indent_right, Some(40));
    }

    #[test]
    fn test_line_height_variants() {
        assert_eq!(
            LineSpacing::parse("1.5", 24),
            Some(LineSpacing {
                line: 360,
                rule: LineRule::AtLeast
            })
        );
        assert_eq!(
            LineSpacing::parse("150%", 24),
            Some(LineSpacing {
                line: 360,
                rule: LineRule::Auto
            })
        );
        assert_eq!(
            LineSpacing::parse("18pt", 24),
            Some(LineSpacing {
                line: 360,
                rule: LineRule::Exact
            })
        );
        assert_eq!(LineSpacing::parse("normal", 24), None);
    }

    #[test]
    fn test_unrecognized_values_are_ignored() {
        let mut ctx = context();
        let element = Element::new("p")
            .with_style("font-size", "huge")
            .with_style("text-align", "sideways")
            .with_style("color", "transparent");
        let bag = StyleBag::default().cascade(&mut ctx, &element, true);
        assert_eq!(bag, StyleBag::default());
    }

    #[test]
    fn test_background_and_display() {
        let mut ctx = context();
        let element = Element::new("div")
            .with_style("background", "linear-gradient(#eee, #fff)")
            .with_style("display", "block");
        let bag = StyleBag::default().cascade(&mut ctx, &element, true);
        assert_eq!(bag.background.as_deref(), Some("EEEEEE"));
        assert!(bag.is_block());
    }

    #[test]
    fn test_text_decoration() {
        let mut ctx = context();
        let element = Element::new("span").with_style("text-decoration", "underline line-through");
        let bag = StyleBag::default().cascade(&mut ctx, &element, false);
        assert!(bag.underline && bag.strike);

        let cleared = bag.cascade(
            &mut ctx,
            &Element::new("span").with_style("text-decoration", "none"),
            false,
        );
        assert!(!cleared.underline && !cleared.strike);
    }
}
