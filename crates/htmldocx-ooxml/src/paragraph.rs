//! Paragraph and run assembly
//!
//! A paragraph is built from one node: its own resolved [`StyleBag`] gives
//! the paragraph properties and its descendants are flattened into runs.
//! A new run starts at every text node, line break, picture and formatting
//! element, each carrying the formatting active at that point.

use std::sync::OnceLock;

use htmldocx_dom::{Element, Node};
use regex::Regex;

use crate::attributes::{LineRule, StyleBag};
use crate::context::DocumentContext;
use crate::css::BorderStroke;
use crate::image;
use crate::relationships::{RelationshipKind, TargetMode};
use crate::units;
use crate::xml::escape_xml;

/// Run style applied to every run inside a hyperlink
pub const HYPERLINK_STYLE: &str = "Hyperlink";

/// Space between shaded paragraph text and its border, in points
const SHADING_BORDER_SPACE: u32 = 3;

/// Tags that never produce runs
const SKIPPED_TAGS: &[&str] = &["script", "style", "template", "head", "title", "meta", "link"];

/// Build a paragraph sized against the body content width
///
/// Returns `None` for an empty text node with no explicit attributes.
pub fn build_paragraph(
    ctx: &mut DocumentContext,
    node: Option<&Node>,
    inherited: &StyleBag,
) -> Option<String> {
    let maximum_width = ctx.content_width();
    build_paragraph_within(ctx, node, inherited, maximum_width)
}

/// Build a paragraph whose pictures are limited to `maximum_width` TWIP
pub fn build_paragraph_within(
    ctx: &mut DocumentContext,
    node: Option<&Node>,
    inherited: &StyleBag,
    maximum_width: i64,
) -> Option<String> {
    if let Some(Node::Text(text)) = node {
        if text.trim().is_empty() && *inherited == StyleBag::default() {
            return None;
        }
    }

    let bag = match node {
        Some(Node::Element(element)) => inherited.cascade(ctx, element, true),
        _ => inherited.clone(),
    };

    let is_empty = match node {
        None => true,
        Some(Node::Text(text)) => text.trim().is_empty(),
        Some(Node::Element(element)) => {
            element.children.is_empty() && !matches!(element.tag.as_str(), "img" | "br")
        }
    };

    let mut run_bag = bag.clone();
    if bag.is_block() {
        run_bag.background = None;
    }

    let mut runs = RunCollector::new(maximum_width);
    match node {
        Some(Node::Element(element)) if is_run_root(element) => {
            runs.collect(ctx, &Node::Element(element.clone()), inherited)
        }
        Some(Node::Element(element)) => {
            for child in &element.children {
                runs.collect(ctx, child, &run_bag);
            }
        }
        Some(text @ Node::Text(_)) => runs.collect(ctx, text, &run_bag),
        None => {}
    }

    let mut xml = String::from("<w:p>");
    xml.push_str(&paragraph_properties(
        ctx,
        &bag,
        is_empty && bag.paragraph_style.is_none(),
    ));
    xml.push_str(&runs.finish());
    xml.push_str("</w:p>");
    Some(xml)
}

/// An empty paragraph with zero spacing
pub fn empty_paragraph() -> String {
    r#"<w:p><w:pPr><w:spacing w:before="0" w:after="0" w:line="0" w:lineRule="auto"/></w:pPr></w:p>"#
        .to_string()
}

/// An empty paragraph one line high
pub fn spacer_paragraph() -> String {
    r#"<w:p><w:pPr><w:spacing w:before="0" w:after="0" w:line="240" w:lineRule="auto"/></w:pPr></w:p>"#
        .to_string()
}

/// A paragraph holding only a page break
pub fn page_break_paragraph() -> String {
    r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#.to_string()
}

/// Elements that are themselves run content rather than a container
fn is_run_root(element: &Element) -> bool {
    matches!(element.tag.as_str(), "a" | "img" | "br") || is_inline_formatting(&element.tag)
}

/// Inline formatting elements that split runs
pub fn is_inline_formatting(tag: &str) -> bool {
    matches!(
        tag,
        "b" | "strong"
            | "i"
            | "em"
            | "u"
            | "ins"
            | "s"
            | "strike"
            | "del"
            | "sub"
            | "sup"
            | "mark"
            | "code"
            | "small"
            | "span"
            | "font"
            | "label"
            | "abbr"
            | "cite"
            | "q"
            | "kbd"
            | "samp"
            | "var"
            | "dfn"
            | "time"
    )
}

/// Build `w:pPr` in schema order
fn paragraph_properties(ctx: &DocumentContext, bag: &StyleBag, is_empty: bool) -> String {
    let mut xml = String::from("<w:pPr>");

    if let Some(style) = &bag.paragraph_style {
        xml.push_str(&format!(r#"<w:pStyle w:val="{}"/>"#, escape_xml(style)));
    }
    if let Some(numbering) = &bag.numbering {
        xml.push_str(&format!(
            r#"<w:numPr><w:ilvl w:val="{}"/><w:numId w:val="{}"/></w:numPr>"#,
            numbering.level, numbering.num_id
        ));
    }
    if bag.is_block() {
        if let Some(fill) = &bag.background {
            xml.push_str(&paragraph_border(bag, fill));
            xml.push_str(&shading(fill));
        } else if bag.border.is_some() {
            xml.push_str(&paragraph_border(bag, "auto"));
        }
    }

    xml.push_str(&spacing(ctx, bag, is_empty));

    if bag.indent_left.is_some() || bag.indent_right.is_some() {
        xml.push_str("<w:ind");
        if let Some(left) = bag.indent_left {
            xml.push_str(&format!(r#" w:left="{}""#, left));
        }
        if let Some(right) = bag.indent_right {
            xml.push_str(&format!(r#" w:right="{}""#, right));
        }
        xml.push_str("/>");
    }
    if let Some(align) = bag.text_align {
        xml.push_str(&format!(r#"<w:jc w:val="{}"/>"#, align.as_ooxml()));
    }

    xml.push_str("</w:pPr>");
    xml
}

/// Paragraph spacing: explicit declarations, then document defaults, then a
/// line height derived from the font size
fn spacing(ctx: &DocumentContext, bag: &StyleBag, is_empty: bool) -> String {
    if is_empty {
        return r#"<w:spacing w:before="0" w:after="0" w:line="0" w:lineRule="auto"/>"#
            .to_string();
    }

    if bag.has_explicit_spacing() {
        let mut xml = String::from("<w:spacing");
        if let Some(before) = bag.spacing_before {
            xml.push_str(&format!(r#" w:before="{}""#, before));
        }
        if let Some(after) = bag.spacing_after {
            xml.push_str(&format!(r#" w:after="{}""#, after));
        }
        if let Some(line) = bag.line_spacing {
            xml.push_str(&format!(
                r#" w:line="{}" w:lineRule="{}""#,
                line.line,
                line.rule.as_ooxml()
            ));
        }
        xml.push_str("/>");
        return xml;
    }

    if let Some(defaults) = ctx.defaults.spacing {
        return format!(
            r#"<w:spacing w:before="{}" w:after="{}" w:line="{}" w:lineRule="{}"/>"#,
            defaults.before,
            defaults.after,
            defaults.line,
            LineRule::Auto.as_ooxml()
        );
    }

    let font_twip = units::hip_to_twip(bag.effective_font_size(ctx));
    let line = (font_twip as f64 * ctx.defaults.line_height).round() as i64;
    format!(
        r#"<w:spacing w:before="0" w:after="0" w:line="{}" w:lineRule="{}"/>"#,
        line,
        LineRule::AtLeast.as_ooxml()
    )
}

fn paragraph_border(bag: &StyleBag, fallback_color: &str) -> String {
    let (stroke, size, color) = match &bag.border {
        Some(decl) => (
            decl.stroke.unwrap_or(BorderStroke::Solid).as_ooxml(),
            (decl.width.unwrap_or(1.0) * 8.0).round() as u32,
            decl.color.clone().unwrap_or_else(|| fallback_color.to_string()),
        ),
        None => ("single", 0, fallback_color.to_string()),
    };
    let mut xml = String::from("<w:pBdr>");
    for side in ["top", "left", "bottom", "right"] {
        xml.push_str(&format!(
            r#"<w:{} w:val="{}" w:sz="{}" w:space="{}" w:color="{}"/>"#,
            side, stroke, size, SHADING_BORDER_SPACE, color
        ));
    }
    xml.push_str("</w:pBdr>");
    xml
}

fn shading(fill: &str) -> String {
    format!(r#"<w:shd w:val="clear" w:color="auto" w:fill="{}"/>"#, fill)
}

/// Build `w:rPr` in schema order; empty bags give an empty string
pub fn run_properties(bag: &StyleBag) -> String {
    let mut xml = String::new();

    if bag.hyperlink {
        xml.push_str(&format!(r#"<w:rStyle w:val="{}"/>"#, HYPERLINK_STYLE));
    }
    if let Some(font) = &bag.font {
        let font = escape_xml(font);
        xml.push_str(&format!(
            r#"<w:rFonts w:ascii="{f}" w:hAnsi="{f}" w:eastAsia="{f}" w:cs="{f}"/>"#,
            f = font
        ));
    }
    if bag.bold {
        xml.push_str("<w:b/><w:bCs/>");
    }
    if bag.italic {
        xml.push_str("<w:i/><w:iCs/>");
    }
    if bag.strike {
        xml.push_str("<w:strike/>");
    }
    if let Some(color) = &bag.color {
        if !bag.hyperlink {
            xml.push_str(&format!(r#"<w:color w:val="{}"/>"#, color));
        }
    }
    if let Some(size) = bag.font_size {
        xml.push_str(&format!(
            r#"<w:sz w:val="{s}"/><w:szCs w:val="{s}"/>"#,
            s = size
        ));
    }
    if let Some(highlight) = bag.highlight {
        xml.push_str(&format!(r#"<w:highlight w:val="{}"/>"#, highlight));
    }
    if bag.underline && !bag.hyperlink {
        xml.push_str(r#"<w:u w:val="single"/>"#);
    }
    if let Some(fill) = &bag.background {
        xml.push_str(&shading(fill));
    }
    if let Some(vert) = bag.vert_align {
        xml.push_str(&format!(r#"<w:vertAlign w:val="{}"/>"#, vert.as_ooxml()));
    }

    if xml.is_empty() {
        xml
    } else {
        format!("<w:rPr>{}</w:rPr>", xml)
    }
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// Flattens inline content into runs
pub struct RunCollector {
    out: String,
    /// Trim leading whitespace of the next text node (after a line break)
    trim_next: bool,
    maximum_width: i64,
}

impl RunCollector {
    /// Create a collector for pictures limited to `maximum_width` TWIP
    pub fn new(maximum_width: i64) -> Self {
        Self {
            out: String::new(),
            trim_next: false,
            maximum_width,
        }
    }

    /// The collected runs
    pub fn finish(self) -> String {
        self.out
    }

    /// Append the runs of `node` formatted with `bag`
    pub fn collect(&mut self, ctx: &mut DocumentContext, node: &Node, bag: &StyleBag) {
        match node {
            Node::Text(text) => self.push_text(text, bag),
            Node::Element(element) => self.collect_element(ctx, element, bag),
        }
    }

    fn collect_element(&mut self, ctx: &mut DocumentContext, element: &Element, bag: &StyleBag) {
        let tag = element.tag.as_str();
        if SKIPPED_TAGS.contains(&tag) {
            return;
        }
        match tag {
            "br" => {
                self.out.push_str(&format!(
                    r#"<w:r>{}<w:br w:type="textWrapping"/></w:r>"#,
                    run_properties(bag)
                ));
                self.trim_next = true;
            }
            "img" => {
                if let Some(run) = image::build_image_run(ctx, element, self.maximum_width) {
                    self.out.push_str(&run);
                }
                self.trim_next = false;
            }
            "a" => self.collect_hyperlink(ctx, element, bag),
            "span"
                if element.children.is_empty()
                    && element.attr("data-force-space") == Some("true") =>
            {
                let own = bag.cascade(ctx, element, false);
                self.push_run(" ", &own);
            }
            _ => {
                let own = bag.cascade(ctx, element, false);
                for child in &element.children {
                    self.collect(ctx, child, &own);
                }
            }
        }
    }

    fn collect_hyperlink(&mut self, ctx: &mut DocumentContext, element: &Element, bag: &StyleBag) {
        let mut own = bag.cascade(ctx, element, false);
        let href = element.attr("href").map(str::trim).unwrap_or("");
        if href.is_empty() {
            for child in &element.children {
                self.collect(ctx, child, &own);
            }
            return;
        }
        own.hyperlink = true;

        let mut inner = RunCollector::new(self.maximum_width);
        inner.trim_next = self.trim_next;
        for child in &element.children {
            inner.collect(ctx, child, &own);
        }
        self.trim_next = inner.trim_next;
        let runs = inner.finish();

        if let Some(anchor) = href.strip_prefix('#') {
            self.out.push_str(&format!(
                r#"<w:hyperlink w:anchor="{}">{}</w:hyperlink>"#,
                escape_xml(anchor),
                runs
            ));
        } else {
            let rel_id = ctx.relate(RelationshipKind::Hyperlink, href, TargetMode::External);
            self.out.push_str(&format!(
                r#"<w:hyperlink r:id="{}">{}</w:hyperlink>"#,
                rel_id, runs
            ));
        }
    }

    fn push_text(&mut self, text: &str, bag: &StyleBag) {
        if bag.preserve_whitespace {
            self.trim_next = false;
            self.push_preformatted(text, bag);
            return;
        }
        // Whitespace-only text with a newline is source formatting
        if text.trim().is_empty() && text.contains('\n') {
            return;
        }
        let collapsed = whitespace_regex().replace_all(text, " ");
        let text = if self.trim_next {
            self.trim_next = false;
            collapsed.trim_start().to_string()
        } else {
            collapsed.into_owned()
        };
        if text.is_empty() {
            return;
        }
        self.push_run(&text, bag);
    }

    fn push_preformatted(&mut self, text: &str, bag: &StyleBag) {
        let mut xml = format!("<w:r>{}", run_properties(bag));
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                xml.push_str("<w:br/>");
            }
            if !line.is_empty() {
                xml.push_str(&format!(
                    r#"<w:t xml:space="preserve">{}</w:t>"#,
                    escape_xml(line.trim_end_matches('\r'))
                ));
            }
        }
        xml.push_str("</w:r>");
        self.out.push_str(&xml);
    }

    fn push_run(&mut self, text: &str, bag: &StyleBag) {
        self.out.push_str(&format!(
            r#"<w:r>{}<w:t xml:space="preserve">{}</w:t></w:r>"#,
            run_properties(bag),
            escape_xml(text)
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{DocumentOptions, ParagraphSpacing, SpacingOptions};

    fn context() -> DocumentContext {
        DocumentContext::new(&DocumentOptions::default()).unwrap()
    }

    fn paragraph(ctx: &mut DocumentContext, element: Element) -> String {
        build_paragraph(ctx, Some(&Node::Element(element)), &StyleBag::default()).unwrap()
    }

    #[test]
    fn test_simple_paragraph() {
        let mut ctx = context();
        let xml = paragraph(&mut ctx, Element::new("p").with_text("Hello"));
        assert!(xml.starts_with("<w:p><w:pPr>"));
        assert_eq!(xml.matches("<w:r>").count(), 1);
        assert!(xml.contains(r#"<w:t xml:space="preserve">Hello</w:t>"#));
    }

    #[test]
    fn test_empty_text_without_attributes_is_skipped() {
        let mut ctx = context();
        let node = Node::text("  ");
        assert!(build_paragraph(&mut ctx, Some(&node), &StyleBag::default()).is_none());
    }

    #[test]
    fn test_runs_split_at_formatting() {
        let mut ctx = context();
        let element = Element::new("p")
            .with_text("plain ")
            .with_child(Element::new("b").with_text("bold"))
            .with_text(" and ")
            .with_child(Element::new("i").with_child(Element::new("u").with_text("both")));
        let xml = paragraph(&mut ctx, element);
        assert_eq!(xml.matches("<w:r>").count(), 4);
        assert!(xml.contains(r#"<w:rPr><w:b/><w:bCs/></w:rPr><w:t xml:space="preserve">bold</w:t>"#));
        assert!(xml.contains(r#"<w:i/><w:iCs/><w:u w:val="single"/>"#));
    }

    #[test]
    fn test_line_break_trims_following_text() {
        let mut ctx = context();
        let element = Element::new("p")
            .with_text("one")
            .with_child(Element::new("br"))
            .with_text("   two")
            .with_child(Element::new("br"))
            .with_text("   ");
        let xml = paragraph(&mut ctx, element);
        assert_eq!(xml.matches(r#"<w:br w:type="textWrapping"/>"#).count(), 2);
        assert!(xml.contains(r#"<w:t xml:space="preserve">two</w:t>"#));
        // Text emptied by the trim is dropped
        assert_eq!(xml.matches("<w:t ").count(), 2);
    }

    #[test]
    fn test_formatting_whitespace_is_dropped() {
        let mut ctx = context();
        let element = Element::new("p")
            .with_text("\n   ")
            .with_child(Element::new("span").with_text("x"))
            .with_text("\n");
        let xml = paragraph(&mut ctx, element);
        assert_eq!(xml.matches("<w:r>").count(), 1);
    }

    #[test]
    fn test_force_space_span() {
        let mut ctx = context();
        let element = Element::new("p")
            .with_text("a")
            .with_child(Element::new("span").with_attr("data-force-space", "true"))
            .with_text("b");
        let xml = paragraph(&mut ctx, element);
        assert!(xml.contains(r#"<w:t xml:space="preserve"> </w:t>"#));
    }

    #[test]
    fn test_external_hyperlink() {
        let mut ctx = context();
        let element = Element::new("p").with_child(
            Element::new("a")
                .with_attr("href", "https://example.com")
                .with_child(Element::new("span").with_style("color", "red").with_text("link")),
        );
        let xml = paragraph(&mut ctx, element);
        assert!(xml.contains(r#"<w:hyperlink r:id="rId5">"#));
        assert!(xml.contains(r#"<w:rStyle w:val="Hyperlink"/>"#));
        // The run style wins over the run's own color
        assert!(!xml.contains("<w:color"));
        let rels = ctx.relationships(crate::context::DOCUMENT_PART).unwrap();
        assert_eq!(rels.len(), 5);
    }

    #[test]
    fn test_anchor_hyperlink() {
        let mut ctx = context();
        let element = Element::new("a").with_attr("href", "#intro").with_text("Intro");
        let xml = paragraph(&mut ctx, element);
        assert!(xml.contains(r#"<w:hyperlink w:anchor="intro">"#));
        assert_eq!(ctx.relationships(crate::context::DOCUMENT_PART).unwrap().len(), 4);
    }

    #[test]
    fn test_paragraph_properties_order() {
        let mut ctx = context();
        let element = Element::new("h2")
            .with_style("text-align", "center")
            .with_style("margin-left", "10px")
            .with_style("margin-top", "12pt")
            .with_text("Title");
        let xml = paragraph(&mut ctx, element);
        let style = xml.find("<w:pStyle").unwrap();
        let spacing = xml.find("<w:spacing").unwrap();
        let ind = xml.find("<w:ind").unwrap();
        let jc = xml.find("<w:jc").unwrap();
        assert!(style < spacing && spacing < ind && ind < jc);
        assert!(xml.contains(r#"<w:pStyle w:val="Heading2"/>"#));
        assert!(xml.contains(r#"<w:spacing w:before="240"/>"#));
    }

    #[test]
    fn test_block_shading_goes_on_paragraph() {
        let mut ctx = context();
        let block = Element::new("p")
            .with_style("background-color", "#eeeeee")
            .with_style("display", "block")
            .with_text("x");
        let xml = paragraph(&mut ctx, block);
        assert!(xml.contains("<w:pBdr>"));
        assert_eq!(xml.matches(r#"w:fill="EEEEEE""#).count(), 1);
        assert!(xml.find("<w:shd").unwrap() < xml.find("</w:pPr>").unwrap());

        let inline = Element::new("p")
            .with_style("background-color", "#eeeeee")
            .with_text("x");
        let xml = paragraph(&mut ctx, inline);
        assert!(!xml.contains("<w:pBdr>"));
        assert!(xml.find("<w:shd").unwrap() > xml.find("</w:pPr>").unwrap());
    }

    #[test]
    fn test_spacing_precedence() {
        // Computed from font size when nothing is configured
        let mut ctx = context();
        let xml = paragraph(&mut ctx, Element::new("p").with_text("x"));
        assert!(xml.contains(r#"<w:spacing w:before="0" w:after="0" w:line="330" w:lineRule="atLeast"/>"#));

        // Document defaults when configured
        let options = DocumentOptions {
            spacing: SpacingOptions {
                default_paragraph_spacing: Some(ParagraphSpacing {
                    above: Some(0.0),
                    below: Some(1.0),
                }),
                default_line_spacing: Some(14.0),
            },
            ..Default::default()
        };
        let mut ctx = DocumentContext::new(&options).unwrap();
        let xml = paragraph(&mut ctx, Element::new("p").with_text("x"));
        assert!(xml.contains(r#"<w:spacing w:before="0" w:after="312" w:line="280" w:lineRule="auto"/>"#));

        // Explicit declarations win
        let xml = paragraph(
            &mut ctx,
            Element::new("p").with_style("line-height", "200%").with_text("x"),
        );
        assert!(xml.contains(r#"<w:spacing w:line="480" w:lineRule="auto"/>"#));
    }

    #[test]
    fn test_empty_paragraph_has_zero_spacing() {
        let mut ctx = context();
        let xml = paragraph(&mut ctx, Element::new("p"));
        assert!(xml.contains(r#"w:line="0""#));
        assert!(!xml.contains("<w:r>"));
    }

    #[test]
    fn test_preformatted_text_keeps_lines() {
        let mut ctx = context();
        let xml = paragraph(&mut ctx, Element::new("pre").with_text("a  b\nc"));
        assert!(xml.contains(r#"<w:t xml:space="preserve">a  b</w:t><w:br/>"#));
        assert!(xml.contains(r#"w:ascii="Courier""#));
    }

    #[test]
    fn test_run_properties_order() {
        let bag = StyleBag {
            font: Some("Arial".to_string()),
            bold: true,
            color: Some("FF0000".to_string()),
            font_size: Some(28),
            highlight: Some("yellow"),
            underline: true,
            vert_align: Some(crate::css::VertAlign::Subscript),
            ..Default::default()
        };
        let xml = run_properties(&bag);
        let order = ["<w:rFonts", "<w:b/>", "<w:color", "<w:sz ", "<w:highlight", "<w:u ", "<w:vertAlign"];
        let positions: Vec<usize> = order.iter().map(|t| xml.find(t).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(run_properties(&StyleBag::default()), "");
    }
}
