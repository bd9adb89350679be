//! Block walker
//!
//! Turns a node list into body-level WordprocessingML: paragraphs, tables,
//! numbered paragraphs and page breaks. Siblings are visited strictly left
//! to right so every id allocated along the way is stable for identical
//! input.
//!
//! Containers that only hold inline content become a single paragraph.
//! Containers with block children are walked, and runs of inline siblings
//! between blocks are grouped into paragraphs of their own.
//!
//! At body level `div[data-section]` containers open page sections; see
//! [`build_body`].

use htmldocx_dom::{Element, Node};

use crate::attributes::StyleBag;
use crate::context::{DocumentContext, Section};
use crate::header_footer::{self, BackgroundKey, BackgroundPosition, BackgroundSize};
use crate::image;
use crate::list;
use crate::paragraph;
use crate::parts;
use crate::table::{self, TableLayout};

/// Tags that always start a new block
const BLOCK_TAGS: &[&str] = &[
    "div", "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "blockquote", "table",
    "figure", "section", "article", "header", "footer", "main", "aside", "nav",
];

/// Tags rendered as one paragraph unless they hold blocks
const PARAGRAPH_TAGS: &[&str] = &[
    "span", "strong", "b", "em", "i", "u", "ins", "strike", "del", "s", "sub", "sup", "mark", "p",
    "div", "a", "blockquote", "code", "pre",
];

/// Tags whose emptiness still yields a paragraph
const EMPTY_PARAGRAPH_TAGS: &[&str] = &["p", "div", "blockquote"];

/// Tags that produce no body content
const IGNORED_TAGS: &[&str] = &[
    "head", "script", "style", "template", "title", "meta", "link",
];

/// Class that adds a one-line spacer after a paragraph
const SPACER_CLASS: &str = "mb-6";

/// Inherited style and available width for a block list
#[derive(Debug, Clone, PartialEq)]
pub struct BlockScope {
    pub inherited: StyleBag,
    /// TWIP
    pub maximum_width: i64,
}

impl BlockScope {
    /// Scope of the document body
    pub fn body(ctx: &DocumentContext) -> Self {
        Self {
            inherited: StyleBag::default(),
            maximum_width: ctx.content_width(),
        }
    }
}

/// Convert a node list into block-level XML
pub fn build_blocks(ctx: &mut DocumentContext, nodes: &[Node], scope: &BlockScope) -> String {
    let mut xml = String::new();
    let mut inline: Vec<Node> = Vec::new();
    for node in nodes {
        if is_inline(node) {
            inline.push(node.clone());
            continue;
        }
        flush_inline(ctx, &mut inline, scope, &mut xml);
        if let Node::Element(element) = node {
            build_element(ctx, element, scope, &mut xml);
        }
    }
    flush_inline(ctx, &mut inline, scope, &mut xml);
    xml
}

/// Convert the document body, opening a section per `div[data-section]`
///
/// Each section boundary emits a paragraph carrying the closing section's
/// properties. Every section, including the implicit leading one, is
/// recorded in the context; the last one belongs to the body's trailing
/// section properties.
pub fn build_body(ctx: &mut DocumentContext, nodes: &[Node]) -> String {
    let scope = BlockScope::body(ctx);
    let mut walk = BodyWalk {
        xml: String::new(),
        pending: Vec::new(),
        section: default_section(ctx),
        explicit: false,
        has_content: false,
    };
    walk.visit(ctx, nodes, &scope);
    walk.flush(ctx, &scope);
    ctx.push_section(walk.section);
    walk.xml
}

struct BodyWalk {
    xml: String,
    /// Nodes waiting to be walked as one block list
    pending: Vec<Node>,
    section: Section,
    /// Current section was opened by a section container
    explicit: bool,
    has_content: bool,
}

impl BodyWalk {
    fn visit(&mut self, ctx: &mut DocumentContext, nodes: &[Node], scope: &BlockScope) {
        for node in nodes {
            match node {
                Node::Element(element) if matches!(element.tag.as_str(), "html" | "body") => {
                    self.visit(ctx, &element.children, scope);
                }
                Node::Element(element) if element.has_attr("data-section") => {
                    self.flush(ctx, scope);
                    self.open(ctx, element);
                    let blocks = build_blocks(ctx, &element.children, scope);
                    self.has_content |= !blocks.is_empty();
                    self.xml.push_str(&blocks);
                }
                _ => self.pending.push(node.clone()),
            }
        }
    }

    fn flush(&mut self, ctx: &mut DocumentContext, scope: &BlockScope) {
        if self.pending.is_empty() {
            return;
        }
        let nodes = std::mem::take(&mut self.pending);
        let blocks = build_blocks(ctx, &nodes, scope);
        self.has_content |= !blocks.is_empty();
        self.xml.push_str(&blocks);
    }

    /// Close the current section and start one for `container`
    fn open(&mut self, ctx: &mut DocumentContext, container: &Element) {
        let next = section_for(ctx, container);
        let previous = std::mem::replace(&mut self.section, next);
        if self.has_content || self.explicit {
            self.xml.push_str(&format!(
                "<w:p><w:pPr>{}</w:pPr></w:p>",
                parts::section_properties(ctx, &previous)
            ));
            ctx.push_section(previous);
            self.section.index = ctx.sections().len();
        }
        self.explicit = true;
        self.has_content = false;
    }
}

fn default_section(ctx: &DocumentContext) -> Section {
    Section {
        index: ctx.sections().len(),
        header_type: ctx.section_defaults.header_type.clone(),
        footer_type: ctx.section_defaults.footer_type.clone(),
        margins: ctx.geometry.margins,
        background: None,
        header: None,
    }
}

fn section_for(ctx: &mut DocumentContext, container: &Element) -> Section {
    let mut section = default_section(ctx);
    if let Some(header_type) = non_empty_attr(container, "data-header-type") {
        section.header_type = header_type.to_string();
    }
    if let Some(footer_type) = non_empty_attr(container, "data-footer-type") {
        section.footer_type = footer_type.to_string();
    }

    if let Some(url) = non_empty_attr(container, "data-background-url") {
        let key = BackgroundKey {
            url: url.to_string(),
            size: container
                .attr("data-background-size")
                .map(BackgroundSize::parse)
                .unwrap_or_default(),
            position: container
                .attr("data-background-position")
                .map(BackgroundPosition::parse)
                .unwrap_or_default(),
            repeat: non_empty_attr(container, "data-background-repeat").map(str::to_string),
        };
        section.header = header_footer::section_header(ctx, &section.header_type, &key);
        if let Some(height) = section.header.as_ref().and_then(|h| h.height) {
            section.margins.header = header_footer::BAND_MARGIN;
            section.margins.top = section
                .margins
                .top
                .max(height + header_footer::BODY_CLEARANCE);
        }
        section.background = Some(key);
    }
    log::debug!(
        "Section {}: header {}, footer {}",
        section.index,
        section.header_type,
        section.footer_type
    );
    section
}

fn non_empty_attr<'a>(element: &'a Element, name: &str) -> Option<&'a str> {
    element.attr(name).map(str::trim).filter(|v| !v.is_empty())
}

// ==================== Dispatch ====================

fn build_element(
    ctx: &mut DocumentContext,
    element: &Element,
    scope: &BlockScope,
    xml: &mut String,
) {
    let tag = element.tag.as_str();
    if IGNORED_TAGS.contains(&tag) {
        return;
    }

    if element.has_attr("data-docx-column-group") {
        if let Some(columns) = table::build_column_group(ctx, element, scope.maximum_width) {
            xml.push_str(&columns);
            return;
        }
    }

    let break_before = has_page_break(element, "page-break-before");
    let break_after =
        element.has_class("page-break") || has_page_break(element, "page-break-after");
    if break_before {
        xml.push_str(&paragraph::page_break_paragraph());
    }

    match tag {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let node = Node::Element(element.clone());
            if let Some(p) = paragraph::build_paragraph_within(
                ctx,
                Some(&node),
                &scope.inherited,
                scope.maximum_width,
            ) {
                xml.push_str(&p);
            }
        }
        "ul" | "ol" => xml.push_str(&list::build_list(ctx, element, scope.maximum_width)),
        "table" => xml.push_str(&table::build_table(
            ctx,
            element,
            TableLayout {
                maximum_width: scope.maximum_width,
            },
        )),
        "figure" => build_figure(ctx, element, scope, xml),
        "img" => {
            if let Some(run) = image::build_image_run(ctx, element, scope.maximum_width) {
                xml.push_str(&format!("<w:p>{}</w:p>", run));
            }
        }
        "br" => xml.push_str(&paragraph::empty_paragraph()),
        _ if element.has_class("page-break") && element.children.is_empty() => {}
        _ if PARAGRAPH_TAGS.contains(&tag) => build_paragraph_container(ctx, element, scope, xml),
        _ => {
            let nested = nested_scope(ctx, element, scope);
            xml.push_str(&build_blocks(ctx, &element.children, &nested));
        }
    }

    if break_after {
        xml.push_str(&paragraph::page_break_paragraph());
    }
}

fn build_paragraph_container(
    ctx: &mut DocumentContext,
    element: &Element,
    scope: &BlockScope,
    xml: &mut String,
) {
    if has_block_children(element) {
        let nested = nested_scope(ctx, element, scope);
        xml.push_str(&build_blocks(ctx, &element.children, &nested));
        return;
    }
    if element.children.is_empty() && !EMPTY_PARAGRAPH_TAGS.contains(&element.tag.as_str()) {
        return;
    }

    let node = Node::Element(element.clone());
    if let Some(p) =
        paragraph::build_paragraph_within(ctx, Some(&node), &scope.inherited, scope.maximum_width)
    {
        xml.push_str(&p);
    }
    if element.has_class(SPACER_CLASS) {
        xml.push_str(&paragraph::spacer_paragraph());
    }
}

/// Tables and pictures of a `figure`; other children are dropped
fn build_figure(ctx: &mut DocumentContext, figure: &Element, scope: &BlockScope, xml: &mut String) {
    let children: Vec<&Element> = figure.child_elements().collect();
    for (index, child) in children.iter().enumerate() {
        match child.tag.as_str() {
            "table" => {
                xml.push_str(&table::build_table(
                    ctx,
                    child,
                    TableLayout {
                        maximum_width: scope.maximum_width,
                    },
                ));
                if index + 1 < children.len() {
                    xml.push_str(&paragraph::empty_paragraph());
                }
            }
            "img" => {
                if let Some(run) = image::build_image_run(ctx, child, scope.maximum_width) {
                    xml.push_str(&format!("<w:p>{}</w:p>", run));
                }
            }
            _ => {}
        }
    }
}

fn nested_scope(ctx: &mut DocumentContext, container: &Element, scope: &BlockScope) -> BlockScope {
    BlockScope {
        inherited: scope.inherited.cascade(ctx, container, false).without_box(),
        maximum_width: scope.maximum_width,
    }
}

/// Emit a run of inline siblings as one paragraph
fn flush_inline(
    ctx: &mut DocumentContext,
    inline: &mut Vec<Node>,
    scope: &BlockScope,
    xml: &mut String,
) {
    if inline.is_empty() {
        return;
    }
    let nodes = std::mem::take(inline);
    let blank = nodes.iter().all(|node| match node {
        Node::Text(text) => text.trim().is_empty(),
        _ => false,
    });
    if blank {
        return;
    }
    if nodes.iter().all(|node| node.is_tag("br")) {
        xml.push_str(&paragraph::empty_paragraph());
        return;
    }

    let mut wrapper = Element::new("p");
    wrapper.children = nodes;
    let node = Node::Element(wrapper);
    if let Some(p) =
        paragraph::build_paragraph_within(ctx, Some(&node), &scope.inherited, scope.maximum_width)
    {
        xml.push_str(&p);
    }
}

// ==================== Classification ====================

fn is_inline(node: &Node) -> bool {
    match node {
        Node::Text(_) => true,
        Node::Element(element) => {
            let tag = element.tag.as_str();
            (tag == "br" || paragraph::is_inline_formatting(tag) || matches!(tag, "span" | "a"))
                && !has_block_children(element)
                && !is_page_break_marker(element)
        }
    }
}

fn has_block_children(element: &Element) -> bool {
    element
        .child_elements()
        .any(|child| BLOCK_TAGS.contains(&child.tag.as_str()))
}

fn has_page_break(element: &Element, property: &str) -> bool {
    element
        .css(property)
        .map(|v| v.trim().to_ascii_lowercase())
        .is_some_and(|v| !v.is_empty() && v != "auto" && v != "avoid")
}

fn is_page_break_marker(element: &Element) -> bool {
    element.has_class("page-break")
        || has_page_break(element, "page-break-before")
        || has_page_break(element, "page-break-after")
}
