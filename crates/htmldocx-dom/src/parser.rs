//! Lenient XHTML parser
//!
//! Builds an element tree from markup using `quick-xml`. The parser accepts
//! well-formed XHTML plus the HTML habits that appear in generated markup:
//! unclosed void elements (`<br>`, `<img ...>`), valueless or unquoted
//! attributes, mismatched end tags and the common named entities.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::Result;
use crate::node::{Element, Node};

/// Elements that never have content
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Parse markup into a sequence of root nodes
pub fn parse_html(markup: &str) -> Result<Vec<Node>> {
    let mut reader = Reader::from_str(markup);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.expand_empty_elements = false;

    let mut roots: Vec<Node> = Vec::new();
    let mut stack: Vec<Element> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                let element = start_element(e);
                if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                    append(&mut stack, &mut roots, Node::Element(element));
                } else {
                    stack.push(element);
                }
            }
            Event::Empty(ref e) => {
                let element = start_element(e);
                append(&mut stack, &mut roots, Node::Element(element));
            }
            Event::End(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                // Unknown end tags and end tags of void elements are ignored
                if let Some(depth) = stack.iter().rposition(|el| el.tag == name) {
                    while stack.len() > depth {
                        if let Some(done) = stack.pop() {
                            append(&mut stack, &mut roots, Node::Element(done));
                        }
                    }
                }
            }
            Event::Text(ref e) => {
                let raw = String::from_utf8_lossy(e.as_ref());
                let text = decode_entities(&raw);
                if !text.is_empty() {
                    append(&mut stack, &mut roots, Node::Text(text.into_owned()));
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                append(&mut stack, &mut roots, Node::Text(text));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // Close anything left open at end of input
    while let Some(done) = stack.pop() {
        append(&mut stack, &mut roots, Node::Element(done));
    }

    Ok(roots)
}

fn start_element(e: &BytesStart) -> Element {
    let tag = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
    let mut element = Element::new(tag);
    for attr in e.html_attributes().filter_map(|a| a.ok()) {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = decode_entities(&raw);
        element.set_attr(&key, value.into_owned());
    }
    element
}

fn append(stack: &mut [Element], roots: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

fn decode_entities(raw: &str) -> Cow<'_, str> {
    match quick_xml::escape::unescape_with(raw, html_entity) {
        Ok(text) => text,
        // A stray ampersand is kept literally
        Err(_) => Cow::Borrowed(raw),
    }
}

fn html_entity(name: &str) -> Option<&'static str> {
    let value = match name {
        "nbsp" => "\u{00A0}",
        "copy" => "\u{00A9}",
        "reg" => "\u{00AE}",
        "trade" => "\u{2122}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201C}",
        "rdquo" => "\u{201D}",
        "laquo" => "\u{00AB}",
        "raquo" => "\u{00BB}",
        "bull" => "\u{2022}",
        "middot" => "\u{00B7}",
        "euro" => "\u{20AC}",
        "pound" => "\u{00A3}",
        "yen" => "\u{00A5}",
        "cent" => "\u{00A2}",
        "sect" => "\u{00A7}",
        "deg" => "\u{00B0}",
        "times" => "\u{00D7}",
        "divide" => "\u{00F7}",
        "para" => "\u{00B6}",
        "shy" => "\u{00AD}",
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(nodes: &[Node]) -> &Element {
        nodes
            .iter()
            .find_map(Node::as_element)
            .expect("expected an element")
    }

    #[test]
    fn test_parse_paragraph() {
        let nodes = parse_html("<p>Hello</p>").unwrap();
        assert_eq!(nodes.len(), 1);
        let p = first_element(&nodes);
        assert_eq!(p.tag, "p");
        assert_eq!(p.children, vec![Node::Text("Hello".to_string())]);
    }

    #[test]
    fn test_void_elements_do_not_swallow_siblings() {
        let nodes = parse_html("<p>one<br>two<img src=\"a.png\">three</p>").unwrap();
        let p = first_element(&nodes);
        assert_eq!(p.children.len(), 5);
        assert!(p.children[1].is_tag("br"));
        assert!(p.children[3].is_tag("img"));
        assert_eq!(p.children[4], Node::Text("three".to_string()));
    }

    #[test]
    fn test_html_attributes() {
        let nodes = parse_html("<td colspan=2 nowrap style=\"color: blue\">x</td>").unwrap();
        let td = first_element(&nodes);
        assert_eq!(td.attr("colspan"), Some("2"));
        assert_eq!(td.attr("nowrap"), Some(""));
        assert_eq!(td.css("color"), Some("blue"));
    }

    #[test]
    fn test_named_entities() {
        let nodes = parse_html("<p>a&nbsp;b &amp; c&mdash;d</p>").unwrap();
        let p = first_element(&nodes);
        assert_eq!(p.text_content(), "a\u{00A0}b & c\u{2014}d");
    }

    #[test]
    fn test_character_references_always_decoded() {
        let nodes = parse_html(r#"<p title="caf&#233; &amp; bar">&#x41;&#66;&lt;</p>"#).unwrap();
        let p = first_element(&nodes);
        assert_eq!(p.attr("title"), Some("caf\u{00E9} & bar"));
        assert_eq!(p.text_content(), "AB<");
    }

    #[test]
    fn test_mismatched_end_tags_close_open_elements() {
        let nodes = parse_html("<div><p>one<b>two</p><p>three</p></div>").unwrap();
        let div = first_element(&nodes);
        assert_eq!(div.child_elements().count(), 2);
        assert_eq!(div.text_content(), "onetwothree");
    }

    #[test]
    fn test_unclosed_elements_at_eof() {
        let nodes = parse_html("<ul><li>one<li>two").unwrap();
        let ul = first_element(&nodes);
        assert_eq!(ul.tag, "ul");
        assert_eq!(ul.text_content(), "onetwo");
    }

    #[test]
    fn test_multiple_roots() {
        let nodes = parse_html("<h1>Title</h1>\n<p>Body</p>").unwrap();
        let tags: Vec<_> = nodes
            .iter()
            .filter_map(Node::as_element)
            .map(|e| e.tag.as_str())
            .collect();
        assert_eq!(tags, vec!["h1", "p"]);
    }
}
