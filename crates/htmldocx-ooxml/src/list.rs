//! List flattening
//!
//! WordprocessingML has no nested list container: every item is a plain
//! paragraph carrying a numbering reference. A list subtree is flattened
//! through a work queue so that nested lists land at `level + 1` with their
//! own numbering definition while document order is preserved.

use std::collections::VecDeque;

use htmldocx_dom::{Element, Node};

use crate::attributes::{NumberingRef, StyleBag};
use crate::context::DocumentContext;
use crate::numbering::{ListKind, ListProperties, LEVEL_COUNT};
use crate::paragraph;

/// Pending list content
#[derive(Debug, Clone)]
struct ListEntry {
    node: Node,
    level: usize,
    kind: ListKind,
    num_id: u32,
}

/// Flatten a `ul`/`ol` element into numbered paragraphs
///
/// Pictures in items are limited to `maximum_width` TWIP.
pub fn build_list(ctx: &mut DocumentContext, list: &Element, maximum_width: i64) -> String {
    let kind = ListKind::from_tag(&list.tag).unwrap_or(ListKind::Unordered);
    let num_id = register(ctx, kind, list);

    let mut queue = VecDeque::new();
    queue.push_back(ListEntry {
        node: Node::Element(list.clone()),
        level: 0,
        kind,
        num_id,
    });

    let mut xml = String::new();
    while let Some(entry) = queue.pop_front() {
        let element = match &entry.node {
            Node::Element(element) if is_list_structure(&element.tag) => element,
            node => {
                let bag = StyleBag {
                    numbering: Some(NumberingRef {
                        level: entry.level.min(LEVEL_COUNT as usize - 1),
                        num_id: entry.num_id,
                    }),
                    ..Default::default()
                };
                if let Some(p) =
                    paragraph::build_paragraph_within(ctx, Some(node), &bag, maximum_width)
                {
                    xml.push_str(&p);
                }
                continue;
            }
        };

        // An item with its own bullet gets its own definition
        let num_id = if element.tag == "li" && has_custom_bullet(ctx, element) {
            register(ctx, entry.kind, element)
        } else {
            entry.num_id
        };

        let mut pending: Vec<ListEntry> = Vec::new();
        for child in &element.children {
            if let Node::Element(nested_list) = child {
                if let Some(nested) = ListKind::from_tag(&nested_list.tag) {
                    pending.push(ListEntry {
                        node: child.clone(),
                        level: entry.level + 1,
                        kind: nested,
                        num_id: register(ctx, nested, nested_list),
                    });
                    continue;
                }
            }

            if let Some(Node::Element(last)) = pending.last_mut().map(|e| &mut e.node) {
                if last.tag == "p" {
                    last.children.push(child.clone());
                    continue;
                }
            }

            let node = match child {
                Node::Element(item) if item.tag == "li" || item.tag == "p" => child.clone(),
                _ => Node::Element(synthesized_paragraph(element, child.clone())),
            };
            pending.push(ListEntry {
                node,
                level: entry.level,
                kind: entry.kind,
                num_id,
            });
        }

        for entry in pending.into_iter().rev() {
            queue.push_front(entry);
        }
    }
    xml
}

fn is_list_structure(tag: &str) -> bool {
    matches!(tag, "ul" | "ol" | "li")
}

fn register(ctx: &mut DocumentContext, kind: ListKind, element: &Element) -> u32 {
    let properties = ListProperties::from_element(element, ctx.defaults.font_size);
    ctx.register_numbering(kind, &properties)
}

fn has_custom_bullet(ctx: &DocumentContext, item: &Element) -> bool {
    ListProperties::from_element(item, ctx.defaults.font_size)
        .custom_bullet()
        .is_some()
}

/// Wrap loose item content in a paragraph that keeps the item's inline style
fn synthesized_paragraph(parent: &Element, child: Node) -> Element {
    let mut p = Element::new("p");
    if parent.tag == "li" {
        p.style = parent.style.clone();
    }
    p.children.push(child);
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DocumentOptions;

    fn context() -> DocumentContext {
        DocumentContext::new(&DocumentOptions::default()).unwrap()
    }

    fn num_ids(xml: &str) -> Vec<(usize, u32)> {
        let mut found = Vec::new();
        let mut rest = xml;
        while let Some(pos) = rest.find("<w:ilvl w:val=\"") {
            rest = &rest[pos + 15..];
            let level: usize = rest[..rest.find('"').unwrap()].parse().unwrap();
            let pos = rest.find("<w:numId w:val=\"").unwrap();
            rest = &rest[pos + 16..];
            let id: u32 = rest[..rest.find('"').unwrap()].parse().unwrap();
            found.push((level, id));
        }
        found
    }

    #[test]
    fn test_flat_list() {
        let mut ctx = context();
        let list = Element::new("ul")
            .with_child(Element::new("li").with_text("one"))
            .with_child(Element::new("li").with_text("two"));
        let xml = build_list(&mut ctx, &list, 9000);
        assert_eq!(num_ids(&xml), vec![(0, 1), (0, 1)]);
        assert_eq!(ctx.numbering_definitions().len(), 1);
        assert!(xml.find("one").unwrap() < xml.find("two").unwrap());
    }

    #[test]
    fn test_nested_list_gets_next_level_and_id() {
        let mut ctx = context();
        let list = Element::new("ol")
            .with_child(
                Element::new("li")
                    .with_text("parent")
                    .with_child(Element::new("ul").with_child(Element::new("li").with_text("child"))),
            )
            .with_child(Element::new("li").with_text("sibling"));
        let xml = build_list(&mut ctx, &list, 9000);
        assert_eq!(num_ids(&xml), vec![(0, 1), (1, 2), (0, 1)]);
        let order: Vec<usize> = ["parent", "child", "sibling"]
            .iter()
            .map(|t| xml.find(t).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_inline_children_grouped_into_one_paragraph() {
        let mut ctx = context();
        let list = Element::new("ul").with_child(
            Element::new("li")
                .with_text("a ")
                .with_child(Element::new("b").with_text("b"))
                .with_text(" c"),
        );
        let xml = build_list(&mut ctx, &list, 9000);
        assert_eq!(xml.matches("<w:p>").count(), 1);
        assert_eq!(xml.matches("<w:r>").count(), 3);
    }

    #[test]
    fn test_item_style_reaches_synthesized_paragraph() {
        let mut ctx = context();
        let list = Element::new("ul")
            .with_child(Element::new("li").with_style("color", "#ff0000").with_text("red"));
        let xml = build_list(&mut ctx, &list, 9000);
        assert!(xml.contains(r#"<w:color w:val="FF0000"/>"#));
    }

    #[test]
    fn test_custom_bullet_item_gets_fresh_id() {
        let mut ctx = context();
        let list = Element::new("ul")
            .with_child(Element::new("li").with_text("plain"))
            .with_child(
                Element::new("li")
                    .with_style("list-style-type", "square")
                    .with_text("square"),
            );
        let xml = build_list(&mut ctx, &list, 9000);
        assert_eq!(num_ids(&xml), vec![(0, 1), (0, 2)]);
        assert_eq!(ctx.numbering_definitions().len(), 2);
    }

    #[test]
    fn test_deep_nesting_is_clamped() {
        let mut ctx = context();
        let mut inner = Element::new("ul").with_child(Element::new("li").with_text("deep"));
        for _ in 0..9 {
            inner = Element::new("ul").with_child(Element::new("li").with_child(inner));
        }
        let xml = build_list(&mut ctx, &inner, 9000);
        assert_eq!(num_ids(&xml).last().map(|(level, _)| *level), Some(7));
    }
}
