//! Inline style declarations
//!
//! An element's `style="..."` attribute is split into property/value pairs
//! once, at tree construction time. Property names are lowercased, values are
//! trimmed and `!important` is dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Parsed inline style declarations of one element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleMap(BTreeMap<String, String>);

impl StyleMap {
    /// Create an empty style map
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a CSS declaration list such as `color: red; margin: 0 auto`
    ///
    /// Semicolons inside parentheses or quotes (for example in
    /// `url("data:image/png;base64,...")`) do not end a declaration.
    pub fn parse(css: &str) -> Self {
        let mut map = Self::new();
        for declaration in split_declarations(css) {
            if let Some((name, value)) = declaration.split_once(':') {
                map.insert(name, value);
            }
        }
        map
    }

    /// Insert or replace a declaration
    pub fn insert(&mut self, property: &str, value: &str) {
        let property = property.trim().to_ascii_lowercase();
        let mut value = value.trim();
        if let Some(stripped) = value.strip_suffix("!important") {
            value = stripped.trim_end();
        }
        if property.is_empty() || value.is_empty() {
            return;
        }
        self.0.insert(property, value.to_string());
    }

    /// Get a declaration value
    pub fn get(&self, property: &str) -> Option<&str> {
        self.0.get(property).map(|s| s.as_str())
    }

    /// Check whether a property is declared
    pub fn contains(&self, property: &str) -> bool {
        self.0.contains_key(property)
    }

    /// Iterate declarations in property-name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of declarations
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no declarations
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn split_declarations(css: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in css.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&css[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&css[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_declarations() {
        let style = StyleMap::parse("color: red; Font-Size: 12pt;");
        assert_eq!(style.get("color"), Some("red"));
        assert_eq!(style.get("font-size"), Some("12pt"));
        assert_eq!(style.len(), 2);
    }

    #[test]
    fn test_parse_keeps_semicolons_inside_url() {
        let style = StyleMap::parse(
            "background-image: url(\"data:image/png;base64,AAAA\"); color: blue",
        );
        assert_eq!(
            style.get("background-image"),
            Some("url(\"data:image/png;base64,AAAA\")")
        );
        assert_eq!(style.get("color"), Some("blue"));
    }

    #[test]
    fn test_important_is_dropped() {
        let style = StyleMap::parse("font-weight: bold !important");
        assert_eq!(style.get("font-weight"), Some("bold"));
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let style = StyleMap::parse("color:; : red; ;");
        assert!(style.is_empty());
    }

    #[test]
    fn test_later_declaration_wins() {
        let style = StyleMap::parse("color: red; color: green");
        assert_eq!(style.get("color"), Some("green"));
    }
}
