//! htmldocx-dom - HTML element tree definitions
//!
//! This crate provides the tree types consumed by the htmldocx converter,
//! plus a lenient XHTML parser that produces them.
//!
//! ## Example
//!
//! ```
//! use htmldocx_dom::{parse_html, Node};
//!
//! let nodes = parse_html("<p style=\"color: red\">Hello</p>")?;
//! let Node::Element(p) = &nodes[0] else { panic!() };
//! assert_eq!(p.tag, "p");
//! assert_eq!(p.css("color"), Some("red"));
//! # Ok::<(), htmldocx_dom::DomError>(())
//! ```

pub mod error;
pub mod node;
pub mod parser;
pub mod style;

pub use error::{DomError, Result};
pub use node::{Element, Node};
pub use parser::parse_html;
pub use style::StyleMap;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
