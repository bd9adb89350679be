//! # htmldocx-ooxml
//!
//! WordprocessingML generation from HTML element trees.
//!
//! This crate provides:
//! - Unit and color conversion for CSS values
//! - A registry for media, relationships, numbering and fonts
//! - Paragraph, list, table and image builders
//! - Headers, footers, sections and page backgrounds
//! - Embedded font obfuscation
//! - Package assembly into a `.docx` archive
//!
//! ## Example
//!
//! ```no_run
//! use htmldocx_dom::parse_html;
//! use htmldocx_ooxml::{DocumentOptions, DocxWriter};
//!
//! let body = parse_html("<h1>Report</h1><p>Hello <b>world</b></p>").unwrap();
//! let bytes = DocxWriter::new(DocumentOptions::default()).generate(&body, None, None)?;
//! std::fs::write("report.docx", bytes)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod archive;
pub mod attributes;
pub mod collaborators;
pub mod color;
pub mod context;
pub mod css;
pub mod error;
pub mod fonts;
pub mod header_footer;
pub mod image;
pub mod list;
pub mod media;
pub mod numbering;
pub mod odttf;
pub mod options;
pub mod package;
pub mod paragraph;
pub mod parts;
pub mod relationships;
pub mod table;
pub mod units;
pub mod walker;
pub mod xml;

#[cfg(test)]
mod test_utils;

pub use archive::{OoxmlPackage, PartWriter};
pub use collaborators::{
    FetchedResource, HttpFetcher, ImageProber, ImageSize, OfflineFetcher, RasterProber,
    RemoteFetcher,
};
pub use context::DocumentContext;
pub use error::{ConvertError, Result};
pub use header_footer::{BackgroundImage, BackgroundPosition, BackgroundSize, HeaderFooterConfig, Logo};
pub use options::{DocumentOptions, FontSource, Orientation};
pub use package::DocxWriter;
pub use relationships::Relationships;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
