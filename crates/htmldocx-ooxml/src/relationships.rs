//! Relationship tables for package parts
//!
//! Every part that references another part or an external resource owns a
//! `_rels/<part>.xml.rels` file mapping ids to targets. Ids are allocated in
//! insertion order and never reused.
//!
//! # Example
//!
//! ```
//! use htmldocx_ooxml::relationships::{RelationshipKind, Relationships, TargetMode};
//!
//! let mut rels = Relationships::new();
//! let id = rels.add(RelationshipKind::Image, "media/image-1.png", TargetMode::Internal);
//! assert_eq!(id.to_string(), "rId1");
//! ```

use std::fmt;

use crate::xml::{escape_xml, XML_DECLARATION};

/// OOXML namespace for relationships
pub const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Relationship types used by generated packages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    OfficeDocument,
    CoreProperties,
    Styles,
    Settings,
    WebSettings,
    FontTable,
    Numbering,
    Theme,
    Hyperlink,
    Image,
    Header,
    Footer,
    Font,
}

impl RelationshipKind {
    /// The relationship type URI
    pub fn uri(self) -> &'static str {
        match self {
            Self::OfficeDocument => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument"
            }
            Self::CoreProperties => {
                "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties"
            }
            Self::Styles => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles"
            }
            Self::Settings => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings"
            }
            Self::WebSettings => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/webSettings"
            }
            Self::FontTable => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/fontTable"
            }
            Self::Numbering => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering"
            }
            Self::Theme => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme"
            }
            Self::Hyperlink => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink"
            }
            Self::Image => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image"
            }
            Self::Header => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header"
            }
            Self::Footer => {
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer"
            }
            Self::Font => "http://schemas.openxmlformats.org/officeDocument/2006/relationships/font",
        }
    }
}

/// Whether a target lives inside the package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetMode {
    #[default]
    Internal,
    External,
}

/// A relationship id, rendered as `rId{n}` or `rId{name}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelationshipId {
    /// Sequentially allocated id
    Numbered(u32),
    /// Caller-chosen stable id (embedded fonts)
    Named(String),
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipId::Numbered(n) => write!(f, "rId{}", n),
            RelationshipId::Named(name) => write!(f, "rId{}", name),
        }
    }
}

/// One relationship entry
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: RelationshipId,
    pub kind: RelationshipKind,
    /// Part path relative to the owning part, or an external URL
    pub target: String,
    pub mode: TargetMode,
}

/// Relationship table of one part
///
/// Maintains insertion order for deterministic XML serialization.
#[derive(Debug, Clone)]
pub struct Relationships {
    entries: Vec<Relationship>,
    /// Counter for generating unique IDs (starts at 1)
    next_id_counter: u32,
}

impl Default for Relationships {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id_counter: 1, // IDs start at rId1
        }
    }
}

impl Relationships {
    /// Create an empty relationship table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a relationship and return the generated id
    pub fn add(
        &mut self,
        kind: RelationshipKind,
        target: impl Into<String>,
        mode: TargetMode,
    ) -> RelationshipId {
        let id = RelationshipId::Numbered(self.next_id_counter);
        self.next_id_counter += 1;
        self.entries.push(Relationship {
            id: id.clone(),
            kind,
            target: target.into(),
            mode,
        });
        id
    }

    /// Add a relationship under a caller-chosen name
    ///
    /// If an entry with that name already exists it is returned unchanged,
    /// so repeat registrations keep a stable id. Named entries do not
    /// advance the numeric counter.
    pub fn add_named(
        &mut self,
        name: &str,
        kind: RelationshipKind,
        target: impl Into<String>,
        mode: TargetMode,
    ) -> RelationshipId {
        let id = RelationshipId::Named(name.to_string());
        if self.contains(&id) {
            return id;
        }
        self.entries.push(Relationship {
            id: id.clone(),
            kind,
            target: target.into(),
            mode,
        });
        id
    }

    /// Serialize relationships to OOXML format
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str(XML_DECLARATION);
        xml.push('\n');
        xml.push_str(&format!(r#"<Relationships xmlns="{}">"#, RELATIONSHIPS_NS));
        xml.push('\n');

        for rel in &self.entries {
            xml.push_str("  <Relationship");
            xml.push_str(&format!(r#" Id="{}""#, rel.id));
            xml.push_str(&format!(r#" Type="{}""#, rel.kind.uri()));
            xml.push_str(&format!(r#" Target="{}""#, escape_xml(&rel.target)));
            if rel.mode == TargetMode::External {
                xml.push_str(r#" TargetMode="External""#);
            }
            xml.push_str("/>\n");
        }

        xml.push_str("</Relationships>");
        xml
    }

    /// Get the relationship with the given id
    pub fn get(&self, id: &RelationshipId) -> Option<&Relationship> {
        self.entries.iter().find(|r| &r.id == id)
    }

    /// Check if a relationship id exists
    pub fn contains(&self, id: &RelationshipId) -> bool {
        self.get(id).is_some()
    }

    /// Find the first relationship of a kind with the given target
    pub fn find(&self, kind: RelationshipKind, target: &str) -> Option<&Relationship> {
        self.entries
            .iter()
            .find(|r| r.kind == kind && r.target == target)
    }

    /// Get the number of relationships
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no relationships
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over relationships in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.entries.iter()
    }

    /// Get the next id that would be generated (without incrementing)
    pub fn peek_next_id(&self) -> RelationshipId {
        RelationshipId::Numbered(self.next_id_counter)
    }
}
