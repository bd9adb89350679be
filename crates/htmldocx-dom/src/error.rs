//! Error types for markup parsing

use thiserror::Error;

/// Errors that can occur while parsing markup into an element tree
#[derive(Error, Debug)]
pub enum DomError {
    /// XML tokenizer error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Markup that cannot be recovered from
    #[error("Malformed markup at byte {position}: {message}")]
    Malformed { position: u64, message: String },
}

/// Result type for markup parsing
pub type Result<T> = std::result::Result<T, DomError>;
