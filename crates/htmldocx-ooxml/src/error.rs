//! Error types for package generation

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while assembling a WordprocessingML package
#[derive(Error, Debug)]
pub enum ConvertError {
    /// ZIP archive error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XML writing error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A `data:` URI that does not have the `data:<mime>;base64,<payload>` shape
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    /// A font file that could not be read
    #[error("Cannot read font {}: {source}", path.display())]
    FontRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A font that is not a raw TrueType file
    #[error("Unsupported font format: {0}")]
    UnsupportedFontFormat(String),

    /// A remote resource could not be fetched
    #[error("Failed to fetch {url}: {reason}")]
    ResourceFetch { url: String, reason: String },

    /// Image metadata could not be read
    #[error("Cannot read image dimensions: {0}")]
    ImageProbe(String),

    /// Invalid document options
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type for package generation
pub type Result<T> = std::result::Result<T, ConvertError>;
