//! Document options
//!
//! Options are plain serde structs so they can be loaded from TOML:
//!
//! ```toml
//! orientation = "landscape"
//! font = "Arial"
//! font_size = "11pt"
//! header = true
//! page_number = true
//!
//! [margins]
//! top = "2cm"
//! left = "1in"
//!
//! [[fonts]]
//! name = "Open Sans"
//! path = "fonts/OpenSans-Regular.ttf"
//! ```
//!
//! Lengths are either a bare number (TWIP) or a string with a `px`, `pt`,
//! `cm`, `mm` or `in` unit. Font sizes are a bare number (half-points) or a
//! string with a `pt` or `px` unit.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::css::Length;
use crate::error::{ConvertError, Result};
use crate::header_footer::HeaderFooterConfig;
use crate::units;

/// Default page width (US Letter), in TWIP
pub const DEFAULT_PAGE_WIDTH: i64 = 12240;
/// Default page height (US Letter), in TWIP
pub const DEFAULT_PAGE_HEIGHT: i64 = 15840;
/// Default font
pub const DEFAULT_FONT: &str = "Times New Roman";
/// Default font size, in half-points
pub const DEFAULT_FONT_SIZE: u32 = 22;
/// Default language tag
pub const DEFAULT_LANG: &str = "en-US";
/// Application name written to document properties
pub const APPLICATION_NAME: &str = "htmldocx";

/// A length given as TWIP or as a string with units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Measure {
    Twip(f64),
    Text(String),
}

impl Measure {
    /// Normalize to TWIP
    pub fn to_twip(&self) -> Result<i64> {
        match self {
            Measure::Twip(n) => Ok(n.round() as i64),
            Measure::Text(s) => {
                if let Ok(n) = s.trim().parse::<f64>() {
                    return Ok(n.round() as i64);
                }
                Length::try_parse(s)
                    .and_then(Length::to_twip)
                    .ok_or_else(|| ConvertError::Config(format!("Invalid length: {}", s)))
            }
        }
    }
}

/// A font size given as half-points or as a string with units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FontSize {
    HalfPoints(u32),
    Text(String),
}

impl FontSize {
    /// Normalize to half-points
    pub fn to_hip(&self) -> Result<u32> {
        match self {
            FontSize::HalfPoints(n) => Ok(*n),
            FontSize::Text(s) => {
                let invalid = || ConvertError::Config(format!("Invalid font size: {}", s));
                match Length::try_parse(s).ok_or_else(invalid)? {
                    Length::Pt(n) => Ok(units::point_to_hip(n)),
                    Length::Px(n) if s.trim().ends_with("px") => Ok(units::pixel_to_hip(n)),
                    // A bare number is already in half-points
                    Length::Px(n) => Ok(n.round() as u32),
                    _ => Err(invalid()),
                }
            }
        }
    }
}

/// Page orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Page size; missing sides use US Letter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<Measure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<Measure>,
}

/// Page margins; missing sides use the orientation's defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarginOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<Measure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Measure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<Measure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<Measure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<Measure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<Measure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gutter: Option<Measure>,
}

/// Resolved page margins, in TWIP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMargins {
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
    pub left: i64,
    pub header: i64,
    pub footer: i64,
    pub gutter: i64,
}

impl PageMargins {
    /// Default margins for an orientation
    pub fn defaults(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Portrait => Self {
                top: 1440,
                right: 1800,
                bottom: 1440,
                left: 1800,
                header: 720,
                footer: 720,
                gutter: 0,
            },
            Orientation::Landscape => Self {
                top: 1800,
                right: 1440,
                bottom: 1800,
                left: 1440,
                header: 720,
                footer: 720,
                gutter: 0,
            },
        }
    }
}

/// Resolved page box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGeometry {
    pub width: i64,
    pub height: i64,
    pub orientation: Orientation,
    pub margins: PageMargins,
}

impl PageGeometry {
    /// Width available to body content
    pub fn content_width(&self) -> i64 {
        (self.width - self.margins.left - self.margins.right).max(0)
    }
}

/// Line numbering restart rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LineNumberRestart {
    #[default]
    Continuous,
    NewPage,
    NewSection,
}

impl LineNumberRestart {
    /// The `w:restart` value
    pub fn as_ooxml(self) -> &'static str {
        match self {
            LineNumberRestart::Continuous => "continuous",
            LineNumberRestart::NewPage => "newPage",
            LineNumberRestart::NewSection => "newSection",
        }
    }
}

/// Line numbering in the left margin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineNumberOptions {
    pub count_by: u32,
    pub start: u32,
    pub restart: LineNumberRestart,
}

impl Default for LineNumberOptions {
    fn default() -> Self {
        Self {
            count_by: 1,
            start: 0,
            restart: LineNumberRestart::Continuous,
        }
    }
}

/// A font file to embed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSource {
    pub name: String,
    pub path: PathBuf,
}

/// Paragraph spacing in lines of 15.6pt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParagraphSpacing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub above: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below: Option<f64>,
}

/// Document-wide spacing defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpacingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_paragraph_spacing: Option<ParagraphSpacing>,
    /// Line spacing in points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_line_spacing: Option<f64>,
}

/// Table row options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowOptions {
    #[serde(default)]
    pub cant_split: bool,
}

/// Table options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableOptions {
    #[serde(default)]
    pub row: RowOptions,
}

/// Options for one conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentOptions {
    pub orientation: Orientation,
    pub page_size: PageSize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margins: Option<MarginOptions>,

    pub title: String,
    pub subject: String,
    pub creator: String,
    pub keywords: Vec<String>,
    pub description: String,
    pub last_modified_by: String,
    pub revision: u32,
    /// W3CDTF timestamp; defaults to the conversion time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,

    pub header: bool,
    pub header_type: String,
    pub footer: bool,
    pub footer_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_config: Option<HeaderFooterConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer_config: Option<HeaderFooterConfig>,
    pub page_number: bool,
    pub skip_first_header_footer: bool,

    pub font: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<FontSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complex_script_font_size: Option<FontSize>,
    pub lang: String,
    pub default_line_height: f64,
    pub spacing: SpacingOptions,

    pub table: TableOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<LineNumberOptions>,
    pub fonts: Vec<FontSource>,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            orientation: Orientation::Portrait,
            page_size: PageSize::default(),
            margins: None,
            title: String::new(),
            subject: String::new(),
            creator: APPLICATION_NAME.to_string(),
            keywords: vec![APPLICATION_NAME.to_string()],
            description: String::new(),
            last_modified_by: APPLICATION_NAME.to_string(),
            revision: 1,
            created: None,
            modified: None,
            header: false,
            header_type: "default".to_string(),
            footer: false,
            footer_type: "default".to_string(),
            header_config: None,
            footer_config: None,
            page_number: false,
            skip_first_header_footer: false,
            font: DEFAULT_FONT.to_string(),
            font_size: None,
            complex_script_font_size: None,
            lang: DEFAULT_LANG.to_string(),
            default_line_height: 1.5,
            spacing: SpacingOptions::default(),
            table: TableOptions::default(),
            line_number: None,
            fonts: Vec::new(),
        }
    }
}

impl DocumentOptions {
    /// Resolve page size, orientation and margins to TWIP
    ///
    /// Landscape swaps the configured width and height.
    pub fn page_geometry(&self) -> Result<PageGeometry> {
        let width = match &self.page_size.width {
            Some(m) => m.to_twip()?,
            None => DEFAULT_PAGE_WIDTH,
        };
        let height = match &self.page_size.height {
            Some(m) => m.to_twip()?,
            None => DEFAULT_PAGE_HEIGHT,
        };
        let (width, height) = match self.orientation {
            Orientation::Portrait => (width, height),
            Orientation::Landscape => (height, width),
        };

        let mut margins = PageMargins::defaults(self.orientation);
        if let Some(m) = &self.margins {
            let sides: [(&Option<Measure>, &mut i64); 7] = [
                (&m.top, &mut margins.top),
                (&m.right, &mut margins.right),
                (&m.bottom, &mut margins.bottom),
                (&m.left, &mut margins.left),
                (&m.header, &mut margins.header),
                (&m.footer, &mut margins.footer),
                (&m.gutter, &mut margins.gutter),
            ];
            for (source, target) in sides {
                if let Some(measure) = source {
                    *target = measure.to_twip()?;
                }
            }
        }

        Ok(PageGeometry {
            width,
            height,
            orientation: self.orientation,
            margins,
        })
    }

    /// Default font size in half-points
    pub fn font_size_hip(&self) -> Result<u32> {
        self.font_size
            .as_ref()
            .map_or(Ok(DEFAULT_FONT_SIZE), FontSize::to_hip)
    }

    /// Default complex-script font size in half-points
    pub fn complex_script_font_size_hip(&self) -> Result<u32> {
        self.complex_script_font_size
            .as_ref()
            .map_or(Ok(DEFAULT_FONT_SIZE), FontSize::to_hip)
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConvertError::Config(format!("Failed to serialize options: {}", e)))
    }

    /// Deserialize from TOML
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| ConvertError::Config(format!("Failed to parse options: {}", e)))
    }
}
