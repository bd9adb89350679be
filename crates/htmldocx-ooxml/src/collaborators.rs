//! I/O collaborators
//!
//! The converter never touches the network or decodes images itself. It
//! talks to two narrow traits, with default implementations backed by
//! `reqwest` and `image`:
//!
//! - [`RemoteFetcher`]: `url -> {bytes, content type}`
//! - [`ImageProber`]: `bytes -> {width, height}` in pixels
//!
//! Package output goes through [`crate::archive::PartWriter`].

use std::io::Cursor;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::error::{ConvertError, Result};

/// Pixel dimensions of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Reads image dimensions from encoded bytes
pub trait ImageProber {
    fn probe(&self, bytes: &[u8]) -> Result<ImageSize>;
}

/// A fetched remote resource
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    /// `Content-Type` header, when the server sent one
    pub content_type: Option<String>,
}

/// Fetches remote resources by URL
pub trait RemoteFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedResource>;
}

/// Prober for raster formats via the `image` crate, plus SVG size attributes
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterProber;

impl ImageProber for RasterProber {
    fn probe(&self, bytes: &[u8]) -> Result<ImageSize> {
        if looks_like_svg(bytes) {
            return svg_size(bytes);
        }
        let (width, height) = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| ConvertError::ImageProbe(e.to_string()))?;
        Ok(ImageSize { width, height })
    }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
    let head = head.trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

fn svg_size(bytes: &[u8]) -> Result<ImageSize> {
    static ATTR: OnceLock<Regex> = OnceLock::new();
    static VIEWBOX: OnceLock<Regex> = OnceLock::new();
    let attr = ATTR.get_or_init(|| {
        Regex::new(r#"<svg[^>]*?\s(width|height)\s*=\s*["']\s*([\d.]+)(?:px)?\s*["'][^>]*?\s(width|height)\s*=\s*["']\s*([\d.]+)(?:px)?\s*["']"#)
            .expect("valid svg size regex")
    });
    let viewbox = VIEWBOX.get_or_init(|| {
        Regex::new(r#"viewBox\s*=\s*["']\s*[-\d.]+[\s,]+[-\d.]+[\s,]+([\d.]+)[\s,]+([\d.]+)\s*["']"#)
            .expect("valid viewBox regex")
    });

    let text = String::from_utf8_lossy(bytes);
    if let Some(caps) = attr.captures(&text) {
        let first: f64 = caps[2].parse().unwrap_or(0.0);
        let second: f64 = caps[4].parse().unwrap_or(0.0);
        let (width, height) = if &caps[1] == "width" {
            (first, second)
        } else {
            (second, first)
        };
        if width > 0.0 && height > 0.0 {
            return Ok(ImageSize {
                width: width.round() as u32,
                height: height.round() as u32,
            });
        }
    }
    if let Some(caps) = viewbox.captures(&text) {
        let width: f64 = caps[1].parse().unwrap_or(0.0);
        let height: f64 = caps[2].parse().unwrap_or(0.0);
        if width > 0.0 && height > 0.0 {
            return Ok(ImageSize {
                width: width.round() as u32,
                height: height.round() as u32,
            });
        }
    }
    Err(ConvertError::ImageProbe(
        "SVG without width/height or viewBox".to_string(),
    ))
}

/// Blocking HTTP fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Default request timeout
    pub const TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a fetcher with the default timeout
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Self::TIMEOUT)
            .user_agent(concat!("htmldocx/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConvertError::Other(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl RemoteFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedResource> {
        let fetch_error = |reason: String| ConvertError::ResourceFetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| fetch_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_error(format!("HTTP {}", response.status())));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = response.bytes().map_err(|e| fetch_error(e.to_string()))?;

        Ok(FetchedResource {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

/// Fetcher that refuses every request; remote images are skipped
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl RemoteFetcher for OfflineFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedResource> {
        Err(ConvertError::ResourceFetch {
            url: url.to_string(),
            reason: "remote fetching is disabled".to_string(),
        })
    }
}
