//! Shared fixtures for unit tests

use std::collections::HashMap;
use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::collaborators::{FetchedResource, ImageProber, ImageSize, RemoteFetcher};
use crate::error::{ConvertError, Result};

/// Encode a blank PNG of the given size
pub fn tiny_png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::new(width, height);
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

/// `data:image/png;base64,...` URI of a blank PNG
pub fn png_data_uri(width: u32, height: u32) -> String {
    format!(
        "data:image/png;base64,{}",
        STANDARD.encode(tiny_png(width, height))
    )
}

/// Prober that reports the same size for every input
pub struct FixedProber(pub ImageSize);

impl ImageProber for FixedProber {
    fn probe(&self, _bytes: &[u8]) -> Result<ImageSize> {
        Ok(self.0)
    }
}

/// Fetcher serving canned responses; unknown URLs fail
#[derive(Default)]
pub struct StaticFetcher {
    responses: HashMap<String, FetchedResource>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchedResource {
                bytes,
                content_type: content_type.map(str::to_string),
            },
        );
        self
    }
}

impl RemoteFetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedResource> {
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| ConvertError::ResourceFetch {
                url: url.to_string(),
                reason: "not found".to_string(),
            })
    }
}
