//! Header, footer and page background generation
//!
//! Header and footer parts are built like the body: their content goes
//! through the block walker with relationships directed to the part being
//! generated. Decorations from [`HeaderFooterConfig`] are anchored pictures
//! placed behind the text:
//!
//! - a background band spanning the page width, or a background fitted to
//!   the whole page;
//! - logos at the left, center or right of the page.
//!
//! Every generated band reports an estimated height so the body margins can
//! be pushed clear of it.

use std::sync::OnceLock;

use htmldocx_dom::Node;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::attributes::StyleBag;
use crate::collaborators::ImageSize;
use crate::color;
use crate::context::{CachedBackground, DocumentContext, HeaderFooterRef};
use crate::image::{self, Anchor, AxisPosition, Drawing, ImagePosition, RelativeFrom, WrapType};
use crate::relationships::{RelationshipId, RelationshipKind, TargetMode};
use crate::units;
use crate::walker::{self, BlockScope};
use crate::xml::{content_namespaces, XML_DECLARATION};

/// Smallest band height, in TWIP
pub const MIN_BAND_HEIGHT: i64 = 720;
/// Clearance added below the tallest band element, in TWIP
pub const BAND_PADDING: i64 = 240;
/// Distance between the band and the body, in TWIP
pub const BODY_CLEARANCE: i64 = 180;
/// Header/footer margin used once a band is measured, in TWIP
pub const BAND_MARGIN: i64 = 300;
/// Height of a header that only carries a section background, in TWIP
pub const BACKGROUND_HEADER_HEIGHT: i64 = 720;

/// Distance of logos from the page edge and the paragraph top, in EMU
const LOGO_OFFSET: i64 = 180000;

const BASE_CONTENT_HEIGHT: i64 = 360000;
const TABLE_CONTENT_HEIGHT: i64 = 432000;
const ROW_HEIGHT: i64 = 72000;
const DRAWING_HEIGHT: i64 = 36000;
const LONG_TEXT_HEIGHT: i64 = 72000;
const LONG_TEXT_CHARS: usize = 50;
const COUNTED_ITEMS: usize = 3;

// ==================== Configuration ====================

/// Decorations of a header or footer band
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderFooterConfig {
    /// Solid page color
    pub page_background: Option<String>,
    pub background_image: Option<BackgroundImage>,
    pub logos: Vec<Logo>,
}

/// Background picture of a band
///
/// Without a `size` the picture is a band spanning the page width at the
/// top (header) or bottom (footer) edge. With a `size` it is fitted to the
/// whole page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundImage {
    pub url: String,
    pub size: Option<BackgroundSize>,
    pub position: BackgroundPosition,
}

/// How a page background is scaled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundSize {
    /// Page width and height
    Stretch,
    /// Largest size fitting inside the page
    #[serde(alias = "fit")]
    Contain,
    /// Smallest size covering the page
    Cover,
    /// Pixel size
    #[default]
    Original,
}

impl BackgroundSize {
    /// Parse a size keyword, falling back to [`BackgroundSize::Original`]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "stretch" | "100% 100%" => Self::Stretch,
            "contain" | "fit" => Self::Contain,
            "cover" => Self::Cover,
            _ => Self::Original,
        }
    }
}

/// Anchor point of a page background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackgroundPosition {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    #[default]
    #[serde(alias = "middle-center")]
    Center,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl BackgroundPosition {
    /// Parse a position keyword (`top-left`, `bottom center`, ...)
    pub fn parse(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase().replace(' ', "-");
        match normalized.as_str() {
            "top-left" | "left-top" => Self::TopLeft,
            "top-center" | "top" | "center-top" => Self::TopCenter,
            "top-right" | "right-top" => Self::TopRight,
            "middle-left" | "left" | "center-left" | "left-center" => Self::MiddleLeft,
            "middle-right" | "right" | "center-right" | "right-center" => Self::MiddleRight,
            "bottom-left" | "left-bottom" => Self::BottomLeft,
            "bottom-center" | "bottom" | "center-bottom" => Self::BottomCenter,
            "bottom-right" | "right-bottom" => Self::BottomRight,
            _ => Self::Center,
        }
    }

    /// Horizontal and vertical alignment as fractions of the free space
    fn fractions(self) -> (f64, f64) {
        match self {
            Self::TopLeft => (0.0, 0.0),
            Self::TopCenter => (0.5, 0.0),
            Self::TopRight => (1.0, 0.0),
            Self::MiddleLeft => (0.0, 0.5),
            Self::Center => (0.5, 0.5),
            Self::MiddleRight => (1.0, 0.5),
            Self::BottomLeft => (0.0, 1.0),
            Self::BottomCenter => (0.5, 1.0),
            Self::BottomRight => (1.0, 1.0),
        }
    }
}

/// A logo placed in a band
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Logo {
    pub url: String,
    pub alignment: LogoAlignment,
    /// Pixels
    pub width: Option<f64>,
    /// Pixels
    pub height: Option<f64>,
}

/// Horizontal placement of a logo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoAlignment {
    #[default]
    Left,
    Center,
    Right,
}

// ==================== Cache keys ====================

/// Structural key of a section background
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackgroundKey {
    pub url: String,
    pub size: BackgroundSize,
    pub position: BackgroundPosition,
    pub repeat: Option<String>,
}

impl BackgroundKey {
    fn fingerprint(&self) -> String {
        format!(
            "{}|{:?}|{:?}|{}",
            self.url,
            self.size,
            self.position,
            self.repeat.as_deref().unwrap_or("")
        )
    }
}

/// Key of a header variant: header type plus background parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderVariantKey {
    pub header_type: String,
    pub background: BackgroundKey,
}

impl HeaderVariantKey {
    /// Short display name, `{type}_bg_{digest}`
    pub fn display_name(&self) -> String {
        let digest = Sha256::digest(self.background.fingerprint().as_bytes());
        let short: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();
        format!("{}_bg_{}", self.header_type, short)
    }
}

// ==================== Geometry ====================

/// Size and page offset of a fitted background, in EMU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundFit {
    pub width: i64,
    pub height: i64,
    pub x: i64,
    pub y: i64,
}

/// Fit a background picture against the page box
///
/// Offsets are clamped to the page origin.
pub fn fit_background(
    image: ImageSize,
    page_width: i64,
    page_height: i64,
    size: BackgroundSize,
    position: BackgroundPosition,
) -> BackgroundFit {
    let image_width = units::pixel_to_emu(image.width as f64);
    let image_height = units::pixel_to_emu(image.height as f64);

    let (width, height) = match size {
        BackgroundSize::Stretch => (page_width, page_height),
        BackgroundSize::Contain | BackgroundSize::Cover
            if image_width > 0 && image_height > 0 =>
        {
            let scale_x = page_width as f64 / image_width as f64;
            let scale_y = page_height as f64 / image_height as f64;
            let scale = if size == BackgroundSize::Contain {
                scale_x.min(scale_y)
            } else {
                scale_x.max(scale_y)
            };
            (
                (image_width as f64 * scale).round() as i64,
                (image_height as f64 * scale).round() as i64,
            )
        }
        _ => (image_width, image_height),
    };

    let (fx, fy) = position.fractions();
    let x = ((page_width - width) as f64 * fx).round() as i64;
    let y = ((page_height - height) as f64 * fy).round() as i64;
    BackgroundFit {
        width,
        height,
        x: x.max(0),
        y: y.max(0),
    }
}

fn text_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>").expect("valid text regex")
    })
}

/// Estimate the height of generated band content, in TWIP
pub fn estimate_content_height(xml: &str) -> i64 {
    let tables = xml.matches("<w:tbl>").count();
    let rows = xml.matches("<w:tr>").count();
    let drawings = xml.matches("<w:drawing>").count();

    let mut emu = if tables > 0 {
        TABLE_CONTENT_HEIGHT + rows.saturating_sub(1).min(COUNTED_ITEMS) as i64 * ROW_HEIGHT
    } else {
        BASE_CONTENT_HEIGHT
    };
    emu += drawings.min(COUNTED_ITEMS) as i64 * DRAWING_HEIGHT;

    if tables == 0 {
        let chars: usize = text_pattern()
            .captures_iter(xml)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().chars().count())
            .sum();
        if chars > LONG_TEXT_CHARS {
            emu += LONG_TEXT_HEIGHT;
        }
    }
    units::emu_to_twip(emu)
}

/// Height of a band, in TWIP
///
/// All inputs are TWIP. The result never exceeds a third of the page.
pub fn band_height(background: i64, logos: i64, content: i64, page_height: i64) -> i64 {
    let tallest = MIN_BAND_HEIGHT
        .max(background)
        .max(logos)
        .max(MIN_BAND_HEIGHT + content);
    (tallest + BAND_PADDING).min(page_height / 3)
}

// ==================== Parts ====================

/// Header or footer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandKind {
    Header,
    Footer,
}

impl BandKind {
    fn root(self) -> &'static str {
        match self {
            BandKind::Header => "w:hdr",
            BandKind::Footer => "w:ftr",
        }
    }

    fn style(self) -> &'static str {
        match self {
            BandKind::Header => "Header",
            BandKind::Footer => "Footer",
        }
    }

    fn part_name(self, id: u32) -> String {
        match self {
            BandKind::Header => format!("header{}", id),
            BandKind::Footer => format!("footer{}", id),
        }
    }

    fn allocate(self, ctx: &mut DocumentContext) -> u32 {
        match self {
            BandKind::Header => ctx.next_header_id(),
            BandKind::Footer => ctx.next_footer_id(),
        }
    }

    fn store(self, ctx: &mut DocumentContext, id: u32, xml: String) -> RelationshipId {
        match self {
            BandKind::Header => ctx.add_header_part(id, xml),
            BandKind::Footer => ctx.add_footer_part(id, xml),
        }
    }
}

/// Generate a header part and map it to `type_name`
pub fn build_header(
    ctx: &mut DocumentContext,
    content: Option<&[Node]>,
    config: Option<&HeaderFooterConfig>,
    type_name: &str,
) -> HeaderFooterRef {
    let header = build_band(ctx, BandKind::Header, content, config);
    log::debug!("Header {} ({}) height {:?}", header.id, type_name, header.height);
    ctx.set_header(type_name, header.clone());
    header
}

/// Generate a footer part and map it to `type_name`
///
/// The first paragraph gets a `PAGE` field when page numbers are enabled.
pub fn build_footer(
    ctx: &mut DocumentContext,
    content: Option<&[Node]>,
    config: Option<&HeaderFooterConfig>,
    type_name: &str,
) -> HeaderFooterRef {
    let footer = build_band(ctx, BandKind::Footer, content, config);
    log::debug!("Footer {} ({}) height {:?}", footer.id, type_name, footer.height);
    ctx.set_footer(type_name, footer.clone());
    footer
}

/// Generate an empty header or footer part and map it to `type_name`
pub fn build_empty(ctx: &mut DocumentContext, kind: BandKind, type_name: &str) -> HeaderFooterRef {
    let id = kind.allocate(ctx);
    let xml = wrap_part(kind, &styled_paragraph(kind, ""));
    let rel_id = kind.store(ctx, id, xml);
    let band = HeaderFooterRef {
        id,
        rel_id,
        height: None,
    };
    match kind {
        BandKind::Header => ctx.set_header(type_name, band.clone()),
        BandKind::Footer => ctx.set_footer(type_name, band.clone()),
    }
    band
}

/// Header carrying a section's page background
///
/// One part is generated per distinct `(header_type, background)` pair;
/// later sections with the same pair share it. Returns `None` when the
/// background cannot be loaded.
pub fn section_header(
    ctx: &mut DocumentContext,
    header_type: &str,
    background: &BackgroundKey,
) -> Option<HeaderFooterRef> {
    let key = HeaderVariantKey {
        header_type: header_type.to_string(),
        background: background.clone(),
    };
    if let Some(existing) = ctx.header_variant(&key) {
        return Some(existing.clone());
    }

    let id = ctx.next_header_id();
    let part = BandKind::Header.part_name(id);
    let run = ctx.in_part(&part, |ctx| page_background_run(ctx, background))?;
    let body = format!(
        r#"<w:p><w:pPr><w:spacing w:before="0" w:after="0"/></w:pPr>{}</w:p>{}"#,
        run,
        styled_paragraph(BandKind::Header, "")
    );
    let rel_id = ctx.add_header_part(id, wrap_part(BandKind::Header, &body));
    let header = HeaderFooterRef {
        id,
        rel_id,
        height: Some(BACKGROUND_HEADER_HEIGHT),
    };
    log::debug!("Header variant {} -> header{}", key.display_name(), id);
    ctx.insert_header_variant(key, header.clone());
    Some(header)
}

fn build_band(
    ctx: &mut DocumentContext,
    kind: BandKind,
    content: Option<&[Node]>,
    config: Option<&HeaderFooterConfig>,
) -> HeaderFooterRef {
    let id = kind.allocate(ctx);
    let part = kind.part_name(id);
    let (xml, height) = ctx.in_part(&part, |ctx| band_body(ctx, kind, content, config));
    let rel_id = kind.store(ctx, id, xml);
    HeaderFooterRef { id, rel_id, height }
}

fn band_body(
    ctx: &mut DocumentContext,
    kind: BandKind,
    content: Option<&[Node]>,
    config: Option<&HeaderFooterConfig>,
) -> (String, Option<i64>) {
    let mut anchored = String::new();
    let mut background_height = 0;
    let mut logo_height = 0;

    if let Some(config) = config {
        if let Some(page_color) = config.page_background.as_deref() {
            if !color::is_colorless(page_color) {
                ctx.page_background = Some(color::fixup_color(page_color));
            }
        }
        if let Some(background) = &config.background_image {
            match background.size {
                None => {
                    if let Some((run, height)) = band_background(ctx, kind, &background.url) {
                        anchored.push_str(&run);
                        background_height = height;
                    }
                }
                Some(size) => {
                    let key = BackgroundKey {
                        url: background.url.clone(),
                        size,
                        position: background.position,
                        repeat: None,
                    };
                    if let Some(run) = page_background_run(ctx, &key) {
                        anchored.push_str(&run);
                    }
                }
            }
        }
        for logo in &config.logos {
            if let Some((run, height)) = logo_run(ctx, logo) {
                anchored.push_str(&run);
                logo_height = logo_height.max(height);
            }
        }
    }

    let scope = BlockScope {
        inherited: StyleBag::default(),
        maximum_width: ctx.content_width(),
    };
    let mut blocks = content
        .map(|nodes| walker::build_blocks(ctx, nodes, &scope))
        .unwrap_or_default();
    let estimate = if content.is_some() {
        estimate_content_height(&blocks)
    } else {
        0
    };

    if kind == BandKind::Footer && ctx.page_number {
        let field = r#"<w:fldSimple w:instr="PAGE"><w:r><w:t>1</w:t></w:r></w:fldSimple>"#;
        blocks = match append_to_first_paragraph(&blocks, field) {
            Some(updated) => updated,
            None => format!("{}{}", blocks, styled_paragraph(kind, field)),
        };
    }

    if !anchored.is_empty() {
        blocks = match prepend_to_first_paragraph(&blocks, &anchored) {
            Some(updated) => updated,
            None => format!("{}{}", styled_paragraph(kind, &anchored), blocks),
        };
    }
    if blocks.is_empty() {
        blocks = styled_paragraph(kind, "");
    }

    let height = (content.is_some() || config.is_some()).then(|| {
        band_height(
            background_height,
            logo_height,
            estimate,
            ctx.geometry.height,
        )
    });
    (wrap_part(kind, &blocks), height)
}

fn wrap_part(kind: BandKind, body: &str) -> String {
    format!(
        "{}\n<{root} {}>{}</{root}>",
        XML_DECLARATION,
        content_namespaces(),
        body,
        root = kind.root()
    )
}

fn styled_paragraph(kind: BandKind, runs: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr>{}</w:p>"#,
        kind.style(),
        runs
    )
}

/// Insert runs at the start of the leading paragraph, after its properties
fn prepend_to_first_paragraph(blocks: &str, runs: &str) -> Option<String> {
    let rest = blocks.strip_prefix("<w:p>")?;
    let close = rest.find("</w:p>")?;
    let at = match rest[..close].find("</w:pPr>") {
        Some(pos) => pos + "</w:pPr>".len(),
        None => 0,
    };
    Some(format!("<w:p>{}{}{}", &rest[..at], runs, &rest[at..]))
}

/// Insert runs at the end of the leading paragraph
fn append_to_first_paragraph(blocks: &str, runs: &str) -> Option<String> {
    let rest = blocks.strip_prefix("<w:p>")?;
    let close = rest.find("</w:p>")?;
    Some(format!("<w:p>{}{}{}", &rest[..close], runs, &rest[close..]))
}

// ==================== Pictures ====================

/// Relate a background picture from the current part, reusing stored media
fn related_background(
    ctx: &mut DocumentContext,
    url: &str,
) -> Option<(RelationshipId, ImageSize)> {
    if let Some(cached) = ctx.cached_background(url).cloned() {
        let rel_id = ctx.relate(RelationshipKind::Image, cached.target, TargetMode::Internal);
        return Some((rel_id, cached.size));
    }
    match image::load_image(ctx, url) {
        Ok(loaded) => {
            ctx.cache_background(
                url,
                CachedBackground {
                    target: loaded.target,
                    size: loaded.size,
                },
            );
            Some((loaded.rel_id, loaded.size))
        }
        Err(e) => {
            log::warn!("Skipping background {}: {}", url, e);
            None
        }
    }
}

/// Picture run for a page background fitted against the whole page
fn page_background_run(ctx: &mut DocumentContext, background: &BackgroundKey) -> Option<String> {
    let (rel_id, size) = related_background(ctx, &background.url)?;
    let fit = fit_background(
        size,
        units::twip_to_emu(ctx.geometry.width),
        units::twip_to_emu(ctx.geometry.height),
        background.size,
        background.position,
    );
    let drawing = Drawing {
        id: ctx.next_drawing_id(),
        rel_id,
        name: "Page Background".to_string(),
        description: String::new(),
        width_emu: fit.width,
        height_emu: fit.height,
        position: ImagePosition::Anchor(Anchor::behind_page(fit.x, fit.y)),
    };
    Some(drawing.to_run_xml())
}

/// Full-width band at the top or bottom edge; returns the run and its height in TWIP
fn band_background(ctx: &mut DocumentContext, kind: BandKind, url: &str) -> Option<(String, i64)> {
    let (rel_id, size) = related_background(ctx, url)?;
    let page_width = units::twip_to_emu(ctx.geometry.width);
    let page_height = units::twip_to_emu(ctx.geometry.height);
    let height = if size.width == 0 {
        0
    } else {
        (page_width as f64 * size.height as f64 / size.width as f64).round() as i64
    };
    let y = match kind {
        BandKind::Header => 0,
        BandKind::Footer => (page_height - height).max(0),
    };
    let drawing = Drawing {
        id: ctx.next_drawing_id(),
        rel_id,
        name: "Background Picture".to_string(),
        description: String::new(),
        width_emu: page_width,
        height_emu: height,
        position: ImagePosition::Anchor(Anchor::behind_page(0, y)),
    };
    Some((drawing.to_run_xml(), units::emu_to_twip(height)))
}

/// Logo size in EMU from its declared pixel size and the probed size
fn logo_extent(logo: &Logo, original: ImageSize) -> (i64, i64) {
    let aspect = if original.height == 0 {
        1.0
    } else {
        original.width as f64 / original.height as f64
    };
    let (width, height) = match (logo.width, logo.height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, w / aspect),
        (None, Some(h)) => (h * aspect, h),
        (None, None) => (original.width as f64, original.height as f64),
    };
    (units::pixel_to_emu(width), units::pixel_to_emu(height))
}

/// Logo run; returns the run and the height it reaches below the paragraph top, in TWIP
fn logo_run(ctx: &mut DocumentContext, logo: &Logo) -> Option<(String, i64)> {
    let loaded = match image::load_image(ctx, &logo.url) {
        Ok(loaded) => loaded,
        Err(e) => {
            log::warn!("Skipping logo {}: {}", logo.url, e);
            return None;
        }
    };
    let (width, height) = logo_extent(logo, loaded.size);
    let page_width = units::twip_to_emu(ctx.geometry.width);
    let x = match logo.alignment {
        LogoAlignment::Left => LOGO_OFFSET,
        LogoAlignment::Center => (page_width - width) / 2,
        LogoAlignment::Right => page_width - width - LOGO_OFFSET,
    };
    let drawing = Drawing {
        id: ctx.next_drawing_id(),
        rel_id: loaded.rel_id,
        name: "Logo".to_string(),
        description: String::new(),
        width_emu: width,
        height_emu: height,
        position: ImagePosition::Anchor(Anchor {
            horizontal_from: RelativeFrom::Page,
            horizontal: AxisPosition::Offset(x.max(0)),
            vertical_from: RelativeFrom::Paragraph,
            vertical: AxisPosition::Offset(LOGO_OFFSET),
            wrap: WrapType::None,
            behind_doc: true,
        }),
    };
    Some((drawing.to_run_xml(), units::emu_to_twip(height + LOGO_OFFSET)))
}
