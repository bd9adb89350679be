//! Picture runs
//!
//! Images are embedded via `<w:drawing>` elements holding either an inline
//! (`<wp:inline>`) or anchored (`<wp:anchor>`) picture:
//!
//! ```xml
//! <w:drawing>
//!   <wp:inline|wp:anchor>
//!     <wp:extent cx="..." cy="..."/>                <!-- EMU -->
//!     <wp:docPr id="..." name="..."/>
//!     <a:graphic>
//!       <a:graphicData uri="...picture">
//!         <pic:pic>
//!           <pic:blipFill><a:blip r:embed="rIdN"/></pic:blipFill>
//!         </pic:pic>
//!       </a:graphicData>
//!     </a:graphic>
//!   </wp:inline|wp:anchor>
//! </w:drawing>
//! ```
//!
//! Sizes are computed from the probed pixel size, the element's `width` and
//! `height` (style or attribute) and the available width.

use htmldocx_dom::Element;

use crate::collaborators::ImageSize;
use crate::context::DocumentContext;
use crate::css::Length;
use crate::error::Result;
use crate::media;
use crate::relationships::{RelationshipId, RelationshipKind, TargetMode};
use crate::units;
use crate::xml::{escape_xml, NS_A, NS_PIC, NS_R};

/// Offset of floated pictures from their anchor, in EMU
const FLOAT_OFFSET: i64 = 19050;
/// Text distance around square-wrapped pictures, in EMU
const WRAP_DISTANCE: i64 = 228600;

/// Frame an anchor offset is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeFrom {
    Page,
    Column,
    Paragraph,
}

impl RelativeFrom {
    fn as_ooxml(self) -> &'static str {
        match self {
            RelativeFrom::Page => "page",
            RelativeFrom::Column => "column",
            RelativeFrom::Paragraph => "paragraph",
        }
    }
}

/// Position along one axis of an anchored picture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisPosition {
    /// Offset in EMU
    Offset(i64),
    /// Named alignment (`left`, `right`, `center`)
    Align(&'static str),
}

/// Text wrapping style for anchored pictures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapType {
    /// No text wrapping
    #[default]
    None,
    /// Square wrapping (text flows around bounding box)
    Square,
}

impl WrapType {
    fn to_xml(self) -> String {
        match self {
            WrapType::None => "<wp:wrapNone/>".to_string(),
            WrapType::Square => format!(
                r#"<wp:wrapSquare wrapText="bothSides" distB="{d}" distT="{d}" distL="{d}" distR="{d}"/>"#,
                d = WRAP_DISTANCE
            ),
        }
    }
}

/// Placement of an anchored picture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub horizontal_from: RelativeFrom,
    pub horizontal: AxisPosition,
    pub vertical_from: RelativeFrom,
    pub vertical: AxisPosition,
    pub wrap: WrapType,
    /// Drawn behind body text
    pub behind_doc: bool,
}

impl Anchor {
    /// Square-wrapped picture floated to one side of the column
    pub fn float(right: bool) -> Self {
        Self {
            horizontal_from: RelativeFrom::Column,
            horizontal: if right {
                AxisPosition::Align("right")
            } else {
                AxisPosition::Offset(FLOAT_OFFSET)
            },
            vertical_from: RelativeFrom::Paragraph,
            vertical: AxisPosition::Offset(FLOAT_OFFSET),
            wrap: WrapType::Square,
            behind_doc: false,
        }
    }

    /// Picture behind the text at a fixed offset on the page
    pub fn behind_page(x: i64, y: i64) -> Self {
        Self {
            horizontal_from: RelativeFrom::Page,
            horizontal: AxisPosition::Offset(x),
            vertical_from: RelativeFrom::Page,
            vertical: AxisPosition::Offset(y),
            wrap: WrapType::None,
            behind_doc: true,
        }
    }
}

/// Image positioning type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImagePosition {
    /// Flows inline with text
    #[default]
    Inline,
    /// Floating, anchored to a position
    Anchor(Anchor),
}

/// A picture ready to be serialized
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    /// `wp:docPr` id
    pub id: u32,
    /// Image relationship in the owning part
    pub rel_id: RelationshipId,
    pub name: String,
    pub description: String,
    pub width_emu: i64,
    pub height_emu: i64,
    pub position: ImagePosition,
}

impl Drawing {
    /// Serialize as a `<w:drawing>` element
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<w:drawing>");
        match &self.position {
            ImagePosition::Inline => {
                xml.push_str(r#"<wp:inline distT="0" distB="0" distL="0" distR="0">"#);
                self.push_frame(&mut xml, None);
                xml.push_str("</wp:inline>");
            }
            ImagePosition::Anchor(anchor) => {
                xml.push_str(&format!(
                    r#"<wp:anchor distT="0" distB="0" distL="0" distR="0" simplePos="0" relativeHeight="0" behindDoc="{}" locked="0" layoutInCell="1" allowOverlap="1">"#,
                    if anchor.behind_doc { 1 } else { 0 }
                ));
                xml.push_str(r#"<wp:simplePos x="0" y="0"/>"#);
                push_axis(&mut xml, "positionH", anchor.horizontal_from, anchor.horizontal);
                push_axis(&mut xml, "positionV", anchor.vertical_from, anchor.vertical);
                self.push_frame(&mut xml, Some(anchor.wrap));
                xml.push_str("</wp:anchor>");
            }
        }
        xml.push_str("</w:drawing>");
        xml
    }

    /// Serialize as a run holding the drawing
    pub fn to_run_xml(&self) -> String {
        format!("<w:r>{}</w:r>", self.to_xml())
    }

    fn push_frame(&self, xml: &mut String, wrap: Option<WrapType>) {
        xml.push_str(&format!(
            r#"<wp:extent cx="{}" cy="{}"/>"#,
            self.width_emu, self.height_emu
        ));
        xml.push_str(r#"<wp:effectExtent l="0" t="0" r="0" b="0"/>"#);
        if let Some(wrap) = wrap {
            xml.push_str(&wrap.to_xml());
        }
        self.push_graphic(xml);
    }

    fn push_graphic(&self, xml: &mut String) {
        let name = escape_xml(&self.name);
        xml.push_str(&format!(
            r#"<wp:docPr id="{}" name="{}" descr="{}"/>"#,
            self.id,
            name,
            escape_xml(&self.description)
        ));
        xml.push_str(&format!(
            r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks xmlns:a="{}" noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
            NS_A
        ));
        xml.push_str(&format!(
            r#"<a:graphic xmlns:a="{}"><a:graphicData uri="{}">"#,
            NS_A, NS_PIC
        ));
        xml.push_str(&format!(r#"<pic:pic xmlns:pic="{}">"#, NS_PIC));
        xml.push_str(&format!(
            r#"<pic:nvPicPr><pic:cNvPr id="{}" name="{}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            self.id, name
        ));
        xml.push_str(&format!(
            r#"<pic:blipFill><a:blip r:embed="{}" xmlns:r="{}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            self.rel_id, NS_R
        ));
        xml.push_str(&format!(
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{}" cy="{}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            self.width_emu, self.height_emu
        ));
        xml.push_str("</pic:pic></a:graphicData></a:graphic>");
    }
}

fn push_axis(xml: &mut String, element: &str, from: RelativeFrom, position: AxisPosition) {
    let inner = match position {
        AxisPosition::Offset(offset) => format!("<wp:posOffset>{}</wp:posOffset>", offset),
        AxisPosition::Align(align) => format!("<wp:align>{}</wp:align>", align),
    };
    xml.push_str(&format!(
        r#"<wp:{e} relativeFrom="{}">{}</wp:{e}>"#,
        from.as_ooxml(),
        inner,
        e = element
    ));
}

/// An image stored as media and related from the current part
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedImage {
    pub rel_id: RelationshipId,
    /// Relationship target (`media/image-N.ext`)
    pub target: String,
    pub file_name: String,
    pub size: ImageSize,
}

/// Store an image source as media and probe its pixel size
///
/// `data:` URIs are decoded; anything else goes through the context's
/// fetcher. The image relationship is added to the current part.
pub fn load_image(ctx: &mut DocumentContext, src: &str) -> Result<LoadedImage> {
    let (bytes, mime) = if media::is_data_uri(src) {
        let decoded = media::parse_data_uri(src)?;
        (decoded.payload, decoded.mime)
    } else {
        let fetched = ctx.fetch(src)?;
        let mime = fetched
            .content_type
            .as_deref()
            .filter(|ct| ct.starts_with("image/"))
            .map(str::to_string)
            .unwrap_or_else(|| mime_from_url(src));
        (fetched.bytes, mime)
    };

    // Unreadable images never reach the media list
    let size = ctx.probe(&bytes)?;
    let media = ctx.register_media_bytes(bytes, &mime);
    let (target, file_name) = (media.target(), media.file_name.clone());
    let rel_id = ctx.relate(RelationshipKind::Image, target.clone(), TargetMode::Internal);

    Ok(LoadedImage {
        rel_id,
        target,
        file_name,
        size,
    })
}

/// MIME type guessed from a URL's file extension, defaulting to PNG
fn mime_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let extension = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .unwrap_or("");
    match media::content_type_for_extension(extension) {
        "application/octet-stream" => "image/png".to_string(),
        mime => mime.to_string(),
    }
}

/// Compute picture extents in EMU
///
/// The probed size is clamped to `maximum_width` (TWIP) keeping the aspect
/// ratio. A declared width or height (px, other absolute units, or a
/// percentage of the clamped size) overrides it, and a missing side follows
/// the aspect ratio. The result never exceeds `maximum_width`.
pub fn compute_image_dimensions(
    element: &Element,
    original: ImageSize,
    maximum_width: i64,
) -> (i64, i64) {
    let aspect = if original.height == 0 {
        1.0
    } else {
        original.width as f64 / original.height as f64
    };
    let maximum_emu = units::twip_to_emu(maximum_width);
    let mut base_width = units::pixel_to_emu(original.width as f64);
    let mut base_height = units::pixel_to_emu(original.height as f64);
    if base_width > maximum_emu {
        base_width = maximum_emu;
        base_height = (base_width as f64 / aspect).round() as i64;
    }

    let declared = |name: &str| {
        element
            .css(name)
            .or_else(|| element.attr(name))
            .and_then(Length::try_parse)
    };
    let resolve = |length: Length, base: i64| match length {
        Length::Percent(p) => Some((p / 100.0 * base as f64).round() as i64),
        Length::Auto => None,
        absolute => absolute.to_twip().map(units::twip_to_emu),
    };

    let width_decl = declared("width");
    let height_decl = declared("height");
    let mut width = width_decl.and_then(|l| resolve(l, base_width));
    let mut height = height_decl.and_then(|l| resolve(l, base_height));

    match (width, height) {
        (Some(w), None) => height = Some((w as f64 / aspect).round() as i64),
        (None, Some(h)) => width = Some((h as f64 * aspect).round() as i64),
        (None, None) => {
            width = Some(base_width);
            height = Some(base_height);
        }
        (Some(_), Some(_)) => {}
    }
    let (mut width, mut height) = (width.unwrap_or(base_width), height.unwrap_or(base_height));

    if width > maximum_emu && maximum_emu > 0 {
        let scale = maximum_emu as f64 / width as f64;
        width = maximum_emu;
        height = (height as f64 * scale).round() as i64;
    }
    (width, height)
}

/// Build a picture run for an `img` element
///
/// Returns `None` when the image cannot be loaded; the failure is logged and
/// conversion continues.
pub fn build_image_run(
    ctx: &mut DocumentContext,
    element: &Element,
    maximum_width: i64,
) -> Option<String> {
    let src = element.attr("src")?.trim();
    if src.is_empty() {
        return None;
    }
    let loaded = match load_image(ctx, src) {
        Ok(loaded) => loaded,
        Err(e) => {
            log::warn!("Skipping image {}: {}", truncate(src), e);
            return None;
        }
    };

    let (width_emu, height_emu) = compute_image_dimensions(element, loaded.size, maximum_width);
    let position = match element.css("float").map(|f| f.trim().to_ascii_lowercase()) {
        Some(f) if f == "left" => ImagePosition::Anchor(Anchor::float(false)),
        Some(f) if f == "right" => ImagePosition::Anchor(Anchor::float(true)),
        _ => ImagePosition::Inline,
    };

    let drawing = Drawing {
        id: ctx.next_drawing_id(),
        rel_id: loaded.rel_id,
        name: loaded.file_name,
        description: element.attr("alt").unwrap_or_default().to_string(),
        width_emu,
        height_emu,
        position,
    };
    Some(drawing.to_run_xml())
}

fn truncate(src: &str) -> String {
    src.chars().take(64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DocumentOptions;
    use crate::test_utils::{png_data_uri, FixedProber, StaticFetcher};

    fn context() -> DocumentContext {
        DocumentContext::new(&DocumentOptions::default()).unwrap()
    }

    const SIZE: ImageSize = ImageSize {
        width: 200,
        height: 100,
    };

    #[test]
    fn test_dimensions_default_to_original() {
        let (w, h) = compute_image_dimensions(&Element::new("img"), SIZE, 9000);
        assert_eq!((w, h), (200 * 9525, 100 * 9525));
    }

    #[test]
    fn test_dimensions_clamped_to_maximum_width() {
        // 1500 TWIP = 100px
        let (w, h) = compute_image_dimensions(&Element::new("img"), SIZE, 1500);
        assert_eq!(w, 1500 * 635);
        assert_eq!(h, 1500 * 635 / 2);
    }

    #[test]
    fn test_declared_width_keeps_aspect() {
        let element = Element::new("img").with_style("width", "50px");
        let (w, h) = compute_image_dimensions(&element, SIZE, 9000);
        assert_eq!((w, h), (50 * 9525, 25 * 9525));

        let element = Element::new("img").with_attr("height", "20");
        let (w, h) = compute_image_dimensions(&element, SIZE, 9000);
        assert_eq!((w, h), (40 * 9525, 20 * 9525));
    }

    #[test]
    fn test_percentage_width() {
        let element = Element::new("img").with_style("width", "50%");
        let (w, h) = compute_image_dimensions(&element, SIZE, 9000);
        assert_eq!((w, h), (100 * 9525, 50 * 9525));
    }

    #[test]
    fn test_auto_sides() {
        let element = Element::new("img")
            .with_style("width", "auto")
            .with_style("height", "auto");
        let (w, h) = compute_image_dimensions(&element, SIZE, 9000);
        assert_eq!((w, h), (200 * 9525, 100 * 9525));
    }

    #[test]
    fn test_explicit_width_never_exceeds_maximum() {
        let element = Element::new("img").with_style("width", "2000px");
        let (w, _) = compute_image_dimensions(&element, SIZE, 9000);
        assert_eq!(w, 9000 * 635);
    }

    #[test]
    fn test_inline_image_run() {
        let mut ctx = context();
        let element = Element::new("img")
            .with_attr("src", png_data_uri(4, 2))
            .with_attr("alt", "A & B");
        let xml = build_image_run(&mut ctx, &element, 9000).unwrap();
        assert!(xml.starts_with("<w:r><w:drawing><wp:inline"));
        assert!(xml.contains(r#"r:embed="rId5""#));
        assert!(xml.contains(r#"descr="A &amp; B""#));
        assert!(xml.contains(r#"cx="38100" cy="19050""#));
        assert_eq!(ctx.media().len(), 1);
    }

    #[test]
    fn test_floated_image_is_anchored() {
        let mut ctx = context();
        let element = Element::new("img")
            .with_attr("src", png_data_uri(4, 2))
            .with_style("float", "right");
        let xml = build_image_run(&mut ctx, &element, 9000).unwrap();
        assert!(xml.contains("<wp:anchor"));
        assert!(xml.contains(r#"behindDoc="0""#));
        assert!(xml.contains("<wp:wrapSquare"));
        assert!(xml.contains("<wp:align>right</wp:align>"));
    }

    #[test]
    fn test_failed_fetch_skips_image() {
        let mut ctx = context();
        let element = Element::new("img").with_attr("src", "https://example.com/a.png");
        assert!(build_image_run(&mut ctx, &element, 9000).is_none());
        assert!(ctx.media().is_empty());
    }

    #[test]
    fn test_remote_image_uses_fetcher() {
        let mut ctx = context()
            .with_fetcher(Box::new(StaticFetcher::new().with(
                "https://example.com/logo",
                b"not-decoded".to_vec(),
                Some("image/jpeg"),
            )))
            .with_prober(Box::new(FixedProber(ImageSize {
                width: 10,
                height: 10,
            })));
        let element = Element::new("img").with_attr("src", "https://example.com/logo");
        let xml = build_image_run(&mut ctx, &element, 9000).unwrap();
        assert!(xml.contains("image-1.jpeg"));
        assert_eq!(ctx.media()[0].file_name, "image-1.jpeg");
    }

    #[test]
    fn test_unreadable_image_is_not_stored() {
        let mut ctx = context();
        let element = Element::new("img").with_attr("src", "data:image/png;base64,aGVsbG8=");
        assert!(build_image_run(&mut ctx, &element, 9000).is_none());
        assert!(ctx.media().is_empty());

        let next = Element::new("img").with_attr("src", png_data_uri(2, 2));
        build_image_run(&mut ctx, &next, 9000).unwrap();
        assert_eq!(ctx.media()[0].file_name, "image-1.png");
    }

    #[test]
    fn test_mime_from_url() {
        assert_eq!(mime_from_url("https://x.test/a/b.GIF?v=2"), "image/gif");
        assert_eq!(mime_from_url("https://x.test/a/b"), "image/png");
    }
}
