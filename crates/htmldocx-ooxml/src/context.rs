//! Document context
//!
//! One [`DocumentContext`] is owned by each conversion and threaded through
//! every builder by `&mut`. It allocates all cross-referenced ids (media,
//! relationships, numbering, drawings, header/footer parts) and records the
//! parts that the package assembler writes out at the end.
//!
//! Everything here is append-only: counters only advance and entries are
//! never edited or removed once registered.

use std::collections::{BTreeMap, HashMap};

use crate::collaborators::{
    FetchedResource, ImageProber, ImageSize, OfflineFetcher, RasterProber, RemoteFetcher,
};
use crate::error::Result;
use crate::fonts::{self, EmbeddedFont, FontTableEntry};
use crate::header_footer::{BackgroundKey, HeaderVariantKey};
use crate::media::{self, MediaFile};
use crate::numbering::{ListKind, ListProperties, NumberingDefinition};
use crate::odttf;
use crate::options::{DocumentOptions, FontSource, LineNumberOptions, PageGeometry, PageMargins};
use crate::relationships::{RelationshipId, RelationshipKind, Relationships, TargetMode};

/// Relationship owner name of the main document part
pub const DOCUMENT_PART: &str = "document";
/// Relationship owner name of the font table part
pub const FONT_TABLE_PART: &str = "fontTable";

/// Height of one line of default paragraph spacing, in points
const SPACING_LINE_PT: f64 = 15.6;

/// Document-wide paragraph spacing, in TWIP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultSpacing {
    pub before: i64,
    pub after: i64,
    pub line: i64,
}

/// Document-wide text defaults
#[derive(Debug, Clone, PartialEq)]
pub struct TextDefaults {
    pub font: String,
    /// Half-points
    pub font_size: u32,
    /// Half-points
    pub complex_script_font_size: u32,
    pub lang: String,
    /// Multiplier used for the computed line spacing
    pub line_height: f64,
    /// Set only when the options configure spacing explicitly
    pub spacing: Option<DefaultSpacing>,
}

/// Section settings taken from the options
#[derive(Debug, Clone, PartialEq)]
pub struct SectionDefaults {
    pub header_type: String,
    pub footer_type: String,
    pub line_numbering: Option<LineNumberOptions>,
    /// Distinct first page (`w:titlePg`)
    pub title_page: bool,
}

/// A generated header or footer part
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderFooterRef {
    /// Part number (`header{id}.xml`)
    pub id: u32,
    /// Relationship id in the document part
    pub rel_id: RelationshipId,
    /// Estimated band height in TWIP, when content was measured
    pub height: Option<i64>,
}

/// A page section opened by the body or by a section container
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Zero-based position in document order
    pub index: usize,
    pub header_type: String,
    pub footer_type: String,
    pub margins: PageMargins,
    pub background: Option<BackgroundKey>,
    /// Header part for the section's background, if any
    pub header: Option<HeaderFooterRef>,
}

/// A background image already stored as media
#[derive(Debug, Clone, PartialEq)]
pub struct CachedBackground {
    /// Relationship target of the stored media file
    pub target: String,
    pub size: ImageSize,
}

/// Mutable registry for one conversion
pub struct DocumentContext {
    pub geometry: PageGeometry,
    pub defaults: TextDefaults,
    pub table_row_cant_split: bool,
    pub page_number: bool,
    /// Solid page color (`w:background`)
    pub page_background: Option<String>,
    pub section_defaults: SectionDefaults,

    media_counter: u32,
    header_counter: u32,
    footer_counter: u32,
    numbering_counter: u32,
    drawing_counter: u32,

    current_part: String,
    relationships: Vec<(String, Relationships)>,
    media: Vec<MediaFile>,
    numbering: Vec<NumberingDefinition>,
    fonts: Vec<FontTableEntry>,
    embedded_fonts: Vec<EmbeddedFont>,
    font_parts: Vec<(String, Vec<u8>)>,

    headers: BTreeMap<String, HeaderFooterRef>,
    footers: BTreeMap<String, HeaderFooterRef>,
    header_parts: Vec<(u32, String)>,
    footer_parts: Vec<(u32, String)>,
    sections: Vec<Section>,
    background_cache: HashMap<String, CachedBackground>,
    header_variants: HashMap<HeaderVariantKey, HeaderFooterRef>,

    fetcher: Box<dyn RemoteFetcher>,
    prober: Box<dyn ImageProber>,
}

impl std::fmt::Debug for DocumentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentContext")
            .field("geometry", &self.geometry)
            .field("current_part", &self.current_part)
            .field("media", &self.media.len())
            .field("numbering", &self.numbering.len())
            .field("sections", &self.sections.len())
            .finish_non_exhaustive()
    }
}

impl DocumentContext {
    /// Create a context from resolved options
    ///
    /// The document part is seeded with the styles, settings, webSettings
    /// and fontTable relationships (`rId1`..`rId4`). Remote fetching is
    /// disabled until a fetcher is supplied with [`Self::with_fetcher`].
    pub fn new(options: &DocumentOptions) -> Result<Self> {
        let geometry = options.page_geometry()?;
        let configured = options.spacing.default_paragraph_spacing.is_some()
            || options.spacing.default_line_spacing.is_some();
        let spacing = if configured {
            let paragraph = options.spacing.default_paragraph_spacing.clone().unwrap_or_default();
            Some(DefaultSpacing {
                before: lines_to_twip(paragraph.above.unwrap_or(0.17)),
                after: lines_to_twip(paragraph.below.unwrap_or(0.17)),
                line: (options.spacing.default_line_spacing.unwrap_or(12.0) * 20.0).round() as i64,
            })
        } else {
            None
        };

        let mut document_rels = Relationships::new();
        document_rels.add(RelationshipKind::Styles, "styles.xml", TargetMode::Internal);
        document_rels.add(RelationshipKind::Settings, "settings.xml", TargetMode::Internal);
        document_rels.add(
            RelationshipKind::WebSettings,
            "webSettings.xml",
            TargetMode::Internal,
        );
        document_rels.add(RelationshipKind::FontTable, "fontTable.xml", TargetMode::Internal);

        Ok(Self {
            geometry,
            defaults: TextDefaults {
                font: options.font.clone(),
                font_size: options.font_size_hip()?,
                complex_script_font_size: options.complex_script_font_size_hip()?,
                lang: options.lang.clone(),
                line_height: options.default_line_height,
                spacing,
            },
            table_row_cant_split: options.table.row.cant_split,
            page_number: options.page_number,
            page_background: None,
            section_defaults: SectionDefaults {
                header_type: options.header_type.clone(),
                footer_type: options.footer_type.clone(),
                line_numbering: options.line_number.clone(),
                title_page: options.skip_first_header_footer,
            },
            media_counter: 0,
            header_counter: 0,
            footer_counter: 0,
            numbering_counter: 0,
            drawing_counter: 0,
            current_part: DOCUMENT_PART.to_string(),
            relationships: vec![(DOCUMENT_PART.to_string(), document_rels)],
            media: Vec::new(),
            numbering: Vec::new(),
            fonts: Vec::new(),
            embedded_fonts: Vec::new(),
            font_parts: Vec::new(),
            headers: BTreeMap::new(),
            footers: BTreeMap::new(),
            header_parts: Vec::new(),
            footer_parts: Vec::new(),
            sections: Vec::new(),
            background_cache: HashMap::new(),
            header_variants: HashMap::new(),
            fetcher: Box::new(OfflineFetcher),
            prober: Box::new(RasterProber),
        })
    }

    /// Replace the remote fetcher
    pub fn with_fetcher(mut self, fetcher: Box<dyn RemoteFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the image prober
    pub fn with_prober(mut self, prober: Box<dyn ImageProber>) -> Self {
        self.prober = prober;
        self
    }

    /// Width available to body content, in TWIP
    pub fn content_width(&self) -> i64 {
        self.geometry.content_width()
    }

    // ==================== Parts ====================

    /// Part that receives relationships for content being built
    pub fn current_part(&self) -> &str {
        &self.current_part
    }

    /// Run `f` with relationships directed to `part`
    pub fn in_part<T>(&mut self, part: &str, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = std::mem::replace(&mut self.current_part, part.to_string());
        let result = f(self);
        self.current_part = previous;
        result
    }

    // ==================== Media ====================

    /// Decode a `data:` URI and store it as a media file
    pub fn register_media(&mut self, data_uri: &str) -> Result<&MediaFile> {
        let decoded = media::parse_data_uri(data_uri)?;
        Ok(self.push_media(decoded.payload, &decoded.mime))
    }

    /// Store fetched bytes as a media file
    pub fn register_media_bytes(&mut self, bytes: Vec<u8>, mime: &str) -> &MediaFile {
        self.push_media(bytes, mime)
    }

    fn push_media(&mut self, content: Vec<u8>, mime: &str) -> &MediaFile {
        self.media_counter += 1;
        let id = self.media_counter;
        let file_name = format!("image-{}.{}", id, media::extension_for_mime(mime));
        log::debug!("Registered media {} ({} bytes)", file_name, content.len());
        self.media.push(MediaFile {
            id,
            content,
            file_name,
        });
        &self.media[self.media.len() - 1]
    }

    /// All media files in registration order
    pub fn media(&self) -> &[MediaFile] {
        &self.media
    }

    // ==================== Relationships ====================

    /// Append a relationship to a part's table
    ///
    /// With `id_override`, the entry gets the named id `rId{override}`; a
    /// repeat registration under the same name returns the existing id.
    pub fn register_relationship(
        &mut self,
        part: &str,
        kind: RelationshipKind,
        target: impl Into<String>,
        mode: TargetMode,
        id_override: Option<&str>,
    ) -> RelationshipId {
        let index = match self.relationships.iter().position(|(name, _)| name == part) {
            Some(index) => index,
            None => {
                self.relationships
                    .push((part.to_string(), Relationships::new()));
                self.relationships.len() - 1
            }
        };
        let rels = &mut self.relationships[index].1;
        match id_override {
            Some(name) => rels.add_named(name, kind, target, mode),
            None => rels.add(kind, target, mode),
        }
    }

    /// Append a relationship to the current part
    pub fn relate(
        &mut self,
        kind: RelationshipKind,
        target: impl Into<String>,
        mode: TargetMode,
    ) -> RelationshipId {
        let part = self.current_part.clone();
        self.register_relationship(&part, kind, target, mode, None)
    }

    /// Relationship table of a part
    pub fn relationships(&self, part: &str) -> Option<&Relationships> {
        self.relationships
            .iter()
            .find(|(name, _)| name == part)
            .map(|(_, rels)| rels)
    }

    /// All relationship tables, in creation order
    pub fn relationship_tables(&self) -> impl Iterator<Item = (&str, &Relationships)> {
        self.relationships
            .iter()
            .map(|(name, rels)| (name.as_str(), rels))
    }

    // ==================== Numbering ====================

    /// Allocate a numbering definition
    ///
    /// Every call yields a fresh id, even for identical properties. The
    /// numbering part relationship is added on the first call.
    pub fn register_numbering(&mut self, kind: ListKind, properties: &ListProperties) -> u32 {
        if self.numbering.is_empty() {
            self.register_relationship(
                DOCUMENT_PART,
                RelationshipKind::Numbering,
                "numbering.xml",
                TargetMode::Internal,
                None,
            );
        }
        self.numbering_counter += 1;
        let id = self.numbering_counter;
        self.numbering.push(NumberingDefinition::new(
            id,
            kind,
            properties,
            &self.defaults.font,
        ));
        log::debug!("Registered numbering {} ({:?})", id, kind);
        id
    }

    /// Numbering definitions in allocation order
    pub fn numbering_definitions(&self) -> &[NumberingDefinition] {
        &self.numbering
    }

    // ==================== Fonts ====================

    /// Map a CSS `font-family` value to a concrete font name
    pub fn register_font(&mut self, font_family: &str) -> String {
        let entry = fonts::resolve_font_family(font_family, &self.defaults.font);
        let name = entry.name.clone();
        if !self.fonts.iter().any(|f| f.name == name) {
            self.fonts.push(entry);
        }
        name
    }

    /// Fonts referenced by content
    pub fn font_table(&self) -> &[FontTableEntry] {
        &self.fonts
    }

    /// Obfuscate and register the given font files
    ///
    /// A font that cannot be read is logged and left out; the remaining
    /// fonts are still embedded. Non-TrueType files are stored as-is,
    /// without a font key.
    pub fn embed_fonts(&mut self, sources: &[FontSource]) {
        for source in sources {
            let file_name = odttf::font_file_name(&source.name);
            let (bytes, font_key) = match odttf::obfuscate_font_file(&source.path) {
                Ok(embedded) => (embedded.bytes, Some(embedded.font_key)),
                Err(crate::error::ConvertError::UnsupportedFontFormat(reason)) => {
                    log::warn!(
                        "Font {} is not TrueType ({}), embedding unobfuscated",
                        source.name,
                        reason
                    );
                    match std::fs::read(&source.path) {
                        Ok(bytes) => (bytes, None),
                        Err(e) => {
                            log::warn!("Skipping font {}: {}", source.name, e);
                            continue;
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Skipping font {}: {}", source.name, e);
                    continue;
                }
            };

            let rel_name: String = source.name.chars().filter(|c| !c.is_whitespace()).collect();
            let rel_id = self.register_relationship(
                FONT_TABLE_PART,
                RelationshipKind::Font,
                format!("fonts/{}", file_name),
                TargetMode::Internal,
                Some(&rel_name),
            );
            log::debug!("Embedded font {} as {}", source.name, file_name);
            self.font_parts.push((file_name, bytes));
            self.embedded_fonts.push(EmbeddedFont {
                name: source.name.clone(),
                rel_id,
                font_key,
            });
        }
    }

    /// Successfully embedded fonts
    pub fn embedded_fonts(&self) -> &[EmbeddedFont] {
        &self.embedded_fonts
    }

    /// Font part files (`word/fonts/{name}`) and their bytes
    pub fn font_parts(&self) -> &[(String, Vec<u8>)] {
        &self.font_parts
    }

    // ==================== Drawings ====================

    /// Next `wp:docPr` id
    pub fn next_drawing_id(&mut self) -> u32 {
        self.drawing_counter += 1;
        self.drawing_counter
    }

    // ==================== Headers & footers ====================

    /// Allocate a header part number
    pub fn next_header_id(&mut self) -> u32 {
        self.header_counter += 1;
        self.header_counter
    }

    /// Allocate a footer part number
    pub fn next_footer_id(&mut self) -> u32 {
        self.footer_counter += 1;
        self.footer_counter
    }

    /// Store a generated header part and relate it from the document
    pub fn add_header_part(&mut self, id: u32, xml: String) -> RelationshipId {
        self.header_parts.push((id, xml));
        self.register_relationship(
            DOCUMENT_PART,
            RelationshipKind::Header,
            format!("header{}.xml", id),
            TargetMode::Internal,
            None,
        )
    }

    /// Store a generated footer part and relate it from the document
    pub fn add_footer_part(&mut self, id: u32, xml: String) -> RelationshipId {
        self.footer_parts.push((id, xml));
        self.register_relationship(
            DOCUMENT_PART,
            RelationshipKind::Footer,
            format!("footer{}.xml", id),
            TargetMode::Internal,
            None,
        )
    }

    /// Map a header type name (`default`, `first`, `even`) to a part
    pub fn set_header(&mut self, type_name: &str, header: HeaderFooterRef) {
        self.headers.insert(type_name.to_string(), header);
    }

    /// Map a footer type name to a part
    pub fn set_footer(&mut self, type_name: &str, footer: HeaderFooterRef) {
        self.footers.insert(type_name.to_string(), footer);
    }

    /// Header registered under a type name
    pub fn header(&self, type_name: &str) -> Option<&HeaderFooterRef> {
        self.headers.get(type_name)
    }

    /// Footer registered under a type name
    pub fn footer(&self, type_name: &str) -> Option<&HeaderFooterRef> {
        self.footers.get(type_name)
    }

    /// Generated header parts (`id`, XML)
    pub fn header_parts(&self) -> &[(u32, String)] {
        &self.header_parts
    }

    /// Generated footer parts (`id`, XML)
    pub fn footer_parts(&self) -> &[(u32, String)] {
        &self.footer_parts
    }

    /// Cached header variant for a type and background
    pub fn header_variant(&self, key: &HeaderVariantKey) -> Option<&HeaderFooterRef> {
        self.header_variants.get(key)
    }

    /// Record a header variant; an existing entry for the key is kept
    pub fn insert_header_variant(&mut self, key: HeaderVariantKey, header: HeaderFooterRef) {
        self.header_variants.entry(key).or_insert(header);
    }

    /// Number of distinct header variants
    pub fn header_variant_count(&self) -> usize {
        self.header_variants.len()
    }

    /// Background image cached for a URL
    pub fn cached_background(&self, url: &str) -> Option<&CachedBackground> {
        self.background_cache.get(url)
    }

    /// Remember the media file stored for a background URL
    pub fn cache_background(&mut self, url: &str, background: CachedBackground) {
        self.background_cache
            .entry(url.to_string())
            .or_insert(background);
    }

    // ==================== Sections ====================

    /// Append a section
    pub fn push_section(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// Sections in document order
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    // ==================== Collaborators ====================

    /// Fetch a remote resource
    pub fn fetch(&self, url: &str) -> Result<FetchedResource> {
        self.fetcher.fetch(url)
    }

    /// Read image dimensions
    pub fn probe(&self, bytes: &[u8]) -> Result<ImageSize> {
        self.prober.probe(bytes)
    }
}

fn lines_to_twip(lines: f64) -> i64 {
    (lines * SPACING_LINE_PT * 20.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{ParagraphSpacing, SpacingOptions};
    use crate::test_utils::png_data_uri;

    fn context() -> DocumentContext {
        DocumentContext::new(&DocumentOptions::default()).unwrap()
    }

    #[test]
    fn test_document_part_is_seeded() {
        let mut ctx = context();
        let rels = ctx.relationships(DOCUMENT_PART).unwrap();
        assert_eq!(rels.len(), 4);
        let id = ctx.relate(
            RelationshipKind::Hyperlink,
            "https://example.com",
            TargetMode::External,
        );
        assert_eq!(id.to_string(), "rId5");
    }

    #[test]
    fn test_media_ids_are_sequential() {
        let mut ctx = context();
        let uri = png_data_uri(2, 2);
        let ids: Vec<u32> = (0..4).map(|_| ctx.register_media(&uri).unwrap().id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        let names: Vec<&str> = ctx.media().iter().map(|m| m.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["image-1.png", "image-2.png", "image-3.png", "image-4.png"]
        );
    }

    #[test]
    fn test_invalid_media_does_not_advance_counter() {
        let mut ctx = context();
        assert!(ctx.register_media("data:image/png,nope").is_err());
        assert_eq!(ctx.register_media(&png_data_uri(1, 1)).unwrap().id, 1);
    }

    #[test]
    fn test_relationship_ids_are_scoped_per_part() {
        let mut ctx = context();
        let a = ctx.register_relationship(
            "header1",
            RelationshipKind::Image,
            "media/a.png",
            TargetMode::Internal,
            None,
        );
        let b = ctx.register_relationship(
            "header1",
            RelationshipKind::Image,
            "media/b.png",
            TargetMode::Internal,
            None,
        );
        let c = ctx.register_relationship(
            "header2",
            RelationshipKind::Image,
            "media/a.png",
            TargetMode::Internal,
            None,
        );
        assert_eq!(a.to_string(), "rId1");
        assert_eq!(b.to_string(), "rId2");
        assert_eq!(c.to_string(), "rId1");
    }

    #[test]
    fn test_id_override_is_stable() {
        let mut ctx = context();
        let first = ctx.register_relationship(
            FONT_TABLE_PART,
            RelationshipKind::Font,
            "fonts/a.odttf",
            TargetMode::Internal,
            Some("OpenSans"),
        );
        let again = ctx.register_relationship(
            FONT_TABLE_PART,
            RelationshipKind::Font,
            "fonts/a.odttf",
            TargetMode::Internal,
            Some("OpenSans"),
        );
        assert_eq!(first, again);
        assert_eq!(ctx.relationships(FONT_TABLE_PART).unwrap().len(), 1);
    }

    #[test]
    fn test_numbering_is_never_deduplicated() {
        let mut ctx = context();
        let props = ListProperties::default();
        let a = ctx.register_numbering(ListKind::Unordered, &props);
        let b = ctx.register_numbering(ListKind::Unordered, &props);
        assert_eq!((a, b), (1, 2));
        let rels = ctx.relationships(DOCUMENT_PART).unwrap();
        // Numbering relationship is added once
        assert_eq!(
            rels.iter()
                .filter(|r| r.kind == RelationshipKind::Numbering)
                .count(),
            1
        );
    }

    #[test]
    fn test_register_font_resolves_lists() {
        let mut ctx = context();
        assert_eq!(ctx.register_font("'Fira Sans', sans-serif"), "Fira Sans");
        assert_eq!(ctx.register_font("monospace"), "Courier New");
        assert_eq!(ctx.font_table().len(), 2);
    }

    #[test]
    fn test_register_font_keeps_one_entry_per_name() {
        let mut ctx = context();
        ctx.register_font("Georgia, serif");
        ctx.register_font("'Georgia'");
        assert_eq!(ctx.font_table().len(), 1);
        assert_eq!(ctx.font_table()[0].name, "Georgia");
    }

    #[test]
    fn test_in_part_restores_previous_part() {
        let mut ctx = context();
        let id = ctx.in_part("header1", |ctx| {
            assert_eq!(ctx.current_part(), "header1");
            ctx.relate(RelationshipKind::Image, "media/x.png", TargetMode::Internal)
        });
        assert_eq!(id.to_string(), "rId1");
        assert_eq!(ctx.current_part(), DOCUMENT_PART);
    }

    #[test]
    fn test_default_spacing_only_when_configured() {
        assert!(context().defaults.spacing.is_none());

        let options = DocumentOptions {
            spacing: SpacingOptions {
                default_paragraph_spacing: Some(ParagraphSpacing {
                    above: Some(0.5),
                    below: None,
                }),
                default_line_spacing: None,
            },
            ..Default::default()
        };
        let ctx = DocumentContext::new(&options).unwrap();
        let spacing = ctx.defaults.spacing.unwrap();
        assert_eq!(spacing.before, 156);
        assert_eq!(spacing.after, 53);
        assert_eq!(spacing.line, 240);
    }

    #[test]
    fn test_missing_font_is_skipped() {
        let mut ctx = context();
        ctx.embed_fonts(&[FontSource {
            name: "Ghost".to_string(),
            path: "/nonexistent/ghost.ttf".into(),
        }]);
        assert!(ctx.embedded_fonts().is_empty());
        assert!(ctx.font_parts().is_empty());
    }
}
