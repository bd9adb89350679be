//! Package assembler
//!
//! Drives one conversion: sets up the [`DocumentContext`], builds headers
//! and footers, walks the body and hands every part to a [`PartWriter`].
//!
//! # Example
//!
//! ```
//! use htmldocx_dom::{Element, Node};
//! use htmldocx_ooxml::{DocumentOptions, DocxWriter};
//!
//! let body = vec![Node::Element(Element::new("p").with_text("Hello"))];
//! let package = DocxWriter::new(DocumentOptions::default()).package(&body, None, None)?;
//! assert!(package.contains("word/document.xml"));
//! # Ok::<(), htmldocx_ooxml::ConvertError>(())
//! ```

use chrono::Utc;
use htmldocx_dom::Node;

use crate::archive::{OoxmlPackage, PartWriter};
use crate::collaborators::{ImageProber, RemoteFetcher};
use crate::context::{DocumentContext, HeaderFooterRef, DOCUMENT_PART};
use crate::error::Result;
use crate::fonts;
use crate::header_footer::{self, BandKind};
use crate::numbering;
use crate::options::{DocumentOptions, PageMargins};
use crate::parts::{self, THEME_TARGET};
use crate::relationships::{RelationshipKind, TargetMode};
use crate::walker;

/// Converts element trees into WordprocessingML packages
pub struct DocxWriter {
    options: DocumentOptions,
    fetcher: Option<Box<dyn RemoteFetcher>>,
    prober: Option<Box<dyn ImageProber>>,
}

impl DocxWriter {
    /// Create a writer; remote images are skipped until a fetcher is set
    pub fn new(options: DocumentOptions) -> Self {
        Self {
            options,
            fetcher: None,
            prober: None,
        }
    }

    /// Use `fetcher` for `http(s)` image sources
    pub fn with_fetcher(mut self, fetcher: Box<dyn RemoteFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Use `prober` to read image dimensions
    pub fn with_prober(mut self, prober: Box<dyn ImageProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    /// Options this writer converts with
    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    /// Convert and serialize to `.docx` bytes
    pub fn generate(
        self,
        body: &[Node],
        header: Option<&[Node]>,
        footer: Option<&[Node]>,
    ) -> Result<Vec<u8>> {
        self.package(body, header, footer)?.to_bytes()
    }

    /// Convert into an in-memory package
    ///
    /// Every XML part is checked for well-formedness before returning.
    pub fn package(
        self,
        body: &[Node],
        header: Option<&[Node]>,
        footer: Option<&[Node]>,
    ) -> Result<OoxmlPackage> {
        let mut package = OoxmlPackage::new();
        self.write_parts(body, header, footer, &mut package)?;
        package.check_well_formed()?;
        Ok(package)
    }

    /// Convert and send every part to `writer`
    pub fn write_parts<W: PartWriter>(
        self,
        body: &[Node],
        header: Option<&[Node]>,
        footer: Option<&[Node]>,
        writer: &mut W,
    ) -> Result<()> {
        let options = self.options;
        let mut ctx = DocumentContext::new(&options)?;
        if let Some(fetcher) = self.fetcher {
            ctx = ctx.with_fetcher(fetcher);
        }
        if let Some(prober) = self.prober {
            ctx = ctx.with_prober(prober);
        }

        ctx.register_font(&options.font);
        ctx.embed_fonts(&options.fonts);
        build_bands(&mut ctx, &options, header, footer);

        let body_xml = walker::build_body(&mut ctx, body);
        ctx.register_relationship(
            DOCUMENT_PART,
            RelationshipKind::Theme,
            THEME_TARGET,
            TargetMode::Internal,
            None,
        );
        log::info!(
            "Converted body: {} sections, {} media files, {} lists",
            ctx.sections().len(),
            ctx.media().len(),
            ctx.numbering_definitions().len()
        );

        write_package(&ctx, &options, &body_xml, writer)
    }
}

/// Build the document-wide header and footer
///
/// A measured band pushes the body margin outward so content clears it.
fn build_bands(
    ctx: &mut DocumentContext,
    options: &DocumentOptions,
    header: Option<&[Node]>,
    footer: Option<&[Node]>,
) {
    let wants_header = options.header || header.is_some() || options.header_config.is_some();
    let wants_footer = options.footer
        || footer.is_some()
        || options.footer_config.is_some()
        || options.page_number;

    if wants_header {
        let band = header_footer::build_header(
            ctx,
            header,
            options.header_config.as_ref(),
            &options.header_type,
        );
        push_margin(&mut ctx.geometry.margins, &band, BandKind::Header);
        if options.skip_first_header_footer && options.header_type != "first" {
            header_footer::build_empty(ctx, BandKind::Header, "first");
        }
    }
    if wants_footer {
        let band = header_footer::build_footer(
            ctx,
            footer,
            options.footer_config.as_ref(),
            &options.footer_type,
        );
        push_margin(&mut ctx.geometry.margins, &band, BandKind::Footer);
        if options.skip_first_header_footer && options.footer_type != "first" {
            header_footer::build_empty(ctx, BandKind::Footer, "first");
        }
    }
}

fn push_margin(margins: &mut PageMargins, band: &HeaderFooterRef, kind: BandKind) {
    let Some(height) = band.height else {
        return;
    };
    let clearance = height + header_footer::BODY_CLEARANCE;
    match kind {
        BandKind::Header => {
            margins.header = header_footer::BAND_MARGIN;
            margins.top = margins.top.max(clearance);
        }
        BandKind::Footer => {
            margins.footer = header_footer::BAND_MARGIN;
            margins.bottom = margins.bottom.max(clearance);
        }
    }
}

fn write_package<W: PartWriter>(
    ctx: &DocumentContext,
    options: &DocumentOptions,
    body_xml: &str,
    writer: &mut W,
) -> Result<()> {
    let has_numbering = !ctx.numbering_definitions().is_empty();

    writer.write_part(
        "[Content_Types].xml",
        parts::content_types_xml(ctx, has_numbering).into_bytes(),
    )?;
    writer.write_part("_rels/.rels", parts::root_relationships_xml().into_bytes())?;
    writer.write_part(
        "docProps/core.xml",
        parts::core_xml(options, Utc::now()).into_bytes(),
    )?;
    writer.write_part(
        "word/document.xml",
        parts::document_xml(ctx, body_xml).into_bytes(),
    )?;
    writer.write_part(
        "word/styles.xml",
        parts::styles_xml(&ctx.defaults).into_bytes(),
    )?;
    writer.write_part(
        "word/settings.xml",
        parts::settings_xml(!ctx.embedded_fonts().is_empty(), ctx.page_background.is_some())
            .into_bytes(),
    )?;
    writer.write_part("word/webSettings.xml", parts::web_settings_xml().into_bytes())?;
    writer.write_part(
        "word/fontTable.xml",
        fonts::font_table_xml(ctx.font_table(), ctx.embedded_fonts()).into_bytes(),
    )?;
    writer.write_part(
        &format!("word/{}", THEME_TARGET),
        parts::theme_xml(&ctx.defaults.font).into_bytes(),
    )?;
    if has_numbering {
        writer.write_part(
            "word/numbering.xml",
            numbering::numbering_xml(ctx.numbering_definitions()).into_bytes(),
        )?;
    }

    for (id, xml) in ctx.header_parts() {
        writer.write_part(&format!("word/header{}.xml", id), xml.clone().into_bytes())?;
    }
    for (id, xml) in ctx.footer_parts() {
        writer.write_part(&format!("word/footer{}.xml", id), xml.clone().into_bytes())?;
    }
    for file in ctx.media() {
        writer.write_part(&file.part_path(), file.content.clone())?;
    }
    for (name, bytes) in ctx.font_parts() {
        writer.write_part(&format!("word/fonts/{}", name), bytes.clone())?;
    }
    for (part, rels) in ctx.relationship_tables() {
        if rels.is_empty() {
            continue;
        }
        writer.write_part(
            &format!("word/_rels/{}.xml.rels", part),
            rels.to_xml().into_bytes(),
        )?;
    }
    Ok(())
}
