//! Static and document-level parts
//!
//! Templates for the parts that do not depend on body content, plus the
//! document wrapper and section properties:
//!
//! | Part | Generator |
//! |------|-----------|
//! | `[Content_Types].xml` | [`content_types_xml`] |
//! | `_rels/.rels` | [`root_relationships_xml`] |
//! | `docProps/core.xml` | [`core_xml`] |
//! | `word/document.xml` | [`document_xml`] |
//! | `word/styles.xml` | [`styles_xml`] |
//! | `word/settings.xml` | [`settings_xml`] |
//! | `word/webSettings.xml` | [`web_settings_xml`] |
//! | `word/theme/theme1.xml` | [`theme_xml`] |

use chrono::{DateTime, NaiveDate, Utc};

use crate::context::{DocumentContext, Section, TextDefaults};
use crate::options::DocumentOptions;
use crate::relationships::{RelationshipKind, RELATIONSHIPS_NS};
use crate::xml::{content_namespaces, escape_xml, NS_A, NS_W, XML_DECLARATION};
use crate::media;

/// Path of the theme part relative to `word/`
pub const THEME_TARGET: &str = "theme/theme1.xml";

const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const WORDML_CT: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml";

/// Heading sizes in half-points, `h1` first
const HEADING_SIZES: [u32; 6] = [48, 36, 28, 24, 22, 20];

// ==================== Package level ====================

/// Generate `[Content_Types].xml`
///
/// Media extensions get a `Default` entry each; headers and footers get one
/// `Override` per part.
pub fn content_types_xml(ctx: &DocumentContext, has_numbering: bool) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(&format!(r#"<Types xmlns="{}">"#, CONTENT_TYPES_NS));
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);

    let mut extensions: Vec<String> = Vec::new();
    for file in ctx.media() {
        let ext = file.extension().to_lowercase();
        if !extensions.contains(&ext) {
            extensions.push(ext);
        }
    }
    for ext in &extensions {
        xml.push_str(&format!(
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            ext,
            media::content_type_for_extension(ext)
        ));
    }
    if !ctx.font_parts().is_empty() {
        xml.push_str(&format!(
            r#"<Default Extension="odttf" ContentType="{}"/>"#,
            "application/vnd.openxmlformats-officedocument.obfuscatedFont"
        ));
    }

    let mut overrides = vec![
        ("/word/document.xml".to_string(), format!("{}.document.main+xml", WORDML_CT)),
        ("/word/styles.xml".to_string(), format!("{}.styles+xml", WORDML_CT)),
        ("/word/settings.xml".to_string(), format!("{}.settings+xml", WORDML_CT)),
        ("/word/webSettings.xml".to_string(), format!("{}.webSettings+xml", WORDML_CT)),
        ("/word/fontTable.xml".to_string(), format!("{}.fontTable+xml", WORDML_CT)),
        (
            format!("/word/{}", THEME_TARGET),
            "application/vnd.openxmlformats-officedocument.theme+xml".to_string(),
        ),
        (
            "/docProps/core.xml".to_string(),
            "application/vnd.openxmlformats-package.core-properties+xml".to_string(),
        ),
    ];
    if has_numbering {
        overrides.push((
            "/word/numbering.xml".to_string(),
            format!("{}.numbering+xml", WORDML_CT),
        ));
    }
    for (id, _) in ctx.header_parts() {
        overrides.push((
            format!("/word/header{}.xml", id),
            format!("{}.header+xml", WORDML_CT),
        ));
    }
    for (id, _) in ctx.footer_parts() {
        overrides.push((
            format!("/word/footer{}.xml", id),
            format!("{}.footer+xml", WORDML_CT),
        ));
    }
    for (part, content_type) in overrides {
        xml.push_str(&format!(
            r#"<Override PartName="{}" ContentType="{}"/>"#,
            part, content_type
        ));
    }

    xml.push_str("</Types>");
    xml
}

/// Generate `_rels/.rels`
pub fn root_relationships_xml() -> String {
    format!(
        r#"{}
<Relationships xmlns="{}"><Relationship Id="rId1" Type="{}" Target="word/document.xml"/><Relationship Id="rId2" Type="{}" Target="docProps/core.xml"/></Relationships>"#,
        XML_DECLARATION,
        RELATIONSHIPS_NS,
        RelationshipKind::OfficeDocument.uri(),
        RelationshipKind::CoreProperties.uri()
    )
}

/// Generate `docProps/core.xml`
///
/// Missing or unreadable dates fall back to `now`.
pub fn core_xml(options: &DocumentOptions, now: DateTime<Utc>) -> String {
    let created = resolve_date(options.created.as_deref(), now);
    let modified = resolve_date(options.modified.as_deref(), now);

    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#);
    xml.push_str(&format!("<dc:title>{}</dc:title>", escape_xml(&options.title)));
    xml.push_str(&format!("<dc:subject>{}</dc:subject>", escape_xml(&options.subject)));
    xml.push_str(&format!("<dc:creator>{}</dc:creator>", escape_xml(&options.creator)));
    xml.push_str(&format!(
        "<cp:keywords>{}</cp:keywords>",
        escape_xml(&options.keywords.join(", "))
    ));
    xml.push_str(&format!(
        "<dc:description>{}</dc:description>",
        escape_xml(&options.description)
    ));
    xml.push_str(&format!(
        "<cp:lastModifiedBy>{}</cp:lastModifiedBy>",
        escape_xml(&options.last_modified_by)
    ));
    xml.push_str(&format!("<cp:revision>{}</cp:revision>", options.revision));
    xml.push_str(&format!(
        r#"<dcterms:created xsi:type="dcterms:W3CDTF">{}</dcterms:created>"#,
        created
    ));
    xml.push_str(&format!(
        r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{}</dcterms:modified>"#,
        modified
    ));
    xml.push_str("</cp:coreProperties>");
    xml
}

/// Normalize an RFC 3339 timestamp or a plain date to W3CDTF in UTC
fn resolve_date(value: Option<&str>, now: DateTime<Utc>) -> String {
    let parsed = value.map(str::trim).filter(|v| !v.is_empty()).and_then(|v| {
        DateTime::parse_from_rfc3339(v)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(v, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc())
            })
            .or_else(|| {
                log::warn!("Ignoring unreadable date {:?}", v);
                None
            })
    });
    parsed
        .unwrap_or(now)
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

// ==================== Document ====================

/// Generate `word/document.xml` around walked body content
///
/// The trailing section properties describe the last recorded section.
pub fn document_xml(ctx: &DocumentContext, body: &str) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(&format!("<w:document {}>", content_namespaces()));
    if let Some(color) = &ctx.page_background {
        xml.push_str(&format!(r#"<w:background w:color="{}"/>"#, color));
    }
    xml.push_str("<w:body>");
    xml.push_str(body);

    let trailing = match ctx.sections().last() {
        Some(section) => section_properties(ctx, section),
        None => section_properties(ctx, &document_section(ctx)),
    };
    xml.push_str(&trailing);
    xml.push_str("</w:body></w:document>");
    xml
}

fn document_section(ctx: &DocumentContext) -> Section {
    Section {
        index: 0,
        header_type: ctx.section_defaults.header_type.clone(),
        footer_type: ctx.section_defaults.footer_type.clone(),
        margins: ctx.geometry.margins,
        background: None,
        header: None,
    }
}

/// `w:type` of a header or footer reference
fn reference_type(type_name: &str) -> &'static str {
    match type_name {
        "first" => "first",
        "even" => "even",
        _ => "default",
    }
}

/// Generate `w:sectPr` for a section
///
/// A section's own background header wins over the header registered for
/// its type. First-page parts are referenced when a distinct first page is
/// enabled.
pub fn section_properties(ctx: &DocumentContext, section: &Section) -> String {
    let defaults = &ctx.section_defaults;
    let mut xml = String::from("<w:sectPr>");

    let header = section
        .header
        .as_ref()
        .or_else(|| ctx.header(&section.header_type));
    if let Some(header) = header {
        xml.push_str(&format!(
            r#"<w:headerReference w:type="{}" r:id="{}"/>"#,
            reference_type(&section.header_type),
            header.rel_id
        ));
    }
    let first_header = ctx.header("first").filter(|_| section.header_type != "first");
    if defaults.title_page {
        if let Some(first) = first_header {
            xml.push_str(&format!(
                r#"<w:headerReference w:type="first" r:id="{}"/>"#,
                first.rel_id
            ));
        }
    }

    if let Some(footer) = ctx.footer(&section.footer_type) {
        xml.push_str(&format!(
            r#"<w:footerReference w:type="{}" r:id="{}"/>"#,
            reference_type(&section.footer_type),
            footer.rel_id
        ));
    }
    let first_footer = ctx.footer("first").filter(|_| section.footer_type != "first");
    if defaults.title_page {
        if let Some(first) = first_footer {
            xml.push_str(&format!(
                r#"<w:footerReference w:type="first" r:id="{}"/>"#,
                first.rel_id
            ));
        }
    }

    let geometry = &ctx.geometry;
    xml.push_str(&format!(
        r#"<w:pgSz w:w="{}" w:h="{}" w:orient="{}"/>"#,
        geometry.width,
        geometry.height,
        match geometry.orientation {
            crate::options::Orientation::Portrait => "portrait",
            crate::options::Orientation::Landscape => "landscape",
        }
    ));
    let m = &section.margins;
    xml.push_str(&format!(
        r#"<w:pgMar w:top="{}" w:right="{}" w:bottom="{}" w:left="{}" w:header="{}" w:footer="{}" w:gutter="{}"/>"#,
        m.top, m.right, m.bottom, m.left, m.header, m.footer, m.gutter
    ));
    if let Some(numbering) = &defaults.line_numbering {
        xml.push_str(&format!(
            r#"<w:lnNumType w:countBy="{}" w:start="{}" w:restart="{}"/>"#,
            numbering.count_by,
            numbering.start,
            numbering.restart.as_ooxml()
        ));
    }
    let has_first = ctx.header("first").is_some() || ctx.footer("first").is_some();
    if defaults.title_page && has_first {
        xml.push_str("<w:titlePg/>");
    }
    xml.push_str("</w:sectPr>");
    xml
}

// ==================== Settings & styles ====================

/// Generate `word/settings.xml`
pub fn settings_xml(embed_fonts: bool, display_background: bool) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(&format!(r#"<w:settings xmlns:w="{}">"#, NS_W));
    xml.push_str(r#"<w:zoom w:percent="100"/>"#);
    if display_background {
        xml.push_str("<w:displayBackgroundShape/>");
    }
    if embed_fonts {
        xml.push_str("<w:embedTrueTypeFonts/>");
    }
    xml.push_str(r#"<w:defaultTabStop w:val="720"/>"#);
    xml.push_str(r#"<w:characterSpacingControl w:val="doNotCompress"/>"#);
    xml.push_str(r#"<w:compat><w:compatSetting w:name="compatibilityMode" w:uri="http://schemas.microsoft.com/office/word" w:val="15"/></w:compat>"#);
    xml.push_str("</w:settings>");
    xml
}

/// Generate `word/webSettings.xml`
pub fn web_settings_xml() -> String {
    format!(
        r#"{}
<w:webSettings xmlns:w="{}"><w:optimizeForBrowser/><w:allowPNG/></w:webSettings>"#,
        XML_DECLARATION, NS_W
    )
}

/// Generate `word/styles.xml`
///
/// Document defaults carry the configured font, sizes and language; the
/// configured paragraph spacing becomes the default spacing.
pub fn styles_xml(defaults: &TextDefaults) -> String {
    let font = escape_xml(&defaults.font);
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(&format!(r#"<w:styles xmlns:w="{}">"#, NS_W));

    xml.push_str("<w:docDefaults><w:rPrDefault><w:rPr>");
    xml.push_str(&format!(
        r#"<w:rFonts w:ascii="{f}" w:eastAsia="{f}" w:hAnsi="{f}" w:cs="{f}"/>"#,
        f = font
    ));
    xml.push_str(&format!(
        r#"<w:sz w:val="{}"/><w:szCs w:val="{}"/>"#,
        defaults.font_size, defaults.complex_script_font_size
    ));
    xml.push_str(&format!(
        r#"<w:lang w:val="{l}" w:eastAsia="{l}" w:bidi="ar-SA"/>"#,
        l = escape_xml(&defaults.lang)
    ));
    xml.push_str("</w:rPr></w:rPrDefault><w:pPrDefault><w:pPr>");
    if let Some(spacing) = defaults.spacing {
        xml.push_str(&format!(
            r#"<w:spacing w:before="{}" w:after="{}" w:line="{}" w:lineRule="auto"/>"#,
            spacing.before, spacing.after, spacing.line
        ));
    }
    xml.push_str("</w:pPr></w:pPrDefault></w:docDefaults>");

    xml.push_str(r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style>"#);
    xml.push_str(r#"<w:style w:type="character" w:default="1" w:styleId="DefaultParagraphFont"><w:name w:val="Default Paragraph Font"/><w:uiPriority w:val="1"/><w:semiHidden/><w:unhideWhenUsed/></w:style>"#);
    xml.push_str(r#"<w:style w:type="table" w:default="1" w:styleId="TableNormal"><w:name w:val="Normal Table"/><w:uiPriority w:val="99"/><w:semiHidden/><w:unhideWhenUsed/><w:tblPr><w:tblInd w:w="0" w:type="dxa"/><w:tblCellMar><w:top w:w="0" w:type="dxa"/><w:left w:w="108" w:type="dxa"/><w:bottom w:w="0" w:type="dxa"/><w:right w:w="108" w:type="dxa"/></w:tblCellMar></w:tblPr></w:style>"#);

    for (index, size) in HEADING_SIZES.iter().enumerate() {
        let level = index + 1;
        xml.push_str(&format!(
            r#"<w:style w:type="paragraph" w:styleId="Heading{l}"><w:name w:val="heading {l}"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:uiPriority w:val="9"/><w:qFormat/><w:pPr><w:keepNext/><w:keepLines/><w:spacing w:before="240" w:after="60"/><w:outlineLvl w:val="{o}"/></w:pPr><w:rPr><w:b/><w:bCs/><w:sz w:val="{s}"/><w:szCs w:val="{s}"/></w:rPr></w:style>"#,
            l = level,
            o = index,
            s = size
        ));
    }

    xml.push_str(r#"<w:style w:type="character" w:styleId="Hyperlink"><w:name w:val="Hyperlink"/><w:basedOn w:val="DefaultParagraphFont"/><w:uiPriority w:val="99"/><w:unhideWhenUsed/><w:rPr><w:color w:val="0563C1" w:themeColor="hyperlink"/><w:u w:val="single"/></w:rPr></w:style>"#);
    for name in ["Header", "Footer"] {
        xml.push_str(&format!(
            r#"<w:style w:type="paragraph" w:styleId="{n}"><w:name w:val="{lower}"/><w:basedOn w:val="Normal"/><w:uiPriority w:val="99"/><w:unhideWhenUsed/><w:pPr><w:tabs><w:tab w:val="center" w:pos="4680"/><w:tab w:val="right" w:pos="9360"/></w:tabs><w:spacing w:after="0" w:line="240" w:lineRule="auto"/></w:pPr></w:style>"#,
            n = name,
            lower = name.to_lowercase()
        ));
    }
    xml.push_str(r#"<w:style w:type="paragraph" w:styleId="ListParagraph"><w:name w:val="List Paragraph"/><w:basedOn w:val="Normal"/><w:uiPriority w:val="34"/><w:qFormat/><w:pPr><w:ind w:left="720"/><w:contextualSpacing/></w:pPr></w:style>"#);

    xml.push_str("</w:styles>");
    xml
}

/// Generate `word/theme/theme1.xml` with `font` as major and minor latin font
pub fn theme_xml(font: &str) -> String {
    let font = escape_xml(font);
    let colors = [
        ("dk1", r#"<a:sysClr val="windowText" lastClr="000000"/>"#.to_string()),
        ("lt1", r#"<a:sysClr val="window" lastClr="FFFFFF"/>"#.to_string()),
        ("dk2", srgb("44546A")),
        ("lt2", srgb("E7E6E6")),
        ("accent1", srgb("4472C4")),
        ("accent2", srgb("ED7D31")),
        ("accent3", srgb("A5A5A5")),
        ("accent4", srgb("FFC000")),
        ("accent5", srgb("5B9BD5")),
        ("accent6", srgb("70AD47")),
        ("hlink", srgb("0563C1")),
        ("folHlink", srgb("954F72")),
    ];

    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(&format!(r#"<a:theme xmlns:a="{}" name="Office Theme">"#, NS_A));
    xml.push_str(r#"<a:themeElements><a:clrScheme name="Office">"#);
    for (name, value) in &colors {
        xml.push_str(&format!("<a:{n}>{}</a:{n}>", value, n = name));
    }
    xml.push_str("</a:clrScheme>");
    xml.push_str(&format!(
        r#"<a:fontScheme name="Office"><a:majorFont><a:latin typeface="{f}"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="{f}"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme>"#,
        f = font
    ));

    let solid = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    xml.push_str(r#"<a:fmtScheme name="Office"><a:fillStyleLst>"#);
    xml.push_str(&solid.repeat(3));
    xml.push_str("</a:fillStyleLst><a:lnStyleLst>");
    for width in [6350, 12700, 19050] {
        xml.push_str(&format!(
            r#"<a:ln w="{}" cap="flat" cmpd="sng" algn="ctr">{}<a:prstDash val="solid"/><a:miter lim="800000"/></a:ln>"#,
            width, solid
        ));
    }
    xml.push_str("</a:lnStyleLst><a:effectStyleLst>");
    xml.push_str(&"<a:effectStyle><a:effectLst/></a:effectStyle>".repeat(3));
    xml.push_str("</a:effectStyleLst><a:bgFillStyleLst>");
    xml.push_str(&solid.repeat(3));
    xml.push_str("</a:bgFillStyleLst></a:fmtScheme></a:themeElements>");
    xml.push_str("<a:objectDefaults/><a:extraClrSchemeLst/></a:theme>");
    xml
}

fn srgb(hex: &str) -> String {
    format!(r#"<a:srgbClr val="{}"/>"#, hex)
}
