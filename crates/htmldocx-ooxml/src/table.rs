//! Table layout
//!
//! Resolves a `table` element into `w:tbl`: table width and placement, the
//! column grid, per-side borders with collapsed-border priority between
//! neighbouring cells, row heights and cell properties. Cell content goes
//! back through the block walker against the cell's own width.

use htmldocx_dom::{Element, Node, StyleMap};

use crate::attributes::StyleBag;
use crate::color;
use crate::context::DocumentContext;
use crate::css::{self, Background, BorderDecl, BorderStroke, BoxSides, CellAlign, Length};
use crate::paragraph;
use crate::walker::{self, BlockScope};

/// Minimum row height when a cell declares padding or margin, in TWIP
pub const PADDED_ROW_HEIGHT: i64 = 400;
/// Columns in a column-group layout
pub const COLUMN_GRID: i64 = 12;
/// Horizontal cell margin of column-group layouts, in TWIP
const COLUMN_CELL_MARGIN: i64 = 100;

/// Constraints for laying out one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    /// Width available to the table, in TWIP
    pub maximum_width: i64,
}

/// One resolved border edge
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeBorder {
    pub stroke: BorderStroke,
    /// Eighths of a point
    pub size: u32,
    pub color: String,
}

impl EdgeBorder {
    /// Resolve a declaration; invisible or zero-width borders give `None`
    pub fn from_decl(decl: &BorderDecl) -> Option<Self> {
        if decl.is_suppressed() {
            return None;
        }
        let width = decl.width.unwrap_or(1.0);
        Some(EdgeBorder {
            stroke: decl.stroke.unwrap_or(BorderStroke::Solid),
            size: (width * 8.0).round() as u32,
            color: decl
                .color
                .clone()
                .unwrap_or_else(|| color::DEFAULT_COLOR.to_string()),
        })
    }

    fn to_xml(&self, side: &str) -> String {
        format!(
            r#"<w:{} w:val="{}" w:sz="{}" w:space="0" w:color="{}"/>"#,
            side,
            self.stroke.as_ooxml(),
            self.size,
            self.color
        )
    }
}

/// Borders of a table or cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Borders {
    pub sides: BoxSides<Option<EdgeBorder>>,
    /// `border-style: hidden` or `border-width: 0`
    pub forced_none: bool,
}

impl Borders {
    /// Resolve borders from CSS on top of a uniform default
    pub fn resolve(style: &StyleMap, default: Option<&BorderDecl>) -> Self {
        let hidden = style
            .get("border-style")
            .and_then(BorderStroke::parse)
            .is_some_and(|s| s == BorderStroke::Hidden);
        let zero_width = style
            .get("border-width")
            .and_then(css::parse_border_width)
            .is_some_and(|w| w == 0.0);
        if hidden || zero_width {
            return Borders {
                sides: BoxSides::default(),
                forced_none: true,
            };
        }

        let mut decls: BoxSides<Option<BorderDecl>> = BoxSides {
            top: default.cloned(),
            right: default.cloned(),
            bottom: default.cloned(),
            left: default.cloned(),
        };

        if let Some(border) = style.get("border") {
            let decl = BorderDecl::parse(border);
            for side in sides_mut(&mut decls) {
                *side = Some(decl.clone());
            }
        }
        if let Some(c) = style.get("border-color").and_then(color::resolve_color) {
            for decl in sides_mut(&mut decls).into_iter().flatten() {
                decl.color = Some(c.clone());
            }
        }
        if let Some(width) = style.get("border-width").and_then(css::parse_border_width) {
            for decl in sides_mut(&mut decls).into_iter().flatten() {
                decl.width = Some(width);
            }
        }
        if let Some(stroke) = style.get("border-style").and_then(BorderStroke::parse) {
            for side in sides_mut(&mut decls) {
                side.get_or_insert_with(BorderDecl::default).stroke = Some(stroke);
            }
        }
        for (name, side) in ["top", "right", "bottom", "left"]
            .into_iter()
            .zip(sides_mut(&mut decls))
        {
            if let Some(value) = style.get(&format!("border-{}", name)) {
                *side = Some(BorderDecl::parse(value));
            }
        }

        let resolve = |decl: &Option<BorderDecl>| decl.as_ref().and_then(EdgeBorder::from_decl);
        Borders {
            sides: BoxSides {
                top: resolve(&decls.top),
                right: resolve(&decls.right),
                bottom: resolve(&decls.bottom),
                left: resolve(&decls.left),
            },
            forced_none: false,
        }
    }

    /// Check whether nothing is drawn or forced
    pub fn is_empty(&self) -> bool {
        !self.forced_none
            && self.sides.top.is_none()
            && self.sides.right.is_none()
            && self.sides.bottom.is_none()
            && self.sides.left.is_none()
    }

    /// Side elements in schema order, `none` for forced or missing sides
    fn sides_xml(&self) -> String {
        let mut xml = String::new();
        let sides = [
            ("top", &self.sides.top),
            ("left", &self.sides.left),
            ("bottom", &self.sides.bottom),
            ("right", &self.sides.right),
        ];
        for (name, side) in sides {
            match side {
                Some(border) => xml.push_str(&border.to_xml(name)),
                None if self.forced_none => xml.push_str(&format!(
                    r#"<w:{} w:val="none" w:sz="0" w:space="0" w:color="auto"/>"#,
                    name
                )),
                None => {}
            }
        }
        xml
    }
}

fn sides_mut<T>(sides: &mut BoxSides<T>) -> [&mut T; 4] {
    [
        &mut sides.top,
        &mut sides.right,
        &mut sides.bottom,
        &mut sides.left,
    ]
}

/// Resolved table width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableWidth {
    /// TWIP
    pub twip: i64,
    /// Fiftieths of a percent, for percentage widths left unclamped
    pub pct: Option<i64>,
}

impl TableWidth {
    /// Resolve `width`, `min-width` and `max-width` against `maximum`
    pub fn resolve(style: &StyleMap, maximum: i64) -> Self {
        let length = |name: &str| {
            style
                .get(name)
                .and_then(Length::try_parse)
                .filter(|l| !l.is_auto())
        };
        let width = length("width");
        let min = length("min-width").and_then(|l| l.to_twip_of(maximum));
        let max = length("max-width").and_then(|l| l.to_twip_of(maximum));

        let declared = width
            .and_then(|l| l.to_twip_of(maximum))
            .or(min)
            .unwrap_or(maximum);
        let mut twip = declared;
        if let Some(max) = max {
            twip = twip.min(max);
        }
        if let Some(min) = min {
            twip = twip.max(min);
        }
        twip = twip.min(maximum).max(0);

        let pct = match width {
            Some(Length::Percent(p)) if twip == declared => Some((p * 50.0).round() as i64),
            _ => None,
        };
        TableWidth { twip, pct }
    }

    fn to_xml(self) -> String {
        match self.pct {
            Some(pct) => format!(r#"<w:tblW w:w="{}" w:type="pct"/>"#, pct),
            None => format!(r#"<w:tblW w:w="{}" w:type="dxa"/>"#, self.twip),
        }
    }
}

/// Horizontal placement from side margins
fn table_alignment(style: &StyleMap) -> Option<&'static str> {
    let shorthand = style
        .get("margin")
        .map(BoxSides::parse_shorthand)
        .unwrap_or_default();
    let side = |name: &str, fallback: Option<Length>| {
        style.get(name).and_then(Length::try_parse).or(fallback)
    };
    let left = side("margin-left", shorthand.left).is_some_and(Length::is_auto);
    let right = side("margin-right", shorthand.right).is_some_and(Length::is_auto);
    match (left, right) {
        (true, true) => Some("center"),
        (true, false) => Some("right"),
        _ => None,
    }
}

struct CellLayout<'a> {
    element: &'a Element,
    col_start: usize,
    span: usize,
    borders: Borders,
}

struct RowLayout<'a> {
    header: bool,
    cells: Vec<CellLayout<'a>>,
}

fn collect_rows(table: &Element) -> Vec<RowLayout<'_>> {
    let mut rows = Vec::new();
    for child in table.child_elements() {
        match child.tag.as_str() {
            "tr" => rows.push(row_layout(child, false)),
            "thead" | "tbody" | "tfoot" => {
                let header = child.tag == "thead";
                rows.extend(
                    child
                        .child_elements()
                        .filter(|e| e.tag == "tr")
                        .map(|tr| row_layout(tr, header)),
                );
            }
            _ => {}
        }
    }
    rows
}

fn row_layout(tr: &Element, header: bool) -> RowLayout<'_> {
    let mut col = 0;
    let cells = tr
        .child_elements()
        .filter(|e| e.tag == "td" || e.tag == "th")
        .map(|cell| {
            let span = colspan(cell);
            let layout = CellLayout {
                element: cell,
                col_start: col,
                span,
                borders: Borders::resolve(&cell.style, None),
            };
            col += span;
            layout
        })
        .collect();
    RowLayout { header, cells }
}

fn colspan(cell: &Element) -> usize {
    cell.attr("colspan")
        .and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1)
}

/// Give each shared edge of collapsed cells a single border
///
/// The wider border wins; on a tie the later cell (right or below) wins.
fn resolve_collapsed(rows: &mut [RowLayout<'_>]) {
    for row in rows.iter_mut() {
        for i in 1..row.cells.len() {
            let (before, after) = row.cells.split_at_mut(i);
            resolve_edge(
                &mut before[i - 1].borders.sides.right,
                &mut after[0].borders.sides.left,
            );
        }
    }
    for r in 1..rows.len() {
        let (above, below) = rows.split_at_mut(r);
        for upper in above[r - 1].cells.iter_mut() {
            for lower in below[0].cells.iter_mut() {
                let overlaps = upper.col_start < lower.col_start + lower.span
                    && lower.col_start < upper.col_start + upper.span;
                if overlaps {
                    resolve_edge(
                        &mut upper.borders.sides.bottom,
                        &mut lower.borders.sides.top,
                    );
                }
            }
        }
    }
}

fn resolve_edge(earlier: &mut Option<EdgeBorder>, later: &mut Option<EdgeBorder>) {
    if let (Some(a), Some(b)) = (earlier.as_ref(), later.as_ref()) {
        if a.size > b.size {
            *later = None;
        } else {
            *earlier = None;
        }
    }
}

/// Declared width of a column source (`col` or first-row cell)
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnWidth {
    Percent(f64),
    Fixed(i64),
    Auto,
}

fn column_width(element: &Element) -> ColumnWidth {
    let declared = element
        .css("width")
        .or_else(|| element.attr("width"))
        .and_then(Length::try_parse);
    match declared {
        Some(Length::Percent(p)) => ColumnWidth::Percent(p),
        Some(Length::Auto) | None => ColumnWidth::Auto,
        Some(length) => length
            .to_twip()
            .map(ColumnWidth::Fixed)
            .unwrap_or(ColumnWidth::Auto),
    }
}

/// Derive the column grid
///
/// An explicit `colgroup` wins; otherwise the first row is used unless any
/// of its cells spans columns, in which case there is no grid.
fn table_grid(table: &Element, rows: &[RowLayout<'_>], width: i64) -> Option<Vec<i64>> {
    let colgroup = table.child_elements().find(|e| e.tag == "colgroup");
    let declared: Vec<ColumnWidth> = match colgroup {
        Some(group) => group
            .child_elements()
            .filter(|e| e.tag == "col")
            .map(column_width)
            .collect(),
        None => {
            let first = rows.first()?;
            if first.cells.iter().any(|c| c.span > 1) {
                return None;
            }
            first.cells.iter().map(|c| column_width(c.element)).collect()
        }
    };
    if declared.is_empty() {
        return None;
    }
    Some(distribute_columns(&declared, width))
}

fn distribute_columns(declared: &[ColumnWidth], width: i64) -> Vec<i64> {
    let total_percent: f64 = declared
        .iter()
        .filter_map(|c| match c {
            ColumnWidth::Percent(p) => Some(*p),
            _ => None,
        })
        .sum();
    let autos = declared
        .iter()
        .filter(|c| matches!(c, ColumnWidth::Auto))
        .count() as i64;
    let scale = if total_percent > 0.0 && (total_percent > 100.0 || (autos == 0 && total_percent != 100.0)) {
        100.0 / total_percent
    } else {
        1.0
    };

    let mut widths: Vec<Option<i64>> = declared
        .iter()
        .map(|c| match c {
            ColumnWidth::Percent(p) => Some((p * scale / 100.0 * width as f64).round() as i64),
            ColumnWidth::Fixed(twip) => Some(*twip),
            ColumnWidth::Auto => None,
        })
        .collect();

    if autos > 0 {
        let used: i64 = widths.iter().flatten().sum();
        let share = ((width - used).max(0)) / autos;
        for w in widths.iter_mut().filter(|w| w.is_none()) {
            *w = Some(share);
        }
    }

    let mut widths: Vec<i64> = widths.into_iter().map(|w| w.unwrap_or(0)).collect();
    let sum: i64 = widths.iter().sum();
    if sum <= 0 {
        let even = width / widths.len() as i64;
        widths.iter_mut().for_each(|w| *w = even);
    } else if sum != width {
        widths
            .iter_mut()
            .for_each(|w| *w = (*w as i128 * width as i128 / sum as i128) as i64);
    }
    widths
}

fn grid_xml(grid: Option<&[i64]>) -> String {
    match grid {
        Some(columns) if !columns.is_empty() => {
            let mut xml = String::from("<w:tblGrid>");
            for w in columns {
                xml.push_str(&format!(r#"<w:gridCol w:w="{}"/>"#, w));
            }
            xml.push_str("</w:tblGrid>");
            xml
        }
        _ => "<w:tblGrid/>".to_string(),
    }
}

/// Lay out a `table` element as `w:tbl`
pub fn build_table(ctx: &mut DocumentContext, table: &Element, layout: TableLayout) -> String {
    let style = &table.style;
    let width = TableWidth::resolve(style, layout.maximum_width);

    let attribute_border = table
        .attr("border")
        .and_then(|b| b.trim().parse::<f64>().ok())
        .filter(|&n| n > 0.0)
        .map(|n| BorderDecl {
            width: Some(n),
            stroke: Some(BorderStroke::Solid),
            color: Some(color::DEFAULT_COLOR.to_string()),
        });
    let borders = Borders::resolve(style, attribute_border.as_ref());
    let collapse = style
        .get("border-collapse")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("collapse"));

    let table_fill = style
        .get("background-color")
        .or_else(|| style.get("background"))
        .and_then(Background::parse)
        .map(|b| b.fill().to_string());

    let mut rows = collect_rows(table);
    if collapse {
        resolve_collapsed(&mut rows);
    }
    let grid = table_grid(table, &rows, width.twip);
    log::debug!(
        "Table: {} rows, width {} twip, grid {:?}",
        rows.len(),
        width.twip,
        grid
    );

    let mut xml = String::from("<w:tbl><w:tblPr>");
    xml.push_str(&width.to_xml());
    if let Some(jc) = table_alignment(style) {
        xml.push_str(&format!(r#"<w:jc w:val="{}"/>"#, jc));
    }
    xml.push_str(r#"<w:tblInd w:w="0" w:type="dxa"/>"#);
    if !borders.is_empty() {
        xml.push_str("<w:tblBorders>");
        xml.push_str(&borders.sides_xml());
        if collapse && !borders.forced_none {
            if let Some(h) = borders.sides.bottom.as_ref().or(borders.sides.top.as_ref()) {
                xml.push_str(&h.to_xml("insideH"));
            }
            if let Some(v) = borders.sides.right.as_ref().or(borders.sides.left.as_ref()) {
                xml.push_str(&v.to_xml("insideV"));
            }
        }
        xml.push_str("</w:tblBorders>");
    }
    xml.push_str(r#"<w:tblLayout w:type="fixed"/>"#);
    xml.push_str(&cell_margins_xml("tblCellMar", &BoxSides::default()));
    xml.push_str("</w:tblPr>");
    xml.push_str(&grid_xml(grid.as_deref()));

    let table_bag = cell_bag(ctx, &StyleBag::default(), table);
    for row in &rows {
        xml.push_str(&build_row(
            ctx,
            row,
            &RowContext {
                grid: grid.as_deref(),
                table_width: width.twip,
                table_fill: table_fill.as_deref(),
                table_bag: &table_bag,
            },
        ));
    }
    xml.push_str("</w:tbl>");
    xml
}

struct RowContext<'a> {
    grid: Option<&'a [i64]>,
    table_width: i64,
    table_fill: Option<&'a str>,
    table_bag: &'a StyleBag,
}

fn build_row(ctx: &mut DocumentContext, row: &RowLayout<'_>, table: &RowContext<'_>) -> String {
    let mut properties = String::new();
    if ctx.table_row_cant_split {
        properties.push_str("<w:cantSplit/>");
    }
    if let Some(height) = row_height(row) {
        properties.push_str(&format!(
            r#"<w:trHeight w:val="{}" w:hRule="atLeast"/>"#,
            height
        ));
    }
    if row.header {
        properties.push_str("<w:tblHeader/>");
    }

    let mut xml = String::from("<w:tr>");
    if !properties.is_empty() {
        xml.push_str(&format!("<w:trPr>{}</w:trPr>", properties));
    }

    let total_span: usize = row.cells.iter().map(|c| c.span).sum::<usize>().max(1);
    for cell in &row.cells {
        let width = match table.grid {
            Some(grid) if cell.col_start + cell.span <= grid.len() => {
                grid[cell.col_start..cell.col_start + cell.span].iter().sum()
            }
            _ => cell
                .element
                .css("width")
                .and_then(Length::try_parse)
                .and_then(|l| l.to_twip_of(table.table_width))
                .unwrap_or(table.table_width * cell.span as i64 / total_span as i64),
        };
        let fill = cell_fill(cell.element).or_else(|| table.table_fill.map(str::to_string));
        let cell_xml = build_cell(
            ctx,
            cell.element,
            &CellProperties {
                width,
                span: cell.span,
                borders: &cell.borders,
                fill: fill.as_deref(),
                align: cell_alignment(cell.element),
            },
            table.table_bag,
        );
        xml.push_str(&cell_xml);
    }
    xml.push_str("</w:tr>");
    xml
}

/// Minimum row height: the tallest explicit cell height, else a fixed
/// minimum when any cell is padded
fn row_height(row: &RowLayout<'_>) -> Option<i64> {
    let explicit = row
        .cells
        .iter()
        .filter_map(|c| {
            c.element
                .css("height")
                .or_else(|| c.element.attr("height"))
                .and_then(Length::try_parse)
                .and_then(Length::to_twip)
        })
        .filter(|&h| h > 0)
        .max();
    if explicit.is_some() {
        return explicit;
    }

    let padded = row.cells.iter().any(|c| {
        [
            "padding",
            "padding-top",
            "padding-bottom",
            "margin",
            "margin-top",
            "margin-bottom",
        ]
        .iter()
        .filter_map(|p| c.element.css(p))
        .any(|value| {
            value
                .split_whitespace()
                .next()
                .and_then(Length::try_parse)
                .is_some_and(Length::is_positive)
        })
    });
    padded.then_some(PADDED_ROW_HEIGHT)
}

fn cell_fill(cell: &Element) -> Option<String> {
    cell.css("background-color")
        .or_else(|| cell.css("background"))
        .and_then(Background::parse)
        .map(|b| b.fill().to_string())
}

fn cell_alignment(cell: &Element) -> CellAlign {
    if let Some(value) = cell.css("vertical-align") {
        return CellAlign::from_css(value).unwrap_or(CellAlign::Center);
    }
    cell.attr("valign")
        .and_then(CellAlign::from_valign)
        .unwrap_or(CellAlign::Center)
}

/// Cell margins from padding, falling back to margin per side
fn cell_margins(cell: &Element) -> BoxSides<i64> {
    let shorthand = |name: &str| {
        cell.css(name)
            .map(BoxSides::parse_shorthand)
            .unwrap_or_default()
    };
    let padding = shorthand("padding");
    let margin = shorthand("margin");
    let side = |name: &str, from_padding: Option<Length>, from_margin: Option<Length>| {
        let declared = |prefix: &str| cell.css(&format!("{}-{}", prefix, name)).and_then(Length::try_parse);
        declared("padding")
            .or(from_padding)
            .and_then(Length::to_twip)
            .filter(|&t| t > 0)
            .or_else(|| {
                declared("margin")
                    .or(from_margin)
                    .and_then(Length::to_twip)
                    .filter(|&t| t > 0)
            })
            .unwrap_or(0)
    };
    BoxSides {
        top: side("top", padding.top, margin.top),
        right: side("right", padding.right, margin.right),
        bottom: side("bottom", padding.bottom, margin.bottom),
        left: side("left", padding.left, margin.left),
    }
}

fn cell_margins_xml(element: &str, margins: &BoxSides<i64>) -> String {
    format!(
        r#"<w:{e}><w:top w:w="{}" w:type="dxa"/><w:left w:w="{}" w:type="dxa"/><w:bottom w:w="{}" w:type="dxa"/><w:right w:w="{}" w:type="dxa"/></w:{e}>"#,
        margins.top,
        margins.left,
        margins.bottom,
        margins.right,
        e = element
    )
}

/// Inherited formatting for cell content
///
/// Box properties belong to the cell itself, so only text formatting is
/// passed down.
fn cell_bag(ctx: &mut DocumentContext, parent: &StyleBag, element: &Element) -> StyleBag {
    parent.cascade(ctx, element, false).without_box()
}

struct CellProperties<'a> {
    width: i64,
    span: usize,
    borders: &'a Borders,
    fill: Option<&'a str>,
    align: CellAlign,
}

fn build_cell(
    ctx: &mut DocumentContext,
    cell: &Element,
    properties: &CellProperties<'_>,
    parent: &StyleBag,
) -> String {
    let margins = cell_margins(cell);

    let mut xml = String::from("<w:tc><w:tcPr>");
    xml.push_str(&format!(
        r#"<w:tcW w:w="{}" w:type="dxa"/>"#,
        properties.width
    ));
    if properties.span > 1 {
        xml.push_str(&format!(r#"<w:gridSpan w:val="{}"/>"#, properties.span));
    }
    if !properties.borders.is_empty() {
        xml.push_str("<w:tcBorders>");
        xml.push_str(&properties.borders.sides_xml());
        xml.push_str("</w:tcBorders>");
    }
    if let Some(fill) = properties.fill {
        xml.push_str(&format!(
            r#"<w:shd w:val="clear" w:color="auto" w:fill="{}"/>"#,
            fill
        ));
    }
    if margins != BoxSides::default() {
        xml.push_str(&cell_margins_xml("tcMar", &margins));
    }
    xml.push_str(&format!(
        r#"<w:vAlign w:val="{}"/>"#,
        properties.align.as_ooxml()
    ));
    xml.push_str("</w:tcPr>");

    let scope = BlockScope {
        inherited: cell_bag(ctx, parent, cell),
        maximum_width: (properties.width - margins.left - margins.right).max(0),
    };
    xml.push_str(&cell_content(ctx, &cell.children, &scope));
    xml.push_str("</w:tc>");
    xml
}

/// Cell content, always ending with a paragraph
fn cell_content(ctx: &mut DocumentContext, children: &[Node], scope: &BlockScope) -> String {
    let mut xml = walker::build_blocks(ctx, children, scope);
    if !xml.ends_with("</w:p>") {
        xml.push_str(&paragraph::empty_paragraph());
    }
    xml
}

/// Lay out a `data-docx-column-group` element as a borderless table
///
/// Each `data-docx-column="N"` child takes N twelfths of the width.
/// Returns `None` when the group has no columns.
pub fn build_column_group(
    ctx: &mut DocumentContext,
    group: &Element,
    maximum_width: i64,
) -> Option<String> {
    let columns: Vec<&Element> = group
        .child_elements()
        .filter(|e| e.has_attr("data-docx-column"))
        .collect();
    if columns.is_empty() {
        return None;
    }

    let widths: Vec<i64> = columns
        .iter()
        .map(|column| {
            let span = column
                .attr("data-docx-column")
                .and_then(|n| n.trim().parse::<i64>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(1);
            span * maximum_width / COLUMN_GRID
        })
        .collect();

    let mut xml = String::from("<w:tbl><w:tblPr>");
    xml.push_str(r#"<w:tblW w:w="5000" w:type="pct"/>"#);
    xml.push_str(r#"<w:jc w:val="left"/>"#);
    xml.push_str(r#"<w:tblInd w:w="0" w:type="dxa"/>"#);
    xml.push_str(r#"<w:tblLayout w:type="fixed"/>"#);
    xml.push_str(&cell_margins_xml(
        "tblCellMar",
        &BoxSides {
            top: 0,
            right: COLUMN_CELL_MARGIN,
            bottom: 0,
            left: COLUMN_CELL_MARGIN,
        },
    ));
    xml.push_str("</w:tblPr>");
    xml.push_str(&grid_xml(Some(&widths)));

    let no_borders = Borders {
        sides: BoxSides::default(),
        forced_none: true,
    };
    xml.push_str("<w:tr>");
    for (column, width) in columns.iter().zip(&widths) {
        let mut tc = String::from("<w:tc><w:tcPr>");
        tc.push_str(&format!(r#"<w:tcW w:w="{}" w:type="dxa"/>"#, width));
        tc.push_str("<w:tcBorders>");
        tc.push_str(&no_borders.sides_xml());
        tc.push_str("</w:tcBorders>");
        if let Some(fill) = cell_fill(column) {
            tc.push_str(&format!(
                r#"<w:shd w:val="clear" w:color="auto" w:fill="{}"/>"#,
                fill
            ));
        }
        tc.push_str(&format!(
            r#"<w:vAlign w:val="{}"/>"#,
            CellAlign::Top.as_ooxml()
        ));
        tc.push_str("</w:tcPr>");

        let scope = BlockScope {
            inherited: StyleBag::default(),
            maximum_width: (width - 2 * COLUMN_CELL_MARGIN).max(0),
        };
        tc.push_str(&cell_content(ctx, &column.children, &scope));
        tc.push_str("</w:tc>");
        xml.push_str(&tc);
    }
    xml.push_str("</w:tr></w:tbl>");
    Some(xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DocumentOptions;

    fn context() -> DocumentContext {
        DocumentContext::new(&DocumentOptions::default()).unwrap()
    }

    fn layout() -> TableLayout {
        TableLayout {
            maximum_width: 9000,
        }
    }

    fn grid_columns(xml: &str) -> Vec<i64> {
        xml.match_indices(r#"<w:gridCol w:w=""#)
            .map(|(i, m)| {
                let rest = &xml[i + m.len()..];
                rest[..rest.find('"').unwrap()].parse().unwrap()
            })
            .collect()
    }

    fn row(cells: &[&str]) -> Element {
        cells.iter().fold(Element::new("tr"), |tr, text| {
            tr.with_child(Element::new("td").with_text(*text))
        })
    }

    #[test]
    fn test_three_column_grid_sums_to_width() {
        let mut ctx = context();
        let table = Element::new("table")
            .with_child(row(&["a", "b", "c"]))
            .with_child(row(&["d", "e", "f"]));
        let xml = build_table(&mut ctx, &table, layout());
        let grid = grid_columns(&xml);
        assert_eq!(grid.len(), 3);
        let sum: i64 = grid.iter().sum();
        assert!((sum - 9000).abs() <= 3);
        assert_eq!(xml.matches("<w:tr>").count(), 2);
    }

    #[test]
    fn test_spanning_first_row_has_no_grid() {
        let mut ctx = context();
        let table = Element::new("table")
            .with_child(
                Element::new("tr").with_child(
                    Element::new("td")
                        .with_attr("colspan", "2")
                        .with_text("wide"),
                ),
            )
            .with_child(row(&["a", "b"]));
        let xml = build_table(&mut ctx, &table, layout());
        assert!(grid_columns(&xml).is_empty());
        assert!(xml.contains("<w:tblGrid/>"));
        assert!(xml.contains(r#"<w:gridSpan w:val="2"/>"#));
    }

    #[test]
    fn test_colgroup_widths() {
        let mut ctx = context();
        let table = Element::new("table")
            .with_child(
                Element::new("colgroup")
                    .with_child(Element::new("col").with_style("width", "100px"))
                    .with_child(Element::new("col")),
            )
            .with_child(row(&["a", "b"]));
        let xml = build_table(&mut ctx, &table, layout());
        assert_eq!(grid_columns(&xml), vec![1500, 7500]);
    }

    #[test]
    fn test_percentages_normalized() {
        let widths = distribute_columns(
            &[ColumnWidth::Percent(25.0), ColumnWidth::Percent(25.0)],
            8000,
        );
        assert_eq!(widths, vec![4000, 4000]);
        let widths = distribute_columns(&[ColumnWidth::Percent(25.0), ColumnWidth::Auto], 8000);
        assert_eq!(widths, vec![2000, 6000]);
    }

    #[test]
    fn test_width_clamping() {
        let style = StyleMap::parse("width: 900px; max-width: 600px");
        assert_eq!(TableWidth::resolve(&style, 20000).twip, 9000);

        let style = StyleMap::parse("width: 100px; min-width: 300px");
        assert_eq!(TableWidth::resolve(&style, 20000).twip, 4500);

        let style = StyleMap::parse("width: 2000px");
        assert_eq!(TableWidth::resolve(&style, 9000).twip, 9000);

        let style = StyleMap::parse("width: 50%");
        let width = TableWidth::resolve(&style, 9000);
        assert_eq!(width.twip, 4500);
        assert_eq!(width.pct, Some(2500));

        assert_eq!(TableWidth::resolve(&StyleMap::new(), 9000).twip, 9000);
    }

    #[test]
    fn test_alignment_from_margins() {
        assert_eq!(table_alignment(&StyleMap::parse("margin: 0 auto")), Some("center"));
        assert_eq!(
            table_alignment(&StyleMap::parse("margin-left: auto; margin-right: auto")),
            Some("center")
        );
        assert_eq!(table_alignment(&StyleMap::parse("margin-left: auto")), Some("right"));
        assert_eq!(table_alignment(&StyleMap::parse("margin: 10px")), None);
    }

    #[test]
    fn test_border_attribute_default_and_overrides() {
        let default = BorderDecl {
            width: Some(1.0),
            stroke: Some(BorderStroke::Solid),
            color: Some("000000".to_string()),
        };
        let borders = Borders::resolve(
            &StyleMap::parse("border-top: 2px dashed #ff0000"),
            Some(&default),
        );
        let top = borders.sides.top.unwrap();
        assert_eq!(top.size, 16);
        assert_eq!(top.stroke, BorderStroke::Dashed);
        assert_eq!(top.color, "FF0000");
        assert_eq!(borders.sides.left.unwrap().size, 8);
    }

    #[test]
    fn test_hidden_border_wins() {
        let borders = Borders::resolve(
            &StyleMap::parse("border: 3px solid red; border-style: hidden"),
            None,
        );
        assert!(borders.forced_none);
        assert!(borders.sides.top.is_none());
        assert!(borders.sides_xml().contains(r#"<w:top w:val="none""#));

        let borders = Borders::resolve(&StyleMap::parse("border: 3px solid red; border-width: 0"), None);
        assert!(borders.forced_none);
    }

    #[test]
    fn test_collapsed_borders_keep_wider() {
        let mut ctx = context();
        let table = Element::new("table")
            .with_style("border-collapse", "collapse")
            .with_child(
                Element::new("tr")
                    .with_child(
                        Element::new("td")
                            .with_style("border-right", "2px solid #000")
                            .with_text("a"),
                    )
                    .with_child(
                        Element::new("td")
                            .with_style("border-left", "4px solid #000")
                            .with_text("b"),
                    ),
            );
        let xml = build_table(&mut ctx, &table, layout());
        assert!(xml.contains(r#"<w:left w:val="single" w:sz="32""#));
        assert!(!xml.contains(r#"w:sz="16""#));
    }

    #[test]
    fn test_collapsed_tie_favours_later_cell() {
        let mut earlier = Some(EdgeBorder {
            stroke: BorderStroke::Solid,
            size: 8,
            color: "000000".to_string(),
        });
        let mut later = Some(EdgeBorder {
            stroke: BorderStroke::Dotted,
            size: 8,
            color: "000000".to_string(),
        });
        resolve_edge(&mut earlier, &mut later);
        assert!(earlier.is_none());
        assert_eq!(later.unwrap().stroke, BorderStroke::Dotted);
    }

    #[test]
    fn test_collapsed_table_has_inside_borders() {
        let mut ctx = context();
        let table = Element::new("table")
            .with_attr("border", "1")
            .with_style("border-collapse", "collapse")
            .with_child(row(&["a"]));
        let xml = build_table(&mut ctx, &table, layout());
        assert!(xml.contains("<w:insideH "));
        assert!(xml.contains("<w:insideV "));
    }

    #[test]
    fn test_header_rows_and_cant_split() {
        let options = DocumentOptions {
            table: crate::options::TableOptions {
                row: crate::options::RowOptions { cant_split: true },
            },
            ..Default::default()
        };
        let mut ctx = DocumentContext::new(&options).unwrap();
        let table = Element::new("table")
            .with_child(Element::new("thead").with_child(
                Element::new("tr").with_child(Element::new("th").with_text("H")),
            ))
            .with_child(Element::new("tbody").with_child(row(&["x"])));
        let xml = build_table(&mut ctx, &table, layout());
        assert_eq!(xml.matches("<w:tblHeader/>").count(), 1);
        assert_eq!(xml.matches("<w:cantSplit/>").count(), 2);
        // th content is bold
        assert!(xml.contains("<w:b/>"));
    }

    #[test]
    fn test_row_height() {
        let mut ctx = context();
        let padded = Element::new("table").with_child(
            Element::new("tr").with_child(Element::new("td").with_style("padding", "4px").with_text("x")),
        );
        let xml = build_table(&mut ctx, &padded, layout());
        assert!(xml.contains(r#"<w:trHeight w:val="400" w:hRule="atLeast"/>"#));
        assert!(xml.contains(r#"<w:tcMar><w:top w:w="60""#));

        let tall = Element::new("table").with_child(
            Element::new("tr")
                .with_child(Element::new("td").with_style("height", "40px"))
                .with_child(Element::new("td").with_style("height", "20px").with_style("padding", "2px")),
        );
        let xml = build_table(&mut ctx, &tall, layout());
        assert!(xml.contains(r#"<w:trHeight w:val="600" w:hRule="atLeast"/>"#));

        let plain = Element::new("table").with_child(row(&["x"]));
        assert!(!build_table(&mut ctx, &plain, layout()).contains("<w:trHeight"));
    }

    #[test]
    fn test_cell_properties() {
        let mut ctx = context();
        let table = Element::new("table")
            .with_style("background-color", "#eeeeee")
            .with_child(
                Element::new("tr")
                    .with_child(
                        Element::new("td")
                            .with_attr("valign", "top")
                            .with_style("background", "linear-gradient(#123456, #ffffff)")
                            .with_style("text-align", "right")
                            .with_text("a"),
                    )
                    .with_child(Element::new("td").with_style("vertical-align", "bottom")),
            );
        let xml = build_table(&mut ctx, &table, layout());
        assert!(xml.contains(r#"w:fill="123456""#));
        assert!(xml.contains(r#"w:fill="EEEEEE""#));
        assert!(xml.contains(r#"<w:vAlign w:val="top"/>"#));
        assert!(xml.contains(r#"<w:vAlign w:val="bottom"/>"#));
        assert!(xml.contains(r#"<w:jc w:val="right"/>"#));
        // The empty cell still ends with a paragraph
        assert!(xml.contains(r#"<w:vAlign w:val="bottom"/></w:tcPr><w:p>"#));
    }

    #[test]
    fn test_nested_table_uses_cell_width() {
        let mut ctx = context();
        let inner = Element::new("table").with_child(row(&["inner"]));
        let table = Element::new("table").with_child(
            Element::new("tr")
                .with_child(Element::new("td").with_child(inner))
                .with_child(Element::new("td").with_text("b")),
        );
        let xml = build_table(&mut ctx, &table, layout());
        assert_eq!(xml.matches("<w:tbl>").count(), 2);
        assert!(xml.contains(r#"<w:tblW w:w="4500" w:type="dxa"/>"#));
        // A nested table is followed by the closing paragraph
        assert!(xml.contains("</w:tbl><w:p>"));
    }

    #[test]
    fn test_column_group() {
        let mut ctx = context();
        let group = Element::new("div")
            .with_attr("data-docx-column-group", "true")
            .with_child(
                Element::new("div")
                    .with_attr("data-docx-column", "4")
                    .with_child(Element::new("p").with_text("left")),
            )
            .with_child(
                Element::new("div")
                    .with_attr("data-docx-column", "8")
                    .with_child(Element::new("p").with_text("right")),
            );
        let xml = build_column_group(&mut ctx, &group, 9000).unwrap();
        assert_eq!(grid_columns(&xml), vec![3000, 6000]);
        assert!(xml.contains(r#"<w:tblW w:w="5000" w:type="pct"/>"#));
        assert_eq!(xml.matches(r#"<w:vAlign w:val="top"/>"#).count(), 2);

        let empty = Element::new("div").with_attr("data-docx-column-group", "true");
        assert!(build_column_group(&mut ctx, &empty, 9000).is_none());
    }
}
