//! XLSX style parser: extracts cell styles from styles.xml and per-cell style
//! IDs, column widths, row heights and merges from worksheet XML.
//!
//! Used by template fill to clone the styling of existing rows onto new ones
//! and to carry the rest of a template's formatting into the output workbook.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use zip::ZipArchive;

// =============================================================================
// Public types
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BorderLine {
    #[default]
    None,
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
}

/// One side of a cell border.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Edge {
    pub line: BorderLine,
    pub color: Option<[u8; 4]>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HorizontalAlign {
    #[default]
    General,
    Left,
    Center,
    Right,
    Justify,
    CenterAcross,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerticalAlign {
    #[default]
    Bottom,
    Top,
    Center,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum NumFormat {
    #[default]
    General,
    /// One of Excel's built-in format ids.
    Builtin(u8),
    Custom(String),
}

/// Resolved style of one `<xf>` entry. Cloned by value whenever a template
/// style is reused, so each written cell owns its descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub font_size: Option<f64>,
    pub font_color: Option<[u8; 4]>,
    pub font_family: Option<String>,
    pub background_color: Option<[u8; 4]>,
    pub border_top: Edge,
    pub border_right: Edge,
    pub border_bottom: Edge,
    pub border_left: Edge,
    pub horizontal: HorizontalAlign,
    pub vertical: VerticalAlign,
    pub wrap: bool,
    pub num_format: NumFormat,
}

impl CellStyle {
    /// Copy of this style with word-wrap on and vertical centering.
    pub fn wrapped_centered(&self) -> CellStyle {
        CellStyle {
            wrap: true,
            vertical: VerticalAlign::Center,
            ..self.clone()
        }
    }
}

/// Parsed style table from styles.xml: maps cellXfs index to CellStyle.
#[derive(Debug, Clone, Default)]
pub struct StyleTable {
    pub styles: Vec<CellStyle>,
}

impl StyleTable {
    pub fn get(&self, id: usize) -> Option<&CellStyle> {
        self.styles.get(id)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// Per-cell style references and layout extracted from a worksheet XML.
#[derive(Debug, Clone, Default)]
pub struct SheetFormatting {
    /// (row, col) → style id, 0-based; style 0 (the default) is not recorded
    pub cell_styles: HashMap<(usize, usize), usize>,
    /// Column widths in raw Excel character-width units
    pub col_widths: HashMap<usize, f64>,
    /// Row heights in raw Excel point units
    pub row_heights: HashMap<usize, f64>,
    /// Merged cell regions: (start_row, start_col, end_row, end_col)
    pub merged_regions: Vec<(usize, usize, usize, usize)>,
}

impl SheetFormatting {
    pub fn style_id(&self, row: usize, col: usize) -> Option<usize> {
        self.cell_styles.get(&(row, col)).copied()
    }
}

/// Everything the template filler needs from a workbook's XML parts.
#[derive(Debug, Clone, Default)]
pub struct TemplateFormatting {
    pub styles: StyleTable,
    /// One entry per requested sheet name, in the same order
    pub sheets: Vec<SheetFormatting>,
    /// Style features that were approximated or ignored
    pub unsupported: Vec<String>,
}

// =============================================================================
// XML entity unescaping
// =============================================================================

fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

// =============================================================================
// Colors
// =============================================================================

/// Subset of the legacy indexed palette that templates actually use.
fn indexed_color(idx: u8) -> Option<[u8; 4]> {
    let rgb: [u8; 3] = match idx {
        0 | 8 => [0, 0, 0],
        1 | 9 => [255, 255, 255],
        2 | 10 => [255, 0, 0],
        3 | 11 => [0, 255, 0],
        4 | 12 => [0, 0, 255],
        5 | 13 => [255, 255, 0],
        6 | 14 => [255, 0, 255],
        7 | 15 => [0, 255, 255],
        16 => [128, 0, 0],
        17 => [0, 128, 0],
        18 => [0, 0, 128],
        22 => [192, 192, 192],
        23 => [128, 128, 128],
        55 => [150, 150, 150],
        64 => [0, 0, 0],       // System foreground
        65 => [255, 255, 255], // System background
        _ => return None,
    };
    Some([rgb[0], rgb[1], rgb[2], 255])
}

/// Default Office theme colors, without tint.
fn theme_color_default(idx: u8) -> Option<[u8; 4]> {
    let rgb: [u8; 3] = match idx {
        0 => [255, 255, 255],
        1 => [0, 0, 0],
        2 => [231, 230, 230],
        3 => [68, 84, 106],
        4 => [68, 114, 196],
        5 => [237, 125, 49],
        6 => [165, 165, 165],
        7 => [255, 192, 0],
        8 => [91, 155, 213],
        9 => [112, 173, 71],
        _ => return None,
    };
    Some([rgb[0], rgb[1], rgb[2], 255])
}

/// Color from `rgb`, `indexed` or `theme` attributes, in that preference order.
fn parse_color_attrs(
    attrs: &[(Vec<u8>, Vec<u8>)],
    unsupported: &mut Vec<String>,
) -> Option<[u8; 4]> {
    let mut rgb_val: Option<&[u8]> = None;
    let mut indexed_val: Option<u8> = None;
    let mut theme_val: Option<u8> = None;

    for (key, value) in attrs {
        match key.as_slice() {
            b"rgb" => rgb_val = Some(value.as_slice()),
            b"indexed" => indexed_val = parse_attr(value),
            b"theme" => theme_val = parse_attr(value),
            _ => {}
        }
    }

    if let Some(hex) = rgb_val {
        return parse_argb_hex(hex);
    }
    if let Some(idx) = indexed_val {
        return indexed_color(idx);
    }
    let color = theme_val.and_then(theme_color_default);
    if color.is_some() && !unsupported.iter().any(|s| s == "theme tints approximated") {
        unsupported.push("theme tints approximated".to_string());
    }
    color
}

/// Parse AARRGGBB or RRGGBB hex to RGBA.
fn parse_argb_hex(hex: &[u8]) -> Option<[u8; 4]> {
    let s = std::str::from_utf8(hex).ok()?.trim_start_matches('#');
    let byte = |i: usize| u8::from_str_radix(s.get(i..i + 2)?, 16).ok();

    match s.len() {
        8 => Some([byte(2)?, byte(4)?, byte(6)?, byte(0)?]),
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        _ => None,
    }
}

// =============================================================================
// Internal parsed components
// =============================================================================

#[derive(Debug, Clone, Default)]
struct ParsedFont {
    bold: bool,
    italic: bool,
    underline: bool,
    strikethrough: bool,
    size: Option<f64>,
    color: Option<[u8; 4]>,
    family: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct ParsedFill {
    bg_color: Option<[u8; 4]>,
}

#[derive(Debug, Clone, Default)]
struct ParsedBorder {
    top: Edge,
    right: Edge,
    bottom: Edge,
    left: Edge,
}

impl ParsedBorder {
    fn side_mut(&mut self, side: &[u8]) -> Option<&mut Edge> {
        match side {
            b"top" => Some(&mut self.top),
            b"right" => Some(&mut self.right),
            b"bottom" => Some(&mut self.bottom),
            b"left" => Some(&mut self.left),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct XfEntry {
    num_fmt_id: Option<u16>,
    font_id: Option<usize>,
    fill_id: Option<usize>,
    border_id: Option<usize>,
    h_align: Option<String>,
    v_align: Option<String>,
    wrap_text: bool,
}

// =============================================================================
// styles.xml parser
// =============================================================================

/// Parse styles.xml content into a StyleTable plus a list of approximated features.
pub fn parse_styles_xml(xml: &str) -> (StyleTable, Vec<String>) {
    let mut unsupported: Vec<String> = Vec::new();

    let custom_num_fmts = parse_num_fmts(xml);
    let fonts = parse_fonts(xml, &mut unsupported);
    let fills = parse_fills(xml, &mut unsupported);
    let borders = parse_borders(xml, &mut unsupported);

    let styles = parse_cell_xfs(xml, &custom_num_fmts, &fonts, &fills, &borders);

    (StyleTable { styles }, unsupported)
}

/// `<numFmts>` → formatId → formatCode
fn parse_num_fmts(xml: &str) -> HashMap<u16, String> {
    let mut map = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_num_fmts = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"numFmts" => in_num_fmts = true,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"numFmts" => break,
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if in_num_fmts && e.name().as_ref() == b"numFmt" =>
            {
                let mut id: Option<u16> = None;
                let mut code: Option<String> = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"numFmtId" => id = parse_attr(&attr.value),
                        b"formatCode" => {
                            code = Some(unescape_xml(&String::from_utf8_lossy(&attr.value)));
                        }
                        _ => {}
                    }
                }
                if let (Some(id), Some(code)) = (id, code) {
                    map.insert(id, code);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    map
}

fn parse_fonts(xml: &str, unsupported: &mut Vec<String>) -> Vec<ParsedFont> {
    let mut fonts = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 0 = outside, 1 = inside <fonts>, 2 = inside <font>
    let mut current = ParsedFont::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"fonts" if depth == 0 => depth = 1,
                b"font" if depth == 1 => {
                    depth = 2;
                    current = ParsedFont::default();
                }
                b"color" if depth == 2 => {
                    current.color = parse_color_attrs(&collect_attrs(e), unsupported);
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) if depth == 2 => match e.name().as_ref() {
                b"b" => current.bold = !is_false_val(e),
                b"i" => current.italic = !is_false_val(e),
                b"u" => current.underline = !is_false_val(e),
                b"strike" => current.strikethrough = !is_false_val(e),
                b"sz" => current.size = attr_value(e, b"val").and_then(|v| v.parse().ok()),
                b"color" => current.color = parse_color_attrs(&collect_attrs(e), unsupported),
                b"name" | b"rFont" => current.family = attr_value(e, b"val"),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"font" if depth == 2 => {
                    fonts.push(std::mem::take(&mut current));
                    depth = 1;
                }
                b"fonts" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fonts
}

fn parse_fills(xml: &str, unsupported: &mut Vec<String>) -> Vec<ParsedFill> {
    let mut fills = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 0 = outside, 1 = inside <fills>, 2 = inside <fill>
    let mut in_pattern_fill = false;
    let mut pattern_none = false;
    let mut current = ParsedFill::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"fills" if depth == 0 => depth = 1,
                b"fill" if depth == 1 => {
                    depth = 2;
                    current = ParsedFill::default();
                }
                b"patternFill" if depth == 2 => {
                    in_pattern_fill = true;
                    pattern_none = attr_value(e, b"patternType").map_or(true, |p| p == "none");
                }
                b"gradientFill" if depth == 2 => {
                    if !unsupported.iter().any(|s| s == "gradient fills") {
                        unsupported.push("gradient fills".to_string());
                    }
                }
                b"fgColor" if in_pattern_fill && !pattern_none => {
                    current.bg_color = parse_color_attrs(&collect_attrs(e), unsupported);
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"fgColor" && in_pattern_fill && !pattern_none {
                    current.bg_color = parse_color_attrs(&collect_attrs(e), unsupported);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"patternFill" => in_pattern_fill = false,
                b"fill" if depth == 2 => {
                    fills.push(std::mem::take(&mut current));
                    depth = 1;
                    in_pattern_fill = false;
                }
                b"fills" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fills
}

fn parse_borders(xml: &str, unsupported: &mut Vec<String>) -> Vec<ParsedBorder> {
    let mut borders = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 0 = outside, 1 = inside <borders>, 2 = inside <border>
    let mut current_side: Option<Vec<u8>> = None;
    let mut current = ParsedBorder::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"borders" if depth == 0 => depth = 1,
                b"border" if depth == 1 => {
                    depth = 2;
                    current = ParsedBorder::default();
                }
                side @ (b"left" | b"right" | b"top" | b"bottom") if depth == 2 => {
                    let line = attr_value(e, b"style")
                        .map(|s| parse_border_line(&s))
                        .unwrap_or_default();
                    if let Some(edge) = current.side_mut(side) {
                        edge.line = line;
                    }
                    current_side = Some(side.to_vec());
                }
                b"color" => {
                    if let Some(side) = &current_side {
                        let color = parse_color_attrs(&collect_attrs(e), unsupported);
                        if let Some(edge) = current.side_mut(side) {
                            edge.color = color;
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                side @ (b"left" | b"right" | b"top" | b"bottom") if depth == 2 => {
                    let line = attr_value(e, b"style")
                        .map(|s| parse_border_line(&s))
                        .unwrap_or_default();
                    if let Some(edge) = current.side_mut(side) {
                        edge.line = line;
                    }
                }
                b"color" => {
                    if let Some(side) = &current_side {
                        let color = parse_color_attrs(&collect_attrs(e), unsupported);
                        if let Some(edge) = current.side_mut(side) {
                            edge.color = color;
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"left" | b"right" | b"top" | b"bottom" if depth == 2 => current_side = None,
                b"border" if depth == 2 => {
                    borders.push(std::mem::take(&mut current));
                    depth = 1;
                }
                b"borders" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    borders
}

fn parse_border_line(s: &str) -> BorderLine {
    match s {
        "thin" | "hair" => BorderLine::Thin,
        "medium" => BorderLine::Medium,
        "thick" => BorderLine::Thick,
        "dashed" | "mediumDashed" | "dashDot" | "mediumDashDot" | "dashDotDot"
        | "mediumDashDotDot" | "slantDashDot" => BorderLine::Dashed,
        "dotted" => BorderLine::Dotted,
        "double" => BorderLine::Double,
        _ => BorderLine::None,
    }
}

/// Parse `<cellXfs>` and resolve each `<xf>` into a CellStyle.
fn parse_cell_xfs(
    xml: &str,
    custom_num_fmts: &HashMap<u16, String>,
    fonts: &[ParsedFont],
    fills: &[ParsedFill],
    borders: &[ParsedBorder],
) -> Vec<CellStyle> {
    let mut styles = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_cell_xfs = false;
    let mut in_xf = false;
    let mut current = XfEntry::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => {
                    in_xf = true;
                    current = read_xf_attrs(e);
                }
                b"alignment" if in_xf => read_alignment(e, &mut current),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                // Self-closing <xf .../> is complete on its own
                b"xf" if in_cell_xfs => {
                    let xf = read_xf_attrs(e);
                    styles.push(resolve_xf(&xf, custom_num_fmts, fonts, fills, borders));
                }
                b"alignment" if in_xf => read_alignment(e, &mut current),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"xf" if in_xf => {
                    styles.push(resolve_xf(&current, custom_num_fmts, fonts, fills, borders));
                    in_xf = false;
                }
                b"cellXfs" => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    styles
}

fn read_xf_attrs(e: &BytesStart) -> XfEntry {
    let mut xf = XfEntry::default();
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"numFmtId" => xf.num_fmt_id = parse_attr(&attr.value),
            b"fontId" => xf.font_id = parse_attr(&attr.value),
            b"fillId" => xf.fill_id = parse_attr(&attr.value),
            b"borderId" => xf.border_id = parse_attr(&attr.value),
            _ => {}
        }
    }
    xf
}

fn read_alignment(e: &BytesStart, xf: &mut XfEntry) {
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"horizontal" => xf.h_align = Some(String::from_utf8_lossy(&attr.value).to_string()),
            b"vertical" => xf.v_align = Some(String::from_utf8_lossy(&attr.value).to_string()),
            b"wrapText" => xf.wrap_text = is_true(&attr.value),
            _ => {}
        }
    }
}

fn resolve_xf(
    xf: &XfEntry,
    custom_num_fmts: &HashMap<u16, String>,
    fonts: &[ParsedFont],
    fills: &[ParsedFill],
    borders: &[ParsedBorder],
) -> CellStyle {
    let mut style = CellStyle::default();

    if let Some(font) = xf.font_id.and_then(|id| fonts.get(id)) {
        style.bold = font.bold;
        style.italic = font.italic;
        style.underline = font.underline;
        style.strikethrough = font.strikethrough;
        style.font_size = font.size;
        style.font_color = font.color;
        style.font_family = font.family.clone();
    }

    if let Some(fill) = xf.fill_id.and_then(|id| fills.get(id)) {
        style.background_color = fill.bg_color;
    }

    if let Some(border) = xf.border_id.and_then(|id| borders.get(id)) {
        style.border_top = border.top;
        style.border_right = border.right;
        style.border_bottom = border.bottom;
        style.border_left = border.left;
    }

    style.num_format = match xf.num_fmt_id {
        None | Some(0) => NumFormat::General,
        Some(id) => match custom_num_fmts.get(&id) {
            Some(code) => NumFormat::Custom(code.clone()),
            None => u8::try_from(id).map(NumFormat::Builtin).unwrap_or_default(),
        },
    };

    style.horizontal = match xf.h_align.as_deref() {
        Some("left") => HorizontalAlign::Left,
        Some("center") => HorizontalAlign::Center,
        Some("right") => HorizontalAlign::Right,
        Some("justify") => HorizontalAlign::Justify,
        Some("centerContinuous") => HorizontalAlign::CenterAcross,
        _ => HorizontalAlign::General,
    };

    style.vertical = match xf.v_align.as_deref() {
        Some("top") => VerticalAlign::Top,
        Some("center") => VerticalAlign::Center,
        _ => VerticalAlign::Bottom,
    };

    style.wrap = xf.wrap_text;
    style
}

// =============================================================================
// Worksheet XML parser: per-cell style IDs + layout
// =============================================================================

pub fn parse_sheet_formatting(xml: &str) -> SheetFormatting {
    let mut formatting = SheetFormatting::default();

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"row" => {
                    let row = attr_value(e, b"r")
                        .and_then(|s| s.parse::<usize>().ok())
                        .map(|r| r.saturating_sub(1)); // 1-based → 0-based
                    let height = attr_value(e, b"ht").and_then(|s| s.parse::<f64>().ok());
                    let custom = attr_value(e, b"customHeight").is_some_and(|v| is_true(v.as_bytes()));
                    if let (true, Some(row), Some(height)) = (custom, row, height) {
                        formatting.row_heights.insert(row, height);
                    }
                }
                b"c" => {
                    let style_id = attr_value(e, b"s").and_then(|s| s.parse::<usize>().ok());
                    let cell = attr_value(e, b"r").and_then(|r| parse_cell_ref(&r));
                    if let (Some(style_id), Some(cell)) = (style_id, cell) {
                        if style_id > 0 {
                            formatting.cell_styles.insert(cell, style_id);
                        }
                    }
                }
                b"col" => {
                    let min = attr_value(e, b"min").and_then(|s| s.parse::<usize>().ok());
                    let max = attr_value(e, b"max").and_then(|s| s.parse::<usize>().ok());
                    let width = attr_value(e, b"width").and_then(|s| s.parse::<f64>().ok());
                    let custom = attr_value(e, b"customWidth").is_some_and(|v| is_true(v.as_bytes()));
                    if let (true, Some(min), Some(max), Some(width)) = (custom, min, max, width) {
                        // Whole-sheet <col min="1" max="16384"> ranges are capped
                        for col in min.saturating_sub(1)..max.min(256) {
                            formatting.col_widths.insert(col, width);
                        }
                    }
                }
                b"mergeCell" => {
                    if let Some(region) = attr_value(e, b"ref").and_then(|r| parse_merge_ref(&r)) {
                        formatting.merged_regions.push(region);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    formatting
}

/// Parse a merge range reference like "A1:C3" into (start_row, start_col, end_row, end_col).
pub fn parse_merge_ref(r: &str) -> Option<(usize, usize, usize, usize)> {
    let (start, end) = r.split_once(':')?;
    let (sr, sc) = parse_cell_ref(start)?;
    let (er, ec) = parse_cell_ref(end)?;
    Some((sr, sc, er, ec))
}

/// Parse a cell reference like "B5" into (row, col) = (4, 1).
pub fn parse_cell_ref(r: &str) -> Option<(usize, usize)> {
    let r = r.trim().replace('$', "");
    let split = r.find(|c: char| c.is_ascii_digit())?;
    let (col_part, row_part) = r.split_at(split);
    if col_part.is_empty() || !col_part.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let col = col_part.chars().fold(0usize, |acc, ch| {
        acc * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1)
    });
    let row: usize = row_part.parse().ok()?;
    if row == 0 {
        return None;
    }

    Some((row - 1, col - 1))
}

// =============================================================================
// Top-level entry point
// =============================================================================

/// Parse styles and per-sheet formatting from XLSX bytes.
/// `sheet_names` must match the workbook's sheet order; missing parts yield
/// empty formatting rather than an error.
pub fn parse_template_formatting(
    bytes: &[u8],
    sheet_names: &[String],
) -> Result<TemplateFormatting, String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| format!("Failed to read XLSX as ZIP for styles: {}", e))?;

    let (styles, unsupported) = match read_zip_file(&mut archive, "xl/styles.xml") {
        Ok(xml) => parse_styles_xml(&xml),
        Err(_) => (StyleTable::default(), Vec::new()),
    };

    let workbook_xml = read_zip_file(&mut archive, "xl/workbook.xml").unwrap_or_default();
    let rels_xml = read_zip_file(&mut archive, "xl/_rels/workbook.xml.rels").unwrap_or_default();
    let worksheet_paths = resolve_worksheet_paths_for_sheets(&workbook_xml, &rels_xml, sheet_names);

    let sheets = worksheet_paths
        .iter()
        .map(|path| {
            read_zip_file(&mut archive, path)
                .map(|xml| parse_sheet_formatting(&xml))
                .unwrap_or_default()
        })
        .collect();

    Ok(TemplateFormatting {
        styles,
        sheets,
        unsupported,
    })
}

// =============================================================================
// Helpers
// =============================================================================

fn collect_attrs(e: &BytesStart) -> Vec<(Vec<u8>, Vec<u8>)> {
    e.attributes()
        .flatten()
        .map(|a| (a.key.as_ref().to_vec(), a.value.to_vec()))
        .collect()
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

fn parse_attr<T: std::str::FromStr>(value: &[u8]) -> Option<T> {
    std::str::from_utf8(value).ok()?.parse().ok()
}

fn is_true(value: &[u8]) -> bool {
    value == b"1" || value == b"true"
}

/// `<b val="0"/>` switches bold off.
fn is_false_val(e: &BytesStart) -> bool {
    attr_value(e, b"val").is_some_and(|v| v == "0" || v == "false")
}

fn read_zip_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String, String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| format!("File '{}' not found in XLSX: {}", path, e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    Ok(content)
}

/// Worksheet part paths for `sheet_names`, in order. Unknown names map to "".
fn resolve_worksheet_paths_for_sheets(
    workbook_xml: &str,
    rels_xml: &str,
    sheet_names: &[String],
) -> Vec<String> {
    let mut name_to_rid: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"sheet" => {
                if let (Some(name), Some(rid)) = (attr_value(e, b"name"), attr_value(e, b"r:id")) {
                    name_to_rid.insert(unescape_xml(&name), rid);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    let mut rid_to_target: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr_value(e, b"Id"), attr_value(e, b"Target")) {
                    rid_to_target.insert(id, target);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    sheet_names
        .iter()
        .map(|name| {
            name_to_rid
                .get(name)
                .and_then(|rid| rid_to_target.get(rid))
                .map(|target| match target.strip_prefix('/') {
                    Some(absolute) => absolute.to_string(),
                    None => format!("xl/{}", target),
                })
                .unwrap_or_default()
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
