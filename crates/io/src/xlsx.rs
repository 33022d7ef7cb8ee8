// Excel export of rendered test case tables (xlsx only)
//
// Fresh build: one sheet per group, fixed header, merged ReqID/Description/
//              Pre-Condition columns per test case.
// Template fill: data rows are grafted into a designated sheet of an existing
//                workbook, cloning the style of the row above the insertion
//                point. Template cells are carried as values; formulas are
//                flattened to their cached results.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::time::Instant;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use casegrid_engine::table::{
    CellValue, RenderedGroup, RenderedTable, COLUMN_COUNT, COL_INDEX, HEADER, MERGED_COLUMNS,
};
use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, FormatUnderline, Workbook as XlsxWorkbook, Worksheet,
};

use crate::template::TemplateSource;
use crate::xlsx_styles::{
    self, BorderLine, CellStyle, Edge, HorizontalAlign, NumFormat, SheetFormatting, StyleTable,
    VerticalAlign,
};

/// Column widths in Excel character units: `#` narrow, Description and
/// Expected Result widest.
pub const COLUMN_WIDTHS: [f64; COLUMN_COUNT] = [6.0, 14.0, 45.0, 35.0, 40.0, 45.0];

const HEADER_FILL: u32 = 0xD9E1F2;
const MERGE_TOP_FILL: u32 = 0xF2F2F2;

/// Excel's sheet name limit.
const MAX_SHEET_NAME_LEN: usize = 31;

// Worksheet limits of the xlsx format
const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportMode {
    #[default]
    Fresh,
    Template,
}

impl std::fmt::Display for ExportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportMode::Fresh => write!(f, "fresh"),
            ExportMode::Template => write!(f, "template"),
        }
    }
}

/// Result of an Excel export operation
#[derive(Debug, Default)]
pub struct XlsxExportResult {
    /// Which builder produced the workbook
    pub mode: ExportMode,
    /// Template origin when `mode` is `Template`
    pub template: Option<String>,
    /// Number of sheets in the output workbook
    pub sheets_exported: usize,
    /// Data rows written (header rows excluded)
    pub rows_exported: usize,
    /// Multi-row merge regions written for test cases
    pub merges_exported: usize,
    /// Template merges dropped because they straddled the insertion row
    pub merges_dropped: usize,
    /// Export duration in milliseconds
    pub export_duration_ms: u128,
    /// Warnings generated during export
    pub warnings: Vec<String>,
}

impl XlsxExportResult {
    /// Returns a summary message suitable for display
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} export", self.mode),
            format!(
                "{} sheet{}",
                self.sheets_exported,
                if self.sheets_exported == 1 { "" } else { "s" }
            ),
            format!("{} rows", self.rows_exported),
        ];
        if self.merges_exported > 0 {
            parts.push(format!("{} merges", self.merges_exported));
        }
        if self.merges_dropped > 0 {
            parts.push(format!("{} template merges dropped", self.merges_dropped));
        }
        parts.join(", ")
    }

    /// Returns true if there are warnings
    pub fn has_warnings(&self) -> bool {
        self.merges_dropped > 0 || !self.warnings.is_empty()
    }
}

/// Export rendered groups to xlsx bytes.
///
/// With a template, tries template fill first; any template failure is
/// logged and recorded as a warning, and a fresh workbook is built instead.
pub fn export(
    groups: &[RenderedGroup],
    template: Option<&TemplateSource>,
) -> Result<(Vec<u8>, XlsxExportResult), String> {
    let start_time = Instant::now();
    let mut fallback_warnings = Vec::new();

    if let Some(source) = template {
        match fill_template(groups, source) {
            Ok((bytes, mut result)) => {
                result.export_duration_ms = start_time.elapsed().as_millis();
                log::info!("xlsx export: {}", result.summary());
                return Ok((bytes, result));
            }
            Err(e) => {
                log::warn!(
                    "template {} could not be filled, building a fresh workbook: {}",
                    source.label,
                    e
                );
                fallback_warnings.push(format!("Template not used: {}", e));
            }
        }
    }

    let (bytes, mut result) = build_fresh(groups)?;
    result.warnings.extend(fallback_warnings);
    result.export_duration_ms = start_time.elapsed().as_millis();
    log::info!("xlsx export: {}", result.summary());
    Ok((bytes, result))
}

// ============================================================================
// Fresh build
// ============================================================================

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin)
        .set_text_wrap()
}

fn merge_top_format() -> Format {
    Format::new()
        .set_bold()
        .set_background_color(Color::RGB(MERGE_TOP_FILL))
        .set_border(FormatBorder::Thin)
        .set_text_wrap()
        .set_align(FormatAlign::VerticalCenter)
}

fn data_format(col: usize) -> Format {
    let format = Format::new()
        .set_border(FormatBorder::Thin)
        .set_text_wrap()
        .set_align(FormatAlign::VerticalCenter);
    if col == COL_INDEX {
        format.set_align(FormatAlign::Center)
    } else {
        format
    }
}

fn build_fresh(groups: &[RenderedGroup]) -> Result<(Vec<u8>, XlsxExportResult), String> {
    let mut result = XlsxExportResult::default();
    let mut workbook = XlsxWorkbook::new();

    let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
    let names = sheet_names(&labels);

    // A workbook needs at least one sheet, even with nothing to export.
    let empty = RenderedTable::default();
    let sheets: Vec<(&str, &RenderedTable)> = if groups.is_empty() {
        vec![("Test Cases", &empty)]
    } else {
        names
            .iter()
            .map(String::as_str)
            .zip(groups.iter().map(|g| &g.table))
            .collect()
    };

    for (name, table) in sheets {
        let worksheet = workbook
            .add_worksheet()
            .set_name(name)
            .map_err(|e| format!("Failed to create sheet '{}': {}", name, e))?;

        let header = header_format();
        for (col, title) in HEADER.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, *title, &header)
                .map_err(|e| cell_error(0, col, e))?;
        }

        let merge_top = merge_top_format();
        let data_formats: Vec<Format> = (0..COLUMN_COUNT).map(data_format).collect();
        let index = table.merge_index();
        let merges = write_table(worksheet, table, 1, |r, col| {
            if MERGED_COLUMNS.contains(&col) && index.is_top(r) {
                merge_top.clone()
            } else {
                data_formats[col].clone()
            }
        })?;

        for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
            worksheet
                .set_column_width(col as u16, *width)
                .map_err(|e| format!("Failed to set column {} width: {}", col, e))?;
        }
        worksheet
            .set_freeze_panes(1, 0)
            .map_err(|e| format!("Failed to set freeze panes: {}", e))?;

        result.sheets_exported += 1;
        result.rows_exported += table.rows.len();
        result.merges_exported += merges;
    }

    let bytes = workbook
        .save_to_buffer()
        .map_err(|e| format!("Failed to save XLSX workbook: {}", e))?;
    Ok((bytes, result))
}

/// Write a table's data rows starting at `first_row`, then its multi-row
/// merges. Returns the number of merges written.
///
/// Merged ranges are written first with a blank, then the origin cell is
/// overwritten with its value; cells hidden by a merge are never written.
fn write_table(
    worksheet: &mut Worksheet,
    table: &RenderedTable,
    first_row: usize,
    format_for: impl Fn(usize, usize) -> Format,
) -> Result<usize, String> {
    let mut merges = 0;
    for region in &table.merges {
        if region.is_single_row() || !MERGED_COLUMNS.contains(&region.column) {
            continue;
        }
        worksheet
            .merge_range(
                (first_row + region.start_row) as u32,
                region.column as u16,
                (first_row + region.end_row) as u32,
                region.column as u16,
                "",
                &format_for(region.start_row, region.column),
            )
            .map_err(|e| format!("Failed to write merge: {}", e))?;
        merges += 1;
    }

    let index = table.merge_index();
    for (r, row) in table.rows.iter().enumerate() {
        let sheet_row = first_row + r;
        for (col, value) in row.iter().enumerate() {
            if index.is_continuation(r, col) {
                continue;
            }
            write_cell(worksheet, sheet_row, col, value, &format_for(r, col))?;
        }
    }

    Ok(merges)
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: usize,
    col: usize,
    value: &CellValue,
    format: &Format,
) -> Result<(), String> {
    let (row32, col16) = (row as u32, col as u16);
    match value {
        CellValue::Empty => worksheet.write_blank(row32, col16, format).map(|_| ()),
        CellValue::Text(s) if s.is_empty() => worksheet.write_blank(row32, col16, format).map(|_| ()),
        CellValue::Text(s) => worksheet
            .write_string_with_format(row32, col16, s, format)
            .map(|_| ()),
        CellValue::Number(n) => worksheet
            .write_number_with_format(row32, col16, *n, format)
            .map(|_| ()),
    }
    .map_err(|e| cell_error(row, col, e))
}

fn cell_error(row: usize, col: usize, e: impl std::fmt::Display) -> String {
    format!("Failed to write cell ({}, {}): {}", row, col, e)
}

/// Turn group labels into unique, valid sheet names.
///
/// Forbidden characters become `_`, names are cut to 31 characters, and
/// duplicates (case-insensitive, like Excel) get a ` (n)` suffix.
pub fn sheet_names(labels: &[&str]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(labels.len());

    for (i, label) in labels.iter().enumerate() {
        let cleaned: String = label
            .chars()
            .map(|c| match c {
                '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
                c if c.is_control() => ' ',
                c => c,
            })
            .collect();
        let cleaned = cleaned.trim().trim_matches('\'').trim();
        let base: String = if cleaned.is_empty() {
            format!("Sheet{}", i + 1)
        } else {
            cleaned.chars().take(MAX_SHEET_NAME_LEN).collect()
        };

        let mut name = base.clone();
        let mut n = 2;
        while seen.contains(&name.to_lowercase()) {
            let suffix = format!(" ({})", n);
            let keep = MAX_SHEET_NAME_LEN - suffix.chars().count();
            name = format!("{}{}", base.chars().take(keep).collect::<String>().trim_end(), suffix);
            n += 1;
        }
        seen.insert(name.to_lowercase());
        names.push(name);
    }

    names
}

// ============================================================================
// Template fill
// ============================================================================

/// One template sheet: cell values plus parsed formatting.
struct TemplateSheet {
    name: String,
    cells: HashMap<(usize, usize), Data>,
    formatting: SheetFormatting,
}

/// A template workbook read into memory.
struct TemplateWorkbook {
    sheets: Vec<TemplateSheet>,
    styles: StyleTable,
}

impl TemplateWorkbook {
    fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| format!("Failed to open template: {}", e))?;

        let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
        if sheet_names.is_empty() {
            return Err("Template contains no sheets".to_string());
        }

        let formatting = xlsx_styles::parse_template_formatting(bytes, &sheet_names)?;
        for feature in &formatting.unsupported {
            log::debug!("template style approximation: {}", feature);
        }

        let mut sheets = Vec::with_capacity(sheet_names.len());
        for (idx, name) in sheet_names.iter().enumerate() {
            let range = workbook
                .worksheet_range(name)
                .map_err(|e| format!("Failed to read template sheet '{}': {}", name, e))?;
            let (row0, col0) = range.start().unwrap_or((0, 0));
            let cells = range
                .used_cells()
                .map(|(r, c, value)| ((r + row0 as usize, c + col0 as usize), value.clone()))
                .collect();

            sheets.push(TemplateSheet {
                name: name.clone(),
                cells,
                formatting: formatting.sheets.get(idx).cloned().unwrap_or_default(),
            });
        }

        Ok(Self {
            sheets,
            styles: formatting.styles,
        })
    }

    /// Index of the sheet named `name`, else the first sheet.
    fn designated_sheet(&self, name: Option<&str>) -> usize {
        match name {
            Some(name) => self
                .sheets
                .iter()
                .position(|s| s.name == name)
                .unwrap_or_else(|| {
                    log::debug!("template has no sheet '{}', filling the first sheet", name);
                    0
                }),
            None => 0,
        }
    }

    /// Owned copy of a template cell's style, or the default style.
    fn style_at(&self, sheet: &TemplateSheet, row: usize, col: usize) -> CellStyle {
        sheet
            .formatting
            .style_id(row, col)
            .and_then(|id| self.styles.get(id))
            .cloned()
            .unwrap_or_default()
    }
}

fn fill_template(
    groups: &[RenderedGroup],
    source: &TemplateSource,
) -> Result<(Vec<u8>, XlsxExportResult), String> {
    let template = TemplateWorkbook::from_bytes(&source.bytes)?;
    let target = template.designated_sheet(source.sheet_name.as_deref());
    let start_row = source.start_row as usize;
    let inserted: usize = groups.iter().map(|g| g.table.rows.len()).sum();

    if start_row + inserted >= MAX_ROWS {
        return Err(format!("{} rows do not fit below template row {}", inserted, start_row));
    }

    let mut result = XlsxExportResult {
        mode: ExportMode::Template,
        template: Some(source.label.clone()),
        ..Default::default()
    };
    let mut workbook = XlsxWorkbook::new();

    for (idx, sheet) in template.sheets.iter().enumerate() {
        let worksheet = workbook
            .add_worksheet()
            .set_name(&sheet.name)
            .map_err(|e| format!("Failed to create sheet '{}': {}", sheet.name, e))?;

        if idx != target {
            copy_template_sheet(worksheet, &template, sheet, None)?;
            result.sheets_exported += 1;
            continue;
        }

        let shift = RowShift {
            at: start_row,
            by: inserted,
        };
        result.merges_dropped += copy_template_sheet(worksheet, &template, sheet, Some(shift))?;

        // Styles are cloned by value from the row above the insertion point.
        let column_styles: Vec<Format> = (0..COLUMN_COUNT)
            .map(|col| {
                let style = match start_row.checked_sub(1) {
                    Some(above) => template.style_at(sheet, above, col),
                    None => CellStyle::default(),
                };
                build_format(&style.wrapped_centered())
            })
            .collect();

        let mut offset = start_row;
        for group in groups {
            result.merges_exported +=
                write_table(worksheet, &group.table, offset, |_, col| column_styles[col].clone())?;
            offset += group.table.rows.len();
        }

        result.rows_exported += inserted;
        result.sheets_exported += 1;
    }

    if result.merges_dropped > 0 {
        result.warnings.push(format!(
            "{} template merge{} crossing row {} dropped",
            result.merges_dropped,
            if result.merges_dropped == 1 { "" } else { "s" },
            start_row + 1
        ));
    }

    let bytes = workbook
        .save_to_buffer()
        .map_err(|e| format!("Failed to save XLSX workbook: {}", e))?;
    Ok((bytes, result))
}

/// Rows at or below `at` move down by `by`.
#[derive(Debug, Clone, Copy)]
struct RowShift {
    at: usize,
    by: usize,
}

impl RowShift {
    fn apply(&self, row: usize) -> usize {
        if row >= self.at {
            row + self.by
        } else {
            row
        }
    }
}

/// Re-create a template sheet: merges, values, styled blanks, column widths
/// and row heights. Returns the number of merges dropped by the shift.
fn copy_template_sheet(
    worksheet: &mut Worksheet,
    template: &TemplateWorkbook,
    sheet: &TemplateSheet,
    shift: Option<RowShift>,
) -> Result<usize, String> {
    let shift = shift.unwrap_or(RowShift { at: usize::MAX, by: 0 });
    let mut dropped = 0;
    let mut hidden: HashSet<(usize, usize)> = HashSet::new();

    for &(sr, sc, er, ec) in &sheet.formatting.merged_regions {
        if sr < shift.at && er >= shift.at {
            log::warn!(
                "dropping template merge rows {}-{} of '{}': it crosses the insertion row",
                sr + 1,
                er + 1,
                sheet.name
            );
            dropped += 1;
            continue;
        }
        if (sr, sc) == (er, ec) || er >= MAX_ROWS || ec >= MAX_COLS {
            continue;
        }
        let format = build_format(&template.style_at(sheet, sr, sc));
        worksheet
            .merge_range(
                shift.apply(sr) as u32,
                sc as u16,
                shift.apply(er) as u32,
                ec as u16,
                "",
                &format,
            )
            .map_err(|e| format!("Failed to write template merge: {}", e))?;
        for r in sr..=er {
            for c in sc..=ec {
                if (r, c) != (sr, sc) {
                    hidden.insert((r, c));
                }
            }
        }
    }

    let mut positions: Vec<(usize, usize)> = sheet
        .cells
        .keys()
        .chain(sheet.formatting.cell_styles.keys())
        .copied()
        .filter(|pos| !hidden.contains(pos))
        .collect();
    positions.sort_unstable();
    positions.dedup();

    for (row, col) in positions {
        let out_row = shift.apply(row);
        if out_row >= MAX_ROWS || col >= MAX_COLS {
            continue;
        }
        let format = build_format(&template.style_at(sheet, row, col));
        write_template_value(worksheet, out_row, col, sheet.cells.get(&(row, col)), &format)?;
    }

    for (&col, &width) in &sheet.formatting.col_widths {
        worksheet
            .set_column_width(col as u16, character_width(width))
            .map_err(|e| format!("Failed to set column {} width: {}", col, e))?;
    }
    for (&row, &height) in &sheet.formatting.row_heights {
        let out_row = shift.apply(row);
        if out_row < MAX_ROWS {
            worksheet
                .set_row_height(out_row as u32, height)
                .map_err(|e| format!("Failed to set row {} height: {}", row, e))?;
        }
    }

    Ok(dropped)
}

/// Stored `<col width>` values include cell padding; the writer adds it back.
fn character_width(stored: f64) -> f64 {
    let width = if stored > 1.0 { stored - 5.0 / 7.0 } else { stored };
    (width.max(0.0) * 100.0).round() / 100.0
}

fn write_template_value(
    worksheet: &mut Worksheet,
    row: usize,
    col: usize,
    value: Option<&Data>,
    format: &Format,
) -> Result<(), String> {
    let (row32, col16) = (row as u32, col as u16);
    match value {
        None | Some(Data::Empty) => worksheet.write_blank(row32, col16, format).map(|_| ()),
        Some(Data::String(s)) | Some(Data::DateTimeIso(s)) | Some(Data::DurationIso(s)) => worksheet
            .write_string_with_format(row32, col16, s, format)
            .map(|_| ()),
        Some(Data::Float(f)) => worksheet
            .write_number_with_format(row32, col16, *f, format)
            .map(|_| ()),
        Some(Data::Int(i)) => worksheet
            .write_number_with_format(row32, col16, *i as f64, format)
            .map(|_| ()),
        Some(Data::Bool(b)) => worksheet
            .write_boolean_with_format(row32, col16, *b, format)
            .map(|_| ()),
        Some(Data::DateTime(dt)) => worksheet
            .write_number_with_format(row32, col16, dt.as_f64(), format)
            .map(|_| ()),
        Some(Data::Error(e)) => worksheet
            .write_string_with_format(row32, col16, e.to_string(), format)
            .map(|_| ()),
    }
    .map_err(|e| cell_error(row, col, e))
}

// ============================================================================
// Style conversion
// ============================================================================

fn rgb(color: [u8; 4]) -> Color {
    let [r, g, b, _] = color;
    Color::RGB(((r as u32) << 16) | ((g as u32) << 8) | (b as u32))
}

/// Build an Excel Format from a parsed template CellStyle
fn build_format(style: &CellStyle) -> Format {
    let mut format = Format::new();

    if style.bold {
        format = format.set_bold();
    }
    if style.italic {
        format = format.set_italic();
    }
    if style.underline {
        format = format.set_underline(FormatUnderline::Single);
    }
    if style.strikethrough {
        format = format.set_font_strikethrough();
    }
    if let Some(size) = style.font_size {
        format = format.set_font_size(size);
    }
    if let Some(color) = style.font_color {
        format = format.set_font_color(rgb(color));
    }
    if let Some(ref family) = style.font_family {
        format = format.set_font_name(family);
    }
    if let Some(color) = style.background_color {
        format = format.set_background_color(rgb(color));
    }

    format = match style.horizontal {
        HorizontalAlign::General => format,
        HorizontalAlign::Left => format.set_align(FormatAlign::Left),
        HorizontalAlign::Center => format.set_align(FormatAlign::Center),
        HorizontalAlign::Right => format.set_align(FormatAlign::Right),
        HorizontalAlign::Justify => format.set_align(FormatAlign::Justify),
        HorizontalAlign::CenterAcross => format.set_align(FormatAlign::CenterAcross),
    };
    format = match style.vertical {
        VerticalAlign::Bottom => format,
        VerticalAlign::Top => format.set_align(FormatAlign::Top),
        VerticalAlign::Center => format.set_align(FormatAlign::VerticalCenter),
    };
    if style.wrap {
        format = format.set_text_wrap();
    }

    format = apply_edge(format, &style.border_top, Format::set_border_top, |f, c| {
        f.set_border_top_color(c)
    });
    format = apply_edge(format, &style.border_right, Format::set_border_right, |f, c| {
        f.set_border_right_color(c)
    });
    format = apply_edge(format, &style.border_bottom, Format::set_border_bottom, |f, c| {
        f.set_border_bottom_color(c)
    });
    format = apply_edge(format, &style.border_left, Format::set_border_left, |f, c| {
        f.set_border_left_color(c)
    });

    match &style.num_format {
        NumFormat::General => format,
        NumFormat::Builtin(id) => format.set_num_format_index(*id),
        NumFormat::Custom(code) => format.set_num_format(code),
    }
}

fn apply_edge(
    format: Format,
    edge: &Edge,
    set_line: fn(Format, FormatBorder) -> Format,
    set_color: fn(Format, Color) -> Format,
) -> Format {
    if edge.line == BorderLine::None {
        return format;
    }
    let format = set_line(format, border_line_to_xlsx(edge.line));
    match edge.color {
        Some(color) => set_color(format, rgb(color)),
        None => format,
    }
}

fn border_line_to_xlsx(line: BorderLine) -> FormatBorder {
    match line {
        BorderLine::None => FormatBorder::None,
        BorderLine::Thin => FormatBorder::Thin,
        BorderLine::Medium => FormatBorder::Medium,
        BorderLine::Thick => FormatBorder::Thick,
        BorderLine::Dashed => FormatBorder::Dashed,
        BorderLine::Dotted => FormatBorder::Dotted,
        BorderLine::Double => FormatBorder::Double,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{StaticTemplate, TemplateProvider};
    use casegrid_engine::table::{MergeRegion, Row};
    use std::io::Read;

    fn row(index: f64, cells: [&str; 5]) -> Row {
        let [a, b, c, d, e] = cells.map(|s| {
            if s.is_empty() {
                CellValue::Empty
            } else {
                CellValue::text(s)
            }
        });
        [CellValue::Number(index), a, b, c, d, e]
    }

    /// One two-step case followed by one single-step case.
    fn sample_table() -> RenderedTable {
        let mut merges: Vec<MergeRegion> = MERGED_COLUMNS
            .iter()
            .map(|&column| MergeRegion { start_row: 0, end_row: 1, column })
            .collect();
        merges.extend(MERGED_COLUMNS.iter().map(|&column| MergeRegion {
            start_row: 2,
            end_row: 2,
            column,
        }));
        RenderedTable {
            rows: vec![
                row(1.0, ["TC-1", "Login", "Account exists", "Step 1: Open", "Form shown"]),
                row(2.0, ["", "", "", "Step 2: Submit", "Welcome"]),
                row(3.0, ["TC-2", "Logout", "", "Step 1: Click logout", "Signed out"]),
            ],
            merges,
        }
    }

    fn group(label: &str) -> RenderedGroup {
        RenderedGroup {
            label: label.to_string(),
            table: sample_table(),
        }
    }

    fn read_sheet(bytes: &[u8], name: &str) -> calamine::Range<Data> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).unwrap();
        workbook.worksheet_range(name).unwrap()
    }

    fn sheet_names_of(bytes: &[u8]) -> Vec<String> {
        let workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).unwrap();
        workbook.sheet_names().to_vec()
    }

    fn text_at(range: &calamine::Range<Data>, row: u32, col: u32) -> String {
        match range.get_value((row, col)) {
            Some(Data::String(s)) => s.clone(),
            Some(Data::Float(f)) => f.to_string(),
            Some(Data::Int(i)) => i.to_string(),
            _ => String::new(),
        }
    }

    fn sheet_xml(bytes: &[u8], part: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut xml = String::new();
        archive.by_name(part).unwrap().read_to_string(&mut xml).unwrap();
        xml
    }

    /// A template with a title row, a styled header row, a footer below the
    /// insertion point and a second sheet.
    fn template_bytes() -> Vec<u8> {
        let mut workbook = XlsxWorkbook::new();
        let title = Format::new().set_bold();
        let header = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(0x1F4E79))
            .set_border(FormatBorder::Medium);

        let sheet = workbook.add_worksheet().set_name("Cover").unwrap();
        sheet.write_string(0, 0, "Cover page").unwrap();

        let sheet = workbook.add_worksheet().set_name("Test Cases").unwrap();
        sheet.merge_range(0, 0, 0, 5, "Regression Plan", &title).unwrap();
        for (col, title) in HEADER.iter().enumerate() {
            sheet.write_string_with_format(1, col as u16, *title, &header).unwrap();
        }
        sheet.write_string(2, 0, "Footer").unwrap();
        sheet.write_number(3, 1, 42.0).unwrap();
        sheet.merge_range(4, 0, 4, 2, "Signed off", &Format::new()).unwrap();
        sheet.set_column_width(2, 50.0).unwrap();

        workbook.save_to_buffer().unwrap()
    }

    // ========================================================================
    // Report
    // ========================================================================

    #[test]
    fn test_character_width() {
        assert_eq!(character_width(50.7109375), 50.0);
        assert_eq!(character_width(0.5), 0.5);
    }

    #[test]
    fn test_export_result_summary() {
        let mut result = XlsxExportResult::default();
        result.sheets_exported = 1;
        result.rows_exported = 3;
        assert_eq!(result.summary(), "fresh export, 1 sheet, 3 rows");
        assert!(!result.has_warnings());

        result.mode = ExportMode::Template;
        result.sheets_exported = 2;
        result.merges_exported = 3;
        result.merges_dropped = 1;
        assert_eq!(
            result.summary(),
            "template export, 2 sheets, 3 rows, 3 merges, 1 template merges dropped"
        );
        assert!(result.has_warnings());
    }

    // ========================================================================
    // Sheet names
    // ========================================================================

    #[test]
    fn test_sheet_names_sanitized_and_unique() {
        let names = sheet_names(&[
            "UI/UX Tests",
            "Edge Case Tests",
            "edge case tests",
            "",
            "A very long group label that exceeds the limit",
        ]);
        assert_eq!(names[0], "UI_UX Tests");
        assert_eq!(names[1], "Edge Case Tests");
        assert_eq!(names[2], "edge case tests (2)");
        assert_eq!(names[3], "Sheet4");
        assert_eq!(names[4].chars().count(), 31);
    }

    #[test]
    fn test_sheet_names_dedupe_respects_limit() {
        let long = "x".repeat(40);
        let names = sheet_names(&[long.as_str(), long.as_str()]);
        assert_eq!(names[0].len(), 31);
        assert_eq!(names[1].len(), 31);
        assert!(names[1].ends_with(" (2)"));
    }

    // ========================================================================
    // Fresh build
    // ========================================================================

    #[test]
    fn test_fresh_export_layout() {
        let (bytes, result) = export(&[group("Functional Tests")], None).unwrap();
        assert_eq!(result.mode, ExportMode::Fresh);
        assert_eq!(result.sheets_exported, 1);
        assert_eq!(result.rows_exported, 3);
        // Single-row regions are not merged.
        assert_eq!(result.merges_exported, 3);

        let range = read_sheet(&bytes, "Functional Tests");
        assert_eq!(text_at(&range, 0, 0), "#");
        assert_eq!(text_at(&range, 0, 5), "Expected Result/Output");
        assert_eq!(text_at(&range, 1, 0), "1");
        assert_eq!(text_at(&range, 1, 1), "TC-1");
        assert_eq!(text_at(&range, 2, 0), "2");
        assert_eq!(text_at(&range, 2, 1), "");
        assert_eq!(text_at(&range, 2, 4), "Step 2: Submit");
        assert_eq!(text_at(&range, 3, 2), "Logout");

        let xml = sheet_xml(&bytes, "xl/worksheets/sheet1.xml");
        let sf = xlsx_styles::parse_sheet_formatting(&xml);
        let mut merges = sf.merged_regions.clone();
        merges.sort_unstable();
        assert_eq!(merges, vec![(1, 1, 2, 1), (1, 2, 2, 2), (1, 3, 2, 3)]);
        assert_eq!(sf.col_widths.len(), COLUMN_COUNT);
        assert!(xml.contains("<pane"));
    }

    #[test]
    fn test_fresh_export_styles() {
        let (bytes, _) = export(&[group("Functional Tests")], None).unwrap();
        let styles_xml = sheet_xml(&bytes, "xl/styles.xml");
        let (styles, _) = xlsx_styles::parse_styles_xml(&styles_xml);
        let sf = xlsx_styles::parse_sheet_formatting(&sheet_xml(&bytes, "xl/worksheets/sheet1.xml"));

        let header = styles.get(sf.style_id(0, 0).unwrap()).unwrap();
        assert!(header.bold);
        assert_eq!(header.background_color, Some([0xD9, 0xE1, 0xF2, 255]));
        assert_eq!(header.horizontal, HorizontalAlign::Center);

        // Top of a merge region, including a single-row one.
        for row in [1, 3] {
            let top = styles.get(sf.style_id(row, 1).unwrap()).unwrap();
            assert!(top.bold);
            assert_eq!(top.background_color, Some([0xF2, 0xF2, 0xF2, 255]));
            assert_eq!(top.border_left.line, BorderLine::Thin);
            assert!(top.wrap);
        }

        let step = styles.get(sf.style_id(2, 4).unwrap()).unwrap();
        assert!(!step.bold);
        assert!(step.wrap);
        assert_eq!(step.vertical, VerticalAlign::Center);
    }

    #[test]
    fn test_fresh_export_one_sheet_per_group() {
        let (bytes, result) = export(&[group("Visual Tests"), group("Security Tests")], None).unwrap();
        assert_eq!(result.sheets_exported, 2);
        assert_eq!(sheet_names_of(&bytes), vec!["Visual Tests", "Security Tests"]);

        // Numbering restarts on every sheet.
        let second = read_sheet(&bytes, "Security Tests");
        assert_eq!(text_at(&second, 1, 0), "1");
    }

    #[test]
    fn test_fresh_export_without_groups() {
        let (bytes, result) = export(&[], None).unwrap();
        assert_eq!(result.sheets_exported, 1);
        assert_eq!(text_at(&read_sheet(&bytes, "Test Cases"), 0, 1), "ReqID");
    }

    // ========================================================================
    // Template fill
    // ========================================================================

    fn template_source(sheet: Option<&str>, start_row: u32) -> TemplateSource {
        StaticTemplate::new(template_bytes(), sheet.map(String::from), start_row)
            .fetch()
            .unwrap()
    }

    #[test]
    fn test_template_fill_grafts_rows() {
        let source = template_source(Some("Test Cases"), 2);
        let (bytes, result) = export(&[group("Functional Tests")], Some(&source)).unwrap();

        assert_eq!(result.mode, ExportMode::Template);
        assert_eq!(result.sheets_exported, 2);
        assert_eq!(result.rows_exported, 3);
        assert_eq!(result.merges_exported, 3);
        assert_eq!(result.merges_dropped, 0);
        assert_eq!(sheet_names_of(&bytes), vec!["Cover", "Test Cases"]);

        let range = read_sheet(&bytes, "Test Cases");
        assert_eq!(text_at(&range, 0, 0), "Regression Plan");
        assert_eq!(text_at(&range, 1, 1), "ReqID");
        assert_eq!(text_at(&range, 2, 0), "1");
        assert_eq!(text_at(&range, 2, 1), "TC-1");
        assert_eq!(text_at(&range, 3, 4), "Step 2: Submit");
        assert_eq!(text_at(&range, 4, 2), "Logout");
        // Template rows at and below the insertion row moved down by three.
        assert_eq!(text_at(&range, 5, 0), "Footer");
        assert_eq!(text_at(&range, 6, 1), "42");
        assert_eq!(text_at(&range, 7, 0), "Signed off");

        let cover = read_sheet(&bytes, "Cover");
        assert_eq!(text_at(&cover, 0, 0), "Cover page");
    }

    #[test]
    fn test_template_fill_clones_style_from_row_above() {
        let source = template_source(Some("Test Cases"), 2);
        let (bytes, _) = export(&[group("Functional Tests")], Some(&source)).unwrap();

        let (styles, _) = xlsx_styles::parse_styles_xml(&sheet_xml(&bytes, "xl/styles.xml"));
        let sf = xlsx_styles::parse_sheet_formatting(&sheet_xml(&bytes, "xl/worksheets/sheet2.xml"));

        let written = styles.get(sf.style_id(3, 4).unwrap()).unwrap();
        assert!(written.bold);
        assert_eq!(written.background_color, Some([0x1F, 0x4E, 0x79, 255]));
        assert_eq!(written.border_top.line, BorderLine::Medium);
        assert!(written.wrap);
        assert_eq!(written.vertical, VerticalAlign::Center);

        // Template merges move with their rows; data merges sit at the offset.
        let mut merges = sf.merged_regions.clone();
        merges.sort_unstable();
        assert_eq!(
            merges,
            vec![(0, 0, 0, 5), (2, 1, 3, 1), (2, 2, 3, 2), (2, 3, 3, 3), (7, 0, 7, 2)]
        );
        assert_eq!(sf.col_widths.get(&2).map(|w| character_width(*w)), Some(50.0));
    }

    #[test]
    fn test_template_fill_stacks_groups() {
        let source = template_source(Some("Test Cases"), 2);
        let (bytes, result) =
            export(&[group("Visual Tests"), group("Security Tests")], Some(&source)).unwrap();
        assert_eq!(result.rows_exported, 6);

        let range = read_sheet(&bytes, "Test Cases");
        assert_eq!(text_at(&range, 2, 1), "TC-1");
        assert_eq!(text_at(&range, 5, 0), "1");
        assert_eq!(text_at(&range, 5, 1), "TC-1");
        assert_eq!(text_at(&range, 8, 0), "Footer");
    }

    #[test]
    fn test_template_fill_unknown_sheet_uses_first() {
        let source = template_source(Some("Nope"), 1);
        let (bytes, result) = export(&[group("Functional Tests")], Some(&source)).unwrap();
        assert_eq!(result.mode, ExportMode::Template);

        let cover = read_sheet(&bytes, "Cover");
        assert_eq!(text_at(&cover, 0, 0), "Cover page");
        assert_eq!(text_at(&cover, 1, 1), "TC-1");
    }

    #[test]
    fn test_template_fill_drops_crossing_merges() {
        // A1:A3 straddles an insertion at row 1.
        let mut workbook = XlsxWorkbook::new();
        let sheet = workbook.add_worksheet().set_name("Test Cases").unwrap();
        sheet.merge_range(0, 0, 2, 0, "Tall", &Format::new()).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let source = StaticTemplate::new(bytes, None, 1).fetch().unwrap();
        let (_, result) = export(&[group("Functional Tests")], Some(&source)).unwrap();
        assert_eq!(result.mode, ExportMode::Template);
        assert_eq!(result.merges_dropped, 1);
        assert!(result.has_warnings());
    }

    #[test]
    fn test_broken_template_falls_back_to_fresh() {
        let source = StaticTemplate::new(b"definitely not a workbook".to_vec(), None, 2)
            .fetch()
            .unwrap();
        let (bytes, result) = export(&[group("Functional Tests")], Some(&source)).unwrap();
        assert_eq!(result.mode, ExportMode::Fresh);
        assert!(result.has_warnings());
        assert!(result.warnings[0].starts_with("Template not used"));
        assert_eq!(sheet_names_of(&bytes), vec!["Functional Tests"]);
    }
}
