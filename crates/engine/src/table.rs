//! Layout of test cases into a six-column table with merge regions.
//!
//! A test case occupies one parent row followed by one child row per extra
//! visible step. Columns 1-3 (ReqID, Description, Pre-Condition) of the parent
//! and its children form one merge region each. Rows are data rows only; the
//! header is the fixed [`HEADER`] and region coordinates exclude it.

use crate::group::TestGroup;
use crate::model::TestCase;

pub const COLUMN_COUNT: usize = 6;

pub const COL_INDEX: usize = 0;
pub const COL_REQ_ID: usize = 1;
pub const COL_DESCRIPTION: usize = 2;
pub const COL_PRECONDITION: usize = 3;
pub const COL_PROCEDURE: usize = 4;
pub const COL_EXPECTED: usize = 5;

/// Columns that are merged across a test case's rows.
pub const MERGED_COLUMNS: [usize; 3] = [COL_REQ_ID, COL_DESCRIPTION, COL_PRECONDITION];

pub const HEADER: [&str; COLUMN_COUNT] = [
    "#",
    "ReqID",
    "Description",
    "Pre-Condition",
    "Step/Procedure",
    "Expected Result/Output",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// Text as it appears in a rendered cell. Whole numbers print without a fraction.
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
        }
    }
}

pub type Row = [CellValue; COLUMN_COUNT];

/// Token used for line breaks inside a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineBreak {
    /// `\n`, for spreadsheets.
    Newline,
    /// `<br>`, for pipe tables.
    Html,
}

impl LineBreak {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineBreak::Newline => "\n",
            LineBreak::Html => "<br>",
        }
    }

    /// Re-encode every internal line break (`\r\n`, `\r`, `\n`) as this token.
    pub fn encode(&self, text: &str) -> String {
        text.replace("\r\n", "\n")
            .replace('\r', "\n")
            .replace('\n', self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub line_break: LineBreak,
    pub include_steps: bool,
}

impl RenderOptions {
    pub fn markdown(include_steps: bool) -> Self {
        Self {
            line_break: LineBreak::Html,
            include_steps,
        }
    }

    pub fn spreadsheet(include_steps: bool) -> Self {
        Self {
            line_break: LineBreak::Newline,
            include_steps,
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::spreadsheet(true)
    }
}

/// A one-column vertical span, inclusive on both ends, in data-row coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeRegion {
    pub start_row: usize,
    pub end_row: usize,
    pub column: usize,
}

impl MergeRegion {
    pub fn row_span(&self) -> usize {
        self.end_row - self.start_row + 1
    }

    /// A single-row region is styled like a merge but never merged.
    pub fn is_single_row(&self) -> bool {
        self.start_row == self.end_row
    }

    pub fn contains(&self, row: usize, column: usize) -> bool {
        self.column == column && (self.start_row..=self.end_row).contains(&row)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedTable {
    pub rows: Vec<Row>,
    pub merges: Vec<MergeRegion>,
}

impl RenderedTable {
    /// Build the per-cell region lookup. Linear in the number of merged cells.
    pub fn merge_index(&self) -> MergeIndex {
        let mut starts = vec![[None; COLUMN_COUNT]; self.rows.len()];
        for region in &self.merges {
            if region.column >= COLUMN_COUNT {
                continue;
            }
            for cells in starts
                .iter_mut()
                .take(region.end_row + 1)
                .skip(region.start_row)
            {
                cells[region.column] = Some(region.start_row);
            }
        }
        MergeIndex { starts }
    }
}

/// For every cell, the first row of the merge region covering it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeIndex {
    starts: Vec<[Option<usize>; COLUMN_COUNT]>,
}

impl MergeIndex {
    /// Whether `(row, column)` lies inside a region but below its first row.
    pub fn is_continuation(&self, row: usize, column: usize) -> bool {
        self.region_start(row, column).is_some_and(|start| start != row)
    }

    /// Whether `row` is the top row of some region.
    pub fn is_top(&self, row: usize) -> bool {
        self.starts
            .get(row)
            .is_some_and(|cells| cells.contains(&Some(row)))
    }

    fn region_start(&self, row: usize, column: usize) -> Option<usize> {
        self.starts.get(row).and_then(|cells| cells.get(column).copied().flatten())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedGroup {
    pub label: String,
    pub table: RenderedTable,
}

/// Lay out one group's test cases. `#` numbering starts at 1 and never resets
/// inside the call.
pub fn render_table(cases: &[TestCase], options: &RenderOptions) -> RenderedTable {
    let token = options.line_break;
    let mut rows: Vec<Row> = Vec::new();
    let mut merges = Vec::new();
    let mut display_index: u32 = 1;

    for case in cases {
        let parent_row = rows.len();
        let description = case.description_cell();
        rows.push([
            CellValue::Number(f64::from(display_index)),
            CellValue::text(case.id.as_str()),
            CellValue::text(token.encode(description)),
            CellValue::text(token.encode(&case.preconditions.join(token.as_str()))),
            CellValue::Empty,
            CellValue::Empty,
        ]);
        display_index += 1;

        if !options.include_steps {
            continue;
        }

        let mut visible = 0usize;
        for step in &case.steps {
            let action = step.action.trim();
            let expected = step
                .expected_behavior
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty());
            if action.is_empty() && expected.is_none() {
                continue;
            }

            let procedure = CellValue::text(token.encode(&format!(
                "Step {}: {}",
                step.step_number, action
            )));
            let expected = expected
                .map(|e| CellValue::text(token.encode(e)))
                .unwrap_or_default();

            if visible == 0 {
                rows[parent_row][COL_PROCEDURE] = procedure;
                rows[parent_row][COL_EXPECTED] = expected;
            } else {
                rows.push([
                    CellValue::Number(f64::from(display_index)),
                    CellValue::Empty,
                    CellValue::Empty,
                    CellValue::Empty,
                    procedure,
                    expected,
                ]);
                display_index += 1;
            }
            visible += 1;
        }

        if visible > 0 {
            let child_rows = visible - 1;
            merges.extend(MERGED_COLUMNS.iter().map(|&column| MergeRegion {
                start_row: parent_row,
                end_row: parent_row + child_rows,
                column,
            }));
        }
    }

    RenderedTable { rows, merges }
}

/// Render each group independently; numbering restarts at 1 per group.
pub fn render_groups(groups: &[TestGroup], options: &RenderOptions) -> Vec<RenderedGroup> {
    groups
        .iter()
        .map(|group| RenderedGroup {
            label: group.label.clone(),
            table: render_table(&group.cases, options),
        })
        .collect()
}
