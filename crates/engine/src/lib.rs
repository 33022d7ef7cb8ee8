//! `casegrid-engine`: test case recovery, normalization, grouping and table layout.
//!
//! Pure engine crate: receives model output or raw records, returns canonical
//! test cases and rendered tables. No file or spreadsheet dependencies.

pub mod error;
pub mod group;
pub mod model;
pub mod normalize;
pub mod recover;
pub mod table;

pub use error::EngineError;
pub use group::{group_test_cases, GroupingStrategy, TestGroup};
pub use model::{CaseType, Category, Priority, Step, TestCase};
pub use normalize::{is_identifiable, normalize_test_cases};
pub use recover::recover_test_cases;
pub use table::{
    render_groups, render_table, CellValue, LineBreak, MergeIndex, MergeRegion, RenderOptions,
    RenderedGroup, RenderedTable, Row,
};

/// Recover and normalize in one call: raw model text to canonical test cases.
pub fn parse_completion(raw: &str) -> Result<Vec<TestCase>, EngineError> {
    let records = recover_test_cases(raw)?;
    normalize_test_cases(&records)
}
