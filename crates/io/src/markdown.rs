// Pipe-table rendering of test case tables.
//
// Merge regions are approximated: merged columns show their value on the
// region's first row and stay blank below it.

use casegrid_engine::table::{RenderedGroup, RenderedTable, COLUMN_COUNT, HEADER};

const SEPARATOR: &str = "| --- | --- | --- | --- | --- | --- |";

/// Render every group as a section of one markdown document.
///
/// `project_name` adds a document heading when present and non-blank.
/// `group_headings` adds a `# Test Cases - {label}` heading per group.
pub fn render_markdown(
    groups: &[RenderedGroup],
    project_name: Option<&str>,
    group_headings: bool,
) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(name) = project_name.map(str::trim).filter(|n| !n.is_empty()) {
        sections.push(format!("# Test Cases - {}", escape_cell(name)));
    }

    for group in groups {
        let table = render_table(&group.table);
        if group_headings {
            sections.push(format!("# Test Cases - {}\n\n{}", escape_cell(&group.label), table));
        } else {
            sections.push(table);
        }
    }

    sections.join("\n\n").trim_end().to_string()
}

/// Header, separator and one line per data row.
pub fn render_table(table: &RenderedTable) -> String {
    let mut lines = Vec::with_capacity(table.rows.len() + 2);
    lines.push(format_row(HEADER.iter().map(|h| h.to_string())));
    lines.push(SEPARATOR.to_string());

    let merges = table.merge_index();
    for (r, row) in table.rows.iter().enumerate() {
        lines.push(format_row((0..COLUMN_COUNT).map(|c| {
            if merges.is_continuation(r, c) {
                String::new()
            } else {
                escape_cell(&row[c].display())
            }
        })));
    }

    lines.join("\n")
}

fn format_row(cells: impl Iterator<Item = String>) -> String {
    let cells: Vec<String> = cells.collect();
    format!("| {} |", cells.join(" | "))
}

/// Make text safe inside one pipe-table cell.
pub fn escape_cell(text: &str) -> String {
    text.replace('\r', "")
        .replace('|', "\\|")
        .replace('\n', "<br>")
}
