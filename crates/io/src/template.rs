//! Template sources for spreadsheet export.
//!
//! A provider either hands back template bytes plus where to write, or
//! nothing. "Nothing" is the normal case and selects a freshly built workbook.

use std::path::PathBuf;

/// Default designated sheet of a template workbook.
pub const DEFAULT_SHEET_NAME: &str = "Test Cases";

/// Default 0-based insertion row (below a title row and a header row).
pub const DEFAULT_START_ROW: u32 = 2;

/// A template workbook ready to be filled.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSource {
    pub bytes: Vec<u8>,
    /// Sheet to fill. `None` or an unknown name selects the first sheet.
    pub sheet_name: Option<String>,
    /// 0-based row where data rows are inserted.
    pub start_row: u32,
    /// Human-readable origin, for logs and the export report.
    pub label: String,
}

pub trait TemplateProvider {
    fn fetch(&self) -> Option<TemplateSource>;
}

/// Always unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTemplate;

impl TemplateProvider for NoTemplate {
    fn fetch(&self) -> Option<TemplateSource> {
        None
    }
}

/// Reads the template from disk on every fetch.
#[derive(Debug, Clone)]
pub struct FileTemplate {
    pub path: PathBuf,
    pub sheet_name: Option<String>,
    pub start_row: u32,
}

impl FileTemplate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet_name: Some(DEFAULT_SHEET_NAME.to_string()),
            start_row: DEFAULT_START_ROW,
        }
    }

    pub fn with_sheet(mut self, sheet_name: Option<String>) -> Self {
        self.sheet_name = sheet_name;
        self
    }

    pub fn with_start_row(mut self, start_row: u32) -> Self {
        self.start_row = start_row;
        self
    }
}

impl TemplateProvider for FileTemplate {
    fn fetch(&self) -> Option<TemplateSource> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Some(TemplateSource {
                bytes,
                sheet_name: self.sheet_name.clone(),
                start_row: self.start_row,
                label: self.path.display().to_string(),
            }),
            Err(e) => {
                log::warn!(
                    "template {} unavailable, using a fresh workbook: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }
}

/// In-memory template, mainly for embedding and tests.
#[derive(Debug, Clone)]
pub struct StaticTemplate {
    source: TemplateSource,
}

impl StaticTemplate {
    pub fn new(bytes: Vec<u8>, sheet_name: Option<String>, start_row: u32) -> Self {
        Self {
            source: TemplateSource {
                bytes,
                sheet_name,
                start_row,
                label: "embedded template".to_string(),
            },
        }
    }
}

impl TemplateProvider for StaticTemplate {
    fn fetch(&self) -> Option<TemplateSource> {
        Some(self.source.clone())
    }
}

impl<T: TemplateProvider + ?Sized> TemplateProvider for Box<T> {
    fn fetch(&self) -> Option<TemplateSource> {
        (**self).fetch()
    }
}
