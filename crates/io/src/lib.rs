// Output formats for rendered test case tables

pub mod markdown;
pub mod template;
pub mod xlsx;
pub mod xlsx_styles;

pub use markdown::render_markdown;
pub use template::{FileTemplate, NoTemplate, StaticTemplate, TemplateProvider, TemplateSource};
pub use xlsx::{ExportMode, XlsxExportResult};
