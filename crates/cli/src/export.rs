//! Test case export service.
//!
//! Validates an export request, runs normalization, grouping and table
//! layout, then formats the result as markdown text or an xlsx workbook.
//! Every call builds its artifact from scratch and reads the template afresh.

use std::fmt;
use std::time::Instant;

use base64::Engine as _;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use casegrid_config::Settings;
use casegrid_engine::{
    group_test_cases, is_identifiable, normalize_test_cases, render_groups, EngineError,
    GroupingStrategy, RenderOptions, TestCase,
};
use casegrid_io::template::TemplateProvider;
use casegrid_io::{markdown, xlsx, XlsxExportResult};
use casegrid_protocol::{ExportData, ExportFormat, ExportRequest, ExportResponse};

#[derive(Debug, Clone, PartialEq)]
pub enum ExportError {
    /// The request was rejected before any processing.
    Validation(String),
    Engine(EngineError),
    /// The artifact could not be serialized.
    Render(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "{msg}"),
            Self::Engine(e) => write!(f, "{e}"),
            Self::Render(msg) => write!(f, "failed to render spreadsheet: {msg}"),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<EngineError> for ExportError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

/// Rendering choices shared by the export request and the `render` command.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub format: ExportFormat,
    pub strategy: GroupingStrategy,
    pub include_steps: bool,
    pub project_name: Option<String>,
}

/// A finished artifact.
#[derive(Debug)]
pub enum Artifact {
    Markdown(String),
    Excel {
        bytes: Vec<u8>,
        report: XlsxExportResult,
    },
}

impl Artifact {
    /// Response `content`: markdown text, or base64 of the workbook bytes.
    pub fn content(&self) -> String {
        match self {
            Artifact::Markdown(text) => text.clone(),
            Artifact::Excel { bytes, .. } => base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Raw bytes as they would be written to a file.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Artifact::Markdown(text) => text.into_bytes(),
            Artifact::Excel { bytes, .. } => bytes,
        }
    }
}

/// Group, lay out and format canonical test cases.
pub fn render_artifact(
    cases: &[TestCase],
    request: &RenderRequest,
    templates: &dyn TemplateProvider,
) -> Result<Artifact, ExportError> {
    let groups = group_test_cases(cases, request.strategy);

    match request.format {
        ExportFormat::Markdown => {
            let rendered = render_groups(&groups, &RenderOptions::markdown(request.include_steps));
            Ok(Artifact::Markdown(markdown::render_markdown(
                &rendered,
                request.project_name.as_deref(),
                request.strategy.shows_group_headings(),
            )))
        }
        ExportFormat::Excel => {
            let rendered =
                render_groups(&groups, &RenderOptions::spreadsheet(request.include_steps));
            let template = templates.fetch();
            let (bytes, report) =
                xlsx::export(&rendered, template.as_ref()).map_err(ExportError::Render)?;
            for warning in &report.warnings {
                log::warn!("{}", warning);
            }
            Ok(Artifact::Excel { bytes, report })
        }
    }
}

/// The export service. Settings supply defaults for omitted request fields.
pub struct Exporter<'a> {
    settings: &'a Settings,
    templates: &'a dyn TemplateProvider,
}

impl<'a> Exporter<'a> {
    pub fn new(settings: &'a Settings, templates: &'a dyn TemplateProvider) -> Self {
        Self { settings, templates }
    }

    /// Run an export and wrap the outcome as a response. Never fails:
    /// errors become `success: false` with a message.
    pub fn respond(&self, request: &ExportRequest) -> (ExportResponse, Option<ExportError>) {
        let started = Instant::now();
        let outcome = self.export(request);
        let elapsed = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(data) => (ExportResponse::success(data, elapsed), None),
            Err(e) => {
                log::warn!("export failed: {}", e);
                if let ExportError::Engine(EngineError::Unrecoverable { attempts, .. }) = &e {
                    for attempt in attempts {
                        log::debug!("recovery attempt: {}", attempt);
                    }
                }
                (ExportResponse::failure(e.to_string(), elapsed), Some(e))
            }
        }
    }

    /// Parse a JSON request body and respond to it.
    pub fn respond_json(&self, body: &str) -> (ExportResponse, Option<ExportError>) {
        let started = Instant::now();
        match serde_json::from_str::<ExportRequest>(body) {
            Ok(request) => {
                let (mut response, error) = self.respond(&request);
                response.processing_time = started.elapsed().as_millis() as u64;
                (response, error)
            }
            Err(e) => {
                let error = ExportError::Validation(format!("invalid export request: {e}"));
                let elapsed = started.elapsed().as_millis() as u64;
                (ExportResponse::failure(error.to_string(), elapsed), Some(error))
            }
        }
    }

    pub fn export(&self, request: &ExportRequest) -> Result<ExportData, ExportError> {
        let records = validate_test_cases(request.test_cases.as_ref())?;
        let render = self.render_request(request)?;

        let language = request.language.as_deref().unwrap_or(&self.settings.language);
        log::debug!("export language: {}", language);

        let cases = normalize_test_cases(records)?;
        let artifact = render_artifact(&cases, &render, self.templates)?;
        if let Artifact::Excel { report, .. } = &artifact {
            log::info!("{}", report.summary());
        }

        Ok(ExportData {
            content: artifact.content(),
            format: render.format,
            total_test_cases: cases.len(),
            exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            project_name: render.project_name,
        })
    }

    fn render_request(&self, request: &ExportRequest) -> Result<RenderRequest, ExportError> {
        let format = match request.format.as_deref() {
            None => return Err(ExportError::Validation("format is required".to_string())),
            Some(raw) => ExportFormat::parse(raw).ok_or_else(|| {
                ExportError::Validation(format!("unsupported format '{raw}'"))
            })?,
        };

        let strategy = match request.grouping_strategy.as_deref() {
            Some(raw) => GroupingStrategy::parse(raw).ok_or_else(|| {
                ExportError::Validation(format!("unknown grouping strategy '{raw}'"))
            })?,
            None => self.default_strategy(),
        };

        Ok(RenderRequest {
            format,
            strategy,
            include_steps: request.include_steps.unwrap_or(self.settings.include_steps),
            project_name: request
                .project_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        })
    }

    fn default_strategy(&self) -> GroupingStrategy {
        GroupingStrategy::parse(&self.settings.grouping_strategy).unwrap_or_else(|| {
            log::warn!(
                "ignoring unknown export.groupingStrategy '{}' in settings",
                self.settings.grouping_strategy
            );
            GroupingStrategy::default()
        })
    }
}

fn validate_test_cases(test_cases: Option<&Value>) -> Result<&[Value], ExportError> {
    let records = match test_cases {
        None | Some(Value::Null) => {
            return Err(ExportError::Validation("testCases is required".to_string()))
        }
        Some(Value::Array(records)) => records,
        Some(_) => return Err(ExportError::Validation("testCases must be a list".to_string())),
    };

    if records.is_empty() {
        return Err(ExportError::Validation("testCases must not be empty".to_string()));
    }
    if let Some(index) = records.iter().position(|record| !is_identifiable(record)) {
        return Err(ExportError::Validation(format!(
            "test case {} has no id, title or description",
            index + 1
        )));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use casegrid_io::template::{NoTemplate, StaticTemplate};
    use casegrid_io::ExportMode;
    use serde_json::json;

    fn request(test_cases: Value, format: &str) -> ExportRequest {
        ExportRequest {
            test_cases: Some(test_cases),
            format: Some(format.to_string()),
            ..Default::default()
        }
    }

    fn sample_cases() -> Value {
        json!([
            {
                "id": "VIS-1",
                "title": "Banner renders",
                "category": "visual",
                "steps": [{"action": "Open home", "expected": "Banner visible"}]
            },
            {
                "id": "SEC-1",
                "title": "Login | lockout",
                "category": "security",
                "preconditions": ["Account exists"],
                "steps": [
                    {"action": "Enter wrong password 5 times"},
                    {"action": "Enter right password", "expected": "Account locked"}
                ]
            }
        ])
    }

    fn export(request: &ExportRequest) -> Result<ExportData, ExportError> {
        let settings = Settings::default();
        Exporter::new(&settings, &NoTemplate).export(request)
    }

    #[test]
    fn markdown_export_groups_by_category() {
        let mut req = request(sample_cases(), "markdown");
        req.project_name = Some("Checkout".to_string());
        let data = export(&req).unwrap();

        assert_eq!(data.format, ExportFormat::Markdown);
        assert_eq!(data.total_test_cases, 2);
        assert_eq!(data.project_name.as_deref(), Some("Checkout"));
        assert!(data.content.starts_with("# Test Cases - Checkout\n\n# Test Cases - Visual Tests"));
        assert!(data.content.contains("# Test Cases - Security Tests"));
        assert!(data.content.contains("| 1 | SEC-1 | Login \\| lockout | Account exists |"));
        assert!(data.content.contains("| 2 |  |  |  | Step 2: Enter right password | Account locked |"));
        assert!(data.exported_at.ends_with('Z'));
    }

    #[test]
    fn markdown_without_grouping_has_no_group_heading() {
        let mut req = request(sample_cases(), "markdown");
        req.grouping_strategy = Some("none".to_string());
        req.include_steps = Some(false);
        let data = export(&req).unwrap();

        assert!(data.content.starts_with("| # |"));
        assert!(!data.content.contains("All Test Cases"));
        assert!(!data.content.contains("Step 1"));
    }

    #[test]
    fn excel_export_is_base64_workbook() {
        let data = export(&request(sample_cases(), "excel")).unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&data.content)
            .unwrap();
        assert_eq!(&bytes[..2], b"PK");
        assert_eq!(data.format, ExportFormat::Excel);
    }

    #[test]
    fn excel_export_uses_template_provider() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        workbook.add_worksheet().set_name("Test Cases").unwrap();
        let template = StaticTemplate::new(workbook.save_to_buffer().unwrap(), None, 1);

        let cases = normalize_test_cases(sample_cases().as_array().unwrap()).unwrap();
        let render = RenderRequest {
            format: ExportFormat::Excel,
            strategy: GroupingStrategy::None,
            include_steps: true,
            project_name: None,
        };
        match render_artifact(&cases, &render, &template).unwrap() {
            Artifact::Excel { report, .. } => {
                assert_eq!(report.mode, ExportMode::Template);
                assert_eq!(report.rows_exported, 3);
            }
            Artifact::Markdown(_) => panic!("expected a workbook"),
        }
    }

    #[test]
    fn validation_failures() {
        let cases = [
            (ExportRequest { format: Some("markdown".into()), ..Default::default() }, "testCases is required"),
            (request(json!({"id": "x"}), "markdown"), "testCases must be a list"),
            (request(json!([]), "markdown"), "testCases must not be empty"),
            (request(json!([{"id": "a"}, {"steps": []}]), "markdown"), "test case 2 has no id, title or description"),
            (request(json!(["loose text"]), "markdown"), "test case 1 has no id, title or description"),
            (request(json!([{"id": "a"}]), "pdf"), "unsupported format 'pdf'"),
            (ExportRequest { test_cases: Some(json!([{"id": "a"}])), ..Default::default() }, "format is required"),
        ];
        for (req, message) in cases {
            assert_eq!(export(&req), Err(ExportError::Validation(message.to_string())));
        }

        let mut req = request(json!([{"id": "a"}]), "markdown");
        req.grouping_strategy = Some("severity".into());
        assert_eq!(
            export(&req),
            Err(ExportError::Validation("unknown grouping strategy 'severity'".into()))
        );
    }

    #[test]
    fn settings_supply_defaults() {
        let settings = Settings {
            grouping_strategy: "none".to_string(),
            include_steps: false,
            ..Default::default()
        };
        let exporter = Exporter::new(&settings, &NoTemplate);
        let data = exporter.export(&request(sample_cases(), "markdown")).unwrap();
        assert!(!data.content.contains("# Test Cases"));
        assert!(!data.content.contains("Step 1"));

        // Explicit request values win.
        let mut req = request(sample_cases(), "markdown");
        req.include_steps = Some(true);
        let data = exporter.export(&req).unwrap();
        assert!(data.content.contains("Step 1: Open home"));
    }

    #[test]
    fn respond_wraps_failures() {
        let settings = Settings::default();
        let exporter = Exporter::new(&settings, &NoTemplate);

        let (response, error) = exporter.respond_json(r#"{"testCases": [], "format": "markdown"}"#);
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.message.as_deref(), Some("testCases must not be empty"));
        assert!(matches!(error, Some(ExportError::Validation(_))));

        let (response, error) = exporter.respond_json("not json");
        assert!(!response.success);
        assert!(response.message.unwrap().starts_with("invalid export request"));
        assert!(error.is_some());

        let (response, error) = exporter.respond_json(
            r#"{"testCases": [{"title": "Works"}], "format": "markdown"}"#,
        );
        assert!(response.success);
        assert!(error.is_none());
        assert_eq!(response.data.unwrap().total_test_cases, 1);
    }
}
