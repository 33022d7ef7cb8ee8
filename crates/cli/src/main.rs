// CaseGrid CLI - test case recovery and export

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use base64::Engine as _;
use clap::{Parser, Subcommand, ValueEnum};

use casegrid_cli::exit_codes::{
    engine_exit_code, export_exit_code, EXIT_ERROR, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE,
};
use casegrid_cli::export::{render_artifact, Artifact, Exporter, RenderRequest};
use casegrid_config::Settings;
use casegrid_engine::{parse_completion, EngineError, GroupingStrategy};
use casegrid_io::template::{FileTemplate, NoTemplate, TemplateProvider};
use casegrid_protocol::ExportFormat;

#[derive(Parser)]
#[command(name = "casegrid")]
#[command(about = "Turn model-generated test cases into markdown tables and Excel workbooks")]
#[command(version)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an export request and print the JSON response
    #[command(after_help = "\
Examples:
  casegrid export request.json
  cat request.json | casegrid export -
  casegrid export request.json --artifact -o cases.xlsx
  casegrid export request.json --template plan.xlsx --sheet 'Test Cases' --start-row 2")]
    Export {
        /// Request file (JSON), or - for stdin
        input: PathBuf,

        /// Output file (omit for stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Write the decoded artifact instead of the JSON response
        #[arg(long)]
        artifact: bool,

        #[command(flatten)]
        template: TemplateArgs,

        /// Settings file (defaults to ~/.config/casegrid/settings.json)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Recover test cases from a model completion and print them as JSON
    #[command(after_help = "\
Examples:
  casegrid recover completion.txt
  pbpaste | casegrid recover -")]
    Recover {
        /// Completion text file, or - for stdin
        input: PathBuf,
    },

    /// Render a model completion straight to markdown or Excel
    #[command(after_help = "\
Examples:
  casegrid render completion.txt -t markdown
  casegrid render completion.txt -t excel -o cases.xlsx --group-by priority
  casegrid render completion.txt -t markdown --no-steps --project Checkout")]
    Render {
        /// Completion text file, or - for stdin
        input: PathBuf,

        /// Output format
        #[arg(long, short = 't')]
        to: OutputFormat,

        /// Output file (required for excel; omit for stdout with markdown)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Grouping strategy
        #[arg(long, value_enum)]
        group_by: Option<Grouping>,

        /// Only one row per test case
        #[arg(long)]
        no_steps: bool,

        /// Project name for the document heading
        #[arg(long)]
        project: Option<String>,

        #[command(flatten)]
        template: TemplateArgs,

        /// Settings file (defaults to ~/.config/casegrid/settings.json)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct TemplateArgs {
    /// Excel template to fill (overrides template.path)
    #[arg(long)]
    template: Option<PathBuf>,

    /// Template sheet to fill (falls back to the first sheet)
    #[arg(long, requires = "template")]
    sheet: Option<String>,

    /// 0-based template row where data rows are inserted
    #[arg(long, requires = "template")]
    start_row: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Excel,
}

impl From<OutputFormat> for ExportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Markdown => ExportFormat::Markdown,
            OutputFormat::Excel => ExportFormat::Excel,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Grouping {
    Category,
    Priority,
    None,
}

impl From<Grouping> for GroupingStrategy {
    fn from(grouping: Grouping) -> Self {
        match grouping {
            Grouping::Category => GroupingStrategy::Category,
            Grouping::Priority => GroupingStrategy::Priority,
            Grouping::None => GroupingStrategy::None,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Export { input, output, artifact, template, config } => {
            cmd_export(input, output, artifact, template, config)
        }
        Commands::Recover { input } => cmd_recover(input),
        Commands::Render { input, to, output, group_by, no_steps, project, template, config } => {
            cmd_render(input, to, output, group_by, no_steps, project, template, config)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    /// Exit code only; the failure was already reported on stdout.
    pub fn silent(code: u8) -> Self {
        Self { code, message: String::new(), hint: None }
    }

    pub fn engine(err: EngineError) -> Self {
        let hint = match &err {
            EngineError::Unrecoverable { .. } => {
                Some("the completion must contain a JSON array of test cases".to_string())
            }
            EngineError::NoTestCases => None,
        };
        Self { code: engine_exit_code(&err), message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// input / output
// ============================================================================

fn read_input(input: &Path) -> Result<String, CliError> {
    if input.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| CliError::io(format!("failed to read stdin: {}", e)))?;
        return Ok(text);
    }
    std::fs::read_to_string(input)
        .map_err(|e| CliError::io(format!("failed to read {}: {}", input.display(), e)))
}

fn write_output(output: Option<&Path>, bytes: &[u8]) -> Result<(), CliError> {
    match output {
        Some(path) if path.as_os_str() != "-" => std::fs::write(path, bytes)
            .map_err(|e| CliError::io(format!("failed to write {}: {}", path.display(), e))),
        _ => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(bytes)
                .and_then(|_| handle.flush())
                .map_err(|e| CliError::io(e.to_string()))
        }
    }
}

fn load_settings(config: Option<&Path>) -> Settings {
    match config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
}

/// Template from the command line, else from settings, else none.
fn template_provider(args: TemplateArgs, settings: &Settings) -> Box<dyn TemplateProvider> {
    let (path, sheet, start_row) = match args.template {
        Some(path) => (path, args.sheet, args.start_row),
        None => match &settings.template_path {
            Some(path) => (path.clone(), None, None),
            None => return Box::new(NoTemplate),
        },
    };
    let sheet = sheet.unwrap_or_else(|| settings.template_sheet_name.clone());
    let start_row = start_row.unwrap_or(settings.template_start_row);
    log::debug!("template {} sheet '{}' row {}", path.display(), sheet, start_row);
    Box::new(FileTemplate::new(path).with_sheet(Some(sheet)).with_start_row(start_row))
}

// ============================================================================
// export
// ============================================================================

fn cmd_export(
    input: PathBuf,
    output: Option<PathBuf>,
    artifact: bool,
    template: TemplateArgs,
    config: Option<PathBuf>,
) -> Result<(), CliError> {
    let body = read_input(&input)?;
    let settings = load_settings(config.as_deref());
    let templates = template_provider(template, &settings);

    let (response, error) = Exporter::new(&settings, templates.as_ref()).respond_json(&body);

    if artifact {
        if let Some(err) = error {
            return Err(CliError {
                code: export_exit_code(&err),
                message: err.to_string(),
                hint: None,
            });
        }
        let Some(data) = response.data else {
            return Err(CliError::silent(EXIT_ERROR));
        };
        let bytes = if data.format.is_binary() {
            base64::engine::general_purpose::STANDARD
                .decode(data.content.as_bytes())
                .map_err(|e| CliError::io(format!("failed to decode artifact: {}", e)))?
        } else {
            data.content.into_bytes()
        };
        return write_output(output.as_deref(), &bytes);
    }

    let mut json = serde_json::to_string(&response)
        .map_err(|e| CliError::io(format!("failed to serialize response: {}", e)))?;
    json.push('\n');
    write_output(output.as_deref(), json.as_bytes())?;

    match error {
        None => Ok(()),
        Some(err) => Err(CliError::silent(export_exit_code(&err))),
    }
}

// ============================================================================
// recover
// ============================================================================

fn cmd_recover(input: PathBuf) -> Result<(), CliError> {
    let text = read_input(&input)?;
    let cases = parse_completion(&text).map_err(CliError::engine)?;
    log::info!("recovered {} test cases", cases.len());

    let mut json = serde_json::to_string_pretty(&cases)
        .map_err(|e| CliError::io(format!("failed to serialize test cases: {}", e)))?;
    json.push('\n');
    write_output(None, json.as_bytes())
}

// ============================================================================
// render
// ============================================================================

#[allow(clippy::too_many_arguments)]
fn cmd_render(
    input: PathBuf,
    to: OutputFormat,
    output: Option<PathBuf>,
    group_by: Option<Grouping>,
    no_steps: bool,
    project: Option<String>,
    template: TemplateArgs,
    config: Option<PathBuf>,
) -> Result<(), CliError> {
    let format = ExportFormat::from(to);
    if format.is_binary() && output.as_ref().map_or(true, |p| p.as_os_str() == "-") {
        return Err(CliError::args("excel output needs a file")
            .with_hint(format!("add -o cases.{}", format.file_extension())));
    }

    let text = read_input(&input)?;
    let settings = load_settings(config.as_deref());
    let templates = template_provider(template, &settings);

    let strategy = match group_by {
        Some(grouping) => grouping.into(),
        None => GroupingStrategy::parse(&settings.grouping_strategy).unwrap_or_default(),
    };
    let request = RenderRequest {
        format,
        strategy,
        include_steps: !no_steps && settings.include_steps,
        project_name: project.filter(|p| !p.trim().is_empty()),
    };

    let cases = parse_completion(&text).map_err(CliError::engine)?;
    let artifact = render_artifact(&cases, &request, templates.as_ref()).map_err(|e| CliError {
        code: export_exit_code(&e),
        message: e.to_string(),
        hint: None,
    })?;

    if let Artifact::Excel { report, .. } = &artifact {
        if report.has_warnings() {
            eprintln!("{}", report.summary());
        }
    }
    write_output(output.as_deref(), &artifact.into_bytes())
}
