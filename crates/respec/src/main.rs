//! Binary entry point for the respec CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Convert everything under spec/ (runs the suite once to gather facts)
//! respec
//!
//! # Preview as a diff, without touching any file
//! respec spec/models --dry-run --format diff
//!
//! # Convert without running the suite
//! respec --skip-dynamic-analysis
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::info;

use respec::cli::{
    build_config, check_clean_worktree, collect_ruby_files, list_conversions, render_error_json,
    render_json, render_text, resolve_project_root, ConfigOverrides,
};
use respec::{run, RespecError, RunOptions};
use respec_ruby::analyzer::AnalysisOptions;

// ============================================================================
// CLI Structure
// ============================================================================

/// Convert RSpec 2 syntax to RSpec 3.
///
/// The suite is run once, instrumented, in a sandbox copy of the project to
/// learn what static syntax cannot tell. Constructs that stay ambiguous are
/// left untouched and reported.
#[derive(Parser, Debug)]
#[command(name = "respec", version, about = "Convert RSpec 2 syntax to RSpec 3")]
struct Cli {
    /// Files or directories to convert (default: spec/).
    paths: Vec<PathBuf>,

    /// Project root (default: current directory).
    #[arg(long)]
    project: Option<PathBuf>,

    /// Run even when the git working tree has uncommitted changes.
    #[arg(long)]
    force: bool,

    /// Convert without running the suite; fact-dependent constructs stay as they are.
    #[arg(long)]
    skip_dynamic_analysis: bool,

    /// Command that runs the suite (default: `bundle exec rspec` or `rspec`).
    #[arg(long, value_name = "CMD")]
    rspec_command: Option<String>,

    /// Seconds to wait for the instrumented run.
    #[arg(long, value_name = "SECS", default_value_t = 600)]
    analysis_timeout: u64,

    /// Keep the analysis sandbox on failure for inspection.
    #[arg(long)]
    keep_sandbox: bool,

    /// Negative expectation form: `not_to` or `to_not`.
    #[arg(long, value_name = "FORM")]
    negative_form: Option<String>,

    /// Replacements for be_true/be_false: `truthy,falsey`, `truthy,falsy` or `true,false`.
    #[arg(long, value_name = "STYLE")]
    boolean_matcher: Option<String>,

    /// Comma-separated conversions to turn on (see --list-conversions).
    #[arg(long, value_name = "KINDS")]
    enable: Vec<String>,

    /// Comma-separated conversions to turn off.
    #[arg(long, value_name = "KINDS")]
    disable: Vec<String>,

    /// JSON config file; flags override its values.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Report what would change without writing any file.
    #[arg(long)]
    dry_run: bool,

    /// Output format on stdout.
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Log level for tracing output (`RUST_LOG` takes precedence).
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Log line format on stderr.
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Print the available conversions and exit.
    #[arg(long)]
    list_conversions: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Warnings, change log and counts.
    Text,
    /// Full report with summary and change log.
    Json,
    /// Unified diff of every changed file.
    Diff,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.log_level, cli.log_format);

    let format = cli.format;
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if format == OutputFormat::Json {
                let _ = writeln!(io::stdout(), "{}", render_error_json(&err));
                let _ = io::stdout().flush();
            }
            let _ = writeln!(io::stderr(), "error: {}", err);
            ExitCode::from(err.error_code().code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel, format: LogFormat) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<(), RespecError> {
    if cli.list_conversions {
        print!("{}", list_conversions());
        return Ok(());
    }

    let conversion = build_config(&ConfigOverrides {
        config_file: cli.config.clone(),
        negative_form: cli.negative_form.clone(),
        boolean_matcher: cli.boolean_matcher.clone(),
        enable: cli.enable.clone(),
        disable: cli.disable.clone(),
    })?;

    let project_root = resolve_project_root(cli.project.as_deref())?;
    let paths = collect_ruby_files(&project_root, &cli.paths)?;
    if !cli.force {
        check_clean_worktree(&project_root)?;
    }
    info!(root = %project_root.display(), files = paths.len(), "starting conversion");

    let options = RunOptions {
        project_root,
        paths,
        dry_run: cli.dry_run,
        conversion,
        analysis: AnalysisOptions {
            skip: cli.skip_dynamic_analysis,
            rspec_command: cli.rspec_command.clone(),
            timeout: Duration::from_secs(cli.analysis_timeout),
            keep_sandbox: cli.keep_sandbox,
        },
    };

    let outcome = run(&options)?;
    let written = outcome.write()?;

    let mut stdout = io::stdout();
    let rendered = match cli.format {
        OutputFormat::Text => render_text(&outcome, written),
        OutputFormat::Json => render_json(&outcome, written)?,
        OutputFormat::Diff => outcome.diff(),
    };
    write!(stdout, "{}", rendered)?;
    if cli.format == OutputFormat::Json {
        writeln!(stdout)?;
    }
    stdout.flush()?;
    Ok(())
}
