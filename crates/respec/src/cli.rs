//! CLI front door.
//!
//! Everything `main.rs` does between parsing flags and exiting:
//! - target discovery (`.rb` files under the given paths)
//! - preflight (paths exist, something to convert, clean git tree)
//! - merging the config file with flag overrides
//! - rendering the outcome as text, JSON, or a unified diff
//!
//! All functions return `Result<T, RespecError>` so the caller can map
//! failures to exit codes in one place.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use respec_core::error::RespecError;
use respec_core::report::{ChangeLogEntry, Report, Summary};
use respec_ruby::syntax::ConstructKind;
use respec_ruby::{ConversionConfig, RunOutcome};

/// Default target when no paths are given.
pub const DEFAULT_PATH: &str = "spec";

// ============================================================================
// Discovery and Preflight
// ============================================================================

/// Resolve the project root; it must be an existing directory.
pub fn resolve_project_root(project: Option<&Path>) -> Result<PathBuf, RespecError> {
    let root = match project {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()?,
    };
    if !root.is_dir() {
        return Err(RespecError::preflight(format!(
            "project root '{}' is not a directory",
            root.display()
        )));
    }
    Ok(root)
}

/// Collect the Ruby files named by `paths`, walking directories.
///
/// Paths are resolved against `root`. A missing path is an error; a file that
/// is named explicitly but is not `.rb` is skipped with a warning. The result
/// is sorted and free of duplicates, and never empty.
pub fn collect_ruby_files(root: &Path, paths: &[PathBuf]) -> Result<Vec<PathBuf>, RespecError> {
    let default = [PathBuf::from(DEFAULT_PATH)];
    let paths = if paths.is_empty() { &default[..] } else { paths };

    let mut files = BTreeSet::new();
    for path in paths {
        let full = if path.is_absolute() {
            path.clone()
        } else {
            root.join(path)
        };
        if !full.exists() {
            return Err(RespecError::file_not_found(path.display().to_string()));
        }
        if full.is_file() {
            if is_ruby_file(&full) {
                files.insert(full);
            } else {
                warn!(path = %path.display(), "not a Ruby file; skipped");
            }
            continue;
        }
        for entry in WalkDir::new(&full)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
        {
            let entry = entry.map_err(|e| {
                RespecError::preflight(format!("cannot walk '{}': {}", full.display(), e))
            })?;
            if entry.file_type().is_file() && is_ruby_file(entry.path()) {
                files.insert(entry.into_path());
            }
        }
    }

    if files.is_empty() {
        return Err(RespecError::preflight(
            "no Ruby files found under the given paths",
        ));
    }
    debug!(files = files.len(), "targets collected");
    Ok(files.into_iter().collect())
}

fn is_ruby_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "rb")
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Refuse to run over uncommitted changes.
///
/// A root outside any git repository, or a machine without git, passes:
/// there is nothing to protect.
pub fn check_clean_worktree(root: &Path) -> Result<(), RespecError> {
    let output = match Command::new("git")
        .arg("-C")
        .arg(root)
        .args(["status", "--porcelain"])
        .output()
    {
        Ok(output) => output,
        Err(err) => {
            debug!(error = %err, "git unavailable; worktree check skipped");
            return Ok(());
        }
    };
    if !output.status.success() {
        debug!("not a git repository; worktree check skipped");
        return Ok(());
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let dirty: Vec<&str> = stdout
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| &line[3..])
        .collect();
    if dirty.is_empty() {
        return Ok(());
    }

    let mut shown = dirty.iter().take(5).copied().collect::<Vec<_>>().join(", ");
    if dirty.len() > 5 {
        let _ = write!(shown, " and {} more", dirty.len() - 5);
    }
    Err(RespecError::preflight(format!(
        "the git working tree has uncommitted changes ({}); commit or stash them, or pass --force",
        shown
    )))
}

// ============================================================================
// Configuration
// ============================================================================

/// Flag values that override the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub negative_form: Option<String>,
    pub boolean_matcher: Option<String>,
    /// Comma-separated kind lists, in the order given.
    pub enable: Vec<String>,
    pub disable: Vec<String>,
}

/// Build the conversion config: defaults, then the file, then flags.
///
/// Enables are applied before disables, so a kind named in both ends up off.
pub fn build_config(overrides: &ConfigOverrides) -> Result<ConversionConfig, RespecError> {
    let mut config = match &overrides.config_file {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            ConversionConfig::from_json_file(path)?
        }
        None => ConversionConfig::default(),
    };
    if let Some(form) = &overrides.negative_form {
        config.negative_form = form.parse()?;
    }
    if let Some(matcher) = &overrides.boolean_matcher {
        config.boolean_matcher = matcher.parse()?;
    }
    for list in &overrides.enable {
        config.set_enabled_list(list, true)?;
    }
    for list in &overrides.disable {
        config.set_enabled_list(list, false)?;
    }
    Ok(config)
}

/// One line per conversion kind, with its default and description.
pub fn list_conversions() -> String {
    let mut out = String::new();
    for kind in ConstructKind::ALL {
        let state = if kind.enabled_by_default() {
            "on"
        } else {
            "off"
        };
        let _ = writeln!(out, "{:<18} {:<4} {}", kind.name(), state, kind.description());
        for target in kind.targets() {
            let _ = writeln!(out, "{:<23} -> {}", "", target);
        }
    }
    out
}

// ============================================================================
// Output
// ============================================================================

#[derive(Debug, Serialize)]
struct RunResponse<'a> {
    status: &'static str,
    dry_run: bool,
    files_written: usize,
    summary: Summary,
    changelog: Vec<ChangeLogEntry>,
    report: &'a Report,
}

/// The full report plus summary and change log as pretty JSON.
pub fn render_json(outcome: &RunOutcome, files_written: usize) -> Result<String, RespecError> {
    let response = RunResponse {
        status: "ok",
        dry_run: outcome.dry_run,
        files_written,
        summary: outcome.report.summary(),
        changelog: outcome.report.changelog_lines(),
        report: &outcome.report,
    };
    Ok(serde_json::to_string_pretty(&response)?)
}

/// Human-readable report: warnings first, then the change log and counts.
pub fn render_text(outcome: &RunOutcome, files_written: usize) -> String {
    let mut out = String::new();
    for file in &outcome.report.files {
        if let Some(err) = &file.syntax_error {
            let _ = writeln!(
                out,
                "{}:{}:{}: syntax error: {} (file left unchanged)",
                file.path, err.line, err.column, err.message
            );
        }
        for note in &file.annotations {
            let _ = writeln!(
                out,
                "{}:{}:{}: warning: {}: {}",
                file.path, note.line, note.column, note.kind, note.reason
            );
        }
    }

    let changelog = outcome.report.changelog_lines();
    if !changelog.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        for entry in &changelog {
            let _ = writeln!(out, "{}", entry);
        }
    }

    let summary = outcome.report.summary();
    if !out.is_empty() {
        out.push('\n');
    }
    let _ = writeln!(
        out,
        "{} files inspected, {} changed, {} conversions ({} certain, {} heuristic), {} annotations, {} syntax errors",
        summary.files,
        summary.files_changed,
        summary.conversions,
        summary.certain,
        summary.heuristic,
        summary.annotations,
        summary.syntax_errors
    );
    if outcome.dry_run {
        let _ = writeln!(out, "dry run: no files written");
    } else {
        let _ = writeln!(out, "{} files written", files_written);
    }
    out
}

/// Error envelope for `--format json`.
pub fn render_error_json(err: &RespecError) -> String {
    let value = serde_json::json!({
        "status": "error",
        "code": err.error_code().code(),
        "message": err.to_string(),
    });
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

// ============================================================================
// Tests
// ============================================================================
