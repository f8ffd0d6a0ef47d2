//! Sandbox copies of a project for instrumented test runs.
//!
//! The dynamic analyzer never touches the real project:
//! 1. Copy the project to a temp directory
//! 2. Instrument the copied spec files
//! 3. Run the suite with the sandbox as cwd
//! 4. Read the results and discard the copy
//!
//! Command output goes to files under the sandbox metadata directory rather
//! than pipes, so a chatty suite cannot block on a full pipe buffer while we
//! wait for it.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, warn};
use wait_timeout::ChildExt;
use walkdir::WalkDir;

// ============================================================================
// Sandbox Configuration
// ============================================================================

/// Configuration for sandbox creation and operation.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Custom directory for sandbox (default: system temp).
    pub sandbox_dir: Option<PathBuf>,
    /// Whether to preserve the sandbox after a failed run.
    pub keep_sandbox: bool,
    /// Command timeout.
    pub timeout: Duration,
    /// Additional environment variables for commands.
    pub extra_env: HashMap<String, String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig {
            sandbox_dir: None,
            keep_sandbox: false,
            timeout: Duration::from_secs(600),
            extra_env: HashMap::new(),
        }
    }
}

impl SandboxConfig {
    /// Enable keep_sandbox flag.
    pub fn keep_on_failure(mut self) -> Self {
        self.keep_sandbox = true;
        self
    }

    /// Set command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add an environment variable for commands.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_env.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Default Exclusions
// ============================================================================

/// Directories never copied into a sandbox.
///
/// `vendor/` and `.bundle/` are kept: bundler may resolve gems from them.
const EXCLUDE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "tmp",
    "log",
    "coverage",
    ".yardoc",
    "pkg",
];

/// File patterns never copied.
const EXCLUDE_PATTERNS: &[&str] = &["*.log", "*.tmp", "*.swp", "*.gem"];

/// Check if a project-relative path should be excluded.
fn should_exclude(path: &Path) -> bool {
    for component in path.components() {
        if let std::path::Component::Normal(name) = component {
            let name_str = name.to_string_lossy();

            if EXCLUDE_DIRS.contains(&name_str.as_ref()) {
                return true;
            }

            for pattern in EXCLUDE_PATTERNS {
                if let Some(suffix) = pattern.strip_prefix('*') {
                    if name_str.ends_with(suffix) {
                        return true;
                    }
                }
            }
        }
    }
    false
}

// ============================================================================
// Symlink Handling
// ============================================================================

/// Result of checking a symlink.
#[derive(Debug)]
pub enum SymlinkCheck {
    /// Symlink points within the project, copy the target content.
    WithinProject(PathBuf),
    /// Symlink points outside the project, skip with a warning.
    OutsideProject(PathBuf),
    /// Not a symlink.
    NotSymlink,
    /// Broken link, loop, or permission error.
    Error(io::Error),
}

fn check_symlink(path: &Path, project_root: &Path) -> SymlinkCheck {
    if !path.is_symlink() {
        return SymlinkCheck::NotSymlink;
    }

    let target = match fs::read_link(path) {
        Ok(target) => target,
        Err(e) => return SymlinkCheck::Error(e),
    };
    let absolute_target = if target.is_absolute() {
        target
    } else {
        path.parent()
            .map(|p| p.join(&target))
            .unwrap_or(target)
    };
    let canonical_target = match absolute_target.canonicalize() {
        Ok(p) => p,
        Err(e) => return SymlinkCheck::Error(e),
    };
    let canonical_root = match project_root.canonicalize() {
        Ok(p) => p,
        Err(e) => return SymlinkCheck::Error(e),
    };

    if canonical_target.starts_with(&canonical_root) {
        SymlinkCheck::WithinProject(canonical_target)
    } else {
        SymlinkCheck::OutsideProject(canonical_target)
    }
}

// ============================================================================
// Sandbox Handle
// ============================================================================

/// Handle for a sandbox directory, managing its lifecycle.
///
/// Layout: `<root>/workspace/` mirrors the project, `<root>/.respec_meta/`
/// holds the manifest and command output. The directory is removed on drop
/// unless [`SandboxHandle::persist`] was called.
pub struct SandboxHandle {
    temp_dir: Option<TempDir>,
    sandbox_root: PathBuf,
    workspace_dir: PathBuf,
    meta_dir: PathBuf,
    original_root: PathBuf,
    config: SandboxConfig,
    copied_files: Vec<String>,
    skipped_symlinks: Vec<(PathBuf, PathBuf)>,
}

impl SandboxHandle {
    /// Create a new sandbox by copying the project.
    pub fn create(project_root: &Path, config: SandboxConfig) -> io::Result<Self> {
        let project_root = project_root.canonicalize()?;

        let temp_dir = if let Some(ref base) = config.sandbox_dir {
            TempDir::with_prefix_in("respec_sandbox_", base)?
        } else {
            TempDir::with_prefix("respec_sandbox_")?
        };

        let sandbox_root = temp_dir.path().to_path_buf();
        let workspace_dir = sandbox_root.join("workspace");
        let meta_dir = sandbox_root.join(".respec_meta");
        fs::create_dir_all(&workspace_dir)?;
        fs::create_dir_all(&meta_dir)?;

        let mut handle = SandboxHandle {
            temp_dir: Some(temp_dir),
            sandbox_root,
            workspace_dir,
            meta_dir,
            original_root: project_root,
            config,
            copied_files: Vec::new(),
            skipped_symlinks: Vec::new(),
        };

        handle.copy_project_files()?;
        handle.write_metadata()?;
        debug!(
            files = handle.copied_files.len(),
            root = %handle.sandbox_root.display(),
            "sandbox created"
        );

        Ok(handle)
    }

    fn copy_project_files(&mut self) -> io::Result<()> {
        let root = self.original_root.clone();
        for entry in WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !should_exclude(e.path().strip_prefix(&root).unwrap_or(e.path())))
        {
            let entry = entry?;
            let source_path = entry.path();
            if source_path == self.original_root {
                continue;
            }

            let relative_path = source_path
                .strip_prefix(&self.original_root)
                .map_err(io::Error::other)?;
            let dest_path = self.workspace_dir.join(relative_path);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest_path)?;
                continue;
            }

            if source_path.is_symlink() {
                match check_symlink(source_path, &self.original_root) {
                    SymlinkCheck::WithinProject(target) => {
                        if target.is_file() {
                            if let Some(parent) = dest_path.parent() {
                                fs::create_dir_all(parent)?;
                            }
                            fs::copy(&target, &dest_path)?;
                            self.copied_files.push(relative_path_string(relative_path));
                        }
                    }
                    SymlinkCheck::OutsideProject(target) => {
                        warn!(
                            "Skipping symlink outside project: {} -> {}",
                            source_path.display(),
                            target.display()
                        );
                        self.skipped_symlinks
                            .push((source_path.to_path_buf(), target));
                    }
                    SymlinkCheck::NotSymlink => {}
                    SymlinkCheck::Error(e) => {
                        warn!("Error reading symlink {}: {}", source_path.display(), e);
                    }
                }
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(source_path, &dest_path)?;
            self.copied_files.push(relative_path_string(relative_path));
        }

        Ok(())
    }

    fn write_metadata(&self) -> io::Result<()> {
        fs::write(
            self.meta_dir.join("original_root"),
            self.original_root.to_string_lossy().as_bytes(),
        )?;
        fs::write(self.meta_dir.join("file_manifest"), self.copied_files.join("\n"))
    }

    /// Get the sandbox root directory.
    pub fn sandbox_root(&self) -> &Path {
        &self.sandbox_root
    }

    /// Get the mirrored project directory.
    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    /// Get the metadata directory (command output, helper files).
    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    /// Project-relative paths of copied files, forward slashes.
    pub fn copied_files(&self) -> &[String] {
        &self.copied_files
    }

    /// Symlinks that were skipped (outside the project).
    pub fn skipped_symlinks(&self) -> &[(PathBuf, PathBuf)] {
        &self.skipped_symlinks
    }

    /// Run a shell command line in the sandbox with `sh -c`.
    ///
    /// The command is killed once the configured timeout elapses; the result
    /// then has `timed_out` set and no exit code.
    pub fn run_shell(&self, script: &str, env: &[(String, String)]) -> io::Result<CommandResult> {
        if script.trim().is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "Empty command"));
        }

        let stdout_path = self.meta_dir.join("stdout.log");
        let stderr_path = self.meta_dir.join("stderr.log");
        let start = Instant::now();
        let timeout = self.config.timeout;

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(script)
            .current_dir(&self.workspace_dir)
            .stdin(Stdio::null())
            .stdout(File::create(&stdout_path)?)
            .stderr(File::create(&stderr_path)?);

        cmd.env("RESPEC_SANDBOX", "1");
        for (key, value) in &self.config.extra_env {
            cmd.env(key, value);
        }
        for (key, value) in env {
            cmd.env(key, value);
        }

        debug!(command = script, "running in sandbox");
        let mut child = cmd.spawn()?;

        let (status, timed_out) = match child.wait_timeout(timeout)? {
            Some(status) => (Some(status), false),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(
                    "Command timed out after {:?}: {}",
                    start.elapsed(),
                    script
                );
                (None, true)
            }
        };
        let duration = start.elapsed();

        let stdout = read_lossy(&stdout_path);
        let mut stderr = read_lossy(&stderr_path);
        if timed_out {
            stderr.push_str(&format!(
                "\nCommand timed out after {:?} (limit: {:?})",
                duration, timeout
            ));
        }

        Ok(CommandResult {
            success: status.map(|s| s.success()).unwrap_or(false),
            exit_code: status.and_then(|s| s.code()),
            timed_out,
            stdout,
            stderr,
            duration,
            command: script.to_string(),
        })
    }

    /// Mark this sandbox to be preserved (not cleaned up on drop).
    pub fn persist(&mut self) {
        if let Some(temp_dir) = self.temp_dir.take() {
            let path = temp_dir.keep();
            self.sandbox_root = path.clone();
            self.workspace_dir = path.join("workspace");
            self.meta_dir = path.join(".respec_meta");
        }
    }

    /// Explicitly dispose the sandbox.
    ///
    /// With `keep_sandbox` configured, a sandbox from a failed run is kept and
    /// its path returned.
    pub fn dispose(mut self, had_error: bool) -> Option<PathBuf> {
        if had_error && self.config.keep_sandbox {
            self.persist();
            Some(self.sandbox_root.clone())
        } else {
            None
        }
    }
}

fn relative_path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn read_lossy(path: &Path) -> String {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

// ============================================================================
// Command Result
// ============================================================================

/// Result of running a command in the sandbox.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command exited with status 0.
    pub success: bool,
    /// Exit code if the process exited normally.
    pub exit_code: Option<i32>,
    /// Whether the process was killed by the timeout.
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    /// The shell command line.
    pub command: String,
}

impl CommandResult {
    /// The last `lines` lines of stderr, for error messages.
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.trim_end().lines().collect();
        let from = all.len().saturating_sub(lines);
        all[from..].join("\n")
    }
}

// ============================================================================
// Tests
// ============================================================================
