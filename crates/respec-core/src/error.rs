//! Error types and exit codes for respec.
//!
//! `RespecError` is the single error type surfaced by the CLI. Subsystem
//! errors (rewriting, sandbox, analysis) are bridged into it with `From`
//! impls so callers can use `?` all the way up.
//!
//! ## Exit Codes
//!
//! - `2`: Invalid arguments (bad flags, unreadable config)
//! - `3`: Preflight failed (missing paths, dirty worktree, no targets)
//! - `4`: Apply errors (file changed on disk, write failed)
//! - `6`: Dynamic analysis failed (aborts before any file is touched)
//! - `10`: Internal errors (bugs, broken invariants)
//!
//! Per-file syntax errors and ambiguous conversions are not errors at this
//! level; they are recorded in the report and the run continues.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::patch::RewriteError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller.
    InvalidArguments = 2,
    /// Environment is not fit for a run.
    PreflightFailed = 3,
    /// Failed to write converted files.
    ApplyError = 4,
    /// The instrumented suite run did not complete.
    AnalysisFailed = 6,
    /// Bugs, unexpected state.
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Guidance appended to every analysis failure.
pub const ANALYSIS_GUIDANCE: &str = "pass --rspec-command to choose how the suite is run, \
     or --skip-dynamic-analysis to convert without runtime facts";

/// Unified error type for the CLI.
#[derive(Debug, Error)]
pub enum RespecError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Environment check failed before conversion started.
    #[error("preflight failed: {message}")]
    PreflightFailed { message: String },

    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// Failed to write changes.
    #[error("apply error: {message}")]
    ApplyError {
        message: String,
        file: Option<String>,
    },

    /// Dynamic analysis could not complete.
    #[error("dynamic analysis failed: {message}; {}", ANALYSIS_GUIDANCE)]
    AnalysisFailed { message: String },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&RespecError> for OutputErrorCode {
    fn from(err: &RespecError) -> Self {
        match err {
            RespecError::InvalidArguments { .. } => OutputErrorCode::InvalidArguments,
            RespecError::PreflightFailed { .. } => OutputErrorCode::PreflightFailed,
            RespecError::FileNotFound { .. } => OutputErrorCode::PreflightFailed,
            RespecError::ApplyError { .. } => OutputErrorCode::ApplyError,
            RespecError::AnalysisFailed { .. } => OutputErrorCode::AnalysisFailed,
            RespecError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<RespecError> for OutputErrorCode {
    fn from(err: RespecError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Bridges
// ============================================================================

impl From<RewriteError> for RespecError {
    fn from(err: RewriteError) -> Self {
        // Matchers must never propose overlapping or malformed ranges.
        RespecError::InternalError {
            message: format!("rewrite invariant violated: {}", err),
        }
    }
}

impl From<io::Error> for RespecError {
    fn from(err: io::Error) -> Self {
        RespecError::InternalError {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<serde_json::Error> for RespecError {
    fn from(err: serde_json::Error) -> Self {
        RespecError::InternalError {
            message: format!("JSON error: {}", err),
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl RespecError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        RespecError::InvalidArguments {
            message: message.into(),
            details: None,
        }
    }

    /// Create an invalid arguments error with JSON details.
    pub fn invalid_args_with_details(
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        RespecError::InvalidArguments {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn preflight(message: impl Into<String>) -> Self {
        RespecError::PreflightFailed {
            message: message.into(),
        }
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        RespecError::FileNotFound { path: path.into() }
    }

    pub fn apply(message: impl Into<String>, file: Option<String>) -> Self {
        RespecError::ApplyError {
            message: message.into(),
            file,
        }
    }

    pub fn analysis(message: impl Into<String>) -> Self {
        RespecError::AnalysisFailed {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        RespecError::InternalError {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
