//! Conversion records, annotations, and the run report.
//!
//! Every attempt to convert a construct ends in one of:
//! - a [`ConversionRecord`] (converted, with a [`Confidence`]),
//! - an [`Annotation`] (left untouched, flagged for manual review),
//! - nothing at all (the conversion was not requested).
//!
//! Files that could not be parsed carry a [`SyntaxErrorInfo`] instead.
//! The [`Report`] is append-only for the duration of a run.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::patch::OutputEdit;

/// Schema version of the JSON report.
pub const REPORT_SCHEMA_VERSION: &str = "1";

// ============================================================================
// Records
// ============================================================================

/// How sure the converter is that the new syntax means the same thing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Static syntax plus available facts fully determine the rewrite.
    Certain,
    /// The rewrite rests on a documented assumption; worth a glance.
    Heuristic,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Certain => write!(f, "certain"),
            Confidence::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// A successful conversion of one construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    /// Construct kind name (e.g. `should`).
    pub kind: String,
    /// 1-indexed line of the construct.
    pub line: u32,
    /// 1-indexed column of the construct.
    pub column: u32,
    /// Generic shape of the old syntax, e.g. `obj.should`.
    pub original_syntax: String,
    /// Generic shape of the new syntax, e.g. `expect(obj).to`.
    pub converted_syntax: String,
    pub confidence: Confidence,
}

/// A construct that was recognized but left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: String,
    pub line: u32,
    pub column: u32,
    /// Why no safe conversion could be chosen.
    pub reason: String,
}

/// Where a file failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxErrorInfo {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// Everything that happened to one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    /// Project-relative path.
    pub path: String,
    pub records: Vec<ConversionRecord>,
    pub annotations: Vec<Annotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax_error: Option<SyntaxErrorInfo>,
    /// Applied replacements in file order.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub edits: Vec<OutputEdit>,
}

impl FileReport {
    pub fn new(path: impl Into<String>) -> Self {
        FileReport {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Whether the file's text changes.
    pub fn is_changed(&self) -> bool {
        !self.edits.is_empty()
    }
}

// ============================================================================
// Report
// ============================================================================

/// Aggregate counts for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub files: usize,
    pub files_changed: usize,
    pub conversions: usize,
    pub certain: usize,
    pub heuristic: usize,
    pub annotations: usize,
    pub syntax_errors: usize,
}

/// One line of the change log: a conversion shape and how often it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub original_syntax: String,
    pub converted_syntax: String,
    pub count: usize,
}

impl fmt::Display for ChangeLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.count == 1 {
            "conversion"
        } else {
            "conversions"
        };
        write!(
            f,
            "{} {} from: {}\n  to: {}",
            self.count, noun, self.original_syntax, self.converted_syntax
        )
    }
}

/// The audit trail of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub schema_version: String,
    /// ISO 8601 timestamp of report creation.
    pub generated_at: String,
    pub files: Vec<FileReport>,
}

impl Report {
    pub fn new() -> Self {
        Report {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            files: Vec::new(),
        }
    }

    /// Append the outcome of one file.
    pub fn push(&mut self, file: FileReport) {
        self.files.push(file);
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            files: self.files.len(),
            ..Default::default()
        };
        for file in &self.files {
            if file.is_changed() {
                summary.files_changed += 1;
            }
            if file.syntax_error.is_some() {
                summary.syntax_errors += 1;
            }
            summary.annotations += file.annotations.len();
            for record in &file.records {
                summary.conversions += 1;
                match record.confidence {
                    Confidence::Certain => summary.certain += 1,
                    Confidence::Heuristic => summary.heuristic += 1,
                }
            }
        }
        summary
    }

    /// Group conversions by shape, most frequent first, ties by name.
    pub fn changelog_lines(&self) -> Vec<ChangeLogEntry> {
        let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
        for record in self.files.iter().flat_map(|f| &f.records) {
            *counts
                .entry((&record.original_syntax, &record.converted_syntax))
                .or_default() += 1;
        }
        let mut entries: Vec<ChangeLogEntry> = counts
            .into_iter()
            .map(|((original, converted), count)| ChangeLogEntry {
                original_syntax: original.to_string(),
                converted_syntax: converted.to_string(),
                count,
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count));
        entries
    }

    /// All edits across files, for diff rendering.
    pub fn edits(&self) -> Vec<OutputEdit> {
        self.files.iter().flat_map(|f| f.edits.clone()).collect()
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
