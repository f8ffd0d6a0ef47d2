//! Runtime facts observed while running the instrumented test suite.
//!
//! A fact is keyed by the source location of the expression it was observed
//! on (project-relative path, 1-indexed line and column of the expression's
//! first byte) plus a [`FactKind`]. Several facts may share a location.
//!
//! The table is produced once by the dynamic analyzer and is read-only
//! afterwards. When dynamic analysis is skipped the table is simply empty.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Locations
// ============================================================================

/// A position in a project file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Project-relative path with forward slashes.
    pub path: String,
    /// 1-indexed line.
    pub line: u32,
    /// 1-indexed byte column.
    pub column: u32,
}

impl SourceLocation {
    pub fn new(path: impl Into<String>, line: u32, column: u32) -> Self {
        SourceLocation {
            path: path.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.line, self.column)
    }
}

// ============================================================================
// Facts
// ============================================================================

/// What was observed about an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    /// Classification of the evaluated object, see [`ReceiverKind`].
    ReceiverKind,
    /// Name of the module that owns the object's `stub` method.
    StubOwner,
    /// Whether the object is an `Enumerable`.
    Enumerable,
    /// Whether the object responds to the given message.
    RespondsTo(String),
}

impl FactKind {
    /// Short label used in logs and in the instrumentation helper.
    pub fn label(&self) -> &'static str {
        match self {
            FactKind::ReceiverKind => "receiver_kind",
            FactKind::StubOwner => "stub_owner",
            FactKind::Enumerable => "enumerable",
            FactKind::RespondsTo(_) => "responds_to",
        }
    }
}

/// An observed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Bool(bool),
    Text(String),
}

impl FactValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FactValue::Bool(b) => Some(*b),
            FactValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FactValue::Text(s) => Some(s),
            FactValue::Bool(_) => None,
        }
    }
}

/// Runtime classification of an object, as reported by the observation helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverKind {
    /// `double`, `mock`, `stub('name')`.
    PlainDouble,
    /// `instance_double`, `class_double`, `object_double`.
    VerifyingDouble,
    /// The recorder returned by `Klass.any_instance`.
    AnyInstanceRecorder,
    /// A `Proc` or lambda.
    Proc,
    /// Any other object (a partial double once stubbed).
    Object,
}

impl ReceiverKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "plain_double" => Some(ReceiverKind::PlainDouble),
            "verifying_double" => Some(ReceiverKind::VerifyingDouble),
            "any_instance_recorder" => Some(ReceiverKind::AnyInstanceRecorder),
            "proc" => Some(ReceiverKind::Proc),
            "object" => Some(ReceiverKind::Object),
            _ => None,
        }
    }
}

/// A single observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeFact {
    pub location: SourceLocation,
    pub kind: FactKind,
    pub value: FactValue,
}

// ============================================================================
// Fact Table
// ============================================================================

/// Location-indexed facts from one instrumented run.
#[derive(Debug, Clone, Default)]
pub struct RuntimeFactTable {
    facts: HashMap<SourceLocation, Vec<RuntimeFact>>,
}

impl RuntimeFactTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fact. A later fact of the same kind at the same location
    /// replaces the earlier one.
    pub fn insert(&mut self, fact: RuntimeFact) {
        let entry = self.facts.entry(fact.location.clone()).or_default();
        entry.retain(|f| f.kind != fact.kind);
        entry.push(fact);
    }

    /// All facts at a location; empty if none were observed.
    pub fn at(&self, location: &SourceLocation) -> &[RuntimeFact] {
        self.facts.get(location).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The value of one kind of fact at a location.
    pub fn value(&self, location: &SourceLocation, kind: &FactKind) -> Option<&FactValue> {
        self.at(location)
            .iter()
            .find(|f| &f.kind == kind)
            .map(|f| &f.value)
    }

    /// Total number of facts.
    pub fn len(&self) -> usize {
        self.facts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<RuntimeFact> for RuntimeFactTable {
    fn from_iter<I: IntoIterator<Item = RuntimeFact>>(iter: I) -> Self {
        let mut table = RuntimeFactTable::new();
        for fact in iter {
            table.insert(fact);
        }
        table
    }
}

// ============================================================================
// Tests
// ============================================================================
