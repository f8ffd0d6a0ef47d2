//! The set of files being converted, with everything known about them.
//!
//! Each file is read, hashed, parsed and scanned for constructs exactly once.
//! The static context and the runtime fact table are attached afterwards and
//! stay immutable for the rest of the run.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use respec_core::error::RespecError;
use respec_core::facts::{RuntimeFact, RuntimeFactTable, SourceLocation};
use respec_core::patch::ContentHash;

use crate::context::StaticContext;
use crate::parser::{parse, ParsedSource, SyntaxError};
use crate::syntax::{scan, ConstructInstance};

// ============================================================================
// Source Files
// ============================================================================

/// One Ruby file of the suite.
#[derive(Debug)]
pub struct SourceFile {
    path: String,
    abs_path: PathBuf,
    text: String,
    hash: ContentHash,
    parsed: Result<ParsedSource, SyntaxError>,
    instances: Vec<ConstructInstance>,
}

impl SourceFile {
    /// Build from raw bytes; invalid UTF-8 is reported like a syntax error.
    pub fn from_bytes(path: impl Into<String>, abs_path: PathBuf, bytes: Vec<u8>) -> Self {
        let path = path.into();
        let hash = ContentHash::compute(&bytes);
        let (text, parsed) = match String::from_utf8(bytes) {
            Ok(text) => {
                let parsed = parse(&text);
                (text, parsed)
            }
            Err(err) => {
                let valid = err.utf8_error().valid_up_to();
                let bytes = err.into_bytes();
                let prefix = String::from_utf8_lossy(&bytes[..valid]);
                let line = prefix.matches('\n').count() as u32 + 1;
                let column = prefix.rsplit('\n').next().map(str::len).unwrap_or(0) as u32 + 1;
                let error = SyntaxError {
                    line,
                    column,
                    message: "file is not valid UTF-8".to_string(),
                };
                (String::from_utf8_lossy(&bytes).into_owned(), Err(error))
            }
        };

        let instances = match &parsed {
            Ok(parsed) => scan(parsed),
            Err(err) => {
                warn!(file = %path, error = %err, "file does not parse; it will be left untouched");
                Vec::new()
            }
        };
        debug!(file = %path, constructs = instances.len(), "scanned");

        SourceFile {
            path,
            abs_path,
            text,
            hash,
            parsed,
            instances,
        }
    }

    /// Project-relative path with forward slashes.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn abs_path(&self) -> &Path {
        &self.abs_path
    }

    /// Original text as loaded.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    pub fn parsed(&self) -> Result<&ParsedSource, &SyntaxError> {
        self.parsed.as_ref()
    }

    pub fn syntax_error(&self) -> Option<&SyntaxError> {
        self.parsed.as_ref().err()
    }

    /// Construct instances in pre-order.
    pub fn instances(&self) -> &[ConstructInstance] {
        &self.instances
    }
}

// ============================================================================
// Suite
// ============================================================================

#[derive(Debug)]
pub struct Suite {
    root: PathBuf,
    files: Vec<SourceFile>,
    statics: StaticContext,
    facts: RuntimeFactTable,
}

/// Project-relative path with forward slashes.
pub fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

impl Suite {
    /// Read and parse every file. `paths` may be absolute or relative to
    /// `root`; relative report paths are always computed against `root`.
    pub fn load(root: &Path, paths: &[PathBuf]) -> Result<Suite, RespecError> {
        let root = root.canonicalize().map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => RespecError::file_not_found(root.display().to_string()),
            _ => RespecError::from(err),
        })?;

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let joined = if path.is_absolute() {
                path.clone()
            } else {
                root.join(path)
            };
            let abs_path = joined.canonicalize().unwrap_or(joined);
            let bytes = std::fs::read(&abs_path).map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => {
                    RespecError::file_not_found(abs_path.display().to_string())
                }
                _ => RespecError::from(err),
            })?;
            let rel = relative_path(&root, &abs_path);
            files.push(SourceFile::from_bytes(rel, abs_path, bytes));
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));

        info!(
            files = files.len(),
            syntax_errors = files.iter().filter(|f| f.syntax_error().is_some()).count(),
            "suite loaded"
        );
        Ok(Suite {
            root,
            files,
            statics: StaticContext::default(),
            facts: RuntimeFactTable::new(),
        })
    }

    /// In-memory suite of `(relative path, text)` pairs.
    pub fn from_sources(sources: Vec<(String, String)>) -> Suite {
        let files = sources
            .into_iter()
            .map(|(path, text)| {
                let abs = PathBuf::from(&path);
                SourceFile::from_bytes(path, abs, text.into_bytes())
            })
            .collect();
        Suite {
            root: PathBuf::from("."),
            files,
            statics: StaticContext::default(),
            facts: RuntimeFactTable::new(),
        }
    }

    /// Static collection pass over every parsed file.
    pub fn analyze(&mut self) {
        self.statics = StaticContext::collect(
            self.files
                .iter()
                .filter_map(|f| f.parsed.as_ref().ok().map(|p| (f.path.as_str(), p))),
        );
    }

    /// Attach the runtime fact table from dynamic analysis.
    pub fn attach_facts(&mut self, facts: RuntimeFactTable) {
        info!(facts = facts.len(), "runtime facts attached");
        self.facts = facts;
    }

    /// Facts observed at a location; empty when analysis was skipped.
    pub fn facts_at(&self, location: &SourceLocation) -> &[RuntimeFact] {
        self.facts.at(location)
    }

    pub fn facts(&self) -> &RuntimeFactTable {
        &self.facts
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn file(&self, path: &str) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn static_context(&self) -> &StaticContext {
        &self.statics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use respec_core::facts::{FactKind, FactValue};
    use tempfile::TempDir;

    #[test]
    fn load_reads_and_parses_relative_to_root() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("spec")).unwrap();
        std::fs::write(dir.path().join("spec/a_spec.rb"), "it { x.should be_true }\n").unwrap();
        std::fs::write(dir.path().join("spec/b_spec.rb"), "it { x.should ==\n").unwrap();

        let suite = Suite::load(
            dir.path(),
            &[PathBuf::from("spec/b_spec.rb"), dir.path().join("spec/a_spec.rb")],
        )
        .unwrap();
        let paths: Vec<&str> = suite.files().iter().map(|f| f.path()).collect();
        assert_eq!(paths, vec!["spec/a_spec.rb", "spec/b_spec.rb"]);
        assert!(suite.files()[0].syntax_error().is_none());
        assert!(!suite.files()[0].instances().is_empty());
        assert!(suite.files()[1].syntax_error().is_some());
        assert!(suite.files()[1].instances().is_empty());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = Suite::load(dir.path(), &[PathBuf::from("spec/nope_spec.rb")]).unwrap_err();
        assert_eq!(err.error_code().code(), 3);
    }

    #[test]
    fn invalid_utf8_is_a_syntax_error() {
        let file = SourceFile::from_bytes("spec/x.rb", PathBuf::from("spec/x.rb"), b"ok\n\xff".to_vec());
        let err = file.syntax_error().unwrap();
        assert_eq!((err.line, err.column), (2, 1));
    }

    #[test]
    fn facts_are_empty_until_attached() {
        let mut suite = Suite::from_sources(vec![("spec/a.rb".into(), "x\n".into())]);
        let loc = SourceLocation::new("spec/a.rb", 1, 1);
        assert!(suite.facts_at(&loc).is_empty());

        let table: RuntimeFactTable = vec![RuntimeFact {
            location: loc.clone(),
            kind: FactKind::Enumerable,
            value: FactValue::Bool(true),
        }]
        .into_iter()
        .collect();
        suite.attach_facts(table);
        assert_eq!(suite.facts_at(&loc).len(), 1);
    }
}
