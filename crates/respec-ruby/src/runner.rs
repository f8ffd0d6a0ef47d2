//! End-to-end run: load, analyze, convert, report, and optionally write.

use std::path::PathBuf;

use tracing::{info, warn};

use respec_core::diff::file_diff;
use respec_core::error::RespecError;
use respec_core::patch::{ContentHash, OutputEdit};
use respec_core::report::Report;

use crate::analyzer::{analyze, AnalysisOptions};
use crate::config::ConversionConfig;
use crate::converter::Converter;
use crate::suite::Suite;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub project_root: PathBuf,
    /// Files to convert, absolute or relative to `project_root`.
    pub paths: Vec<PathBuf>,
    pub dry_run: bool,
    pub conversion: ConversionConfig,
    pub analysis: AnalysisOptions,
}

/// A file whose text changes.
#[derive(Debug, Clone)]
pub struct ConvertedFile {
    pub path: String,
    pub abs_path: PathBuf,
    pub original: String,
    pub original_hash: ContentHash,
    pub new_text: String,
    pub edits: Vec<OutputEdit>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub report: Report,
    /// Changed files only.
    pub files: Vec<ConvertedFile>,
    pub dry_run: bool,
}

impl RunOutcome {
    /// Write every changed file. All files are checked against the hash taken
    /// when they were loaded before the first one is written; a file edited
    /// in the meantime aborts the write. Returns the number of files written.
    pub fn write(&self) -> Result<usize, RespecError> {
        if self.dry_run {
            return Ok(0);
        }
        for file in &self.files {
            let current = std::fs::read(&file.abs_path).map_err(|e| {
                RespecError::apply(format!("cannot re-read file: {}", e), Some(file.path.clone()))
            })?;
            if ContentHash::compute(&current) != file.original_hash {
                return Err(RespecError::apply(
                    "file changed on disk since it was read",
                    Some(file.path.clone()),
                ));
            }
        }
        for file in &self.files {
            std::fs::write(&file.abs_path, &file.new_text).map_err(|e| {
                RespecError::apply(format!("cannot write file: {}", e), Some(file.path.clone()))
            })?;
            info!(file = %file.path, edits = file.edits.len(), "written");
        }
        Ok(self.files.len())
    }

    /// Unified diff of every changed file.
    pub fn diff(&self) -> String {
        self.files
            .iter()
            .map(|f| file_diff(&f.path, &f.original, &f.edits))
            .collect()
    }
}

/// Run the whole pipeline. A failed dynamic analysis returns before any
/// file is converted.
pub fn run(options: &RunOptions) -> Result<RunOutcome, RespecError> {
    options.conversion.validate()?;

    let mut suite = Suite::load(&options.project_root, &options.paths)?;
    suite.analyze();

    if options.analysis.skip {
        warn!("dynamic analysis skipped; constructs that need runtime facts stay unconverted");
    } else {
        let facts = analyze(&suite, &options.analysis)?;
        suite.attach_facts(facts);
    }

    let converter = Converter::new(&suite, &options.conversion);
    let conversions = converter.convert_all()?;

    let mut report = Report::new();
    let mut files = Vec::new();
    for (conversion, source) in conversions.iter().zip(suite.files()) {
        report.push(conversion.to_report());
        if conversion.is_changed() {
            files.push(ConvertedFile {
                path: conversion.path.clone(),
                abs_path: source.abs_path().to_path_buf(),
                original: source.text().to_string(),
                original_hash: source.hash().clone(),
                new_text: conversion.new_text.clone(),
                edits: conversion.edits.clone(),
            });
        }
    }

    let summary = report.summary();
    info!(
        files = summary.files,
        changed = summary.files_changed,
        conversions = summary.conversions,
        annotations = summary.annotations,
        syntax_errors = summary.syntax_errors,
        "run complete"
    );

    Ok(RunOutcome {
        report,
        files,
        dry_run: options.dry_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, text) in files {
            let full = dir.path().join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, text).unwrap();
        }
        dir
    }

    fn options(dir: &TempDir, paths: &[&str]) -> RunOptions {
        RunOptions {
            project_root: dir.path().to_path_buf(),
            paths: paths.iter().map(PathBuf::from).collect(),
            dry_run: false,
            conversion: ConversionConfig::default(),
            analysis: AnalysisOptions {
                skip: true,
                ..Default::default()
            },
        }
    }

    #[test]
    fn writes_changed_files_only() {
        let dir = project(&[
            ("spec/a_spec.rb", "it { x.should be_true }\n"),
            ("spec/b_spec.rb", "it { expect(x).to eq(1) }\n"),
        ]);
        let outcome = run(&options(&dir, &["spec/a_spec.rb", "spec/b_spec.rb"])).unwrap();
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.write().unwrap(), 1);
        let a = std::fs::read_to_string(dir.path().join("spec/a_spec.rb")).unwrap();
        assert_eq!(a, "it { expect(x).to be_truthy }\n");
        assert!(outcome.diff().contains("+it { expect(x).to be_truthy }"));
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = project(&[("spec/a_spec.rb", "it { x.should be_true }\n")]);
        let mut opts = options(&dir, &["spec/a_spec.rb"]);
        opts.dry_run = true;
        let outcome = run(&opts).unwrap();
        assert_eq!(outcome.write().unwrap(), 0);
        let a = std::fs::read_to_string(dir.path().join("spec/a_spec.rb")).unwrap();
        assert_eq!(a, "it { x.should be_true }\n");
        assert_eq!(outcome.report.summary().files_changed, 1);
    }

    #[test]
    fn concurrent_edit_aborts_write() {
        let dir = project(&[("spec/a_spec.rb", "it { x.should be_true }\n")]);
        let outcome = run(&options(&dir, &["spec/a_spec.rb"])).unwrap();
        std::fs::write(dir.path().join("spec/a_spec.rb"), "# edited\n").unwrap();
        let err = outcome.write().unwrap_err();
        assert_eq!(err.error_code().code(), 4);
        let a = std::fs::read_to_string(dir.path().join("spec/a_spec.rb")).unwrap();
        assert_eq!(a, "# edited\n");
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let dir = project(&[("spec/a_spec.rb", "it { }\n")]);
        let mut opts = options(&dir, &["spec/a_spec.rb"]);
        opts.conversion.conversions.insert("nonsense".into(), true);
        let err = run(&opts).unwrap_err();
        assert_eq!(err.error_code().code(), 2);
    }
}
