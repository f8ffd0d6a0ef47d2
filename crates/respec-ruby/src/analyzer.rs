//! Dynamic analysis: run the suite once, instrumented, to observe the runtime
//! facts static syntax cannot settle.
//!
//! Every expression some decision needs a fact about is wrapped in a call to
//! a small Ruby helper that records what it sees:
//!
//! ```ruby
//! RespecAnalysis.record((foo), [[3, :receiver_kind, nil]]).stub(:a => 1, :b => 2)
//! ```
//!
//! The instrumented files only ever exist in a sandbox copy of the project.
//! The helper is loaded through `SPEC_OPTS` and dumps its observations as
//! JSON at exit. An observation whose value differed between evaluations is marked
//! inconsistent and dropped, so the affected decisions fall back to
//! "ambiguous" rather than trusting one of the values.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use respec_core::error::RespecError;
use respec_core::facts::{FactKind, FactValue, RuntimeFact, RuntimeFactTable, SourceLocation};
use respec_core::patch::{apply_rewrites, Replacement, Span};
use respec_core::sandbox::{SandboxConfig, SandboxHandle};
use respec_core::text::byte_offset_to_position;

use crate::suite::Suite;

/// File name of the observation helper inside the sandbox metadata directory.
const HELPER_FILE: &str = "respec_analysis.rb";
/// File name of the JSON results inside the sandbox metadata directory.
const RESULTS_FILE: &str = "respec_analysis.json";
/// Environment variable telling the helper where to write results.
const OUTPUT_ENV: &str = "RESPEC_ANALYSIS_OUTPUT";

// ============================================================================
// Options and Errors
// ============================================================================

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Skip the instrumented run; decisions then see no runtime facts.
    pub skip: bool,
    /// Command used instead of `bundle exec rspec` / `rspec`.
    pub rspec_command: Option<String>,
    pub timeout: Duration,
    /// Keep the sandbox for inspection when the run fails.
    pub keep_sandbox: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            skip: false,
            rspec_command: None,
            timeout: Duration::from_secs(600),
            keep_sandbox: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("cannot prepare the analysis sandbox: {0}")]
    Sandbox(#[from] io::Error),

    #[error("`{command}` failed with {status}: {stderr_tail}")]
    CommandFailed {
        command: String,
        status: String,
        stderr_tail: String,
    },

    #[error("`{command}` did not finish within {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("`{0}` was not found on PATH")]
    CommandUnavailable(String),

    #[error("the instrumented run finished without writing {0}")]
    MissingResults(String),

    #[error("cannot read analysis results: {0}")]
    InvalidResults(String),

    #[error("cannot instrument {file}: {message}")]
    Instrumentation { file: String, message: String },
}

impl From<AnalysisError> for RespecError {
    fn from(err: AnalysisError) -> Self {
        RespecError::analysis(err.to_string())
    }
}

// ============================================================================
// Observations
// ============================================================================

/// One fact to observe on one expression.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Observation {
    id: usize,
    kind: FactKind,
}

/// An expression wrapped with one or more observations.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ObservedTarget {
    span: Span,
    location: SourceLocation,
    observations: Vec<Observation>,
}

/// Observation targets per file path.
#[derive(Debug, Default)]
struct ObservationPlan {
    files: BTreeMap<String, Vec<ObservedTarget>>,
    by_id: BTreeMap<usize, (SourceLocation, FactKind)>,
}

impl ObservationPlan {
    fn build(suite: &Suite) -> Self {
        let mut plan = ObservationPlan::default();
        let mut next_id = 1;
        for file in suite.files() {
            if file.syntax_error().is_some() {
                continue;
            }
            let mut targets: BTreeMap<(usize, usize), ObservedTarget> = BTreeMap::new();
            for instance in file.instances() {
                for request in instance.fact_requests() {
                    let target = targets
                        .entry((request.span.start, request.span.end))
                        .or_insert_with(|| {
                            let (line, column) =
                                byte_offset_to_position(file.text().as_bytes(), request.span.start);
                            ObservedTarget {
                                span: request.span,
                                location: SourceLocation::new(file.path(), line, column),
                                observations: Vec::new(),
                            }
                        });
                    if target.observations.iter().any(|p| p.kind == request.kind) {
                        continue;
                    }
                    plan.by_id
                        .insert(next_id, (target.location.clone(), request.kind.clone()));
                    target.observations.push(Observation {
                        id: next_id,
                        kind: request.kind,
                    });
                    next_id += 1;
                }
            }
            if !targets.is_empty() {
                plan.files
                    .insert(file.path().to_string(), targets.into_values().collect());
            }
        }
        plan
    }

    fn observation_count(&self) -> usize {
        self.by_id.len()
    }
}

fn observation_list(observations: &[Observation]) -> String {
    let mut out = String::from("[");
    for (i, observation) in observations.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let arg = match &observation.kind {
            FactKind::RespondsTo(message) => format!("{:?}", message),
            _ => "nil".to_string(),
        };
        let _ = write!(out, "[{}, :{}, {}]", observation.id, observation.kind.label(), arg);
    }
    out.push(']');
    out
}

/// Insertions that wrap every target, ordered so that nested targets nest:
/// closings before openings at one offset, outer openings first, inner
/// closings first.
fn instrumentation(targets: &[ObservedTarget]) -> Vec<Replacement> {
    // (offset, 0 = closing / 1 = opening, tie-break, text)
    let mut events: Vec<(usize, u8, usize, String)> = Vec::new();
    for target in targets {
        events.push((
            target.span.start,
            1,
            usize::MAX - target.span.end,
            "RespecAnalysis.record((".to_string(),
        ));
        events.push((
            target.span.end,
            0,
            usize::MAX - target.span.start,
            format!("), {})", observation_list(&target.observations)),
        ));
    }
    events.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
    events
        .into_iter()
        .map(|(offset, _, _, text)| Replacement::insert(offset, text))
        .collect()
}

// ============================================================================
// Ruby Helper
// ============================================================================

const HELPER: &str = r#"# Loaded by respec for dynamic analysis. Not part of the project.
require 'json'

module RespecAnalysis
  KERNEL_CLASS = Kernel.instance_method(:class)
  KERNEL_METHOD = Kernel.instance_method(:method)

  @results = {}

  class << self
    attr_reader :results

    def record(value, checks)
      checks.each do |id, kind, arg|
        observed = observe(value, kind, arg)
        entry = @results[id]
        if entry.nil?
          @results[id] = { 'id' => id, 'value' => observed, 'consistent' => true }
        elsif entry['value'] != observed
          entry['consistent'] = false
        end
      end
      value
    end

    def observe(value, kind, arg)
      case kind
      when :receiver_kind then receiver_kind(value)
      when :stub_owner then KERNEL_METHOD.bind(value).call(:stub).owner.to_s
      when :enumerable then Enumerable === value
      when :responds_to then value.respond_to?(arg)
      end
    rescue StandardError, NotImplementedError
      nil
    end

    def receiver_kind(value)
      name = KERNEL_CLASS.bind(value).call.name.to_s
      if name.start_with?('RSpec::Mocks::AnyInstance')
        'any_instance_recorder'
      elsif name.start_with?('RSpec::Mocks::') && name.include?('Verifying')
        'verifying_double'
      elsif name.start_with?('RSpec::Mocks::')
        'plain_double'
      elsif Proc === value
        'proc'
      else
        'object'
      end
    end
  end
end

at_exit do
  path = ENV['RESPEC_ANALYSIS_OUTPUT']
  if path
    File.open(path, 'w') do |f|
      f.write(JSON.generate('observations' => RespecAnalysis.results.values))
    end
  end
end
"#;

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Deserialize)]
struct ObservationResults {
    observations: Vec<ObservationResult>,
}

#[derive(Debug, Deserialize)]
struct ObservationResult {
    id: usize,
    #[serde(default)]
    value: Option<FactValue>,
    #[serde(default = "consistent_default")]
    consistent: bool,
}

fn consistent_default() -> bool {
    true
}

fn facts_from_results(plan: &ObservationPlan, json: &str) -> Result<RuntimeFactTable, AnalysisError> {
    let results: ObservationResults =
        serde_json::from_str(json).map_err(|e| AnalysisError::InvalidResults(e.to_string()))?;
    let mut table = RuntimeFactTable::new();
    let mut inconsistent = 0;
    for result in results.observations {
        let Some((location, kind)) = plan.by_id.get(&result.id) else {
            warn!(id = result.id, "result for an unknown observation ignored");
            continue;
        };
        if !result.consistent {
            inconsistent += 1;
            debug!(location = %location, kind = kind.label(), "inconsistent observation dropped");
            continue;
        }
        if let Some(value) = result.value {
            table.insert(RuntimeFact {
                location: location.clone(),
                kind: kind.clone(),
                value,
            });
        }
    }
    if inconsistent > 0 {
        info!(inconsistent, "observations with values that changed between evaluations were dropped");
    }
    Ok(table)
}

// ============================================================================
// Command
// ============================================================================

fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

fn base_command(workspace: &Path, options: &AnalysisOptions) -> Result<String, AnalysisError> {
    if let Some(command) = &options.rspec_command {
        return Ok(command.clone());
    }
    if workspace.join("Gemfile").exists() {
        which::which("bundle").map_err(|_| AnalysisError::CommandUnavailable("bundle".into()))?;
        Ok("bundle exec rspec".to_string())
    } else {
        which::which("rspec").map_err(|_| AnalysisError::CommandUnavailable("rspec".into()))?;
        Ok("rspec".to_string())
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Run the instrumented suite and collect runtime facts.
pub fn analyze(suite: &Suite, options: &AnalysisOptions) -> Result<RuntimeFactTable, AnalysisError> {
    let plan = ObservationPlan::build(suite);
    info!(
        observations = plan.observation_count(),
        files = plan.files.len(),
        "starting dynamic analysis"
    );

    let mut config = SandboxConfig::default().with_timeout(options.timeout);
    if options.keep_sandbox {
        config = config.keep_on_failure();
    }
    let sandbox = SandboxHandle::create(suite.root(), config)?;

    let outcome = run_in_sandbox(suite, &plan, &sandbox, options);
    if let Some(kept) = sandbox.dispose(outcome.is_err()) {
        info!(path = %kept.display(), "analysis sandbox kept");
    }
    outcome
}

fn run_in_sandbox(
    suite: &Suite,
    plan: &ObservationPlan,
    sandbox: &SandboxHandle,
    options: &AnalysisOptions,
) -> Result<RuntimeFactTable, AnalysisError> {
    let workspace = sandbox.workspace_dir();

    for file in suite.files() {
        let Some(targets) = plan.files.get(file.path()) else {
            continue;
        };
        let instrumented = apply_rewrites(file.text(), &instrumentation(targets))
            .map_err(|e| AnalysisError::Instrumentation {
                file: file.path().to_string(),
                message: e.to_string(),
            })?;
        let dest = workspace.join(file.path());
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&dest, instrumented)?;
        debug!(file = file.path(), targets = targets.len(), "instrumented");
    }

    let helper = sandbox.meta_dir().join(HELPER_FILE);
    let results = sandbox.meta_dir().join(RESULTS_FILE);
    std::fs::write(&helper, HELPER)?;

    let mut command = base_command(workspace, options)?;
    for file in suite.files() {
        command.push(' ');
        command.push_str(&shell_quote(file.path()));
    }
    let env = vec![
        (
            "SPEC_OPTS".to_string(),
            format!("-r {}", shell_quote(&helper.to_string_lossy())),
        ),
        (OUTPUT_ENV.to_string(), results.to_string_lossy().into_owned()),
    ];

    let result = sandbox.run_shell(&command, &env)?;
    info!(
        success = result.success,
        seconds = result.duration.as_secs_f64(),
        "instrumented run finished"
    );
    if result.timed_out {
        return Err(AnalysisError::Timeout {
            command,
            seconds: options.timeout.as_secs(),
        });
    }
    if !result.success {
        let status = result
            .exit_code
            .map(|c| format!("exit code {}", c))
            .unwrap_or_else(|| "a signal".to_string());
        return Err(AnalysisError::CommandFailed {
            command,
            status,
            stderr_tail: result.stderr_tail(10),
        });
    }

    let json = std::fs::read_to_string(&results)
        .map_err(|_| AnalysisError::MissingResults(RESULTS_FILE.to_string()))?;
    let table = facts_from_results(plan, &json)?;
    info!(facts = table.len(), "runtime facts collected");
    Ok(table)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn suite(src: &str) -> Suite {
        let mut suite = Suite::from_sources(vec![("spec/a_spec.rb".into(), src.into())]);
        suite.analyze();
        suite
    }

    #[test]
    fn plan_shares_targets_between_kinds() {
        let suite = suite("it { foo.stub(:a => 1, :b => 2) }\n");
        let plan = ObservationPlan::build(&suite);
        let targets = &plan.files["spec/a_spec.rb"];
        assert_eq!(targets.len(), 1);
        let kinds: Vec<&FactKind> = targets[0].observations.iter().map(|p| &p.kind).collect();
        assert_eq!(kinds, vec![&FactKind::StubOwner, &FactKind::ReceiverKind]);
        assert_eq!(targets[0].location, SourceLocation::new("spec/a_spec.rb", 1, 6));
    }

    #[test]
    fn instrumented_text_wraps_targets() {
        let src = "it { foo.stub(:a => 1, :b => 2) }\n";
        let suite = suite(src);
        let plan = ObservationPlan::build(&suite);
        let text = apply_rewrites(src, &instrumentation(&plan.files["spec/a_spec.rb"])).unwrap();
        assert_eq!(
            text,
            "it { RespecAnalysis.record((foo), [[1, :stub_owner, nil], [2, :receiver_kind, nil]])\
             .stub(:a => 1, :b => 2) }\n"
        );
    }

    #[test]
    fn nested_targets_nest() {
        let targets = vec![
            ObservedTarget {
                span: Span::new(0, 3),
                location: SourceLocation::new("a", 1, 1),
                observations: vec![Observation { id: 2, kind: FactKind::Enumerable }],
            },
            ObservedTarget {
                span: Span::new(0, 7),
                location: SourceLocation::new("a", 1, 1),
                observations: vec![Observation { id: 1, kind: FactKind::ReceiverKind }],
            },
        ];
        let text = apply_rewrites("foo.bar", &instrumentation(&targets)).unwrap();
        assert_eq!(
            text,
            "RespecAnalysis.record((RespecAnalysis.record((foo), [[2, :enumerable, nil]]).bar), \
             [[1, :receiver_kind, nil]])"
        );
    }

    #[test]
    fn responds_to_passes_the_message() {
        let list = observation_list(&[Observation {
            id: 4,
            kind: FactKind::RespondsTo("players".into()),
        }]);
        assert_eq!(list, "[[4, :responds_to, \"players\"]]");
    }

    #[test]
    fn results_drop_inconsistent_and_null_values() {
        let suite = suite("it { foo.stub(:a => 1, :b => 2) }\n");
        let plan = ObservationPlan::build(&suite);
        let json = r#"{"observations":[
            {"id":1,"value":null,"consistent":true},
            {"id":2,"value":"verifying_double","consistent":true},
            {"id":99,"value":true,"consistent":true}
        ]}"#;
        let table = facts_from_results(&plan, json).unwrap();
        assert_eq!(table.len(), 1);
        let loc = SourceLocation::new("spec/a_spec.rb", 1, 6);
        assert_eq!(
            table.value(&loc, &FactKind::ReceiverKind),
            Some(&FactValue::Text("verifying_double".into()))
        );

        let json = r#"{"observations":[{"id":2,"value":"plain_double","consistent":false}]}"#;
        assert!(facts_from_results(&plan, json).unwrap().is_empty());
    }

    #[test]
    fn malformed_results_are_errors() {
        let plan = ObservationPlan::default();
        let err = facts_from_results(&plan, "not json").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidResults(_)));
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("spec/a b.rb"), "'spec/a b.rb'");
        assert_eq!(shell_quote("it's.rb"), r"'it'\''s.rb'");
    }

    #[test]
    fn analysis_errors_map_to_exit_code_six() {
        let err = RespecError::from(AnalysisError::MissingResults("x".into()));
        assert_eq!(err.error_code().code(), 6);
    }
}
