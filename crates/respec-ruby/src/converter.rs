//! Per-file conversion: decide every construct instance, collect a
//! conflict-free set of replacements, and apply them.
//!
//! Instances are decided in arena order, which is outer before inner. A
//! conversion whose replacements overlap ones already accepted in the same
//! file is kept out and reported as ambiguous instead.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use respec_core::error::RespecError;
use respec_core::patch::{apply_rewrites, find_overlap, materialize, OutputEdit, Replacement};
use respec_core::report::{Annotation, ConversionRecord, FileReport, SyntaxErrorInfo};

use crate::config::ConversionConfig;
use crate::suite::{SourceFile, Suite};
use crate::syntax::{decide, DecideContext, Decision};

/// Lifecycle of one file through the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Idle,
    Parsed,
    Converting,
    Done,
    SyntaxErrorHalted,
}

/// Result of converting one file.
#[derive(Debug, Clone)]
pub struct FileConversion {
    pub path: String,
    pub state: FileState,
    /// Rewritten text; equal to the original when nothing changed.
    pub new_text: String,
    pub records: Vec<ConversionRecord>,
    pub annotations: Vec<Annotation>,
    pub edits: Vec<OutputEdit>,
    pub syntax_error: Option<SyntaxErrorInfo>,
}

impl FileConversion {
    pub fn is_changed(&self) -> bool {
        !self.edits.is_empty()
    }

    pub fn to_report(&self) -> FileReport {
        FileReport {
            path: self.path.clone(),
            records: self.records.clone(),
            annotations: self.annotations.clone(),
            syntax_error: self.syntax_error.clone(),
            edits: self.edits.clone(),
        }
    }
}

pub struct Converter<'a> {
    suite: &'a Suite,
    config: &'a ConversionConfig,
}

impl<'a> Converter<'a> {
    pub fn new(suite: &'a Suite, config: &'a ConversionConfig) -> Self {
        Converter { suite, config }
    }

    /// Convert every file of the suite. A syntax error only halts its own
    /// file; an internal invariant failure aborts everything.
    pub fn convert_all(&self) -> Result<Vec<FileConversion>, RespecError> {
        let conversions = self
            .suite
            .files()
            .iter()
            .map(|file| self.convert_file(file))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            files = conversions.len(),
            changed = conversions.iter().filter(|c| c.is_changed()).count(),
            "conversion finished"
        );
        Ok(conversions)
    }

    pub fn convert_file(&self, file: &SourceFile) -> Result<FileConversion, RespecError> {
        let mut conversion = FileConversion {
            path: file.path().to_string(),
            state: FileState::Idle,
            new_text: file.text().to_string(),
            records: Vec::new(),
            annotations: Vec::new(),
            edits: Vec::new(),
            syntax_error: None,
        };

        if let Some(err) = file.syntax_error() {
            conversion.state = FileState::SyntaxErrorHalted;
            conversion.syntax_error = Some(SyntaxErrorInfo {
                line: err.line,
                column: err.column,
                message: err.message.clone(),
            });
            return Ok(conversion);
        }
        conversion.state = FileState::Parsed;

        conversion.state = FileState::Converting;
        let instances = file.instances();
        let mut decisions: Vec<Option<Decision>> = vec![None; instances.len()];
        let mut accepted: Vec<Replacement> = Vec::new();

        for instance in instances {
            let decision = if !self.config.is_enabled(instance.kind) {
                Decision::Unsupported
            } else {
                let ctx = DecideContext {
                    suite: self.suite,
                    path: file.path(),
                    text: file.text(),
                    instances,
                    decisions: &decisions,
                    config: self.config,
                };
                decide(instance, &ctx)
            };

            let decision = match decision {
                Decision::Conversion(c)
                    if c.replacements.iter().any(|r| {
                        accepted.iter().any(|a| a.span.overlaps(&r.span))
                    }) =>
                {
                    Decision::ambiguous("nested inside a construct that is already being rewritten")
                }
                other => other,
            };

            match &decision {
                Decision::Conversion(c) => {
                    debug!(
                        file = file.path(),
                        line = instance.line,
                        kind = %instance.kind,
                        confidence = %c.confidence,
                        "converted"
                    );
                    accepted.extend(c.replacements.iter().cloned());
                    conversion.records.push(ConversionRecord {
                        kind: instance.kind.name().to_string(),
                        line: instance.line,
                        column: instance.column,
                        original_syntax: c.original_syntax.clone(),
                        converted_syntax: c.converted_syntax.clone(),
                        confidence: c.confidence,
                    });
                }
                Decision::Ambiguous(reason) => {
                    warn!(
                        file = file.path(),
                        line = instance.line,
                        kind = %instance.kind,
                        reason = %reason,
                        "left unconverted"
                    );
                    conversion.annotations.push(Annotation {
                        kind: instance.kind.name().to_string(),
                        line: instance.line,
                        column: instance.column,
                        reason: reason.clone(),
                    });
                }
                Decision::Unsupported => {}
            }
            decisions[instance.id] = Some(decision);
        }

        debug_assert!(
            find_overlap(&accepted).is_none(),
            "overlapping replacements accepted in {}",
            file.path()
        );
        conversion.new_text = match apply_rewrites(file.text(), &accepted) {
            Ok(text) => text,
            Err(err) => {
                error!(file = file.path(), error = %err, "rewrite invariant violated");
                return Err(RespecError::internal(format!(
                    "rewrite invariant violated in {}: {}",
                    file.path(),
                    err
                )));
            }
        };
        conversion.edits = materialize(file.path(), file.text(), &accepted);
        conversion.state = FileState::Done;
        Ok(conversion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BooleanMatcher, NegativeForm};
    use crate::syntax::ConstructKind;

    fn convert_with(src: &str, config: &ConversionConfig) -> FileConversion {
        let mut suite = Suite::from_sources(vec![("spec/a_spec.rb".into(), src.into())]);
        suite.analyze();
        let converter = Converter::new(&suite, config);
        converter.convert_file(&suite.files()[0]).unwrap()
    }

    fn convert(src: &str) -> FileConversion {
        convert_with(src, &ConversionConfig::default())
    }

    #[test]
    fn operator_and_should() {
        let out = convert("it { foo.should == 1 }\n");
        assert_eq!(out.new_text, "it { expect(foo).to eq(1) }\n");
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.state, FileState::Done);
    }

    #[test]
    fn operator_comparisons_and_match() {
        let out = convert("it do\n  x.should < 3\n  y.should_not =~ /ab/\n  z.should =~ [1, 2]\nend\n");
        assert_eq!(
            out.new_text,
            "it do\n  expect(x).to be < 3\n  expect(y).not_to match(/ab/)\n  expect(z).to match_array([1, 2])\nend\n"
        );
    }

    #[test]
    fn unknown_match_operand_leaves_both_alone() {
        let out = convert("it { x.should =~ other }\n");
        assert_eq!(out.new_text, "it { x.should =~ other }\n");
        let kinds: Vec<&str> = out.annotations.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(kinds, vec!["operator_matcher", "should"]);
    }

    #[test]
    fn negative_form_is_configurable() {
        let config = ConversionConfig {
            negative_form: NegativeForm::ToNot,
            ..Default::default()
        };
        let out = convert_with("it { foo.should_not be_nil }\n", &config);
        assert_eq!(out.new_text, "it { expect(foo).to_not be_nil }\n");
    }

    #[test]
    fn one_liner_and_lambda() {
        let src = "it { should be_valid }\nit { lambda { go }.should raise_error }\n";
        let out = convert(src);
        assert_eq!(
            out.new_text,
            "it { is_expected.to be_valid }\nit { expect { go }.to raise_error }\n"
        );
    }

    #[test]
    fn block_matcher_on_variable_needs_a_fact() {
        let out = convert("it { action.should raise_error }\n");
        assert_eq!(out.new_text, "it { action.should raise_error }\n");
        assert_eq!(out.annotations.len(), 1);
    }

    #[test]
    fn boolean_matchers() {
        let out = convert("it { x.should be_true; y.should be_false }\n");
        assert_eq!(out.new_text, "it { expect(x).to be_truthy; expect(y).to be_falsey }\n");

        let config = ConversionConfig {
            boolean_matcher: BooleanMatcher::TrueFalse,
            ..Default::default()
        };
        let out = convert_with("it { expect(x).to be_true }\n", &config);
        assert_eq!(out.new_text, "it { expect(x).to be true }\n");
    }

    #[test]
    fn message_expectations_and_stubs() {
        let src = "\
it do
  Foo.any_instance.should_receive(:bar).and_return(1)
  Foo.stub(:baz)
  Foo.stub(:qux => 2)
  Foo.stub_chain(:a, :b)
  Foo.any_instance.stub(:c)
end
";
        let out = convert(src);
        assert_eq!(
            out.new_text,
            "\
it do
  expect_any_instance_of(Foo).to receive(:bar).and_return(1)
  allow(Foo).to receive(:baz)
  allow(Foo).to receive(:qux).and_return(2)
  allow(Foo).to receive_message_chain(:a, :b)
  allow_any_instance_of(Foo).to receive(:c)
end
"
        );
    }

    #[test]
    fn doubles_and_have_items() {
        let src = "\
it do
  a = mock('a')
  list.should have(2).items
  expect(list).to have_at_least(1).items
end
";
        let out = convert(src);
        assert_eq!(
            out.new_text,
            "\
it do
  a = double('a')
  expect(list.size).to eq(2)
  expect(list.size).to be >= 1
end
"
        );
    }

    #[test]
    fn have_with_named_collection_needs_a_fact() {
        let out = convert("it { team.should have(3).players }\n");
        assert_eq!(out.new_text, "it { expect(team).to have(3).players }\n");
        assert_eq!(out.annotations.len(), 1);
        assert_eq!(out.annotations[0].kind, "have_items");
    }

    #[test]
    fn pending_and_current_example() {
        let src = "RSpec.describe Foo do\n  it 'x' do\n    pending\n    example.metadata\n  end\nend\n";
        let out = convert(src);
        assert_eq!(
            out.new_text,
            "RSpec.describe Foo do\n  it 'x' do\n    skip\n    RSpec.current_example.metadata\n  end\nend\n"
        );
    }

    #[test]
    fn local_example_bindings_are_never_rewritten() {
        let cases = [
            "it do\n  example ||= build(:x)\n  example.save\nend\n",
            "it do\n  example, other = pair\n  example.save\nend\n",
            "it do\n  go\nrescue => example\n  example.save\nend\n",
            "it do\n  for example in list\n    example.save\n  end\nend\n",
        ];
        for src in cases {
            let out = convert(src);
            assert_eq!(out.new_text, src);
            assert!(out.records.is_empty(), "converted: {}", src);
            let kinds: Vec<&str> = out.annotations.iter().map(|a| a.kind.as_str()).collect();
            assert_eq!(kinds, vec!["current_example"], "annotations for: {}", src);
        }

        let params = [
            "it do\n  list.each { |(example, i)| example.save }\nend\n",
            "it do\n  run = ->(example) { example.save }\nend\n",
            "RSpec.describe Foo do\n  def helper(example)\n    example.save\n  end\nend\n",
        ];
        for src in params {
            let out = convert(src);
            assert_eq!(out.new_text, src);
            assert!(out.records.is_empty() && out.annotations.is_empty(), "touched: {}", src);
        }
    }

    #[test]
    fn hash_stub_value_converts_on_its_own() {
        let out = convert("it { foo.stub(:a => mock('x')) }\n");
        assert_eq!(
            out.new_text,
            "it { allow(foo).to receive(:a).and_return(double('x')) }\n"
        );
        assert!(out.annotations.is_empty());
        let kinds: Vec<&str> = out.records.iter().map(|r| r.kind.as_str()).collect();
        assert_eq!(kinds, vec!["method_stub", "double"]);

        let out = convert("it { Foo.any_instance.stub({ b: mock('y') }) }\n");
        assert_eq!(
            out.new_text,
            "it { allow_any_instance_of(Foo).to receive(:b).and_return(double('y')) }\n"
        );
    }

    #[test]
    fn percent_literal_arrays_match_statically() {
        let out = convert("it do\n  x.should =~ %w(a b)\n  y.should =~ %i(a b)\nend\n");
        assert_eq!(
            out.new_text,
            "it do\n  expect(x).to match_array(%w(a b))\n  expect(y).to match_array(%i(a b))\nend\n"
        );
        assert!(out.annotations.is_empty());
    }

    #[test]
    fn one_liner_have_items_uses_subject() {
        let out = convert("it { should have(2).items }\nit { should_not have_at_most(1).items }\n");
        assert_eq!(
            out.new_text,
            "it { expect(subject.size).to eq(2) }\nit { expect(subject.size).not_to be <= 1 }\n"
        );
        assert!(out.annotations.is_empty());

        let out = convert("it { should have(2).players }\n");
        assert_eq!(out.new_text, "it { is_expected.to have(2).players }\n");
        assert_eq!(out.annotations.len(), 1);
        assert_eq!(out.annotations[0].kind, "have_items");
    }

    #[test]
    fn opt_in_conversions() {
        let src = "describe Foo do\n  before(:each) { }\nend\n";
        assert_eq!(convert(src).new_text, src);

        let mut config = ConversionConfig::default();
        config.set_enabled(ConstructKind::HookScope, true);
        config.set_enabled(ConstructKind::ExampleGroup, true);
        let out = convert_with(src, &config);
        assert_eq!(out.new_text, "RSpec.describe Foo do\n  before(:example) { }\nend\n");
    }

    #[test]
    fn disabled_kind_is_silent() {
        let mut config = ConversionConfig::default();
        config.set_enabled(ConstructKind::BeBoolean, false);
        let out = convert_with("it { x.should be_true }\n", &config);
        assert_eq!(out.new_text, "it { expect(x).to be_true }\n");
        assert!(out.annotations.is_empty());
    }

    #[test]
    fn mocha_projects_keep_their_mocks() {
        let src = "RSpec.configure { |c| c.mock_with :mocha }\nit { foo.stub(:bar); x = mock('x') }\n";
        let out = convert(src);
        assert_eq!(out.new_text, src);
        assert!(out.annotations.is_empty());
    }

    #[test]
    fn negative_raise_error_drops_class() {
        let out = convert("it { expect { go }.not_to raise_error(Boom) }\n");
        assert_eq!(out.new_text, "it { expect { go }.not_to raise_error }\n");
    }

    #[test]
    fn syntax_error_halts_the_file() {
        let out = convert("it { x.should ==\n");
        assert_eq!(out.state, FileState::SyntaxErrorHalted);
        assert!(out.syntax_error.is_some());
        assert!(out.edits.is_empty());
        assert_eq!(out.new_text, "it { x.should ==\n");
    }
}
