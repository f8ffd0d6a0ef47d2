//! Pattern catalog: the closed set of RSpec 2 constructs respec recognizes.
//!
//! Each construct kind lives in its own module with three functions:
//! - `matches(node, env)`: typed view over a tree node, or `None`
//! - `fact_requests(view)`: runtime facts the decision may need
//! - `decide(instance, view, ctx)`: [`Decision`] for one instance
//!
//! [`scan`] walks a parsed file in pre-order and tries every kind at every
//! node in [`ConstructKind::ALL`] order. The first match wins for that node;
//! its children are still walked, so nested constructs are found outside-in
//! and the resulting arena is sorted by ascending start offset with parents
//! before their children.
//!
//! Matching never looks at configuration: disabled kinds are still
//! recognized, and the converter turns them into `Unsupported`.

pub mod be_boolean;
pub mod be_close;
pub mod current_example;
pub mod double;
pub mod example_group;
pub mod have_items;
pub mod hook_scope;
pub mod method_stub;
pub mod operator_matcher;
pub mod pending;
pub mod raise_error;
pub mod should;
pub mod should_receive;

use serde::{Deserialize, Serialize};
use std::fmt;
use tree_sitter::Node;

use respec_core::facts::{FactKind, FactValue, ReceiverKind, RuntimeFact, SourceLocation};
use respec_core::patch::{Replacement, Span};
use respec_core::report::Confidence;
use respec_core::text::{byte_offset_to_position, indentation_at};

use crate::config::ConversionConfig;
use crate::context::{MockFramework, StaticContext};
use crate::parser::{node_span, node_text, parameter_names, ParsedSource};
use crate::suite::Suite;

pub use be_boolean::BeBooleanView;
pub use be_close::BeCloseView;
pub use current_example::CurrentExampleView;
pub use double::{DoubleArg, DoubleView};
pub use example_group::ExampleGroupView;
pub use have_items::{Expectation, HaveItemsView, HaveKind};
pub use hook_scope::HookScopeView;
pub use method_stub::{MethodStubView, StubArgs, StubPair};
pub use operator_matcher::{OperandLiteral, OperatorMatcherView};
pub use pending::PendingView;
pub use raise_error::RaiseErrorView;
pub use should::{ShouldSubject, ShouldView};
pub use should_receive::ShouldReceiveView;

// ============================================================================
// Construct Kinds
// ============================================================================

/// Every construct respec knows how to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructKind {
    OperatorMatcher,
    Should,
    ShouldReceive,
    MethodStub,
    Double,
    HaveItems,
    BeBoolean,
    BeClose,
    RaiseError,
    Pending,
    HookScope,
    ExampleGroup,
    CurrentExample,
}

impl ConstructKind {
    /// All kinds, in matching priority order.
    pub const ALL: [ConstructKind; 13] = [
        ConstructKind::OperatorMatcher,
        ConstructKind::Should,
        ConstructKind::ShouldReceive,
        ConstructKind::MethodStub,
        ConstructKind::Double,
        ConstructKind::HaveItems,
        ConstructKind::BeBoolean,
        ConstructKind::BeClose,
        ConstructKind::RaiseError,
        ConstructKind::Pending,
        ConstructKind::HookScope,
        ConstructKind::ExampleGroup,
        ConstructKind::CurrentExample,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ConstructKind::OperatorMatcher => "operator_matcher",
            ConstructKind::Should => "should",
            ConstructKind::ShouldReceive => "should_receive",
            ConstructKind::MethodStub => "method_stub",
            ConstructKind::Double => "double",
            ConstructKind::HaveItems => "have_items",
            ConstructKind::BeBoolean => "be_boolean",
            ConstructKind::BeClose => "be_close",
            ConstructKind::RaiseError => "raise_error",
            ConstructKind::Pending => "pending",
            ConstructKind::HookScope => "hook_scope",
            ConstructKind::ExampleGroup => "example_group",
            ConstructKind::CurrentExample => "current_example",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        ConstructKind::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Conversions that change style rather than fix deprecations are opt-in.
    pub fn enabled_by_default(&self) -> bool {
        !matches!(self, ConstructKind::HookScope | ConstructKind::ExampleGroup)
    }

    /// The RSpec 3 forms this kind can produce.
    pub fn targets(&self) -> &'static [&'static str] {
        match self {
            ConstructKind::OperatorMatcher => &[
                "eq(expected)",
                "match(expected)",
                "match_array(expected)",
                "be === expected",
                "be < expected",
            ],
            ConstructKind::Should => &[
                "expect(obj).to",
                "expect(obj).not_to",
                "expect(obj).to_not",
                "expect { }.to",
                "expect(&proc).to",
                "is_expected.to",
            ],
            ConstructKind::ShouldReceive => &[
                "expect(obj).to receive(:message)",
                "expect_any_instance_of(Klass).to receive(:message)",
            ],
            ConstructKind::MethodStub => &[
                "allow(obj).to receive(:message)",
                "allow(obj).to receive(:message).and_return(value)",
                "allow(obj).to receive_messages(message: value)",
                "allow(obj).to receive_message_chain(:a, :b)",
                "allow_any_instance_of(Klass).to receive(:message)",
            ],
            ConstructKind::Double => &["double('name')"],
            ConstructKind::HaveItems => &[
                "expect(obj.size).to eq(n)",
                "expect(obj.items.size).to eq(n)",
                "expect(obj.size).to be >= n",
                "expect(obj.size).to be <= n",
            ],
            ConstructKind::BeBoolean => &["be_truthy", "be_falsey", "be_falsy", "be true", "be false"],
            ConstructKind::BeClose => &["be_within(delta).of(expected)"],
            ConstructKind::RaiseError => &["expect { }.not_to raise_error"],
            ConstructKind::Pending => &["skip"],
            ConstructKind::HookScope => &["before(:example)", "after(:context)"],
            ConstructKind::ExampleGroup => &["RSpec.describe"],
            ConstructKind::CurrentExample => &["RSpec.current_example"],
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConstructKind::OperatorMatcher => "operator matchers such as `should ==`",
            ConstructKind::Should => "`should` / `should_not` expectations",
            ConstructKind::ShouldReceive => "`should_receive` message expectations",
            ConstructKind::MethodStub => "`stub`, `stub!` and `stub_chain` method stubs",
            ConstructKind::Double => "`mock` / `stub` test doubles",
            ConstructKind::HaveItems => "`have(n).items` collection matchers",
            ConstructKind::BeBoolean => "`be_true` / `be_false`",
            ConstructKind::BeClose => "`be_close(expected, delta)`",
            ConstructKind::RaiseError => "`raise_error(Klass)` in negative expectations",
            ConstructKind::Pending => "`pending` that skips an example",
            ConstructKind::HookScope => "`:each` / `:all` hook scopes",
            ConstructKind::ExampleGroup => "top-level `describe` without `RSpec.`",
            ConstructKind::CurrentExample => "`example` / `running_example` inside examples",
        }
    }
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Scopes
// ============================================================================

/// The kind of RSpec block a construct sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    TopLevel,
    ExampleGroup,
    Example,
    Hook,
    /// `let`, `subject`, or a method defined in an example group.
    Helper,
}

const GROUP_METHODS: &[&str] = &[
    "describe",
    "context",
    "feature",
    "example_group",
    "shared_examples",
    "shared_examples_for",
    "shared_context",
    "xdescribe",
    "xcontext",
    "fdescribe",
    "fcontext",
];

const EXAMPLE_METHODS: &[&str] = &[
    "it", "specify", "example", "scenario", "its", "focus", "fit", "xit", "xspecify",
    "xexample", "pending", "skip",
];

pub(crate) const HOOK_METHODS: &[&str] = &[
    "before",
    "after",
    "around",
    "prepend_before",
    "append_before",
    "prepend_after",
    "append_after",
];

const HELPER_METHODS: &[&str] = &["let", "let!", "subject", "subject!"];

impl ScopeKind {
    /// Scope opened by the block passed to `method`, if it opens one.
    fn opened_by(method: &str, receiver: Option<&str>) -> Option<ScopeKind> {
        if GROUP_METHODS.contains(&method) && matches!(receiver, None | Some("RSpec")) {
            return Some(ScopeKind::ExampleGroup);
        }
        if HOOK_METHODS.contains(&method) {
            return Some(ScopeKind::Hook);
        }
        if receiver.is_some() {
            return None;
        }
        if EXAMPLE_METHODS.contains(&method) {
            Some(ScopeKind::Example)
        } else if HELPER_METHODS.contains(&method) {
            Some(ScopeKind::Helper)
        } else {
            None
        }
    }
}

// ============================================================================
// Instances
// ============================================================================

/// Typed view over a matched construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Construct {
    OperatorMatcher(OperatorMatcherView),
    Should(ShouldView),
    ShouldReceive(ShouldReceiveView),
    MethodStub(MethodStubView),
    Double(DoubleView),
    HaveItems(HaveItemsView),
    BeBoolean(BeBooleanView),
    BeClose(BeCloseView),
    RaiseError(RaiseErrorView),
    Pending(PendingView),
    HookScope(HookScopeView),
    ExampleGroup(ExampleGroupView),
    CurrentExample(CurrentExampleView),
}

impl Construct {
    pub fn kind(&self) -> ConstructKind {
        match self {
            Construct::OperatorMatcher(_) => ConstructKind::OperatorMatcher,
            Construct::Should(_) => ConstructKind::Should,
            Construct::ShouldReceive(_) => ConstructKind::ShouldReceive,
            Construct::MethodStub(_) => ConstructKind::MethodStub,
            Construct::Double(_) => ConstructKind::Double,
            Construct::HaveItems(_) => ConstructKind::HaveItems,
            Construct::BeBoolean(_) => ConstructKind::BeBoolean,
            Construct::BeClose(_) => ConstructKind::BeClose,
            Construct::RaiseError(_) => ConstructKind::RaiseError,
            Construct::Pending(_) => ConstructKind::Pending,
            Construct::HookScope(_) => ConstructKind::HookScope,
            Construct::ExampleGroup(_) => ConstructKind::ExampleGroup,
            Construct::CurrentExample(_) => ConstructKind::CurrentExample,
        }
    }
}

/// Index of an instance in its file's arena.
pub type InstanceId = usize;

/// A located occurrence of a recognized construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructInstance {
    pub id: InstanceId,
    pub kind: ConstructKind,
    pub span: Span,
    /// 1-indexed line of `span.start`.
    pub line: u32,
    /// 1-indexed byte column of `span.start`.
    pub column: u32,
    /// Nearest enclosing instance.
    pub parent: Option<InstanceId>,
    /// Instances whose nearest enclosing instance is this one.
    pub children: Vec<InstanceId>,
    pub scope: ScopeKind,
    /// Leading whitespace of the line the construct starts on.
    pub indent: String,
    /// Whether the construct is a statement of its own in a body.
    pub is_statement: bool,
    pub construct: Construct,
}

/// What a matcher sees besides the node itself.
#[derive(Debug, Clone, Copy)]
pub struct MatchEnv<'a> {
    pub text: &'a str,
    pub scope: ScopeKind,
    /// Parameter names of all enclosing blocks, lambdas and methods.
    pub block_params: &'a [String],
}

const STATEMENT_PARENTS: &[&str] = &[
    "program",
    "body_statement",
    "block_body",
    "then",
    "else",
    "begin",
    "ensure",
];

fn match_node(node: Node<'_>, env: &MatchEnv<'_>) -> Option<Construct> {
    ConstructKind::ALL.into_iter().find_map(|kind| match kind {
        ConstructKind::OperatorMatcher => {
            operator_matcher::matches(node, env).map(Construct::OperatorMatcher)
        }
        ConstructKind::Should => should::matches(node, env).map(Construct::Should),
        ConstructKind::ShouldReceive => {
            should_receive::matches(node, env).map(Construct::ShouldReceive)
        }
        ConstructKind::MethodStub => method_stub::matches(node, env).map(Construct::MethodStub),
        ConstructKind::Double => double::matches(node, env).map(Construct::Double),
        ConstructKind::HaveItems => have_items::matches(node, env).map(Construct::HaveItems),
        ConstructKind::BeBoolean => be_boolean::matches(node, env).map(Construct::BeBoolean),
        ConstructKind::BeClose => be_close::matches(node, env).map(Construct::BeClose),
        ConstructKind::RaiseError => raise_error::matches(node, env).map(Construct::RaiseError),
        ConstructKind::Pending => pending::matches(node, env).map(Construct::Pending),
        ConstructKind::HookScope => hook_scope::matches(node, env).map(Construct::HookScope),
        ConstructKind::ExampleGroup => {
            example_group::matches(node, env).map(Construct::ExampleGroup)
        }
        ConstructKind::CurrentExample => {
            current_example::matches(node, env).map(Construct::CurrentExample)
        }
    })
}

/// Find every construct instance in a parsed file.
pub fn scan(parsed: &ParsedSource) -> Vec<ConstructInstance> {
    let mut walker = Walker {
        text: parsed.text(),
        params: Vec::new(),
        out: Vec::new(),
    };
    walker.walk(parsed.root(), ScopeKind::TopLevel, None);
    walker.out
}

struct Walker<'a> {
    text: &'a str,
    params: Vec<String>,
    out: Vec<ConstructInstance>,
}

impl Walker<'_> {
    fn walk(&mut self, node: Node<'_>, scope: ScopeKind, parent: Option<InstanceId>) {
        let env = MatchEnv {
            text: self.text,
            scope,
            block_params: &self.params,
        };
        let mut enclosing = parent;
        if let Some(construct) = match_node(node, &env) {
            let id = self.out.len();
            let span = node_span(node);
            let (line, column) = byte_offset_to_position(self.text.as_bytes(), span.start);
            let is_statement = node
                .parent()
                .map(|p| STATEMENT_PARENTS.contains(&p.kind()))
                .unwrap_or(false);
            self.out.push(ConstructInstance {
                id,
                kind: construct.kind(),
                span,
                line,
                column,
                parent,
                children: Vec::new(),
                scope,
                indent: indentation_at(self.text, span.start).to_string(),
                is_statement,
                construct,
            });
            if let Some(p) = parent {
                self.out[p].children.push(id);
            }
            enclosing = Some(id);
        }

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        for child in children {
            let child_scope = self.child_scope(node, child, scope);
            let binds_parameters = matches!(
                child.kind(),
                "block" | "do_block" | "lambda" | "method" | "singleton_method"
            );
            let pushed = if binds_parameters {
                let names = parameter_names(child, self.text);
                let count = names.len();
                self.params.extend(names.into_iter().map(str::to_string));
                count
            } else {
                0
            };
            self.walk(child, child_scope, enclosing);
            self.params.truncate(self.params.len() - pushed);
        }
    }

    fn child_scope(&self, node: Node<'_>, child: Node<'_>, scope: ScopeKind) -> ScopeKind {
        match child.kind() {
            "block" | "do_block" if node.kind() == "call" => {
                let method = node
                    .child_by_field_name("method")
                    .map(|m| node_text(m, self.text))
                    .unwrap_or_default();
                let receiver = node
                    .child_by_field_name("receiver")
                    .map(|r| node_text(r, self.text));
                ScopeKind::opened_by(method, receiver).unwrap_or(scope)
            }
            "method" | "singleton_method" => match scope {
                ScopeKind::TopLevel => ScopeKind::TopLevel,
                _ => ScopeKind::Helper,
            },
            "class" | "module" => ScopeKind::TopLevel,
            _ => scope,
        }
    }
}

// ============================================================================
// Facts
// ============================================================================

/// A runtime fact a decision may need, observed on the expression at `span`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactRequest {
    pub span: Span,
    pub kind: FactKind,
}

impl FactRequest {
    pub fn new(span: Span, kind: FactKind) -> Self {
        FactRequest { span, kind }
    }
}

impl ConstructInstance {
    /// Facts the analyzer should record for this instance.
    pub fn fact_requests(&self) -> Vec<FactRequest> {
        match &self.construct {
            Construct::OperatorMatcher(v) => operator_matcher::fact_requests(v),
            Construct::Should(v) => should::fact_requests(v),
            Construct::ShouldReceive(v) => should_receive::fact_requests(v),
            Construct::MethodStub(v) => method_stub::fact_requests(v),
            Construct::HaveItems(v) => have_items::fact_requests(v),
            Construct::Double(_)
            | Construct::BeBoolean(_)
            | Construct::BeClose(_)
            | Construct::RaiseError(_)
            | Construct::Pending(_)
            | Construct::HookScope(_)
            | Construct::ExampleGroup(_)
            | Construct::CurrentExample(_) => Vec::new(),
        }
    }
}

// ============================================================================
// Decisions
// ============================================================================

/// A chosen rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub confidence: Confidence,
    pub replacements: Vec<Replacement>,
    /// Generic shape of the old syntax, for the change log.
    pub original_syntax: String,
    pub converted_syntax: String,
}

/// Outcome of deciding one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Conversion(Conversion),
    /// No safe rewrite; keep the original and tell the user why.
    Ambiguous(String),
    /// Recognized but not to be converted.
    Unsupported,
}

impl Decision {
    pub fn convert(
        confidence: Confidence,
        replacements: Vec<Replacement>,
        original_syntax: impl Into<String>,
        converted_syntax: impl Into<String>,
    ) -> Self {
        Decision::Conversion(Conversion {
            confidence,
            replacements,
            original_syntax: original_syntax.into(),
            converted_syntax: converted_syntax.into(),
        })
    }

    pub fn ambiguous(reason: impl Into<String>) -> Self {
        Decision::Ambiguous(reason.into())
    }

    pub fn is_conversion(&self) -> bool {
        matches!(self, Decision::Conversion(_))
    }
}

/// Everything a decision may consult.
pub struct DecideContext<'a> {
    pub suite: &'a Suite,
    /// Project-relative path of the file being converted.
    pub path: &'a str,
    pub text: &'a str,
    pub instances: &'a [ConstructInstance],
    /// Decisions made so far in this file, indexed by instance id.
    pub decisions: &'a [Option<Decision>],
    pub config: &'a ConversionConfig,
}

impl<'a> DecideContext<'a> {
    pub fn slice(&self, span: Span) -> &'a str {
        self.text.get(span.start..span.end).unwrap_or_default()
    }

    pub fn location(&self, span: Span) -> SourceLocation {
        let (line, column) = byte_offset_to_position(self.text.as_bytes(), span.start);
        SourceLocation::new(self.path, line, column)
    }

    pub fn facts(&self, span: Span) -> &'a [RuntimeFact] {
        self.suite.facts_at(&self.location(span))
    }

    pub fn fact(&self, span: Span, kind: &FactKind) -> Option<&'a FactValue> {
        self.facts(span)
            .iter()
            .find(|f| &f.kind == kind)
            .map(|f| &f.value)
    }

    pub fn receiver_kind(&self, span: Span) -> Option<ReceiverKind> {
        self.fact(span, &FactKind::ReceiverKind)
            .and_then(FactValue::as_text)
            .and_then(ReceiverKind::parse)
    }

    pub fn statics(&self) -> &'a StaticContext {
        self.suite.static_context()
    }

    pub fn mock_framework(&self) -> MockFramework {
        self.statics().mock_framework()
    }

    pub fn parent(&self, instance: &ConstructInstance) -> Option<&'a ConstructInstance> {
        instance.parent.and_then(|p| self.instances.get(p))
    }

    pub fn decision(&self, id: InstanceId) -> Option<&'a Decision> {
        self.decisions.get(id).and_then(Option::as_ref)
    }

    /// Child of `instance` with the given kind spanning exactly `span`.
    pub fn child_at(
        &self,
        instance: &ConstructInstance,
        kind: ConstructKind,
        span: Span,
    ) -> Option<&'a ConstructInstance> {
        instance
            .children
            .iter()
            .filter_map(|&c| self.instances.get(c))
            .find(|c| c.kind == kind && c.span == span)
    }

    pub fn negative_word(&self) -> &'static str {
        self.config.negative_form.as_str()
    }
}

/// Decide one instance.
pub fn decide(instance: &ConstructInstance, ctx: &DecideContext<'_>) -> Decision {
    match &instance.construct {
        Construct::OperatorMatcher(v) => operator_matcher::decide(instance, v, ctx),
        Construct::Should(v) => should::decide(instance, v, ctx),
        Construct::ShouldReceive(v) => should_receive::decide(instance, v, ctx),
        Construct::MethodStub(v) => method_stub::decide(instance, v, ctx),
        Construct::Double(v) => double::decide(instance, v, ctx),
        Construct::HaveItems(v) => have_items::decide(instance, v, ctx),
        Construct::BeBoolean(v) => be_boolean::decide(instance, v, ctx),
        Construct::BeClose(v) => be_close::decide(instance, v, ctx),
        Construct::RaiseError(v) => raise_error::decide(instance, v, ctx),
        Construct::Pending(v) => pending::decide(instance, v, ctx),
        Construct::HookScope(v) => hook_scope::decide(instance, v, ctx),
        Construct::ExampleGroup(v) => example_group::decide(instance, v, ctx),
        Construct::CurrentExample(v) => current_example::decide(instance, v, ctx),
    }
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Node kinds whose value cannot be a test double or any-instance recorder.
const STATIC_RECEIVERS: &[&str] = &[
    "constant",
    "scope_resolution",
    "self",
    "string",
    "integer",
    "float",
    "simple_symbol",
    "array",
    "hash",
    "nil",
    "true",
    "false",
];

pub(crate) fn is_static_receiver(node: Node<'_>) -> bool {
    STATIC_RECEIVERS.contains(&node.kind())
}

/// Receivers that can be repeated without re-evaluating anything costly.
pub(crate) fn is_simple_receiver(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "identifier" | "constant" | "scope_resolution" | "instance_variable" | "self"
    )
}

/// Whether the node is an argument of an expectation call whose method is one
/// of `methods` (`x.should m`, `expect(x).to m`).
pub(crate) fn expectation_call_of<'t>(node: Node<'t>, text: &str, methods: &[&str]) -> Option<Node<'t>> {
    let args = node.parent().filter(|p| p.kind() == "argument_list")?;
    let call = args.parent().filter(|c| c.kind() == "call")?;
    let method = call.child_by_field_name("method")?;
    methods
        .contains(&node_text(method, text))
        .then_some(call)
}

pub(crate) const NEGATIVE_EXPECTATIONS: &[&str] = &["should_not", "not_to", "to_not"];
pub(crate) const ALL_EXPECTATIONS: &[&str] = &["should", "to", "should_not", "not_to", "to_not"];

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::suite::Suite;

    /// Load a single in-memory file and return the suite.
    pub fn suite_of(text: &str) -> Suite {
        let mut suite = Suite::from_sources(vec![("spec/sample_spec.rb".to_string(), text.to_string())]);
        suite.analyze();
        suite
    }

    pub fn kinds(suite: &Suite) -> Vec<ConstructKind> {
        suite.files()[0].instances().iter().map(|i| i.kind).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in ConstructKind::ALL {
            assert_eq!(ConstructKind::parse(kind.name()), Some(kind));
            assert!(!kind.targets().is_empty());
        }
        assert_eq!(ConstructKind::parse("nope"), None);
    }

    #[test]
    fn arena_is_outer_first_in_offset_order() {
        let suite = suite_of("RSpec.describe Foo do\n  it { foo.should == 1 }\nend\n");
        let file = &suite.files()[0];
        let instances = file.instances();
        assert_eq!(
            kinds(&suite),
            vec![ConstructKind::OperatorMatcher, ConstructKind::Should]
        );
        assert_eq!(instances[1].parent, Some(0));
        assert_eq!(instances[0].children, vec![1]);
        assert!(instances[0].span.start <= instances[1].span.start);
        assert_eq!(instances[1].scope, ScopeKind::Example);
        assert_eq!((instances[0].line, instances[0].column), (2, 8));
    }

    #[test]
    fn scopes_follow_rspec_blocks() {
        let src = "\
RSpec.describe Foo do
  let(:bar) { mock('bar') }
  before { pending }
  it 'works' do
    pending
  end
end
";
        let suite = suite_of(src);
        let scopes: Vec<(ConstructKind, ScopeKind)> = suite.files()[0]
            .instances()
            .iter()
            .map(|i| (i.kind, i.scope))
            .collect();
        assert_eq!(
            scopes,
            vec![
                (ConstructKind::Double, ScopeKind::Helper),
                (ConstructKind::Pending, ScopeKind::Example),
            ]
        );
    }

    #[test]
    fn statement_flag_and_indent() {
        let src = "RSpec.describe Foo do\n  it do\n    foo.stub(:a => 1)\n  end\nend\n";
        let suite = suite_of(src);
        let inst = &suite.files()[0].instances()[0];
        assert_eq!(inst.kind, ConstructKind::MethodStub);
        assert!(inst.is_statement);
        assert_eq!(inst.indent, "    ");
    }

    #[test]
    fn unrelated_code_yields_nothing() {
        let suite = suite_of("class Foo\n  def bar\n    baz.qux(1) == 2\n  end\nend\n");
        assert!(suite.files()[0].instances().is_empty());
    }
}
