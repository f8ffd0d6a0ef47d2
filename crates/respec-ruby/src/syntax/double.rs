//! Receiverless `mock('name')` / `stub('name')` test doubles.

use respec_core::patch::{Replacement, Span};
use respec_core::report::Confidence;
use tree_sitter::Node;

use super::should_receive::framework_gate;
use super::{ConstructInstance, DecideContext, Decision, MatchEnv, ScopeKind};
use crate::parser::{node_span, CallParts};

/// First argument of the double constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubleArg {
    None,
    Name,
    Hash,
    Symbol,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoubleView {
    pub method: Span,
    /// `mock` or `stub`.
    pub method_name: String,
    pub arg: DoubleArg,
}

pub fn matches(node: Node<'_>, env: &MatchEnv<'_>) -> Option<DoubleView> {
    if node.kind() != "call" {
        return None;
    }
    let call = CallParts::of(node)?;
    let name = call.name(env.text);
    if call.receiver.is_some() || call.arguments.is_none() || call.block.is_some() {
        return None;
    }
    if !matches!(name, "mock" | "stub") {
        return None;
    }
    let arg = match call.args().first() {
        None => DoubleArg::None,
        Some(first) => match first.kind() {
            "string" => DoubleArg::Name,
            "pair" | "hash" => DoubleArg::Hash,
            "simple_symbol" => DoubleArg::Symbol,
            _ => DoubleArg::Other,
        },
    };
    Some(DoubleView {
        method: node_span(call.method),
        method_name: name.to_string(),
        arg,
    })
}

pub fn decide(instance: &ConstructInstance, view: &DoubleView, ctx: &DecideContext<'_>) -> Decision {
    if instance.scope == ScopeKind::TopLevel {
        return Decision::Unsupported;
    }
    if let Some(decision) = framework_gate(ctx) {
        return decision;
    }
    if view.method_name == "stub" && matches!(view.arg, DoubleArg::Symbol | DoubleArg::Other) {
        return Decision::ambiguous("receiverless `stub` may stub a method on `self`");
    }
    Decision::convert(
        Confidence::Certain,
        vec![Replacement::replace(view.method, "double")],
        format!("{}('name')", view.method_name),
        "double('name')",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::test_support::suite_of;
    use crate::syntax::Construct;

    #[test]
    fn argument_shapes() {
        let suite = suite_of("it do\n  a = mock('a')\n  b = stub(:c)\n  d = stub(e: 1)\nend\n");
        let args: Vec<DoubleArg> = suite.files()[0]
            .instances()
            .iter()
            .filter_map(|i| match &i.construct {
                Construct::Double(v) => Some(v.arg),
                _ => None,
            })
            .collect();
        assert_eq!(args, vec![DoubleArg::Name, DoubleArg::Symbol, DoubleArg::Hash]);
    }

    #[test]
    fn receiver_calls_are_not_doubles() {
        let suite = suite_of("it { foo.mock('a') }\n");
        assert!(suite.files()[0].instances().is_empty());
    }
}
