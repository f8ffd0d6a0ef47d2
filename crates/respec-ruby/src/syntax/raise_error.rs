//! `raise_error(SomeError)` inside negative expectations.
//!
//! RSpec 3 rejects an error class on `not_to raise_error`; the argument is
//! dropped, which makes the expectation stricter than before.

use respec_core::patch::{Replacement, Span};
use respec_core::report::Confidence;
use tree_sitter::Node;

use super::{expectation_call_of, ConstructInstance, DecideContext, Decision, MatchEnv, NEGATIVE_EXPECTATIONS};
use crate::parser::{node_span, CallParts};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaiseErrorView {
    pub method: Span,
    pub arguments: Span,
}

pub fn matches(node: Node<'_>, env: &MatchEnv<'_>) -> Option<RaiseErrorView> {
    if node.kind() != "call" {
        return None;
    }
    let call = CallParts::of(node)?;
    if call.receiver.is_some() || call.block.is_some() {
        return None;
    }
    if !matches!(call.name(env.text), "raise_error" | "raise_exception") {
        return None;
    }
    let arguments = call.arguments?;
    if call.args().is_empty() {
        return None;
    }
    expectation_call_of(node, env.text, NEGATIVE_EXPECTATIONS)?;
    Some(RaiseErrorView {
        method: node_span(call.method),
        arguments: node_span(arguments),
    })
}

pub fn decide(_instance: &ConstructInstance, view: &RaiseErrorView, _ctx: &DecideContext<'_>) -> Decision {
    Decision::convert(
        Confidence::Heuristic,
        vec![Replacement::delete(Span::new(view.method.end, view.arguments.end))],
        "not_to raise_error(SomeError)",
        "not_to raise_error",
    )
}

#[cfg(test)]
mod tests {
    use crate::syntax::test_support::{kinds, suite_of};
    use crate::syntax::ConstructKind;

    #[test]
    fn positive_expectations_keep_their_class() {
        let src = "it { expect { go }.to raise_error(Boom); expect { go }.not_to raise_error(Boom) }\n";
        let suite = suite_of(src);
        let count = kinds(&suite)
            .into_iter()
            .filter(|k| *k == ConstructKind::RaiseError)
            .count();
        assert_eq!(count, 1);
    }
}
