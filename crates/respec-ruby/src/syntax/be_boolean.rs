//! `be_true` / `be_false`.

use respec_core::patch::{Replacement, Span};
use respec_core::report::Confidence;
use tree_sitter::Node;

use super::{expectation_call_of, ConstructInstance, DecideContext, Decision, MatchEnv, ALL_EXPECTATIONS};
use crate::config::BooleanMatcher;
use crate::parser::{node_span, CallParts};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeBooleanView {
    pub span: Span,
    /// `true` for `be_true`.
    pub value: bool,
}

pub fn matches(node: Node<'_>, env: &MatchEnv<'_>) -> Option<BeBooleanView> {
    let call = CallParts::of(node)?;
    if call.receiver.is_some() || call.block.is_some() || !call.args().is_empty() {
        return None;
    }
    let value = match call.name(env.text) {
        "be_true" => true,
        "be_false" => false,
        _ => return None,
    };
    expectation_call_of(node, env.text, ALL_EXPECTATIONS)?;
    Some(BeBooleanView {
        span: node_span(node),
        value,
    })
}

pub fn decide(_instance: &ConstructInstance, view: &BeBooleanView, ctx: &DecideContext<'_>) -> Decision {
    let style = ctx.config.boolean_matcher;
    let replacement = style.replacement(view.value);
    // `be true` only passes for the exact singleton, unlike `be_true`.
    let confidence = if style == BooleanMatcher::TrueFalse {
        Confidence::Heuristic
    } else {
        Confidence::Certain
    };
    Decision::convert(
        confidence,
        vec![Replacement::replace(view.span, replacement)],
        if view.value { "be_true" } else { "be_false" },
        replacement,
    )
}

#[cfg(test)]
mod tests {
    use crate::syntax::test_support::{kinds, suite_of};
    use crate::syntax::ConstructKind;

    #[test]
    fn only_as_expectation_argument() {
        let suite = suite_of("it { x.should be_true; expect(y).not_to be_false; be_true }\n");
        let count = kinds(&suite)
            .into_iter()
            .filter(|k| *k == ConstructKind::BeBoolean)
            .count();
        assert_eq!(count, 2);
    }
}
