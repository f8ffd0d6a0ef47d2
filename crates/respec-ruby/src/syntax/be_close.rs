//! `be_close(expected, delta)`.

use respec_core::patch::{Replacement, Span};
use respec_core::report::Confidence;
use tree_sitter::Node;

use super::{ConstructInstance, DecideContext, Decision, MatchEnv};
use crate::parser::{node_span, CallParts};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeCloseView {
    pub span: Span,
    pub expected: Span,
    pub delta: Span,
}

pub fn matches(node: Node<'_>, env: &MatchEnv<'_>) -> Option<BeCloseView> {
    if node.kind() != "call" {
        return None;
    }
    let call = CallParts::of(node)?;
    if call.receiver.is_some() || call.block.is_some() || call.name(env.text) != "be_close" {
        return None;
    }
    match call.args().as_slice() {
        [expected, delta] => Some(BeCloseView {
            span: node_span(node),
            expected: node_span(*expected),
            delta: node_span(*delta),
        }),
        _ => None,
    }
}

pub fn decide(_instance: &ConstructInstance, view: &BeCloseView, ctx: &DecideContext<'_>) -> Decision {
    Decision::convert(
        Confidence::Certain,
        vec![Replacement::replace(
            view.span,
            format!(
                "be_within({}).of({})",
                ctx.slice(view.delta),
                ctx.slice(view.expected)
            ),
        )],
        "be_close(expected, delta)",
        "be_within(delta).of(expected)",
    )
}
