//! `pending` used to skip an example.

use respec_core::patch::{Replacement, Span};
use respec_core::report::Confidence;
use tree_sitter::Node;

use super::{ConstructInstance, DecideContext, Decision, MatchEnv, ScopeKind};
use crate::parser::{node_span, CallParts};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingView {
    pub method: Span,
    pub has_block: bool,
}

pub fn matches(node: Node<'_>, env: &MatchEnv<'_>) -> Option<PendingView> {
    let call = CallParts::of(node)?;
    if call.receiver.is_some() || call.name(env.text) != "pending" {
        return None;
    }
    let has_block = call.block.is_some();
    match env.scope {
        ScopeKind::Example => {}
        ScopeKind::ExampleGroup if has_block => {}
        _ => return None,
    }
    Some(PendingView {
        method: node_span(call.method),
        has_block,
    })
}

pub fn decide(instance: &ConstructInstance, view: &PendingView, _ctx: &DecideContext<'_>) -> Decision {
    if instance.scope == ScopeKind::Example && view.has_block {
        return Decision::ambiguous(
            "`pending` with a block inside an example expects the block to fail in RSpec 3",
        );
    }
    let (original, converted) = if view.has_block {
        ("pending 'description' do", "skip 'description' do")
    } else {
        ("pending", "skip")
    };
    Decision::convert(
        Confidence::Certain,
        vec![Replacement::replace(view.method, "skip")],
        original,
        converted,
    )
}
