//! Top-level `describe` without the `RSpec.` receiver.

use respec_core::patch::Replacement;
use respec_core::report::Confidence;
use tree_sitter::Node;

use super::{ConstructInstance, DecideContext, Decision, MatchEnv, ScopeKind};
use crate::parser::CallParts;

const TOP_LEVEL_DSL: &[&str] = &[
    "describe",
    "shared_examples",
    "shared_examples_for",
    "shared_context",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleGroupView {
    pub method_start: usize,
    pub method_name: String,
}

pub fn matches(node: Node<'_>, env: &MatchEnv<'_>) -> Option<ExampleGroupView> {
    if node.kind() != "call" || env.scope != ScopeKind::TopLevel {
        return None;
    }
    let call = CallParts::of(node)?;
    let name = call.name(env.text);
    if call.receiver.is_some() || call.block.is_none() || !TOP_LEVEL_DSL.contains(&name) {
        return None;
    }
    Some(ExampleGroupView {
        method_start: call.method.start_byte(),
        method_name: name.to_string(),
    })
}

pub fn decide(_instance: &ConstructInstance, view: &ExampleGroupView, _ctx: &DecideContext<'_>) -> Decision {
    Decision::convert(
        Confidence::Certain,
        vec![Replacement::insert(view.method_start, "RSpec.")],
        view.method_name.clone(),
        format!("RSpec.{}", view.method_name),
    )
}
