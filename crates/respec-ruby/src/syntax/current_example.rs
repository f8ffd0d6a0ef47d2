//! `example` / `running_example` referring to the running example.

use respec_core::patch::{Replacement, Span};
use respec_core::report::Confidence;
use tree_sitter::Node;

use super::{ConstructInstance, DecideContext, Decision, MatchEnv, ScopeKind};
use crate::parser::{is_field_of_parent, node_span, node_text, BINDING_PARENTS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentExampleView {
    pub span: Span,
    pub name: String,
}

pub fn matches(node: Node<'_>, env: &MatchEnv<'_>) -> Option<CurrentExampleView> {
    if node.kind() != "identifier" {
        return None;
    }
    if !matches!(env.scope, ScopeKind::Example | ScopeKind::Hook | ScopeKind::Helper) {
        return None;
    }
    let name = node_text(node, env.text);
    if !matches!(name, "example" | "running_example") {
        return None;
    }
    if ["method", "name", "left", "pattern"]
        .iter()
        .any(|field| is_field_of_parent(node, field))
    {
        return None;
    }
    let parent_kind = node.parent().map(|p| p.kind()).unwrap_or_default();
    if parent_kind.ends_with("parameters")
        || parent_kind.ends_with("parameter")
        || BINDING_PARENTS.contains(&parent_kind)
    {
        return None;
    }
    if env.block_params.iter().any(|p| p == name) {
        return None;
    }
    Some(CurrentExampleView {
        span: node_span(node),
        name: name.to_string(),
    })
}

pub fn decide(_instance: &ConstructInstance, view: &CurrentExampleView, ctx: &DecideContext<'_>) -> Decision {
    if ctx.statics().shadows_example(ctx.path, &view.name) {
        return Decision::ambiguous(format!(
            "`{}` is also defined locally in this file",
            view.name
        ));
    }
    Decision::convert(
        Confidence::Certain,
        vec![Replacement::replace(view.span, "RSpec.current_example")],
        view.name.clone(),
        "RSpec.current_example",
    )
}
