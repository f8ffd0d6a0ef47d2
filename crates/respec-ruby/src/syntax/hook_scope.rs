//! `before(:each)` / `after(:all)` hook scope names.

use respec_core::patch::{Replacement, Span};
use respec_core::report::Confidence;
use tree_sitter::Node;

use super::{ConstructInstance, DecideContext, Decision, MatchEnv, HOOK_METHODS};
use crate::parser::{node_span, node_text, CallParts};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookScopeView {
    pub symbol: Span,
    /// `:each` or `:all`.
    pub old_scope: String,
}

impl HookScopeView {
    pub fn new_scope(&self) -> &'static str {
        if self.old_scope == ":all" {
            ":context"
        } else {
            ":example"
        }
    }
}

pub fn matches(node: Node<'_>, env: &MatchEnv<'_>) -> Option<HookScopeView> {
    if node.kind() != "call" {
        return None;
    }
    let call = CallParts::of(node)?;
    if !HOOK_METHODS.contains(&call.name(env.text)) {
        return None;
    }
    let first = *call.args().first()?;
    let symbol = node_text(first, env.text);
    if first.kind() != "simple_symbol" || !matches!(symbol, ":each" | ":all") {
        return None;
    }
    Some(HookScopeView {
        symbol: node_span(first),
        old_scope: symbol.to_string(),
    })
}

pub fn decide(_instance: &ConstructInstance, view: &HookScopeView, _ctx: &DecideContext<'_>) -> Decision {
    Decision::convert(
        Confidence::Certain,
        vec![Replacement::replace(view.symbol, view.new_scope())],
        format!("before({})", view.old_scope),
        format!("before({})", view.new_scope()),
    )
}

#[cfg(test)]
mod tests {
    use crate::syntax::test_support::suite_of;
    use crate::syntax::Construct;

    #[test]
    fn maps_each_and_all() {
        let src = "RSpec.configure do |c|\n  c.before(:all) { }\n  c.after :each do\n  end\n  c.before(:suite) { }\nend\n";
        let suite = suite_of(src);
        let scopes: Vec<&str> = suite.files()[0]
            .instances()
            .iter()
            .filter_map(|i| match &i.construct {
                Construct::HookScope(v) => Some(v.new_scope()),
                _ => None,
            })
            .collect();
        assert_eq!(scopes, vec![":context", ":example"]);
    }
}
