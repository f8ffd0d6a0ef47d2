//! `obj.should == x` and the other operator matchers.

use respec_core::facts::FactKind;
use respec_core::patch::{Replacement, Span};
use respec_core::report::Confidence;
use tree_sitter::Node;

use super::{ConstructInstance, DecideContext, Decision, FactRequest, MatchEnv};
use crate::parser::{node_span, node_text, CallParts};

const OPERATORS: &[&str] = &["==", "===", "=~", "<", "<=", ">", ">="];

/// Literal shape of the right operand, as far as it matters for `=~`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandLiteral {
    Array,
    Regex,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorMatcherView {
    /// The `obj.should` (or bare `should`) left operand.
    pub should: Span,
    pub negative: bool,
    pub operator: String,
    pub expected: Span,
    pub literal: OperandLiteral,
}

pub fn matches(node: Node<'_>, env: &MatchEnv<'_>) -> Option<OperatorMatcherView> {
    if node.kind() != "binary" {
        return None;
    }
    let left = node.child_by_field_name("left")?;
    let operator = node.child_by_field_name("operator")?;
    let right = node.child_by_field_name("right")?;

    let operator = node_text(operator, env.text);
    if !OPERATORS.contains(&operator) {
        return None;
    }

    let call = CallParts::of(left)?;
    let negative = match call.name(env.text) {
        "should" => false,
        "should_not" => true,
        _ => return None,
    };
    if call.arguments.is_some() || call.block.is_some() {
        return None;
    }
    if call.receiver.is_some() && !call.has_plain_dot(env.text) {
        return None;
    }

    let literal = match right.kind() {
        "array" | "string_array" | "symbol_array" => OperandLiteral::Array,
        "regex" => OperandLiteral::Regex,
        _ => OperandLiteral::Other,
    };

    Some(OperatorMatcherView {
        should: node_span(left),
        negative,
        operator: operator.to_string(),
        expected: node_span(right),
        literal,
    })
}

pub fn fact_requests(view: &OperatorMatcherView) -> Vec<FactRequest> {
    if view.operator == "=~" && view.literal == OperandLiteral::Other {
        vec![FactRequest::new(view.expected, FactKind::Enumerable)]
    } else {
        Vec::new()
    }
}

pub fn decide(
    _instance: &ConstructInstance,
    view: &OperatorMatcherView,
    ctx: &DecideContext<'_>,
) -> Decision {
    let gap = Span::new(view.should.end, view.expected.start);
    let original = format!("should {} expected", view.operator);

    let call_form = |matcher: &str, confidence: Confidence| {
        Decision::convert(
            confidence,
            vec![
                Replacement::replace(gap, format!(" {}(", matcher)),
                Replacement::insert(view.expected.end, ")"),
            ],
            original.clone(),
            format!("{}(expected)", matcher),
        )
    };

    match view.operator.as_str() {
        "==" => call_form("eq", Confidence::Certain),
        "=~" => match view.literal {
            OperandLiteral::Array => call_form("match_array", Confidence::Certain),
            OperandLiteral::Regex => call_form("match", Confidence::Certain),
            OperandLiteral::Other => {
                match ctx
                    .fact(view.expected, &FactKind::Enumerable)
                    .and_then(|v| v.as_bool())
                {
                    Some(true) => call_form("match_array", Confidence::Certain),
                    Some(false) => call_form("match", Confidence::Certain),
                    None => Decision::ambiguous(
                        "`=~` operand is neither a literal nor observed at runtime; \
                         cannot choose between `match` and `match_array`",
                    ),
                }
            }
        },
        op => Decision::convert(
            Confidence::Certain,
            vec![Replacement::replace(gap, format!(" be {} ", op))],
            original,
            format!("be {} expected", op),
        ),
    }
}
