//! `obj.should matcher` / `obj.should_not matcher` expectations.

use respec_core::facts::{FactKind, ReceiverKind};
use respec_core::patch::{Replacement, Span};
use respec_core::report::Confidence;
use tree_sitter::Node;

use super::have_items;
use super::{
    Construct, ConstructInstance, ConstructKind, DecideContext, Decision, FactRequest, MatchEnv,
    ScopeKind,
};
use crate::parser::{node_span, node_text, CallParts};

/// Matchers that take a block rather than a value.
const BLOCK_MATCHERS: &[&str] = &[
    "raise_error",
    "raise_exception",
    "change",
    "throw_symbol",
    "output",
    "yield_control",
    "yield_with_args",
    "yield_with_no_args",
    "yield_successive_args",
];

/// What `should` is called on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShouldSubject {
    /// One-liner `should` against the implicit subject.
    Implicit,
    Expression(Span),
    /// A proc literal: `lambda { }`, `-> { }`, `proc { }`, `Proc.new { }`.
    Block {
        span: Span,
        /// The part replaced by `expect`, e.g. `lambda`.
        head: Span,
        has_params: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShouldView {
    pub negative: bool,
    pub subject: ShouldSubject,
    /// The `should` / `should_not` token.
    pub method: Span,
    /// The matcher argument; `None` in operator form.
    pub matcher: Option<Span>,
    pub matcher_name: Option<String>,
}

impl ShouldView {
    pub fn is_block_matcher(&self) -> bool {
        self.matcher_name
            .as_deref()
            .map(|m| BLOCK_MATCHERS.contains(&m))
            .unwrap_or(false)
    }
}

fn block_subject(node: Node<'_>, text: &str) -> Option<ShouldSubject> {
    match node.kind() {
        "lambda" => {
            let arrow = node.child(0)?;
            Some(ShouldSubject::Block {
                span: node_span(node),
                head: node_span(arrow),
                has_params: node.child_by_field_name("parameters").is_some(),
            })
        }
        "call" => {
            let call = CallParts::of(node)?;
            let block = call.block?;
            let head_start = match (call.receiver, call.name(text)) {
                (None, "lambda" | "proc") => call.method.start_byte(),
                (Some(recv), "new") if node_text(recv, text) == "Proc" => recv.start_byte(),
                _ => return None,
            };
            if call.arguments.is_some() {
                return None;
            }
            Some(ShouldSubject::Block {
                span: node_span(node),
                head: Span::new(head_start, call.method.end_byte()),
                has_params: block.child_by_field_name("parameters").is_some(),
            })
        }
        _ => None,
    }
}

fn is_operator_left(node: Node<'_>) -> bool {
    node.parent()
        .filter(|p| p.kind() == "binary")
        .and_then(|p| p.child_by_field_name("left"))
        .map(|l| l.id() == node.id())
        .unwrap_or(false)
}

pub fn matches(node: Node<'_>, env: &MatchEnv<'_>) -> Option<ShouldView> {
    let call = CallParts::of(node)?;
    let negative = match call.name(env.text) {
        "should" => false,
        "should_not" => true,
        _ => return None,
    };
    if call.block.is_some() {
        return None;
    }

    let args = call.args();
    let (matcher, matcher_name) = match args.as_slice() {
        [] if is_operator_left(node) => (None, None),
        [arg] => {
            let name = CallParts::of(*arg).map(|c| c.name(env.text).to_string());
            (Some(node_span(*arg)), name)
        }
        _ => return None,
    };

    let subject = match call.receiver {
        None => ShouldSubject::Implicit,
        Some(receiver) => {
            if !call.has_plain_dot(env.text) {
                return None;
            }
            block_subject(receiver, env.text)
                .unwrap_or_else(|| ShouldSubject::Expression(node_span(receiver)))
        }
    };

    Some(ShouldView {
        negative,
        subject,
        method: node_span(call.method),
        matcher,
        matcher_name,
    })
}

pub fn fact_requests(view: &ShouldView) -> Vec<FactRequest> {
    match view.subject {
        ShouldSubject::Expression(span) if view.is_block_matcher() => {
            vec![FactRequest::new(span, FactKind::ReceiverKind)]
        }
        _ => Vec::new(),
    }
}

/// Suffix the subject needs when the matcher is a convertible `have(n).items`.
fn subject_suffix(
    instance: &ConstructInstance,
    view: &ShouldView,
    ctx: &DecideContext<'_>,
) -> String {
    let Some(matcher) = view.matcher else {
        return String::new();
    };
    if !ctx.config.is_enabled(ConstructKind::HaveItems) {
        return String::new();
    }
    match ctx.child_at(instance, ConstructKind::HaveItems, matcher) {
        Some(child) => match &child.construct {
            Construct::HaveItems(have) => have_items::subject_suffix(have, ctx).unwrap_or_default(),
            _ => String::new(),
        },
        None => String::new(),
    }
}

pub fn decide(instance: &ConstructInstance, view: &ShouldView, ctx: &DecideContext<'_>) -> Decision {
    if view.matcher.is_none() {
        let parent_converted = ctx
            .parent(instance)
            .filter(|p| p.kind == ConstructKind::OperatorMatcher)
            .and_then(|p| ctx.decision(p.id))
            .map(Decision::is_conversion)
            .unwrap_or(false);
        if !parent_converted {
            return Decision::ambiguous("operator matcher was left unconverted");
        }
    }

    let to = if view.negative { ctx.negative_word() } else { "to" };
    let old = if view.negative { "should_not" } else { "should" };

    match &view.subject {
        ShouldSubject::Implicit => {
            if instance.scope != ScopeKind::Example {
                return Decision::ambiguous(
                    "one-liner `should` outside an example has no implicit subject",
                );
            }
            let suffix = subject_suffix(instance, view, ctx);
            if !suffix.is_empty() {
                return Decision::convert(
                    Confidence::Certain,
                    vec![Replacement::replace(
                        view.method,
                        format!("expect(subject{}).{}", suffix, to),
                    )],
                    old,
                    format!("expect(subject.size).{}", to),
                );
            }
            Decision::convert(
                Confidence::Certain,
                vec![Replacement::replace(view.method, format!("is_expected.{}", to))],
                old,
                format!("is_expected.{}", to),
            )
        }
        ShouldSubject::Block {
            span,
            head,
            has_params,
        } => {
            if *has_params {
                return Decision::ambiguous("proc subject takes parameters");
            }
            Decision::convert(
                Confidence::Certain,
                vec![
                    Replacement::replace(*head, "expect"),
                    Replacement::replace(Span::new(span.end, view.method.end), format!(".{}", to)),
                ],
                format!("lambda {{ }}.{}", old),
                format!("expect {{ }}.{}", to),
            )
        }
        ShouldSubject::Expression(subject) => {
            let mut open = "expect(";
            let mut confidence = Confidence::Certain;
            if view.is_block_matcher() {
                match ctx.receiver_kind(*subject) {
                    Some(ReceiverKind::Proc) => open = "expect(&",
                    Some(_) => confidence = Confidence::Heuristic,
                    None => {
                        return Decision::ambiguous(
                            "block matcher on a non-literal subject; \
                             not observed whether it is a proc",
                        )
                    }
                }
            }
            let suffix = subject_suffix(instance, view, ctx);
            Decision::convert(
                confidence,
                vec![
                    Replacement::insert(subject.start, open),
                    Replacement::replace(
                        Span::new(subject.end, view.method.end),
                        format!("{}).{}", suffix, to),
                    ),
                ],
                format!("obj.{}", old),
                format!("{}obj).{}", open, to),
            )
        }
    }
}
