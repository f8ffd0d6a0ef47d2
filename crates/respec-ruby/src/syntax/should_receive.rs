//! `obj.should_receive(:m)` message expectations.

use respec_core::facts::{FactKind, ReceiverKind};
use respec_core::patch::{Replacement, Span};
use respec_core::report::Confidence;
use tree_sitter::Node;

use super::{is_static_receiver, ConstructInstance, DecideContext, Decision, FactRequest, MatchEnv};
use crate::context::MockFramework;
use crate::parser::{node_span, CallParts};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShouldReceiveView {
    pub negative: bool,
    pub subject: Span,
    pub subject_static: bool,
    /// `K` when the subject is `K.any_instance`.
    pub any_instance: Option<Span>,
    pub method: Span,
}

/// `K` of a `K.any_instance` receiver.
pub(crate) fn any_instance_class(receiver: Node<'_>, text: &str) -> Option<Span> {
    let call = CallParts::of(receiver)?;
    if call.name(text) != "any_instance" || call.arguments.is_some() || call.block.is_some() {
        return None;
    }
    call.receiver.map(node_span)
}

pub fn matches(node: Node<'_>, env: &MatchEnv<'_>) -> Option<ShouldReceiveView> {
    if node.kind() != "call" {
        return None;
    }
    let call = CallParts::of(node)?;
    let negative = match call.name(env.text) {
        "should_receive" => false,
        "should_not_receive" => true,
        _ => return None,
    };
    let receiver = call.receiver?;
    if !call.has_plain_dot(env.text) || call.args().is_empty() {
        return None;
    }
    Some(ShouldReceiveView {
        negative,
        subject: node_span(receiver),
        subject_static: is_static_receiver(receiver),
        any_instance: any_instance_class(receiver, env.text),
        method: node_span(call.method),
    })
}

pub fn fact_requests(view: &ShouldReceiveView) -> Vec<FactRequest> {
    if view.subject_static || view.any_instance.is_some() {
        return Vec::new();
    }
    vec![FactRequest::new(view.subject, FactKind::ReceiverKind)]
}

/// Shared framework gate for the mock conversions.
pub(crate) fn framework_gate(ctx: &DecideContext<'_>) -> Option<Decision> {
    match ctx.mock_framework() {
        MockFramework::RSpec => None,
        MockFramework::Conflicting => Some(Decision::ambiguous(
            "project configures more than one mock framework",
        )),
        _ => Some(Decision::Unsupported),
    }
}

pub fn decide(
    _instance: &ConstructInstance,
    view: &ShouldReceiveView,
    ctx: &DecideContext<'_>,
) -> Decision {
    if let Some(decision) = framework_gate(ctx) {
        return decision;
    }

    let to = if view.negative { ctx.negative_word() } else { "to" };
    let old = if view.negative {
        "should_not_receive"
    } else {
        "should_receive"
    };

    if let Some(class) = view.any_instance {
        return Decision::convert(
            Confidence::Certain,
            vec![Replacement::replace(
                Span::new(view.subject.start, view.method.end),
                format!("expect_any_instance_of({}).{} receive", ctx.slice(class), to),
            )],
            format!("Klass.any_instance.{}(:message)", old),
            format!("expect_any_instance_of(Klass).{} receive(:message)", to),
        );
    }

    let confidence = if view.subject_static {
        Confidence::Certain
    } else {
        match ctx.receiver_kind(view.subject) {
            Some(ReceiverKind::AnyInstanceRecorder) => {
                return Decision::ambiguous("receiver is an `any_instance` recorder held in a variable")
            }
            Some(_) => Confidence::Certain,
            None => Confidence::Heuristic,
        }
    };

    Decision::convert(
        confidence,
        vec![
            Replacement::insert(view.subject.start, "expect("),
            Replacement::replace(
                Span::new(view.subject.end, view.method.end),
                format!(").{} receive", to),
            ),
        ],
        format!("obj.{}(:message)", old),
        format!("expect(obj).{} receive(:message)", to),
    )
}
