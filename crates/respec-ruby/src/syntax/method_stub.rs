//! `obj.stub(:m)`, `stub!`, hash stubs and `stub_chain`.
//!
//! A hash of several messages becomes `receive_messages(...)` on plain
//! doubles and partial doubles. Verifying doubles get one
//! `allow(obj).to receive(:m).and_return(v)` line per message, so whether
//! the receiver is a verifying double has to be known, statically from a
//! `let` in the same file or from a runtime observation.

use respec_core::facts::{FactKind, ReceiverKind};
use respec_core::patch::{Replacement, Span};
use respec_core::report::Confidence;
use tree_sitter::Node;

use super::should_receive::{any_instance_class, framework_gate};
use super::{
    is_simple_receiver, is_static_receiver, ConstructInstance, DecideContext, Decision,
    FactRequest, MatchEnv,
};
use crate::context::DoubleKind;
use crate::parser::{node_span, node_text, symbol_name, CallParts};

/// One `key => value` pair of a hash stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubPair {
    /// Key as a Ruby expression, e.g. `:foo` or `'foo'`.
    pub key: String,
    pub value: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubArgs {
    /// `stub(:m)` or `stub('m')`.
    Message,
    Pairs(Vec<StubPair>),
    /// `stub_chain(:a, :b)`.
    Chain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodStubView {
    pub subject: Span,
    pub subject_static: bool,
    pub subject_simple: bool,
    /// Identifier name of the subject, for `let` lookups.
    pub subject_name: Option<String>,
    pub any_instance: Option<Span>,
    pub method: Span,
    pub arguments: Span,
    pub has_block: bool,
    pub args: StubArgs,
}

fn pair_key(key: Node<'_>, text: &str) -> Option<String> {
    match key.kind() {
        "simple_symbol" => Some(node_text(key, text).to_string()),
        "hash_key_symbol" => symbol_name(key, text).map(|n| format!(":{}", n)),
        "string" => Some(node_text(key, text).to_string()),
        _ => None,
    }
}

fn collect_pairs(nodes: &[Node<'_>], text: &str) -> Option<Vec<StubPair>> {
    let mut pairs = Vec::new();
    for node in nodes {
        if node.kind() != "pair" {
            return None;
        }
        let key = pair_key(node.child_by_field_name("key")?, text)?;
        let value = node.child_by_field_name("value")?;
        pairs.push(StubPair {
            key,
            value: node_span(value),
        });
    }
    Some(pairs)
}

pub fn matches(node: Node<'_>, env: &MatchEnv<'_>) -> Option<MethodStubView> {
    if node.kind() != "call" {
        return None;
    }
    let call = CallParts::of(node)?;
    let name = call.name(env.text);
    if !matches!(name, "stub" | "stub!" | "stub_chain") {
        return None;
    }
    let receiver = call.receiver?;
    if !call.has_plain_dot(env.text) {
        return None;
    }
    let arguments = call.arguments?;
    let args = call.args();

    let stub_args = if name == "stub_chain" {
        if args.is_empty() {
            return None;
        }
        StubArgs::Chain
    } else {
        match args.as_slice() {
            [single] if matches!(single.kind(), "simple_symbol" | "string") => StubArgs::Message,
            [hash] if hash.kind() == "hash" => {
                let mut cursor = hash.walk();
                let inner: Vec<Node<'_>> = hash
                    .named_children(&mut cursor)
                    .filter(|n| n.kind() != "comment")
                    .collect();
                StubArgs::Pairs(collect_pairs(&inner, env.text)?)
            }
            [] => return None,
            nodes => StubArgs::Pairs(collect_pairs(nodes, env.text)?),
        }
    };
    if let StubArgs::Pairs(pairs) = &stub_args {
        if pairs.is_empty() {
            return None;
        }
    }

    Some(MethodStubView {
        subject: node_span(receiver),
        subject_static: is_static_receiver(receiver),
        subject_simple: is_simple_receiver(receiver),
        subject_name: (receiver.kind() == "identifier")
            .then(|| node_text(receiver, env.text).to_string()),
        any_instance: any_instance_class(receiver, env.text),
        method: node_span(call.method),
        arguments: node_span(arguments),
        has_block: call.block.is_some(),
        args: stub_args,
    })
}

pub fn fact_requests(view: &MethodStubView) -> Vec<FactRequest> {
    if view.any_instance.is_some() {
        return Vec::new();
    }
    let mut requests = vec![FactRequest::new(view.subject, FactKind::StubOwner)];
    if !view.subject_static {
        requests.push(FactRequest::new(view.subject, FactKind::ReceiverKind));
    }
    requests
}

/// Rewrite `subject.stub...` up to `end` into an `allow(...)` head followed
/// by `tail`.
fn allow_form(view: &MethodStubView, ctx: &DecideContext<'_>, end: usize, tail: &str) -> Vec<Replacement> {
    match view.any_instance {
        Some(class) => vec![Replacement::replace(
            Span::new(view.subject.start, end),
            format!("allow_any_instance_of({}).to {}", ctx.slice(class), tail),
        )],
        None => vec![
            Replacement::insert(view.subject.start, "allow("),
            Replacement::replace(Span::new(view.subject.end, end), format!(").to {}", tail)),
        ],
    }
}

fn allow_head(view: &MethodStubView) -> &'static str {
    if view.any_instance.is_some() {
        "allow_any_instance_of(Klass)"
    } else {
        "allow(obj)"
    }
}

fn old_head(view: &MethodStubView, method: &str) -> String {
    if view.any_instance.is_some() {
        format!("Klass.any_instance.{}", method)
    } else {
        format!("obj.{}", method)
    }
}

/// What kind of object receives a multi-message stub.
enum MultiTarget {
    Plain(Confidence),
    Verifying,
}

fn multi_target(view: &MethodStubView, ctx: &DecideContext<'_>) -> Result<MultiTarget, Decision> {
    if view.any_instance.is_some() || view.subject_static {
        return Ok(MultiTarget::Plain(Confidence::Certain));
    }
    let fact = ctx.receiver_kind(view.subject);
    let declared = view
        .subject_name
        .as_deref()
        .and_then(|name| ctx.statics().double_kind(ctx.path, name));
    match (fact, declared) {
        (Some(ReceiverKind::VerifyingDouble), _) => Ok(MultiTarget::Verifying),
        (Some(ReceiverKind::AnyInstanceRecorder), _) => Err(Decision::ambiguous(
            "receiver is an `any_instance` recorder held in a variable",
        )),
        (Some(_), _) => Ok(MultiTarget::Plain(Confidence::Certain)),
        (None, Some(DoubleKind::Verifying)) => Ok(MultiTarget::Verifying),
        (None, Some(DoubleKind::Plain)) => Ok(MultiTarget::Plain(Confidence::Heuristic)),
        (None, None) => Err(Decision::ambiguous(
            "unknown whether the receiver is a verifying double; \
             `receive_messages` is not allowed on verifying doubles",
        )),
    }
}

pub fn decide(instance: &ConstructInstance, view: &MethodStubView, ctx: &DecideContext<'_>) -> Decision {
    if let Some(decision) = framework_gate(ctx) {
        return decision;
    }

    if view.any_instance.is_none() {
        if let Some(owner) = ctx
            .fact(view.subject, &FactKind::StubOwner)
            .and_then(|v| v.as_text())
        {
            if !owner.starts_with("RSpec::Mocks") {
                return Decision::Unsupported;
            }
        }
    }

    let confidence = if view.any_instance.is_some() || view.subject_static {
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

    let method_name = ctx.slice(view.method);
    match &view.args {
        StubArgs::Message => Decision::convert(
            confidence,
            allow_form(view, ctx, view.method.end, "receive"),
            format!("{}(:message)", old_head(view, method_name)),
            format!("{}.to receive(:message)", allow_head(view)),
        ),
        StubArgs::Chain => Decision::convert(
            confidence,
            allow_form(view, ctx, view.method.end, "receive_message_chain"),
            format!("{}(:a, :b)", old_head(view, method_name)),
            format!("{}.to receive_message_chain(:a, :b)", allow_head(view)),
        ),
        StubArgs::Pairs(pairs) if pairs.len() == 1 => {
            let pair = &pairs[0];
            if view.has_block {
                return Decision::ambiguous("hash stub also takes an implementation block");
            }
            // The value keeps its own bytes so constructs inside it still convert.
            let tail = format!("receive({}).and_return(", pair.key);
            let mut replacements = allow_form(view, ctx, pair.value.start, &tail);
            replacements.push(Replacement::replace(
                Span::new(pair.value.end, view.arguments.end),
                ")",
            ));
            Decision::convert(
                confidence,
                replacements,
                format!("{}(:message => value)", old_head(view, method_name)),
                format!("{}.to receive(:message).and_return(value)", allow_head(view)),
            )
        }
        StubArgs::Pairs(pairs) => {
            if view.has_block {
                return Decision::ambiguous("hash stub also takes an implementation block");
            }
            match multi_target(view, ctx) {
                Err(decision) => decision,
                Ok(MultiTarget::Plain(confidence)) => Decision::convert(
                    confidence,
                    allow_form(view, ctx, view.method.end, "receive_messages"),
                    format!("{}(:a => 1, :b => 2)", old_head(view, method_name)),
                    format!("{}.to receive_messages(:a => 1, :b => 2)", allow_head(view)),
                ),
                Ok(MultiTarget::Verifying) => {
                    if !instance.is_statement || !view.subject_simple {
                        return Decision::ambiguous(
                            "stub on a verifying double must be split into one `allow` per \
                             message, which needs the stub to be a statement on a simple receiver",
                        );
                    }
                    let subject = ctx.slice(view.subject);
                    let lines: Vec<String> = pairs
                        .iter()
                        .map(|pair| {
                            format!(
                                "allow({}).to receive({}).and_return({})",
                                subject,
                                pair.key,
                                ctx.slice(pair.value)
                            )
                        })
                        .collect();
                    Decision::convert(
                        Confidence::Certain,
                        vec![Replacement::replace(
                            instance.span,
                            lines.join(&format!("\n{}", instance.indent)),
                        )],
                        format!("{}(:a => 1, :b => 2)", old_head(view, method_name)),
                        "allow(obj).to receive(:a).and_return(1) per message",
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::test_support::suite_of;
    use crate::syntax::Construct;

    fn view(src: &str) -> MethodStubView {
        let suite = suite_of(src);
        let found = suite.files()[0]
            .instances()
            .iter()
            .find_map(|i| match &i.construct {
                Construct::MethodStub(v) => Some(v.clone()),
                _ => None,
            });
        found.expect("no method stub found")
    }

    #[test]
    fn message_and_chain_forms() {
        assert_eq!(view("it { foo.stub(:bar) }\n").args, StubArgs::Message);
        assert_eq!(view("it { foo.stub!(:bar) }\n").args, StubArgs::Message);
        assert_eq!(view("it { foo.stub_chain(:a, :b) }\n").args, StubArgs::Chain);
    }

    #[test]
    fn hash_forms_collect_normalized_keys() {
        let src = "it { foo.stub(a: 1, :b => 2, 'c' => 3) }\n";
        let StubArgs::Pairs(pairs) = view(src).args else {
            panic!("expected pairs");
        };
        let keys: Vec<&str> = pairs.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec![":a", ":b", "'c'"]);

        let StubArgs::Pairs(braced) = view("it { foo.stub({ a: 1 }) }\n").args else {
            panic!("expected pairs");
        };
        assert_eq!(braced.len(), 1);
    }

    #[test]
    fn receiver_classification() {
        let v = view("it { Foo.stub(:bar) }\n");
        assert!(v.subject_static);
        let v = view("it { Foo.any_instance.stub(:bar) }\n");
        assert!(v.any_instance.is_some());
        let v = view("it { foo.stub(:bar) }\n");
        assert_eq!(v.subject_name.as_deref(), Some("foo"));
        assert!(v.subject_simple);
    }
}
