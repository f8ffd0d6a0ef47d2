//! `have(n).items` collection matchers.
//!
//! `obj.should have(3).items` becomes `expect(obj.size).to eq(3)`. With any
//! collection name other than `items` the subject may own the collection
//! (`team.should have(3).players` means `team.players.size`), or be the
//! collection itself; which one is decided by whether the subject responds to
//! the collection name at runtime. A one-liner `should have(3).items` becomes
//! `expect(subject.size).to eq(3)`.

use respec_core::facts::{FactKind, FactValue};
use respec_core::patch::{Replacement, Span};
use respec_core::report::Confidence;
use tree_sitter::Node;

use super::{
    expectation_call_of, ConstructInstance, ConstructKind, DecideContext, Decision, FactRequest,
    MatchEnv, ALL_EXPECTATIONS,
};
use crate::parser::{node_span, CallParts};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaveKind {
    Exactly,
    AtLeast,
    AtMost,
}

/// The expectation the matcher is passed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// `subject.should have(n).items`.
    Should { subject: Span },
    /// One-liner `should have(n).items`.
    ImplicitShould,
    /// `expect(subject).to have(n).items`.
    ExpectTo { subject: Span },
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaveItemsView {
    pub have: HaveKind,
    pub count: Span,
    pub collection: String,
    pub collection_has_args: bool,
    pub expectation: Expectation,
}

fn expectation_of(node: Node<'_>, text: &str) -> Expectation {
    let Some(call) = expectation_call_of(node, text, ALL_EXPECTATIONS).and_then(CallParts::of) else {
        return Expectation::Unknown;
    };
    match (call.name(text), call.receiver) {
        ("should" | "should_not", Some(receiver)) => Expectation::Should {
            subject: node_span(receiver),
        },
        ("should" | "should_not", None) => Expectation::ImplicitShould,
        (_, Some(receiver)) => {
            let Some(expect) = CallParts::of(receiver) else {
                return Expectation::Unknown;
            };
            match (expect.name(text), expect.receiver, expect.args().as_slice()) {
                ("expect", None, [arg]) => Expectation::ExpectTo {
                    subject: node_span(*arg),
                },
                _ => Expectation::Unknown,
            }
        }
        _ => Expectation::Unknown,
    }
}

pub fn matches(node: Node<'_>, env: &MatchEnv<'_>) -> Option<HaveItemsView> {
    if node.kind() != "call" {
        return None;
    }
    let call = CallParts::of(node)?;
    let receiver = call.receiver?;
    if !call.has_plain_dot(env.text) || call.block.is_some() {
        return None;
    }
    let have = CallParts::of(receiver)?;
    let kind = match have.name(env.text) {
        "have" | "have_exactly" => HaveKind::Exactly,
        "have_at_least" => HaveKind::AtLeast,
        "have_at_most" => HaveKind::AtMost,
        _ => return None,
    };
    let count = match (have.receiver, have.args().as_slice()) {
        (None, [count]) => node_span(*count),
        _ => return None,
    };
    Some(HaveItemsView {
        have: kind,
        count,
        collection: call.name(env.text).to_string(),
        collection_has_args: call.arguments.is_some(),
        expectation: expectation_of(node, env.text),
    })
}

fn explicit_subject(view: &HaveItemsView) -> Option<Span> {
    match view.expectation {
        Expectation::Should { subject } | Expectation::ExpectTo { subject } => Some(subject),
        _ => None,
    }
}

pub fn fact_requests(view: &HaveItemsView) -> Vec<FactRequest> {
    match explicit_subject(view) {
        Some(subject) if view.collection != "items" && !view.collection_has_args => vec![
            FactRequest::new(subject, FactKind::RespondsTo(view.collection.clone())),
        ],
        _ => Vec::new(),
    }
}

/// Text to append to the subject so that it evaluates to the collection size.
pub fn subject_suffix(view: &HaveItemsView, ctx: &DecideContext<'_>) -> Result<String, String> {
    if view.collection_has_args {
        return Err(format!("collection `{}` takes arguments", view.collection));
    }
    if view.collection == "items" {
        return match view.expectation {
            Expectation::Unknown => Err("collection matcher has no known subject".to_string()),
            _ => Ok(".size".to_string()),
        };
    }
    let subject = explicit_subject(view).ok_or_else(|| {
        format!(
            "cannot observe whether the implicit subject responds to `{}`",
            view.collection
        )
    })?;
    let kind = FactKind::RespondsTo(view.collection.clone());
    match ctx.fact(subject, &kind).and_then(FactValue::as_bool) {
        Some(true) => Ok(format!(".{}.size", view.collection)),
        Some(false) => Ok(".size".to_string()),
        None => Err(format!(
            "not observed whether the subject responds to `{}`",
            view.collection
        )),
    }
}

fn matcher_text(view: &HaveItemsView, ctx: &DecideContext<'_>) -> (String, &'static str) {
    let count = ctx.slice(view.count);
    match view.have {
        HaveKind::Exactly => (format!("eq({})", count), "eq(n)"),
        HaveKind::AtLeast => (format!("be >= {}", count), "be >= n"),
        HaveKind::AtMost => (format!("be <= {}", count), "be <= n"),
    }
}

pub fn decide(instance: &ConstructInstance, view: &HaveItemsView, ctx: &DecideContext<'_>) -> Decision {
    let suffix = match subject_suffix(view, ctx) {
        Ok(suffix) => suffix,
        Err(reason) => return Decision::ambiguous(reason),
    };
    let (matcher, shape) = matcher_text(view, ctx);
    let original = match view.have {
        HaveKind::Exactly => "have(n).items",
        HaveKind::AtLeast => "have_at_least(n).items",
        HaveKind::AtMost => "have_at_most(n).items",
    };
    let converted = format!("expect(obj{}).to {}", suffix.replace(&view.collection, "items"), shape);

    let should_converted = ctx
        .parent(instance)
        .filter(|p| p.kind == ConstructKind::Should)
        .and_then(|p| ctx.decision(p.id))
        .map(Decision::is_conversion)
        .unwrap_or(false);
    if view.expectation == Expectation::ImplicitShould && !should_converted {
        return Decision::ambiguous("one-liner `should` was left unconverted");
    }
    let should_carries_suffix = should_converted
        && matches!(
            view.expectation,
            Expectation::Should { .. } | Expectation::ImplicitShould
        );

    let mut replacements = Vec::new();
    if !should_carries_suffix {
        if let Some(subject) = explicit_subject(view) {
            replacements.push(Replacement::insert(subject.end, suffix));
        }
    }
    replacements.push(Replacement::replace(instance.span, matcher));

    Decision::convert(Confidence::Certain, replacements, original, converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::test_support::suite_of;
    use crate::syntax::Construct;

    fn view(src: &str) -> HaveItemsView {
        let suite = suite_of(src);
        let found = suite.files()[0]
            .instances()
            .iter()
            .find_map(|i| match &i.construct {
                Construct::HaveItems(v) => Some(v.clone()),
                _ => None,
            });
        found.expect("no have matcher found")
    }

    #[test]
    fn should_form() {
        let v = view("it { team.should have(3).players }\n");
        assert_eq!(v.have, HaveKind::Exactly);
        assert_eq!(v.collection, "players");
        assert!(matches!(v.expectation, Expectation::Should { .. }));
        assert_eq!(fact_requests(&v).len(), 1);
    }

    #[test]
    fn expect_form_and_bounds() {
        let v = view("it { expect(list).to have_at_least(2).items }\n");
        assert_eq!(v.have, HaveKind::AtLeast);
        assert!(matches!(v.expectation, Expectation::ExpectTo { .. }));
        assert!(fact_requests(&v).is_empty());
    }

    #[test]
    fn implicit_subject() {
        let v = view("it { should have(1).error_on(:name) }\n");
        assert_eq!(v.expectation, Expectation::ImplicitShould);
        assert!(v.collection_has_args);
    }
}
