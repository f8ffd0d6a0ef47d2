//! Static cross-file context.
//!
//! Collected once over every parsed file before any decision is made, then
//! read-only:
//! - the mock framework configured for the project (`mock_with :mocha`)
//! - per file, which `let` names are plain or verifying doubles
//! - per file, whether `example` / `running_example` is redefined locally

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;
use tree_sitter::Node;

use crate::parser::{node_text, symbol_name, CallParts, ParsedSource, BINDING_PARENTS};

/// Mock library the suite is configured to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MockFramework {
    #[default]
    RSpec,
    Mocha,
    Flexmock,
    Rr,
    /// Other or unrecognized library.
    Other,
    /// More than one framework is configured.
    Conflicting,
}

impl MockFramework {
    fn from_symbol(name: &str) -> Self {
        match name {
            "rspec" => MockFramework::RSpec,
            "mocha" => MockFramework::Mocha,
            "flexmock" => MockFramework::Flexmock,
            "rr" => MockFramework::Rr,
            _ => MockFramework::Other,
        }
    }
}

/// What a `let` statically evaluates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoubleKind {
    Plain,
    Verifying,
}

const PLAIN_DOUBLES: &[&str] = &["double", "mock", "stub", "spy"];
const VERIFYING_DOUBLES: &[&str] = &[
    "instance_double",
    "class_double",
    "object_double",
    "instance_spy",
    "class_spy",
    "object_spy",
];
const EXAMPLE_NAMES: &[&str] = &["example", "running_example"];

#[derive(Debug, Clone, Default)]
pub struct StaticContext {
    frameworks: BTreeSet<MockFramework>,
    /// path -> let name -> kind; `None` when declarations disagree.
    doubles: BTreeMap<String, BTreeMap<String, Option<DoubleKind>>>,
    /// path -> locally defined names that shadow the current-example helper.
    shadowed: BTreeMap<String, BTreeSet<String>>,
}

impl StaticContext {
    /// Run the collection pass over `(path, parsed)` pairs.
    pub fn collect<'a, I>(files: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a ParsedSource)>,
    {
        let mut ctx = StaticContext::default();
        for (path, parsed) in files {
            let mut visitor = Collector {
                ctx: &mut ctx,
                path,
                text: parsed.text(),
            };
            visitor.visit(parsed.root());
        }
        debug!(
            framework = ?ctx.mock_framework(),
            files_with_lets = ctx.doubles.len(),
            "static context collected"
        );
        ctx
    }

    /// The active mock framework; RSpec's own when nothing is configured.
    pub fn mock_framework(&self) -> MockFramework {
        let mut iter = self.frameworks.iter();
        match (iter.next(), iter.next()) {
            (None, _) => MockFramework::RSpec,
            (Some(one), None) => *one,
            (Some(_), Some(_)) => MockFramework::Conflicting,
        }
    }

    /// Statically known double kind of a `let` name in a file.
    pub fn double_kind(&self, path: &str, name: &str) -> Option<DoubleKind> {
        self.doubles.get(path)?.get(name).copied().flatten()
    }

    pub fn shadows_example(&self, path: &str, name: &str) -> bool {
        self.shadowed
            .get(path)
            .map(|names| names.contains(name))
            .unwrap_or(false)
    }
}

struct Collector<'c, 'a> {
    ctx: &'c mut StaticContext,
    path: &'a str,
    text: &'a str,
}

impl Collector<'_, '_> {
    fn visit(&mut self, node: Node<'_>) {
        match node.kind() {
            "call" => self.visit_call(node),
            "assignment" => self.visit_assignment(node),
            "method" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.shadow(node_text(name, self.text));
                }
            }
            "operator_assignment" => self.shadow_identifier(node.child_by_field_name("left")),
            "for" => self.shadow_identifier(node.child_by_field_name("pattern")),
            kind if BINDING_PARENTS.contains(&kind) => {
                let mut cursor = node.walk();
                let targets: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
                for target in targets {
                    self.shadow_identifier(Some(target));
                }
            }
            _ => {}
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(child);
        }
    }

    fn shadow(&mut self, name: &str) {
        if EXAMPLE_NAMES.contains(&name) {
            self.ctx
                .shadowed
                .entry(self.path.to_string())
                .or_default()
                .insert(name.to_string());
        }
    }

    fn shadow_identifier(&mut self, node: Option<Node<'_>>) {
        if let Some(node) = node.filter(|n| n.kind() == "identifier") {
            self.shadow(node_text(node, self.text));
        }
    }

    fn visit_call(&mut self, node: Node<'_>) {
        let Some(call) = CallParts::of(node) else {
            return;
        };
        let first_symbol = call
            .args()
            .first()
            .and_then(|a| symbol_name(*a, self.text));
        match call.name(self.text) {
            "mock_with" => {
                if let Some(name) = first_symbol {
                    self.ctx.frameworks.insert(MockFramework::from_symbol(name));
                }
            }
            "let" | "let!" if call.receiver.is_none() => {
                let Some(name) = first_symbol else {
                    return;
                };
                self.shadow(name);
                let kind = call.block.and_then(|b| self.block_double_kind(b));
                if let Some(kind) = kind {
                    let slot = self
                        .ctx
                        .doubles
                        .entry(self.path.to_string())
                        .or_default()
                        .entry(name.to_string())
                        .or_insert(Some(kind));
                    if *slot != Some(kind) {
                        *slot = None;
                    }
                }
            }
            _ => {}
        }
    }

    fn visit_assignment(&mut self, node: Node<'_>) {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return;
        };
        if left.kind() == "identifier" {
            self.shadow(node_text(left, self.text));
            return;
        }
        // `config.mock_framework = :mocha`
        let Some(setter) = CallParts::of(left) else {
            return;
        };
        if setter.name(self.text) == "mock_framework" {
            if let Some(name) = symbol_name(right, self.text) {
                self.ctx.frameworks.insert(MockFramework::from_symbol(name));
            }
        }
    }

    /// Kind of double a `let` block evaluates to, when its body is a single
    /// double constructor call.
    fn block_double_kind(&self, block: Node<'_>) -> Option<DoubleKind> {
        let body = block.child_by_field_name("body")?;
        let mut cursor = body.walk();
        let statements: Vec<Node<'_>> = body
            .named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .collect();
        let [expr] = statements.as_slice() else {
            return None;
        };
        let call = CallParts::of(*expr)?;
        if call.receiver.is_some() {
            return None;
        }
        let name = call.name(self.text);
        if PLAIN_DOUBLES.contains(&name) {
            Some(DoubleKind::Plain)
        } else if VERIFYING_DOUBLES.contains(&name) {
            Some(DoubleKind::Verifying)
        } else {
            None
        }
    }
}
