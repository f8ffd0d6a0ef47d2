//! Structural parser for Ruby source, backed by tree-sitter-ruby.
//!
//! A file either parses cleanly or fails with a [`SyntaxError`] pointing at
//! the first `ERROR` or `MISSING` node. Partial trees are never handed to the
//! construct catalog: rewriting around a misparsed region could corrupt it.

use respec_core::patch::Span;
use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

// ============================================================================
// Errors
// ============================================================================

/// A file could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at {line}:{column}: {message}")]
pub struct SyntaxError {
    /// 1-indexed line.
    pub line: u32,
    /// 1-indexed byte column.
    pub column: u32,
    pub message: String,
}

impl SyntaxError {
    fn at(node: Node<'_>, message: String) -> Self {
        let pos = node.start_position();
        SyntaxError {
            line: pos.row as u32 + 1,
            column: pos.column as u32 + 1,
            message,
        }
    }
}

// ============================================================================
// Parsed Source
// ============================================================================

/// A successfully parsed file.
pub struct ParsedSource {
    text: String,
    tree: Tree,
}

impl std::fmt::Debug for ParsedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedSource")
            .field("len", &self.text.len())
            .finish()
    }
}

impl ParsedSource {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }
}

/// Parse Ruby source text.
pub fn parse(text: &str) -> Result<ParsedSource, SyntaxError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_ruby::LANGUAGE.into())
        .map_err(|e| SyntaxError {
            line: 1,
            column: 1,
            message: format!("ruby grammar unavailable: {}", e),
        })?;

    let tree = parser.parse(text, None).ok_or_else(|| SyntaxError {
        line: 1,
        column: 1,
        message: "parser produced no tree".to_string(),
    })?;

    if let Some(err) = first_error(tree.root_node(), text) {
        return Err(err);
    }

    Ok(ParsedSource {
        text: text.to_string(),
        tree,
    })
}

fn first_error(node: Node<'_>, text: &str) -> Option<SyntaxError> {
    if node.is_missing() {
        return Some(SyntaxError::at(node, format!("missing `{}`", node.kind())));
    }
    if node.is_error() {
        let snippet: String = node_text(node, text)
            .lines()
            .next()
            .unwrap_or_default()
            .chars()
            .take(24)
            .collect();
        let message = if snippet.is_empty() {
            "unexpected end of input".to_string()
        } else {
            format!("unexpected `{}`", snippet)
        };
        return Some(SyntaxError::at(node, message));
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(err) = first_error(child, text) {
            return Some(err);
        }
    }
    None
}

// ============================================================================
// Node Helpers
// ============================================================================

/// Source text of a node.
pub fn node_text<'a>(node: Node<'_>, text: &'a str) -> &'a str {
    text.get(node.byte_range()).unwrap_or_default()
}

/// Byte span of a node.
pub fn node_span(node: Node<'_>) -> Span {
    Span::new(node.start_byte(), node.end_byte())
}

/// Whether `node` is the given field of its parent.
pub fn is_field_of_parent(node: Node<'_>, field: &str) -> bool {
    node.parent()
        .and_then(|p| p.child_by_field_name(field))
        .map(|c| c.id() == node.id())
        .unwrap_or(false)
}

/// Nodes whose identifier children are assignment targets
/// (`a, b = pair`, `(a, b), c = x`, `*rest = x`, `rescue => e`).
pub const BINDING_PARENTS: &[&str] = &[
    "left_assignment_list",
    "destructured_left_assignment",
    "rest_assignment",
    "exception_variable",
];

/// Named children of an `argument_list`, skipping comments.
pub fn arguments(args: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = args.walk();
    args.named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect()
}

/// The pieces of a Ruby method call.
///
/// tree-sitter-ruby models both `recv.m(args)` and receiverless `m(args)` as
/// `call` nodes; a bare receiverless name without arguments is an
/// `identifier` and is represented with only `method` set.
#[derive(Debug, Clone, Copy)]
pub struct CallParts<'t> {
    pub node: Node<'t>,
    pub receiver: Option<Node<'t>>,
    pub method: Node<'t>,
    pub arguments: Option<Node<'t>>,
    pub block: Option<Node<'t>>,
}

impl<'t> CallParts<'t> {
    /// Decompose a `call` node, or a lone `identifier` that is not itself the
    /// method or receiver part of some enclosing call.
    pub fn of(node: Node<'t>) -> Option<Self> {
        match node.kind() {
            "call" => Some(CallParts {
                node,
                receiver: node.child_by_field_name("receiver"),
                method: node.child_by_field_name("method")?,
                arguments: node.child_by_field_name("arguments"),
                block: node.child_by_field_name("block"),
            }),
            "identifier" if !is_field_of_parent(node, "method") => Some(CallParts {
                node,
                receiver: None,
                method: node,
                arguments: None,
                block: None,
            }),
            _ => None,
        }
    }

    pub fn name<'a>(&self, text: &'a str) -> &'a str {
        node_text(self.method, text)
    }

    pub fn args(&self) -> Vec<Node<'t>> {
        self.arguments.map(arguments).unwrap_or_default()
    }

    /// Whether the method is called with `.` (not `&.` or `::`).
    pub fn has_plain_dot(&self, text: &str) -> bool {
        match self.receiver {
            Some(receiver) => text
                .get(receiver.end_byte()..self.method.start_byte())
                .map(|between| between.trim() == ".")
                .unwrap_or(false),
            None => false,
        }
    }
}

/// Names declared as parameters of a block, lambda or method, including
/// names inside destructuring patterns like `|(a, b)|`.
pub fn parameter_names<'a>(node: Node<'_>, text: &'a str) -> Vec<&'a str> {
    let mut names = Vec::new();
    if let Some(params) = node.child_by_field_name("parameters") {
        collect_parameter_names(params, text, &mut names);
    }
    names
}

fn collect_parameter_names<'a>(params: Node<'_>, text: &'a str, names: &mut Vec<&'a str>) {
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        match param.kind() {
            "identifier" => names.push(node_text(param, text)),
            "destructured_parameter" => collect_parameter_names(param, text, names),
            _ => {
                if let Some(ident) = param.child_by_field_name("name") {
                    names.push(node_text(ident, text));
                }
            }
        }
    }
}

/// Literal symbol name (`:foo` or `foo:` key), without punctuation.
pub fn symbol_name<'a>(node: Node<'_>, text: &'a str) -> Option<&'a str> {
    let raw = node_text(node, text);
    match node.kind() {
        "simple_symbol" => raw.strip_prefix(':'),
        "hash_key_symbol" => Some(raw),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_spec() {
        let src = "describe Foo do\n  it { foo.should == 1 }\nend\n";
        let parsed = parse(src).unwrap();
        assert_eq!(parsed.root().kind(), "program");
        assert_eq!(parsed.text(), src);
    }

    #[test]
    fn reports_location_of_error() {
        let src = "describe Foo do\n  it 'x' do\n    foo.should ==\n  end\n";
        let err = parse(src).unwrap_err();
        assert!(err.line >= 3, "unexpected location {:?}", err);
        assert!(err.to_string().starts_with("syntax error at "));
    }

    #[test]
    fn call_parts_of_receiver_call() {
        let src = "foo.stub(:bar)";
        let parsed = parse(src).unwrap();
        let call = parsed.root().named_child(0).unwrap();
        let parts = CallParts::of(call).unwrap();
        assert_eq!(parts.name(src), "stub");
        assert_eq!(node_text(parts.receiver.unwrap(), src), "foo");
        assert_eq!(parts.args().len(), 1);
        assert!(parts.has_plain_dot(src));
        assert_eq!(symbol_name(parts.args()[0], src), Some("bar"));
    }

    #[test]
    fn bare_identifier_is_a_call_without_parts() {
        let src = "pending";
        let parsed = parse(src).unwrap();
        let node = parsed.root().named_child(0).unwrap();
        let parts = CallParts::of(node).unwrap();
        assert_eq!(parts.name(src), "pending");
        assert!(parts.receiver.is_none());
        assert!(parts.arguments.is_none());
    }

    #[test]
    fn block_parameters_are_listed() {
        let src = "around do |ex, other|\nend\n";
        let parsed = parse(src).unwrap();
        let call = parsed.root().named_child(0).unwrap();
        let block = call.child_by_field_name("block").unwrap();
        assert_eq!(parameter_names(block, src), vec!["ex", "other"]);
    }

    #[test]
    fn destructured_and_method_parameters_are_listed() {
        let src = "list.each { |(example, i), *rest| }\n";
        let parsed = parse(src).unwrap();
        let call = parsed.root().named_child(0).unwrap();
        let block = call.child_by_field_name("block").unwrap();
        assert_eq!(parameter_names(block, src), vec!["example", "i", "rest"]);

        let src = "def helper(example, opts = {}, &blk)\nend\n";
        let parsed = parse(src).unwrap();
        let method = parsed.root().named_child(0).unwrap();
        assert_eq!(parameter_names(method, src), vec!["example", "opts", "blk"]);
    }
}
