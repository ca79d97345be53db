//! Parsed JavaScript source
//!
//! Wraps tree-sitter's concrete syntax tree in an owned, position-annotated
//! tree of named nodes. Every node knows its structural path from the root,
//! which is what test-body containment is decided on.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::common::{Error, Result};

/// One step from a parent to a named child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathStep {
    /// Grammar field the child occupies, if any
    pub field: Option<&'static str>,
    /// Position among the parent's named children
    pub index: usize,
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(field) => write!(f, "{}[{}]", field, self.index),
            None => write!(f, "{}", self.index),
        }
    }
}

/// Structural path of a node from the root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<PathStep>);

impl NodePath {
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `self` lies inside the subtree rooted at `prefix`, the root included
    pub fn starts_with(&self, prefix: &NodePath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// True when `self` lies strictly below `ancestor`
    pub fn is_below(&self, ancestor: &NodePath) -> bool {
        self.0.len() > ancestor.0.len() && self.starts_with(ancestor)
    }

    /// The first `len` steps
    pub fn prefix(&self, len: usize) -> NodePath {
        NodePath(self.0[..len.min(self.0.len())].to_vec())
    }

    fn child(&self, step: PathStep) -> NodePath {
        let mut steps = self.0.clone();
        steps.push(step);
        NodePath(steps)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// A named node of the parsed tree
#[derive(Debug, Clone)]
pub struct SyntaxNode {
    kind: &'static str,
    line: usize,
    end_line: usize,
    column: usize,
    start_byte: usize,
    end_byte: usize,
    path: NodePath,
    children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// 1-based start line
    pub fn line(&self) -> usize {
        self.line
    }

    /// 1-based end line
    pub fn end_line(&self) -> usize {
        self.end_line
    }

    /// 0-based start column
    pub fn column(&self) -> usize {
        self.column
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn children(&self) -> &[SyntaxNode] {
        &self.children
    }

    pub fn is_comment(&self) -> bool {
        self.kind.ends_with("comment")
    }

    /// First child stored under the given grammar field
    pub fn child_by_field(&self, field: &str) -> Option<&SyntaxNode> {
        self.children.iter().find(|c| {
            c.path
                .steps()
                .last()
                .and_then(|s| s.field)
                .is_some_and(|f| f == field)
        })
    }

    /// Named children that are not comments
    pub fn significant_children(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.children.iter().filter(|c| !c.is_comment())
    }

    /// This node and everything below it, in document order
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    /// Everything below this node, in document order
    pub fn descendants(&self) -> impl Iterator<Item = &SyntaxNode> {
        self.preorder().skip(1)
    }
}

/// Document-order walk over a subtree
pub struct Preorder<'a> {
    stack: Vec<&'a SyntaxNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a SyntaxNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Immutable source text with its parsed tree
#[derive(Debug, Clone)]
pub struct Source {
    text: String,
    root: SyntaxNode,
}

impl Source {
    /// Parse JavaScript (JSX allowed)
    ///
    /// Any syntax error fails the parse, reported at the first offending node.
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let text = text.into();

        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .map_err(|e| Error::Internal(format!("Failed to load JavaScript grammar: {}", e)))?;

        let tree = parser
            .parse(&text, None)
            .ok_or_else(|| Error::Internal("Parser returned no tree".to_string()))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(syntax_error(root));
        }

        let root = build(root, NodePath::default());
        Ok(Self { text, root })
    }

    /// Read and parse a script from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::script_read(path, e))?;
        Self::parse(text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn root(&self) -> &SyntaxNode {
        &self.root
    }

    pub fn node_text(&self, node: &SyntaxNode) -> &str {
        self.text.get(node.start_byte..node.end_byte).unwrap_or("")
    }

    /// Every node in document order, the root included
    pub fn nodes(&self) -> Preorder<'_> {
        self.root.preorder()
    }

    /// Resolve a structural path back to its node
    pub fn node_at(&self, path: &NodePath) -> Option<&SyntaxNode> {
        let mut node = &self.root;
        for step in path.steps() {
            node = node.children.get(step.index)?;
        }
        Some(node)
    }

    /// The node itself, then its parent, up to the root
    pub fn ancestors_or_self<'a>(
        &'a self,
        node: &'a SyntaxNode,
    ) -> impl Iterator<Item = &'a SyntaxNode> + 'a {
        (0..=node.path.len())
            .rev()
            .filter_map(move |len| self.node_at(&node.path.prefix(len)))
    }

    /// Value of a string literal (or a template without substitutions)
    pub fn string_value(&self, node: &SyntaxNode) -> Option<String> {
        let raw = self.node_text(node);
        let inner = match node.kind {
            "string" => raw.get(1..raw.len().checked_sub(1)?)?,
            "template_string" if node.children.iter().all(|c| c.kind != "template_substitution") => {
                raw.get(1..raw.len().checked_sub(1)?)?
            }
            _ => return None,
        };
        Some(unescape(inner))
    }

    /// Parameter names of every function, keyed by where the function starts
    pub fn function_signatures(&self) -> FunctionSignatures {
        let mut signatures = FunctionSignatures::default();
        for node in self.nodes() {
            if !FUNCTION_KINDS.contains(&node.kind) {
                continue;
            }
            let names = match node.child_by_field("parameters") {
                Some(params) => params
                    .significant_children()
                    .filter_map(|p| self.parameter_name(p))
                    .collect(),
                // `x => x + 1`
                None => node
                    .child_by_field("parameter")
                    .filter(|p| p.kind == "identifier")
                    .map(|p| vec![self.node_text(p).to_string()])
                    .unwrap_or_default(),
            };
            signatures.insert(node.line, node.column, names);
        }
        signatures
    }

    fn parameter_name(&self, param: &SyntaxNode) -> Option<String> {
        match param.kind {
            "identifier" => Some(self.node_text(param).to_string()),
            "assignment_pattern" => param
                .child_by_field("left")
                .filter(|l| l.kind == "identifier")
                .map(|l| self.node_text(l).to_string()),
            "rest_pattern" => param
                .significant_children()
                .find(|c| c.kind == "identifier")
                .map(|c| self.node_text(c).to_string()),
            // destructured parameters have no single name
            _ => None,
        }
    }
}

const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "function_expression",
    "function",
    "arrow_function",
    "method_definition",
    "generator_function",
    "generator_function_declaration",
];

/// Parameter names by function start position
#[derive(Debug, Clone, Default)]
pub struct FunctionSignatures {
    by_line: HashMap<usize, Vec<(usize, Vec<String>)>>,
}

impl FunctionSignatures {
    fn insert(&mut self, line: usize, column: usize, params: Vec<String>) {
        let entries = self.by_line.entry(line).or_default();
        entries.push((column, params));
        entries.sort_by_key(|(col, _)| *col);
    }

    /// Parameters of the innermost function starting on `line` at or before `column`
    pub fn lookup(&self, line: usize, column: usize) -> Option<&[String]> {
        self.by_line
            .get(&line)?
            .iter()
            .rev()
            .find(|(col, _)| *col <= column)
            .map(|(_, params)| params.as_slice())
    }
}

fn build(node: tree_sitter::Node<'_>, path: NodePath) -> SyntaxNode {
    let mut children = Vec::new();
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        let mut index = 0;
        loop {
            let child = cursor.node();
            if child.is_named() {
                let step = PathStep {
                    field: cursor.field_name(),
                    index,
                };
                children.push(build(child, path.child(step)));
                index += 1;
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }

    let start = node.start_position();
    let end = node.end_position();
    SyntaxNode {
        kind: node.kind(),
        line: start.row + 1,
        end_line: end.row + 1,
        column: start.column,
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
        path,
        children,
    }
}

fn syntax_error(root: tree_sitter::Node<'_>) -> Error {
    let culprit = first_error(root).unwrap_or(root);
    let position = culprit.start_position();
    let message = if culprit.is_missing() {
        format!("Missing {}", culprit.kind())
    } else {
        "Unexpected token".to_string()
    };
    Error::ScriptParse {
        message,
        line: position.row + 1,
        column: position.column + 1,
    }
}

fn first_error(node: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_are_one_based() {
        let source = Source::parse("\nfoo();\n").unwrap();
        let call = source
            .nodes()
            .find(|n| n.kind() == "call_expression")
            .unwrap();
        assert_eq!(call.line(), 2);
        assert_eq!(call.end_line(), 2);
    }

    #[test]
    fn test_paths_resolve_back_to_their_node() {
        let source = Source::parse("it('x', function () { let a = 1; });").unwrap();
        for node in source.nodes() {
            let found = source.node_at(node.path()).unwrap();
            assert_eq!(found.kind(), node.kind());
            assert_eq!(found.line(), node.line());
        }
    }

    #[test]
    fn test_paths_carry_field_names() {
        let source = Source::parse("it('x', () => {});").unwrap();
        let call = source
            .nodes()
            .find(|n| n.kind() == "call_expression")
            .unwrap();
        let callee = call.child_by_field("function").unwrap();
        assert_eq!(source.node_text(callee), "it");
        assert_eq!(callee.path().steps().last().unwrap().field, Some("function"));
        assert!(callee.path().is_below(call.path()));
        assert!(!call.path().is_below(call.path()));
        assert!(call.path().starts_with(call.path()));
    }

    #[test]
    fn test_comments_are_nodes() {
        let source = Source::parse("// hello\n/* there */\nfoo();").unwrap();
        let comments: Vec<_> = source.nodes().filter(|n| n.is_comment()).collect();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1].line(), 2);
    }

    #[test]
    fn test_syntax_error_is_input_error() {
        let err = Source::parse("'use strict';\n\nfoo(;\n").unwrap_err();
        match err {
            Error::ScriptParse { line, .. } => assert_eq!(line, 3),
            other => panic!("Expected ScriptParse, got {other:?}"),
        }
    }

    #[test]
    fn test_jsx_parses() {
        assert!(Source::parse("it('renders', () => { const el = <div id=\"a\">hi</div>; });").is_ok());
    }

    #[test]
    fn test_string_values() {
        let source = Source::parse(r#"f("a\"b", 'c', `d`, `e${x}`);"#).unwrap();
        let args = source
            .nodes()
            .find(|n| n.kind() == "arguments")
            .unwrap();
        let values: Vec<_> = args
            .significant_children()
            .map(|a| source.string_value(a))
            .collect();
        assert_eq!(
            values,
            vec![
                Some("a\"b".to_string()),
                Some("c".to_string()),
                Some("d".to_string()),
                None
            ]
        );
    }

    #[test]
    fn test_function_signatures() {
        let source = Source::parse(
            "function add(a, b = 2, ...rest) {}\nconst f = x => x;\nit('t', function (done) {});\n",
        )
        .unwrap();
        let sigs = source.function_signatures();
        assert_eq!(sigs.lookup(1, 0).unwrap(), ["a", "b", "rest"]);
        assert_eq!(sigs.lookup(2, 10).unwrap(), ["x"]);
        // reported column may point past the `function` keyword
        assert_eq!(sigs.lookup(3, 17).unwrap(), ["done"]);
        assert!(sigs.lookup(4, 0).is_none());
    }
}
