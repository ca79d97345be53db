//! Breakpoint line extraction
//!
//! Maps the statement lines of selected test bodies to the declaration line
//! of the test that owns them. Containment is decided purely on structural
//! paths: a node belongs to a test when the path of the test body's
//! statement block is a strict prefix of the node's path.

use std::collections::BTreeMap;

use serde::Serialize;

use super::selector::Matcher;
use super::source::{NodePath, Source, SyntaxNode};

/// A test found in the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestDescriptor {
    pub title: String,
    /// 1-based line of the registration call
    pub line: usize,
}

/// Breakpoint lines and the tests they belong to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    /// Breakpoint line → declaration line of the owning test
    pub line_map: BTreeMap<usize, usize>,
    /// Criterion the test process should filter on
    pub criterion: Option<Matcher>,
    /// Recorded tests in declaration order
    pub tests: Vec<TestDescriptor>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.line_map.is_empty()
    }

    /// Breakpoint lines in ascending order
    pub fn lines(&self) -> Vec<usize> {
        self.line_map.keys().copied().collect()
    }

    /// Declaration line of the test owning `line`
    pub fn owner_of(&self, line: usize) -> Option<usize> {
        self.line_map.get(&line).copied()
    }
}

/// A registration call with its body block
struct TestScope<'a> {
    descriptor: TestDescriptor,
    body: Option<&'a SyntaxNode>,
}

impl TestScope<'_> {
    fn body_path(&self) -> Option<&NodePath> {
        self.body.map(|b| b.path())
    }
}

/// Recognize `func('title', function () { ... })`
///
/// The callee must be a plain identifier accepted by `func` and the first
/// argument a string literal. The body is the statement block of the second
/// argument when that argument is a function with a block body.
fn registration<'a>(source: &'a Source, node: &'a SyntaxNode, func: &Matcher) -> Option<TestScope<'a>> {
    if node.kind() != "call_expression" {
        return None;
    }

    let callee = node.child_by_field("function")?;
    if callee.kind() != "identifier" || !func.matches(source.node_text(callee)) {
        return None;
    }

    let mut args = node.child_by_field("arguments")?.significant_children();
    let title = source.string_value(args.next()?)?;

    let body = args
        .next()
        .filter(|f| {
            matches!(
                f.kind(),
                "function_expression" | "function" | "arrow_function" | "generator_function"
            )
        })
        .and_then(|f| f.child_by_field("body"))
        .filter(|b| b.kind() == "statement_block");

    Some(TestScope {
        descriptor: TestDescriptor {
            title,
            line: node.line(),
        },
        body,
    })
}

/// Lines of every test whose title satisfies `test`
///
/// Runs in two passes: the first collects matching registration calls and
/// their body blocks, the second assigns each positioned, non-comment node to
/// the innermost collected body containing it. When several nodes start on
/// the same line the one visited last wins.
pub fn extract_by_criterion(source: &Source, func: &Matcher, test: &Matcher) -> ExtractionResult {
    let scopes: Vec<TestScope<'_>> = source
        .nodes()
        .filter_map(|node| registration(source, node, func))
        .filter(|scope| test.matches(&scope.descriptor.title))
        .collect();

    let mut line_map = BTreeMap::new();
    for node in source.nodes().filter(|n| !n.is_comment()) {
        let owner = scopes
            .iter()
            .filter_map(|s| s.body_path().map(|p| (p, s.descriptor.line)))
            .filter(|(body, _)| node.path().is_below(body))
            .max_by_key(|(body, _)| body.len());
        if let Some((_, owner_line)) = owner {
            line_map.insert(node.line(), owner_line);
        }
    }

    tracing::debug!(
        criterion = %test,
        tests = scopes.len(),
        lines = line_map.len(),
        "Extracted lines by criterion"
    );

    ExtractionResult {
        line_map,
        criterion: Some(test.clone()),
        tests: scopes.into_iter().map(|s| s.descriptor).collect(),
    }
}

/// Lines of the test enclosing `line`
///
/// Nodes starting exactly on `line` are tried in document order; when none
/// exists the last node starting before it is the anchor. The first ancestor
/// of the anchor (the anchor included) that is a registration call accepted
/// by `func` is the enclosing test, provided `line` does not lie past the
/// end of that call.
pub fn extract_by_line(source: &Source, func: &Matcher, line: usize) -> ExtractionResult {
    let Some(scope) = enclosing_test(source, func, line) else {
        tracing::debug!(line, "No test encloses line");
        return ExtractionResult::default();
    };

    let mut line_map = BTreeMap::new();
    if let Some(body) = scope.body {
        for node in body.descendants().filter(|n| !n.is_comment()) {
            line_map.insert(node.line(), scope.descriptor.line);
        }
    }

    tracing::debug!(
        line,
        test = %scope.descriptor.title,
        lines = line_map.len(),
        "Extracted lines by position"
    );

    ExtractionResult {
        line_map,
        criterion: Some(Matcher::exact(scope.descriptor.title.clone())),
        tests: vec![scope.descriptor],
    }
}

fn enclosing_test<'a>(source: &'a Source, func: &Matcher, line: usize) -> Option<TestScope<'a>> {
    let exact: Vec<&SyntaxNode> = source.nodes().filter(|n| n.line() == line).collect();
    let anchors = if exact.is_empty() {
        // document order is start order, so the last earlier node is the closest
        source.nodes().filter(|n| n.line() < line).last().into_iter().collect()
    } else {
        exact
    };

    anchors.into_iter().find_map(|anchor| {
        source
            .ancestors_or_self(anchor)
            .find_map(|node| registration(source, node, func).map(|scope| (node, scope)))
            .filter(|(call, _)| line <= call.end_line())
            .map(|(_, scope)| scope)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "/*  1 */
/*  2 */ 'use strict';
/*  3 */
/*  4 */describe ('foobar', function () {
/*  5 */  it ('_foo', function () {
/*  6 */    const a = true;
/*  7 */    if (true) {
/*  8 */      // foo
/*  9 */      foo ();
/* 10 */    } else {
/* 11 */      // bar
/* 12 */      bar ();
/* 13 */    }
/* 14 */  });
/* 15 */  it ('_bar', () => {
/* 16 */    const a = true;
/* 17 */    if (true) {
/* 18 */      // foo
/* 19 */      foo ();
/* 20 */    } else {
/* 21 */      // bar
/* 22 */      bar ();
/* 23 */    }
/* 24 */  });
/* 25 */});
";

    fn source() -> Source {
        Source::parse(SCRIPT).unwrap()
    }

    fn it() -> Matcher {
        Matcher::exact("it")
    }

    fn map(pairs: &[(usize, usize)]) -> BTreeMap<usize, usize> {
        pairs.iter().copied().collect()
    }

    const FOO: &[(usize, usize)] = &[(6, 5), (7, 5), (9, 5), (10, 5), (12, 5)];
    const BAR: &[(usize, usize)] = &[(16, 15), (17, 15), (19, 15), (20, 15), (22, 15)];

    #[test]
    fn test_pattern_unions_all_matches() {
        let result = extract_by_criterion(&source(), &it(), &Matcher::pattern("^_.*").unwrap());
        let expected: Vec<_> = FOO.iter().chain(BAR).copied().collect();
        assert_eq!(result.line_map, map(&expected));
        assert_eq!(
            result.tests,
            vec![
                TestDescriptor { title: "_foo".into(), line: 5 },
                TestDescriptor { title: "_bar".into(), line: 15 },
            ]
        );
    }

    #[test]
    fn test_exact_title_selects_one_test() {
        let result = extract_by_criterion(&source(), &it(), &Matcher::exact("_foo"));
        assert_eq!(result.line_map, map(FOO));
        assert_eq!(result.tests.len(), 1);
        assert_eq!(result.criterion, Some(Matcher::exact("_foo")));
    }

    #[test]
    fn test_unmatched_criterion_is_empty() {
        let result = extract_by_criterion(&source(), &it(), &Matcher::exact("nope"));
        assert!(result.is_empty());
        assert!(result.tests.is_empty());
    }

    #[test]
    fn test_comment_lines_never_extracted() {
        let result = extract_by_criterion(&source(), &it(), &Matcher::pattern(".*").unwrap());
        for comment_only in [8, 11, 18, 21] {
            assert!(!result.line_map.contains_key(&comment_only));
        }
        let by_line = extract_by_line(&source(), &it(), 19);
        for line in [18, 21, 23, 24] {
            assert!(!by_line.line_map.contains_key(&line));
        }
    }

    #[test]
    fn test_function_matcher_filters_callee() {
        let result = extract_by_criterion(&source(), &Matcher::exact("describe"), &Matcher::exact("foobar"));
        assert_eq!(result.tests, vec![TestDescriptor { title: "foobar".into(), line: 4 }]);
        // the describe body holds both tests, so every non-comment line 5..=24 belongs to it
        assert!(result.line_map.contains_key(&5));
        assert!(result.line_map.contains_key(&15));
        assert!(!result.line_map.contains_key(&14));
        assert!(result.line_map.values().all(|&owner| owner == 4));
    }

    #[test]
    fn test_by_line() {
        let src = source();
        assert!(extract_by_line(&src, &it(), 4).is_empty());
        assert_eq!(extract_by_line(&src, &it(), 5).line_map, map(FOO));
        assert_eq!(extract_by_line(&src, &it(), 14).line_map, map(FOO));
        assert_eq!(extract_by_line(&src, &it(), 15).line_map, map(BAR));
        assert_eq!(extract_by_line(&src, &it(), 22).line_map, map(BAR));
        assert_eq!(extract_by_line(&src, &it(), 24).line_map, map(BAR));
        assert!(extract_by_line(&src, &it(), 25).is_empty());
        assert!(extract_by_line(&src, &it(), 1).is_empty());
    }

    #[test]
    fn test_by_line_is_stable_inside_a_body() {
        let src = source();
        let reference = extract_by_line(&src, &it(), 6);
        for line in 6..=14 {
            assert_eq!(extract_by_line(&src, &it(), line), reference, "line {line}");
        }
        assert_eq!(reference.criterion, Some(Matcher::exact("_foo")));
        assert_eq!(reference.tests, vec![TestDescriptor { title: "_foo".into(), line: 5 }]);
    }

    #[test]
    fn test_by_line_between_tests_is_empty() {
        let src = Source::parse(
            "describe('s', () => {\n  it('a', () => {\n    one();\n  });\n\n  it('b', () => {\n    two();\n  });\n});\n",
        )
        .unwrap();
        assert_eq!(extract_by_line(&src, &it(), 3).line_map, map(&[(3, 2)]));
        assert!(extract_by_line(&src, &it(), 5).is_empty());
        assert_eq!(extract_by_line(&src, &it(), 7).line_map, map(&[(7, 6)]));
        assert!(extract_by_line(&src, &it(), 100).is_empty());
    }

    #[test]
    fn test_nested_matches_prefer_innermost_owner() {
        let src = Source::parse(
            "it('outer', () => {\n  setup();\n  it('inner', () => {\n    work();\n  });\n});\n",
        )
        .unwrap();
        let result = extract_by_criterion(&src, &it(), &Matcher::pattern(".").unwrap());
        assert_eq!(result.owner_of(2), Some(1));
        assert_eq!(result.owner_of(4), Some(3));
    }

    #[test]
    fn test_expression_bodies_contribute_no_lines() {
        let src = Source::parse("it('short', () => check());\n").unwrap();
        let result = extract_by_criterion(&src, &it(), &Matcher::exact("short"));
        assert_eq!(result.tests.len(), 1);
        assert!(result.is_empty());
    }

    #[test]
    fn test_non_literal_titles_are_ignored() {
        let src = Source::parse("const name = 'x';\nit(name, () => {\n  run();\n});\n").unwrap();
        let result = extract_by_criterion(&src, &it(), &Matcher::pattern(".*").unwrap());
        assert!(result.tests.is_empty());
        assert!(extract_by_line(&src, &it(), 3).is_empty());
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let src = source();
        let pattern = Matcher::pattern("^_").unwrap();
        let first = extract_by_criterion(&src, &it(), &pattern);
        let _ = extract_by_line(&src, &it(), 22);
        assert_eq!(extract_by_criterion(&src, &it(), &pattern), first);
        assert_eq!(extract_by_line(&src, &it(), 9), extract_by_line(&src, &it(), 9));
    }
}
