//! Python parsing via tree-sitter
//!
//! Wraps the tree-sitter Python grammar and exposes the parsed tree as a
//! [`ParsedArtifact`], the structural representation every later stage
//! works on.

use crate::error::ParseError;
use codegate_artifact::{SourceLocation, Violation};
use tree_sitter::{Node, Parser, Tree};

/// Longest snippet quoted in a syntax violation message
const SNIPPET_LIMIT: usize = 40;

/// Parser for candidate Python source
///
/// Stateless; a fresh `tree_sitter::Parser` is built per call so the type is
/// `Send + Sync` and can be shared across concurrent tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonParser;

impl PythonParser {
    /// Create parser
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse source text into a tree
    ///
    /// Never fails on malformed input: tree-sitter recovers and marks the
    /// damaged region, which [`ParsedArtifact::first_syntax_error`] reports.
    ///
    /// # Errors
    /// Returns `ParseError` if the grammar cannot be loaded or the parser
    /// aborts without producing a tree.
    pub fn parse(&self, source: &str) -> Result<ParsedArtifact, ParseError> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
        let tree = parser.parse(source, None).ok_or(ParseError::Aborted)?;
        Ok(ParsedArtifact {
            source: source.to_string(),
            tree,
        })
    }
}

/// Parsed candidate: the source text plus its syntax tree
#[derive(Debug, Clone)]
pub struct ParsedArtifact {
    source: String,
    tree: Tree,
}

impl ParsedArtifact {
    /// Original source text
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Root `module` node
    #[inline]
    #[must_use]
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Text spanned by a node of this tree
    #[inline]
    #[must_use]
    pub fn text<'a>(&'a self, node: Node<'_>) -> &'a str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }

    /// Whether the tree contains any error or missing node
    #[inline]
    #[must_use]
    pub fn has_syntax_error(&self) -> bool {
        self.root().has_error()
    }

    /// Syntax violation for the first damaged node in document order
    #[must_use]
    pub fn first_syntax_error(&self) -> Option<Violation> {
        if !self.has_syntax_error() {
            return None;
        }

        let mut found = None;
        visit_preorder(self.root(), |node| {
            if node.is_missing() {
                found = Some(Violation::syntax(
                    format!("missing '{}'", node.kind()),
                    location_of(node),
                ));
                Visit::Stop
            } else if node.is_error() {
                found = Some(Violation::syntax(
                    format!("unexpected {}", self.snippet(node)),
                    location_of(node),
                ));
                Visit::Stop
            } else if node.has_error() {
                Visit::Descend
            } else {
                Visit::Skip
            }
        });

        // has_error() guarantees a damaged node exists; fall back to the root
        // rather than reporting nothing.
        found.or_else(|| {
            Some(Violation::syntax(
                "source could not be parsed",
                location_of(self.root()),
            ))
        })
    }

    fn snippet(&self, node: Node<'_>) -> String {
        let text = self.text(node).lines().next().unwrap_or("").trim();
        if text.is_empty() {
            return "token".to_string();
        }
        let clipped: String = text.chars().take(SNIPPET_LIMIT).collect();
        if clipped.len() < text.len() {
            format!("'{clipped}...'")
        } else {
            format!("'{clipped}'")
        }
    }
}

/// Traversal control for [`visit_preorder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Visit this node's children
    Descend,
    /// Skip this node's children
    Skip,
    /// End the traversal
    Stop,
}

/// Depth-first, document-order traversal rooted at `root`
pub fn visit_preorder<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>) -> Visit) {
    let mut cursor = root.walk();
    loop {
        match visit(cursor.node()) {
            Visit::Stop => return,
            Visit::Descend if cursor.goto_first_child() => continue,
            Visit::Descend | Visit::Skip => {}
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// 1-based location of a node's start
#[inline]
#[must_use]
pub fn location_of(node: Node<'_>) -> SourceLocation {
    let point = node.start_position();
    SourceLocation::new(point.row + 1, point.column + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegate_artifact::ViolationKind;

    #[test]
    fn parses_valid_module() {
        let parsed = PythonParser::new()
            .parse("def add(a, b):\n    return a + b\n")
            .unwrap();
        assert!(!parsed.has_syntax_error());
        assert!(parsed.first_syntax_error().is_none());
        assert_eq!(parsed.root().kind(), "module");
    }

    #[test]
    fn reports_first_error_with_location() {
        let source = "x = 1\ndef broken(:\n    return 1\n";
        let parsed = PythonParser::new().parse(source).unwrap();
        let violation = parsed.first_syntax_error().unwrap();
        assert_eq!(violation.kind, ViolationKind::Syntax);
        let loc = violation.location.unwrap();
        assert_eq!(loc.line, 2);
    }

    #[test]
    fn unclosed_paren_is_syntax_error() {
        let parsed = PythonParser::new().parse("value = (1, 2\n").unwrap();
        assert!(parsed.has_syntax_error());
        assert!(parsed.first_syntax_error().is_some());
    }

    #[test]
    fn preorder_visits_in_document_order() {
        let parsed = PythonParser::new().parse("a = 1\nb = 2\n").unwrap();
        let mut names = Vec::new();
        visit_preorder(parsed.root(), |node| {
            if node.kind() == "identifier" {
                names.push(parsed.text(node).to_string());
            }
            Visit::Descend
        });
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn preorder_skip_prunes_subtree() {
        let parsed = PythonParser::new()
            .parse("def f():\n    inner = 1\nouter = 2\n")
            .unwrap();
        let mut names = Vec::new();
        visit_preorder(parsed.root(), |node| match node.kind() {
            "function_definition" => Visit::Skip,
            "identifier" => {
                names.push(parsed.text(node).to_string());
                Visit::Skip
            }
            _ => Visit::Descend,
        });
        assert_eq!(names, vec!["outer"]);
    }
}
