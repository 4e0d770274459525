//! Top-level module outline
//!
//! Extracts the declarations structural requirements are checked against:
//! top-level functions, classes and their methods, the `__main__` guard,
//! and the names defined at module level.

use crate::parser::{location_of, visit_preorder, ParsedArtifact, Visit};
use codegate_artifact::SourceLocation;
use std::collections::BTreeSet;
use tree_sitter::Node;

/// Outline of one top-level (or class-level) function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionOutline {
    /// Function name
    pub name: String,
    /// Parameter names in declaration order (splats keep their `*`/`**`)
    pub params: Vec<String>,
    /// Parameters without a default value, excluding splats
    pub required_arity: usize,
    /// Declared with `async def`
    pub is_async: bool,
    /// Body contains `return <expr>` or `yield`, outside nested scopes
    pub returns_value: bool,
    /// Location of the definition
    pub location: SourceLocation,
}

/// Outline of one top-level class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassOutline {
    /// Class name
    pub name: String,
    /// Methods defined directly in the class body
    pub methods: Vec<FunctionOutline>,
    /// Location of the definition
    pub location: SourceLocation,
}

/// Declarations found at module level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleOutline {
    /// Top-level functions, in document order
    pub functions: Vec<FunctionOutline>,
    /// Top-level classes, in document order
    pub classes: Vec<ClassOutline>,
    /// Module has an `if __name__ == "__main__":` block
    pub has_main_guard: bool,
    /// Names defined at module level by `def` or `class`
    pub bindings: BTreeSet<String>,
    /// Names removed by a `del` statement anywhere in the module
    pub deleted: BTreeSet<String>,
    /// Module contains nothing but comments
    pub is_empty: bool,
}

impl ModuleOutline {
    /// Build the outline of a parsed module
    #[must_use]
    pub fn of(parsed: &ParsedArtifact) -> Self {
        let root = parsed.root();
        let mut outline = Self {
            is_empty: true,
            ..Self::default()
        };

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if child.kind() == "comment" {
                continue;
            }
            outline.is_empty = false;

            match child.kind() {
                "function_definition" | "class_definition" | "decorated_definition" => {
                    outline.add_definition(parsed, unwrap_decorated(child));
                }
                "if_statement" => {
                    if is_main_guard(parsed, child) {
                        outline.has_main_guard = true;
                    }
                }
                _ => {}
            }
        }

        collect_deleted_names(parsed, root, &mut outline.deleted);
        outline
    }

    /// Top-level function by name
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&FunctionOutline> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Whether a module-level definition shadows `name`
    ///
    /// Assignments never shadow: `eval = eval` still refers to the builtin.
    /// A name that is ever deleted is not considered shadowed.
    #[inline]
    #[must_use]
    pub fn binds(&self, name: &str) -> bool {
        self.bindings.contains(name) && !self.deleted.contains(name)
    }

    fn add_definition(&mut self, parsed: &ParsedArtifact, node: Node<'_>) {
        match node.kind() {
            "function_definition" => {
                if let Some(function) = function_outline(parsed, node) {
                    self.bindings.insert(function.name.clone());
                    self.functions.push(function);
                }
            }
            "class_definition" => {
                if let Some(class) = class_outline(parsed, node) {
                    self.bindings.insert(class.name.clone());
                    self.classes.push(class);
                }
            }
            _ => {}
        }
    }
}

fn unwrap_decorated(node: Node<'_>) -> Node<'_> {
    if node.kind() == "decorated_definition" {
        node.child_by_field_name("definition").unwrap_or(node)
    } else {
        node
    }
}

fn function_outline(parsed: &ParsedArtifact, node: Node<'_>) -> Option<FunctionOutline> {
    let name = parsed.text(node.child_by_field_name("name")?).to_string();

    let (params, required_arity) = node
        .child_by_field_name("parameters")
        .map(|p| parameter_names(parsed, p))
        .unwrap_or_default();

    let mut cursor = node.walk();
    let is_async = node.children(&mut cursor).any(|c| c.kind() == "async");

    let returns_value = node
        .child_by_field_name("body")
        .is_some_and(body_returns_value);

    Some(FunctionOutline {
        name,
        params,
        required_arity,
        is_async,
        returns_value,
        location: location_of(node),
    })
}

fn class_outline(parsed: &ParsedArtifact, node: Node<'_>) -> Option<ClassOutline> {
    let name = parsed.text(node.child_by_field_name("name")?).to_string();
    let mut methods = Vec::new();

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            let member = unwrap_decorated(member);
            if member.kind() == "function_definition" {
                if let Some(method) = function_outline(parsed, member) {
                    methods.push(method);
                }
            }
        }
    }

    Some(ClassOutline {
        name,
        methods,
        location: location_of(node),
    })
}

fn parameter_names(parsed: &ParsedArtifact, parameters: Node<'_>) -> (Vec<String>, usize) {
    let mut names = Vec::new();
    let mut required = 0;
    let mut cursor = parameters.walk();
    for param in parameters.named_children(&mut cursor) {
        let name = match param.kind() {
            "identifier" => {
                required += 1;
                Some(parsed.text(param))
            }
            "list_splat_pattern" | "dictionary_splat_pattern" => Some(parsed.text(param)),
            "default_parameter" | "typed_default_parameter" => param
                .child_by_field_name("name")
                .map(|n| parsed.text(n)),
            "typed_parameter" => param.named_child(0).map(|n| {
                if n.kind() == "identifier" {
                    required += 1;
                }
                parsed.text(n)
            }),
            _ => None,
        };
        if let Some(name) = name {
            names.push(name.to_string());
        }
    }
    (names, required)
}

fn body_returns_value(body: Node<'_>) -> bool {
    let mut found = false;
    visit_preorder(body, |node| match node.kind() {
        "function_definition" | "class_definition" | "lambda" => Visit::Skip,
        "return_statement" if node.named_child_count() > 0 => {
            found = true;
            Visit::Stop
        }
        "yield" => {
            found = true;
            Visit::Stop
        }
        _ => Visit::Descend,
    });
    found
}

fn is_main_guard(parsed: &ParsedArtifact, node: Node<'_>) -> bool {
    let Some(condition) = node.child_by_field_name("condition") else {
        return false;
    };
    let normalized: String = parsed
        .text(condition)
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '\'' { '"' } else { c })
        .collect();
    normalized == r#"__name__=="__main__""# || normalized == r#""__main__"==__name__"#
}

fn collect_deleted_names(parsed: &ParsedArtifact, root: Node<'_>, out: &mut BTreeSet<String>) {
    visit_preorder(root, |node| {
        if node.kind() != "delete_statement" {
            return Visit::Descend;
        }
        visit_preorder(node, |target| match target.kind() {
            "identifier" => {
                out.insert(parsed.text(target).to_string());
                Visit::Skip
            }
            // `del a.b` and `del a[0]` remove nothing at module level
            "attribute" | "subscript" => Visit::Skip,
            _ => Visit::Descend,
        });
        Visit::Skip
    });
}
