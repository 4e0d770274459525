//! Capability reference extraction
//!
//! Walks a parsed candidate and lists every capability it reaches for:
//! imports, attribute chains rooted at imported names, `getattr` with a
//! literal member, bare builtin names, and object-model escape attributes.
//! Extraction never consults a policy; classification happens in the engine.

use crate::capability::CapabilityId;
use codegate_artifact::SourceLocation;
use codegate_structure::{location_of, visit_preorder, ModuleOutline, Node, ParsedArtifact, Visit};
use std::collections::{HashMap, HashSet};

/// Module whose imports are compiler directives and never checked
const FUTURE_MODULE: &str = "__future__";

/// Attributes that escape the object model
pub const ESCAPE_ATTRIBUTES: &[&str] = &[
    "__subclasses__",
    "__globals__",
    "__builtins__",
    "__code__",
    "__closure__",
    "__mro__",
    "__bases__",
    "__base__",
    "__getattribute__",
];

/// Names available without import
pub const BUILTIN_NAMES: &[&str] = &[
    "__import__",
    "abs",
    "aiter",
    "all",
    "anext",
    "any",
    "ascii",
    "bin",
    "bool",
    "breakpoint",
    "bytearray",
    "bytes",
    "callable",
    "chr",
    "classmethod",
    "compile",
    "complex",
    "delattr",
    "dict",
    "dir",
    "divmod",
    "enumerate",
    "eval",
    "exec",
    "filter",
    "float",
    "format",
    "frozenset",
    "getattr",
    "globals",
    "hasattr",
    "hash",
    "help",
    "hex",
    "id",
    "input",
    "int",
    "isinstance",
    "issubclass",
    "iter",
    "len",
    "list",
    "locals",
    "map",
    "max",
    "memoryview",
    "min",
    "next",
    "object",
    "oct",
    "open",
    "ord",
    "pow",
    "print",
    "property",
    "range",
    "repr",
    "reversed",
    "round",
    "set",
    "setattr",
    "slice",
    "sorted",
    "staticmethod",
    "str",
    "sum",
    "super",
    "tuple",
    "type",
    "vars",
    "zip",
];

/// Identifies the import that bound a name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(usize);

/// How a reference was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceOrigin {
    /// `import a.b` or `from a import b`
    Import,
    /// Attribute chain or bare use of an imported name
    Attribute,
    /// `getattr(name, "member")`
    Getattr,
    /// Bare builtin name
    Builtin,
    /// Escape attribute
    Introspection,
}

/// One capability the candidate reaches for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityReference {
    /// Resolved identifier
    pub capability: CapabilityId,
    /// How it was written
    pub origin: ReferenceOrigin,
    /// Where it was written
    pub location: SourceLocation,
    /// For imports, the binding introduced; otherwise the binding used
    pub binding: Option<BindingId>,
}

/// `from . import x` and friends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeImport {
    /// Module text as written (`.`, `..utils`)
    pub module: String,
    /// Where it was written
    pub location: SourceLocation,
}

/// Everything extracted from one candidate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    /// Resolved references in document order
    pub capabilities: Vec<CapabilityReference>,
    /// Relative imports, which cannot be resolved
    pub relative_imports: Vec<RelativeImport>,
}

#[derive(Debug, Clone)]
struct Binding {
    target: CapabilityId,
    id: BindingId,
}

/// Extract all references from a parsed candidate
#[must_use]
pub fn extract_references(parsed: &ParsedArtifact) -> ReferenceSet {
    let outline = ModuleOutline::of(parsed);
    let mut extractor = Extractor {
        parsed,
        outline: &outline,
        bindings: HashMap::new(),
        consumed: HashSet::new(),
        next_binding: 0,
        found: Vec::new(),
        relative: Vec::new(),
    };

    // Imports anywhere in the module bind before any use is resolved, so a
    // function body above its import is still covered.
    extractor.collect_imports();
    extractor.collect_uses();

    let mut capabilities: Vec<_> = extractor.found;
    capabilities.sort_by_key(|(offset, _)| *offset);

    ReferenceSet {
        capabilities: capabilities.into_iter().map(|(_, r)| r).collect(),
        relative_imports: extractor.relative,
    }
}

struct Extractor<'a> {
    parsed: &'a ParsedArtifact,
    outline: &'a ModuleOutline,
    bindings: HashMap<String, Binding>,
    consumed: HashSet<usize>,
    next_binding: usize,
    found: Vec<(usize, CapabilityReference)>,
    relative: Vec<RelativeImport>,
}

impl<'a> Extractor<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        self.parsed.text(node)
    }

    fn push(
        &mut self,
        node: Node<'_>,
        capability: CapabilityId,
        origin: ReferenceOrigin,
        binding: Option<BindingId>,
    ) {
        self.found.push((
            node.start_byte(),
            CapabilityReference {
                capability,
                origin,
                location: location_of(node),
                binding,
            },
        ));
    }

    fn new_binding(&mut self) -> BindingId {
        let id = BindingId(self.next_binding);
        self.next_binding += 1;
        id
    }

    fn collect_imports(&mut self) {
        let parsed = self.parsed;
        let root = parsed.root();
        let mut imports = Vec::new();
        visit_preorder(root, |node| match node.kind() {
            "import_statement" | "import_from_statement" => {
                imports.push(node);
                Visit::Skip
            }
            "future_import_statement" => Visit::Skip,
            _ => Visit::Descend,
        });

        for node in imports {
            if node.kind() == "import_statement" {
                self.import_statement(node);
            } else {
                self.import_from_statement(node);
            }
        }
    }

    fn dotted_segments(&self, node: Node<'_>) -> Vec<&'a str> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|n| n.kind() == "identifier")
            .map(|n| self.text(n))
            .collect()
    }

    /// `import a.b` binds `a`; `import a.b as c` binds `c` to `a.b`
    fn import_statement(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let names: Vec<_> = node.children_by_field_name("name", &mut cursor).collect();

        for name in names {
            let (dotted, alias) = match name.kind() {
                "aliased_import" => (
                    name.child_by_field_name("name"),
                    name.child_by_field_name("alias").map(|a| self.text(a)),
                ),
                _ => (Some(name), None),
            };
            let Some(dotted) = dotted else { continue };
            let segments = self.dotted_segments(dotted);
            let Some(capability) = CapabilityId::from_module_path(segments.iter().copied()) else {
                continue;
            };

            let id = self.new_binding();
            let (bound_name, target) = match alias {
                Some(alias) => (alias, capability.clone()),
                None => {
                    let first = segments.first().copied().unwrap_or_default();
                    let target = CapabilityId::from_module_path([first])
                        .unwrap_or_else(|| capability.clone());
                    (first, target)
                }
            };
            self.bindings
                .insert(bound_name.to_string(), Binding { target, id });
            self.push(name, capability, ReferenceOrigin::Import, Some(id));
        }
    }

    /// `from a import b` references and binds `a.b`; `from a import *`
    /// references `a`
    fn import_from_statement(&mut self, node: Node<'_>) {
        let Some(module) = node.child_by_field_name("module_name") else {
            return;
        };

        if module.kind() == "relative_import" {
            self.relative.push(RelativeImport {
                module: self.text(module).to_string(),
                location: location_of(module),
            });
            return;
        }

        let module_segments = self.dotted_segments(module);
        if module_segments.first() == Some(&FUTURE_MODULE) {
            return;
        }
        let Some(base) = CapabilityId::from_module_path(module_segments.iter().copied()) else {
            return;
        };

        let mut cursor = node.walk();
        let wildcard = node
            .children(&mut cursor)
            .find(|c| c.kind() == "wildcard_import");
        if wildcard.is_some() {
            let id = self.new_binding();
            self.push(module, base, ReferenceOrigin::Import, Some(id));
            return;
        }

        let mut cursor = node.walk();
        let names: Vec<_> = node.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            let (dotted, alias) = match name.kind() {
                "aliased_import" => (
                    name.child_by_field_name("name"),
                    name.child_by_field_name("alias").map(|a| self.text(a)),
                ),
                _ => (Some(name), None),
            };
            let Some(dotted) = dotted else { continue };
            let segments = self.dotted_segments(dotted);
            let Some(last) = segments.last().copied() else {
                continue;
            };
            let capability = base.extend(&segments);

            let id = self.new_binding();
            self.bindings.insert(
                alias.unwrap_or(last).to_string(),
                Binding {
                    target: capability.clone(),
                    id,
                },
            );
            self.push(name, capability, ReferenceOrigin::Import, Some(id));
        }
    }

    fn collect_uses(&mut self) {
        let parsed = self.parsed;
        let root = parsed.root();
        let mut nodes = Vec::new();
        visit_preorder(root, |node| match node.kind() {
            "import_statement" | "import_from_statement" | "future_import_statement" => Visit::Skip,
            "attribute" | "call" | "identifier" => {
                nodes.push(node);
                Visit::Descend
            }
            _ => Visit::Descend,
        });

        for node in nodes {
            match node.kind() {
                "attribute" => self.attribute(node),
                "call" => self.call(node),
                _ => self.identifier(node),
            }
        }
    }

    fn attribute(&mut self, node: Node<'_>) {
        if let Some(member) = node.child_by_field_name("attribute") {
            let name = self.text(member);
            if ESCAPE_ATTRIBUTES.contains(&name) {
                self.push(
                    member,
                    CapabilityId::introspection(name),
                    ReferenceOrigin::Introspection,
                    None,
                );
            }
        }

        // Only the outermost attribute of a chain resolves; inner links are
        // prefixes of it.
        if is_chain_link(node) {
            return;
        }
        let Some((root, members)) = self.flatten_chain(node) else {
            return;
        };
        let Some(binding) = self.bindings.get(self.text(root)).cloned() else {
            return;
        };
        self.consumed.insert(root.id());
        self.push(
            node,
            binding.target.extend(&members),
            ReferenceOrigin::Attribute,
            Some(binding.id),
        );
    }

    /// `a.b.c` → (`a`, [`b`, `c`]) when every link is a plain name
    fn flatten_chain<'t>(&self, node: Node<'t>) -> Option<(Node<'t>, Vec<&'a str>)> {
        let mut members = Vec::new();
        let mut current = node;
        loop {
            match current.kind() {
                "attribute" => {
                    members.push(self.text(current.child_by_field_name("attribute")?));
                    current = current.child_by_field_name("object")?;
                }
                "identifier" => {
                    members.reverse();
                    return Some((current, members));
                }
                _ => return None,
            }
        }
    }

    fn call(&mut self, node: Node<'_>) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        if function.kind() != "identifier" || self.text(function) != "getattr" {
            return;
        }
        if self.is_shadowed("getattr") {
            return;
        }
        let Some(arguments) = node.child_by_field_name("arguments") else {
            return;
        };

        let mut cursor = arguments.walk();
        let args: Vec<_> = arguments
            .named_children(&mut cursor)
            .filter(|a| a.kind() != "comment")
            .collect();
        let (Some(&object), member) = (args.first(), args.get(1)) else {
            return;
        };
        let literal = member.and_then(|m| string_literal(self.parsed, *m));

        if let Some(name) = literal.as_deref() {
            if ESCAPE_ATTRIBUTES.contains(&name) {
                self.push(
                    node,
                    CapabilityId::introspection(name),
                    ReferenceOrigin::Introspection,
                    None,
                );
            }
        }

        if object.kind() != "identifier" {
            return;
        }
        let Some(binding) = self.bindings.get(self.text(object)).cloned() else {
            return;
        };
        self.consumed.insert(object.id());

        match literal {
            Some(name) => self.push(
                node,
                binding.target.child(name),
                ReferenceOrigin::Getattr,
                Some(binding.id),
            ),
            // Member unknown until runtime: nothing below the module can be
            // vouched for.
            None => self.push(
                node,
                CapabilityId::introspection("getattr"),
                ReferenceOrigin::Getattr,
                Some(binding.id),
            ),
        }
    }

    fn identifier(&mut self, node: Node<'_>) {
        if self.consumed.contains(&node.id()) || !is_load(node) {
            return;
        }
        let name = self.text(node);

        if let Some(binding) = self.bindings.get(name).cloned() {
            self.push(
                node,
                binding.target,
                ReferenceOrigin::Attribute,
                Some(binding.id),
            );
            return;
        }

        if ESCAPE_ATTRIBUTES.contains(&name) {
            self.push(
                node,
                CapabilityId::introspection(name),
                ReferenceOrigin::Introspection,
                None,
            );
            return;
        }

        if BUILTIN_NAMES.contains(&name) && !self.outline.binds(name) {
            self.push(node, CapabilityId::builtin(name), ReferenceOrigin::Builtin, None);
        }
    }

    fn is_shadowed(&self, name: &str) -> bool {
        self.outline.binds(name) || self.bindings.contains_key(name)
    }
}

/// Whether `node` is the `object` of an enclosing attribute
fn is_chain_link(node: Node<'_>) -> bool {
    node.parent().is_some_and(|parent| {
        parent.kind() == "attribute" && is_field(parent, "object", node)
    })
}

fn is_field(parent: Node<'_>, field: &str, node: Node<'_>) -> bool {
    parent
        .child_by_field_name(field)
        .is_some_and(|child| child.id() == node.id())
}

/// Whether an identifier reads a name rather than declaring or storing one
fn is_load(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return true;
    };
    match parent.kind() {
        "attribute" => !is_field(parent, "attribute", node),
        "function_definition" | "class_definition" => !is_field(parent, "name", node),
        "default_parameter" | "typed_default_parameter" => !is_field(parent, "name", node),
        "keyword_argument" => !is_field(parent, "name", node),
        "named_expression" => !is_field(parent, "name", node),
        "assignment" | "augmented_assignment" => !is_field(parent, "left", node),
        "for_statement" | "for_in_clause" => !is_field(parent, "left", node),
        "expression_list" => parent
            .parent()
            .map_or(true, |grand| grand.kind() != "delete_statement"),
        "parameters"
        | "lambda_parameters"
        | "typed_parameter"
        | "list_splat_pattern"
        | "dictionary_splat_pattern"
        | "pattern_list"
        | "tuple_pattern"
        | "list_pattern"
        | "as_pattern_target"
        | "global_statement"
        | "nonlocal_statement"
        | "delete_statement"
        | "dotted_name"
        | "aliased_import" => false,
        _ => true,
    }
}

/// Value of a plain string literal (no f-string interpolation)
fn string_literal(parsed: &ParsedArtifact, node: Node<'_>) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut cursor = node.walk();
    let mut value = String::new();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "interpolation" => return None,
            "string_content" => value.push_str(parsed.text(child)),
            _ => {}
        }
    }
    Some(value)
}
