//! Capability policy engine
//!
//! Classifies every extracted reference against one profile and turns the
//! ones that may not stand into `forbidden-capability` violations.

use crate::profile::{Classification, PolicyProfile};
use crate::references::{extract_references, BindingId, ReferenceOrigin, ReferenceSet};
use codegate_artifact::Violation;
use codegate_structure::ParsedArtifact;
use std::collections::HashSet;
use tracing::debug;

/// Second pipeline stage
///
/// Stateless and pure: the same artifact and profile always give the same
/// violations in the same order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityPolicyEngine;

impl CapabilityPolicyEngine {
    /// Create engine
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Violations for a parsed candidate under `profile`, in document order
    #[must_use]
    pub fn evaluate(&self, parsed: &ParsedArtifact, profile: &PolicyProfile) -> Vec<Violation> {
        let references = extract_references(parsed);
        let violations = self.classify(&references, profile);
        debug!(
            profile = %profile.name(),
            references = references.capabilities.len(),
            violations = violations.len(),
            "capability policy evaluated"
        );
        violations
    }

    /// Violations for already extracted references
    #[must_use]
    pub fn classify(&self, references: &ReferenceSet, profile: &PolicyProfile) -> Vec<Violation> {
        let rejected_imports: HashSet<BindingId> = references
            .capabilities
            .iter()
            .filter(|r| r.origin == ReferenceOrigin::Import)
            .filter(|r| !profile.classify(&r.capability).is_allowed())
            .filter_map(|r| r.binding)
            .collect();

        let mut violations: Vec<Violation> = references
            .relative_imports
            .iter()
            .map(|relative| {
                Violation::forbidden_capability(
                    relative.module.clone(),
                    format!("relative import '{}' cannot be resolved", relative.module),
                    relative.location,
                )
            })
            .collect();

        for reference in &references.capabilities {
            // A use of a name whose import was already rejected adds nothing.
            if reference.origin != ReferenceOrigin::Import
                && reference
                    .binding
                    .is_some_and(|b| rejected_imports.contains(&b))
            {
                continue;
            }

            let capability = &reference.capability;
            let message = match profile.classify(capability) {
                Classification::Allowed { .. } => continue,
                Classification::Denied { matched } if &matched == capability => {
                    format!("'{capability}' is always denied")
                }
                Classification::Denied { matched } => {
                    format!("'{capability}' is always denied (via '{matched}')")
                }
                Classification::Unknown => {
                    format!(
                        "'{capability}' is not permitted by profile '{}'",
                        profile.name()
                    )
                }
            };

            violations.push(Violation::forbidden_capability(
                capability.to_string(),
                message,
                reference.location,
            ));
        }

        // Stable: ties keep extraction order.
        violations.sort_by_key(|v| v.location);
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PolicyStore;
    use codegate_artifact::{ProfileName, ViolationKind};
    use codegate_structure::PythonParser;
    use pretty_assertions::assert_eq;

    fn evaluate(source: &str, profile: &str) -> Vec<Violation> {
        let store = PolicyStore::builtin().unwrap();
        let profile = store.profile(&ProfileName::new(profile)).unwrap();
        let parsed = PythonParser::new().parse(source).unwrap();
        CapabilityPolicyEngine::new().evaluate(&parsed, &profile)
    }

    fn capabilities(violations: &[Violation]) -> Vec<&str> {
        violations
            .iter()
            .filter_map(|v| v.capability.as_deref())
            .collect()
    }

    #[test]
    fn clean_strict_candidate() {
        let v = evaluate(
            "import math\nfrom collections import Counter\n\ndef f(xs):\n    return math.sqrt(len(Counter(xs)))\n",
            "strict",
        );
        assert!(v.is_empty(), "{v:?}");
    }

    #[test]
    fn network_import_is_denied() {
        let v = evaluate("import socket\n\ndef f():\n    return socket.socket()\n", "strict");
        assert_eq!(capabilities(&v), vec!["socket"]);
        assert_eq!(v[0].kind, ViolationKind::ForbiddenCapability);
        assert!(v[0].message.contains("always denied"));
        assert_eq!(v[0].location.unwrap().line, 1);
    }

    #[test]
    fn unknown_module_is_forbidden() {
        let v = evaluate("import pathlib\n", "strict");
        assert_eq!(capabilities(&v), vec!["pathlib"]);
        assert!(v[0].message.contains("not permitted by profile 'strict'"));
        assert!(evaluate("import pathlib\n", "relaxed").is_empty());
    }

    #[test]
    fn permitted_sibling_grants_nothing() {
        let v = evaluate(
            "import os.path\n\ndef f(p):\n    os.remove(p)\n    return os.path.exists(p)\n",
            "relaxed",
        );
        assert_eq!(capabilities(&v), vec!["os.remove"]);
    }

    #[test]
    fn denied_member_of_allowed_import() {
        let v = evaluate("import os.path\n\nos.system('id')\n", "relaxed");
        assert_eq!(capabilities(&v), vec!["os.system"]);
        assert!(v[0].message.contains("always denied"));
    }

    #[test]
    fn dynamic_execution_builtins() {
        let v = evaluate("x = eval('1 + 1')\nexec('y = 2')\n", "strict");
        assert_eq!(capabilities(&v), vec!["builtins.eval", "builtins.exec"]);
    }

    #[test]
    fn escape_attribute_is_denied() {
        let v = evaluate("def f(g):\n    return g.__globals__\n", "relaxed");
        assert_eq!(capabilities(&v), vec!["introspection.__globals__"]);
        assert!(v[0].message.contains("via 'introspection'"));
    }

    #[test]
    fn relative_import_is_unresolvable() {
        let v = evaluate("from .utils import helper\n", "relaxed");
        assert_eq!(v.len(), 1);
        assert!(v[0].message.contains("cannot be resolved"));
    }

    #[test]
    fn future_import_always_permitted() {
        assert!(evaluate("from __future__ import annotations\n", "strict").is_empty());
    }

    #[test]
    fn violations_in_document_order() {
        let v = evaluate(
            "import math\nimport subprocess\nimport socket\nx = eval('1')\n",
            "strict",
        );
        assert_eq!(
            capabilities(&v),
            vec!["subprocess", "socket", "builtins.eval"]
        );
        let lines: Vec<_> = v.iter().map(|v| v.location.unwrap().line).collect();
        assert_eq!(lines, vec![2, 3, 4]);
    }

    #[test]
    fn rebinding_a_builtin_to_itself_is_still_reported() {
        let v = evaluate("eval = eval\n\ndef solve(x):\n    return eval(x)\n", "strict");
        assert_eq!(capabilities(&v), vec!["builtins.eval", "builtins.eval"]);

        let v = evaluate(
            "__import__ = __import__\n\ndef solve(x):\n    return __import__('socket').socket()\n",
            "strict",
        );
        assert_eq!(
            capabilities(&v),
            vec!["builtins.__import__", "builtins.__import__"]
        );
    }

    #[test]
    fn deleting_a_shadowing_def_restores_the_builtin() {
        let v = evaluate(
            "def exec(s):\n    return s\n\ndel exec\n\ndef solve(x):\n    return exec(x)\n",
            "strict",
        );
        assert_eq!(capabilities(&v), vec!["builtins.exec"]);
    }

    #[test]
    fn private_member_of_permitted_module_is_forbidden() {
        let v = evaluate("import random\n\ndef solve(x):\n    return random._os.system(x)\n", "strict");
        assert_eq!(capabilities(&v), vec!["random._os.system"]);
        assert!(v[0].message.contains("not permitted by profile 'strict'"));

        let v = evaluate("from random import _os\n", "strict");
        assert_eq!(capabilities(&v), vec!["random._os"]);
        assert!(evaluate("import random\nrandom.randint(1, 2)\n", "strict").is_empty());
    }

    #[test]
    fn aliased_module_use_resolves() {
        let v = evaluate("import os as o\no.system('x')\n", "relaxed");
        // `import os` itself is unknown under relaxed; the use is not reported again
        assert_eq!(capabilities(&v), vec!["os"]);
    }
}
