//! Structural requirements per artifact kind
//!
//! Each unmet requirement is reported as its own violation; checking never
//! stops at the first miss.

use crate::outline::{FunctionOutline, ModuleOutline};
use codegate_artifact::{ArtifactKind, Violation};

/// Prefix marking a test function or method
const TEST_FUNCTION_PREFIX: &str = "test_";
/// Prefix marking a test class
const TEST_CLASS_PREFIX: &str = "Test";

/// Check an outline against the requirements of `kind`
#[must_use]
pub fn check_requirements(outline: &ModuleOutline, kind: &ArtifactKind) -> Vec<Violation> {
    if outline.is_empty {
        return vec![empty_candidate()];
    }

    match kind {
        ArtifactKind::Library => check_library(outline),
        ArtifactKind::Entrypoint { name, params } => check_entrypoint(outline, name, params),
        ArtifactKind::Script => check_script(outline),
        ArtifactKind::TestSuite => check_test_suite(outline),
    }
}

pub(crate) fn empty_candidate() -> Violation {
    Violation::missing_structure("candidate is empty: nothing to validate", None)
}

fn check_library(outline: &ModuleOutline) -> Vec<Violation> {
    if outline.functions.is_empty() && outline.classes.is_empty() {
        vec![Violation::missing_structure(
            "library defines no top-level function or class",
            None,
        )]
    } else {
        Vec::new()
    }
}

fn check_entrypoint(outline: &ModuleOutline, name: &str, required: &[String]) -> Vec<Violation> {
    let Some(function) = outline.function(name) else {
        return vec![Violation::missing_structure(
            format!("no top-level function '{name}'"),
            None,
        )];
    };

    let mut violations = Vec::new();

    if !has_leading_params(function, required) {
        violations.push(Violation::missing_structure(
            format!(
                "function '{name}' must take ({}) but takes ({})",
                required.join(", "),
                function.params.join(", ")
            ),
            Some(function.location),
        ));
    }

    if !function.returns_value {
        violations.push(Violation::missing_structure(
            format!("function '{name}' never returns a value"),
            Some(function.location),
        ));
    }

    violations
}

fn has_leading_params(function: &FunctionOutline, required: &[String]) -> bool {
    function.params.len() >= required.len()
        && function.params.iter().zip(required).all(|(have, want)| have == want)
}

fn check_script(outline: &ModuleOutline) -> Vec<Violation> {
    let mut violations = Vec::new();

    match outline.function("main") {
        None => violations.push(Violation::missing_structure(
            "script defines no top-level 'main' function",
            None,
        )),
        Some(main) if main.required_arity > 0 => {
            violations.push(Violation::missing_structure(
                "'main' must be callable without arguments",
                Some(main.location),
            ));
        }
        Some(_) => {}
    }

    if !outline.has_main_guard {
        violations.push(Violation::missing_structure(
            "script has no `if __name__ == \"__main__\":` guard",
            None,
        ));
    }

    violations
}

fn check_test_suite(outline: &ModuleOutline) -> Vec<Violation> {
    let has_test_function = outline
        .functions
        .iter()
        .any(|f| f.name.starts_with(TEST_FUNCTION_PREFIX));

    let has_test_class = outline.classes.iter().any(|c| {
        c.name.starts_with(TEST_CLASS_PREFIX)
            && c.methods
                .iter()
                .any(|m| m.name.starts_with(TEST_FUNCTION_PREFIX))
    });

    if has_test_function || has_test_class {
        Vec::new()
    } else {
        vec![Violation::missing_structure(
            "test suite defines no `test_*` function or `Test*` class with `test_*` methods",
            None,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PythonParser;
    use codegate_artifact::ViolationKind;
    use pretty_assertions::assert_eq;

    fn check(source: &str, kind: &ArtifactKind) -> Vec<Violation> {
        let parsed = PythonParser::new().parse(source).unwrap();
        check_requirements(&ModuleOutline::of(&parsed), kind)
    }

    #[test]
    fn library_needs_a_definition() {
        assert!(check("def f():\n    pass\n", &ArtifactKind::Library).is_empty());
        assert!(check("class A:\n    pass\n", &ArtifactKind::Library).is_empty());
        assert_eq!(check("x = 1\n", &ArtifactKind::Library).len(), 1);
    }

    #[test]
    fn entrypoint_missing() {
        let v = check("def other():\n    return 1\n", &ArtifactKind::entrypoint("solve"));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].kind, ViolationKind::MissingStructure);
        assert!(v[0].message.contains("'solve'"));
    }

    #[test]
    fn entrypoint_batches_signature_and_return() {
        let kind = ArtifactKind::Entrypoint {
            name: "solve".into(),
            params: vec!["data".into(), "limit".into()],
        };
        let v = check("def solve(limit):\n    print(limit)\n", &kind);
        assert_eq!(v.len(), 2);
        assert!(v[0].message.contains("must take (data, limit)"));
        assert!(v[1].message.contains("never returns"));
        assert_eq!(v[0].location.unwrap().line, 1);
    }

    #[test]
    fn entrypoint_allows_trailing_params() {
        let kind = ArtifactKind::Entrypoint {
            name: "solve".into(),
            params: vec!["data".into()],
        };
        assert!(check("def solve(data, verbose=False):\n    return data\n", &kind).is_empty());
    }

    #[test]
    fn script_requires_main_and_guard() {
        let ok = "def main():\n    print('hi')\n\nif __name__ == '__main__':\n    main()\n";
        assert!(check(ok, &ArtifactKind::Script).is_empty());

        let v = check("print('hi')\n", &ArtifactKind::Script);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn script_main_must_be_nullary() {
        let src = "def main(path):\n    pass\n\nif __name__ == '__main__':\n    main()\n";
        let v = check(src, &ArtifactKind::Script);
        assert_eq!(v.len(), 1);
        assert!(v[0].message.contains("without arguments"));

        let defaulted = "def main(verbose=False):\n    pass\n\nif __name__ == '__main__':\n    main()\n";
        assert!(check(defaulted, &ArtifactKind::Script).is_empty());
    }

    #[test]
    fn test_suite_accepts_function_or_class() {
        assert!(check("def test_one():\n    assert True\n", &ArtifactKind::TestSuite).is_empty());
        assert!(check(
            "class TestThing:\n    def test_it(self):\n        pass\n",
            &ArtifactKind::TestSuite
        )
        .is_empty());
        assert_eq!(
            check("class TestThing:\n    def helper(self):\n        pass\n", &ArtifactKind::TestSuite).len(),
            1
        );
    }

    #[test]
    fn comments_only_is_missing_structure_for_every_kind() {
        for kind in [
            ArtifactKind::Library,
            ArtifactKind::entrypoint("run"),
            ArtifactKind::Script,
            ArtifactKind::TestSuite,
        ] {
            let v = check("# just a comment\n", &kind);
            assert_eq!(v.len(), 1, "{kind}");
            assert!(v[0].message.contains("empty"));
        }
    }
}
