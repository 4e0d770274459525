use codegate_artifact::{ArtifactKind, ViolationKind};
use codegate_structure::{PythonParser, StructuralOutcome, StructuralValidator};
use proptest::prelude::*;

fn violations(source: &str, kind: &ArtifactKind) -> Vec<codegate_artifact::Violation> {
    StructuralValidator::new()
        .validate(source, kind)
        .unwrap()
        .violations()
        .to_vec()
}

#[test]
fn test_missing_entrypoint_is_single_violation() {
    let v = violations(
        "import math\n\ndef helper(x):\n    return math.sqrt(x)\n",
        &ArtifactKind::entrypoint("solve"),
    );
    assert_eq!(v.len(), 1);
    assert_eq!(v[0].kind, ViolationKind::MissingStructure);
    assert!(v[0].location.is_none());
}

#[test]
fn test_syntax_error_location_is_first_damage() {
    let source = "def ok():\n    return 1\n\nvalue = [1, 2\n\ndef also_bad(:\n    pass\n";
    let v = violations(source, &ArtifactKind::Library);
    assert_eq!(v.len(), 1);
    assert_eq!(v[0].kind, ViolationKind::Syntax);
    assert!(v[0].location.unwrap().line >= 4);
}

#[test]
fn test_accepted_artifact_keeps_source() {
    let source = "def test_a():\n    assert 1 == 1\n";
    match StructuralValidator::new()
        .validate(source, &ArtifactKind::TestSuite)
        .unwrap()
    {
        StructuralOutcome::Accepted(parsed) => assert_eq!(parsed.source(), source),
        StructuralOutcome::Rejected(v) => panic!("unexpected rejection: {v:?}"),
    }
}

#[test]
fn test_script_batches_both_misses() {
    let v = violations("x = 1\n", &ArtifactKind::Script);
    assert_eq!(v.len(), 2);
    assert!(v.iter().all(|v| v.kind == ViolationKind::MissingStructure));
}

fn any_kind() -> impl Strategy<Value = ArtifactKind> {
    prop_oneof![
        Just(ArtifactKind::Library),
        Just(ArtifactKind::entrypoint("solve")),
        Just(ArtifactKind::Script),
        Just(ArtifactKind::TestSuite),
    ]
}

proptest! {
    #[test]
    fn prop_unparseable_text_yields_only_syntax(
        source in "[a-z_():=\\[\\], \n]{1,60}",
        kind in any_kind()
    ) {
        let parsed = PythonParser::new().parse(&source).unwrap();
        let v = violations(&source, &kind);

        if parsed.has_syntax_error() && !source.trim().is_empty() {
            prop_assert_eq!(v.len(), 1);
            prop_assert_eq!(v[0].kind, ViolationKind::Syntax);
        } else {
            prop_assert!(v.iter().all(|v| v.kind == ViolationKind::MissingStructure));
        }
    }

    #[test]
    fn prop_broken_suffix_never_reports_structure(
        name in "[a-z]{1,8}",
        kind in any_kind()
    ) {
        let source = format!("def {name}():\n    return 1\n\ndef broken(:\n    pass\n");
        let v = violations(&source, &kind);
        prop_assert_eq!(v.len(), 1);
        prop_assert_eq!(v[0].kind, ViolationKind::Syntax);
    }
}
