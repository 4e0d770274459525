//! Structural validation stage
//!
//! Parse, reject malformed text with a single syntax violation, then check
//! the requirements of the declared artifact kind.

use crate::error::ParseError;
use crate::outline::ModuleOutline;
use crate::parser::{ParsedArtifact, PythonParser};
use crate::requirements::{check_requirements, empty_candidate};
use codegate_artifact::{ArtifactKind, Violation};
use tracing::debug;

/// Result of structural validation
#[derive(Debug)]
pub enum StructuralOutcome {
    /// Text parsed and every requirement is met
    Accepted(ParsedArtifact),
    /// One syntax violation, or one or more missing-structure violations
    Rejected(Vec<Violation>),
}

impl StructuralOutcome {
    /// Whether the candidate cleared this stage
    #[inline]
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Violations, empty when accepted
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Accepted(_) => &[],
            Self::Rejected(violations) => violations,
        }
    }
}

/// First pipeline stage
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator {
    parser: PythonParser,
}

impl StructuralValidator {
    /// Create validator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate candidate text against an artifact kind
    ///
    /// # Errors
    /// Returns `ParseError` only for parser infrastructure failures. Malformed
    /// candidate text is a [`StructuralOutcome::Rejected`].
    pub fn validate(&self, text: &str, kind: &ArtifactKind) -> Result<StructuralOutcome, ParseError> {
        if text.trim().is_empty() {
            debug!(kind = %kind, "empty candidate");
            return Ok(StructuralOutcome::Rejected(vec![empty_candidate()]));
        }

        let parsed = self.parser.parse(text)?;

        if let Some(violation) = parsed.first_syntax_error() {
            debug!(kind = %kind, %violation, "syntax error");
            return Ok(StructuralOutcome::Rejected(vec![violation]));
        }

        let outline = ModuleOutline::of(&parsed);
        let violations = check_requirements(&outline, kind);
        debug!(
            kind = %kind,
            functions = outline.functions.len(),
            classes = outline.classes.len(),
            missing = violations.len(),
            "structure checked"
        );

        if violations.is_empty() {
            Ok(StructuralOutcome::Accepted(parsed))
        } else {
            Ok(StructuralOutcome::Rejected(violations))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegate_artifact::ViolationKind;

    #[test]
    fn accepts_valid_entrypoint() {
        let outcome = StructuralValidator::new()
            .validate("def run(x):\n    return x\n", &ArtifactKind::entrypoint("run"))
            .unwrap();
        assert!(outcome.is_accepted());
        assert!(outcome.violations().is_empty());
    }

    #[test]
    fn whitespace_only_is_missing_structure() {
        let outcome = StructuralValidator::new()
            .validate("   \n\t\n", &ArtifactKind::Library)
            .unwrap();
        let v = outcome.violations();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].kind, ViolationKind::MissingStructure);
    }

    #[test]
    fn syntax_error_stops_before_requirements() {
        let outcome = StructuralValidator::new()
            .validate("def run(x:\n    return x\n", &ArtifactKind::Script)
            .unwrap();
        let v = outcome.violations();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].kind, ViolationKind::Syntax);
    }
}
