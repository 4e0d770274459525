//! Structural and policy violations

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Classification of a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    /// Candidate text does not parse
    Syntax,
    /// Reference to a capability the profile does not permit
    ForbiddenCapability,
    /// A required structural element is absent or malformed
    MissingStructure,
}

impl ViolationKind {
    /// Kebab-case label
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::ForbiddenCapability => "forbidden-capability",
            Self::MissingStructure => "missing-structure",
        }
    }

    /// Whether this kind must keep a candidate out of the sandbox
    #[inline]
    #[must_use]
    pub fn blocks_execution(&self) -> bool {
        matches!(self, Self::Syntax | Self::ForbiddenCapability)
    }
}

impl Display for ViolationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1-based position in candidate text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Line number, starting at 1
    pub line: usize,
    /// Column number, starting at 1
    pub column: usize,
}

impl SourceLocation {
    /// Create a location
    #[inline]
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// One breach of structural or policy rules
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Violation {
    /// Violation classification
    pub kind: ViolationKind,
    /// Human-readable description, written for the generator
    pub message: String,
    /// Where in the candidate it occurred
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Canonical capability identifier, for policy violations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
}

impl Violation {
    /// Syntax violation at a location
    #[must_use]
    pub fn syntax(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind: ViolationKind::Syntax,
            message: message.into(),
            location: Some(location),
            capability: None,
        }
    }

    /// Missing-structure violation, optionally located
    #[must_use]
    pub fn missing_structure(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self {
            kind: ViolationKind::MissingStructure,
            message: message.into(),
            location,
            capability: None,
        }
    }

    /// Forbidden-capability violation for a canonical identifier
    #[must_use]
    pub fn forbidden_capability(
        capability: impl Into<String>,
        message: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self {
            kind: ViolationKind::ForbiddenCapability,
            message: message.into(),
            location: Some(location),
            capability: Some(capability.into()),
        }
    }
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(f, "[{}] {} at {}", self.kind, self.message, loc),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_display_includes_location() {
        let v = Violation::syntax("unexpected token", SourceLocation::new(3, 7));
        assert_eq!(v.to_string(), "[syntax] unexpected token at 3:7");
    }

    #[test]
    fn violation_display_without_location() {
        let v = Violation::missing_structure("no top-level function or class", None);
        assert_eq!(v.to_string(), "[missing-structure] no top-level function or class");
    }

    #[test]
    fn blocking_kinds() {
        assert!(ViolationKind::Syntax.blocks_execution());
        assert!(ViolationKind::ForbiddenCapability.blocks_execution());
        assert!(!ViolationKind::MissingStructure.blocks_execution());
    }

    #[test]
    fn kind_serializes_kebab_case() {
        let json = serde_json::to_string(&ViolationKind::ForbiddenCapability).unwrap();
        assert_eq!(json, "\"forbidden-capability\"");
    }
}
