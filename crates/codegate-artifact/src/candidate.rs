//! Candidates submitted by the upstream generator
//!
//! A [`CandidateDraft`] is what the generator hands over; the iteration
//! controller stamps it with an attempt number to produce an immutable
//! [`Candidate`].

use crate::hash::CandidateHash;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Name of a policy profile (e.g. `strict`, `relaxed`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileName(String);

impl ProfileName {
    /// Create a profile name
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The strict built-in tier
    #[inline]
    #[must_use]
    pub fn strict() -> Self {
        Self::new("strict")
    }

    /// The relaxed built-in tier
    #[inline]
    #[must_use]
    pub fn relaxed() -> Self {
        Self::new("relaxed")
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProfileName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Declared shape of a generated artifact
///
/// Determines which structural requirements the validator enforces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Importable module: at least one top-level function or class
    Library,
    /// A named top-level function with a mandatory signature that returns a value
    Entrypoint {
        /// Required function name
        name: String,
        /// Required leading parameter names, in order
        #[serde(default)]
        params: Vec<String>,
    },
    /// Runnable program: `def main()` plus a `__main__` guard
    Script,
    /// Test module: at least one `test_*` function or `Test*` class
    TestSuite,
}

impl ArtifactKind {
    /// Entrypoint with no mandatory parameters
    #[inline]
    #[must_use]
    pub fn entrypoint(name: impl Into<String>) -> Self {
        Self::Entrypoint {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Short label used in logs and feedback
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Library => "library",
            Self::Entrypoint { .. } => "entrypoint",
            Self::Script => "script",
            Self::TestSuite => "test_suite",
        }
    }
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entrypoint { name, params } if params.is_empty() => {
                write!(f, "entrypoint:{name}")
            }
            Self::Entrypoint { name, params } => {
                write!(f, "entrypoint:{name}({})", params.join(","))
            }
            other => f.write_str(other.label()),
        }
    }
}

/// Parses `library`, `script`, `test_suite`, `entrypoint:NAME` and
/// `entrypoint:NAME(p1,p2)`.
impl FromStr for ArtifactKind {
    type Err = KindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "library" => return Ok(Self::Library),
            "script" => return Ok(Self::Script),
            "test_suite" | "tests" => return Ok(Self::TestSuite),
            _ => {}
        }

        let spec = s
            .strip_prefix("entrypoint:")
            .ok_or_else(|| KindParseError::UnknownKind(s.to_string()))?;

        let (name, params) = match spec.split_once('(') {
            Some((name, rest)) => {
                let inner = rest
                    .strip_suffix(')')
                    .ok_or_else(|| KindParseError::MalformedSignature(s.to_string()))?;
                let params = inner
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(ToString::to_string)
                    .collect();
                (name, params)
            }
            None => (spec, Vec::new()),
        };

        if !is_identifier(name) {
            return Err(KindParseError::MalformedSignature(s.to_string()));
        }

        Ok(Self::Entrypoint {
            name: name.to_string(),
            params,
        })
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Errors parsing an [`ArtifactKind`] from text
#[derive(Debug, thiserror::Error)]
pub enum KindParseError {
    /// Not one of the known kinds
    #[error("unknown artifact kind: '{0}'")]
    UnknownKind(String),

    /// Entrypoint signature could not be parsed
    #[error("malformed entrypoint signature: '{0}'")]
    MalformedSignature(String),
}

/// Generator output before the controller assigns an attempt number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDraft {
    /// Raw source text
    pub text: String,
    /// Declared artifact kind
    pub artifact_kind: ArtifactKind,
    /// Policy profile to validate against
    pub profile: ProfileName,
}

impl CandidateDraft {
    /// Create a draft
    #[must_use]
    pub fn new(text: impl Into<String>, artifact_kind: ArtifactKind, profile: ProfileName) -> Self {
        Self {
            text: text.into(),
            artifact_kind,
            profile,
        }
    }
}

/// One generated artifact awaiting validation
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    text: String,
    artifact_kind: ArtifactKind,
    profile: ProfileName,
    attempt: u32,
    hash: CandidateHash,
}

impl Candidate {
    /// Stamp a draft with its attempt number
    #[must_use]
    pub fn new(draft: CandidateDraft, attempt: u32) -> Self {
        let kind = draft.artifact_kind.to_string();
        let hash = CandidateHash::of_fields(&[&draft.text, &kind, draft.profile.as_str()]);
        Self {
            text: draft.text,
            artifact_kind: draft.artifact_kind,
            profile: draft.profile,
            attempt,
            hash,
        }
    }

    /// Source text
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Declared artifact kind
    #[inline]
    #[must_use]
    pub fn artifact_kind(&self) -> &ArtifactKind {
        &self.artifact_kind
    }

    /// Requested policy profile
    #[inline]
    #[must_use]
    pub fn profile(&self) -> &ProfileName {
        &self.profile
    }

    /// 1-based attempt number
    #[inline]
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Hash of text, kind and profile together
    #[inline]
    #[must_use]
    pub fn hash(&self) -> CandidateHash {
        self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_simple_kinds() {
        assert_eq!("library".parse::<ArtifactKind>().unwrap(), ArtifactKind::Library);
        assert_eq!("script".parse::<ArtifactKind>().unwrap(), ArtifactKind::Script);
        assert_eq!(
            "test_suite".parse::<ArtifactKind>().unwrap(),
            ArtifactKind::TestSuite
        );
    }

    #[test]
    fn parse_entrypoint_with_signature() {
        let kind: ArtifactKind = "entrypoint:solve(data, limit)".parse().unwrap();
        assert_eq!(
            kind,
            ArtifactKind::Entrypoint {
                name: "solve".to_string(),
                params: vec!["data".to_string(), "limit".to_string()],
            }
        );
        assert_eq!(kind.to_string(), "entrypoint:solve(data,limit)");
    }

    #[test]
    fn parse_entrypoint_without_signature() {
        let kind: ArtifactKind = "entrypoint:run".parse().unwrap();
        assert_eq!(kind, ArtifactKind::entrypoint("run"));
        assert_eq!(kind.to_string(), "entrypoint:run");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            "module".parse::<ArtifactKind>(),
            Err(KindParseError::UnknownKind(_))
        ));
        assert!(matches!(
            "entrypoint:1abc".parse::<ArtifactKind>(),
            Err(KindParseError::MalformedSignature(_))
        ));
        assert!(matches!(
            "entrypoint:run(a".parse::<ArtifactKind>(),
            Err(KindParseError::MalformedSignature(_))
        ));
    }

    #[test]
    fn candidate_carries_hash_and_attempt() {
        let draft = CandidateDraft::new("x = 1", ArtifactKind::Library, ProfileName::strict());
        let candidate = Candidate::new(draft, 2);
        assert_eq!(candidate.attempt(), 2);
        assert_eq!(
            candidate.hash(),
            CandidateHash::of_fields(&["x = 1", "library", "strict"])
        );
        assert_eq!(candidate.profile().as_str(), "strict");
    }

    #[test]
    fn hash_covers_kind_and_profile() {
        let text = "def solve(x):\n    return x\n";
        let base = Candidate::new(
            CandidateDraft::new(text, ArtifactKind::Script, ProfileName::strict()),
            1,
        );
        let other_kind = Candidate::new(
            CandidateDraft::new(text, ArtifactKind::entrypoint("solve"), ProfileName::strict()),
            1,
        );
        let other_profile = Candidate::new(
            CandidateDraft::new(text, ArtifactKind::Script, ProfileName::relaxed()),
            1,
        );
        let same = Candidate::new(
            CandidateDraft::new(text, ArtifactKind::Script, ProfileName::strict()),
            3,
        );
        assert_ne!(base.hash(), other_kind.hash());
        assert_ne!(base.hash(), other_profile.hash());
        assert_eq!(base.hash(), same.hash());
    }

    #[test]
    fn artifact_kind_serde_is_tagged() {
        let json = serde_json::to_value(ArtifactKind::entrypoint("run")).unwrap();
        assert_eq!(json["kind"], "entrypoint");
        assert_eq!(json["name"], "run");
    }
}
