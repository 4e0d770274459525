//! Capability identifiers
//!
//! A [`CapabilityId`] names something a candidate can reach: a module or a
//! member of one, a builtin function, or an interpreter introspection hook.
//! Identifiers are hierarchical; granting or denying an identifier covers
//! everything beneath it.

use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Root segment of [`CapabilityRoot::Builtins`] in canonical form
pub const BUILTINS_ROOT: &str = "builtins";
/// Root segment of [`CapabilityRoot::Introspection`] in canonical form
pub const INTROSPECTION_ROOT: &str = "introspection";

/// What kind of thing a capability identifier is rooted at
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CapabilityRoot {
    /// Importable top-level module (`os`, `numpy`)
    Module(String),
    /// Builtin functions available without import
    Builtins,
    /// Attribute hooks that escape the object model (`__globals__`, ...)
    Introspection,
}

impl CapabilityRoot {
    /// Canonical first segment
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Module(name) => name,
            Self::Builtins => BUILTINS_ROOT,
            Self::Introspection => INTROSPECTION_ROOT,
        }
    }
}

/// Hierarchical capability identifier
///
/// # Examples
/// - `os.system` → `Module("os")` + `["system"]`
/// - `builtins.eval` → `Builtins` + `["eval"]`
/// - `introspection.__globals__` → `Introspection` + `["__globals__"]`
///
/// Parsing maps the first segments `builtins` and `introspection` to their
/// dedicated roots. References built from import statements go through
/// [`CapabilityId::from_module_path`] instead.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CapabilityId {
    root: CapabilityRoot,
    path: SmallVec<[String; 4]>,
}

impl CapabilityId {
    /// Identifier with no sub-path
    #[inline]
    #[must_use]
    pub fn new(root: CapabilityRoot) -> Self {
        Self {
            root,
            path: SmallVec::new(),
        }
    }

    /// Whole top-level module
    #[inline]
    #[must_use]
    pub fn module(name: impl Into<String>) -> Self {
        Self::new(CapabilityRoot::Module(name.into()))
    }

    /// `builtins.<name>`
    #[inline]
    #[must_use]
    pub fn builtin(name: impl Into<String>) -> Self {
        Self::new(CapabilityRoot::Builtins).child(name)
    }

    /// `introspection.<name>`
    #[inline]
    #[must_use]
    pub fn introspection(name: impl Into<String>) -> Self {
        Self::new(CapabilityRoot::Introspection).child(name)
    }

    /// Identifier for a dotted module path as written in an import
    ///
    /// `import builtins` really is the builtins module, so that segment maps
    /// to [`CapabilityRoot::Builtins`]; everything else is a module root.
    ///
    /// Returns `None` for an empty path.
    #[must_use]
    pub fn from_module_path<'a>(segments: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let mut segments = segments.into_iter();
        let first = segments.next()?;
        let root = if first == BUILTINS_ROOT {
            CapabilityRoot::Builtins
        } else {
            CapabilityRoot::Module(first.to_string())
        };
        Some(Self {
            root,
            path: segments.map(ToString::to_string).collect(),
        })
    }

    /// Root of this identifier
    #[inline]
    #[must_use]
    pub fn root(&self) -> &CapabilityRoot {
        &self.root
    }

    /// Segments below the root
    #[inline]
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Number of segments including the root
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len() + 1
    }

    /// Last segment
    #[inline]
    #[must_use]
    pub fn last(&self) -> &str {
        self.path.last().map_or(self.root.as_str(), String::as_str)
    }

    /// Append a segment, returning a new identifier
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.path.push(segment.into());
        new
    }

    /// Append several segments
    #[must_use]
    pub fn extend<S: AsRef<str>>(&self, segments: &[S]) -> Self {
        let mut new = self.clone();
        new.path
            .extend(segments.iter().map(|s| s.as_ref().to_string()));
        new
    }

    /// Parent identifier (`None` at the root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.path.is_empty() {
            None
        } else {
            let mut parent = self.clone();
            parent.path.pop();
            Some(parent)
        }
    }

    /// Check if this identifier is a prefix of another
    ///
    /// - `os` is prefix of `os.path.join`
    /// - `os.path` is NOT prefix of `os.remove`
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.root == other.root
            && self.path.len() <= other.path.len()
            && self.path[..] == other.path[..self.path.len()]
    }

    /// This identifier and every ancestor, shortest first
    pub fn prefixes(&self) -> impl Iterator<Item = Self> + '_ {
        (0..=self.path.len()).map(move |len| Self {
            root: self.root.clone(),
            path: self.path[..len].iter().cloned().collect(),
        })
    }
}

impl Display for CapabilityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.root.as_str())?;
        for segment in &self.path {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for CapabilityId {
    type Err = CapabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(CapabilityError::Empty);
        }

        let mut segments = Vec::new();
        for segment in s.split('.') {
            if segment.is_empty() {
                return Err(CapabilityError::EmptySegment(s.to_string()));
            }
            if !is_identifier(segment) {
                return Err(CapabilityError::InvalidSegment {
                    identifier: s.to_string(),
                    segment: segment.to_string(),
                });
            }
            segments.push(segment);
        }

        let (first, rest) = segments.split_first().ok_or(CapabilityError::Empty)?;
        let root = match *first {
            BUILTINS_ROOT => CapabilityRoot::Builtins,
            INTROSPECTION_ROOT => CapabilityRoot::Introspection,
            module => CapabilityRoot::Module(module.to_string()),
        };

        Ok(Self {
            root,
            path: rest.iter().map(|s| (*s).to_string()).collect(),
        })
    }
}

impl serde::Serialize for CapabilityId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for CapabilityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Errors parsing a [`CapabilityId`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// Empty identifier
    #[error("empty capability identifier")]
    Empty,

    /// `a..b`, `.a` or `a.`
    #[error("empty segment in capability identifier '{0}'")]
    EmptySegment(String),

    /// Segment is not a Python identifier
    #[error("invalid segment '{segment}' in capability identifier '{identifier}'")]
    InvalidSegment {
        /// Full identifier
        identifier: String,
        /// Offending segment
        segment: String,
    },
}
