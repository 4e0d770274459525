//! Error types for the structural validator
//!
//! These are infrastructure failures of the parser itself. A candidate that
//! does not parse is not an error here; it produces a syntax violation.

/// Errors raised while constructing or running the parser
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Grammar could not be loaded into the parser
    #[error("failed to load python grammar: {0}")]
    Grammar(#[from] tree_sitter::LanguageError),

    /// Parser returned no tree (cancelled or timed out)
    #[error("parser aborted before producing a tree")]
    Aborted,
}
