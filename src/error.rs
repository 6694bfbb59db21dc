//! Simulator error variants

use crate::expr::KeyId;

/// Errors raised while evolving the superposition.
///
/// Grouped into three kinds. All are synchronous: a primitive
/// that fails leaves the branch list in a possibly partially-updated state,
/// and callers should treat the [`Simulator`](crate::Simulator) as tainted
/// afterwards rather than retry.
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum SimError {
    /// Misuse of the embedded language itself: modifying a controlling
    /// register, measuring inside a reversible scope, mismatched scope
    /// delimiters, a non-integer QRAM key, `cnot` with equal indices, and
    /// similar host-level contract violations.
    #[display(fmt = "structural error: {_0}")]
    Structural(String),
    /// A run-time condition the engine cannot satisfy even though the call
    /// was well-formed: an `init` target not currently zero, an uncompute
    /// that fails to separate into equal groups, a postselection whose
    /// probability falls below threshold, and similar.
    #[display(fmt = "semantic error: {_0}")]
    Semantic(String),
    /// The value handed to a primitive has the wrong category: a
    /// floating-point expression given to an integer-only primitive, a
    /// superposition list containing non-integer literals, and similar.
    #[display(fmt = "type error: {_0}")]
    Type(String),
}

impl std::error::Error for SimError {}

impl SimError {
    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }

    pub(crate) fn semantic(msg: impl Into<String>) -> Self {
        Self::Semantic(msg.into())
    }

    pub(crate) fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub(crate) fn controls_key(key: KeyId) -> Self {
        Self::structural(format!(
            "cannot modify register for key {key:?}: it is referenced by an open control"
        ))
    }
}

/// Result alias used throughout the crate.
pub type SimResult<T> = Result<T, SimError>;
