//! # Error Types
//!
//! The error taxonomy shared by every DeepAudit crate. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Propagation
//!
//! - Single, explicit calls (e.g. embedding a malformed vector) return the
//!   typed error to the immediate caller.
//! - Batch loops inside the evaluation pipeline catch per-identity errors,
//!   log them, and skip that identity.
//! - Empty score collections are not errors: metrics resolve them to an
//!   explicit zero. [`DeepAuditError::InsufficientData`] is reserved for
//!   operations that cannot produce any meaningful default.

use thiserror::Error;

/// Top-level error type for DeepAudit.
#[derive(Error, Debug)]
pub enum DeepAuditError {
    /// Referenced identity is absent from the store.
    #[error("identity not found: {identity}")]
    NotFound {
        /// The identity that was looked up.
        identity: String,
    },

    /// Vector length differs from the expected fixed dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The configured embedding dimension.
        expected: usize,
        /// The length of the offending vector.
        actual: usize,
    },

    /// Zero or near-zero norm vector that cannot be normalized.
    #[error("degenerate input: vector norm {norm:e} is too small to normalize")]
    DegenerateInput {
        /// The measured L2 norm.
        norm: f64,
    },

    /// Not enough samples or identities to run an operation.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Similarity score is not a finite number.
    #[error("invalid similarity score: {0}")]
    InvalidScore(f64),

    /// An operation parameter is outside its valid range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Attempt to overwrite an identity's Clean reference vector.
    #[error("clean reference for {identity} is write-once")]
    ImmutableVariant {
        /// The identity whose Clean vector was targeted.
        identity: String,
    },

    /// Identity already enrolled.
    #[error("identity already enrolled: {identity}")]
    AlreadyEnrolled {
        /// The duplicate identity.
        identity: String,
    },

    /// Configuration is malformed or out of range.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, DeepAuditError>;

impl DeepAuditError {
    /// Shorthand for [`DeepAuditError::NotFound`].
    pub fn not_found(identity: impl std::fmt::Display) -> Self {
        Self::NotFound {
            identity: identity.to_string(),
        }
    }

    /// Shorthand for [`DeepAuditError::InvalidParameter`].
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
