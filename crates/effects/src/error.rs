//! Collaborator-level error type.

use thiserror::Error;

/// Errors returned by a collaborator port.
///
/// The executor uses the variant to decide retry behaviour:
/// - `Retryable`: the call is repeated with exponential back-off.
/// - `Fatal`    : the action fails immediately.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EffectError {
    /// Transient failure (provider timeout, connection reset, ...).
    #[error("retryable effect error: {0}")]
    Retryable(String),

    /// Permanent failure; repeating the call cannot help.
    #[error("fatal effect error: {0}")]
    Fatal(String),
}

impl EffectError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}
