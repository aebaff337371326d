//! Engine-level error types.

use thiserror::Error;

use effects::EffectError;

use crate::catalog::CatalogIssue;
use crate::template::TemplateError;

/// Errors produced by the automation engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Catalog errors ------

    /// A catalog document could not be decoded.
    #[error("invalid catalog JSON: {0}")]
    CatalogParse(#[from] serde_json::Error),

    /// The catalog decoded but breaks one or more recipe rules.
    #[error("catalog has {} issue(s)", .0.len())]
    InvalidCatalog(Vec<CatalogIssue>),

    // ------ Action errors ------

    /// A template in the action could not be rendered.
    #[error("template in '{field}' failed: {source}")]
    Template {
        field: &'static str,
        #[source]
        source: TemplateError,
    },

    /// A `*_path` field names a path that is absent from the payload.
    #[error("'{field}' path '{path}' does not resolve against the payload")]
    UnresolvedPath { field: &'static str, path: String },

    /// A `*_path` resolved to a value of the wrong shape.
    #[error("'{field}' path '{path}' resolved to {found}, expected {expected}")]
    InvalidValue {
        field: &'static str,
        path: String,
        expected: &'static str,
        found: String,
    },

    /// An action names neither or both of an either/or field pair.
    #[error("action must set exactly one of {0}")]
    AmbiguousSource(&'static str),

    /// The collaborator failed (after retries, for retryable errors).
    #[error("{kind} failed: {source}")]
    Effect {
        kind: &'static str,
        #[source]
        source: EffectError,
    },
}

impl EngineError {
    /// Whether repeating the same event later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Effect { source, .. } if source.is_retryable())
    }
}
