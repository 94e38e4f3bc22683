//! Error taxonomy for dimension-selection reconciliation
//!
//! Parsing and validation errors are recovered close to the boundary
//! (the HTTP layer redirects to a corrective view). Remote-call errors
//! abort the current operation. Conflicts are always fatal to the
//! current attempt and never retried internally.

use filter_types::VersionToken;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilterError>;

/// Main error type for the controller
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("upstream {resource} returned {status}")]
    Upstream { status: u16, resource: String },

    #[error("request to {resource} failed: {source}")]
    Transport {
        resource: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode response from {resource}: {message}")]
    Decode { resource: String, message: String },

    #[error("invalid range: {0}")]
    InvalidRange(#[from] RangeError),

    #[error("version conflict on {resource}: expected {expected}, found {found}")]
    ConsistencyConflict {
        resource: String,
        expected: VersionToken,
        found: VersionToken,
    },

    /// The service refused a mutation because `expected` is no longer current
    #[error("version {expected} of {resource} is stale")]
    StaleVersion {
        resource: String,
        expected: VersionToken,
    },

    #[error(
        "partial apply on {dimension}: {} code(s) applied, {} not applied (upstream {status})",
        .applied.len(),
        .failed.len()
    )]
    PartialApply {
        dimension: String,
        applied: Vec<String>,
        failed: Vec<String>,
        status: u16,
    },

    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl FilterError {
    pub fn upstream(status: u16, resource: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            resource: resource.into(),
        }
    }

    /// Status the HTTP layer should answer with
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Upstream { status: 404, .. } => 404,
            Self::Upstream { .. } => 502,
            Self::Transport { .. } => 502,
            Self::Decode { .. } => 502,
            Self::InvalidRange(_) => 400,
            Self::ConsistencyConflict { .. } => 409,
            Self::StaleVersion { .. } => 409,
            Self::PartialApply { .. } => 502,
            Self::InvalidSubmission(_) => 400,
            Self::TaskJoin(_) => 500,
        }
    }

    /// Only a conflict can succeed on a fresh attempt with the same input
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConsistencyConflict { .. } | Self::StaleVersion { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Upstream { status: 404, .. })
    }

    /// Upstream status carried by the error, if any
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } | Self::PartialApply { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// A submitted range could not be turned into option codes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("cannot parse {field} boundary '{value}'")]
    Unparsable { field: &'static str, value: String },

    #[error("range end '{end}' precedes start '{start}'")]
    Inverted { start: String, end: String },

    #[error("no options known for the dimension")]
    EmptyCatalog,
}
