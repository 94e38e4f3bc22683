//! Version-token agreement between reads
//!
//! A diff is only valid if every read it was computed from saw the same
//! revision of the resource. There is no local locking: correctness rests
//! on the server's tokens and on aborting when they disagree.

use filter_types::VersionToken;

use crate::error::{FilterError, Result};

/// Fail with a conflict unless both reads saw the same revision
pub fn check(resource: &str, expected: &VersionToken, found: &VersionToken) -> Result<()> {
    if expected == found {
        return Ok(());
    }
    tracing::warn!(
        resource,
        expected = %expected,
        found = %found,
        "version token changed between reads"
    );
    Err(FilterError::ConsistencyConflict {
        resource: resource.to_string(),
        expected: expected.clone(),
        found: found.clone(),
    })
}

/// Accumulates the tokens seen across a sequence of reads of one resource.
///
/// The first token observed becomes the reference; every later one must match.
/// Reads that carry no token (unversioned resources) are ignored.
#[derive(Debug, Clone)]
pub struct TokenWitness {
    resource: String,
    seen: Option<VersionToken>,
}

impl TokenWitness {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            seen: None,
        }
    }

    /// Start from a token already read (e.g. from the job state)
    pub fn starting_at(resource: impl Into<String>, token: VersionToken) -> Self {
        Self {
            resource: resource.into(),
            seen: Some(token),
        }
    }

    pub fn observe(&mut self, token: Option<&VersionToken>) -> Result<()> {
        let Some(token) = token else {
            return Ok(());
        };
        match &self.seen {
            Some(expected) => check(&self.resource, expected, token),
            None => {
                self.seen = Some(token.clone());
                Ok(())
            }
        }
    }

    pub fn token(&self) -> Option<&VersionToken> {
        self.seen.as_ref()
    }

    pub fn into_token(self) -> Option<VersionToken> {
        self.seen
    }
}
