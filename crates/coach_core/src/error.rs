use crate::patterns::PatternCategory;
use thiserror::Error;
use uuid::Uuid;

/// A caller asked the lifecycle to do something the policy forbids.
///
/// Fatal to the call: the same session must not be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("session {session} has already ended; no further turns or decisions are allowed")]
    SessionEnded { session: Uuid },
}

/// A configured marker could not be compiled.
#[derive(Debug, Error)]
#[error("invalid marker {marker:?} for category {category}: {source}")]
pub struct PatternError {
    pub category: PatternCategory,
    pub marker: String,
    #[source]
    pub source: regex::Error,
}
