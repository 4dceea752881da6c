use thiserror::Error;

/// What end users see whenever scoring fails closed.
pub const RETRY_MESSAGE: &str = "Assessment incomplete, please retry evaluation.";

/// A score that failed validation. Never auto-corrected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("{what}: expected {expected:.3}, got {actual:.3}")]
    Consistency {
        what: &'static str,
        expected: f64,
        actual: f64,
    },

    #[error("category '{category}' scored {points} outside [0, {max_points}]")]
    CategoryOutOfRange {
        category: String,
        points: f64,
        max_points: f64,
    },

    #[error("total {total} outside [0, {max_total}]")]
    TotalOutOfRange { total: f64, max_total: f64 },

    #[error("non-finite value in {field}")]
    NonFinite { field: String },

    #[error("invalid leniency bounds: {0}")]
    InvalidLeniencyBounds(String),
}

impl ScoreError {
    /// Message safe to show to the person who was assessed.
    pub fn user_message(&self) -> &'static str {
        RETRY_MESSAGE
    }
}
