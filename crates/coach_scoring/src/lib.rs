//! # Coach Scoring
//!
//! Turns the evaluator's free-text assessment into an auditable score:
//!
//! - **Parser**: per-category entries in document order, malformed lines
//!   recorded as anomalies instead of failing
//! - **Aggregator**: last occurrence wins per category, total summed from the
//!   deduplicated map, validation fails closed
//! - **Leniency**: optional bounded engagement/timing adjustment
//!
//! Every [`ScoreBreakdown`] handed out has passed validation.

pub mod aggregator;
pub mod breakdown;
pub mod error;
pub mod leniency;
pub mod parser;
pub mod pipeline;

pub use aggregator::{aggregate, ScoreAggregator};
pub use breakdown::{CategoryScore, ScoreBreakdown};
pub use error::ScoreError;
pub use leniency::{EngagementSignal, LeniencyModifier, TimingSignal};
pub use parser::{ParseAnomaly, ParsedAssessment, ParsedEntry, ReportedTotal, ScoreParser};
pub use pipeline::{score_assessment, score_assessment_with_leniency, ScoreReport};
