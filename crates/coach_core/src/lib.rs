//! # Coach Core
//!
//! Shared vocabulary of the coaching gate:
//!
//! - **Session model**: turns, lifecycle states and the decision record the
//!   lifecycle controller emits
//! - **Patterns**: versioned lexical marker sets, one per [`PatternCategory`]
//! - **Rubric**: scoring categories, levels and rubric versions
//! - **Config**: TOML + environment configuration for every component
//!
//! Nothing in this crate performs I/O except [`CoachConfig::load`].

pub mod config;
pub mod error;
pub mod patterns;
pub mod rubric;
pub mod session;

pub use config::{CoachConfig, LeniencyConfig, LifecycleConfig, PatternConfig, ScoringConfig};
pub use error::{PatternError, PolicyViolation};
pub use patterns::{PatternCategory, PatternLibrary, PatternSet};
pub use rubric::{normalize_category, Level, Rubric, RubricCategory, RubricVersion};
pub use session::{Decision, LifecycleState, Role, Session, Trigger, Turn};
