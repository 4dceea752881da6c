//! # Coach Dialogue
//!
//! Decides, turn by turn, whether a coaching conversation may end.
//!
//! ## Flow
//!
//! Each human turn is appended to the [`Session`](coach_core::Session), then:
//! 1. [`CoverageTracker`] scans assistant turns for the four required behaviours
//! 2. [`MutualIntentDetector`] checks the latest exchange for a two-sided goodbye
//! 3. [`LifecycleController`] combines both with the turn floor and the pending
//!    confirmation round, and returns a [`Decision`](coach_core::Decision)
//!
//! The controller is synchronous and pure; the caller owns the session and
//! applies decisions with [`LifecycleController::advance`] or `Session::apply`.

pub mod coverage;
pub mod intent;
pub mod lifecycle;
pub mod metrics;

pub use coverage::{Coverage, CoverageTracker};
pub use intent::{MutualIntent, MutualIntentDetector};
pub use lifecycle::{LifecycleController, ReplyKind};
pub use metrics::Metrics;
