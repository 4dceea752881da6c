//! Per-session lifecycle counters.
//!
//! Owned by the caller and fed from returned decisions; the controller itself
//! keeps no counters.

use coach_core::{Decision, PolicyViolation, Trigger};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub decisions: u32,
    pub first_prompts: u32,
    pub second_prompts: u32,
    pub confirmed_endings: u32,
    pub mutual_intent_endings: u32,
    pub parked: u32,
    pub resumed: u32,
    pub policy_violations: u32,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, decision: &Decision) {
        self.decisions += 1;
        match decision.trigger {
            Trigger::ClosureReady => self.first_prompts += 1,
            Trigger::AmbiguousConfirmation => self.second_prompts += 1,
            Trigger::ExplicitConfirmation => self.confirmed_endings += 1,
            Trigger::MutualIntent => self.mutual_intent_endings += 1,
            Trigger::NoQualifyingReply => self.parked += 1,
            Trigger::Resumed | Trigger::ResumedDiscussion => self.resumed += 1,
            Trigger::Continue | Trigger::AwaitingReply | Trigger::StillParked => {}
        }
    }

    pub fn record_violation(&mut self, violation: &PolicyViolation) {
        tracing::warn!("policy violation: {}", violation);
        self.policy_violations += 1;
    }

    /// First prompts that did not lead to a confirmed end.
    pub fn unconfirmed_prompts(&self) -> u32 {
        self.first_prompts.saturating_sub(self.confirmed_endings)
    }
}
