//! Session model: the append-only turn log plus the lifecycle fields the
//! controller is allowed to change.

use crate::error::PolicyViolation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Assistant,
}

/// One utterance. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub sequence_index: u64,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Lifecycle state
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Normal conversation
    #[default]
    Active,
    /// First confirmation prompt injected, waiting for the reply
    PendingEndConfirmation,
    /// Reply was ambiguous, second (more explicit) prompt injected
    AwaitingSecondConfirmation,
    /// Terminal
    Ended,
    /// Suspended without a clear answer; resumable
    Parked,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Active => "active",
            LifecycleState::PendingEndConfirmation => "pending_end_confirmation",
            LifecycleState::AwaitingSecondConfirmation => "awaiting_second_confirmation",
            LifecycleState::Ended => "ended",
            LifecycleState::Parked => "parked",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Ended)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Decision record
// ============================================================================

/// Which row of the transition table produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Human end intent and assistant goodbye on the latest exchange.
    MutualIntent,
    /// Floor reached, coverage complete, closure offered, human satisfied.
    ClosureReady,
    /// Nothing qualifies yet.
    Continue,
    /// Explicit "we're done" while a confirmation was pending.
    ExplicitConfirmation,
    /// Bare acknowledgement to the first prompt.
    AmbiguousConfirmation,
    /// Human kept talking instead of confirming.
    ResumedDiscussion,
    /// Pending confirmation, empty reply.
    AwaitingReply,
    /// Second prompt answered ambiguously or not at all.
    NoQualifyingReply,
    /// Parked session picked up again.
    Resumed,
    /// Parked session, still nothing new.
    StillParked,
}

/// Output of one `decide()` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub should_stop: bool,
    pub new_state: LifecycleState,
    pub confirmation_round: u8,
    pub reason: String,
    pub injected_prompt: Option<String>,
    /// `Some(true)` on a confirmed end, `Some(false)` when parked unconfirmed.
    pub confirmed: Option<bool>,
    pub trigger: Trigger,
}

impl Decision {
    /// The session is suspended rather than finished.
    pub fn suspends(&self) -> bool {
        self.new_state == LifecycleState::Parked
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    id: Uuid,
    turns: Vec<Turn>,
    state: LifecycleState,
    confirmation_round: u8,
    confirmed: Option<bool>,
    end_trigger: Option<Trigger>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            turns: Vec::new(),
            state: LifecycleState::Active,
            confirmation_round: 0,
            confirmed: None,
            end_trigger: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn confirmation_round(&self) -> u8 {
        self.confirmation_round
    }

    pub fn confirmed(&self) -> Option<bool> {
        self.confirmed
    }

    pub fn end_trigger(&self) -> Option<Trigger> {
        self.end_trigger
    }

    /// Number of human turns so far.
    pub fn turn_count(&self) -> usize {
        self.turns.iter().filter(|t| t.role == Role::Human).count()
    }

    /// Text of the most recent turn with the given role.
    pub fn last_text(&self, role: Role) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == role)
            .map(|t| t.text.as_str())
    }

    pub fn push_human(&mut self, text: impl Into<String>) -> Result<&Turn, PolicyViolation> {
        self.push_turn_at(Role::Human, text, Utc::now())
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) -> Result<&Turn, PolicyViolation> {
        self.push_turn_at(Role::Assistant, text, Utc::now())
    }

    /// Append a turn with an explicit timestamp (replays, tests).
    pub fn push_turn_at(
        &mut self,
        role: Role,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<&Turn, PolicyViolation> {
        self.ensure_open()?;
        let sequence_index = self.turns.len() as u64;
        self.turns.push(Turn {
            role,
            text: text.into(),
            sequence_index,
            timestamp,
        });
        Ok(&self.turns[self.turns.len() - 1])
    }

    /// Apply a controller decision. Only lifecycle fields change.
    pub fn apply(&mut self, decision: &Decision) -> Result<(), PolicyViolation> {
        self.ensure_open()?;
        if self.state != decision.new_state {
            tracing::info!(
                "session {}: {} → {} ({:?})",
                self.id,
                self.state,
                decision.new_state,
                decision.trigger
            );
        }
        self.state = decision.new_state;
        self.confirmation_round = decision.confirmation_round;
        self.confirmed = decision.confirmed;
        if decision.new_state == LifecycleState::Ended {
            self.end_trigger = Some(decision.trigger);
        }
        Ok(())
    }

    /// Ended without the human confirming and not by a mutual goodbye.
    /// Downstream reporting should flag these rather than treat them as normal.
    pub fn is_anomalous_close(&self) -> bool {
        self.state == LifecycleState::Ended
            && self.confirmed != Some(true)
            && self.end_trigger != Some(Trigger::MutualIntent)
    }

    fn ensure_open(&self) -> Result<(), PolicyViolation> {
        if self.state.is_terminal() {
            Err(PolicyViolation::SessionEnded { session: self.id })
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
