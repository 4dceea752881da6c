//! Session-termination state machine.
//!
//! | State | Input | Next |
//! |---|---|---|
//! | Active | mutual goodbye | Ended (silent) |
//! | Active | floor + coverage + closure offered + satisfied | PendingEndConfirmation (prompt 1) |
//! | Pending | explicit yes | Ended, confirmed |
//! | Pending | bare acknowledgement | AwaitingSecondConfirmation (prompt 2) |
//! | Pending | keeps talking, or hedges ("not yet") | Active |
//! | Awaiting | explicit yes | Ended, confirmed |
//! | Awaiting | bare acknowledgement / nothing | Parked, unconfirmed |
//! | Awaiting | keeps talking, or hedges | Active |
//! | Parked | new human turn | Active |
//! | Ended | anything | `PolicyViolation` |
//!
//! The turn count is a floor for the closure path, never a trigger on its own.

use crate::coverage::CoverageTracker;
use crate::intent::MutualIntentDetector;
use anyhow::Result;
use coach_core::{
    CoachConfig, Decision, LifecycleConfig, LifecycleState, PatternCategory, PatternLibrary,
    PolicyViolation, Role, Session, Trigger,
};
use std::sync::Arc;

/// How a reply to a confirmation prompt reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Explicit,
    Ambiguous,
    Absent,
    Substantive,
}

pub struct LifecycleController {
    config: LifecycleConfig,
    patterns: Arc<PatternLibrary>,
    coverage: CoverageTracker,
    intent: MutualIntentDetector,
}

impl LifecycleController {
    pub fn new(config: LifecycleConfig, patterns: Arc<PatternLibrary>) -> Self {
        Self {
            coverage: CoverageTracker::new(patterns.clone()),
            intent: MutualIntentDetector::new(patterns.clone()),
            config,
            patterns,
        }
    }

    pub fn from_config(config: &CoachConfig) -> Result<Self> {
        let patterns = Arc::new(config.patterns.build_library()?);
        Ok(Self::new(config.lifecycle.clone(), patterns))
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Pure decision for the latest exchange. Identical inputs give identical
    /// decisions; the session is not touched.
    pub fn decide(
        &self,
        session: &Session,
        last_human_text: &str,
        last_assistant_text: &str,
    ) -> Result<Decision, PolicyViolation> {
        let decision = match session.state() {
            LifecycleState::Active => self.decide_active(session, last_human_text, last_assistant_text),
            LifecycleState::PendingEndConfirmation => self.decide_pending(session, last_human_text),
            LifecycleState::AwaitingSecondConfirmation => {
                self.decide_awaiting(session, last_human_text)
            }
            LifecycleState::Parked => self.decide_parked(session, last_human_text),
            LifecycleState::Ended => {
                tracing::warn!("decide() called on ended session {}", session.id());
                return Err(PolicyViolation::SessionEnded {
                    session: session.id(),
                });
            }
        };

        tracing::debug!(
            "session {} [{}] → {} ({:?}): {}",
            session.id(),
            session.state(),
            decision.new_state,
            decision.trigger,
            decision.reason
        );
        Ok(decision)
    }

    /// `decide` followed by `Session::apply`.
    pub fn advance(
        &self,
        session: &mut Session,
        last_human_text: &str,
        last_assistant_text: &str,
    ) -> Result<Decision, PolicyViolation> {
        let decision = self.decide(session, last_human_text, last_assistant_text)?;
        session.apply(&decision)?;
        Ok(decision)
    }

    /// `advance` using the latest human and assistant turns already in the session.
    pub fn advance_latest(&self, session: &mut Session) -> Result<Decision, PolicyViolation> {
        let human = session.last_text(Role::Human).unwrap_or_default().to_string();
        let assistant = session.last_text(Role::Assistant).unwrap_or_default().to_string();
        self.advance(session, &human, &assistant)
    }

    pub fn classify_reply(&self, reply: &str) -> ReplyKind {
        let trimmed = reply.trim();
        if trimmed.is_empty() {
            return ReplyKind::Absent;
        }
        let token_hit = self
            .config
            .confirmation_token
            .as_deref()
            .is_some_and(|token| token.trim().eq_ignore_ascii_case(trimmed));
        if token_hit {
            ReplyKind::Explicit
        } else if self.patterns.matches(PatternCategory::Hesitation, trimmed) {
            // "don't end it yet" also contains "end it"
            ReplyKind::Substantive
        } else if self.patterns.matches(PatternCategory::ExplicitAffirmative, trimmed) {
            ReplyKind::Explicit
        } else if self.patterns.matches(PatternCategory::AmbiguousAffirmative, trimmed) {
            ReplyKind::Ambiguous
        } else {
            ReplyKind::Substantive
        }
    }

    // ========================================================================
    // Per-state rules
    // ========================================================================

    fn decide_active(&self, session: &Session, human: &str, assistant: &str) -> Decision {
        let turn_count = session.turn_count();
        let floor_met = turn_count >= self.config.min_turns;

        let intent = self.intent.evaluate(human, assistant);
        if intent.is_mutual() && (self.config.mutual_intent_overrides_floor || floor_met) {
            return Decision {
                should_stop: true,
                new_state: LifecycleState::Ended,
                confirmation_round: 0,
                reason: format!(
                    "mutual end intent after {} turn(s): human is leaving and assistant said goodbye",
                    turn_count
                ),
                injected_prompt: None,
                confirmed: None,
                trigger: Trigger::MutualIntent,
            };
        }

        let coverage = self.coverage.coverage(session.turns());
        let closure_offered = self.patterns.matches(PatternCategory::ClosureOffer, assistant);
        let satisfied = self.patterns.matches(PatternCategory::Satisfaction, human);

        if floor_met && coverage.is_complete() && closure_offered && satisfied {
            return Decision {
                should_stop: false,
                new_state: LifecycleState::PendingEndConfirmation,
                confirmation_round: 1,
                reason: format!(
                    "{} turns, all coverage signals present, closure offered and accepted; asking for confirmation",
                    turn_count
                ),
                injected_prompt: Some(self.config.first_confirmation_prompt.clone()),
                confirmed: None,
                trigger: Trigger::ClosureReady,
            };
        }

        let mut gaps = Vec::new();
        if !floor_met {
            gaps.push(format!("{}/{} turns", turn_count, self.config.min_turns));
        }
        let missing = coverage.missing();
        if !missing.is_empty() {
            gaps.push(format!("missing {}", missing.join(", ")));
        }
        if !closure_offered {
            gaps.push("no closure offered".to_string());
        }
        if !satisfied {
            gaps.push("no satisfaction signal".to_string());
        }
        if intent.is_mutual() {
            gaps.push("mutual goodbye ignored below floor".to_string());
        }

        Decision {
            should_stop: false,
            new_state: LifecycleState::Active,
            confirmation_round: 0,
            reason: format!("continue: {}", gaps.join("; ")),
            injected_prompt: None,
            confirmed: None,
            trigger: Trigger::Continue,
        }
    }

    fn decide_pending(&self, session: &Session, reply: &str) -> Decision {
        match self.classify_reply(reply) {
            ReplyKind::Explicit => ended_confirmed(session, "human confirmed the end of the session"),
            ReplyKind::Ambiguous => Decision {
                should_stop: false,
                new_state: LifecycleState::AwaitingSecondConfirmation,
                confirmation_round: 2,
                reason: "ambiguous acknowledgement; asking once more explicitly".to_string(),
                injected_prompt: Some(self.config.second_confirmation_prompt.clone()),
                confirmed: None,
                trigger: Trigger::AmbiguousConfirmation,
            },
            ReplyKind::Absent => Decision {
                should_stop: false,
                new_state: LifecycleState::PendingEndConfirmation,
                confirmation_round: session.confirmation_round(),
                reason: "waiting for a reply to the confirmation prompt".to_string(),
                injected_prompt: None,
                confirmed: None,
                trigger: Trigger::AwaitingReply,
            },
            ReplyKind::Substantive => resumed(
                Trigger::ResumedDiscussion,
                "human kept discussing; confirmation withdrawn",
            ),
        }
    }

    fn decide_awaiting(&self, session: &Session, reply: &str) -> Decision {
        match self.classify_reply(reply) {
            ReplyKind::Explicit => ended_confirmed(session, "human confirmed on the second prompt"),
            kind @ (ReplyKind::Ambiguous | ReplyKind::Absent) => Decision {
                should_stop: false,
                new_state: LifecycleState::Parked,
                confirmation_round: session.confirmation_round(),
                reason: if kind == ReplyKind::Absent {
                    "no reply to the second confirmation; parking session".to_string()
                } else {
                    "still ambiguous after the second confirmation; parking session".to_string()
                },
                injected_prompt: None,
                confirmed: Some(false),
                trigger: Trigger::NoQualifyingReply,
            },
            ReplyKind::Substantive => resumed(
                Trigger::ResumedDiscussion,
                "human kept discussing after the second prompt; confirmation withdrawn",
            ),
        }
    }

    fn decide_parked(&self, session: &Session, reply: &str) -> Decision {
        if reply.trim().is_empty() {
            Decision {
                should_stop: false,
                new_state: LifecycleState::Parked,
                confirmation_round: session.confirmation_round(),
                reason: "session parked; waiting for the human to return".to_string(),
                injected_prompt: None,
                confirmed: Some(false),
                trigger: Trigger::StillParked,
            }
        } else {
            resumed(Trigger::Resumed, "parked session resumed by a new human turn")
        }
    }
}

fn ended_confirmed(session: &Session, reason: &str) -> Decision {
    Decision {
        should_stop: true,
        new_state: LifecycleState::Ended,
        confirmation_round: session.confirmation_round(),
        reason: reason.to_string(),
        injected_prompt: None,
        confirmed: Some(true),
        trigger: Trigger::ExplicitConfirmation,
    }
}

fn resumed(trigger: Trigger, reason: &str) -> Decision {
    Decision {
        should_stop: false,
        new_state: LifecycleState::Active,
        confirmation_round: 0,
        reason: reason.to_string(),
        injected_prompt: None,
        confirmed: None,
        trigger,
    }
}
