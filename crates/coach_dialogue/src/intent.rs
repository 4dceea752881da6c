//! Two-party handshake: the human wants to leave and the assistant said goodbye.
//!
//! Both signals are read from the most recent turn of their role only, never
//! from older history.

use coach_core::{PatternCategory, PatternLibrary, Role, Turn};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MutualIntent {
    pub human_end_intent: bool,
    pub assistant_closing_ack: bool,
}

impl MutualIntent {
    pub fn is_mutual(&self) -> bool {
        self.human_end_intent && self.assistant_closing_ack
    }
}

pub struct MutualIntentDetector {
    patterns: Arc<PatternLibrary>,
}

impl MutualIntentDetector {
    pub fn new(patterns: Arc<PatternLibrary>) -> Self {
        Self { patterns }
    }

    pub fn last_human_end_intent(&self, turns: &[Turn]) -> bool {
        last_of(turns, Role::Human)
            .is_some_and(|text| self.patterns.matches(PatternCategory::EndIntent, text))
    }

    pub fn last_assistant_closing_ack(&self, turns: &[Turn]) -> bool {
        last_of(turns, Role::Assistant)
            .is_some_and(|text| self.patterns.matches(PatternCategory::ClosingAcknowledgment, text))
    }

    pub fn from_turns(&self, turns: &[Turn]) -> MutualIntent {
        MutualIntent {
            human_end_intent: self.last_human_end_intent(turns),
            assistant_closing_ack: self.last_assistant_closing_ack(turns),
        }
    }

    /// Same check on texts handed in directly by the chat loop.
    pub fn evaluate(&self, human_text: &str, assistant_text: &str) -> MutualIntent {
        MutualIntent {
            human_end_intent: self.patterns.matches(PatternCategory::EndIntent, human_text),
            assistant_closing_ack: self
                .patterns
                .matches(PatternCategory::ClosingAcknowledgment, assistant_text),
        }
    }
}

fn last_of(turns: &[Turn], role: Role) -> Option<&str> {
    turns
        .iter()
        .rev()
        .find(|t| t.role == role)
        .map(|t| t.text.as_str())
}
