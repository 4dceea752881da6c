//! Coverage of the required coaching behaviours across the session.

use coach_core::{PatternCategory, PatternLibrary, Role, Turn};
use serde::Serialize;
use std::sync::Arc;

/// Which required behaviours the assistant has shown at least once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub open_ended: bool,
    pub reflection: bool,
    pub autonomy: bool,
    pub summary: bool,
}

impl Coverage {
    pub fn is_complete(&self) -> bool {
        self.open_ended && self.reflection && self.autonomy && self.summary
    }

    /// Names of the signals not seen yet, in fixed order.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (self.open_ended, "open-ended question"),
            (self.reflection, "reflection"),
            (self.autonomy, "autonomy support"),
            (self.summary, "summary"),
        ]
        .into_iter()
        .filter(|(seen, _)| !seen)
        .map(|(_, name)| name)
        .collect()
    }
}

pub struct CoverageTracker {
    patterns: Arc<PatternLibrary>,
}

impl CoverageTracker {
    pub fn new(patterns: Arc<PatternLibrary>) -> Self {
        Self { patterns }
    }

    /// Scan assistant turns only. A flag never goes back to false once any
    /// assistant turn has matched it.
    pub fn coverage(&self, turns: &[Turn]) -> Coverage {
        let mut coverage = Coverage::default();
        for turn in turns.iter().filter(|t| t.role == Role::Assistant) {
            if coverage.is_complete() {
                break;
            }
            let text = turn.text.as_str();
            coverage.open_ended |= self.patterns.matches(PatternCategory::OpenEndedQuestion, text);
            coverage.reflection |= self.patterns.matches(PatternCategory::Reflection, text);
            coverage.autonomy |= self.patterns.matches(PatternCategory::Autonomy, text);
            coverage.summary |= self.patterns.matches(PatternCategory::Summary, text);
        }
        coverage
    }
}
