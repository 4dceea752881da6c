//! Lexical marker library.
//!
//! Every marker the lifecycle cares about lives in a list literal keyed by
//! [`PatternCategory`]. Control logic only asks `matches(category, text)`, so
//! adding a marker is a data change here or in `[patterns.extra]` of the config.
//! Matching is case-insensitive regex search; curly apostrophes are folded to
//! `'` before matching.

use crate::error::PatternError;
use crate::rubric::Level;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Version tag of the built-in marker lists. Bump whenever a list changes.
pub const PATTERN_VERSION: &str = "3";

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    /// Assistant asks an open question ("what", "how", "tell me more").
    OpenEndedQuestion,
    /// Assistant reflects the human's words or feelings back.
    Reflection,
    /// Assistant affirms the human's choice and control.
    Autonomy,
    /// Assistant summarizes the conversation so far.
    Summary,
    /// Human unambiguously confirms the session should end.
    ExplicitAffirmative,
    /// Short acknowledgement that might or might not mean "end it".
    AmbiguousAffirmative,
    /// Human signals they want to leave.
    EndIntent,
    /// Assistant says goodbye.
    ClosingAcknowledgment,
    /// Assistant offers to wrap up.
    ClosureOffer,
    /// Human expresses satisfaction with the session.
    Satisfaction,
    /// Human negates or hedges; overrides any confirmation marker in the same reply.
    Hesitation,
}

impl PatternCategory {
    pub const ALL: [PatternCategory; 11] = [
        PatternCategory::OpenEndedQuestion,
        PatternCategory::Reflection,
        PatternCategory::Autonomy,
        PatternCategory::Summary,
        PatternCategory::ExplicitAffirmative,
        PatternCategory::AmbiguousAffirmative,
        PatternCategory::EndIntent,
        PatternCategory::ClosingAcknowledgment,
        PatternCategory::ClosureOffer,
        PatternCategory::Satisfaction,
        PatternCategory::Hesitation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::OpenEndedQuestion => "open_ended_question",
            PatternCategory::Reflection => "reflection",
            PatternCategory::Autonomy => "autonomy",
            PatternCategory::Summary => "summary",
            PatternCategory::ExplicitAffirmative => "explicit_affirmative",
            PatternCategory::AmbiguousAffirmative => "ambiguous_affirmative",
            PatternCategory::EndIntent => "end_intent",
            PatternCategory::ClosingAcknowledgment => "closing_acknowledgment",
            PatternCategory::ClosureOffer => "closure_offer",
            PatternCategory::Satisfaction => "satisfaction",
            PatternCategory::Hesitation => "hesitation",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Built-in markers for this category.
    pub fn builtin_markers(&self) -> &'static [&'static str] {
        match self {
            PatternCategory::OpenEndedQuestion => OPEN_ENDED_QUESTION,
            PatternCategory::Reflection => REFLECTION,
            PatternCategory::Autonomy => AUTONOMY,
            PatternCategory::Summary => SUMMARY,
            PatternCategory::ExplicitAffirmative => EXPLICIT_AFFIRMATIVE,
            PatternCategory::AmbiguousAffirmative => AMBIGUOUS_AFFIRMATIVE,
            PatternCategory::EndIntent => END_INTENT,
            PatternCategory::ClosingAcknowledgment => CLOSING_ACKNOWLEDGMENT,
            PatternCategory::ClosureOffer => CLOSURE_OFFER,
            PatternCategory::Satisfaction => SATISFACTION,
            PatternCategory::Hesitation => HESITATION,
        }
    }
}

impl fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Built-in marker lists
// ============================================================================

const OPEN_ENDED_QUESTION: &[&str] = &[
    r"\b(what|how|why|in what way)\b[^.?!]*\?",
    r"\btell me (more )?about\b",
    r"\bhelp me understand\b",
    r"\bcould you (describe|share|say more)\b",
    r"\bwhat else\b",
];

const REFLECTION: &[&str] = &[
    r"\bit sounds like\b",
    r"\bsounds like you\b",
    r"\bit seems (like|that)?\s*you\b",
    r"\byou('re| are) feeling\b",
    r"\byou feel\b",
    r"\bwhat i'?m hearing\b",
    r"\byou('re| are) saying\b",
    r"\bso for you\b",
];

const AUTONOMY: &[&str] = &[
    r"\bup to you\b",
    r"\byour (choice|decision|call)\b",
    r"\byou decide\b",
    r"\bwhatever you (choose|decide)\b",
    r"\byou know (yourself )?best\b",
    r"\bwhat would you like to\b",
    r"\bin your own (time|way)\b",
];

const SUMMARY: &[&str] = &[
    r"\bto summari[sz]e\b",
    r"\bin summary\b",
    r"\blet me summari[sz]e\b",
    r"\b(to|let me) recap\b",
    r"\bso far we'?ve\b",
    r"\bwe'?ve (talked|spoken) about\b",
    r"\blet me pull (this|that|it) together\b",
];

const EXPLICIT_AFFIRMATIVE: &[&str] = &[
    r"\bno,?\s+(we'?re|i'?m|we are|i am)\s+(all\s+)?done\b",
    r"\b(we'?re|we are|i'?m|i am)\s+(all\s+)?(done|finished)\b",
    r"\byes,?\s+(please\s+)?end\b",
    r"\bend\s+(the\s+|this\s+|our\s+)?session\b",
    r"\bplease end\b",
    r"\bthat'?s all\b",
    r"\bnothing else\b",
    r"\byes,?\s+i'?m sure\b",
];

// Anchored: only a bare acknowledgement counts as ambiguous.
const AMBIGUOUS_AFFIRMATIVE: &[&str] = &[
    r"^\W*(ok(ay)?|k|sure|yeah|yep|yes|fine|alright|all right|cool|got it|sounds good)\W*$",
    r"^\W*(i guess( so)?|maybe|i think so|probably|i suppose)\W*$",
    r"^\W*(thanks|thank you|thx|ty)\W*$",
];

const END_INTENT: &[&str] = &[
    r"\b(i|i'?ve) (have|got|need) to go\b",
    r"\bgotta go\b",
    r"\bgood\s*bye\b",
    r"\bbye\b",
    r"\bthat'?s (all|it) for (today|now)\b",
    r"\blet'?s (stop|end|wrap (it )?up)\b",
    r"\btalk (to you )?later\b",
    r"\bsee you\b",
];

const CLOSING_ACKNOWLEDGMENT: &[&str] = &[
    r"\bgood\s*bye\b",
    r"\btake care\b",
    r"\b(best of|good) luck\b",
    r"\bthank you for (sharing|talking|your time|coming)\b",
    r"\bit was (great|nice|a pleasure) (talking|speaking|working)\b",
    r"\bhave a (great|good|nice) (day|evening|week|one)\b",
];

const CLOSURE_OFFER: &[&str] = &[
    r"\bis there anything else\b",
    r"\banything else you'?d like\b",
    r"\bwould you like to (end|stop|wrap up|finish)\b",
    r"\b(ready|time) to (wrap up|end|finish|close)\b",
    r"\bbefore we (end|finish|wrap up|close)\b",
    r"\bshall we (end|stop|wrap up)\b",
];

const SATISFACTION: &[&str] = &[
    r"\bthank(s| you)\b",
    r"\b(really |very )?helpful\b",
    r"\b(this|that|it) (was|is|has been) (really |very )?(great|useful|good)\b",
    r"\bi feel (better|good|ready|clearer)\b",
    r"\bappreciate\b",
    r"\bmakes sense\b",
];

const HESITATION: &[&str] = &[
    r"\b(don'?t|do not|doesn'?t|does not)\b",
    r"\bnot\s+(sure|yet|ready|quite|really|done|finished|all|over)\b",
    r"\b(isn'?t|aren'?t|is not|are not)\s+(all|done|finished|over)\b",
    r"\b(hold on|wait)\b",
    r"\bone more (thing|question)\b",
    r"\b(keep|continue) (going|talking)\b",
];

/// Textual encodings of rubric levels, longest first so that
/// "partially met" and "not met" win over "met".
pub const LEVEL_ENCODINGS: &[(&str, Level)] = &[
    ("needs improvement", Level::NeedsImprovement),
    ("meets criteria", Level::MeetsCriteria),
    ("does not meet", Level::NotMet),
    ("partially met", Level::PartiallyMet),
    ("partly met", Level::PartiallyMet),
    ("partial", Level::PartiallyMet),
    ("not met", Level::NotMet),
    ("unmet", Level::NotMet),
    ("met", Level::Met),
];

/// Map a level phrase (any case, any inner spacing) to its [`Level`].
pub fn level_from_text(text: &str) -> Option<Level> {
    let folded = text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    LEVEL_ENCODINGS
        .iter()
        .find(|(phrase, _)| *phrase == folded)
        .map(|(_, level)| *level)
}

// ============================================================================
// PatternSet / PatternLibrary
// ============================================================================

/// Compiled markers of a single category.
#[derive(Debug, Clone)]
pub struct PatternSet {
    category: PatternCategory,
    version: String,
    markers: Vec<Regex>,
}

impl PatternSet {
    pub fn compile<S: AsRef<str>>(
        category: PatternCategory,
        version: impl Into<String>,
        markers: &[S],
    ) -> Result<Self, PatternError> {
        let markers = markers
            .iter()
            .map(|m| compile_marker(category, m.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            category,
            version: version.into(),
            markers,
        })
    }

    pub fn category(&self) -> PatternCategory {
        self.category
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn matches(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    /// Source of the first marker that hits, for logging.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        let folded = fold_apostrophes(text);
        self.markers
            .iter()
            .find(|re| re.is_match(&folded))
            .map(|re| re.as_str())
    }
}

/// All marker sets, read-only after construction and safe to share via `Arc`.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    version: String,
    sets: HashMap<PatternCategory, PatternSet>,
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PatternLibrary {
    /// Library built from the literal lists in this module.
    pub fn builtin() -> Self {
        Self::with_extra(&HashMap::new()).expect("built-in marker lists are valid regex")
    }

    /// Built-in markers plus caller-supplied ones appended per category.
    /// Extra markers bump the version to `<builtin>+custom`.
    pub fn with_extra(extra: &HashMap<PatternCategory, Vec<String>>) -> Result<Self, PatternError> {
        let has_extra = extra.values().any(|v| !v.is_empty());
        let version = if has_extra {
            format!("{}+custom", PATTERN_VERSION)
        } else {
            PATTERN_VERSION.to_string()
        };

        let mut sets = HashMap::new();
        for category in PatternCategory::ALL {
            let mut markers: Vec<String> = category
                .builtin_markers()
                .iter()
                .map(|m| m.to_string())
                .collect();
            if let Some(more) = extra.get(&category) {
                markers.extend(more.iter().cloned());
            }
            sets.insert(category, PatternSet::compile(category, version.clone(), &markers)?);
        }

        tracing::debug!("PatternLibrary v{} compiled ({} categories)", version, sets.len());
        Ok(Self { version, sets })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn set(&self, category: PatternCategory) -> &PatternSet {
        // Every category is inserted by `with_extra`.
        &self.sets[&category]
    }

    pub fn matches(&self, category: PatternCategory, text: &str) -> bool {
        match self.set(category).first_match(text) {
            Some(marker) => {
                tracing::trace!("marker hit: {} ~ /{}/", category, marker);
                true
            }
            None => false,
        }
    }
}

fn compile_marker(category: PatternCategory, marker: &str) -> Result<Regex, PatternError> {
    RegexBuilder::new(marker)
        .case_insensitive(true)
        .build()
        .map_err(|source| PatternError {
            category,
            marker: marker.to_string(),
            source,
        })
}

fn fold_apostrophes(text: &str) -> String {
    text.replace(['\u{2019}', '\u{2018}'], "'")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn lib() -> PatternLibrary {
        PatternLibrary::builtin()
    }

    #[test]
    fn test_every_category_has_markers() {
        let lib = lib();
        for category in PatternCategory::ALL {
            let set = lib.set(category);
            assert!(!set.is_empty(), "{} has no markers", category);
            assert_eq!(set.category(), category);
            assert_eq!(set.version(), PATTERN_VERSION);
        }
    }

    #[test]
    fn test_coverage_markers() {
        let lib = lib();
        assert!(lib.matches(PatternCategory::OpenEndedQuestion, "What brings you here today?"));
        assert!(lib.matches(PatternCategory::OpenEndedQuestion, "Tell me more about that."));
        assert!(!lib.matches(PatternCategory::OpenEndedQuestion, "Do you smoke?"));
        assert!(lib.matches(PatternCategory::Reflection, "It sounds like work has been stressful."));
        assert!(lib.matches(PatternCategory::Autonomy, "Ultimately it's your decision."));
        assert!(lib.matches(PatternCategory::Summary, "Let me summarize what we covered."));
    }

    #[test]
    fn test_case_insensitive_and_curly_apostrophes() {
        let lib = lib();
        assert!(lib.matches(PatternCategory::ExplicitAffirmative, "NO, WE'RE DONE"));
        assert!(lib.matches(PatternCategory::ExplicitAffirmative, "No, we\u{2019}re done."));
    }

    #[test]
    fn test_ambiguous_only_matches_bare_acknowledgements() {
        let lib = lib();
        for reply in ["ok", "Okay.", "thanks!", "I guess", "sure", "yes"] {
            assert!(lib.matches(PatternCategory::AmbiguousAffirmative, reply), "{}", reply);
        }
        assert!(!lib.matches(
            PatternCategory::AmbiguousAffirmative,
            "ok but I still want to talk about my sleep"
        ));
        assert!(!lib.matches(PatternCategory::ExplicitAffirmative, "thanks"));
    }

    #[test]
    fn test_hesitation_markers() {
        let lib = lib();
        for reply in [
            "Please don't end the session yet",
            "I'm not sure we're done yet",
            "I don\u{2019}t think that's all, actually",
            "Hold on, one more thing",
            "That isn't all",
        ] {
            assert!(lib.matches(PatternCategory::Hesitation, reply), "{}", reply);
        }
        for reply in ["No, we're done.", "Nothing else, thanks", "Yes, please end", "ok"] {
            assert!(!lib.matches(PatternCategory::Hesitation, reply), "{}", reply);
        }
    }

    #[test]
    fn test_word_boundaries() {
        let lib = lib();
        // "bye" inside another word is not end intent
        assert!(!lib.matches(PatternCategory::EndIntent, "we talked about bylaws"));
        assert!(lib.matches(PatternCategory::EndIntent, "ok bye"));
    }

    #[test]
    fn test_category_names_round_trip() {
        for category in PatternCategory::ALL {
            assert_eq!(PatternCategory::from_name(category.as_str()), Some(category));
        }
        assert_eq!(PatternCategory::from_name("Summary"), Some(PatternCategory::Summary));
        assert_eq!(PatternCategory::from_name("small_talk"), None);
    }

    #[test]
    fn test_extra_markers_are_appended() {
        let mut extra = HashMap::new();
        extra.insert(PatternCategory::ExplicitAffirmative, vec![r"\bfertig\b".to_string()]);
        let lib = PatternLibrary::with_extra(&extra).unwrap();
        assert!(lib.matches(PatternCategory::ExplicitAffirmative, "Ich bin fertig"));
        assert!(lib.matches(PatternCategory::ExplicitAffirmative, "we're done"));
        assert!(lib.version().ends_with("+custom"));
    }

    #[test]
    fn test_invalid_extra_marker_is_rejected() {
        let mut extra = HashMap::new();
        extra.insert(PatternCategory::Summary, vec!["(unclosed".to_string()]);
        let err = PatternLibrary::with_extra(&extra).unwrap_err();
        assert_eq!(err.category, PatternCategory::Summary);
        assert_eq!(err.marker, "(unclosed");
    }

    #[test]
    fn test_level_from_text() {
        assert_eq!(level_from_text("Partially   MET"), Some(Level::PartiallyMet));
        assert_eq!(level_from_text("not met"), Some(Level::NotMet));
        assert_eq!(level_from_text("Meets Criteria"), Some(Level::MeetsCriteria));
        assert_eq!(level_from_text("excellent"), None);
    }
}
