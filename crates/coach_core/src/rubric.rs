//! Rubric vocabulary shared by the parser, the aggregator and report code.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which level scale the evaluator writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RubricVersion {
    /// Met / Partially Met / Not Met
    #[default]
    ThreeLevel,
    /// Meets Criteria / Needs Improvement
    Binary,
}

impl RubricVersion {
    /// Level given to a category the evaluator never mentioned.
    pub fn lowest_level(&self) -> Level {
        match self {
            RubricVersion::ThreeLevel => Level::NotMet,
            RubricVersion::Binary => Level::NeedsImprovement,
        }
    }
}

/// Qualitative verdict attached to a category score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Met,
    PartiallyMet,
    NotMet,
    MeetsCriteria,
    NeedsImprovement,
}

impl Level {
    pub fn version(&self) -> RubricVersion {
        match self {
            Level::Met | Level::PartiallyMet | Level::NotMet => RubricVersion::ThreeLevel,
            Level::MeetsCriteria | Level::NeedsImprovement => RubricVersion::Binary,
        }
    }

    /// Whether `points` out of `max_points` is a plausible award for this level.
    /// Full-credit levels need the maximum, Not Met needs zero, Partially Met
    /// sits strictly between.
    pub fn admits(&self, points: f64, max_points: f64) -> bool {
        const EPS: f64 = 1e-9;
        let full = points >= max_points - EPS;
        let zero = points <= EPS;
        match self {
            Level::Met | Level::MeetsCriteria => full,
            Level::NotMet => zero,
            Level::PartiallyMet => !full && !zero,
            Level::NeedsImprovement => !full,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Level::Met => "Met",
            Level::PartiallyMet => "Partially Met",
            Level::NotMet => "Not Met",
            Level::MeetsCriteria => "Meets Criteria",
            Level::NeedsImprovement => "Needs Improvement",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One scored dimension of the rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricCategory {
    pub name: String,
    pub max_points: f64,
}

impl RubricCategory {
    pub fn new(name: impl Into<String>, max_points: f64) -> Self {
        Self {
            name: name.into(),
            max_points,
        }
    }

    pub fn key(&self) -> String {
        normalize_category(&self.name)
    }
}

/// The expected categories plus the level scale they are judged on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub version: RubricVersion,
    pub categories: Vec<RubricCategory>,
}

impl Default for Rubric {
    fn default() -> Self {
        Self {
            version: RubricVersion::ThreeLevel,
            categories: default_categories(),
        }
    }
}

impl Rubric {
    pub fn find(&self, name: &str) -> Option<&RubricCategory> {
        let key = normalize_category(name);
        self.categories.iter().find(|c| c.key() == key)
    }

    pub fn max_total(&self) -> f64 {
        self.categories.iter().map(|c| c.max_points).sum()
    }
}

pub(crate) fn default_categories() -> Vec<RubricCategory> {
    ["Collaboration", "Evocation", "Acceptance", "Compassion"]
        .into_iter()
        .map(|name| RubricCategory::new(name, 7.5))
        .collect()
}

/// Canonical key for a category name: trimmed, single-spaced, lowercase.
pub fn normalize_category(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
