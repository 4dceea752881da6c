//! Deduplicate parsed entries into a validated [`ScoreBreakdown`].
//!
//! The last entry per normalized category name wins. Every rubric category
//! appears in the result, at zero if the evaluator never scored it. The total
//! is summed from the deduplicated map only.

use crate::breakdown::{CategoryScore, ScoreBreakdown, SUM_TOLERANCE};
use crate::error::ScoreError;
use crate::parser::{ParsedAssessment, ParsedEntry};
use coach_core::config::DEFAULT_NOTE_PLACEHOLDER;
use coach_core::{normalize_category, Rubric};
use std::collections::BTreeMap;

/// Aggregate with the default note placeholder.
pub fn aggregate(entries: &[ParsedEntry], expected: &Rubric) -> Result<ScoreBreakdown, ScoreError> {
    ScoreAggregator::new(expected.clone(), DEFAULT_NOTE_PLACEHOLDER).aggregate(entries)
}

pub struct ScoreAggregator {
    rubric: Rubric,
    placeholder: String,
}

impl ScoreAggregator {
    pub fn new(rubric: Rubric, placeholder: impl Into<String>) -> Self {
        Self {
            rubric,
            placeholder: placeholder.into(),
        }
    }

    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    pub fn aggregate(&self, entries: &[ParsedEntry]) -> Result<ScoreBreakdown, ScoreError> {
        let mut categories: BTreeMap<String, CategoryScore> = BTreeMap::new();
        let mut order: Vec<String> = self.rubric.categories.iter().map(|c| c.key()).collect();

        for entry in entries {
            let key = normalize_category(&entry.category);
            let score = match self.rubric.find(&entry.category) {
                Some(known) => CategoryScore {
                    category: known.name.clone(),
                    points: entry.points,
                    max_points: known.max_points,
                    level: entry.level,
                    note: self.note(&entry.note),
                },
                None => {
                    tracing::warn!(
                        "Category '{}' (line {}) is not in the rubric; keeping it with max {}",
                        entry.category,
                        entry.line_number,
                        entry.max_points
                    );
                    if !order.contains(&key) {
                        order.push(key.clone());
                    }
                    CategoryScore {
                        category: entry.category.trim().to_string(),
                        points: entry.points,
                        max_points: entry.max_points,
                        level: entry.level,
                        note: self.note(&entry.note),
                    }
                }
            };

            if let Some(previous) = categories.insert(key, score) {
                tracing::debug!(
                    "'{}' superseded: {} → {} (line {})",
                    previous.category,
                    previous.points,
                    entry.points,
                    entry.line_number
                );
            }
        }

        let lowest = self.rubric.version.lowest_level();
        for expected in &self.rubric.categories {
            categories.entry(expected.key()).or_insert_with(|| {
                tracing::debug!("'{}' not scored; filling in zero", expected.name);
                CategoryScore {
                    category: expected.name.clone(),
                    points: 0.0,
                    max_points: expected.max_points,
                    level: lowest,
                    note: self.placeholder.clone(),
                }
            });
        }

        ScoreBreakdown::from_scores(categories, order)
    }

    /// `aggregate` plus a cross-check against the evaluator's own total line.
    pub fn aggregate_assessment(
        &self,
        assessment: &ParsedAssessment,
    ) -> Result<ScoreBreakdown, ScoreError> {
        let breakdown = self.aggregate(&assessment.entries)?;
        if let Some(reported) = assessment.reported_total {
            if !reported.points.is_finite() {
                return Err(ScoreError::NonFinite {
                    field: "reported total".to_string(),
                });
            }
            if (reported.points - breakdown.total()).abs() >= SUM_TOLERANCE {
                tracing::warn!(
                    "Reported total {} (line {}) disagrees with computed total {}",
                    reported.points,
                    reported.line_number,
                    breakdown.total()
                );
                return Err(ScoreError::Consistency {
                    what: "reported total vs computed total",
                    expected: reported.points,
                    actual: breakdown.total(),
                });
            }
        }
        Ok(breakdown)
    }

    fn note(&self, note: &str) -> String {
        if note.trim().is_empty() {
            self.placeholder.clone()
        } else {
            note.trim().to_string()
        }
    }
}
