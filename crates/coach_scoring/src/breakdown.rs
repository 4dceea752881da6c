//! Validated score table handed to report code.
//!
//! A [`ScoreBreakdown`] can only be built through [`ScoreBreakdown::from_scores`],
//! which computes the total from the category map and validates the result, so
//! every breakdown in circulation satisfies the invariant.

use crate::error::ScoreError;
use coach_core::Level;
use serde::Serialize;
use std::collections::BTreeMap;

/// Allowed drift between the category sum and a stated total.
pub const SUM_TOLERANCE: f64 = 1e-3;

/// Slack for floating-point noise on range checks.
const RANGE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    /// Display name (the rubric's spelling for known categories).
    pub category: String,
    pub points: f64,
    pub max_points: f64,
    pub level: Level,
    /// Never empty; a placeholder stands in for a missing justification.
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    categories: BTreeMap<String, CategoryScore>,
    total: f64,
    max_total: f64,
    #[serde(skip)]
    order: Vec<String>,
}

impl ScoreBreakdown {
    /// Build from deduplicated scores keyed by normalized name. `order` lists
    /// the keys in report order; keys missing from it are appended sorted.
    pub(crate) fn from_scores(
        categories: BTreeMap<String, CategoryScore>,
        order: Vec<String>,
    ) -> Result<Self, ScoreError> {
        let mut order: Vec<String> = order
            .into_iter()
            .filter(|key| categories.contains_key(key))
            .collect();
        for key in categories.keys() {
            if !order.contains(key) {
                order.push(key.clone());
            }
        }

        let total = categories.values().map(|c| c.points).sum();
        let max_total = categories.values().map(|c| c.max_points).sum();
        let breakdown = Self {
            categories,
            total,
            max_total,
            order,
        };
        breakdown.validate()?;
        Ok(breakdown)
    }

    /// Fail-closed check of every invariant.
    pub fn validate(&self) -> Result<(), ScoreError> {
        for (key, score) in &self.categories {
            if !score.points.is_finite() || !score.max_points.is_finite() {
                return Err(ScoreError::NonFinite {
                    field: format!("category '{}'", key),
                });
            }
            if score.max_points <= 0.0
                || score.points < 0.0
                || score.points > score.max_points + RANGE_EPSILON
            {
                return Err(ScoreError::CategoryOutOfRange {
                    category: score.category.clone(),
                    points: score.points,
                    max_points: score.max_points,
                });
            }
        }

        if !self.total.is_finite() || !self.max_total.is_finite() {
            return Err(ScoreError::NonFinite {
                field: "total".to_string(),
            });
        }

        let sum: f64 = self.categories.values().map(|c| c.points).sum();
        if (sum - self.total).abs() >= SUM_TOLERANCE {
            return Err(ScoreError::Consistency {
                what: "category sum vs total",
                expected: self.total,
                actual: sum,
            });
        }

        if self.total < -RANGE_EPSILON || self.total > self.max_total + RANGE_EPSILON {
            return Err(ScoreError::TotalOutOfRange {
                total: self.total,
                max_total: self.max_total,
            });
        }
        Ok(())
    }

    pub fn categories(&self) -> &BTreeMap<String, CategoryScore> {
        &self.categories
    }

    /// Look up a category by any spelling of its name.
    pub fn get(&self, name: &str) -> Option<&CategoryScore> {
        self.categories.get(&coach_core::normalize_category(name))
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn max_total(&self) -> f64 {
        self.max_total
    }

    /// Total as a percentage of the maximum, 0 when the maximum is 0.
    pub fn percentage(&self) -> f64 {
        if self.max_total > 0.0 {
            self.total / self.max_total * 100.0
        } else {
            0.0
        }
    }

    /// Rows in report order: rubric categories first, then any extras.
    pub fn rows(&self) -> Vec<&CategoryScore> {
        self.order
            .iter()
            .filter_map(|key| self.categories.get(key))
            .collect()
    }

    pub(crate) fn order(&self) -> &[String] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(name: &str, points: f64, max_points: f64) -> CategoryScore {
        CategoryScore {
            category: name.to_string(),
            points,
            max_points,
            level: Level::Met,
            note: "ok".to_string(),
        }
    }

    fn map(scores: &[CategoryScore]) -> BTreeMap<String, CategoryScore> {
        scores
            .iter()
            .map(|s| (coach_core::normalize_category(&s.category), s.clone()))
            .collect()
    }

    #[test]
    fn test_total_is_computed_from_map() {
        let b = ScoreBreakdown::from_scores(
            map(&[score("Evocation", 3.75, 7.5), score("Acceptance", 7.5, 7.5)]),
            vec!["evocation".to_string(), "acceptance".to_string()],
        )
        .unwrap();
        assert!((b.total() - 11.25).abs() < 1e-9);
        assert!((b.max_total() - 15.0).abs() < 1e-9);
        assert!((b.percentage() - 75.0).abs() < 1e-9);
        assert_eq!(b.get("EVOCATION").unwrap().points, 3.75);
    }

    #[test]
    fn test_rows_follow_order() {
        let b = ScoreBreakdown::from_scores(
            map(&[
                score("Zeta", 1.0, 5.0),
                score("Collaboration", 2.0, 7.5),
                score("Acceptance", 3.0, 7.5),
            ]),
            vec!["collaboration".to_string(), "acceptance".to_string()],
        )
        .unwrap();
        let names: Vec<&str> = b.rows().iter().map(|r| r.category.as_str()).collect();
        assert_eq!(names, vec!["Collaboration", "Acceptance", "Zeta"]);
    }

    #[test]
    fn test_out_of_range_category_is_rejected() {
        let err = ScoreBreakdown::from_scores(map(&[score("Evocation", 8.0, 7.5)]), vec![])
            .unwrap_err();
        assert!(matches!(err, ScoreError::CategoryOutOfRange { .. }));

        let err = ScoreBreakdown::from_scores(map(&[score("Evocation", -0.5, 7.5)]), vec![])
            .unwrap_err();
        assert!(matches!(err, ScoreError::CategoryOutOfRange { .. }));
    }

    #[test]
    fn test_non_finite_is_rejected() {
        let err = ScoreBreakdown::from_scores(map(&[score("Evocation", f64::NAN, 7.5)]), vec![])
            .unwrap_err();
        assert!(matches!(err, ScoreError::NonFinite { .. }));
        assert_eq!(err.user_message(), "Assessment incomplete, please retry evaluation.");
    }

    #[test]
    fn test_serializes_without_order() {
        let b = ScoreBreakdown::from_scores(map(&[score("Evocation", 3.75, 7.5)]), vec![])
            .unwrap();
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["total"], 3.75);
        assert_eq!(json["categories"]["evocation"]["level"], "met");
        assert!(json.get("order").is_none());
    }
}
