//! Bounded engagement and timing adjustment of an aggregated score.
//!
//! Per category the points are scaled by the time multiplier and clamped to
//! `[0, max]`; the engagement bonus is then spread over the remaining headroom
//! in proportion to each category's headroom. No category and no total can
//! exceed its maximum, and the adjusted total never decreases when either
//! signal grows.

use crate::breakdown::{CategoryScore, ScoreBreakdown};
use crate::error::ScoreError;
use coach_core::config::{EFFORT_BONUS_CEILING, TIME_MULTIPLIER_CEILING, TIME_MULTIPLIER_FLOOR};
use coach_core::{LeniencyConfig, Role, Turn};
use chrono::Duration;
use std::collections::BTreeMap;

/// How engaged the human was, in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct EngagementSignal(f64);

impl EngagementSignal {
    /// Clamped to `[0, 1]`; NaN counts as no engagement.
    pub fn new(score: f64) -> Self {
        if score.is_nan() {
            Self(0.0)
        } else {
            Self(score.clamp(0.0, 1.0))
        }
    }

    /// Mean words per human turn relative to `words_for_full_engagement`.
    pub fn from_turns(turns: &[Turn], words_for_full_engagement: f64) -> Self {
        let human: Vec<&Turn> = turns.iter().filter(|t| t.role == Role::Human).collect();
        if human.is_empty() || words_for_full_engagement <= 0.0 {
            return Self(0.0);
        }
        let words: usize = human.iter().map(|t| t.text.split_whitespace().count()).sum();
        let mean = words as f64 / human.len() as f64;
        Self::new(mean / words_for_full_engagement)
    }

    pub fn score(&self) -> f64 {
        self.0
    }
}

/// Session length against its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSignal {
    pub elapsed: Duration,
    pub target: Duration,
}

impl TimingSignal {
    pub fn new(elapsed: Duration, target: Duration) -> Self {
        Self { elapsed, target }
    }

    pub fn from_minutes(elapsed_minutes: f64, target_minutes: f64) -> Self {
        Self::new(minutes(elapsed_minutes), minutes(target_minutes))
    }

    /// Elapsed time between the first and last turn.
    pub fn from_turns(turns: &[Turn], target: Duration) -> Self {
        let elapsed = match (turns.first(), turns.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => Duration::zero(),
        };
        Self::new(elapsed, target)
    }

    /// `elapsed / target` in `[0, 1]`. A non-positive target counts as met.
    pub fn ratio(&self) -> f64 {
        let target = self.target.num_milliseconds();
        if target <= 0 {
            return 1.0;
        }
        (self.elapsed.num_milliseconds() as f64 / target as f64).clamp(0.0, 1.0)
    }
}

fn minutes(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::milliseconds((value * 60_000.0).round() as i64)
    } else {
        Duration::zero()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeniencyModifier {
    enabled: bool,
    max_effort_bonus: f64,
    min_time_multiplier: f64,
    max_time_multiplier: f64,
}

impl LeniencyModifier {
    /// Validated against the hard bounds; config may narrow them, never widen.
    pub fn new(config: &LeniencyConfig) -> Result<Self, ScoreError> {
        let bonus_ok = (0.0..=EFFORT_BONUS_CEILING).contains(&config.max_effort_bonus);
        let range = TIME_MULTIPLIER_FLOOR..=TIME_MULTIPLIER_CEILING;
        let multipliers_ok = range.contains(&config.min_time_multiplier)
            && range.contains(&config.max_time_multiplier)
            && config.min_time_multiplier <= config.max_time_multiplier;

        if !bonus_ok {
            return Err(ScoreError::InvalidLeniencyBounds(format!(
                "effort bonus {} outside [0, {}]",
                config.max_effort_bonus, EFFORT_BONUS_CEILING
            )));
        }
        if !multipliers_ok {
            return Err(ScoreError::InvalidLeniencyBounds(format!(
                "time multipliers [{}, {}] outside [{}, {}] or unordered",
                config.min_time_multiplier,
                config.max_time_multiplier,
                TIME_MULTIPLIER_FLOOR,
                TIME_MULTIPLIER_CEILING
            )));
        }

        Ok(Self {
            enabled: config.enabled,
            max_effort_bonus: config.max_effort_bonus,
            min_time_multiplier: config.min_time_multiplier,
            max_time_multiplier: config.max_time_multiplier,
        })
    }

    /// Identity modifier.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_effort_bonus: 0.0,
            min_time_multiplier: 1.0,
            max_time_multiplier: 1.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn effort_bonus(&self, engagement: EngagementSignal) -> f64 {
        self.max_effort_bonus * engagement.score()
    }

    pub fn time_multiplier(&self, timing: TimingSignal) -> f64 {
        let span = self.max_time_multiplier - self.min_time_multiplier;
        self.min_time_multiplier + span * timing.ratio()
    }

    pub fn adjust(
        &self,
        breakdown: &ScoreBreakdown,
        engagement: EngagementSignal,
        timing: TimingSignal,
    ) -> Result<ScoreBreakdown, ScoreError> {
        if !self.enabled {
            return Ok(breakdown.clone());
        }

        let multiplier = self.time_multiplier(timing);
        let bonus = self.effort_bonus(engagement);

        let mut scaled: BTreeMap<String, CategoryScore> = breakdown
            .categories()
            .iter()
            .map(|(key, score)| {
                let points = (score.points * multiplier).clamp(0.0, score.max_points);
                (key.clone(), CategoryScore { points, ..score.clone() })
            })
            .collect();

        let headroom: f64 = scaled.values().map(|s| s.max_points - s.points).sum();
        let spread = bonus.min(headroom);
        if spread > 0.0 {
            for score in scaled.values_mut() {
                let share = (score.max_points - score.points) / headroom;
                score.points = (score.points + spread * share).min(score.max_points);
            }
        }

        let adjusted = ScoreBreakdown::from_scores(scaled, breakdown.order().to_vec())?;
        tracing::debug!(
            "Leniency: ×{:.3} +{:.3} → total {:.3} (was {:.3})",
            multiplier,
            spread,
            adjusted.total(),
            breakdown.total()
        );
        Ok(adjusted)
    }
}
