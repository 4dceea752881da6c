//! Parse → aggregate → (optionally) adjust, as one call.

use crate::aggregator::ScoreAggregator;
use crate::breakdown::ScoreBreakdown;
use crate::error::ScoreError;
use crate::leniency::{EngagementSignal, LeniencyModifier, TimingSignal};
use crate::parser::{ParseAnomaly, ReportedTotal, ScoreParser};
use coach_core::{LeniencyConfig, ScoringConfig};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReport {
    pub breakdown: ScoreBreakdown,
    /// Lines that were skipped while parsing.
    pub anomalies: Vec<ParseAnomaly>,
    pub reported_total: Option<ReportedTotal>,
}

pub fn score_assessment(text: &str, config: &ScoringConfig) -> Result<ScoreReport, ScoreError> {
    let rubric = config.rubric();
    let parsed = ScoreParser::new(&rubric, config.note_placeholder.clone()).parse(text);
    let breakdown = ScoreAggregator::new(rubric, config.note_placeholder.clone())
        .aggregate_assessment(&parsed)?;

    if !parsed.anomalies.is_empty() {
        tracing::warn!(
            "Assessment scored with {} skipped line(s)",
            parsed.anomalies.len()
        );
    }
    tracing::info!(
        "Assessment scored: {:.2}/{:.2} ({:.1}%)",
        breakdown.total(),
        breakdown.max_total(),
        breakdown.percentage()
    );

    Ok(ScoreReport {
        breakdown,
        anomalies: parsed.anomalies,
        reported_total: parsed.reported_total,
    })
}

/// `score_assessment` followed by the leniency adjustment. The evaluator's
/// reported total is checked against the unadjusted score.
pub fn score_assessment_with_leniency(
    text: &str,
    scoring: &ScoringConfig,
    leniency: &LeniencyConfig,
    engagement: EngagementSignal,
    timing: TimingSignal,
) -> Result<ScoreReport, ScoreError> {
    let modifier = LeniencyModifier::new(leniency)?;
    let mut report = score_assessment(text, scoring)?;
    report.breakdown = modifier.adjust(&report.breakdown, engagement, timing)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSESSMENT: &str = "\
## Evaluation
- **Collaboration**: 7.5/7.5 - Met - Invited the client to set the agenda.
- **Evocation** (3.75 out of 7.5 points): Partially Met Asked two open questions
- **Acceptance**: 0 pts — Not Met
- **Compassion**: 7.5 / 7.5 Met: warm tone throughout

**Total: 18.75/30**
";

    #[test]
    fn test_score_assessment() {
        let report = score_assessment(ASSESSMENT, &ScoringConfig::default()).unwrap();
        assert!((report.breakdown.total() - 18.75).abs() < 1e-9);
        assert!(report.anomalies.is_empty());
        assert_eq!(report.reported_total.unwrap().points, 18.75);
        assert_eq!(
            report.breakdown.get("acceptance").unwrap().note,
            "No justification provided."
        );
    }

    #[test]
    fn test_mismatched_total_fails_closed() {
        let text = ASSESSMENT.replace("18.75/30", "26.25/30");
        let err = score_assessment(&text, &ScoringConfig::default()).unwrap_err();
        assert!(matches!(err, ScoreError::Consistency { .. }));
    }

    #[test]
    fn test_leniency_disabled_by_default() {
        let report = score_assessment_with_leniency(
            ASSESSMENT,
            &ScoringConfig::default(),
            &LeniencyConfig::default(),
            EngagementSignal::new(1.0),
            TimingSignal::from_minutes(25.0, 20.0),
        )
        .unwrap();
        assert!((report.breakdown.total() - 18.75).abs() < 1e-9);
    }

    #[test]
    fn test_leniency_enabled() {
        let leniency = LeniencyConfig {
            enabled: true,
            ..LeniencyConfig::default()
        };
        let report = score_assessment_with_leniency(
            ASSESSMENT,
            &ScoringConfig::default(),
            &leniency,
            EngagementSignal::new(1.0),
            TimingSignal::from_minutes(20.0, 20.0),
        )
        .unwrap();
        assert!(report.breakdown.total() > 18.75);
        assert!(report.breakdown.total() <= 30.0);
    }
}
