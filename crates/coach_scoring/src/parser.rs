//! Parse per-category scores out of free-form assessment text.
//!
//! One entry per line, in document order. Markdown decoration (headings,
//! bullets, bold) is ignored. Supported shapes:
//!
//! ```text
//! Collaboration: 7.5/7.5 - Met - Invited the client to set the agenda.
//! **Evocation** (3.75 out of 7.5 points): Partially Met Asked two open questions
//! - Acceptance: 0 pts — Not Met
//! Compassion: 7.5 / 7.5 Meets Criteria: warm tone throughout
//! Total: 22.5/30
//! ```
//!
//! Malformed entry-like lines are recorded as [`ParseAnomaly`] and skipped.
//! Parsing never fails.

use coach_core::patterns::LEVEL_ENCODINGS;
use coach_core::{normalize_category, Level, Rubric, RubricVersion};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::sync::LazyLock;

const NUMBER: &str = r"-?\d+(?:\.\d+)?";

static RE_DECORATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:#+\s*|[-*•+]\s+|\d+[.)]\s+)*").unwrap());
static RE_NUMBERING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[.)]\s*").unwrap());
static RE_FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?\s*(?:/|out of)\s*\d+(?:\.\d+)?").unwrap());
static RE_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    case_insensitive(&format!(
        r"^(?P<name>[A-Za-z][A-Za-z0-9 &/'-]*?)\s*[:(\-–—]\s*(?P<points>{n})\s*(?:(?:/|out\s+of)\s*(?P<max>{n}))?\s*(?:(?:points?|pts?)\b)?\.?\s*\)?\s*(?P<rest>.*)$",
        n = NUMBER
    ))
});
static RE_TOTAL: LazyLock<Regex> = LazyLock::new(|| {
    case_insensitive(&format!(
        r"^(?:(?:overall|final)\s+)?(?:total|overall|score)(?:\s+score)?\s*[:=\-–—]?\s*(?P<points>{n})\s*(?:(?:/|out\s+of)\s*(?P<max>{n}))?",
        n = NUMBER
    ))
});
// Longest encodings first so "partially met" wins over "met".
static RE_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = LEVEL_ENCODINGS
        .iter()
        .map(|(phrase, _)| phrase.replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    case_insensitive(&format!(r"^[(\[]?\s*(?P<level>{})\b\s*[)\]]?", alternatives))
});

/// Line labels that carry totals or headings rather than a category.
const RESERVED_NAMES: &[&str] = &[
    "total",
    "overall",
    "total score",
    "overall score",
    "final score",
    "score",
    "sum",
];

/// One well-formed category line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedEntry {
    /// 1-based line number in the assessment text.
    pub line_number: usize,
    /// Category name as written.
    pub category: String,
    pub points: f64,
    pub max_points: f64,
    pub level: Level,
    pub note: String,
}

/// The evaluator's own `Total: X/Y` line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportedTotal {
    pub line_number: usize,
    pub points: f64,
    pub max_points: Option<f64>,
}

/// A line that looked like an entry but could not be used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseAnomaly {
    pub line_number: usize,
    pub line: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedAssessment {
    pub entries: Vec<ParsedEntry>,
    /// Last `Total:` line in the text, if any.
    pub reported_total: Option<ReportedTotal>,
    pub anomalies: Vec<ParseAnomaly>,
}

pub struct ScoreParser {
    rubric: Rubric,
    placeholder: String,
}

impl ScoreParser {
    pub fn new(rubric: &Rubric, placeholder: impl Into<String>) -> Self {
        Self {
            rubric: rubric.clone(),
            placeholder: placeholder.into(),
        }
    }

    /// Parse every line of `text`. Never fails; unusable lines end up in
    /// `anomalies`.
    pub fn parse(&self, text: &str) -> ParsedAssessment {
        let mut parsed = ParsedAssessment::default();

        for (idx, raw) in text.lines().enumerate() {
            let line_number = idx + 1;
            let line = self.clean(raw);
            if line.is_empty() {
                continue;
            }

            if let Some(total) = self.parse_total(&line, line_number) {
                tracing::debug!("line {}: reported total {}", line_number, total.points);
                parsed.reported_total = Some(total);
                continue;
            }

            match self.parse_entry(&line, line_number) {
                Some(Ok(entry)) => {
                    tracing::debug!(
                        "line {}: {} = {}/{} ({})",
                        line_number,
                        entry.category,
                        entry.points,
                        entry.max_points,
                        entry.level
                    );
                    parsed.entries.push(entry);
                }
                Some(Err(reason)) => self.record_anomaly(&mut parsed, line_number, raw, reason),
                None if self.looks_like_entry(&line) => self.record_anomaly(
                    &mut parsed,
                    line_number,
                    raw,
                    "category or score present but line is not in a recognised format".to_string(),
                ),
                None => {}
            }
        }

        parsed
    }

    fn record_anomaly(
        &self,
        parsed: &mut ParsedAssessment,
        line_number: usize,
        raw: &str,
        reason: String,
    ) {
        tracing::warn!(
            "Skipping assessment line {}: {} ({:?})",
            line_number,
            reason,
            raw.trim()
        );
        parsed.anomalies.push(ParseAnomaly {
            line_number,
            line: raw.trim().to_string(),
            reason,
        });
    }

    /// Strip markdown emphasis, then headings, bullets and numbering.
    /// Emphasis goes first so `**1. Name**` loses its numbering too.
    fn clean(&self, raw: &str) -> String {
        let unemphasized = raw.replace("**", "").replace("__", "");
        RE_DECORATION.replace(&unemphasized, "").trim().to_string()
    }

    fn parse_total(&self, line: &str, line_number: usize) -> Option<ReportedTotal> {
        let caps = RE_TOTAL.captures(line)?;
        let points = caps.name("points")?.as_str().parse::<f64>().ok()?;
        let max_points = caps.name("max").and_then(|m| m.as_str().parse::<f64>().ok());
        Some(ReportedTotal {
            line_number,
            points,
            max_points,
        })
    }

    /// `None` when the line is not shaped like an entry at all,
    /// `Some(Err(reason))` when it is but the values are unusable.
    fn parse_entry(&self, line: &str, line_number: usize) -> Option<Result<ParsedEntry, String>> {
        let caps = RE_ENTRY.captures(line)?;
        let name = caps.name("name")?.as_str().trim();
        if RESERVED_NAMES.contains(&normalize_category(name).as_str()) {
            return None;
        }

        let points = match caps.name("points")?.as_str().parse::<f64>() {
            Ok(p) if p.is_finite() => p,
            _ => return Some(Err("points are not a finite number".to_string())),
        };

        let known_max = self.rubric.find(name).map(|c| c.max_points);
        let max_points = match caps.name("max") {
            Some(m) => match m.as_str().parse::<f64>() {
                Ok(v) if v.is_finite() => v,
                _ => return Some(Err("maximum is not a finite number".to_string())),
            },
            None => match known_max {
                Some(v) => v,
                None => {
                    return Some(Err(format!(
                        "no maximum given and '{}' is not a rubric category",
                        name
                    )))
                }
            },
        };

        if max_points <= 0.0 {
            return Some(Err(format!("maximum {} is not positive", max_points)));
        }
        if points < 0.0 || points > max_points {
            return Some(Err(format!("{} points outside [0, {}]", points, max_points)));
        }

        let rest = trim_separators(caps.name("rest").map_or("", |m| m.as_str()));
        let (level, note) = match RE_LEVEL.captures(rest) {
            Some(lc) => {
                let phrase = lc.name("level").map_or("", |m| m.as_str());
                let level = coach_core::patterns::level_from_text(phrase)
                    .unwrap_or_else(|| self.infer_level(points, max_points));
                if !level.admits(points, max_points) {
                    return Some(Err(format!(
                        "level '{}' contradicts {}/{} points",
                        level, points, max_points
                    )));
                }
                let after = lc.get(0).map_or(rest.len(), |m| m.end());
                (level, trim_separators(&rest[after..]).to_string())
            }
            None => {
                let level = self.infer_level(points, max_points);
                tracing::debug!("line {}: no level given, inferred {}", line_number, level);
                (level, rest.to_string())
            }
        };

        Some(Ok(ParsedEntry {
            line_number,
            category: name.to_string(),
            points,
            max_points,
            level,
            note: if note.is_empty() {
                self.placeholder.clone()
            } else {
                note
            },
        }))
    }

    /// Level for an entry that states points but no verdict.
    fn infer_level(&self, points: f64, max_points: f64) -> Level {
        let full = points >= max_points;
        match self.rubric.version {
            RubricVersion::ThreeLevel if full => Level::Met,
            RubricVersion::ThreeLevel if points <= 0.0 => Level::NotMet,
            RubricVersion::ThreeLevel => Level::PartiallyMet,
            RubricVersion::Binary if full => Level::MeetsCriteria,
            RubricVersion::Binary => Level::NeedsImprovement,
        }
    }

    /// A rubric category opening the line (after any leftover numbering),
    /// or a score fraction anywhere.
    fn looks_like_entry(&self, line: &str) -> bool {
        let lowered = RE_NUMBERING.replace(line, "").to_lowercase();
        let starts_with_category = self.rubric.categories.iter().any(|c| {
            let key = c.key();
            lowered.starts_with(&key)
                && !lowered[key.len()..]
                    .chars()
                    .next()
                    .is_some_and(|ch| ch.is_alphanumeric())
        });
        starts_with_category || RE_FRACTION.is_match(line)
    }
}

fn case_insensitive(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .unwrap()
}

fn trim_separators(s: &str) -> &str {
    s.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '-' | '–' | '—' | ':' | '|' | ',' | ';')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLACEHOLDER: &str = "No justification provided.";

    fn parser() -> ScoreParser {
        ScoreParser::new(&Rubric::default(), PLACEHOLDER)
    }

    fn single(line: &str) -> ParsedEntry {
        let parsed = parser().parse(line);
        assert!(parsed.anomalies.is_empty(), "{:?}", parsed.anomalies);
        assert_eq!(parsed.entries.len(), 1, "{:?}", parsed.entries);
        parsed.entries.into_iter().next().unwrap()
    }

    #[test]
    fn test_dash_separated_entry() {
        let e = single("Collaboration: 7.5/7.5 - Met - Invited the client to set the agenda.");
        assert_eq!(e.category, "Collaboration");
        assert_eq!(e.points, 7.5);
        assert_eq!(e.max_points, 7.5);
        assert_eq!(e.level, Level::Met);
        assert_eq!(e.note, "Invited the client to set the agenda.");
    }

    #[test]
    fn test_bold_parenthesised_entry_without_separator() {
        let e = single("**Evocation** (3.75 out of 7.5 points): Partially Met Asked two open questions");
        assert_eq!(e.category, "Evocation");
        assert_eq!(e.points, 3.75);
        assert_eq!(e.max_points, 7.5);
        assert_eq!(e.level, Level::PartiallyMet);
        assert_eq!(e.note, "Asked two open questions");
    }

    #[test]
    fn test_bullet_without_max_or_note() {
        let e = single("- Acceptance: 0 pts — Not Met");
        assert_eq!(e.category, "Acceptance");
        assert_eq!(e.points, 0.0);
        assert_eq!(e.max_points, 7.5);
        assert_eq!(e.level, Level::NotMet);
        assert_eq!(e.note, PLACEHOLDER);
    }

    #[test]
    fn test_binary_levels() {
        let e = single("Compassion: 7.5 / 7.5 Meets Criteria: warm tone throughout");
        assert_eq!(e.level, Level::MeetsCriteria);
        assert_eq!(e.note, "warm tone throughout");

        let e = single("### Evocation: 2/7.5 Needs improvement");
        assert_eq!(e.level, Level::NeedsImprovement);
        assert_eq!(e.note, PLACEHOLDER);
    }

    #[test]
    fn test_alternative_level_spellings() {
        assert_eq!(single("Evocation: 3/7.5 - Partial - ok").level, Level::PartiallyMet);
        assert_eq!(single("Evocation: 0/7.5 - Does Not Meet").level, Level::NotMet);
        // "Met" must not swallow the start of "Meets"
        assert_eq!(single("Evocation: 7.5/7.5 Meets criteria").level, Level::MeetsCriteria);
    }

    #[test]
    fn test_missing_level_is_inferred() {
        let e = single("Evocation: 7.5/7.5 - great reflections");
        assert_eq!(e.level, Level::Met);
        assert_eq!(e.note, "great reflections");
        assert_eq!(single("Evocation: 2/7.5").level, Level::PartiallyMet);
    }

    #[test]
    fn test_document_order_and_duplicates_kept() {
        let text = "\
# Assessment
Collaboration: 7.5/7.5 - Met - first draft
Evocation: 3.75/7.5 - Partially Met - fine
Collaboration: 0/7.5 - Not Met - final verdict
";
        let parsed = parser().parse(text);
        let names: Vec<&str> = parsed.entries.iter().map(|e| e.category.as_str()).collect();
        assert_eq!(names, vec!["Collaboration", "Evocation", "Collaboration"]);
        assert_eq!(parsed.entries[2].line_number, 4);
        assert!(parsed.anomalies.is_empty());
    }

    #[test]
    fn test_reported_total() {
        let parsed = parser().parse("Evocation: 3/7.5 - Partially Met\n**Total: 3 / 30**");
        let total = parsed.reported_total.unwrap();
        assert_eq!(total.points, 3.0);
        assert_eq!(total.max_points, Some(30.0));
        assert_eq!(parsed.entries.len(), 1);
    }

    #[test]
    fn test_malformed_lines_become_anomalies() {
        let text = "\
Collaboration: 9/7.5 - Met
Evocation: lots of points
Acceptance: 3/0 - Met
Empathy: 4 pts - Met
Compassion: 7.5/7.5 - Met - fine
The coach was warm and curious overall.
";
        let parsed = parser().parse(text);
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].category, "Compassion");
        let lines: Vec<usize> = parsed.anomalies.iter().map(|a| a.line_number).collect();
        assert_eq!(lines, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_bold_numbered_header_entry() {
        let e = single("**1. COLLABORATION (7.5 pts): Met** - coach partnered well");
        assert_eq!(e.category, "COLLABORATION");
        assert_eq!(e.points, 7.5);
        assert_eq!(e.max_points, 7.5);
        assert_eq!(e.level, Level::Met);
        assert_eq!(e.note, "coach partnered well");

        let e = single("- **2. Evocation**: 3.75/7.5 Partially Met");
        assert_eq!(e.category, "Evocation");
        assert_eq!(e.points, 3.75);
    }

    #[test]
    fn test_level_contradicting_points_is_an_anomaly() {
        let text = "\
1. COLLABORATION (7.5 pts): Not Met - coach directed
Evocation: 7.5/7.5 - Not Met
Acceptance: 3/7.5 - Met
Compassion: 0/7.5 Meets Criteria
";
        let parsed = parser().parse(text);
        assert!(parsed.entries.is_empty(), "{:?}", parsed.entries);
        let lines: Vec<usize> = parsed.anomalies.iter().map(|a| a.line_number).collect();
        assert_eq!(lines, vec![1, 2, 3, 4]);
        assert!(parsed.anomalies[0].reason.contains("contradicts"));
    }

    #[test]
    fn test_numbered_line_without_score_is_an_anomaly() {
        let parsed = parser().parse("1.Collaboration - strong partnership");
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.anomalies.len(), 1);
    }

    #[test]
    fn test_unknown_category_with_max_is_an_entry() {
        let e = single("Empathy: 4/5 - Met - listened well");
        assert_eq!(e.category, "Empathy");
        assert_eq!(e.max_points, 5.0);
    }

    #[test]
    fn test_never_panics_on_garbage() {
        let parsed = parser().parse("::::\n(((\n- \n**\n7.5/\n/7.5\n—");
        assert!(parsed.entries.is_empty());
    }
}
