use crate::patterns::{PatternCategory, PatternLibrary};
use crate::rubric::{default_categories, normalize_category, Rubric, RubricCategory, RubricVersion};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Hard ceiling of the engagement bonus, in points.
pub const EFFORT_BONUS_CEILING: f64 = 3.0;
/// Lowest time multiplier leniency may ever apply.
pub const TIME_MULTIPLIER_FLOOR: f64 = 0.9;
/// Highest time multiplier leniency may ever apply.
pub const TIME_MULTIPLIER_CEILING: f64 = 1.2;
/// Note used when the evaluator leaves a category without a justification.
pub const DEFAULT_NOTE_PLACEHOLDER: &str = "No justification provided.";

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    pub lifecycle: LifecycleConfig,
    pub patterns: PatternConfig,
    pub scoring: ScoringConfig,
    pub leniency: LeniencyConfig,
}

impl CoachConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied and the result is validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: CoachConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        config.validate().context("Configuration validation failed")?;
        Ok(config)
    }

    /// Try to load from path; if the file is missing or invalid, return defaults
    /// with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({:#}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("COACH_MIN_TURNS") {
            if let Ok(n) = v.parse() {
                self.lifecycle.min_turns = n;
            }
        }
        if let Ok(v) = std::env::var("COACH_CONFIRMATION_TOKEN") {
            self.lifecycle.confirmation_token = if v.trim().is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = std::env::var("COACH_MUTUAL_INTENT_OVERRIDES_FLOOR") {
            if let Ok(b) = v.parse() {
                self.lifecycle.mutual_intent_overrides_floor = b;
            }
        }
        if let Ok(v) = std::env::var("COACH_LENIENCY_ENABLED") {
            if let Ok(b) = v.parse() {
                self.leniency.enabled = b;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.lifecycle.validate()?;
        self.patterns.build_library()?;
        self.scoring.validate()?;
        self.leniency.validate()?;
        Ok(())
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Human turns required before the closure path can open. A floor, never a trigger.
    pub min_turns: usize,
    /// Whether a mutual goodbye may end the session before `min_turns`.
    pub mutual_intent_overrides_floor: bool,
    /// Literal reply that always counts as an explicit confirmation.
    pub confirmation_token: Option<String>,
    pub first_confirmation_prompt: String,
    pub second_confirmation_prompt: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            min_turns: 8,
            mutual_intent_overrides_floor: true,
            confirmation_token: None,
            first_confirmation_prompt: "It sounds like we may have reached a natural stopping point. \
                Would you like to end the session here? If so, reply \"no, we're done\". \
                Otherwise just keep talking."
                .to_string(),
            second_confirmation_prompt: "Just to be sure: do you want to end the session now and \
                receive your feedback? Reply \"yes, end the session\" to finish, or tell me what \
                else is on your mind."
                .to_string(),
        }
    }
}

impl LifecycleConfig {
    fn validate(&self) -> Result<()> {
        if self.first_confirmation_prompt.trim().is_empty()
            || self.second_confirmation_prompt.trim().is_empty()
        {
            bail!("lifecycle confirmation prompts must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Additional markers per category name (e.g. `explicit_affirmative`),
    /// appended to the built-in lists.
    pub extra: HashMap<String, Vec<String>>,
}

impl PatternConfig {
    pub fn build_library(&self) -> Result<PatternLibrary> {
        let mut extra = HashMap::new();
        for (name, markers) in &self.extra {
            let category = PatternCategory::from_name(name)
                .with_context(|| format!("Unknown pattern category in [patterns.extra]: '{}'", name))?;
            extra.insert(category, markers.clone());
        }
        PatternLibrary::with_extra(&extra).context("Failed to compile [patterns.extra]")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub version: RubricVersion,
    pub categories: Vec<RubricCategory>,
    /// Substituted whenever the evaluator leaves a category without a justification.
    pub note_placeholder: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            version: RubricVersion::ThreeLevel,
            categories: default_categories(),
            note_placeholder: DEFAULT_NOTE_PLACEHOLDER.to_string(),
        }
    }
}

impl ScoringConfig {
    pub fn rubric(&self) -> Rubric {
        Rubric {
            version: self.version,
            categories: self.categories.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            bail!("[scoring] must declare at least one category");
        }
        let mut seen = HashSet::new();
        for category in &self.categories {
            if normalize_category(&category.name).is_empty() {
                bail!("[scoring] category names must not be empty");
            }
            if !category.max_points.is_finite() || category.max_points <= 0.0 {
                bail!(
                    "[scoring] category '{}' has invalid max_points {}",
                    category.name,
                    category.max_points
                );
            }
            if !seen.insert(category.key()) {
                bail!("[scoring] category '{}' is declared twice", category.name);
            }
        }
        if self.note_placeholder.trim().is_empty() {
            bail!("[scoring] note_placeholder must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeniencyConfig {
    pub enabled: bool,
    /// Bonus at full engagement, within `[0, EFFORT_BONUS_CEILING]`.
    pub max_effort_bonus: f64,
    pub min_time_multiplier: f64,
    pub max_time_multiplier: f64,
    /// Session length that earns the full time multiplier.
    pub target_minutes: f64,
    /// Mean words per human turn that counts as full engagement.
    pub words_for_full_engagement: f64,
}

impl Default for LeniencyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_effort_bonus: EFFORT_BONUS_CEILING,
            min_time_multiplier: TIME_MULTIPLIER_FLOOR,
            max_time_multiplier: TIME_MULTIPLIER_CEILING,
            target_minutes: 20.0,
            words_for_full_engagement: 40.0,
        }
    }
}

impl LeniencyConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=EFFORT_BONUS_CEILING).contains(&self.max_effort_bonus) {
            bail!(
                "[leniency] max_effort_bonus {} outside [0, {}]",
                self.max_effort_bonus,
                EFFORT_BONUS_CEILING
            );
        }
        let range = TIME_MULTIPLIER_FLOOR..=TIME_MULTIPLIER_CEILING;
        if !range.contains(&self.min_time_multiplier)
            || !range.contains(&self.max_time_multiplier)
            || self.min_time_multiplier > self.max_time_multiplier
        {
            bail!(
                "[leniency] time multipliers [{}, {}] must be ordered and within [{}, {}]",
                self.min_time_multiplier,
                self.max_time_multiplier,
                TIME_MULTIPLIER_FLOOR,
                TIME_MULTIPLIER_CEILING
            );
        }
        if !(self.target_minutes.is_finite() && self.target_minutes > 0.0) {
            bail!("[leniency] target_minutes must be positive");
        }
        if !(self.words_for_full_engagement.is_finite() && self.words_for_full_engagement > 0.0) {
            bail!("[leniency] words_for_full_engagement must be positive");
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let cfg = CoachConfig::default();
        assert_eq!(cfg.lifecycle.min_turns, 8);
        assert!(cfg.lifecycle.mutual_intent_overrides_floor);
        assert!(cfg.lifecycle.confirmation_token.is_none());
        assert_eq!(cfg.scoring.categories.len(), 4);
        assert!(!cfg.leniency.enabled);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[lifecycle]
min_turns = 12
"#;
        let cfg: CoachConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.lifecycle.min_turns, 12);
        // Defaults for unspecified fields
        assert!(cfg.lifecycle.mutual_intent_overrides_floor);
        assert_eq!(cfg.scoring.version, RubricVersion::ThreeLevel);
        assert!((cfg.scoring.rubric().max_total() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[lifecycle]
min_turns = 6
mutual_intent_overrides_floor = false
confirmation_token = "END"
first_confirmation_prompt = "Shall we stop?"
second_confirmation_prompt = "Really stop?"

[patterns.extra]
explicit_affirmative = ["\\bfertig\\b"]
closure_offer = ["\\bshould we close\\b"]

[scoring]
version = "binary"
note_placeholder = "n/a"

[[scoring.categories]]
name = "Partnership"
max_points = 10.0

[[scoring.categories]]
name = "Empathy"
max_points = 5.0

[leniency]
enabled = true
max_effort_bonus = 2.0
min_time_multiplier = 0.95
max_time_multiplier = 1.1
target_minutes = 15.0
"#;
        let cfg: CoachConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.lifecycle.min_turns, 6);
        assert!(!cfg.lifecycle.mutual_intent_overrides_floor);
        assert_eq!(cfg.lifecycle.confirmation_token.as_deref(), Some("END"));
        assert_eq!(cfg.patterns.extra["explicit_affirmative"].len(), 1);
        let lib = cfg.patterns.build_library().unwrap();
        assert!(lib.matches(PatternCategory::ExplicitAffirmative, "ich bin fertig"));
        assert_eq!(cfg.scoring.version, RubricVersion::Binary);
        assert_eq!(cfg.scoring.categories[0].name, "Partnership");
        assert!((cfg.scoring.rubric().max_total() - 15.0).abs() < 1e-9);
        assert!(cfg.leniency.enabled);
        assert!((cfg.leniency.max_effort_bonus - 2.0).abs() < 1e-9);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = CoachConfig::default();
        cfg.leniency.max_effort_bonus = 5.0;
        assert!(cfg.validate().is_err());

        let mut cfg = CoachConfig::default();
        cfg.leniency.max_time_multiplier = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = CoachConfig::default();
        cfg.scoring.categories.push(RubricCategory::new("collaboration ", 7.5));
        assert!(cfg.validate().is_err());

        let mut cfg = CoachConfig::default();
        cfg.scoring.categories[0].max_points = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = CoachConfig::default();
        cfg.patterns
            .extra
            .insert("summary".to_string(), vec!["[".to_string()]);
        assert!(cfg.validate().is_err());

        let mut cfg = CoachConfig::default();
        cfg.patterns
            .extra
            .insert("small_talk".to_string(), vec!["weather".to_string()]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_from_file_and_env_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[lifecycle]\nmin_turns = 5").unwrap();

        let cfg = CoachConfig::load(file.path()).unwrap();
        assert_eq!(cfg.lifecycle.min_turns, 5);

        // Part 1: env overrides
        std::env::set_var("COACH_MIN_TURNS", "3");
        std::env::set_var("COACH_CONFIRMATION_TOKEN", "STOP NOW");
        let cfg = CoachConfig::load(file.path()).unwrap();
        assert_eq!(cfg.lifecycle.min_turns, 3);
        assert_eq!(cfg.lifecycle.confirmation_token.as_deref(), Some("STOP NOW"));

        // Clean up env vars before testing defaults
        std::env::remove_var("COACH_MIN_TURNS");
        std::env::remove_var("COACH_CONFIRMATION_TOKEN");

        // Part 2: nonexistent path returns defaults (no env interference)
        let cfg = CoachConfig::load_or_default("/nonexistent/coach.toml");
        assert_eq!(cfg.lifecycle.min_turns, 8);
    }
}
