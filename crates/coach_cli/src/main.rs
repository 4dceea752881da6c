use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coach_core::{CoachConfig, LifecycleState, Role, Session};
use coach_dialogue::{LifecycleController, Metrics};
use coach_scoring::{score_assessment_with_leniency, EngagementSignal, TimingSignal};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG: &str = "coach.toml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config (defaults to ./coach.toml if present)
    #[arg(short, long, global = true, env = "COACH_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a transcript through the lifecycle controller
    Replay {
        /// JSON array of {"role": "human"|"assistant", "text": "..."}
        transcript: PathBuf,
    },
    /// Score a finished assessment
    Score {
        /// Assessment text produced by the evaluator
        assessment: PathBuf,

        /// Engagement signal in [0, 1]
        #[arg(long)]
        engagement: Option<f64>,

        /// Session length in minutes
        #[arg(long)]
        minutes: Option<f64>,
    },
}

#[derive(Debug, Deserialize)]
struct TranscriptTurn {
    role: Role,
    text: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => CoachConfig::load(path)?,
        None => CoachConfig::load_or_default(DEFAULT_CONFIG),
    };

    match cli.command {
        Command::Replay { transcript } => replay(&config, &transcript),
        Command::Score {
            assessment,
            engagement,
            minutes,
        } => score(&config, &assessment, engagement, minutes),
    }
}

fn replay(config: &CoachConfig, path: &Path) -> Result<ExitCode> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript: {}", path.display()))?;
    let turns: Vec<TranscriptTurn> =
        serde_json::from_str(&content).context("Transcript must be a JSON array of {role, text}")?;

    let controller = LifecycleController::from_config(config)?;
    let mut session = Session::new();
    let mut metrics = Metrics::new();
    info!("Replaying {} turns into session {}", turns.len(), session.id());

    for (idx, turn) in turns.iter().enumerate() {
        if session.state() == LifecycleState::Ended {
            warn!("Session ended; ignoring {} remaining turn(s)", turns.len() - idx);
            break;
        }
        match turn.role {
            Role::Assistant => {
                session.push_assistant(turn.text.clone())?;
            }
            Role::Human => {
                session.push_human(turn.text.clone())?;
                match controller.advance_latest(&mut session) {
                    Ok(decision) => {
                        metrics.record(&decision);
                        println!("{}", serde_json::to_string(&decision)?);
                    }
                    Err(violation) => {
                        metrics.record_violation(&violation);
                        return Err(violation.into());
                    }
                }
            }
        }
    }

    println!("{}", serde_json::to_string(&metrics)?);
    if session.state() == LifecycleState::Parked {
        warn!("Session {} parked without a confirmed ending", session.id());
    }
    if session.is_anomalous_close() {
        warn!("Session {} ended without confirmation", session.id());
    }
    info!(
        "Replay finished: state={}, human turns={}, confirmed={:?}",
        session.state(),
        session.turn_count(),
        session.confirmed()
    );
    Ok(ExitCode::SUCCESS)
}

fn score(
    config: &CoachConfig,
    path: &Path,
    engagement: Option<f64>,
    minutes: Option<f64>,
) -> Result<ExitCode> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read assessment: {}", path.display()))?;

    if !config.leniency.enabled && (engagement.is_some() || minutes.is_some()) {
        info!("Leniency is disabled; --engagement/--minutes have no effect");
    }
    let engagement = EngagementSignal::new(engagement.unwrap_or(0.0));
    let timing = TimingSignal::from_minutes(minutes.unwrap_or(0.0), config.leniency.target_minutes);

    match score_assessment_with_leniency(&text, &config.scoring, &config.leniency, engagement, timing)
    {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Scoring failed: {}", e);
            eprintln!("{}", e.user_message());
            Ok(ExitCode::from(2))
        }
    }
}
