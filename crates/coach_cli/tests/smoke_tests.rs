//! CLI smoke tests: basic binary behavior.

use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn cli_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_coach"));
    cmd.env_remove("COACH_CONFIG")
        .env_remove("COACH_MIN_TURNS")
        .env_remove("COACH_LENIENCY_ENABLED");
    cmd
}

fn temp_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Expected usage info in --help output");
    assert!(stdout.contains("replay"));
    assert!(stdout.contains("score"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("coach"), "Expected binary name in --version output");
}

#[test]
fn test_score_prints_breakdown() {
    let assessment = temp_file(
        "Collaboration: 7.5/7.5 - Met - good\n\
         Evocation: 3.75/7.5 - Partially Met\n\
         Acceptance: 7.5/7.5 - Met\n\
         Compassion: 0/7.5 - Not Met\n\
         Total: 18.75/30\n",
    );
    let output = cli_bin()
        .arg("score")
        .arg(assessment.path())
        .output()
        .expect("failed to run");
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["breakdown"]["total"], 18.75);
    assert_eq!(report["breakdown"]["max_total"], 30.0);
}

#[test]
fn test_score_failure_prints_retry_message() {
    let assessment = temp_file("Collaboration: 7.5/7.5 - Met\nTotal: 30/30\n");
    let output = cli_bin()
        .arg("score")
        .arg(assessment.path())
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Assessment incomplete, please retry evaluation."));
}

#[test]
fn test_replay_mutual_goodbye() {
    let transcript = temp_file(
        r#"[
            {"role": "assistant", "text": "Hi, what brings you here today?"},
            {"role": "human", "text": "Just checking in."},
            {"role": "assistant", "text": "Thank you for sharing. Take care!"},
            {"role": "human", "text": "I have to go, bye!"},
            {"role": "human", "text": "this turn is ignored"}
        ]"#,
    );
    let output = cli_bin()
        .arg("replay")
        .arg(transcript.path())
        .output()
        .expect("failed to run");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    // two decisions plus the metrics summary
    assert_eq!(lines.len(), 3, "{}", stdout);
    assert!(lines[1].contains("\"mutual_intent\""));
    assert!(lines[2].contains("\"mutual_intent_endings\":1"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let output = cli_bin()
        .arg("--config")
        .arg("/tmp/nonexistent_coach_config_12345.toml")
        .arg("score")
        .arg("/tmp/nonexistent_assessment_12345.txt")
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
}
