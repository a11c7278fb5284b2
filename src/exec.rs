//! Ordered external-command execution with per-step outcome capture.
//!
//! The orchestrator always attempts every planned step, even when an earlier
//! one fails: git exit codes are overloaded (a commit with nothing staged
//! exits non-zero) and there is no compensating action to take mid-sequence.
//! Each outcome is recorded and logged independently, so overall success of
//! a sequence is advisory rather than authoritative.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One external command invocation within an ordered sequence.
#[derive(Debug, Clone)]
pub struct CommandStep {
    /// Short name used in logs and outcomes (e.g. `commit`).
    pub label: String,
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl CommandStep {
    pub fn new(label: impl Into<String>, program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            envs: Vec::new(),
        }
    }

    /// Add an environment variable for this step only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

/// Captured result of a single step.
///
/// `success` mirrors the exit status.  Spawn failures (missing binary) and
/// timeouts are failed outcomes, never errors, so a sequence keeps going.
#[derive(Debug)]
pub struct StepOutcome {
    pub label: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl StepOutcome {
    fn failed(label: &str, stderr: String) -> Self {
        Self {
            label: label.to_string(),
            success: false,
            stdout: String::new(),
            stderr,
        }
    }
}

/// Outcomes of a full sequence, in execution order.
///
/// A report exists once every planned step has been attempted; there is no
/// failed terminal state for the sequence itself.
#[derive(Debug, Default)]
pub struct SequenceReport {
    pub outcomes: Vec<StepOutcome>,
}

impl SequenceReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }
}

// ---------------------------------------------------------------------------
// Single step
// ---------------------------------------------------------------------------

/// Run a single step, optionally inside `dir`, optionally bounded by
/// `timeout`.
#[instrument(skip(step, timeout), fields(step = %step.label))]
pub async fn run_step(
    dir: Option<&Path>,
    step: &CommandStep,
    timeout: Option<Duration>,
) -> StepOutcome {
    let mut cmd = Command::new(&step.program);
    cmd.args(&step.args);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    for (k, v) in &step.envs {
        cmd.env(k, v);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    // A timed-out child is killed when its handle is dropped.
    cmd.kill_on_drop(true);

    debug!(program = %step.program, "spawning external command");

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return StepOutcome::failed(
                &step.label,
                format!("failed to spawn {}: {e}", step.program),
            );
        }
    };

    let waited = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(res) => res,
            Err(_) => {
                return StepOutcome::failed(
                    &step.label,
                    format!("{} timed out after {}s", step.program, limit.as_secs()),
                );
            }
        },
        None => child.wait_with_output().await,
    };

    match waited {
        Ok(output) => StepOutcome {
            label: step.label.clone(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Err(e) => StepOutcome::failed(&step.label, format!("failed to wait on {}: {e}", step.program)),
    }
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

/// Run `steps` strictly in order inside `dir`, logging each outcome.
///
/// When `create_dir` is set the directory tree is created first (idempotent;
/// a create failure is logged and the steps are still attempted, letting
/// their own captured output surface the problem).  A failed step never
/// cancels the remaining steps.
#[instrument(skip(steps, timeout), fields(dir = %dir.display(), steps = steps.len()))]
pub async fn run_sequence(
    dir: &Path,
    steps: &[CommandStep],
    create_dir: bool,
    timeout: Option<Duration>,
) -> SequenceReport {
    if create_dir {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!(error = %e, "failed to create working directory");
        }
    }

    let mut report = SequenceReport::default();
    for step in steps {
        let outcome = run_step(Some(dir), step, timeout).await;
        if outcome.success {
            info!(step = %outcome.label, "step succeeded");
        } else {
            warn!(
                step = %outcome.label,
                stderr = %outcome.stderr.trim(),
                "step failed; continuing with remaining steps"
            );
        }
        report.outcomes.push(outcome);
    }
    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(label: &str, script: &str) -> CommandStep {
        CommandStep::new(label, "sh", &["-c", script])
    }

    #[tokio::test]
    async fn step_captures_stdout() {
        let tmp = tempfile::tempdir().unwrap();
        let outcome = run_step(Some(tmp.path()), &sh("echo", "echo hello"), None).await;
        assert!(outcome.success);
        assert_eq!(outcome.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn step_env_is_visible_to_the_child() {
        let step = sh("env", "printf '%s' \"$MARKER\"").env("MARKER", "set-by-test");
        let outcome = run_step(None, &step, None).await;
        assert!(outcome.success);
        assert_eq!(outcome.stdout, "set-by-test");
    }

    #[tokio::test]
    async fn spawn_failure_is_a_failed_outcome() {
        let step = CommandStep::new("missing", "definitely-not-a-real-binary", &[]);
        let outcome = run_step(None, &step, None).await;
        assert!(!outcome.success);
        assert!(outcome.stderr.contains("failed to spawn"));
    }

    #[tokio::test]
    async fn timed_out_step_fails_without_hanging() {
        let outcome = run_step(None, &sh("sleep", "sleep 5"), Some(Duration::from_millis(100))).await;
        assert!(!outcome.success);
        assert!(outcome.stderr.contains("timed out"));
    }

    #[tokio::test]
    async fn failing_middle_step_does_not_short_circuit() {
        let tmp = tempfile::tempdir().unwrap();
        let steps = vec![
            sh("first", "touch one"),
            sh("second", "exit 1"),
            sh("third", "touch three"),
        ];
        let report = run_sequence(tmp.path(), &steps, false, None).await;

        assert_eq!(report.outcomes.len(), 3);
        assert!(report.outcomes[0].success);
        assert!(!report.outcomes[1].success);
        assert!(report.outcomes[2].success);
        assert!(!report.all_succeeded());
        // Both side-effecting steps actually ran.
        assert!(tmp.path().join("one").exists());
        assert!(tmp.path().join("three").exists());
    }

    #[tokio::test]
    async fn create_dir_builds_the_working_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a").join("b");
        let report = run_sequence(&dir, &[sh("pwd", "pwd")], true, None).await;
        assert!(report.all_succeeded());
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn create_dir_on_existing_directory_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let report = run_sequence(tmp.path(), &[sh("ok", "true")], true, None).await;
        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn empty_sequence_reports_success() {
        let tmp = tempfile::tempdir().unwrap();
        let report = run_sequence(tmp.path(), &[], false, None).await;
        assert!(report.outcomes.is_empty());
        assert!(report.all_succeeded());
    }
}
