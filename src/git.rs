//! Planned git and editor command sequences.
//!
//! Each builder returns the ordered steps for one API operation; execution
//! and the continue-on-failure policy live in [`crate::exec`].  Every git
//! step runs with `GIT_TERMINAL_PROMPT=0` so a credential prompt can never
//! wedge the daemon.

use std::path::Path;

use crate::exec::CommandStep;

fn git_step(binary: &str, label: &str, args: &[&str]) -> CommandStep {
    CommandStep::new(label, binary, args).env("GIT_TERMINAL_PROMPT", "0")
}

/// `git clone <url>`, run in the owner-level base directory so git names the
/// project directory itself.
pub fn clone_sequence(binary: &str, repo_url: &str) -> Vec<CommandStep> {
    vec![git_step(binary, "clone", &["clone", repo_url])]
}

/// Stage, commit and push.
///
/// The push targets `origin master` with `-u` so a freshly cloned working
/// tree gets its upstream set on the first push.
pub fn push_sequence(binary: &str, message: &str) -> Vec<CommandStep> {
    vec![
        git_step(binary, "add", &["add", "."]),
        git_step(binary, "commit", &["commit", "-m", message]),
        git_step(binary, "push", &["push", "-u", "origin", "master"]),
    ]
}

/// `git pull` in the project directory.
pub fn pull_sequence(binary: &str) -> Vec<CommandStep> {
    vec![git_step(binary, "pull", &["pull"])]
}

/// Launch the configured editor on `path`.
///
/// Single step, no working directory.  If the path does not exist the
/// editor's own failure is surfaced through the step outcome.
pub fn editor_step(editor: &str, path: &Path) -> CommandStep {
    CommandStep::new("open-editor", editor, &[&path.to_string_lossy()])
}
