//! Axum router and HTTP request handlers for the automation daemon.
//!
//! Routes:
//! - `GET  /`            - greeting / smoke-test endpoint
//! - `GET  /healthz`     - liveness probe
//! - `POST /repoExists`  - stat the derived project directory
//! - `POST /gitClone`    - clone into the owner-level base directory
//! - `POST /gitPush`     - stage, commit and push, best-effort
//! - `POST /gitPull`     - pull, best-effort
//! - `POST /openEditor`  - launch the configured editor on the project
//!
//! Write operations return 200 once their command sequence has been
//! attempted; callers must consult the logs for per-step outcomes and must
//! not infer that every step succeeded.

use std::path::PathBuf;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::http::middleware::{log_requests, request_id};
use crate::{exec, git, workspace, AppState};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum [`Router`] with all routes, the request pipeline and
/// shared state.  Unrouted paths fall through to axum's 404 fallback.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/healthz", get(crate::health::handle_health))
        .route("/repoExists", post(handle_repo_exists))
        .route("/gitClone", post(handle_git_clone))
        .route("/gitPush", post(handle_git_push))
        .route("/gitPull", post(handle_git_pull))
        .route("/openEditor", post(handle_open_editor))
        // The last layer added runs outermost, so the request-id stage
        // wraps logging and every log line carries an id.
        .layer(middleware::from_fn(log_requests))
        .layer(middleware::from_fn(request_id))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// One request shape shared by every repository endpoint.
///
/// Omitted fields decode as empty strings; each handler uses only the
/// fields it needs.  `domain` and `gitUserName` locate the owner directory,
/// `projectName` the repository itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoRequest {
    pub domain: String,
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    #[serde(rename = "gitUserName")]
    pub git_user_name: String,
    #[serde(rename = "projectName")]
    pub project_name: String,
    #[serde(rename = "rootPath")]
    pub root_path: String,
    #[serde(rename = "commitMessage")]
    pub commit_message: String,
}

impl RepoRequest {
    /// Owner-level directory clones run in.
    fn base_dir(&self) -> PathBuf {
        workspace::base_dir(&self.root_path, &self.domain, &self.git_user_name)
    }

    /// Directory of the already-cloned repository.
    fn project_dir(&self) -> PathBuf {
        workspace::project_dir(
            &self.root_path,
            &self.domain,
            &self.git_user_name,
            &self.project_name,
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /`
async fn handle_index() -> &'static str {
    "Hello, World!\n"
}

/// `POST /repoExists`
///
/// Stats the project directory.  Absence is a result (`exists: false`), not
/// a failure; a stat error other than not-found becomes a 500 because the
/// check itself could not be trusted.
#[instrument(skip(_state, req), fields(project = %req.project_name))]
async fn handle_repo_exists(
    State(_state): State<AppState>,
    Json(req): Json<RepoRequest>,
) -> Result<Json<ExistsResponse>, AppError> {
    let path = req.project_dir();
    let exists = workspace::probe(&path).await?;
    info!(path = %path.display(), exists, "existence check");
    Ok(Json(ExistsResponse { exists }))
}

/// `POST /gitClone`
///
/// Creates the base directory on demand and clones into it, then echoes the
/// request.  A 200 only confirms the attempt (see [`exec::run_sequence`]).
#[instrument(skip(state, req), fields(repo = %req.repo_url))]
async fn handle_git_clone(
    State(state): State<AppState>,
    Json(req): Json<RepoRequest>,
) -> Json<RepoRequest> {
    let dir = req.base_dir();
    let steps = git::clone_sequence(&state.config.commands.git_binary, &req.repo_url);
    let report = exec::run_sequence(&dir, &steps, true, state.config.step_timeout()).await;
    info!(
        dir = %dir.display(),
        succeeded = report.all_succeeded(),
        "clone sequence attempted"
    );
    Json(req)
}

/// `POST /gitPush`
///
/// Stage, commit and push in order.  Individual step failures are logged
/// and never abort the remaining steps.
#[instrument(skip(state, req), fields(project = %req.project_name))]
async fn handle_git_push(State(state): State<AppState>, Json(req): Json<RepoRequest>) -> StatusCode {
    let dir = req.project_dir();
    let steps = git::push_sequence(&state.config.commands.git_binary, &req.commit_message);
    let report = exec::run_sequence(&dir, &steps, false, state.config.step_timeout()).await;
    info!(
        dir = %dir.display(),
        succeeded = report.all_succeeded(),
        "push sequence attempted"
    );
    StatusCode::OK
}

/// `POST /gitPull`
#[instrument(skip(state, req), fields(project = %req.project_name))]
async fn handle_git_pull(State(state): State<AppState>, Json(req): Json<RepoRequest>) -> StatusCode {
    let dir = req.project_dir();
    let steps = git::pull_sequence(&state.config.commands.git_binary);
    let report = exec::run_sequence(&dir, &steps, false, state.config.step_timeout()).await;
    info!(
        dir = %dir.display(),
        succeeded = report.all_succeeded(),
        "pull sequence attempted"
    );
    StatusCode::OK
}

/// `POST /openEditor`
///
/// Launches the configured editor on the project directory.  No working
/// directory is required; if the path does not exist the launcher's own
/// failure is surfaced in the logged outcome.
#[instrument(skip(state, req), fields(project = %req.project_name))]
async fn handle_open_editor(
    State(state): State<AppState>,
    Json(req): Json<RepoRequest>,
) -> StatusCode {
    let path = req.project_dir();
    let step = git::editor_step(&state.config.commands.editor, &path);
    let outcome = exec::run_step(None, &step, state.config.step_timeout()).await;
    if outcome.success {
        info!(path = %path.display(), "editor launched");
    } else {
        warn!(
            path = %path.display(),
            stderr = %outcome.stderr.trim(),
            "editor launch failed"
        );
    }
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Application-level error type that maps cleanly to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// An unexpected internal error (filesystem probe failure etc.).
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Internal(err) => {
                error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Internal server error: {err:#}"),
                )
                    .into_response()
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
