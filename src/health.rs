//! Process liveness flag and the `/healthz` endpoint.
//!
//! The flag is owned by the server lifecycle manager in `main` and handed to
//! the health handler and the shutdown coordinator; nothing else mutates it.
//! It resets to `Starting` on every process start.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;

use crate::AppState;

// ---------------------------------------------------------------------------
// Lifecycle states
// ---------------------------------------------------------------------------

/// Server lifecycle states, in the only order they may be traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Ready,
    Draining,
    Stopped,
}

impl LifecycleState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::Ready => 1,
            Self::Draining => 2,
            Self::Stopped => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Ready,
            2 => Self::Draining,
            3 => Self::Stopped,
            _ => Self::Starting,
        }
    }
}

// ---------------------------------------------------------------------------
// Liveness flag
// ---------------------------------------------------------------------------

/// Cloneable handle on the process-wide liveness flag.
///
/// Reads and writes use atomic semantics; the lifecycle task and any number
/// of concurrent health-check readers may touch it without coordination.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicU8>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(LifecycleState::Starting.as_u8())))
    }

    pub fn set(&self, state: LifecycleState) {
        self.0.store(state.as_u8(), Ordering::SeqCst);
    }

    pub fn get(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn is_ready(&self) -> bool {
        self.get() == LifecycleState::Ready
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Axum handler
// ---------------------------------------------------------------------------

/// `GET /healthz`.  204 while the server is ready, 503 in every other state.
pub async fn handle_health(State(state): State<AppState>) -> StatusCode {
    if state.liveness.is_ready() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unready() {
        let liveness = Liveness::new();
        assert_eq!(liveness.get(), LifecycleState::Starting);
        assert!(!liveness.is_ready());
    }

    #[test]
    fn ready_is_the_only_ready_state() {
        let liveness = Liveness::new();
        for state in [
            LifecycleState::Starting,
            LifecycleState::Ready,
            LifecycleState::Draining,
            LifecycleState::Stopped,
        ] {
            liveness.set(state);
            assert_eq!(liveness.get(), state);
            assert_eq!(liveness.is_ready(), state == LifecycleState::Ready);
        }
    }

    #[test]
    fn clones_share_the_same_flag() {
        let liveness = Liveness::new();
        let observer = liveness.clone();
        liveness.set(LifecycleState::Draining);
        assert_eq!(observer.get(), LifecycleState::Draining);
    }
}
