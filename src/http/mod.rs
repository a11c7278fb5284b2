//! HTTP layer for the git automation daemon.
//!
//! This module provides the axum-based server surface: the router with one
//! handler per repository operation, and the two-stage request pipeline
//! (correlation-id propagation wrapping request logging).

pub mod handler;
pub mod middleware;
