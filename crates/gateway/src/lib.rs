//! HTTP surface of the bridge: `/health` for liveness probes and
//! `/metrics` for Prometheus, plus the process shutdown signal.

pub mod server;
pub mod shutdown;

pub use {
    server::{AppState, HealthResponse, build_app, serve},
    shutdown::shutdown_signal,
};
