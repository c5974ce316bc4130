//! Datagrid server library.
//!
//! Exposes the server internals for integration testing. The main entry
//! point for running the server is the `datagrid` binary.

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod session;
pub mod state;
pub mod storage;

use axum::Router;
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

pub use config::Config;
pub use state::{AppState, GridRegistry};

/// Build the application router around a session layer.
pub fn app<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    Router::new()
        .merge(routes::grid::router())
        .merge(routes::health::router())
        // TraceLayer → session → routes
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
