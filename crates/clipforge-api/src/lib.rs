//! Axum HTTP API server.
//!
//! This crate provides:
//! - REST endpoints for projects, analysis, exports and batch tracking
//! - Bearer token verification for users, shared-secret checks for the render worker
//! - Per-user rate limiting and security headers
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
