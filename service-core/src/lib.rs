//! Shared infrastructure for the dorm admin workspace: error type, tracing
//! and metrics setup, HTTP middleware, layered config and periodic refresh.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod polling;
