//! TestGrid daemon library.
//!
//! Exposes the daemon modules for integration testing.
//! In production, `testgrid-daemon` is used as a binary (main.rs).

pub mod api;
pub mod cli;
pub mod daemon;
pub mod logging;
pub mod metrics_server;
