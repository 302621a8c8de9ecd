//! memhub — ingestion and coordination hub for process-memory telemetry,
//! chunked heap snapshots, and leak analysis.
//!
//! The core is organized as one `actix::Actor` per long-lived piece of mutable
//! state (spec §5): [`store`] owns services/metrics/alerts, [`snapshot`] owns
//! chunk reassembly, [`analysis`] owns comparison sessions, and [`publisher`]
//! owns the dashboard subscriber set. [`connection`] classifies and drives
//! each socket; [`api`] exposes the read-only query surface over the same
//! actors.

pub mod analysis;
pub mod api;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod liveness;
pub mod publisher;
pub mod server;
pub mod snapshot;
pub mod store;

pub use config::ServerConfig;
pub use server::{configure_routes, run, start_actors, AppState};
