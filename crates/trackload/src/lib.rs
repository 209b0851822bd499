//! # `trackload`
//!
//! Synthetic user-tracking load generators built on [`trackload_core`].
//!
//! - [`insert`]: the `insert-simulator` pipeline. A dispatcher fills a
//!   [`trackload_core::JobQueue`] with action ids and a fixed pool of workers
//!   writes one synthetic row per id into a SQL store.
//! - [`client`]: the `client-simulator` pipeline. Independent heartbeat
//!   clients replay playback heartbeats for episodes of a catalog.
//! - [`telemetry`]: logging setup and the optional OpenTelemetry sink shared
//!   by both binaries.
//! - [`signal`]: Ctrl+C / SIGTERM handling and the matching exit status.

pub mod client;
pub mod insert;
pub mod signal;
pub mod telemetry;
