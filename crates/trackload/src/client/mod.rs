//! The `client-simulator` pipeline.
//!
//! Unlike the insert workers, heartbeat clients share no queue: each one
//! picks an episode from the [`catalog`] once and then sends heartbeats for it
//! until the process is interrupted.

pub mod catalog;
pub mod config;
pub mod heartbeat;
pub mod simulator;
