//! Error types for the load generators.
//!
//! This module defines the central `Error` enum shared by the job queue, the
//! worker loop, and the concrete backends. Binaries wrap it in
//! `anyhow::Error` at the top level; library code propagates it with `?`.
//!
//! ## Error Cases
//! - `Config`: Invalid or missing configuration, reported before any worker
//!   starts.
//! - `Connect`: A worker (or the dispatcher) could not reach the backend.
//! - `SessionRegistration`: The one-time session write at worker startup
//!   failed. Fatal for that worker.
//! - `Write`: A single backend write for one job failed. Counted and dropped.
//! - `Query`: A read against the backend (e.g. the starting id) failed.
//! - `Catalog`: The episode catalog could not be fetched or was empty.
//! - `QueueClosed`: The job queue lost its sender side.
//! - `Stalled`: Every worker exited while entries were still unacknowledged.

use crate::job::JobId;

pub type Result<T> = core::result::Result<T, Error>;

/// A boxed error coming from a backend driver (`sqlx`, `reqwest`, ...).
pub type BackendError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Unified error type for the load generators.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The configuration is invalid or incomplete.
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// The backend could not be reached.
    #[error("Failed to connect to backend: {source}")]
    Connect {
        #[source]
        source: BackendError,
    },

    /// The per-worker session identity could not be written.
    #[error("Failed to register session {session_id}: {source}")]
    SessionRegistration {
        session_id: String,
        #[source]
        source: BackendError,
    },

    /// A single job's backend write failed.
    #[error("Failed to write action {job}: {source}")]
    Write {
        job: JobId,
        #[source]
        source: BackendError,
    },

    /// A read query against the backend failed.
    #[error("Backend query failed: {source}")]
    Query {
        #[source]
        source: BackendError,
    },

    /// The catalog of episodes could not be loaded.
    #[error("Catalog error: {reason}")]
    Catalog { reason: String },

    /// The job queue can no longer deliver items.
    #[error("Job queue closed")]
    QueueClosed,

    /// All workers are gone but the join barrier can never release.
    #[error("All workers exited with {outstanding} queue entries unacknowledged")]
    Stalled { outstanding: usize },
}

impl Error {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub fn connect(source: impl Into<BackendError>) -> Self {
        Self::Connect {
            source: source.into(),
        }
    }

    pub fn query(source: impl Into<BackendError>) -> Self {
        Self::Query {
            source: source.into(),
        }
    }

    pub fn catalog(reason: impl Into<String>) -> Self {
        Self::Catalog {
            reason: reason.into(),
        }
    }
}
