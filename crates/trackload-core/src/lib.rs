//! # `trackload-core`: building blocks for the trackload generators
//!
//! Shared types used by the `insert-simulator` and `client-simulator`
//! binaries:
//!
//! - [`JobQueue`] / [`Delivery`] - unbounded MPMC job queue whose join
//!   barrier counts acknowledgements, not dequeues.
//! - [`Job`] / [`JobId`] / [`JobRange`] - units of work and the contiguous id
//!   range a run hands out.
//! - [`Session`] / [`ActionRecord`] - synthetic identities and rows, filled
//!   from [`SyntheticData`].
//! - [`Throttle`] - randomized per-iteration pause.
//! - [`ActionStore`] / [`StoreConnector`] - the backend seam.
//! - [`MetricsSink`] - best-effort timing samples.
//! - [`Error`] - the shared error type.

mod error;
mod job;
mod metrics;
mod queue;
mod record;
mod session;
mod store;
mod synthetic;
mod throttle;

pub use error::{BackendError, Error, Result};
pub use job::{Job, JobId, JobRange};
pub use metrics::{MetricSample, MetricsSink, NoopSink};
pub use queue::{Delivery, JobQueue};
pub use record::{ActionRecord, ActionType, CREATED_FORMAT};
pub use session::{ANONYMOUS_USER, SESSION_ID_LEN, Session};
pub use store::{ActionStore, StoreConnector};
pub use synthetic::SyntheticData;
pub use throttle::Throttle;
