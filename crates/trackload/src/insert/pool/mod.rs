//! Insert workers and the pool that runs them.

mod manager;
mod worker;


pub use manager::{WorkerExit, WorkerPool, WorkerReport};
pub use worker::{INSERT_SAMPLE, WorkerContext, WorkerTally, worker_loop};
