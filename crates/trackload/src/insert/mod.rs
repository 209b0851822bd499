//! The `insert-simulator` pipeline: configuration, SQL backend, worker pool
//! and the dispatcher that ties them together.

pub mod config;
pub mod dispatcher;
pub mod pool;
pub mod store;
