//! Backend seams used by the worker pool.
//!
//! A [`StoreConnector`] is shared by the dispatcher and every worker. Each
//! worker calls [`StoreConnector::connect`] once to open its own
//! [`ActionStore`]; connections are never shared between workers, so stores
//! take `&mut self` and need no internal locking.

use crate::{ActionRecord, Result, Session};

/// One worker's private connection to the target backend.
pub trait ActionStore: Send {
    /// Writes the worker's session identity. Called once, before any action.
    fn register_session(&mut self, session: &Session) -> impl Future<Output = Result<()>> + Send;

    /// Writes one action record.
    fn insert_action(&mut self, record: &ActionRecord) -> impl Future<Output = Result<()>> + Send;

    /// Closes the connection after the worker has drained.
    fn close(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

/// Factory for [`ActionStore`]s plus the dispatcher's one-off range query.
pub trait StoreConnector: Clone + Send + Sync + 'static {
    type Store: ActionStore + 'static;

    /// Opens a new, dedicated connection.
    fn connect(&self) -> impl Future<Output = Result<Self::Store>> + Send;

    /// Returns the highest action id currently stored, if any.
    fn current_max_id(&self) -> impl Future<Output = Result<Option<i64>>> + Send;
}
