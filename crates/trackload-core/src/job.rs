use crate::error::{Error, Result};
use core::fmt;
use core::ops::Range;

/// Identifier of one synthetic user action.
///
/// Maps one-to-one onto the `id` column of the action table, so it is kept as
/// a signed 64-bit integer to bind directly into SQL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(i64);

impl JobId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for JobId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// A unit of work delivered through the [`JobQueue`](crate::JobQueue).
///
/// - [`Job::Work`] - Write the action with the given id.
/// - [`Job::Stop`] - No more work for the worker that receives it. Each worker
///   consumes exactly one and then exits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Job {
    Work(JobId),
    Stop,
}

/// Contiguous block of job ids handed out by one dispatcher run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobRange {
    first: JobId,
    count: usize,
}

impl JobRange {
    /// Builds the range that continues after the backend's current maximum id.
    ///
    /// An empty table (`None`) starts at 1.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the range would run past `i64::MAX`.
    pub fn after(current_max: Option<i64>, count: usize) -> Result<Self> {
        let first = current_max.map_or(Some(1), |max| max.checked_add(1));
        let end = first
            .zip(i64::try_from(count).ok())
            .and_then(|(first, count)| first.checked_add(count));
        match (first, end) {
            (Some(first), Some(_)) => Ok(Self {
                first: JobId::new(first),
                count,
            }),
            _ => Err(Error::config(format!(
                "{count} ids after {current_max:?} do not fit the id column"
            ))),
        }
    }

    pub const fn first(&self) -> JobId {
        self.first
    }

    /// The last id in the range, or `None` when the range is empty.
    pub fn last(&self) -> Option<JobId> {
        (self.count > 0).then(|| JobId::new(self.first.get() + self.count as i64 - 1))
    }

    pub const fn len(&self) -> usize {
        self.count
    }

    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn raw(&self) -> Range<i64> {
        self.first.get()..self.first.get() + self.count as i64
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.raw().contains(&id.get())
    }

    pub fn ids(&self) -> impl Iterator<Item = JobId> + use<> {
        self.raw().map(JobId::new)
    }
}
