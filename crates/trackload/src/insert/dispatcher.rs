//! Run orchestration for `insert-simulator`.
//!
//! A run goes through four phases:
//!
//! 1. Ask the backend for the highest action id and plan the contiguous
//!    [`JobRange`] right after it.
//! 2. Enqueue one [`Job::Work`] per id (optionally shuffled), then one
//!    [`Job::Stop`] per worker.
//! 3. Start the [`WorkerPool`] and wait on the queue's join barrier.
//! 4. Wait for every worker to exit and report a [`RunSummary`].
//!
//! While waiting on the barrier the dispatcher also watches the pool: if every
//! worker is gone but the queue still has unacknowledged entries, the barrier
//! can never release and the run fails with [`Error::Stalled`]. Cancelling the
//! token at any point aborts all workers and ends the run as
//! [`RunOutcome::Interrupted`].

use super::config::InsertConfig;
use super::pool::{WorkerContext, WorkerExit, WorkerPool, WorkerReport};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use trackload_core::{
    Error, Job, JobId, JobQueue, JobRange, MetricsSink, Result, StoreConnector, SyntheticData,
};

/// Totals of a run that reached the end of its queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub range: JobRange,
    pub enqueued: usize,
    pub acknowledged: usize,
    pub written: usize,
    pub failed: usize,
    pub workers_exited: usize,
    pub worker_failures: usize,
}

impl RunSummary {
    fn from_reports(range: JobRange, queue: &JobQueue, reports: &[WorkerReport]) -> Self {
        let mut summary = Self {
            range,
            enqueued: queue.enqueued(),
            acknowledged: queue.acknowledged(),
            written: 0,
            failed: 0,
            workers_exited: reports.len(),
            worker_failures: 0,
        };
        for report in reports {
            match report.tally() {
                Some(tally) => {
                    summary.written += tally.written;
                    summary.failed += tally.failed;
                }
                None => summary.worker_failures += 1,
            }
        }
        summary
    }

    /// Whether any insert or any worker failed.
    pub const fn has_failures(&self) -> bool {
        self.failed > 0 || self.worker_failures > 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    Interrupted,
}

enum Barrier {
    Cancelled,
    Joined,
    WorkersGone,
}

/// Executes one full run against `connector`.
///
/// # Errors
///
/// - [`Error::Connect`] / [`Error::Query`] if the starting id cannot be read.
/// - [`Error::Config`] if the planned ids overflow the id column.
/// - [`Error::Stalled`] if every worker exits before the queue settles.
pub async fn run<C: StoreConnector>(
    config: &InsertConfig,
    connector: C,
    sink: Arc<dyn MetricsSink>,
    cancel: CancellationToken,
) -> Result<RunOutcome> {
    let current_max = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(RunOutcome::Interrupted),
        max = connector.current_max_id() => max?,
    };
    let range = JobRange::after(current_max, config.num_inserts)?;
    tracing::info!(
        "Planning {} inserts starting at id {}",
        range.len(),
        range.first()
    );

    let queue = JobQueue::new();
    enqueue_range(&queue, range, config.shuffle)?;
    for _ in 0..config.num_workers {
        queue.enqueue(Job::Stop)?;
    }

    let ctx = WorkerContext {
        connector,
        throttle: config.throttle,
        sink,
    };
    let mut pool = WorkerPool::spawn(config.num_workers, &queue, &ctx);
    tracing::info!(
        "Started {} workers (throttle 1..={} units)",
        config.num_workers,
        config.throttle.max_units()
    );

    let barrier = tokio::select! {
        biased;
        () = cancel.cancelled() => Barrier::Cancelled,
        () = queue.join() => Barrier::Joined,
        () = pool.all_exited() => Barrier::WorkersGone,
    };

    match barrier {
        Barrier::Cancelled => return Ok(interrupt(&mut pool).await),
        Barrier::Joined => tracing::debug!("All {} queue entries acknowledged", queue.enqueued()),
        // The last worker may exit right after acknowledging the last entry.
        Barrier::WorkersGone if queue.is_settled() => {}
        Barrier::WorkersGone => {
            let reports = pool.wait().await;
            log_worker_failures(&reports);
            return Err(Error::Stalled {
                outstanding: queue.outstanding(),
            });
        }
    }

    let reports = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        reports = pool.wait() => Some(reports),
    };
    let Some(reports) = reports else {
        return Ok(interrupt(&mut pool).await);
    };
    log_worker_failures(&reports);

    Ok(RunOutcome::Completed(RunSummary::from_reports(
        range, &queue, &reports,
    )))
}

fn enqueue_range(queue: &JobQueue, range: JobRange, shuffle: bool) -> Result<()> {
    if shuffle {
        let mut ids: Vec<JobId> = range.ids().collect();
        ids.shuffle(SyntheticData::from_os_rng().rng());
        ids.into_iter()
            .try_for_each(|id| queue.enqueue(Job::Work(id)))
    } else {
        range.ids().try_for_each(|id| queue.enqueue(Job::Work(id)))
    }
}

async fn interrupt(pool: &mut WorkerPool) -> RunOutcome {
    tracing::info!("Interrupted, aborting {} workers", pool.live());
    pool.abort();
    pool.wait().await;
    RunOutcome::Interrupted
}

fn log_worker_failures(reports: &[WorkerReport]) {
    for report in reports {
        if let WorkerExit::Aborted = report.exit {
            tracing::warn!("Worker {} did not finish", report.worker_id);
        }
    }
}
