//! Fixed-size pool of insert workers.
//!
//! [`WorkerPool`] spawns `num_workers` [`worker_loop`] tasks on the Tokio
//! runtime, all consuming the same [`JobQueue`]. It does not route work:
//! workers pull from the queue on their own, and each drains on the first
//! [`Job::Stop`](trackload_core::Job::Stop) it receives.
//!
//! The pool tracks how many workers are still alive so the dispatcher can
//! notice when every worker is gone, which matters when some of them died
//! before consuming their stop job and the queue can never settle.

use super::worker::{WorkerContext, WorkerTally, worker_loop};
use std::collections::BTreeSet;
use tokio::sync::watch;
use tokio::task::JoinSet;
use trackload_core::{Error, JobQueue, StoreConnector, SyntheticData};

/// How a worker task ended.
#[derive(Debug)]
pub enum WorkerExit {
    /// Consumed a stop job and closed its connection.
    Drained(WorkerTally),
    /// Gave up before or while consuming the queue.
    Failed(Error),
    /// Cancelled by [`WorkerPool::abort`], or panicked.
    Aborted,
}

#[derive(Debug)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub exit: WorkerExit,
}

impl WorkerReport {
    pub fn tally(&self) -> Option<WorkerTally> {
        match self.exit {
            WorkerExit::Drained(tally) => Some(tally),
            _ => None,
        }
    }

    pub fn is_drained(&self) -> bool {
        matches!(self.exit, WorkerExit::Drained(_))
    }
}

pub struct WorkerPool {
    tasks: JoinSet<WorkerReport>,
    live: watch::Sender<usize>,
    num_workers: usize,
}

/// Decrements the live counter when a worker task ends, however it ends.
struct LiveGuard(watch::Sender<usize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.send_modify(|live| *live = live.saturating_sub(1));
    }
}

impl WorkerPool {
    /// Starts `num_workers` workers on the current runtime.
    pub fn spawn<C: StoreConnector>(
        num_workers: usize,
        queue: &JobQueue,
        ctx: &WorkerContext<C>,
    ) -> Self {
        let (live, _) = watch::channel(num_workers);
        let mut tasks = JoinSet::new();

        for worker_id in 0..num_workers {
            let guard = LiveGuard(live.clone());
            let queue = queue.clone();
            let ctx = ctx.clone();
            tasks.spawn(async move {
                let _guard = guard;
                let exit =
                    match worker_loop(worker_id, queue, ctx, SyntheticData::from_os_rng()).await {
                        Ok(tally) => WorkerExit::Drained(tally),
                        Err(e) => {
                            tracing::error!("Worker {worker_id} failed: {e}");
                            WorkerExit::Failed(e)
                        }
                    };
                WorkerReport { worker_id, exit }
            });
        }

        tracing::debug!("Spawned {num_workers} workers");
        Self {
            tasks,
            live,
            num_workers,
        }
    }

    /// Number of worker tasks that have not finished yet.
    pub fn live(&self) -> usize {
        *self.live.borrow()
    }

    /// Resolves once every worker task has ended, for whatever reason.
    pub async fn all_exited(&self) {
        let mut rx = self.live.subscribe();
        // The sender lives in `self`, so this only fails if we are dropped.
        let _ = rx.wait_for(|live| *live == 0).await;
    }

    /// Cancels every worker still running. In-flight jobs are lost.
    pub fn abort(&mut self) {
        tracing::debug!("Aborting {} live workers", self.live());
        self.tasks.abort_all();
    }

    /// Waits for every worker to end and returns one report per worker,
    /// ordered by worker id.
    pub async fn wait(&mut self) -> Vec<WorkerReport> {
        let mut reports = Vec::with_capacity(self.num_workers);
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) if e.is_panic() => tracing::error!("Worker task panicked: {e}"),
                Err(_) => {}
            }
        }

        let reported: BTreeSet<usize> = reports.iter().map(|r| r.worker_id).collect();
        for worker_id in (0..self.num_workers).filter(|id| !reported.contains(id)) {
            reports.push(WorkerReport {
                worker_id,
                exit: WorkerExit::Aborted,
            });
        }
        reports.sort_by_key(|r| r.worker_id);
        reports
    }
}
