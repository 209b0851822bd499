use std::sync::Arc;
use tokio::time::{Instant, sleep};
use trackload_core::{
    ActionRecord, ActionStore, Job, JobQueue, MetricSample, MetricsSink, Result, Session,
    StoreConnector, SyntheticData, Throttle,
};

/// Name of the timing sample emitted after every successful insert.
pub const INSERT_SAMPLE: &str = "insert_action";

/// What a worker accomplished before it drained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerTally {
    pub written: usize,
    pub failed: usize,
}

/// Everything a worker needs besides the queue, shared across the pool.
#[derive(Clone)]
pub struct WorkerContext<C> {
    pub connector: C,
    pub throttle: Throttle,
    pub sink: Arc<dyn MetricsSink>,
}

/// Insert worker task.
///
/// Opens a dedicated connection, registers one synthetic [`Session`] and then
/// consumes the shared [`JobQueue`] until it receives a [`Job::Stop`]. For each
/// [`Job::Work`] it writes one [`ActionRecord`] tagged with its session, then
/// pauses for a random [`Throttle`] delay.
///
/// A failed insert is logged, counted and acknowledged like a successful one;
/// the worker keeps going. Failing to connect or to register the session ends
/// the worker before it takes any job, leaving its `Stop` in the queue.
///
/// Every delivery is acknowledged exactly once. If the task is aborted while
/// holding one, dropping the [`trackload_core::Delivery`] acknowledges it.
pub async fn worker_loop<C: StoreConnector>(
    worker_id: usize,
    queue: JobQueue,
    ctx: WorkerContext<C>,
    mut data: SyntheticData,
) -> Result<WorkerTally> {
    tracing::trace!("Worker {worker_id} started");

    let mut store = ctx.connector.connect().await?;
    let session = Session::generate(&mut data);
    store.register_session(&session).await?;
    tracing::debug!(
        "Worker {worker_id} registered session {} from {}",
        session.session_id,
        session.user_ip
    );

    let mut tally = WorkerTally::default();
    loop {
        let delivery = queue.dequeue().await?;
        let id = match delivery.job() {
            Job::Work(id) => id,
            Job::Stop => {
                delivery.ack();
                tracing::debug!("Worker {worker_id} received stop job");
                if let Err(e) = store.close().await {
                    tracing::warn!("Worker {worker_id} failed to close its connection: {e}");
                }
                break;
            }
        };

        let record = ActionRecord::synthesize(id, &session, &mut data);
        let started = Instant::now();
        match store.insert_action(&record).await {
            Ok(()) => {
                ctx.sink
                    .record(MetricSample::duration(INSERT_SAMPLE, started.elapsed()));
                tally.written += 1;
                tracing::info!("Worker {worker_id} inserted action {id}");
            }
            Err(e) => {
                tracing::warn!("Worker {worker_id}: {e}");
                tally.failed += 1;
            }
        }
        delivery.ack();

        sleep(ctx.throttle.next_delay(data.rng())).await;
    }

    tracing::trace!(
        "Worker {worker_id} stopped after {} inserts ({} failed)",
        tally.written,
        tally.failed
    );
    Ok(tally)
}
