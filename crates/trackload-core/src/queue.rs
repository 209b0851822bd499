//! Shared, unbounded job queue with a join barrier.
//!
//! [`JobQueue`] is the only piece of state shared between the dispatcher and
//! its workers. Dequeuing and acknowledging are separate events: a worker
//! receives a [`Delivery`], does its work, and only then acknowledges it. The
//! dispatcher calls [`JobQueue::join`] to wait until every enqueued entry,
//! including the [`Job::Stop`] entries, has been acknowledged.
//!
//! Items travel over an MPMC `flume` channel, so any idle worker can pick up
//! the next job in FIFO order. Acknowledgements are tracked with two counters
//! and a [`Notify`] that wakes joiners once they meet.

use crate::{Error, Job, Result};
use portable_atomic::{AtomicUsize, Ordering};
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::Notify;

/// Cloneable handle to a shared job queue.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

struct Inner {
    tx: flume::Sender<Job>,
    rx: flume::Receiver<Job>,
    enqueued: AtomicUsize,
    acknowledged: AtomicUsize,
    settled: Notify,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            inner: Arc::new(Inner {
                tx,
                rx,
                enqueued: AtomicUsize::new(0),
                acknowledged: AtomicUsize::new(0),
                settled: Notify::new(),
            }),
        }
    }

    /// Appends a job to the tail of the queue. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] if the channel is disconnected, which
    /// cannot happen while this handle is alive.
    pub fn enqueue(&self, job: Job) -> Result<()> {
        // Count before sending so `acknowledged <= enqueued` always holds.
        self.inner.enqueued.fetch_add(1, Ordering::AcqRel);
        if self.inner.tx.send(job).is_err() {
            self.inner.enqueued.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::QueueClosed);
        }
        Ok(())
    }

    /// Waits until a job is available and returns it in FIFO order.
    ///
    /// The returned [`Delivery`] must be acknowledged once the job has been
    /// handled. Dropping it acknowledges it as well.
    pub async fn dequeue(&self) -> Result<Delivery> {
        let job = self
            .inner
            .rx
            .recv_async()
            .await
            .map_err(|_| Error::QueueClosed)?;
        Ok(Delivery {
            job,
            queue: Some(self.clone()),
        })
    }

    /// Waits until every entry enqueued so far has been acknowledged.
    ///
    /// Returns immediately on a settled queue.
    pub async fn join(&self) {
        loop {
            let mut notified = pin!(self.inner.settled.notified());
            // Register interest before checking, so an ack landing in between
            // still wakes us.
            notified.as_mut().enable();
            if self.is_settled() {
                return;
            }
            notified.await;
        }
    }

    pub fn enqueued(&self) -> usize {
        self.inner.enqueued.load(Ordering::Acquire)
    }

    pub fn acknowledged(&self) -> usize {
        self.inner.acknowledged.load(Ordering::Acquire)
    }

    /// Entries enqueued but not yet acknowledged (delivered or not).
    pub fn outstanding(&self) -> usize {
        self.enqueued().saturating_sub(self.acknowledged())
    }

    pub fn is_settled(&self) -> bool {
        self.outstanding() == 0
    }

    fn task_done(&self) {
        let acknowledged = self.inner.acknowledged.fetch_add(1, Ordering::AcqRel) + 1;
        if acknowledged >= self.inner.enqueued.load(Ordering::Acquire) {
            self.inner.settled.notify_waiters();
        }
    }
}

/// A job taken off the queue, awaiting acknowledgement.
///
/// Acknowledgement happens exactly once: either explicitly via
/// [`Delivery::ack`] or implicitly when the delivery is dropped, e.g. when the
/// handling code returns early or unwinds.
#[must_use = "a delivery is acknowledged as soon as it is dropped"]
pub struct Delivery {
    job: Job,
    queue: Option<JobQueue>,
}

impl Delivery {
    pub const fn job(&self) -> Job {
        self.job
    }

    /// Marks this entry as complete.
    pub fn ack(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(queue) = self.queue.take() {
            queue.task_done();
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobId;
    use core::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn dequeue_is_fifo() {
        let queue = JobQueue::new();
        for raw in 1..=3 {
            queue.enqueue(Job::Work(JobId::new(raw))).unwrap();
        }
        queue.enqueue(Job::Stop).unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            let delivery = queue.dequeue().await.unwrap();
            seen.push(delivery.job());
            delivery.ack();
        }

        assert_eq!(
            seen,
            vec![
                Job::Work(JobId::new(1)),
                Job::Work(JobId::new(2)),
                Job::Work(JobId::new(3)),
                Job::Stop
            ]
        );
        assert!(queue.is_settled());
    }

    #[tokio::test]
    async fn join_on_empty_queue_returns_immediately() {
        let queue = JobQueue::new();
        timeout(Duration::from_secs(1), queue.join())
            .await
            .expect("join should not block on an empty queue");
    }

    #[tokio::test]
    async fn join_waits_for_acks_not_dequeues() {
        let queue = JobQueue::new();
        queue.enqueue(Job::Work(JobId::new(1))).unwrap();
        queue.enqueue(Job::Stop).unwrap();

        let first = queue.dequeue().await.unwrap();
        let second = queue.dequeue().await.unwrap();
        assert_eq!(queue.outstanding(), 2);

        // Everything is dequeued but nothing acknowledged yet.
        assert!(
            timeout(Duration::from_millis(50), queue.join())
                .await
                .is_err()
        );

        first.ack();
        assert_eq!(queue.outstanding(), 1);

        let joiner = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.join().await })
        };
        second.ack();

        timeout(Duration::from_secs(1), joiner)
            .await
            .expect("join should release after the last ack")
            .unwrap();
        assert_eq!(queue.acknowledged(), 2);
    }

    #[tokio::test]
    async fn dropped_delivery_acknowledges_once() {
        let queue = JobQueue::new();
        queue.enqueue(Job::Work(JobId::new(9))).unwrap();

        {
            let _delivery = queue.dequeue().await.unwrap();
        }

        assert_eq!(queue.acknowledged(), 1);
        assert!(queue.is_settled());
    }

    #[tokio::test]
    async fn dequeue_waits_for_a_later_enqueue() {
        let queue = JobQueue::new();
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let delivery = queue.dequeue().await.unwrap();
                let job = delivery.job();
                delivery.ack();
                job
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.enqueue(Job::Work(JobId::new(5))).unwrap();

        let job = timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job, Job::Work(JobId::new(5)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumers_ack_every_entry() {
        const JOBS: i64 = 500;
        const CONSUMERS: usize = 8;

        let queue = JobQueue::new();
        for raw in 0..JOBS {
            queue.enqueue(Job::Work(JobId::new(raw))).unwrap();
        }
        for _ in 0..CONSUMERS {
            queue.enqueue(Job::Stop).unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..CONSUMERS {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut handled = 0usize;
                loop {
                    let delivery = queue.dequeue().await.unwrap();
                    match delivery.job() {
                        Job::Stop => {
                            delivery.ack();
                            return handled;
                        }
                        Job::Work(_) => {
                            handled += 1;
                            delivery.ack();
                        }
                    }
                }
            }));
        }

        timeout(Duration::from_secs(5), queue.join())
            .await
            .expect("join should release");

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }
        assert_eq!(total, JOBS as usize);
        assert_eq!(queue.acknowledged(), JOBS as usize + CONSUMERS);
    }
}
