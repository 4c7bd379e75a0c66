//! Bounded coalescing queue of update jobs.

use std::collections::{HashMap, VecDeque};
use tokio::sync::{Mutex, Notify};

use crate::error::{IndexerError, Result};

/// What a worker should do for a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateOp {
    Update,
    Delete,
}

/// One unit of work: re-derive a subject's documents for one type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpdateJob {
    pub subject: String,
    pub type_name: String,
    pub op: UpdateOp,
}

impl UpdateJob {
    pub fn update(subject: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            type_name: type_name.into(),
            op: UpdateOp::Update,
        }
    }

    pub fn delete(subject: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            type_name: type_name.into(),
            op: UpdateOp::Delete,
        }
    }

    fn key(&self) -> JobKey {
        (self.subject.clone(), self.type_name.clone())
    }
}

type JobKey = (String, String);

#[derive(Debug, Default)]
struct QueueState {
    /// FIFO by first enqueue
    order: VecDeque<JobKey>,
    /// Pending op per queued key; coalescing overwrites in place
    ops: HashMap<JobKey, UpdateOp>,
    closed: bool,
}

/// Bounded queue that coalesces jobs sharing a `(subject, type_name)` key.
///
/// Ordering is FIFO on first-enqueue time; a later enqueue for a live key
/// replaces the op (last writer wins) without moving the key. When the
/// queue is full, `push` blocks, which is the delta-ingestion backpressure:
/// pushers must therefore never run on a consumer task.
#[derive(Debug)]
pub struct UpdateQueue {
    state: Mutex<QueueState>,
    readable: Notify,
    writable: Notify,
    capacity: usize,
}

impl UpdateQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            readable: Notify::new(),
            writable: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    /// Enqueue a job, waiting while the queue is full.
    ///
    /// Fails with [`IndexerError::Shutdown`] once the queue is closed.
    pub async fn push(&self, job: UpdateJob) -> Result<()> {
        let key = job.key();
        loop {
            {
                let mut state = self.state.lock().await;
                if state.closed {
                    self.writable.notify_one();
                    return Err(IndexerError::Shutdown);
                }
                if let Some(op) = state.ops.get_mut(&key) {
                    *op = job.op;
                    return Ok(());
                }
                if state.order.len() < self.capacity {
                    state.order.push_back(key.clone());
                    state.ops.insert(key, job.op);
                    self.readable.notify_one();
                    return Ok(());
                }
            }
            self.writable.notified().await;
        }
    }

    /// Dequeue the oldest job, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<UpdateJob> {
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(key) = state.order.pop_front() {
                    // Invariant: every queued key has an op entry.
                    let op = state.ops.remove(&key).expect("queued key without op");
                    self.writable.notify_one();
                    return Some(UpdateJob {
                        subject: key.0,
                        type_name: key.1,
                        op,
                    });
                }
                if state.closed {
                    // Wake the next waiter so closure cascades.
                    self.readable.notify_one();
                    return None;
                }
            }
            self.readable.notified().await;
        }
    }

    /// Close the queue: pending jobs stay poppable, new pushes fail.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        drop(state);
        self.readable.notify_one();
        self.writable.notify_one();
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = UpdateQueue::new(10);
        queue.push(UpdateJob::update("a", "document")).await.unwrap();
        queue.push(UpdateJob::update("b", "document")).await.unwrap();

        assert_eq!(queue.pop().await.unwrap().subject, "a");
        assert_eq!(queue.pop().await.unwrap().subject, "b");
    }

    #[tokio::test]
    async fn test_coalescing_keeps_position_updates_op() {
        let queue = UpdateQueue::new(10);
        queue.push(UpdateJob::update("a", "document")).await.unwrap();
        queue.push(UpdateJob::update("b", "document")).await.unwrap();
        // Re-enqueue of "a" coalesces: op replaced, position unchanged.
        queue.push(UpdateJob::delete("a", "document")).await.unwrap();

        assert_eq!(queue.len().await, 2);
        let first = queue.pop().await.unwrap();
        assert_eq!(first.subject, "a");
        assert_eq!(first.op, UpdateOp::Delete);
    }

    #[tokio::test]
    async fn test_same_subject_different_type_not_coalesced() {
        let queue = UpdateQueue::new(10);
        queue.push(UpdateJob::update("a", "document")).await.unwrap();
        queue.push(UpdateJob::update("a", "case")).await.unwrap();
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn test_push_blocks_when_full() {
        let queue = Arc::new(UpdateQueue::new(1));
        queue.push(UpdateJob::update("a", "document")).await.unwrap();

        let blocked = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.push(UpdateJob::update("b", "document")).await })
        };

        // The second push cannot complete while the queue is full.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());

        assert_eq!(queue.pop().await.unwrap().subject, "a");
        blocked.await.unwrap().unwrap();
        assert_eq!(queue.pop().await.unwrap().subject, "b");
    }

    #[tokio::test]
    async fn test_coalescing_push_does_not_block_when_full() {
        let queue = UpdateQueue::new(1);
        queue.push(UpdateJob::update("a", "document")).await.unwrap();
        // Same key: coalesces instead of waiting for capacity.
        queue.push(UpdateJob::delete("a", "document")).await.unwrap();
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = UpdateQueue::new(10);
        queue.push(UpdateJob::update("a", "document")).await.unwrap();
        queue.close().await;

        assert!(matches!(
            queue.push(UpdateJob::update("b", "document")).await,
            Err(IndexerError::Shutdown)
        ));
        assert!(queue.pop().await.is_some());
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn test_close_wakes_all_blocked_consumers() {
        let queue = Arc::new(UpdateQueue::new(10));
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.pop().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close().await;

        for consumer in consumers {
            let job = tokio::time::timeout(Duration::from_secs(1), consumer)
                .await
                .expect("consumer did not wake on close")
                .unwrap();
            assert!(job.is_none());
        }
    }
}
