use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::error::IngestionError;

/// Outcome of a consumer poll.
#[derive(Debug)]
pub enum Poll<T> {
    Item(T),
    /// Producer finished and every item was delivered.
    Finished,
    /// Producer failed; delivered once, after any items queued before the failure.
    Failed(IngestionError),
    TimedOut,
}

struct QueueState<T> {
    items: VecDeque<T>,
    completed: bool,
    error: Option<IngestionError>,
    closed: bool,
}

/// A small blocking single-producer/single-consumer queue with a capacity bound.
///
/// The producer blocks while the queue is full; the consumer waits at most the poll timeout.
/// Completion and failure are recorded under the same lock as the items so the consumer
/// never observes "finished" before the last item.
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                completed: false,
                error: None,
                closed: false,
            }),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Enqueue one item, blocking while full. Returns `false` once the consumer closed.
    pub fn put(&self, item: T) -> bool {
        let mut g = self.state.lock().expect("queue mutex poisoned");
        while g.items.len() >= self.capacity && !g.closed {
            g = self.not_full.wait(g).expect("queue mutex poisoned");
        }
        if g.closed {
            return false;
        }
        g.items.push_back(item);
        self.not_empty.notify_one();
        true
    }

    /// Mark the producer as done.
    pub fn finish(&self) {
        let mut g = self.state.lock().expect("queue mutex poisoned");
        g.completed = true;
        self.not_empty.notify_all();
    }

    /// Record a producer error; it is handed to the consumer after queued items.
    pub fn fail(&self, error: IngestionError) {
        let mut g = self.state.lock().expect("queue mutex poisoned");
        if g.error.is_none() {
            g.error = Some(error);
        }
        g.completed = true;
        self.not_empty.notify_all();
    }

    /// Consumer side: drop queued items and wake a blocked producer.
    pub fn close(&self) {
        let mut g = self.state.lock().expect("queue mutex poisoned");
        g.closed = true;
        g.items.clear();
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().expect("queue mutex poisoned").closed
    }

    /// Wait up to `timeout` for the next item or a terminal state.
    pub fn poll(&self, timeout: Duration) -> Poll<T> {
        let g = self.state.lock().expect("queue mutex poisoned");
        let (mut g, _) = self
            .not_empty
            .wait_timeout_while(g, timeout, |s| s.items.is_empty() && !s.completed && !s.closed)
            .expect("queue mutex poisoned");

        if let Some(item) = g.items.pop_front() {
            self.not_full.notify_one();
            return Poll::Item(item);
        }
        if let Some(err) = g.error.take() {
            return Poll::Failed(err);
        }
        if g.completed || g.closed {
            return Poll::Finished;
        }
        Poll::TimedOut
    }
}
