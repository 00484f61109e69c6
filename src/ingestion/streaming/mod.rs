//! Bridge from push-style decoders to the pull-based [`RecordSupplier`] contract.
//!
//! A [`PushDecoder`] runs on one background worker and hands each completed record to a
//! [`RowSink`]. Records travel through a [`BoundedQueue`], so a slow consumer stalls the
//! decoder instead of growing memory. The consumer polls with a short timeout and sees, in
//! order: queued records, then the worker's error or completion.
//!
//! Closing a session cancels the worker's token, closes the queue (waking a producer blocked
//! on a full queue) and waits a bounded time for the worker to exit. A worker that does not
//! exit in time is reported as [`IngestionError::WorkerLeak`].

mod queue;

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{IngestionError, IngestionResult};
use crate::types::RawRecord;

use super::options::SourceOptions;
use super::pipeline::RecordSupplier;

pub use queue::{BoundedQueue, Poll};

/// Shared cancellation flag checked by decoders at every record boundary.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receiver of decoded records on the worker side.
pub trait RowSink {
    /// Hand over one record. `Break` means stop decoding and return.
    fn push(&mut self, record: RawRecord) -> ControlFlow<()>;

    fn is_cancelled(&self) -> bool;
}

/// An event-driven decoder that pushes records into a sink.
///
/// Implementations should return promptly after `push` yields `Break`. Returning `Ok(())`
/// signals normal completion.
pub trait PushDecoder: Send + 'static {
    fn decode(self: Box<Self>, sink: &mut dyn RowSink) -> IngestionResult<()>;
}

impl<F> PushDecoder for F
where
    F: FnOnce(&mut dyn RowSink) -> IngestionResult<()> + Send + 'static,
{
    fn decode(self: Box<Self>, sink: &mut dyn RowSink) -> IngestionResult<()> {
        (*self)(sink)
    }
}

struct QueueSink {
    queue: Arc<BoundedQueue<RawRecord>>,
    token: CancellationToken,
}

impl RowSink for QueueSink {
    fn push(&mut self, record: RawRecord) -> ControlFlow<()> {
        if self.token.is_cancelled() || !self.queue.put(record) {
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Sizing and timing for a [`StreamingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingConfig {
    pub queue_capacity: usize,
    pub poll_interval: Duration,
    pub close_timeout: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self::from(&SourceOptions::default())
    }
}

impl From<&SourceOptions> for StreamingConfig {
    fn from(options: &SourceOptions) -> Self {
        Self {
            queue_capacity: options.queue_capacity.max(1),
            poll_interval: options.poll_interval(),
            close_timeout: options.close_timeout(),
        }
    }
}

/// One worker, one queue, bound to a single iteration.
pub struct StreamingSession {
    queue: Arc<BoundedQueue<RawRecord>>,
    token: CancellationToken,
    worker: Option<JoinHandle<()>>,
    config: StreamingConfig,
    done: bool,
}

impl StreamingSession {
    /// Spawn the worker and start decoding.
    pub fn start(decoder: Box<dyn PushDecoder>, config: StreamingConfig) -> IngestionResult<Self> {
        let queue = Arc::new(BoundedQueue::new(config.queue_capacity));
        let token = CancellationToken::new();

        let worker = {
            let queue = queue.clone();
            let token = token.clone();
            thread::Builder::new()
                .name("tabular-ingest-stream".to_string())
                .spawn(move || {
                    let mut sink = QueueSink {
                        queue: queue.clone(),
                        token: token.clone(),
                    };
                    match decoder.decode(&mut sink) {
                        Ok(()) => queue.finish(),
                        Err(_) if token.is_cancelled() => queue.finish(),
                        Err(e) => queue.fail(e),
                    }
                    tracing::debug!(cancelled = token.is_cancelled(), "streaming worker exiting");
                })?
        };
        tracing::debug!(capacity = config.queue_capacity, "streaming worker started");

        Ok(Self {
            queue,
            token,
            worker: Some(worker),
            config,
            done: false,
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Next record in production order, or `None` once the worker finished.
    pub fn next(&mut self) -> IngestionResult<Option<RawRecord>> {
        if self.done {
            return Ok(None);
        }
        let mut worker_gone = false;
        loop {
            let wait = if worker_gone { Duration::ZERO } else { self.config.poll_interval };
            match self.queue.poll(wait) {
                Poll::Item(record) => return Ok(Some(record)),
                Poll::Finished => {
                    self.done = true;
                    return Ok(None);
                }
                Poll::Failed(e) => {
                    self.done = true;
                    return Err(e);
                }
                Poll::TimedOut if worker_gone => {
                    self.done = true;
                    return Err(IngestionError::StreamingWorker {
                        message: "worker stopped without completing".to_string(),
                    });
                }
                Poll::TimedOut => {
                    // Re-check the queue once more after the worker is seen gone; it may have
                    // finished between the poll and this check.
                    worker_gone = self.worker.as_ref().is_none_or(JoinHandle::is_finished);
                }
            }
        }
    }

    /// Cancel the worker and wait for it to exit, at most the configured close timeout.
    pub fn close(&mut self) -> IngestionResult<()> {
        self.done = true;
        self.token.cancel();
        self.queue.close();

        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        let deadline = Instant::now() + self.config.close_timeout;
        let nap = self.config.poll_interval.min(Duration::from_millis(5));
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                tracing::error!(waited = ?self.config.close_timeout, "streaming worker did not terminate");
                // Kept so a later close or the drop still sees the running worker.
                self.worker = Some(handle);
                return Err(IngestionError::WorkerLeak {
                    waited: self.config.close_timeout,
                });
            }
            thread::sleep(nap);
        }
        handle.join().map_err(|_| IngestionError::StreamingWorker {
            message: "worker panicked".to_string(),
        })
    }
}

impl RecordSupplier for StreamingSession {
    fn next_record(&mut self) -> IngestionResult<Option<RawRecord>> {
        self.next()
    }

    fn close(&mut self) -> IngestionResult<()> {
        StreamingSession::close(self)
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        if self.worker.is_none() {
            return;
        }
        match StreamingSession::close(self) {
            Ok(()) => {}
            Err(e @ IngestionError::WorkerLeak { .. }) if !thread::panicking() => {
                panic!("streaming session dropped with a leaked worker: {e}");
            }
            Err(e) => tracing::warn!(error = %e, "streaming worker ended abnormally"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StreamingConfig {
        StreamingConfig {
            queue_capacity: 4,
            poll_interval: Duration::from_millis(10),
            close_timeout: Duration::from_millis(500),
        }
    }

    fn counting_decoder(n: usize) -> Box<dyn PushDecoder> {
        Box::new(move |sink: &mut dyn RowSink| {
            for i in 0..n {
                let record = RawRecord::from_texts(i + 1, [i.to_string()]);
                if sink.push(record).is_break() {
                    break;
                }
            }
            Ok(())
        })
    }

    #[test]
    fn delivers_every_record_in_order() {
        let mut s = StreamingSession::start(counting_decoder(50), config()).unwrap();
        let mut lines = Vec::new();
        while let Some(r) = s.next().unwrap() {
            lines.push(r.line);
        }
        assert_eq!(lines, (1..=50).collect::<Vec<_>>());
        s.close().unwrap();
    }

    #[test]
    fn worker_error_surfaces_on_consumer_after_queued_records() {
        let decoder: Box<dyn PushDecoder> = Box::new(|sink: &mut dyn RowSink| {
            let _ = sink.push(RawRecord::from_texts(1, ["a"]));
            Err(IngestionError::MalformedRecord {
                line: 2,
                message: "bad".into(),
            })
        });
        let mut s = StreamingSession::start(decoder, config()).unwrap();
        assert_eq!(s.next().unwrap().unwrap().line, 1);
        assert!(matches!(s.next(), Err(IngestionError::MalformedRecord { line: 2, .. })));
        assert!(s.next().unwrap().is_none());
    }

    #[test]
    fn panicking_worker_is_reported() {
        let decoder: Box<dyn PushDecoder> = Box::new(|_sink: &mut dyn RowSink| -> IngestionResult<()> {
            panic!("decoder exploded")
        });
        let mut s = StreamingSession::start(decoder, config()).unwrap();
        assert!(matches!(s.next(), Err(IngestionError::StreamingWorker { .. })));
        assert!(matches!(s.close(), Err(IngestionError::StreamingWorker { .. })));
    }

    #[test]
    fn early_close_stops_a_blocked_producer() {
        let mut s = StreamingSession::start(counting_decoder(1_000_000), config()).unwrap();
        assert!(s.next().unwrap().is_some());
        let started = Instant::now();
        s.close().unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn stuck_worker_is_a_leak() {
        let decoder: Box<dyn PushDecoder> = Box::new(|_sink: &mut dyn RowSink| {
            thread::sleep(Duration::from_millis(400));
            Ok(())
        });
        let mut s = StreamingSession::start(
            decoder,
            StreamingConfig {
                close_timeout: Duration::from_millis(20),
                ..config()
            },
        )
        .unwrap();
        assert!(matches!(s.close(), Err(IngestionError::WorkerLeak { .. })));
        // The leak stays visible until the worker really exits.
        assert!(matches!(s.close(), Err(IngestionError::WorkerLeak { .. })));
        thread::sleep(Duration::from_millis(500));
        s.close().unwrap();
    }
}
