//! Bounded single-producer/single-consumer hand-off between a blocking
//! producer and an async consumer.
//!
//! Items are `Result<T, E>`: a producer failure travels to the consumer as a
//! terminal `Err` item. Closing is tied to ownership of the [`QueueSender`]:
//! [`QueueSender::close`] and [`QueueSender::fail_blocking`] consume it, and
//! dropping it closes the queue as well, so the queue closes exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;

use crate::PipelineError;
use crate::cancellation::{CancellationToken, run_until_cancelled};

/// Capacity used when none is configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 5;

/// Counters shared by both ends.
#[derive(Debug, Default)]
pub struct QueueCounters {
    sent: AtomicUsize,
    received: AtomicUsize,
}

impl QueueCounters {
    /// Items accepted by the queue.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Acquire)
    }

    /// Items handed to the consumer.
    pub fn received(&self) -> usize {
        self.received.load(Ordering::Acquire)
    }
}

/// Producer half.
#[derive(Debug)]
pub struct QueueSender<T, E> {
    tx: mpsc::Sender<Result<T, E>>,
    counters: Arc<QueueCounters>,
}

/// Consumer half.
#[derive(Debug)]
pub struct QueueReceiver<T, E> {
    rx: mpsc::Receiver<Result<T, E>>,
    counters: Arc<QueueCounters>,
}

/// Create a queue holding at most `capacity` items (minimum 1).
pub fn bounded<T, E>(capacity: usize) -> (QueueSender<T, E>, QueueReceiver<T, E>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let counters = Arc::new(QueueCounters::default());
    (
        QueueSender {
            tx,
            counters: counters.clone(),
        },
        QueueReceiver { rx, counters },
    )
}

impl<T, E> QueueSender<T, E> {
    /// Enqueue from a blocking context, parking the thread while the queue is
    /// full. Must not be called from inside an async task.
    pub fn send_blocking(&self, item: T) -> Result<(), PipelineError> {
        self.tx
            .blocking_send(Ok(item))
            .map_err(|_| PipelineError::ChannelClosed("queue receiver dropped"))?;
        self.counters.sent.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Deliver a terminal error and close the queue.
    pub fn fail_blocking(self, error: E) -> Result<(), PipelineError> {
        self.tx
            .blocking_send(Err(error))
            .map_err(|_| PipelineError::ChannelClosed("queue receiver dropped"))
    }

    /// Close the queue after the last item.
    pub fn close(self) {}

    pub fn counters(&self) -> &Arc<QueueCounters> {
        &self.counters
    }
}

impl<T, E> QueueReceiver<T, E> {
    /// Wait for the next item.
    ///
    /// `Ok(None)` means the producer closed the queue. Cancellation of
    /// `token` while waiting yields [`PipelineError::Cancelled`].
    pub async fn recv(
        &mut self,
        token: &CancellationToken,
    ) -> Result<Option<Result<T, E>>, PipelineError> {
        let item = run_until_cancelled(token, self.rx.recv()).await?;
        if item.is_some() {
            self.counters.received.fetch_add(1, Ordering::AcqRel);
        }
        Ok(item)
    }

    pub fn counters(&self) -> &Arc<QueueCounters> {
        &self.counters
    }
}
