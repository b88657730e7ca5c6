//! # Pipeline Common
//!
//! Building blocks shared by the remux pipeline: cancellation, the bounded
//! producer/consumer queue, run settlement and the run context.
//!
//! ## License
//!
//! MIT License

use thiserror::Error;

pub mod cancellation;
mod context;
pub mod queue;
mod run_completion;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cancellation::{CancellationToken, run_until_cancelled};
pub use context::StreamerContext;
pub use queue::{DEFAULT_QUEUE_CAPACITY, QueueCounters, QueueReceiver, QueueSender, bounded};
pub use run_completion::{RunCompletionError, settle_run};

/// Common error type for pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("Pipeline task panicked: {0}")]
    TaskPanicked(String),
}
