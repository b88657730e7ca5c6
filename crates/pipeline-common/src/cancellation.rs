//! Cooperative cancellation shared by every stage of a run.

use std::future::Future;

pub use tokio_util::sync::CancellationToken;

use crate::PipelineError;

/// Drive `fut` to completion unless `token` is cancelled first.
///
/// The future is dropped as soon as cancellation wins, so an I/O call parked
/// on a stalled sink does not keep the run alive.
pub async fn run_until_cancelled<F>(token: &CancellationToken, fut: F) -> Result<F::Output, PipelineError>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(PipelineError::Cancelled),
        output = fut => Ok(output),
    }
}
