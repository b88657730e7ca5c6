//! One remux run: a blocking producer walking the container and an async
//! consumer framing, muxing and writing, joined by a bounded queue.

use bytes::Bytes;
use mp4::{Frame, Mp4Error};
use pipeline_common::{
    CancellationToken, QueueReceiver, RunCompletionError, StreamerContext, bounded, settle_run,
};
use tokio::io::AsyncWrite;
use tracing::{debug, error, info};

use crate::config::RemuxConfig;
use crate::error::RemuxError;
use crate::mux_adapter::{MuxAdapter, MuxSummary, PTS_CLOCK_HZ};
use crate::producer::{ProducerSummary, produce};

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemuxSummary {
    pub mux: MuxSummary,
    pub producer: ProducerSummary,
}

impl RemuxSummary {
    /// Presentation time span covered by the written frames, first PTS to
    /// last PTS, in seconds.
    pub fn pts_span_seconds(&self) -> f64 {
        match (self.mux.first_pts, self.mux.last_pts) {
            (Some(first), Some(last)) => last.saturating_sub(first) as f64 / PTS_CLOCK_HZ,
            _ => 0.0,
        }
    }
}

/// Remux the fragmented MP4 in `data` into `es_sink` (ADTS) and `ts_sink`
/// (MPEG-TS).
///
/// Both sinks are flushed and shut down before this returns, whether the
/// run succeeded or not. Cancelling `context.token` aborts any pending queue
/// receive or sink write and yields [`RemuxError::Cancelled`].
pub async fn remux<E, T>(
    data: Bytes,
    es_sink: E,
    ts_sink: T,
    config: RemuxConfig,
    context: &StreamerContext,
) -> Result<RemuxSummary, RemuxError>
where
    E: AsyncWrite + Unpin,
    T: AsyncWrite + Unpin,
{
    let token = context.token.clone();
    let (tx, mut rx) = bounded::<Frame, Mp4Error>(config.queue_capacity);
    debug!(
        name = %context.name,
        input_len = data.len(),
        queue_capacity = config.queue_capacity,
        "Starting remux"
    );

    let producer = tokio::task::spawn_blocking(move || produce(data, tx));

    let mut adapter = MuxAdapter::new(config, es_sink, ts_sink, token.clone());
    let drained = consume(&mut rx, &mut adapter, &token).await;
    // a producer parked on a full queue fails its next push instead of waiting
    drop(rx);

    let consumer_result = match drained {
        Ok(()) => adapter.close().await,
        Err(err) => {
            if let Err(close_err) = adapter.close().await {
                debug!(error = %close_err, "Closing sinks after failure also failed");
            }
            Err(err)
        }
    };

    let result = match settle_run(consumer_result, [producer]).await {
        Ok((mux, producers)) => Ok(RemuxSummary {
            mux,
            producer: producers.into_iter().next().unwrap_or_default(),
        }),
        Err(RunCompletionError::Consumer(err)) => Err(err),
        Err(RunCompletionError::Pipeline(err)) => Err(RemuxError::from(err)),
    };

    match &result {
        Ok(summary) => info!(
            name = %context.name,
            frames = summary.mux.frames,
            es_bytes = summary.mux.es_bytes,
            ts_bytes = summary.mux.ts_bytes,
            ts_packets = summary.mux.muxer.packets,
            span_secs = summary.pts_span_seconds(),
            "Remux finished"
        ),
        Err(err) if err.is_cancelled() => info!(name = %context.name, "Remux cancelled"),
        Err(err) => error!(name = %context.name, kind = err.kind(), error = %err, "Remux failed"),
    }
    result
}

async fn consume<E, T>(
    rx: &mut QueueReceiver<Frame, Mp4Error>,
    adapter: &mut MuxAdapter<E, T>,
    token: &CancellationToken,
) -> Result<(), RemuxError>
where
    E: AsyncWrite + Unpin,
    T: AsyncWrite + Unpin,
{
    while let Some(item) = rx.recv(token).await? {
        let frame = item?;
        adapter.push(&frame).await?;
    }
    Ok(())
}
