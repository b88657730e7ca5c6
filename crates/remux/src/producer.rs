//! Container side of the pipeline: parses the input and feeds frames into
//! the queue. Runs on the blocking pool.

use bytes::Bytes;
use mp4::{Fragment, Frame, Mp4Error};
use pipeline_common::{PipelineError, QueueSender};
use tracing::debug;

/// What the producer managed to hand over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerSummary {
    pub frames_sent: usize,
    /// Whether the queue was closed with an error item.
    pub failed: bool,
}

/// Parse `data` and push every frame of its first fragment into `tx`.
///
/// Container errors are delivered through the queue and do not fail the
/// task. The task only fails when the consumer has gone away.
pub fn produce(data: Bytes, tx: QueueSender<Frame, Mp4Error>) -> Result<ProducerSummary, PipelineError> {
    let frames = match Fragment::parse(&data).and_then(|fragment| {
        debug!(
            track_id = fragment.track_id,
            timescale = fragment.timing.timescale,
            samples = fragment.sample_count(),
            mdat_len = fragment.mdat_len(),
            "Parsed fragment"
        );
        fragment.into_frames()
    }) {
        Ok(frames) => frames,
        Err(err) => {
            tx.fail_blocking(err)?;
            return Ok(ProducerSummary {
                frames_sent: 0,
                failed: true,
            });
        }
    };

    let mut summary = ProducerSummary::default();
    for frame in frames {
        match frame {
            Ok(frame) => {
                tx.send_blocking(frame)?;
                summary.frames_sent += 1;
            }
            Err(err) => {
                tx.fail_blocking(err)?;
                summary.failed = true;
                return Ok(summary);
            }
        }
    }

    tx.close();
    debug!(frames = summary.frames_sent, "Producer finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mp4::test_support::FragmentBuilder;
    use pipeline_common::{CancellationToken, bounded};

    #[tokio::test]
    async fn test_produces_all_frames_then_closes() {
        let data = FragmentBuilder::new(44100)
            .sample(&[1; 100])
            .sample(&[2; 120])
            .sample(&[3; 90])
            .build();
        let (tx, mut rx) = bounded(2);
        let task = tokio::task::spawn_blocking(move || produce(data, tx));

        let token = CancellationToken::new();
        let mut lengths = Vec::new();
        while let Some(item) = rx.recv(&token).await.unwrap() {
            lengths.push(item.unwrap().data.len());
        }
        assert_eq!(lengths, vec![100, 120, 90]);

        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.frames_sent, 3);
        assert!(!summary.failed);
    }

    #[tokio::test]
    async fn test_parse_error_is_a_queue_item() {
        let data = FragmentBuilder::new(44100)
            .sample(&[0; 10])
            .mdat(vec![0; 11])
            .build();
        let (tx, mut rx) = bounded(2);
        let task = tokio::task::spawn_blocking(move || produce(data, tx));

        let token = CancellationToken::new();
        assert!(matches!(
            rx.recv(&token).await.unwrap(),
            Some(Err(Mp4Error::SampleSizeMismatch {
                expected: 10,
                actual: 11
            }))
        ));
        assert!(rx.recv(&token).await.unwrap().is_none());

        let summary = task.await.unwrap().unwrap();
        assert!(summary.failed);
        assert_eq!(summary.frames_sent, 0);
    }

    #[tokio::test]
    async fn test_dropped_consumer_fails_task() {
        let mut builder = FragmentBuilder::new(48000);
        for i in 0..8 {
            builder = builder.sample(&[i; 16]);
        }
        let (tx, rx) = bounded(1);
        drop(rx);

        let result = tokio::task::spawn_blocking(move || produce(builder.build(), tx))
            .await
            .unwrap();
        assert!(matches!(result, Err(PipelineError::ChannelClosed(_))));
    }
}
