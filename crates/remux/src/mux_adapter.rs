//! Turns frames into sink writes: each frame is ADTS-framed and written to
//! the elementary stream sink, then wrapped in a PES and packed into the
//! transport stream sink.
//!
//! Every sink call races the run's cancellation token, so a sink that stops
//! accepting data cannot keep the run alive.

use bytes::{Bytes, BytesMut};
use mp4::Frame;
use pipeline_common::{CancellationToken, run_until_cancelled};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};
use ts::pes::TIMESTAMP_MASK;
use ts::{AdaptationField, ElementaryStream, MuxerData, MuxerStats, Pcr, PesHeader, StreamType, TsMuxer};

use crate::config::RemuxConfig;
use crate::error::{MuxWriteError, RemuxError};

/// 90 kHz clock used for PTS and the PCR base.
pub const PTS_CLOCK_HZ: f64 = 90_000.0;

/// Convert a presentation time in seconds to a 33-bit 90 kHz timestamp.
pub fn pts_from_seconds(time: f64) -> u64 {
    ((time * PTS_CLOCK_HZ).round() as u64) & TIMESTAMP_MASK
}

/// Totals reported once both sinks are closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MuxSummary {
    pub frames: usize,
    pub es_bytes: u64,
    pub ts_bytes: u64,
    pub first_pts: Option<u64>,
    pub last_pts: Option<u64>,
    pub muxer: MuxerStats,
}

pub struct MuxAdapter<E, T> {
    config: RemuxConfig,
    muxer: TsMuxer,
    es_sink: E,
    ts_sink: T,
    token: CancellationToken,
    buf: BytesMut,
    started: bool,
    summary: MuxSummary,
}

impl<E, T> MuxAdapter<E, T>
where
    E: AsyncWrite + Unpin,
    T: AsyncWrite + Unpin,
{
    pub fn new(config: RemuxConfig, es_sink: E, ts_sink: T, token: CancellationToken) -> Self {
        Self {
            muxer: TsMuxer::new(config.muxer_config()),
            config,
            es_sink,
            ts_sink,
            token,
            buf: BytesMut::with_capacity(16 * ts::PACKET_SIZE),
            started: false,
            summary: MuxSummary::default(),
        }
    }

    pub fn summary(&self) -> &MuxSummary {
        &self.summary
    }

    /// Register the stream and write the initial PAT/PMT.
    async fn start(&mut self) -> Result<(), RemuxError> {
        let pid = self.config.pid;
        self.muxer
            .add_elementary_stream(ElementaryStream {
                pid,
                stream_type: StreamType::AAC_ADTS,
            })
            .map_err(MuxWriteError::from)?;
        self.muxer.set_pcr_pid(pid).map_err(MuxWriteError::from)?;
        self.muxer
            .write_tables(&mut self.buf)
            .map_err(MuxWriteError::from)?;
        self.flush_ts().await?;

        self.started = true;
        debug!(pid, pmt_pid = self.config.pmt_pid, "Registered audio stream");
        Ok(())
    }

    /// Frame, write and mux one frame.
    ///
    /// Framing happens before any write, so an oversized payload leaves both
    /// sinks untouched.
    pub async fn push(&mut self, frame: &Frame) -> Result<(), RemuxError> {
        let framed = aac::frame(&frame.data)?;

        if !self.started {
            self.start().await?;
        }

        write_cancellable(&self.token, &mut self.es_sink, &framed)
            .await?
            .map_err(RemuxError::SinkIo)?;
        self.summary.es_bytes += framed.len() as u64;

        let pts = pts_from_seconds(frame.time);
        let adaptation_field = (self.summary.frames == 0)
            .then(|| AdaptationField::random_access_with_pcr(Pcr::from_90khz(pts)));
        let data = MuxerData {
            pid: self.config.pid,
            adaptation_field,
            pes_header: PesHeader::audio(self.config.stream_id, pts),
            payload: framed,
        };
        self.muxer
            .write_data(&data, &mut self.buf)
            .map_err(MuxWriteError::from)?;
        self.flush_ts().await?;

        trace!(index = frame.index, time = frame.time, pts, "Muxed frame");
        self.summary.frames += 1;
        self.summary.first_pts.get_or_insert(pts);
        self.summary.last_pts = Some(pts);
        Ok(())
    }

    async fn flush_ts(&mut self) -> Result<(), RemuxError> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let packets: Bytes = self.buf.split().freeze();
        write_cancellable(&self.token, &mut self.ts_sink, &packets)
            .await?
            .map_err(MuxWriteError::from)?;
        self.summary.ts_bytes += packets.len() as u64;
        Ok(())
    }

    /// Flush and shut down both sinks.
    ///
    /// Both are closed even when the first one fails; the first failure is
    /// returned.
    pub async fn close(&mut self) -> Result<MuxSummary, RemuxError> {
        let es = run_until_cancelled(&self.token, shutdown(&mut self.es_sink))
            .await
            .map_err(RemuxError::from)
            .and_then(|result| result.map_err(RemuxError::SinkIo));
        let ts = run_until_cancelled(&self.token, shutdown(&mut self.ts_sink))
            .await
            .map_err(RemuxError::from)
            .and_then(|result| result.map_err(|err| MuxWriteError::from(err).into()));

        es?;
        ts?;
        self.summary.muxer = self.muxer.stats();
        Ok(self.summary)
    }
}

async fn write_cancellable<W>(
    token: &CancellationToken,
    sink: &mut W,
    bytes: &[u8],
) -> Result<std::io::Result<()>, RemuxError>
where
    W: AsyncWrite + Unpin,
{
    Ok(run_until_cancelled(token, sink.write_all(bytes)).await?)
}

async fn shutdown<W>(sink: &mut W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    sink.flush().await?;
    sink.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn frame(index: usize, time: f64, len: usize) -> Frame {
        Frame {
            index,
            time,
            data: Bytes::from(vec![index as u8; len]),
        }
    }

    #[test]
    fn test_pts_rounding_and_wrap() {
        assert_eq!(pts_from_seconds(0.0), 0);
        assert_eq!(pts_from_seconds(1024.0 / 44100.0), 2090);
        assert_eq!(pts_from_seconds(1.0), 90_000);
        // 2^33 ticks is ~26.5 hours
        let wrapped = (TIMESTAMP_MASK + 1) as f64 / PTS_CLOCK_HZ;
        assert_eq!(pts_from_seconds(wrapped + 1.0), 90_000);
    }

    #[tokio::test]
    async fn test_first_frame_writes_tables_and_pcr() {
        let mut adapter = MuxAdapter::new(
            RemuxConfig::default(),
            Vec::new(),
            Vec::new(),
            CancellationToken::new(),
        );
        adapter.push(&frame(0, 0.0, 100)).await.unwrap();
        adapter.push(&frame(1, 1024.0 / 44100.0, 120)).await.unwrap();
        let summary = adapter.close().await.unwrap();

        assert_eq!(summary.frames, 2);
        assert_eq!(summary.es_bytes, 100 + 120 + 14);
        assert_eq!(adapter.es_sink.len(), 234);
        assert_eq!(&adapter.es_sink[..2], &[0xFF, 0xF1]);
        assert_eq!(summary.ts_bytes as usize, adapter.ts_sink.len());
        assert_eq!(summary.first_pts, Some(0));
        assert_eq!(summary.last_pts, Some(2090));

        let contents = ts::read_ts(&adapter.ts_sink).unwrap();
        assert_eq!(contents.pes.len(), 2);
        assert!(contents.pes[0].random_access);
        assert_eq!(contents.pes[0].pcr.map(|pcr| pcr.base), Some(0));
        assert!(contents.pes[1].pcr.is_none());
        assert_eq!(contents.pmt.unwrap().pcr_pid, 256);
    }

    #[tokio::test]
    async fn test_oversized_frame_writes_nothing() {
        let mut adapter = MuxAdapter::new(
            RemuxConfig::default(),
            Vec::new(),
            Vec::new(),
            CancellationToken::new(),
        );
        let err = adapter.push(&frame(0, 0.0, 9000)).await.unwrap_err();
        assert_eq!(err.kind(), "FrameTooLarge");
        assert!(adapter.es_sink.is_empty());
        assert!(adapter.ts_sink.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_pid_is_mux_write_error() {
        let mut adapter = MuxAdapter::new(
            RemuxConfig::default().with_pid(0x1FFF),
            Vec::new(),
            Vec::new(),
            CancellationToken::new(),
        );
        let err = adapter.push(&frame(0, 0.0, 10)).await.unwrap_err();
        assert!(matches!(err, RemuxError::MuxWrite(MuxWriteError::Ts(_))));
    }

    #[tokio::test]
    async fn test_cancelled_write_returns_promptly() {
        let token = CancellationToken::new();
        // nobody reads the far end, so the second write stalls
        let (ts_sink, _reader) = tokio::io::duplex(64);
        let mut adapter = MuxAdapter::new(RemuxConfig::default(), Vec::new(), ts_sink, token.clone());
        token.cancel();

        let err = adapter.push(&frame(0, 0.0, 10)).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
