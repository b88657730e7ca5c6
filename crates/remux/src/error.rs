use std::io;

use aac::AdtsError;
use mp4::Mp4Error;
use pipeline_common::PipelineError;
use thiserror::Error;
use ts::TsError;

/// Failure while handing data to the transport stream side.
#[derive(Error, Debug)]
pub enum MuxWriteError {
    #[error("TS muxer error: {0}")]
    Ts(#[from] TsError),

    #[error("TS sink I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors produced by a remux run
#[derive(Error, Debug)]
pub enum RemuxError {
    #[error("Container error: {0}")]
    Mp4(#[from] Mp4Error),

    #[error("ADTS framing error: {0}")]
    Adts(#[from] AdtsError),

    #[error("Mux write error: {0}")]
    MuxWrite(#[from] MuxWriteError),

    #[error("ADTS sink I/O error: {0}")]
    SinkIo(#[source] io::Error),

    #[error("Remux was cancelled")]
    Cancelled,

    #[error("Pipeline error: {0}")]
    Pipeline(PipelineError),
}

impl From<PipelineError> for RemuxError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::Cancelled => RemuxError::Cancelled,
            other => RemuxError::Pipeline(other),
        }
    }
}

impl RemuxError {
    /// Short, stable name of the failure category, suitable for exit
    /// diagnostics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RemuxError::Mp4(err) => match err {
                Mp4Error::MalformedBox { .. } => "MalformedBox",
                Mp4Error::BoxPathNotFound { .. } => "BoxPathNotFound",
                Mp4Error::MissingRequiredBox(_) => "MissingRequiredBox",
                Mp4Error::Truncated { .. } => "Truncated",
                Mp4Error::EmptySampleTable => "EmptySampleTable",
                Mp4Error::SampleSizeMismatch { .. } => "SampleSizeMismatch",
                Mp4Error::MissingSampleDuration { .. } => "MissingSampleDuration",
                Mp4Error::MissingSampleSize { .. } => "MissingSampleSize",
                Mp4Error::InvalidTimescale => "InvalidTimescale",
            },
            RemuxError::Adts(err) => match err {
                AdtsError::FrameTooLarge { .. } => "FrameTooLarge",
                AdtsError::InvalidSyncWord => "InvalidSyncWord",
                AdtsError::InsufficientData { .. } => "InsufficientData",
            },
            RemuxError::MuxWrite(_) => "MuxWriteError",
            RemuxError::SinkIo(_) => "SinkIo",
            RemuxError::Cancelled => "Cancelled",
            RemuxError::Pipeline(err) => match err {
                PipelineError::Io(_) => "Io",
                PipelineError::Cancelled => "Cancelled",
                PipelineError::ChannelClosed(_) => "ChannelClosed",
                PipelineError::TaskPanicked(_) => "TaskPanicked",
            },
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RemuxError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        let err = RemuxError::from(Mp4Error::SampleSizeMismatch {
            expected: 310,
            actual: 300,
        });
        assert_eq!(err.kind(), "SampleSizeMismatch");

        let err = RemuxError::from(AdtsError::FrameTooLarge { frame_length: 9007 });
        assert_eq!(err.kind(), "FrameTooLarge");

        let err = RemuxError::from(MuxWriteError::from(TsError::UnknownPid(7)));
        assert_eq!(err.kind(), "MuxWriteError");
    }

    #[test]
    fn test_pipeline_cancellation_maps_to_cancelled() {
        assert!(RemuxError::from(PipelineError::Cancelled).is_cancelled());
        let err = RemuxError::from(PipelineError::TaskPanicked("boom".into()));
        assert_eq!(err.kind(), "TaskPanicked");
    }
}
