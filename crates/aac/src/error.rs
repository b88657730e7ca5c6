use thiserror::Error;

/// Errors produced while building or reading ADTS headers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdtsError {
    /// The framed length does not fit the 13-bit `frame_length` field.
    #[error("ADTS frame too large: {frame_length} bytes (max 8191)")]
    FrameTooLarge { frame_length: usize },

    #[error("invalid ADTS sync word")]
    InvalidSyncWord,

    #[error("insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, AdtsError>;
