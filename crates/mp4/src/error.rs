//! Error types for fragmented MP4 parsing and sample extraction.

use thiserror::Error;

use crate::box_utils::fourcc_to_string;

/// Errors that can occur while walking an ISOBMFF box tree or slicing samples
/// out of a fragment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Mp4Error {
    /// A box header declares a size that is inconsistent with the bytes available.
    #[error("malformed box '{}' at offset {offset}: {reason}", fourcc_to_string(.fourcc))]
    MalformedBox {
        /// FourCC of the offending box (zeroed when the header itself is cut short).
        fourcc: [u8; 4],
        /// Absolute offset of the box header in the input buffer.
        offset: usize,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// A box path was requested but never matched.
    #[error("box path not found: {path}")]
    BoxPathNotFound {
        /// The requested path rendered as `moof/traf/tfhd`.
        path: String,
    },

    /// A box needed to process the fragment is absent.
    #[error("missing required box '{}'", fourcc_to_string(.0))]
    MissingRequiredBox([u8; 4]),

    /// A box body is shorter than its fields require.
    #[error("truncated '{}' box: expected {expected} bytes, got {actual}", fourcc_to_string(.fourcc))]
    Truncated {
        fourcc: [u8; 4],
        expected: usize,
        actual: usize,
    },

    /// `trun` declares zero samples.
    #[error("sample table is empty")]
    EmptySampleTable,

    /// The sample sizes in `trun` do not add up to the `mdat` payload length.
    #[error("sample size mismatch: trun declares {expected} bytes, mdat holds {actual}")]
    SampleSizeMismatch { expected: u64, actual: u64 },

    /// A sample has neither a per-sample duration nor a `tfhd` default.
    #[error("sample {index} has no duration and tfhd carries no default")]
    MissingSampleDuration { index: usize },

    /// A sample has neither a per-sample size nor a `tfhd` default.
    #[error("sample {index} has no size and tfhd carries no default")]
    MissingSampleSize { index: usize },

    /// `mvhd` declares a zero timescale.
    #[error("invalid timescale: 0")]
    InvalidTimescale,
}

/// Result type alias for MP4 operations.
pub type Result<T> = std::result::Result<T, Mp4Error>;
