//! MPEG-2 Transport Stream muxing for a single program.
//!
//! [`TsMuxer`] packs PAT/PMT sections and PES packets into 188-byte transport
//! packets, tracking continuity counters per PID and retransmitting the
//! tables periodically. [`reader::read_ts`] parses such a stream back and is
//! used to check muxer output.

pub mod adaptation_field;
pub mod error;
pub mod muxer;
pub mod packet;
pub mod pes;
pub mod psi;
pub mod reader;

pub use adaptation_field::{AdaptationField, Pcr};
pub use error::TsError;
pub use muxer::{MuxerConfig, MuxerData, MuxerStats, TsMuxer};
pub use packet::{PACKET_SIZE, PID_NULL, PID_PAT, TsPacketRef};
pub use pes::PesHeader;
pub use psi::{ElementaryStream, Pat, Pmt, StreamType, mpeg2_crc32};
pub use reader::{PesPacket, TsContents, read_ts};

/// Result type for TS muxing and parsing operations
pub type Result<T> = std::result::Result<T, TsError>;
