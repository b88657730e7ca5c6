use thiserror::Error;

/// Errors produced by the transport stream muxer and packet readers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TsError {
    /// PID outside the range usable for elementary streams, or reserved by the muxer.
    #[error("invalid PID: 0x{0:04X}")]
    InvalidPid(u16),

    #[error("PID 0x{0:04X} is already registered")]
    DuplicatePid(u16),

    #[error("PID 0x{0:04X} is not a registered elementary stream")]
    UnknownPid(u16),

    #[error("no elementary streams registered")]
    NoElementaryStreams,

    /// PES packet does not fit the 16-bit `PES_packet_length` field.
    #[error("PES payload too large: {0} bytes")]
    PesTooLarge(usize),

    #[error("insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("invalid packet size: {0}")]
    InvalidPacketSize(usize),

    #[error("invalid sync byte: 0x{0:02X}")]
    InvalidSyncByte(u8),

    #[error("invalid PES start code")]
    InvalidPesStartCode,

    #[error("invalid PTS/DTS flags: {0:#04b}")]
    InvalidPtsDtsFlags(u8),

    #[error("invalid table id: expected 0x{expected:02X}, got 0x{actual:02X}")]
    InvalidTableId { expected: u8, actual: u8 },

    #[error("invalid section length: {0}")]
    InvalidSectionLength(u16),

    #[error("CRC mismatch in section with table id 0x{table_id:02X}")]
    CrcMismatch { table_id: u8 },

    #[error("continuity error on PID 0x{pid:04X}: expected {expected}, got {actual}")]
    ContinuityError { pid: u16, expected: u8, actual: u8 },
}
