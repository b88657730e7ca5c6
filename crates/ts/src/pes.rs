use bytes::{BufMut, BytesMut};

use crate::{Result, TsError};

/// Audio stream ID range (0xC0..=0xDF)
pub const STREAM_ID_AUDIO_MIN: u8 = 0xC0;
/// Audio stream ID range (0xC0..=0xDF)
pub const STREAM_ID_AUDIO_MAX: u8 = 0xDF;

/// Mask for 33-bit PTS/DTS values.
pub const TIMESTAMP_MASK: u64 = 0x1_FFFF_FFFF;

/// Bytes between `PES_packet_length` and the payload when only a PTS is present.
const PTS_ONLY_HEADER_TAIL: usize = 3 + 5;

/// Encode a 33-bit timestamp with the given 4-bit prefix (`0b0010` for PTS only).
///
/// Layout: `[prefix(4) | ts32..30 | 1][ts29..22][ts21..15 | 1][ts14..7][ts6..0 | 1]`
pub fn encode_timestamp(prefix: u8, ts: u64) -> [u8; 5] {
    let ts = ts & TIMESTAMP_MASK;
    [
        (prefix << 4) | (((ts >> 29) & 0x0E) as u8) | 0x01,
        (ts >> 22) as u8,
        (((ts >> 14) & 0xFE) as u8) | 0x01,
        (ts >> 7) as u8,
        (((ts << 1) & 0xFE) as u8) | 0x01,
    ]
}

/// Decode a 33-bit timestamp from 5 bytes.
pub fn decode_timestamp(data: &[u8]) -> Option<u64> {
    if data.len() < 5 {
        return None;
    }
    Some(
        ((u64::from(data[0]) >> 1) & 0x07) << 30
            | u64::from(data[1]) << 22
            | ((u64::from(data[2]) >> 1) & 0x7F) << 15
            | u64::from(data[3]) << 7
            | ((u64::from(data[4]) >> 1) & 0x7F),
    )
}

/// PES header fields the muxer writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PesHeader {
    pub stream_id: u8,
    /// 90 kHz presentation timestamp; masked to 33 bits when written.
    pub pts: Option<u64>,
}

impl PesHeader {
    pub fn audio(stream_id: u8, pts: u64) -> Self {
        Self {
            stream_id,
            pts: Some(pts),
        }
    }

    /// Header length in bytes, start code included.
    pub fn encoded_len(&self) -> usize {
        9 + if self.pts.is_some() { 5 } else { 0 }
    }

    /// Write the header for a payload of `payload_len` bytes.
    pub fn write(&self, buf: &mut BytesMut, payload_len: usize) -> Result<()> {
        let tail = if self.pts.is_some() {
            PTS_ONLY_HEADER_TAIL
        } else {
            3
        };
        let packet_length = u16::try_from(tail + payload_len)
            .map_err(|_| TsError::PesTooLarge(payload_len))?;

        buf.put_slice(&[0x00, 0x00, 0x01, self.stream_id]);
        buf.put_u16(packet_length);
        // '10' marker, no scrambling, no priority, no alignment, no copyright, original
        buf.put_u8(0x80);
        match self.pts {
            Some(pts) => {
                buf.put_u8(0x80);
                buf.put_u8(5);
                buf.put_slice(&encode_timestamp(0b0010, pts));
            }
            None => {
                buf.put_u8(0x00);
                buf.put_u8(0);
            }
        }
        Ok(())
    }

    /// Parse a PES header starting at the `00 00 01` start code.
    ///
    /// Returns the header, the declared `PES_packet_length` and the offset of
    /// the elementary stream payload.
    pub fn parse(data: &[u8]) -> Result<(Self, u16, usize)> {
        if data.len() < 9 {
            return Err(TsError::InsufficientData {
                expected: 9,
                actual: data.len(),
            });
        }
        if data[0..3] != [0x00, 0x00, 0x01] {
            return Err(TsError::InvalidPesStartCode);
        }

        let stream_id = data[3];
        let packet_length = u16::from_be_bytes([data[4], data[5]]);
        let pts_dts_flags = (data[7] >> 6) & 0x03;
        let payload_offset = 9 + usize::from(data[8]);

        let pts = match pts_dts_flags {
            0b00 => None,
            0b10 | 0b11 => {
                if data.len() < 14 {
                    return Err(TsError::InsufficientData {
                        expected: 14,
                        actual: data.len(),
                    });
                }
                decode_timestamp(&data[9..14])
            }
            flags => return Err(TsError::InvalidPtsDtsFlags(flags)),
        };
        if payload_offset > data.len() {
            return Err(TsError::InsufficientData {
                expected: payload_offset,
                actual: data.len(),
            });
        }

        Ok((Self { stream_id, pts }, packet_length, payload_offset))
    }

    pub fn is_audio(&self) -> bool {
        (STREAM_ID_AUDIO_MIN..=STREAM_ID_AUDIO_MAX).contains(&self.stream_id)
    }

    pub fn pts_seconds(&self) -> Option<f64> {
        self.pts.map(|pts| pts as f64 / 90_000.0)
    }
}
