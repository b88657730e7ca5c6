//! ADTS (Audio Data Transport Stream) header synthesis and parsing.
//!
//! Only one configuration is produced: MPEG-4, AAC LC, no CRC, 44.1 kHz,
//! two channels, VBR buffer fullness and a single raw data block per frame.
//! The 13-bit `frame_length` field (header included) is the only variable
//! part of the header.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{AdtsError, Result};

/// Length of an ADTS header without CRC.
pub const ADTS_HEADER_LEN: usize = 7;

/// Largest value the 13-bit `frame_length` field can carry.
pub const MAX_FRAME_LENGTH: usize = 0x1FFF;

/// Header bytes with a zero frame length.
///
/// ```text
/// FFF      sync word
/// 1        MPEG-4
/// 00       layer
/// 1        protection absent
/// 01       AAC LC
/// 0100     44.1 kHz
/// 0        private bit
/// 010      channel configuration
/// 0000     original/copy, home, copyright id/start
/// 13 bits  frame length
/// 0x7FF    buffer fullness
/// 00       one raw data block
/// ```
const HEADER_TEMPLATE: [u8; ADTS_HEADER_LEN] = [0xFF, 0xF1, 0x50, 0x80, 0x00, 0x1F, 0xFC];

const SAMPLE_RATES: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025, 8_000,
    7_350,
];

/// Build the 7-byte header for a payload of `payload_len` bytes.
pub fn header(payload_len: usize) -> Result<[u8; ADTS_HEADER_LEN]> {
    let frame_length = payload_len.saturating_add(ADTS_HEADER_LEN);
    if frame_length > MAX_FRAME_LENGTH {
        return Err(AdtsError::FrameTooLarge { frame_length });
    }

    let mut h = HEADER_TEMPLATE;
    h[3] |= ((frame_length >> 11) & 0x03) as u8;
    h[4] |= ((frame_length >> 3) & 0xFF) as u8;
    h[5] |= ((frame_length & 0x07) << 5) as u8;
    Ok(h)
}

/// Prefix a raw AAC access unit with its ADTS header.
pub fn frame(payload: &[u8]) -> Result<Bytes> {
    let header = header(payload.len())?;
    let mut out = BytesMut::with_capacity(ADTS_HEADER_LEN + payload.len());
    out.put_slice(&header);
    out.put_slice(payload);
    Ok(out.freeze())
}

/// Decoded fixed and variable ADTS header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// `false` for MPEG-4, `true` for MPEG-2.
    pub mpeg2: bool,
    pub protection_absent: bool,
    /// Audio object type minus one (1 = AAC LC).
    pub profile: u8,
    pub sampling_frequency_index: u8,
    pub channel_configuration: u8,
    /// Whole frame length, header included.
    pub frame_length: u16,
    pub buffer_fullness: u16,
    pub raw_data_blocks: u8,
}

impl AdtsHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ADTS_HEADER_LEN {
            return Err(AdtsError::InsufficientData {
                expected: ADTS_HEADER_LEN,
                actual: data.len(),
            });
        }
        if data[0] != 0xFF || data[1] & 0xF0 != 0xF0 {
            return Err(AdtsError::InvalidSyncWord);
        }

        let header = Self {
            mpeg2: data[1] & 0x08 != 0,
            protection_absent: data[1] & 0x01 != 0,
            profile: data[2] >> 6,
            sampling_frequency_index: (data[2] >> 2) & 0x0F,
            channel_configuration: ((data[2] & 0x01) << 2) | (data[3] >> 6),
            frame_length: (u16::from(data[3] & 0x03) << 11)
                | (u16::from(data[4]) << 3)
                | (u16::from(data[5]) >> 5),
            buffer_fullness: (u16::from(data[5] & 0x1F) << 6) | (u16::from(data[6]) >> 2),
            raw_data_blocks: data[6] & 0x03,
        };

        if !header.protection_absent && data.len() < header.header_len() {
            return Err(AdtsError::InsufficientData {
                expected: header.header_len(),
                actual: data.len(),
            });
        }
        Ok(header)
    }

    /// 7 bytes, or 9 when a CRC follows the fixed header.
    pub fn header_len(&self) -> usize {
        if self.protection_absent { 7 } else { 9 }
    }

    pub fn payload_len(&self) -> usize {
        usize::from(self.frame_length).saturating_sub(self.header_len())
    }

    pub fn sample_rate(&self) -> Option<u32> {
        SAMPLE_RATES
            .get(usize::from(self.sampling_frequency_index))
            .copied()
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_constant_bits() {
        let h = header(0).unwrap();
        assert_eq!(h, [0xFF, 0xF1, 0x50, 0x80, 0x00, 0xFF, 0xFC]);

        let parsed = AdtsHeader::parse(&h).unwrap();
        assert!(!parsed.mpeg2);
        assert!(parsed.protection_absent);
        assert_eq!(parsed.profile, 1);
        assert_eq!(parsed.sample_rate(), Some(44_100));
        assert_eq!(parsed.channel_configuration, 2);
        assert_eq!(parsed.buffer_fullness, 0x7FF);
        assert_eq!(parsed.raw_data_blocks, 0);
    }

    #[test]
    fn test_length_field_every_payload_size() {
        for len in 0..=MAX_FRAME_LENGTH - ADTS_HEADER_LEN {
            let h = header(len).unwrap();
            let parsed = AdtsHeader::parse(&h).unwrap();
            assert_eq!(usize::from(parsed.frame_length), len + 7, "payload {len}");
            assert_eq!(parsed.payload_len(), len);
            // only the length bits may differ from the template
            assert_eq!(h[0..3], HEADER_TEMPLATE[0..3]);
            assert_eq!(h[3] & 0xFC, HEADER_TEMPLATE[3]);
            assert_eq!(h[5] & 0x1F, HEADER_TEMPLATE[5]);
            assert_eq!(h[6], HEADER_TEMPLATE[6]);
        }
    }

    #[test]
    fn test_frame_too_large() {
        assert_eq!(
            header(8185),
            Err(AdtsError::FrameTooLarge { frame_length: 8192 })
        );
        assert_eq!(
            frame(&[0u8; 9000]),
            Err(AdtsError::FrameTooLarge { frame_length: 9007 })
        );
    }

    #[test]
    fn test_frame_prefixes_payload() {
        let framed = frame(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        assert_eq!(framed.len(), 11);
        assert_eq!(&framed[7..], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(AdtsHeader::parse(&framed).unwrap().frame_length, 11);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            AdtsHeader::parse(&[0xFF, 0xF1, 0x50]),
            Err(AdtsError::InsufficientData {
                expected: 7,
                actual: 3
            })
        );
        assert_eq!(
            AdtsHeader::parse(&[0x47, 0xF1, 0x50, 0x80, 0, 0x1F, 0xFC]),
            Err(AdtsError::InvalidSyncWord)
        );
        // protection present needs two CRC bytes
        assert_eq!(
            AdtsHeader::parse(&[0xFF, 0xF0, 0x50, 0x80, 0, 0x1F, 0xFC, 0]),
            Err(AdtsError::InsufficientData {
                expected: 9,
                actual: 8
            })
        );
    }

    proptest! {
        #[test]
        fn prop_frame_round_trips_payload(payload in prop::collection::vec(any::<u8>(), 0..2048)) {
            let framed = frame(&payload).unwrap();
            let parsed = AdtsHeader::parse(&framed).unwrap();
            prop_assert_eq!(usize::from(parsed.frame_length), framed.len());
            prop_assert_eq!(&framed[parsed.header_len()..], payload.as_slice());
        }
    }
}
