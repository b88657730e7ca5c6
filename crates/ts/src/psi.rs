//! Program Specific Information: PAT and PMT sections with their MPEG-2 CRC.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Result, TsError};

pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;

/// MPEG-2 CRC-32: polynomial 0x04C11DB7, init 0xFFFFFFFF, no reflection, no final XOR.
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ 0x04C1_1DB7
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

pub fn mpeg2_crc32(data: &[u8]) -> u32 {
    data.iter().fold(0xFFFF_FFFF, |crc, &byte| {
        (crc << 8) ^ CRC32_TABLE[((crc >> 24) as u8 ^ byte) as usize]
    })
}

/// Stream type as carried in the PMT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamType(pub u8);

impl StreamType {
    /// ISO/IEC 13818-7 audio with ADTS transport syntax.
    pub const AAC_ADTS: Self = Self(0x0F);
    /// ISO/IEC 14496-3 audio with LATM transport syntax.
    pub const AAC_LATM: Self = Self(0x11);
    pub const MPEG1_AUDIO: Self = Self(0x03);
    pub const MPEG2_AUDIO: Self = Self(0x04);

    pub fn is_audio(self) -> bool {
        matches!(self.0, 0x03 | 0x04 | 0x0F | 0x11 | 0x81)
    }
}

/// An elementary stream entry of the PMT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementaryStream {
    pub pid: u16,
    pub stream_type: StreamType,
}

/// Program Association Table with a single section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pat {
    pub transport_stream_id: u16,
    /// `(program_number, pmt_pid)` pairs.
    pub programs: Vec<(u16, u16)>,
}

/// Program Map Table for one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pmt {
    pub program_number: u16,
    /// `0x1FFF` when the program carries no PCR.
    pub pcr_pid: u16,
    pub streams: Vec<ElementaryStream>,
}

/// Syntax-section framing shared by PAT and PMT: header, body and CRC.
fn write_section(table_id: u8, table_id_extension: u16, body: &[u8]) -> Bytes {
    // 5 bytes of extension/version/section numbers + body + CRC
    let section_length = (5 + body.len() + 4) as u16;
    let mut section = BytesMut::with_capacity(3 + usize::from(section_length));
    section.put_u8(table_id);
    section.put_u16(0xB000 | section_length);
    section.put_u16(table_id_extension);
    // reserved '11', version 0, current_next_indicator 1
    section.put_u8(0xC1);
    section.put_u8(0x00);
    section.put_u8(0x00);
    section.put_slice(body);
    let crc = mpeg2_crc32(&section);
    section.put_u32(crc);
    section.freeze()
}

/// Validate table id, length and CRC, and return the body between the
/// section header and the CRC together with the table id extension.
fn read_section(data: &[u8], table_id: u8) -> Result<(u16, &[u8])> {
    if data.len() < 3 {
        return Err(TsError::InsufficientData {
            expected: 3,
            actual: data.len(),
        });
    }
    if data[0] != table_id {
        return Err(TsError::InvalidTableId {
            expected: table_id,
            actual: data[0],
        });
    }
    let section_length = u16::from_be_bytes([data[1], data[2]]) & 0x0FFF;
    if section_length < 9 || section_length > 1021 {
        return Err(TsError::InvalidSectionLength(section_length));
    }
    let total = 3 + usize::from(section_length);
    if data.len() < total {
        return Err(TsError::InsufficientData {
            expected: total,
            actual: data.len(),
        });
    }
    let section = &data[..total];
    if mpeg2_crc32(section) != 0 {
        return Err(TsError::CrcMismatch { table_id });
    }
    let extension = u16::from_be_bytes([section[3], section[4]]);
    Ok((extension, &section[8..total - 4]))
}

impl Pat {
    pub fn to_section(&self) -> Bytes {
        let mut body = BytesMut::with_capacity(self.programs.len() * 4);
        for &(program_number, pmt_pid) in &self.programs {
            body.put_u16(program_number);
            body.put_u16(0xE000 | (pmt_pid & 0x1FFF));
        }
        write_section(TABLE_ID_PAT, self.transport_stream_id, &body)
    }

    /// Parse a section starting at `table_id` (pointer field already skipped).
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (transport_stream_id, body) = read_section(data, TABLE_ID_PAT)?;
        let programs = body
            .chunks_exact(4)
            .map(|entry| {
                (
                    u16::from_be_bytes([entry[0], entry[1]]),
                    u16::from_be_bytes([entry[2], entry[3]]) & 0x1FFF,
                )
            })
            .collect();
        Ok(Self {
            transport_stream_id,
            programs,
        })
    }
}

impl Pmt {
    pub fn to_section(&self) -> Bytes {
        let mut body = BytesMut::with_capacity(4 + self.streams.len() * 5);
        body.put_u16(0xE000 | (self.pcr_pid & 0x1FFF));
        // no program descriptors
        body.put_u16(0xF000);
        for stream in &self.streams {
            body.put_u8(stream.stream_type.0);
            body.put_u16(0xE000 | (stream.pid & 0x1FFF));
            body.put_u16(0xF000);
        }
        write_section(TABLE_ID_PMT, self.program_number, &body)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let (program_number, body) = read_section(data, TABLE_ID_PMT)?;
        if body.len() < 4 {
            return Err(TsError::InsufficientData {
                expected: 4,
                actual: body.len(),
            });
        }
        let pcr_pid = u16::from_be_bytes([body[0], body[1]]) & 0x1FFF;
        let program_info_length = usize::from(u16::from_be_bytes([body[2], body[3]]) & 0x0FFF);

        let mut streams = Vec::new();
        let mut offset = 4 + program_info_length;
        while offset + 5 <= body.len() {
            let entry = &body[offset..offset + 5];
            let es_info_length = usize::from(u16::from_be_bytes([entry[3], entry[4]]) & 0x0FFF);
            streams.push(ElementaryStream {
                stream_type: StreamType(entry[0]),
                pid: u16::from_be_bytes([entry[1], entry[2]]) & 0x1FFF,
            });
            offset += 5 + es_info_length;
        }

        Ok(Self {
            program_number,
            pcr_pid,
            streams,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_known_vector() {
        assert_eq!(mpeg2_crc32(b"123456789"), 0x0376_E6E7);
        assert_eq!(mpeg2_crc32(b""), 0xFFFF_FFFF);
    }

    #[test]
    fn test_pat_section_bytes() {
        let pat = Pat {
            transport_stream_id: 1,
            programs: vec![(1, 0x1000)],
        };
        let section = pat.to_section();
        assert_eq!(
            &section[..12],
            &[0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00, 0x00, 0x01, 0xF0, 0x00]
        );
        assert_eq!(section.len(), 16);
        assert_eq!(mpeg2_crc32(&section), 0);
        assert_eq!(Pat::parse(&section).unwrap(), pat);
    }

    #[test]
    fn test_pmt_round_trip() {
        let pmt = Pmt {
            program_number: 1,
            pcr_pid: 256,
            streams: vec![ElementaryStream {
                pid: 256,
                stream_type: StreamType::AAC_ADTS,
            }],
        };
        let section = pmt.to_section();
        assert_eq!(section.len(), 3 + 9 + 5 + 4);
        assert_eq!(&section[8..12], &[0xE1, 0x00, 0xF0, 0x00]);
        assert_eq!(&section[12..17], &[0x0F, 0xE1, 0x00, 0xF0, 0x00]);
        assert_eq!(Pmt::parse(&section).unwrap(), pmt);
        assert!(pmt.streams[0].stream_type.is_audio());
    }

    #[test]
    fn test_corrupt_section_fails_crc() {
        let mut section = Pat {
            transport_stream_id: 1,
            programs: vec![(1, 0x1000)],
        }
        .to_section()
        .to_vec();
        section[9] ^= 0x01;
        assert_eq!(
            Pat::parse(&section),
            Err(TsError::CrcMismatch { table_id: 0x00 })
        );
    }

    #[test]
    fn test_wrong_table_id() {
        let section = Pat {
            transport_stream_id: 1,
            programs: vec![],
        }
        .to_section();
        assert_eq!(
            Pmt::parse(&section),
            Err(TsError::InvalidTableId {
                expected: 0x02,
                actual: 0x00
            })
        );
    }
}
