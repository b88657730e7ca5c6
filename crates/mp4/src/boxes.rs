//! Typed decoders for the full boxes a fragment's timing and sample layout
//! live in: `mvhd`, `mfhd`, `tfhd`, `tfdt` and `trun`.
//!
//! Every decoder takes the box body (after the 8-byte header) and checks
//! each field against the remaining length before reading it.

use crate::box_utils::FourCc;
use crate::{Mp4Error, Result};

const TFHD_BASE_DATA_OFFSET_PRESENT: u32 = 0x00_0001;
const TFHD_SAMPLE_DESCRIPTION_INDEX_PRESENT: u32 = 0x00_0002;
const TFHD_DEFAULT_SAMPLE_DURATION_PRESENT: u32 = 0x00_0008;
const TFHD_DEFAULT_SAMPLE_SIZE_PRESENT: u32 = 0x00_0010;
const TFHD_DEFAULT_SAMPLE_FLAGS_PRESENT: u32 = 0x00_0020;
const TFHD_DURATION_IS_EMPTY: u32 = 0x01_0000;
const TFHD_DEFAULT_BASE_IS_MOOF: u32 = 0x02_0000;

const TRUN_DATA_OFFSET_PRESENT: u32 = 0x00_0001;
const TRUN_FIRST_SAMPLE_FLAGS_PRESENT: u32 = 0x00_0004;
const TRUN_SAMPLE_DURATION_PRESENT: u32 = 0x00_0100;
const TRUN_SAMPLE_SIZE_PRESENT: u32 = 0x00_0200;
const TRUN_SAMPLE_FLAGS_PRESENT: u32 = 0x00_0400;
const TRUN_SAMPLE_CTS_OFFSET_PRESENT: u32 = 0x00_0800;

/// Bounds-checked big-endian field reader over a box body.
struct FieldReader<'a> {
    fourcc: FourCc,
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(fourcc: FourCc, data: &'a [u8]) -> Self {
        Self {
            fourcc,
            data,
            pos: 0,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(Mp4Error::Truncated {
                fourcc: self.fourcc,
                expected: end,
                actual: self.data.len(),
            });
        }
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Version byte + 24-bit flags.
    fn full_box_header(&mut self) -> Result<(u8, u32)> {
        let word = self.u32()?;
        Ok(((word >> 24) as u8, word & 0x00FF_FFFF))
    }

    /// Reads a u32 for version 0 and a u64 for version 1.
    fn versioned(&mut self, version: u8) -> Result<u64> {
        if version == 1 {
            self.u64()
        } else {
            self.u32().map(u64::from)
        }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// Movie header; only the timing fields are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovieHeader {
    pub version: u8,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
}

impl MovieHeader {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(*b"mvhd", body);
        let (version, _flags) = r.full_box_header()?;
        let creation_time = r.versioned(version)?;
        let modification_time = r.versioned(version)?;
        let timescale = r.u32()?;
        let duration = r.versioned(version)?;

        if timescale == 0 {
            return Err(Mp4Error::InvalidTimescale);
        }

        Ok(Self {
            version,
            creation_time,
            modification_time,
            timescale,
            duration,
        })
    }
}

/// Movie fragment header (`mfhd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovieFragmentHeader {
    pub sequence_number: u32,
}

impl MovieFragmentHeader {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(*b"mfhd", body);
        r.full_box_header()?;
        Ok(Self {
            sequence_number: r.u32()?,
        })
    }
}

/// Track fragment header (`tfhd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackFragmentHeader {
    pub flags: u32,
    pub track_id: u32,
    pub base_data_offset: Option<u64>,
    pub sample_description_index: Option<u32>,
    pub default_sample_duration: Option<u32>,
    pub default_sample_size: Option<u32>,
    pub default_sample_flags: Option<u32>,
}

impl TrackFragmentHeader {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(*b"tfhd", body);
        let (_version, flags) = r.full_box_header()?;
        let track_id = r.u32()?;

        let base_data_offset = if flags & TFHD_BASE_DATA_OFFSET_PRESENT != 0 {
            Some(r.u64()?)
        } else {
            None
        };
        let mut optional_u32 = |mask: u32| -> Result<Option<u32>> {
            if flags & mask != 0 {
                r.u32().map(Some)
            } else {
                Ok(None)
            }
        };
        let sample_description_index = optional_u32(TFHD_SAMPLE_DESCRIPTION_INDEX_PRESENT)?;
        let default_sample_duration = optional_u32(TFHD_DEFAULT_SAMPLE_DURATION_PRESENT)?;
        let default_sample_size = optional_u32(TFHD_DEFAULT_SAMPLE_SIZE_PRESENT)?;
        let default_sample_flags = optional_u32(TFHD_DEFAULT_SAMPLE_FLAGS_PRESENT)?;

        Ok(Self {
            flags,
            track_id,
            base_data_offset,
            sample_description_index,
            default_sample_duration,
            default_sample_size,
            default_sample_flags,
        })
    }

    pub fn duration_is_empty(&self) -> bool {
        self.flags & TFHD_DURATION_IS_EMPTY != 0
    }

    pub fn default_base_is_moof(&self) -> bool {
        self.flags & TFHD_DEFAULT_BASE_IS_MOOF != 0
    }
}

/// Track fragment base media decode time (`tfdt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackFragmentDecodeTime {
    pub version: u8,
    pub base_media_decode_time: u64,
}

impl TrackFragmentDecodeTime {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(*b"tfdt", body);
        let (version, _flags) = r.full_box_header()?;
        Ok(Self {
            version,
            base_media_decode_time: r.versioned(version)?,
        })
    }
}

/// One raw `trun` entry. Absent fields are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrunEntry {
    pub duration: Option<u32>,
    pub size: Option<u32>,
    pub flags: Option<u32>,
    pub composition_time_offset: Option<u32>,
}

/// Track fragment run (`trun`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRun {
    pub version: u8,
    pub flags: u32,
    pub data_offset: Option<i32>,
    pub first_sample_flags: Option<u32>,
    pub entries: Vec<TrunEntry>,
}

/// Upper bound on the sample count of a `trun` that carries no per-sample
/// fields.
pub const MAX_FIELDLESS_TRUN_SAMPLES: usize = 1 << 20;

impl TrackRun {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(*b"trun", body);
        let (version, flags) = r.full_box_header()?;
        let sample_count = r.u32()? as usize;

        let data_offset = if flags & TRUN_DATA_OFFSET_PRESENT != 0 {
            Some(r.u32()? as i32)
        } else {
            None
        };
        let first_sample_flags = if flags & TRUN_FIRST_SAMPLE_FLAGS_PRESENT != 0 {
            Some(r.u32()?)
        } else {
            None
        };

        let per_sample_masks = [
            TRUN_SAMPLE_DURATION_PRESENT,
            TRUN_SAMPLE_SIZE_PRESENT,
            TRUN_SAMPLE_FLAGS_PRESENT,
            TRUN_SAMPLE_CTS_OFFSET_PRESENT,
        ];
        let entry_len = per_sample_masks
            .iter()
            .filter(|&&mask| flags & mask != 0)
            .count()
            * 4;

        // Validate the whole table up front so a bogus sample_count cannot
        // drive a huge allocation.
        let table_len = sample_count.saturating_mul(entry_len);
        if table_len > r.remaining() {
            return Err(Mp4Error::Truncated {
                fourcc: *b"trun",
                expected: r.pos + table_len,
                actual: body.len(),
            });
        }

        // Without per-sample fields the table takes no bytes, so the body
        // cannot bound the count.
        if entry_len == 0 && sample_count > MAX_FIELDLESS_TRUN_SAMPLES {
            return Err(Mp4Error::MalformedBox {
                fourcc: *b"trun",
                offset: 0,
                reason: "sample_count not backed by per-sample fields",
            });
        }

        let mut entries = Vec::with_capacity(sample_count.min(MAX_FIELDLESS_TRUN_SAMPLES));
        for _ in 0..sample_count {
            let mut field = |mask: u32| -> Result<Option<u32>> {
                if flags & mask != 0 {
                    r.u32().map(Some)
                } else {
                    Ok(None)
                }
            };
            entries.push(TrunEntry {
                duration: field(TRUN_SAMPLE_DURATION_PRESENT)?,
                size: field(TRUN_SAMPLE_SIZE_PRESENT)?,
                flags: field(TRUN_SAMPLE_FLAGS_PRESENT)?,
                composition_time_offset: field(TRUN_SAMPLE_CTS_OFFSET_PRESENT)?,
            });
        }

        Ok(Self {
            version,
            flags,
            data_offset,
            first_sample_flags,
            entries,
        })
    }

    pub fn sample_count(&self) -> usize {
        self.entries.len()
    }
}
