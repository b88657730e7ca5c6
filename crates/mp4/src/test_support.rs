//! Shared fMP4 test builders.
//!
//! This module is available for local mp4 tests and optionally for downstream
//! crate tests when the `test-utils` feature is enabled.

use bytes::Bytes;

pub fn make_box(fourcc: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let size = (8 + body.len()) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(fourcc);
    out.extend_from_slice(body);
    out
}

pub fn make_full_box(fourcc: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + payload.len());
    body.push(version);
    body.push(((flags >> 16) & 0xFF) as u8);
    body.push(((flags >> 8) & 0xFF) as u8);
    body.push((flags & 0xFF) as u8);
    body.extend_from_slice(payload);
    make_box(fourcc, &body)
}

pub fn make_ftyp() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"iso6");
    body.extend_from_slice(&0u32.to_be_bytes());
    body.extend_from_slice(b"iso6");
    body.extend_from_slice(b"mp41");
    make_box(b"ftyp", &body)
}

pub fn make_mvhd(version: u8, timescale: u32, duration: u64) -> Vec<u8> {
    let mut payload = Vec::new();
    if version == 1 {
        payload.extend_from_slice(&0u64.to_be_bytes());
        payload.extend_from_slice(&0u64.to_be_bytes());
        payload.extend_from_slice(&timescale.to_be_bytes());
        payload.extend_from_slice(&duration.to_be_bytes());
    } else {
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(&timescale.to_be_bytes());
        payload.extend_from_slice(&(duration as u32).to_be_bytes());
    }
    // rate, volume, reserved, matrix, pre_defined, next_track_id
    payload.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    payload.extend_from_slice(&0x0100u16.to_be_bytes());
    payload.extend_from_slice(&[0u8; 10]);
    payload.extend_from_slice(&[0u8; 36]);
    payload.extend_from_slice(&[0u8; 24]);
    payload.extend_from_slice(&2u32.to_be_bytes());
    make_full_box(b"mvhd", version, 0, &payload)
}

/// `tfhd` with default-base-is-moof set and optional default duration/size.
pub fn make_tfhd(
    track_id: u32,
    default_sample_duration: Option<u32>,
    default_sample_size: Option<u32>,
) -> Vec<u8> {
    let mut flags = 0x02_0000;
    let mut payload = track_id.to_be_bytes().to_vec();
    if let Some(duration) = default_sample_duration {
        flags |= 0x00_0008;
        payload.extend_from_slice(&duration.to_be_bytes());
    }
    if let Some(size) = default_sample_size {
        flags |= 0x00_0010;
        payload.extend_from_slice(&size.to_be_bytes());
    }
    make_full_box(b"tfhd", 0, flags, &payload)
}

pub fn make_tfdt(version: u8, base_media_decode_time: u64) -> Vec<u8> {
    let payload = if version == 1 {
        base_media_decode_time.to_be_bytes().to_vec()
    } else {
        (base_media_decode_time as u32).to_be_bytes().to_vec()
    };
    make_full_box(b"tfdt", version, 0, &payload)
}

/// `trun` body (no box header) with per-sample sizes, per-sample durations
/// when any entry carries one, and an optional data offset.
pub fn make_trun_body(entries: &[(Option<u32>, u32)], data_offset: Option<i32>) -> Vec<u8> {
    let with_durations = entries.iter().any(|(duration, _)| duration.is_some());
    let mut flags: u32 = 0x00_0200;
    if with_durations {
        flags |= 0x00_0100;
    }
    if data_offset.is_some() {
        flags |= 0x00_0001;
    }

    let mut body = Vec::new();
    body.push(0);
    body.extend_from_slice(&flags.to_be_bytes()[1..]);
    body.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    if let Some(offset) = data_offset {
        body.extend_from_slice(&offset.to_be_bytes());
    }
    for (duration, size) in entries {
        if with_durations {
            body.extend_from_slice(&duration.unwrap_or(0).to_be_bytes());
        }
        body.extend_from_slice(&size.to_be_bytes());
    }
    body
}

/// Deterministic sample payload of the given length.
pub fn sample_payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| seed.wrapping_add((i % 251) as u8))
        .collect()
}

/// Builds a complete single-fragment audio file:
/// `ftyp`, `moov{mvhd}`, `moof{mfhd, traf{tfhd, tfdt, trun}}`, `mdat`.
#[derive(Debug, Clone)]
pub struct FragmentBuilder {
    timescale: u32,
    default_sample_duration: Option<u32>,
    base_media_decode_time: u64,
    entries: Vec<(Option<u32>, u32)>,
    mdat: Vec<u8>,
    mdat_override: Option<Vec<u8>>,
}

impl FragmentBuilder {
    pub fn new(timescale: u32) -> Self {
        Self {
            timescale,
            default_sample_duration: Some(1024),
            base_media_decode_time: 0,
            entries: Vec::new(),
            mdat: Vec::new(),
            mdat_override: None,
        }
    }

    pub fn default_sample_duration(mut self, duration: Option<u32>) -> Self {
        self.default_sample_duration = duration;
        self
    }

    pub fn base_media_decode_time(mut self, time: u64) -> Self {
        self.base_media_decode_time = time;
        self
    }

    pub fn sample(mut self, data: &[u8]) -> Self {
        self.entries.push((None, data.len() as u32));
        self.mdat.extend_from_slice(data);
        self
    }

    pub fn sample_with_duration(mut self, duration: u32, data: &[u8]) -> Self {
        self.entries.push((Some(duration), data.len() as u32));
        self.mdat.extend_from_slice(data);
        self
    }

    /// Replace the `mdat` payload, leaving the declared sample sizes untouched.
    pub fn mdat(mut self, payload: Vec<u8>) -> Self {
        self.mdat_override = Some(payload);
        self
    }

    pub fn build(&self) -> Bytes {
        let mvhd = make_mvhd(0, self.timescale, 0);
        let moov = make_box(b"moov", &mvhd);

        let mut mfhd_payload = Vec::new();
        mfhd_payload.extend_from_slice(&1u32.to_be_bytes());
        let mfhd = make_full_box(b"mfhd", 0, 0, &mfhd_payload);

        let tfhd = make_tfhd(1, self.default_sample_duration, None);
        let tfdt_version = u8::from(self.base_media_decode_time > u64::from(u32::MAX));
        let tfdt = make_tfdt(tfdt_version, self.base_media_decode_time);

        // data_offset points past moof to the mdat payload, i.e. moof.len() + 8.
        let trun_len = 8 + make_trun_body(&self.entries, Some(0)).len();
        let moof_len = 8 + mfhd.len() + 8 + tfhd.len() + tfdt.len() + trun_len;
        let trun = make_box(
            b"trun",
            &make_trun_body(&self.entries, Some((moof_len + 8) as i32)),
        );

        let mut traf_body = Vec::new();
        traf_body.extend_from_slice(&tfhd);
        traf_body.extend_from_slice(&tfdt);
        traf_body.extend_from_slice(&trun);
        let traf = make_box(b"traf", &traf_body);

        let mut moof_body = mfhd;
        moof_body.extend_from_slice(&traf);
        let moof = make_box(b"moof", &moof_body);
        debug_assert_eq!(moof.len(), moof_len);

        let mdat = make_box(b"mdat", self.mdat_override.as_ref().unwrap_or(&self.mdat));

        let mut out = make_ftyp();
        out.extend_from_slice(&moov);
        out.extend_from_slice(&moof);
        out.extend_from_slice(&mdat);
        Bytes::from(out)
    }
}
