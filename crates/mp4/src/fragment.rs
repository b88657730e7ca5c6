//! Single-fragment sample extraction.
//!
//! [`Fragment::parse`] walks the top-level boxes of a fragmented MP4 file,
//! decodes `moov/mvhd` and the first `moof/traf/{tfhd,tfdt,trun}` and keeps
//! the first `mdat` payload. [`Fragment::into_frames`] then slices that
//! payload into timestamped [`Frame`]s, one per `trun` entry.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::box_utils::{
    BoxView, FourCc, boxes, find_box_path, find_first_box, fourcc_to_string,
};
use crate::boxes::{
    MovieFragmentHeader, MovieHeader, TrackFragmentDecodeTime, TrackFragmentHeader, TrackRun,
};
use crate::{Mp4Error, Result};

/// Timing parameters shared by every sample of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackTiming {
    /// Ticks per second, from `mvhd`.
    pub timescale: u32,
    /// From `tfhd`; used for entries without a per-sample duration.
    pub default_sample_duration: Option<u32>,
    /// From `tfdt`, in timescale ticks.
    pub base_media_decode_time: u64,
}

impl TrackTiming {
    #[inline]
    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        ticks as f64 / f64::from(self.timescale)
    }
}

/// One `trun` entry with its size resolved against the `tfhd` default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleEntry {
    pub sample_size: u32,
    pub sample_duration: Option<u32>,
}

/// A raw AAC access unit and its presentation time in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: usize,
    pub time: f64,
    pub data: Bytes,
}

/// The timing and sample layout of the first fragment in a file.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub timing: TrackTiming,
    pub track_id: u32,
    pub sequence_number: Option<u32>,
    pub samples: Vec<SampleEntry>,
    mdat: Bytes,
}

#[derive(Default)]
struct TopLevel {
    moov: Option<BoxView>,
    moof: Option<BoxView>,
    mdat: Option<BoxView>,
    extra_moof: usize,
    extra_mdat: usize,
}

impl Fragment {
    /// Parse a complete fragmented MP4 buffer.
    ///
    /// Leading header boxes (`ftyp`, `styp`, `sidx`, ...) are skipped as
    /// opaque top-level leaves.
    pub fn parse(data: &Bytes) -> Result<Self> {
        let top = scan_top_level(data)?;
        if top.extra_moof > 0 || top.extra_mdat > 0 {
            warn!(
                extra_moof = top.extra_moof,
                extra_mdat = top.extra_mdat,
                "Only the first fragment is extracted; ignoring the rest"
            );
        }

        let mvhd = match find_box_path(data, &[*b"moov", *b"mvhd"]) {
            Ok(body) => body,
            Err(Mp4Error::BoxPathNotFound { .. }) => {
                let missing = if top.moov.is_some() { *b"mvhd" } else { *b"moov" };
                return Err(Mp4Error::MissingRequiredBox(missing));
            }
            Err(e) => return Err(e),
        };
        let movie_header = MovieHeader::parse(&mvhd)?;

        let moof = top.moof.ok_or(Mp4Error::MissingRequiredBox(*b"moof"))?;
        let sequence_number = find_first_box(data, moof.body_start, moof.body_end, *b"mfhd")?
            .map(|mfhd| MovieFragmentHeader::parse(&data[mfhd.body_start..mfhd.body_end]))
            .transpose()?
            .map(|mfhd| mfhd.sequence_number);

        let traf = require_child(data, &moof, *b"traf")?;
        let tfhd = require_child(data, &traf, *b"tfhd")?;
        let tfdt = require_child(data, &traf, *b"tfdt")?;
        let trun = require_child(data, &traf, *b"trun")?;

        let extra_trafs = count_children(data, &moof, *b"traf")?.saturating_sub(1);
        let extra_truns = count_children(data, &traf, *b"trun")?.saturating_sub(1);
        if extra_trafs > 0 || extra_truns > 0 {
            warn!(
                extra_trafs,
                extra_truns, "Only the first traf/trun of the fragment is used"
            );
        }

        let header = TrackFragmentHeader::parse(&data[tfhd.body_start..tfhd.body_end])?;
        let decode_time = TrackFragmentDecodeTime::parse(&data[tfdt.body_start..tfdt.body_end])?;
        let run = TrackRun::parse(&data[trun.body_start..trun.body_end])?;

        let mdat = top.mdat.ok_or(Mp4Error::MissingRequiredBox(*b"mdat"))?;

        let samples = run
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let sample_size = entry
                    .size
                    .or(header.default_sample_size)
                    .ok_or(Mp4Error::MissingSampleSize { index })?;
                Ok(SampleEntry {
                    sample_size,
                    sample_duration: entry.duration,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let timing = TrackTiming {
            timescale: movie_header.timescale,
            default_sample_duration: header.default_sample_duration,
            base_media_decode_time: decode_time.base_media_decode_time,
        };

        debug!(
            timescale = timing.timescale,
            default_sample_duration = ?timing.default_sample_duration,
            base_media_decode_time = timing.base_media_decode_time,
            track_id = header.track_id,
            samples = samples.len(),
            data_offset = ?run.data_offset,
            mdat_len = mdat.body_len(),
            "Parsed fragment"
        );

        Ok(Self {
            timing,
            track_id: header.track_id,
            sequence_number,
            samples,
            mdat: mdat.body(data),
        })
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Length of the `mdat` payload.
    pub fn mdat_len(&self) -> usize {
        self.mdat.len()
    }

    /// Presentation time of the first sample in seconds.
    pub fn start_time(&self) -> f64 {
        self.timing
            .ticks_to_seconds(self.timing.base_media_decode_time)
    }

    /// Total duration of all samples in seconds.
    pub fn duration(&self) -> Result<f64> {
        let ticks = self.resolved_durations()?.iter().sum::<u64>();
        Ok(self.timing.ticks_to_seconds(ticks))
    }

    fn resolved_durations(&self) -> Result<Vec<u64>> {
        self.samples
            .iter()
            .enumerate()
            .map(|(index, sample)| {
                sample
                    .sample_duration
                    .or(self.timing.default_sample_duration)
                    .map(u64::from)
                    .ok_or(Mp4Error::MissingSampleDuration { index })
            })
            .collect()
    }

    /// Validate the sample table against `mdat` and return a lazy iterator
    /// over the frames.
    ///
    /// All structural checks happen here, so a fragment whose sample sizes
    /// do not add up to the `mdat` length yields no frames at all.
    pub fn into_frames(self) -> Result<FrameIter> {
        if self.samples.is_empty() {
            return Err(Mp4Error::EmptySampleTable);
        }

        let durations = self.resolved_durations()?;
        let expected: u64 = self.samples.iter().map(|s| u64::from(s.sample_size)).sum();
        let actual = self.mdat.len() as u64;
        if expected != actual {
            return Err(Mp4Error::SampleSizeMismatch { expected, actual });
        }

        Ok(FrameIter {
            timing: self.timing,
            entries: self
                .samples
                .into_iter()
                .zip(durations)
                .collect::<Vec<_>>()
                .into_iter()
                .enumerate(),
            mdat: self.mdat,
            cursor: 0,
            ticks: self.timing.base_media_decode_time,
            failed: false,
        })
    }
}

/// Lazy, finite, non-restartable sequence of frames in ascending time order.
#[derive(Debug)]
pub struct FrameIter {
    timing: TrackTiming,
    entries: std::iter::Enumerate<std::vec::IntoIter<(SampleEntry, u64)>>,
    mdat: Bytes,
    cursor: usize,
    ticks: u64,
    failed: bool,
}

impl FrameIter {
    /// Number of frames not yet yielded.
    pub fn remaining(&self) -> usize {
        if self.failed { 0 } else { self.entries.len() }
    }
}

impl Iterator for FrameIter {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let (index, (sample, duration)) = self.entries.next()?;

        let end = self.cursor + sample.sample_size as usize;
        if end > self.mdat.len() {
            self.failed = true;
            return Some(Err(Mp4Error::SampleSizeMismatch {
                expected: end as u64,
                actual: self.mdat.len() as u64,
            }));
        }

        let frame = Frame {
            index,
            time: self.timing.ticks_to_seconds(self.ticks),
            data: self.mdat.slice(self.cursor..end),
        };
        self.cursor = end;
        self.ticks = self.ticks.saturating_add(duration);
        Some(Ok(frame))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

fn scan_top_level(data: &Bytes) -> Result<TopLevel> {
    let mut top = TopLevel::default();
    for parsed in boxes(data, 0, data.len()) {
        let parsed = parsed?;
        let slot = match &parsed.fourcc {
            b"moov" => &mut top.moov,
            b"moof" => &mut top.moof,
            b"mdat" => &mut top.mdat,
            other => {
                debug!(
                    fourcc = %fourcc_to_string(other),
                    offset = parsed.start,
                    size = parsed.size,
                    "Skipping top-level box"
                );
                continue;
            }
        };
        if slot.is_none() {
            *slot = Some(parsed);
        } else if &parsed.fourcc == b"moof" {
            top.extra_moof += 1;
        } else if &parsed.fourcc == b"mdat" {
            top.extra_mdat += 1;
        }
    }
    Ok(top)
}

fn require_child(data: &[u8], parent: &BoxView, fourcc: FourCc) -> Result<BoxView> {
    find_first_box(data, parent.body_start, parent.body_end, fourcc)?
        .ok_or(Mp4Error::MissingRequiredBox(fourcc))
}

fn count_children(data: &[u8], parent: &BoxView, fourcc: FourCc) -> Result<usize> {
    let mut count = 0;
    for parsed in boxes(data, parent.body_start, parent.body_end) {
        if parsed?.fourcc == fourcc {
            count += 1;
        }
    }
    Ok(count)
}
