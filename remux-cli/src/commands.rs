use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use mp4::{BoxTree, Fragment};
use pipeline_common::{CancellationToken, StreamerContext};
use remux::{RemuxError, RemuxSummary, remux};
use tokio::fs::File;
use tokio::io::BufWriter;
use tracing::info;

use crate::cli::RemuxArgs;

async fn read_input(input: &Path) -> Result<Bytes> {
    let data = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    Ok(Bytes::from(data))
}

async fn create_output(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Remux one file. Partially written outputs are left in place on failure.
pub async fn remux_file(args: &RemuxArgs, token: CancellationToken) -> Result<RemuxSummary> {
    let data = read_input(&args.input).await?;
    let ts_path = args.ts_output();
    let aac_path = args.aac_output();
    let ts_sink = create_output(&ts_path).await?;
    let aac_sink = create_output(&aac_path).await?;

    info!(
        input = %args.input.display(),
        ts = %ts_path.display(),
        aac = %aac_path.display(),
        "Remuxing"
    );

    let name = args
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let context = StreamerContext::with_name(name, token);
    let summary = remux(data, aac_sink, ts_sink, args.config(), &context)
        .await
        .with_context(|| format!("Failed to remux {}", args.input.display()))?;
    Ok(summary)
}

/// Fragment facts printed by `inspect`.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSummary {
    pub track_id: u32,
    pub sequence_number: Option<u32>,
    pub timescale: u32,
    pub default_sample_duration: Option<u32>,
    pub sample_count: usize,
    pub mdat_len: usize,
    pub start_time: f64,
    pub duration: f64,
}

#[derive(Debug)]
pub struct InspectReport {
    pub tree: BoxTree,
    pub fragment: FragmentSummary,
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fragment = &self.fragment;
        write!(f, "{}", self.tree)?;
        writeln!(f)?;
        writeln!(f, "track id:         {}", fragment.track_id)?;
        if let Some(sequence_number) = fragment.sequence_number {
            writeln!(f, "sequence number:  {sequence_number}")?;
        }
        writeln!(f, "timescale:        {}", fragment.timescale)?;
        if let Some(duration) = fragment.default_sample_duration {
            writeln!(f, "default duration: {duration}")?;
        }
        writeln!(f, "samples:          {}", fragment.sample_count)?;
        writeln!(f, "mdat bytes:       {}", fragment.mdat_len)?;
        writeln!(f, "start time:       {:.6}s", fragment.start_time)?;
        writeln!(f, "duration:         {:.6}s", fragment.duration)
    }
}

pub fn inspect(data: &Bytes) -> Result<InspectReport, mp4::Mp4Error> {
    let tree = BoxTree::parse(data)?;
    let parsed = Fragment::parse(data)?;
    let fragment = FragmentSummary {
        track_id: parsed.track_id,
        sequence_number: parsed.sequence_number,
        timescale: parsed.timing.timescale,
        default_sample_duration: parsed.timing.default_sample_duration,
        sample_count: parsed.sample_count(),
        mdat_len: parsed.mdat_len(),
        start_time: parsed.start_time(),
        duration: parsed.duration()?,
    };
    Ok(InspectReport { tree, fragment })
}

pub async fn inspect_file(input: &Path) -> Result<InspectReport> {
    let data = read_input(input).await?;
    inspect(&data).with_context(|| format!("Failed to inspect {}", input.display()))
}

/// Process exit status for a failed command: 130 when the run was
/// cancelled, 1 otherwise.
pub fn exit_code(error: &anyhow::Error) -> i32 {
    if remux_error(error).is_some_and(RemuxError::is_cancelled) {
        130
    } else {
        1
    }
}

/// Failure category printed next to the message.
pub fn error_kind(error: &anyhow::Error) -> &'static str {
    if let Some(err) = remux_error(error) {
        return err.kind();
    }
    if error
        .chain()
        .any(|cause| cause.downcast_ref::<mp4::Mp4Error>().is_some())
    {
        return "Mp4Error";
    }
    if error
        .chain()
        .any(|cause| cause.downcast_ref::<std::io::Error>().is_some())
    {
        return "Io";
    }
    "Error"
}

fn remux_error(error: &anyhow::Error) -> Option<&RemuxError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<RemuxError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mp4::test_support::FragmentBuilder;

    #[test]
    fn test_inspect_summary() {
        let data = FragmentBuilder::new(44100)
            .base_media_decode_time(44100)
            .sample(&[0; 100])
            .sample(&[0; 120])
            .build();
        let report = inspect(&data).unwrap();
        assert_eq!(report.fragment.timescale, 44100);
        assert_eq!(report.fragment.sample_count, 2);
        assert_eq!(report.fragment.mdat_len, 220);
        assert_eq!(report.fragment.sequence_number, Some(1));
        assert!((report.fragment.start_time - 1.0).abs() < 1e-9);
        assert!((report.fragment.duration - 2048.0 / 44100.0).abs() < 1e-9);

        let text = report.to_string();
        assert!(text.contains("moof"));
        assert!(text.contains("trun"));
        assert!(text.contains("samples:          2"));
    }

    #[test]
    fn test_exit_codes() {
        let cancelled = anyhow::Error::new(RemuxError::Cancelled).context("Failed to remux x");
        assert_eq!(exit_code(&cancelled), 130);
        assert_eq!(error_kind(&cancelled), "Cancelled");

        let failed = anyhow::Error::new(RemuxError::Mp4(mp4::Mp4Error::EmptySampleTable));
        assert_eq!(exit_code(&failed), 1);
        assert_eq!(error_kind(&failed), "EmptySampleTable");

        let io = anyhow::Error::new(std::io::Error::other("disk"));
        assert_eq!(error_kind(&io), "Io");
    }
}
