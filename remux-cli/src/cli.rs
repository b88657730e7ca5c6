use std::path::{Path, PathBuf};

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use remux::RemuxConfig;

/// Remux the AAC track of a fragmented MP4 file into ADTS and MPEG-TS.
#[derive(Parser, Debug)]
#[command(name = "aacts", version, about, long_about = None)]
pub struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Args {
    /// Checks that span more than one flag.
    pub fn validate(&self) -> Result<(), clap::Error> {
        match &self.command {
            Commands::Remux(remux) if remux.pid == remux.pmt_pid => Err(Args::command().error(
                ErrorKind::ArgumentConflict,
                format!(
                    "--pid {:#06x} collides with the PMT PID; pick another --pid or --pmt-pid",
                    remux.pid
                ),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write `<stem>.ts` and `<stem>.aac` from an fMP4 input
    Remux(RemuxArgs),

    /// Print the box tree and the fragment summary
    Inspect {
        /// Input fMP4 file
        input: PathBuf,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct RemuxArgs {
    /// Input fMP4 file
    pub input: PathBuf,

    /// Transport stream output [default: <INPUT stem>.ts]
    #[arg(long)]
    pub ts_output: Option<PathBuf>,

    /// ADTS output [default: <INPUT stem>.aac]
    #[arg(long)]
    pub aac_output: Option<PathBuf>,

    /// Frames the parser may run ahead of the writers
    #[arg(long, default_value_t = pipeline_common::DEFAULT_QUEUE_CAPACITY, value_parser = parse_capacity)]
    pub queue_capacity: usize,

    /// Audio elementary stream PID (decimal or 0x-prefixed hex)
    #[arg(long, default_value = "256", value_parser = parse_pid)]
    pub pid: u16,

    /// PID carrying the program map table (decimal or 0x-prefixed hex)
    #[arg(long, default_value = "0x1000", value_parser = parse_pid)]
    pub pmt_pid: u16,

    /// PES stream id of the audio stream, 0xC0..=0xDF
    #[arg(long, default_value = "0xC0", value_parser = parse_stream_id)]
    pub stream_id: u8,
}

impl RemuxArgs {
    pub fn ts_output(&self) -> PathBuf {
        self.ts_output
            .clone()
            .unwrap_or_else(|| sibling(&self.input, "ts"))
    }

    pub fn aac_output(&self) -> PathBuf {
        self.aac_output
            .clone()
            .unwrap_or_else(|| sibling(&self.input, "aac"))
    }

    pub fn config(&self) -> RemuxConfig {
        RemuxConfig::default()
            .with_queue_capacity(self.queue_capacity)
            .with_pid(self.pid)
            .with_pmt_pid(self.pmt_pid)
            .with_stream_id(self.stream_id)
    }
}

fn sibling(input: &Path, extension: &str) -> PathBuf {
    input.with_extension(extension)
}

fn parse_capacity(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("queue capacity must be at least 1".to_string()),
        Ok(capacity) => Ok(capacity),
        Err(e) => Err(format!("invalid queue capacity '{value}': {e}")),
    }
}

fn parse_number(value: &str) -> Result<u32, std::num::ParseIntError> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

fn parse_pid(value: &str) -> Result<u16, String> {
    match parse_number(value) {
        Ok(pid) if (0x0010..0x1FFF).contains(&pid) => Ok(pid as u16),
        Ok(pid) => Err(format!("PID {pid:#06x} is outside 0x0010..=0x1FFE")),
        Err(e) => Err(format!("invalid PID '{value}': {e}")),
    }
}

fn parse_stream_id(value: &str) -> Result<u8, String> {
    match parse_number(value) {
        Ok(id) if (0xC0..=0xDF).contains(&id) => Ok(id as u8),
        Ok(id) => Err(format!("stream id {id:#04x} is not an audio stream id (0xC0..=0xDF)")),
        Err(e) => Err(format!("invalid stream id '{value}': {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remux_defaults() {
        let args = Args::try_parse_from(["aacts", "remux", "/tmp/song.mp4"]).unwrap();
        let Commands::Remux(remux) = args.command else {
            panic!("expected remux");
        };
        assert_eq!(remux.ts_output(), PathBuf::from("/tmp/song.ts"));
        assert_eq!(remux.aac_output(), PathBuf::from("/tmp/song.aac"));
        assert_eq!(remux.queue_capacity, 5);
        assert_eq!(remux.config(), RemuxConfig::default());
    }

    #[test]
    fn test_remux_overrides() {
        let args = Args::try_parse_from([
            "aacts",
            "-v",
            "remux",
            "in.mp4",
            "--ts-output",
            "out.ts",
            "--queue-capacity",
            "2",
            "--pid",
            "0x101",
        ])
        .unwrap();
        assert!(args.verbose);
        let Commands::Remux(remux) = args.command else {
            panic!("expected remux");
        };
        assert_eq!(remux.ts_output(), PathBuf::from("out.ts"));
        assert_eq!(remux.aac_output(), PathBuf::from("in.aac"));
        assert_eq!(remux.config().queue_capacity, 2);
        assert_eq!(remux.config().pid, 0x0101);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Args::try_parse_from(["aacts", "remux", "in.mp4", "--pid", "0x1FFF"]).is_err());
        assert!(Args::try_parse_from(["aacts", "remux", "in.mp4", "--pid", "abc"]).is_err());
        assert!(
            Args::try_parse_from(["aacts", "remux", "in.mp4", "--queue-capacity", "0"]).is_err()
        );
        assert!(Args::try_parse_from(["aacts", "-v", "-q", "inspect", "in.mp4"]).is_err());
        assert!(
            Args::try_parse_from(["aacts", "remux", "in.mp4", "--stream-id", "0xE0"]).is_err()
        );
        assert!(Args::try_parse_from(["aacts", "remux", "in.mp4", "--pmt-pid", "0x0F"]).is_err());
    }

    #[test]
    fn test_stream_id_and_pmt_pid_reach_config() {
        let args = Args::try_parse_from([
            "aacts",
            "remux",
            "in.mp4",
            "--pmt-pid",
            "0x0020",
            "--stream-id",
            "0xC3",
        ])
        .unwrap();
        args.validate().unwrap();
        let Commands::Remux(remux) = args.command else {
            panic!("expected remux");
        };
        let config = remux.config();
        assert_eq!(config.pmt_pid, 0x0020);
        assert_eq!(config.stream_id, 0xC3);
        assert_eq!(config.pid, 256);
    }

    #[test]
    fn test_pid_colliding_with_pmt_pid_is_rejected() {
        let args = Args::try_parse_from(["aacts", "remux", "in.mp4", "--pid", "0x1000"]).unwrap();
        let err = args.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);

        let args = Args::try_parse_from([
            "aacts", "remux", "in.mp4", "--pid", "0x1000", "--pmt-pid", "0x20",
        ])
        .unwrap();
        assert!(args.validate().is_ok());

        let args = Args::try_parse_from(["aacts", "remux", "in.mp4", "--pmt-pid", "256"]).unwrap();
        assert!(args.validate().is_err());
    }
}
