//! # Remux
//!
//! Extracts the AAC track of a fragmented MP4 file and writes it out twice:
//! as a raw ADTS elementary stream and as a single-program MPEG transport
//! stream with PTS/PCR derived from the fragment's decode times.
//!
//! The container is walked on the blocking pool while an async consumer
//! frames, muxes and writes, see [`remux`].

pub mod config;
pub mod error;
pub mod mux_adapter;
pub mod pipeline;
pub mod producer;

pub use config::RemuxConfig;
pub use error::{MuxWriteError, RemuxError};
pub use mux_adapter::{MuxAdapter, MuxSummary, pts_from_seconds};
pub use pipeline::{RemuxSummary, remux};
pub use producer::ProducerSummary;
