//! AAC helpers.
//!
//! Raw AAC access units pulled out of an MP4 container carry no framing of
//! their own. [`adts::frame`] prefixes each one with a 7-byte ADTS header so
//! the result can be written as a self-describing elementary stream.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]

pub mod adts;
pub mod error;

pub use adts::{ADTS_HEADER_LEN, AdtsHeader, MAX_FRAME_LENGTH, frame};
pub use error::{AdtsError, Result};
