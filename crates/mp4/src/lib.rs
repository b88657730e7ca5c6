//! Fragmented MP4 (ISOBMFF) helpers.
//!
//! Covers just enough of the format to pull AAC access units out of a single
//! fragment: a bounds-checked box walker ([`box_utils`], [`tree`]), decoders
//! for the timing boxes ([`boxes`]) and the sample extractor ([`fragment`]).

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]

pub mod box_utils;
pub mod boxes;
pub mod error;
pub mod fragment;
pub mod tree;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use box_utils::{BoxView, CONTAINER_BOXES, FourCc, MAX_BOX_DEPTH, find_box_path};
pub use error::{Mp4Error, Result};
pub use fragment::{Fragment, Frame, FrameIter, SampleEntry, TrackTiming};
pub use tree::{BoxNode, BoxTree};
