//! Library target for the `aacts` package.
//!
//! The deliverable is the `aacts` binary (`src/main.rs`); argument parsing
//! and the command bodies live here so they can be tested directly.

pub mod cli;
pub mod commands;
