//! respec - RSpec 2 to RSpec 3 conversion.
//!
//! This crate provides the `respec` binary. The conversion engine lives in
//! `respec-ruby`; this crate adds target discovery, preflight checks,
//! configuration merging and output rendering.
//!
//! ## Modules
//!
//! - `cli` - front-door helpers used by `main.rs`

pub mod cli;

pub use respec_core::error::{OutputErrorCode, RespecError};
pub use respec_ruby::{run, ConversionConfig, RunOptions, RunOutcome};
