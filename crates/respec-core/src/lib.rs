//! Core infrastructure for respec.
//!
//! This crate provides language-agnostic infrastructure:
//! - Patch IR and the source rewriter
//! - Runtime fact table produced by dynamic analysis
//! - Conversion records, annotations and the run report
//! - Error types and exit codes
//! - Sandboxed project copies for instrumented runs
//! - Text utilities and diff generation

pub mod diff;
pub mod error;
pub mod facts;
pub mod patch;
pub mod report;
pub mod sandbox;
pub mod text;
