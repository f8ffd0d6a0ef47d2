//! Ruby / RSpec support for respec.
//!
//! Pipeline, in run order:
//! - [`parser`]: tree-sitter-ruby parse, one per file
//! - [`syntax`]: construct catalog and per-construct decisions
//! - [`context`]: static cross-file context (mock framework, `let` doubles)
//! - [`suite`]: loaded files plus context and runtime facts
//! - [`analyzer`]: instrumented suite run that gathers runtime facts
//! - [`converter`]: per-file decisions and rewriting
//! - [`runner`]: end-to-end orchestration and writing

pub mod analyzer;
pub mod config;
pub mod context;
pub mod converter;
pub mod parser;
pub mod runner;
pub mod suite;
pub mod syntax;

pub use config::ConversionConfig;
pub use runner::{run, RunOptions, RunOutcome};
