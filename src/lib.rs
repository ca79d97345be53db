//! linetrace - line-level execution traces of JavaScript tests
//!
//! Extracts the statement lines of selected mocha tests, runs those tests
//! in a Node.js child under the V8 inspector and records what every line
//! did: local variables, exceptions and console output.

pub mod cli;
pub mod commands;
pub mod common;
pub mod extract;
pub mod inspector;
pub mod orchestrator;
pub mod report;
pub mod session;
pub mod trace;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use extract::{ExtractionResult, Matcher, Selection, TestDescriptor};
pub use orchestrator::Orchestrator;
pub use trace::{ExecutionTrace, TracedTest};
