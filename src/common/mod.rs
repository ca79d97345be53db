//! Common utilities shared by the extractor, the session and the CLI

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, ErrorKind, Result};

/// Parse the inspector banner a Node.js child prints on stderr.
///
/// `Debugger listening on ws://127.0.0.1:9229/0f2c…` yields the WebSocket URL.
pub fn parse_inspector_banner(line: &str) -> Option<String> {
    const MARKER: &str = "Debugger listening on ";
    let start = line.find(MARKER)?;
    let url = line[start + MARKER.len()..].trim();
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Some(url.to_string())
    } else {
        None
    }
}
