//! V8 inspector (Chrome DevTools Protocol) client
//!
//! Talks to a Node.js child over the WebSocket it announces on stderr.

pub mod client;
pub mod types;

pub use client::InspectorClient;
pub use types::{from_protocol_line, to_protocol_line, CallFrame, InspectorEvent, PausedEvent, RemoteObject};
