//! Out-of-band report channel
//!
//! The adapter running inside the child reports console output and test
//! outcomes over a local socket, independently of the debugger connection.

pub mod channel;
pub mod protocol;

pub use channel::{ReportChannel, ReportEvent};
pub use protocol::{ConsoleChannel, ReportMessage, TestError, TestReport, TestState};

/// Environment variable carrying the report socket path to the child
pub const REPORT_SOCKET_ENV: &str = "LINETRACE_REPORT_SOCKET";
