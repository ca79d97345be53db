//! Dynamic side of tracing: running the selected tests under the inspector

pub mod adapter;
pub mod debug_session;
pub mod frames;
pub mod inspect;
pub mod launch;
pub mod target;

pub use debug_session::{DebugSession, RunOutcome, SessionState};
pub use frames::{
    Binding, ConsoleOutput, ExceptionInfo, Frame, FrameLog, FramePayload, LocalsSnapshot, ValueSummary,
};
pub use target::ScriptTarget;

use crate::inspector::InspectorEvent;
use crate::report::ReportEvent;

/// Everything a running session reacts to, in arrival order
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Inspector(InspectorEvent),
    Report(ReportEvent),
}

impl From<InspectorEvent> for SessionEvent {
    fn from(event: InspectorEvent) -> Self {
        Self::Inspector(event)
    }
}

impl From<ReportEvent> for SessionEvent {
    fn from(event: ReportEvent) -> Self {
        Self::Report(event)
    }
}
