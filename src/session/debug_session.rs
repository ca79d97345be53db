//! Debug session state machine
//!
//! One session drives one child process: start it paused, arm the
//! breakpoints, then let it run while every pause is turned into frames and
//! resumed. All inbound traffic (inspector events and adapter reports)
//! arrives on a single channel and is handled in arrival order.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use tokio::process::Child;
use tokio::sync::mpsc;

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::extract::{ExtractionResult, FunctionSignatures, Matcher};
use crate::inspector::types::Location;
use crate::inspector::{CallFrame, InspectorClient, InspectorEvent, PausedEvent, RemoteObject};
use crate::report::{ReportChannel, ReportEvent, ReportMessage, TestReport};

use super::adapter::AdapterScript;
use super::frames::{ConsoleOutput, Frame, FrameLog, FramePayload};
use super::inspect;
use super::launch::{self, LaunchSpec};
use super::target::ScriptTarget;
use super::SessionEvent;

/// Debug session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing started yet
    Idle,
    /// Child process running, held before its first statement
    Spawned,
    /// Inspector WebSocket open
    Connected,
    /// Child released, waiting for its break-on-start pause
    AwaitingInitialPause,
    /// Initial pause consumed, exception breaks enabled
    Ready,
    BreakpointsArmed,
    Running,
    Paused,
    /// Reading frames of the current pause
    Inspecting,
    Closed,
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Spawned => write!(f, "spawned"),
            Self::Connected => write!(f, "connected"),
            Self::AwaitingInitialPause => write!(f, "awaiting initial pause"),
            Self::Ready => write!(f, "ready"),
            Self::BreakpointsArmed => write!(f, "breakpoints armed"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Inspecting => write!(f, "inspecting"),
            Self::Closed => write!(f, "closed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A breakpoint line whose statement is being stepped over
#[derive(Debug)]
struct PendingSnapshot {
    line: usize,
    /// Identifies the frame to read once the step completes
    function: Option<Location>,
}

/// How a pause is left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Continuation {
    Resume,
    StepOver,
    /// The session was disposed; the child is gone
    Stop,
}

/// What a finished run produced
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub frames: FrameLog,
    pub reports: Vec<TestReport>,
}

/// Debug session driving one Node.js child through the inspector
pub struct DebugSession {
    config: Config,
    target: ScriptTarget,
    extraction: ExtractionResult,
    signatures: FunctionSignatures,
    state: SessionState,
    /// Adapter file; must outlive the child
    adapter: Option<AdapterScript>,
    report: Option<ReportChannel>,
    child: Option<Child>,
    client: Option<InspectorClient>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    /// Lines with a breakpoint
    armed: BTreeSet<usize>,
    /// Breakpoints this session set, by inspector id
    breakpoint_ids: HashSet<String>,
    /// Inspector script ids the target was loaded as
    script_ids: HashSet<String>,
    pending: Option<PendingSnapshot>,
    /// Id of the default execution context
    main_context: Option<i64>,
    /// V8 reported that the target script does not compile
    target_failed_to_parse: bool,
    report_closed: bool,
    frames: FrameLog,
    reports: Vec<TestReport>,
    /// Error that ended the run early
    failure: Option<Error>,
}

impl DebugSession {
    pub fn new(
        config: Config,
        script: &Path,
        extraction: ExtractionResult,
        signatures: FunctionSignatures,
    ) -> Result<Self> {
        let target = ScriptTarget::new(script)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            target,
            extraction,
            signatures,
            state: SessionState::Idle,
            adapter: None,
            report: None,
            child: None,
            client: None,
            events_tx,
            events_rx,
            armed: BTreeSet::new(),
            breakpoint_ids: HashSet::new(),
            script_ids: HashSet::new(),
            pending: None,
            main_context: None,
            target_failed_to_parse: false,
            report_closed: false,
            frames: FrameLog::new(),
            reports: Vec::new(),
            failure: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn target(&self) -> &ScriptTarget {
        &self.target
    }

    fn transition(&mut self, state: SessionState) {
        tracing::debug!(from = %self.state, to = %state, "Session state");
        self.state = state;
    }

    fn expect_state(&self, allowed: &[SessionState], action: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::invalid_state(action, self.state))
        }
    }

    fn client(&self) -> Result<&InspectorClient> {
        self.client
            .as_ref()
            .ok_or_else(|| Error::invalid_state("talk to the inspector", self.state))
    }

    // === Start ===

    /// Spawn the child filtered to `criterion`, connect and consume the
    /// initial pause
    #[tracing::instrument(skip_all, fields(script = %self.target.path().display()))]
    pub async fn start(&mut self, criterion: &Matcher) -> Result<()> {
        self.expect_state(&[SessionState::Idle], "start")?;

        let result = self.launch_and_connect(criterion).await;
        if result.is_err() {
            self.transition(SessionState::Failed);
        }
        result
    }

    async fn launch_and_connect(&mut self, criterion: &Matcher) -> Result<()> {
        let node = self.config.node_executable()?;
        let adapter = AdapterScript::prepare(&self.config)?;
        let report = ReportChannel::bind(self.events_tx.clone()).await?;

        let spec = LaunchSpec {
            node,
            node_args: self.config.node.args.clone(),
            inspect_address: format!("{}:{}", self.config.inspector.host, self.config.inspector.port),
            adapter: adapter.path().to_path_buf(),
            script: self.target.path().to_path_buf(),
            grep: criterion.grep_pattern(),
            report_path: report.child_path().to_string(),
        };
        self.adapter = Some(adapter);
        self.report = Some(report);

        let launched = launch::launch(&spec).await?;
        self.child = Some(launched.child);
        self.transition(SessionState::Spawned);

        let client = InspectorClient::connect(&launched.inspector_url, self.events_tx.clone()).await?;
        self.client = Some(client);
        self.transition(SessionState::Connected);

        {
            let client = self.client()?;
            client.enable_runtime().await?;
            client.enable_debugger().await?;
            client.run_if_waiting_for_debugger().await?;
        }
        self.transition(SessionState::AwaitingInitialPause);

        self.await_initial_pause().await?;
        self.client()?.set_pause_on_exceptions("all").await?;
        self.transition(SessionState::Ready);

        tracing::info!(criterion = %criterion, "Test process ready");
        Ok(())
    }

    /// Swallow the break-on-start pause
    async fn await_initial_pause(&mut self) -> Result<()> {
        while let Some(event) = self.events_rx.recv().await {
            match event {
                SessionEvent::Inspector(InspectorEvent::Paused(paused)) => {
                    tracing::debug!(reason = %paused.reason, "Initial pause");
                    return Ok(());
                }
                SessionEvent::Inspector(InspectorEvent::Disconnected { .. })
                | SessionEvent::Inspector(InspectorEvent::ExecutionContextDestroyed { .. }) => {
                    return Err(Error::Disconnected);
                }
                SessionEvent::Inspector(InspectorEvent::ExecutionContextCreated { id, is_default }) => {
                    self.on_context_created(id, is_default);
                }
                SessionEvent::Inspector(InspectorEvent::ScriptParsed { script_id, url }) => {
                    self.on_script_parsed(script_id, &url);
                }
                SessionEvent::Inspector(_) => {}
                SessionEvent::Report(event) => self.on_report_event(event),
            }
        }
        Err(Error::Disconnected)
    }

    // === Breakpoints ===

    /// Arm one breakpoint per line; returns once all are acknowledged
    #[tracing::instrument(skip_all, fields(count = lines.len()))]
    pub async fn set_breakpoints(&mut self, lines: &[usize]) -> Result<()> {
        self.expect_state(&[SessionState::Ready, SessionState::BreakpointsArmed], "set breakpoints")?;

        let results = {
            let client = self.client()?;
            let url = self.target.url();
            futures_util::future::try_join_all(
                lines.iter().map(|&line| client.set_breakpoint_by_url(url, line)),
            )
            .await
        };
        let results = match results {
            Ok(results) => results,
            Err(e) => {
                self.transition(SessionState::Failed);
                return Err(e);
            }
        };

        for (line, result) in lines.iter().zip(results) {
            tracing::trace!(line, id = %result.breakpoint_id, resolved = result.locations.len(), "Breakpoint set");
            self.script_ids
                .extend(result.locations.into_iter().map(|location| location.script_id));
            self.breakpoint_ids.insert(result.breakpoint_id);
        }
        self.armed.extend(lines.iter().copied());
        self.transition(SessionState::BreakpointsArmed);
        Ok(())
    }

    // === Run ===

    /// Let the child run to completion, collecting frames and test reports
    #[tracing::instrument(skip_all, fields(script = %self.target.path().display()))]
    pub async fn run(&mut self) -> Result<RunOutcome> {
        self.expect_state(&[SessionState::Ready, SessionState::BreakpointsArmed], "run")?;

        if let Err(e) = self.client()?.resume().await {
            self.transition(SessionState::Failed);
            return Err(e);
        }
        self.transition(SessionState::Running);

        self.event_loop().await;

        if let Some(error) = self.failure.take() {
            self.transition(SessionState::Failed);
            return Err(error);
        }

        self.shutdown().await;
        self.transition(SessionState::Closed);

        tracing::info!(
            frames = self.frames.len(),
            reports = self.reports.len(),
            "Run finished"
        );
        Ok(RunOutcome {
            frames: std::mem::take(&mut self.frames),
            reports: std::mem::take(&mut self.reports),
        })
    }

    async fn event_loop(&mut self) {
        while let Some(event) = self.events_rx.recv().await {
            match event {
                SessionEvent::Inspector(InspectorEvent::Paused(paused)) => {
                    self.transition(SessionState::Paused);
                    if let Err(e) = self.on_pause(paused).await {
                        tracing::debug!("Pause not handled: {}", e);
                        break;
                    }
                    if self.failure.is_some() {
                        break;
                    }
                }
                SessionEvent::Inspector(InspectorEvent::ScriptParsed { script_id, url }) => {
                    self.on_script_parsed(script_id, &url);
                }
                SessionEvent::Inspector(InspectorEvent::BreakpointResolved { breakpoint_id, location }) => {
                    self.on_breakpoint_resolved(&breakpoint_id, location.script_id);
                }
                SessionEvent::Inspector(InspectorEvent::ScriptFailedToParse { url }) => {
                    if self.target.owns(&url) {
                        tracing::warn!(url = %url, "Script failed to compile");
                        self.target_failed_to_parse = true;
                    }
                }
                SessionEvent::Inspector(InspectorEvent::ExecutionContextCreated { id, is_default }) => {
                    self.on_context_created(id, is_default);
                }
                SessionEvent::Inspector(InspectorEvent::ExecutionContextDestroyed { id }) => {
                    if id.is_none() || self.main_context.is_none() || id == self.main_context {
                        tracing::debug!(?id, "Main execution context destroyed");
                        break;
                    }
                }
                SessionEvent::Inspector(InspectorEvent::Disconnected { reason }) => {
                    tracing::debug!(?reason, "Inspector disconnected");
                    break;
                }
                SessionEvent::Inspector(_) => {}
                SessionEvent::Report(event) => self.on_report_event(event),
            }
        }
    }

    fn on_context_created(&mut self, id: i64, is_default: bool) {
        if is_default || self.main_context.is_none() {
            self.main_context = Some(id);
        }
    }

    fn on_script_parsed(&mut self, script_id: String, url: &str) {
        if self.target.owns(url) {
            tracing::debug!(script_id = %script_id, "Target script parsed");
            self.script_ids.insert(script_id);
        }
    }

    fn on_breakpoint_resolved(&mut self, breakpoint_id: &str, script_id: String) {
        if self.breakpoint_ids.contains(breakpoint_id) {
            self.script_ids.insert(script_id);
        }
    }

    /// Whether a paused frame runs code of the target script
    ///
    /// Frames name their script by id; the per-frame url is only a fallback
    /// for inspectors that still fill it in.
    fn owns_frame(&self, frame: &CallFrame) -> bool {
        self.script_ids.contains(&frame.location.script_id) || self.target.owns(&frame.url)
    }

    /// Detach, wait for the child to exit and read the rest of its reports
    async fn shutdown(&mut self) {
        if let Some(client) = &self.client {
            client.close();
        }
        if let Some(child) = self.child.as_mut() {
            match child.wait().await {
                Ok(status) => tracing::debug!(%status, "Test process exited"),
                Err(e) => tracing::warn!("Failed to wait for the test process: {}", e),
            }
        }
        self.client = None;

        if let Some(report) = self.report.as_mut() {
            report.stop_accepting();
        } else {
            self.report_closed = true;
        }
        while !self.report_closed {
            match self.events_rx.recv().await {
                Some(SessionEvent::Report(event)) => self.on_report_event(event),
                Some(SessionEvent::Inspector(_)) => {}
                None => break,
            }
        }
    }

    // === Pauses ===

    /// Handle one pause and leave it with exactly one resume, step or stop
    async fn on_pause(&mut self, paused: PausedEvent) -> Result<()> {
        self.transition(SessionState::Inspecting);

        let continuation = if paused.is_exception() {
            self.on_exception(&paused).await
        } else {
            self.on_break(&paused).await
        };
        let continuation = match continuation {
            Ok(continuation) => continuation,
            Err(Error::Disconnected) => return Err(Error::Disconnected),
            Err(e) => {
                tracing::warn!(reason = %paused.reason, "Failed to inspect pause: {}", e);
                self.pending = None;
                Continuation::Resume
            }
        };

        match continuation {
            Continuation::Resume => self.client()?.resume().await?,
            Continuation::StepOver => self.client()?.step_over().await?,
            Continuation::Stop => return Ok(()),
        }
        self.transition(SessionState::Running);
        Ok(())
    }

    async fn on_break(&mut self, paused: &PausedEvent) -> Result<Continuation> {
        if let Some(pending) = self.pending.take() {
            self.complete_snapshot(pending, paused).await?;
        }

        let Some(top) = paused.call_frames.first() else {
            return Ok(Continuation::Resume);
        };
        let line = top.line();
        if !self.owns_frame(top) || !self.armed.contains(&line) {
            return Ok(Continuation::Resume);
        }

        // The snapshot for a line is taken once its statement has run
        tracing::trace!(line, "Breakpoint hit");
        self.pending = Some(PendingSnapshot {
            line,
            function: top.function_location.clone(),
        });
        Ok(Continuation::StepOver)
    }

    async fn complete_snapshot(&mut self, pending: PendingSnapshot, paused: &PausedEvent) -> Result<()> {
        let frame = paused
            .call_frames
            .iter()
            .find(|frame| self.owns_frame(frame) && frame.function_location == pending.function);
        let Some(frame) = frame else {
            tracing::debug!(line = pending.line, "Function returned before the line could be inspected");
            return Ok(());
        };

        let snapshot = inspect::snapshot(self.client()?, frame, &self.signatures).await?;
        self.emit(pending.line, FramePayload::Locals(snapshot));
        Ok(())
    }

    async fn on_exception(&mut self, paused: &PausedEvent) -> Result<Continuation> {
        if let Some(pending) = self.pending.take() {
            tracing::trace!(line = pending.line, "Line threw");
        }
        let Some(exception) = paused.exception() else {
            return Ok(Continuation::Resume);
        };

        // The throwing frame when it belongs to the script, else the nearest
        // caller that does
        if let Some(frame) = paused.call_frames.iter().find(|f| self.owns_frame(f)) {
            let line = frame.line();
            let text = inspect::exception_text(self.client()?, &exception).await;
            tracing::debug!(line, "Exception: {}", text);
            self.emit(line, FramePayload::Exception(inspect::exception_info(&exception, text)));
            return Ok(Continuation::Resume);
        }

        if inspect::is_syntax_error(&exception) {
            let line = exception
                .description
                .as_deref()
                .and_then(|description| self.target.line_in(description));
            if self.target_failed_to_parse || line.is_some() {
                let text = inspect::exception_text(self.client()?, &exception).await;
                self.abort_unrecoverable(&exception, text, line);
                return Ok(Continuation::Stop);
            }
        }

        Ok(Continuation::Resume)
    }

    /// The script stopped compiling: record what is known and stop the child
    fn abort_unrecoverable(&mut self, exception: &RemoteObject, text: String, line: Option<usize>) {
        let location = match line {
            Some(line) => format!("{}:{}", self.target.path().display(), line),
            None => self.target.path().display().to_string(),
        };
        tracing::error!(%location, "{}", text);

        self.failure = Some(Error::UnrecoverableScript(format!("{} ({})", text, location)));
        if let Some(line) = line {
            self.emit(line, FramePayload::Exception(inspect::exception_info(exception, text)));
        }
        self.dispose();
    }

    // === Reports ===

    fn on_report_event(&mut self, event: ReportEvent) {
        match event {
            ReportEvent::Message(ReportMessage::Console { channel, line, output }) => {
                self.emit(line, FramePayload::Console(ConsoleOutput { channel, text: output }));
            }
            ReportEvent::Message(ReportMessage::End) => tracing::debug!("Test framework finished"),
            ReportEvent::Message(message) => {
                if let Some(report) = message.into_test_report() {
                    tracing::debug!(title = %report.title, state = ?report.state, "Test finished");
                    self.reports.push(report);
                }
            }
            ReportEvent::Closed => self.report_closed = true,
        }
    }

    fn emit(&mut self, line: usize, payload: FramePayload) {
        let frame = Frame {
            line,
            test_line: self.extraction.owner_of(line),
            payload,
        };
        tracing::trace!(?frame, "Frame");
        self.frames.push(frame);
    }

    // === Cleanup ===

    /// Kill the child if it is still running; safe to call repeatedly and
    /// from any state
    pub fn dispose(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if !matches!(child.try_wait(), Ok(Some(_))) {
                match child.start_kill() {
                    Ok(()) => tracing::debug!("Killed test process"),
                    Err(e) => tracing::debug!("Failed to kill test process: {}", e),
                }
            }
        }
        if let Some(report) = self.report.as_mut() {
            report.stop_accepting();
        }
        if !matches!(self.state, SessionState::Closed | SessionState::Failed) {
            self.transition(SessionState::Closed);
        }
    }
}

impl Drop for DebugSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use futures_util::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use tokio_tungstenite::tungstenite::Message;

    use crate::session::frames::ValueSummary;

    /// Scripted inspector peer
    ///
    /// Answers every request with an empty result, except
    /// `Runtime.getProperties` (canned per object id) and
    /// `Debugger.setBreakpointByUrl` (an id built from the line).
    struct MockInspector {
        url: String,
        methods: Arc<Mutex<Vec<String>>>,
    }

    impl MockInspector {
        async fn start(properties: HashMap<&'static str, Value>) -> Self {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("ws://{}", listener.local_addr().unwrap());
            let methods = Arc::new(Mutex::new(Vec::new()));
            let seen = methods.clone();

            tokio::spawn(async move {
                let (stream, _) = listener.accept().await.unwrap();
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                while let Some(Ok(message)) = ws.next().await {
                    let Message::Text(text) = message else {
                        continue;
                    };
                    let request: Value = serde_json::from_str(&text).unwrap();
                    let method = request["method"].as_str().unwrap_or_default().to_string();
                    let result = match method.as_str() {
                        "Runtime.getProperties" => {
                            let object_id = request["params"]["objectId"].as_str().unwrap_or_default();
                            json!({"result": properties.get(object_id).cloned().unwrap_or_else(|| json!([]))})
                        }
                        "Debugger.setBreakpointByUrl" => json!({
                            "breakpointId": format!("1:{}:0:{}", request["params"]["lineNumber"], request["params"]["url"].as_str().unwrap_or_default()),
                            "locations": []
                        }),
                        _ => json!({}),
                    };
                    seen.lock().unwrap().push(method);
                    let response = json!({"id": request["id"], "result": result});
                    if ws.send(Message::Text(response.to_string().into())).await.is_err() {
                        break;
                    }
                }
            });

            Self { url, methods }
        }

        fn methods(&self) -> Vec<String> {
            self.methods.lock().unwrap().clone()
        }
    }

    /// Connect `session` to `mock` as if it had been started
    async fn attach(session: &mut DebugSession, mock: &MockInspector, state: SessionState) {
        let client = InspectorClient::connect(&mock.url, session.events_tx.clone())
            .await
            .unwrap();
        session.client = Some(client);
        session.state = state;
    }

    /// A pause with frames given as (scriptId, functionLine, line) in protocol lines
    fn paused(reason: &str, frames: &[(&str, i64, i64)], data: Option<Value>) -> PausedEvent {
        let call_frames: Vec<Value> = frames
            .iter()
            .enumerate()
            .map(|(i, (script_id, function_line, line))| {
                json!({
                    "callFrameId": i.to_string(),
                    "functionName": "",
                    "functionLocation": {"scriptId": script_id, "lineNumber": function_line, "columnNumber": 12},
                    "location": {"scriptId": script_id, "lineNumber": line, "columnNumber": 2},
                    "url": "",
                    "scopeChain": [
                        {"type": "local", "object": {"type": "object", "className": "Object", "objectId": format!("scope:{}", i)}},
                        {"type": "global", "object": {"type": "object", "className": "global", "objectId": "global"}}
                    ]
                })
            })
            .collect();
        let mut event = json!({"callFrames": call_frames, "reason": reason});
        if let Some(data) = data {
            event["data"] = data;
        }
        serde_json::from_value(event).unwrap()
    }

    fn error_object() -> Value {
        json!({
            "type": "object",
            "subtype": "error",
            "className": "Error",
            "description": "Error: boom\n    at Context.<anonymous>",
            "objectId": "error:1"
        })
    }

    /// Session whose target was parsed as script 107, with line 2 armed and owned by line 1
    async fn running_session(properties: HashMap<&'static str, Value>) -> (tempfile::TempDir, DebugSession, MockInspector) {
        let (dir, mut session) = session();
        let mock = MockInspector::start(properties).await;
        attach(&mut session, &mock, SessionState::Running).await;
        let url = session.target().url().to_string();
        session.on_script_parsed("107".into(), &url);
        session.armed.insert(2);
        session.extraction.line_map.insert(2, 1);
        (dir, session, mock)
    }

    fn session() -> (tempfile::TempDir, DebugSession) {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sample.spec.js");
        std::fs::write(&script, "it('a', function () {\n  let x = 1;\n});\n").unwrap();
        let session = DebugSession::new(
            Config::default(),
            &script,
            ExtractionResult::default(),
            FunctionSignatures::default(),
        )
        .unwrap();
        (dir, session)
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::AwaitingInitialPause.to_string(), "awaiting initial pause");
        assert_eq!(SessionState::BreakpointsArmed.to_string(), "breakpoints armed");
    }

    #[tokio::test]
    async fn test_operations_require_start() {
        let (_dir, mut session) = session();
        assert_eq!(session.state(), SessionState::Idle);

        let err = session.set_breakpoints(&[2]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        let err = session.run().await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (_dir, mut session) = session();
        session.dispose();
        session.dispose();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_missing_node_fails_start() {
        let (_dir, mut session) = session();
        session.config.node.path = "/definitely/not/node".into();
        let err = session.start(&Matcher::exact("a")).await.unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(_)));
        assert_eq!(session.state(), SessionState::Failed);
        session.dispose();
    }

    #[test]
    fn test_console_reports_become_frames() {
        let (_dir, mut session) = session();
        session.extraction.line_map.insert(2, 1);
        session.on_report_event(ReportEvent::Message(ReportMessage::Console {
            channel: crate::report::ConsoleChannel::Stdout,
            line: 2,
            output: "hello".into(),
        }));
        session.on_report_event(ReportEvent::Closed);

        let frames = session.frames.at(2);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].test_line, Some(1));
        assert!(session.report_closed);
    }

    #[tokio::test]
    async fn test_breakpoint_then_step_records_locals_at_the_hit_line() {
        let properties = HashMap::from([(
            "scope:0",
            json!([{"name": "x", "value": {"type": "number", "value": 1, "description": "1"}}]),
        )]);
        let (_dir, mut session, mock) = running_session(properties).await;

        // Hit on line 2, then the step lands on the closing line 3 of the same function
        session.on_pause(paused("other", &[("107", 0, 1)], None)).await.unwrap();
        assert!(session.frames.is_empty());
        session.on_pause(paused("other", &[("107", 0, 2)], None)).await.unwrap();

        let frames = session.frames.at(2);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].test_line, Some(1));
        let FramePayload::Locals(snapshot) = &frames[0].payload else {
            panic!("Expected locals, got {:?}", frames[0].payload);
        };
        assert_eq!(
            snapshot.local("x"),
            Some(&ValueSummary::Scalar {
                value_type: "number".into(),
                value: json!(1),
            })
        );
        assert!(session.frames.at(3).is_empty());
        assert_eq!(
            mock.methods(),
            vec!["Debugger.stepOver", "Runtime.getProperties", "Debugger.resume"]
        );
        assert_eq!(session.state(), SessionState::Running);
    }

    #[tokio::test]
    async fn test_exception_lands_on_first_frame_of_the_script() {
        let properties = HashMap::from([(
            "error:1",
            json!([{"name": "message", "value": {"type": "string", "value": "boom"}}]),
        )]);
        let (_dir, mut session, mock) = running_session(properties).await;

        // The line is stepped over, then throws from inside a library frame
        session.on_pause(paused("other", &[("107", 0, 1)], None)).await.unwrap();
        session
            .on_pause(paused("exception", &[("9", 40, 52), ("107", 0, 1)], Some(error_object())))
            .await
            .unwrap();

        let frames = session.frames.at(2);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].test_line, Some(1));
        let FramePayload::Exception(info) = &frames[0].payload else {
            panic!("Expected exception, got {:?}", frames[0].payload);
        };
        assert_eq!(info.text, "boom");
        assert_eq!(info.class_name.as_deref(), Some("Error"));
        assert!(session.frames.at(53).is_empty());
        assert_eq!(mock.methods().last().map(String::as_str), Some("Debugger.resume"));
    }

    #[tokio::test]
    async fn test_pause_outside_the_script_is_resumed_without_frames() {
        let (_dir, mut session, mock) = running_session(HashMap::new()).await;

        // Same line number as the armed one, different script
        session.on_pause(paused("other", &[("9", 0, 1)], None)).await.unwrap();
        session
            .on_pause(paused("exception", &[("9", 0, 1)], Some(error_object())))
            .await
            .unwrap();

        assert!(session.frames.is_empty());
        assert_eq!(mock.methods(), vec!["Debugger.resume", "Debugger.resume"]);
    }

    #[tokio::test]
    async fn test_resolved_breakpoints_identify_the_script() {
        let (_dir, mut session) = session();
        let mock = MockInspector::start(HashMap::new()).await;
        attach(&mut session, &mock, SessionState::Ready).await;

        session.set_breakpoints(&[2]).await.unwrap();
        assert_eq!(session.state(), SessionState::BreakpointsArmed);
        let breakpoint_id = format!("1:1:0:{}", session.target().url());
        assert!(session.breakpoint_ids.contains(&breakpoint_id));

        session.on_breakpoint_resolved("unrelated", "5".into());
        session.on_breakpoint_resolved(&breakpoint_id, "107".into());
        assert!(session.script_ids.contains("107"));
        assert!(!session.script_ids.contains("5"));
    }

    #[test]
    fn test_other_scripts_are_not_the_target() {
        let (_dir, mut session) = session();
        session.on_script_parsed("9".into(), "node:internal/modules/cjs/loader");
        session.on_script_parsed("10".into(), "");
        assert!(session.script_ids.is_empty());

        let path = session.target().path().to_string_lossy().into_owned();
        session.on_script_parsed("107".into(), &path);
        assert!(session.script_ids.contains("107"));
    }
}
