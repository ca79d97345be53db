//! Report channel message format
//!
//! The adapter writes one JSON object per line, tagged by `message`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message from the test-framework adapter
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "message", rename_all = "lowercase")]
pub enum ReportMessage {
    /// Console output traced back to a script line
    Console {
        #[serde(rename = "type")]
        channel: ConsoleChannel,
        line: usize,
        output: String,
    },
    Pass { test: TestInfo },
    Fail {
        test: TestInfo,
        #[serde(default)]
        err: Option<Value>,
    },
    Pending { test: TestInfo },
    /// The framework finished; no further messages follow
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleChannel {
    Stdout,
    Stderr,
}

/// Test object as the framework describes it
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestInfo {
    pub title: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub timed_out: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestState {
    Passed,
    Failed,
    Pending,
}

/// Error attached to a failed test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl TestError {
    /// Lift the framework's serialized error; a bare string becomes the message
    fn from_value(value: Value) -> Self {
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
        match &value {
            Value::String(message) => Self {
                name: None,
                message: message.clone(),
                stack: None,
            },
            _ => Self {
                name: field("name"),
                message: field("message").unwrap_or_else(|| value.to_string()),
                stack: field("stack"),
            },
        }
    }
}

/// Outcome of one completed test
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub title: String,
    pub state: TestState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TestError>,
}

impl TestReport {
    fn new(test: TestInfo, state: TestState, error: Option<TestError>) -> Self {
        Self {
            title: test.title,
            state,
            duration_ms: test.duration,
            timed_out: test.timed_out.unwrap_or(false),
            error,
        }
    }
}

impl ReportMessage {
    /// The test outcome this message carries, if any
    pub fn into_test_report(self) -> Option<TestReport> {
        match self {
            ReportMessage::Pass { test } => Some(TestReport::new(test, TestState::Passed, None)),
            ReportMessage::Fail { test, err } => Some(TestReport::new(
                test,
                TestState::Failed,
                err.map(TestError::from_value),
            )),
            ReportMessage::Pending { test } => Some(TestReport::new(test, TestState::Pending, None)),
            ReportMessage::Console { .. } | ReportMessage::End => None,
        }
    }

    /// Parse one line of the report stream
    pub fn parse_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}
