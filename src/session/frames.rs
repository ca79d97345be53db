//! What a run records, line by line

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::report::ConsoleChannel;

/// One observation attributed to a source line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub line: usize,
    /// Declaration line of the test the line belongs to
    pub test_line: Option<usize>,
    #[serde(flatten)]
    pub payload: FramePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FramePayload {
    Locals(LocalsSnapshot),
    Exception(ExceptionInfo),
    Console(ConsoleOutput),
}

/// Variables visible once a line's statement has run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalsSnapshot {
    pub arguments: Vec<Binding>,
    pub locals: Vec<Binding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_value: Option<ValueSummary>,
}

impl LocalsSnapshot {
    pub fn local(&self, name: &str) -> Option<&ValueSummary> {
        self.locals.iter().find(|b| b.name == name).map(|b| &b.value)
    }

    pub fn argument(&self, name: &str) -> Option<&ValueSummary> {
        self.arguments.iter().find(|b| b.name == name).map(|b| &b.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binding {
    pub name: String,
    pub value: ValueSummary,
}

/// Shallow rendering of a value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ValueSummary {
    Scalar {
        #[serde(rename = "type")]
        value_type: String,
        value: Value,
    },
    Array {
        #[serde(rename = "className")]
        class_name: String,
        length: usize,
    },
    Object {
        #[serde(rename = "className")]
        class_name: String,
        properties: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionInfo {
    /// `error` for Error instances, otherwise the thrown value's type
    #[serde(rename = "type")]
    pub exception_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsoleOutput {
    pub channel: ConsoleChannel,
    pub text: String,
}

/// Frames keyed by line, each list in the order the frames happened
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FrameLog(BTreeMap<usize, Vec<Frame>>);

impl FrameLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.0.entry(frame.line).or_default().push(frame);
    }

    pub fn at(&self, line: usize) -> &[Frame] {
        self.0.get(&line).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lines(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.keys().copied()
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.0.values().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}
