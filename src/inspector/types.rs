//! V8 inspector message types
//!
//! Only the slice of the Chrome DevTools Protocol that tracing needs.
//! See: https://chromedevtools.github.io/devtools-protocol/v8/

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{Error, Result};

// === Line numbering ===
//
// linetrace counts lines from 1, the inspector counts them from 0. These two
// functions are the only place the conversion happens.

/// 1-based source line → inspector line
pub fn to_protocol_line(line: usize) -> i64 {
    line as i64 - 1
}

/// Inspector line → 1-based source line
pub fn from_protocol_line(line: i64) -> usize {
    (line.max(0) + 1) as usize
}

// === Base Protocol Messages ===

/// Anything the inspector sends: a response (has `id`) or an event (has `method`)
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ProtocolErrorBody>,
}

/// Error member of a failed response
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolErrorBody {
    #[serde(default)]
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<String>,
}

/// Outgoing request
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingRequest<'a> {
    pub id: i64,
    pub method: &'a str,
    pub params: Value,
}

// === Runtime domain ===

/// Mirror object referencing a value in the debuggee
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub unserializable_value: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub object_id: Option<String>,
}

impl RemoteObject {
    pub fn is_undefined(&self) -> bool {
        self.object_type == "undefined"
    }

    pub fn is_function(&self) -> bool {
        self.object_type == "function"
    }

    /// Plain objects and arrays: the values worth a property lookup
    pub fn is_inspectable(&self) -> bool {
        self.object_type == "object"
            && self.object_id.is_some()
            && matches!(self.subtype.as_deref(), None | Some("array") | Some("typedarray"))
    }

    pub fn is_array_like(&self) -> bool {
        matches!(self.subtype.as_deref(), Some("array") | Some("typedarray"))
    }

    /// Best plain representation of the value
    pub fn plain_value(&self) -> Value {
        if let Some(value) = &self.value {
            return value.clone();
        }
        if let Some(raw) = &self.unserializable_value {
            return Value::String(raw.clone());
        }
        if self.subtype.as_deref() == Some("null") {
            return Value::Null;
        }
        match &self.description {
            Some(description) => Value::String(description.clone()),
            None => Value::Null,
        }
    }
}

/// One property of an inspected object
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(default)]
    pub value: Option<RemoteObject>,
    #[serde(default)]
    pub is_own: Option<bool>,
}

/// Response body of `Runtime.getProperties`
#[derive(Debug, Clone, Deserialize)]
pub struct GetPropertiesResult {
    pub result: Vec<PropertyDescriptor>,
}

// === Debugger domain ===

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub script_id: String,
    pub line_number: i64,
    #[serde(default)]
    pub column_number: Option<i64>,
}

/// A scope in a call frame's scope chain
#[derive(Debug, Clone, Deserialize)]
pub struct Scope {
    #[serde(rename = "type")]
    pub scope_type: String,
    pub object: RemoteObject,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    pub call_frame_id: String,
    #[serde(default)]
    pub function_name: String,
    #[serde(default)]
    pub function_location: Option<Location>,
    pub location: Location,
    /// Deprecated by the protocol; empty in current Node.js
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub scope_chain: Vec<Scope>,
    #[serde(default)]
    pub return_value: Option<RemoteObject>,
}

impl CallFrame {
    /// 1-based line the frame is paused on
    pub fn line(&self) -> usize {
        from_protocol_line(self.location.line_number)
    }
}

/// Body of `Debugger.paused`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedEvent {
    pub call_frames: Vec<CallFrame>,
    pub reason: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub hit_breakpoints: Vec<String>,
}

impl PausedEvent {
    pub fn is_exception(&self) -> bool {
        matches!(self.reason.as_str(), "exception" | "promiseRejection")
    }

    /// The thrown value, for exception pauses
    pub fn exception(&self) -> Option<RemoteObject> {
        self.data
            .clone()
            .and_then(|data| serde_json::from_value(data).ok())
    }
}

/// Response body of `Debugger.setBreakpointByUrl`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointByUrlResult {
    pub breakpoint_id: String,
    #[serde(default)]
    pub locations: Vec<Location>,
}

// === Events ===

/// Inspector events the session reacts to
#[derive(Debug, Clone)]
pub enum InspectorEvent {
    Paused(PausedEvent),
    Resumed,
    ExecutionContextCreated { id: i64, is_default: bool },
    /// An execution context went away; the default one goes when the process exits
    ExecutionContextDestroyed { id: Option<i64> },
    /// V8 compiled a script; frames refer to it by `script_id`
    ScriptParsed { script_id: String, url: String },
    /// V8 could not compile the script loaded from `url`
    ScriptFailedToParse { url: String },
    /// A by-url breakpoint bound to a location in a newly parsed script
    BreakpointResolved { breakpoint_id: String, location: Location },
    /// The WebSocket closed or failed
    Disconnected { reason: Option<String> },
    /// Anything else, by method name
    Other(String),
}

impl InspectorEvent {
    pub fn from_message(method: &str, params: Option<Value>) -> Result<Self> {
        let params = params.unwrap_or(Value::Null);
        Ok(match method {
            "Debugger.paused" => Self::Paused(serde_json::from_value(params).map_err(|e| {
                Error::Protocol(format!("Malformed Debugger.paused event: {}", e))
            })?),
            "Debugger.resumed" => Self::Resumed,
            "Runtime.executionContextCreated" => {
                let context = &params["context"];
                Self::ExecutionContextCreated {
                    id: context["id"].as_i64().unwrap_or_default(),
                    is_default: context["auxData"]["isDefault"].as_bool().unwrap_or(false),
                }
            }
            "Runtime.executionContextDestroyed" => Self::ExecutionContextDestroyed {
                id: params.get("executionContextId").and_then(Value::as_i64),
            },
            "Debugger.scriptParsed" => Self::ScriptParsed {
                script_id: string_param(&params, "scriptId"),
                url: string_param(&params, "url"),
            },
            "Debugger.scriptFailedToParse" => Self::ScriptFailedToParse {
                url: string_param(&params, "url"),
            },
            "Debugger.breakpointResolved" => {
                let location = serde_json::from_value(params["location"].clone()).map_err(|e| {
                    Error::Protocol(format!("Malformed Debugger.breakpointResolved event: {}", e))
                })?;
                Self::BreakpointResolved {
                    breakpoint_id: string_param(&params, "breakpointId"),
                    location,
                }
            }
            other => Self::Other(other.to_string()),
        })
    }
}

fn string_param(params: &Value, name: &str) -> String {
    params
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
