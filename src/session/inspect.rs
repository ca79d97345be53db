//! Turning paused call frames into snapshots

use std::collections::HashSet;

use crate::common::Result;
use crate::extract::FunctionSignatures;
use crate::inspector::{from_protocol_line, CallFrame, InspectorClient, RemoteObject};

use super::frames::{Binding, ExceptionInfo, LocalsSnapshot, ValueSummary};

/// Scope kinds whose bindings count as locals
const LOCAL_SCOPES: &[&str] = &["local", "block", "closure", "catch", "with"];

/// Summary of a value that needs no lookup, or `None` if it needs one
pub fn summarize_shallow(object: &RemoteObject) -> Option<ValueSummary> {
    if object.is_inspectable() {
        return None;
    }
    Some(ValueSummary::Scalar {
        value_type: object.subtype.clone().unwrap_or_else(|| object.object_type.clone()),
        value: object.plain_value(),
    })
}

/// Summarize a value, looking up properties of arrays and plain objects
///
/// `undefined` and functions are not worth reporting and yield `None`.
pub async fn summarize(client: &InspectorClient, object: &RemoteObject) -> Result<Option<ValueSummary>> {
    if object.is_undefined() || object.is_function() {
        return Ok(None);
    }
    if let Some(summary) = summarize_shallow(object) {
        return Ok(Some(summary));
    }

    let Some(object_id) = object.object_id.as_deref() else {
        return Ok(None);
    };
    let class_name = object.class_name.clone().unwrap_or_else(|| "Object".to_string());
    let properties = client.get_properties(object_id).await?;

    Ok(Some(if object.is_array_like() {
        ValueSummary::Array {
            class_name,
            length: properties.iter().filter(|p| p.name.parse::<usize>().is_ok()).count(),
        }
    } else {
        ValueSummary::Object {
            class_name,
            properties: properties
                .into_iter()
                .filter(|p| p.name != "__proto__")
                .map(|p| p.name)
                .collect(),
        }
    }))
}

/// Locals and arguments of a frame, with its return value if it has one
pub async fn snapshot(
    client: &InspectorClient,
    frame: &CallFrame,
    signatures: &FunctionSignatures,
) -> Result<LocalsSnapshot> {
    let parameters: Vec<String> = frame
        .function_location
        .as_ref()
        .and_then(|loc| {
            signatures.lookup(
                from_protocol_line(loc.line_number),
                loc.column_number.unwrap_or(0).max(0) as usize,
            )
        })
        .map(<[String]>::to_vec)
        .unwrap_or_default();

    let mut seen = HashSet::new();
    let mut arguments = Vec::new();
    let mut locals = Vec::new();

    // Innermost scope first, so shadowed outer bindings are skipped
    for scope in frame
        .scope_chain
        .iter()
        .filter(|scope| LOCAL_SCOPES.contains(&scope.scope_type.as_str()))
    {
        let Some(object_id) = scope.object.object_id.as_deref() else {
            continue;
        };
        for property in client.get_properties(object_id).await? {
            if !seen.insert(property.name.clone()) {
                continue;
            }
            let Some(value) = property.value else {
                continue;
            };
            let Some(summary) = summarize(client, &value).await? else {
                continue;
            };
            let binding = Binding {
                name: property.name,
                value: summary,
            };
            if scope.scope_type == "local" && parameters.contains(&binding.name) {
                arguments.push(binding);
            } else {
                locals.push(binding);
            }
        }
    }
    arguments.sort_by_key(|b| parameters.iter().position(|p| *p == b.name));

    let return_value = match frame.return_value.as_ref() {
        Some(value) if !value.is_undefined() => summarize(client, value).await?,
        _ => None,
    };

    Ok(LocalsSnapshot {
        arguments,
        locals,
        return_value,
    })
}

/// Text of a thrown value without asking the debuggee
pub fn raw_exception_text(exception: &RemoteObject) -> String {
    if let Some(value) = &exception.value {
        return match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }
    if let Some(description) = &exception.description {
        let first = description.lines().next().unwrap_or_default();
        // "Error: message" → "message"
        return match &exception.class_name {
            Some(class) => first
                .strip_prefix(class.as_str())
                .and_then(|rest| rest.strip_prefix(": "))
                .unwrap_or(first)
                .to_string(),
            None => first.to_string(),
        };
    }
    exception.object_type.clone()
}

/// Message of a thrown value, preferring its own `message` property
pub async fn exception_text(client: &InspectorClient, exception: &RemoteObject) -> String {
    if let Some(object_id) = exception.object_id.as_deref() {
        match client.get_properties(object_id).await {
            Ok(properties) => {
                let message = properties
                    .iter()
                    .find(|p| p.name == "message")
                    .and_then(|p| p.value.as_ref())
                    .and_then(|v| v.value.as_ref())
                    .and_then(|v| v.as_str());
                if let Some(message) = message {
                    return message.to_string();
                }
            }
            Err(e) => tracing::debug!("Could not read exception properties: {}", e),
        }
    }
    raw_exception_text(exception)
}

pub fn exception_info(exception: &RemoteObject, text: String) -> ExceptionInfo {
    ExceptionInfo {
        exception_type: exception
            .subtype
            .clone()
            .unwrap_or_else(|| exception.object_type.clone()),
        class_name: exception.class_name.clone(),
        text,
    }
}

pub fn is_syntax_error(exception: &RemoteObject) -> bool {
    exception.class_name.as_deref() == Some("SyntaxError")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn remote(value: serde_json::Value) -> RemoteObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_scalars_pass_through() {
        let summary = summarize_shallow(&remote(json!({"type": "number", "value": 42, "description": "42"})));
        assert_eq!(
            summary,
            Some(ValueSummary::Scalar {
                value_type: "number".into(),
                value: json!(42),
            })
        );

        let null = summarize_shallow(&remote(json!({"type": "object", "subtype": "null", "value": null})));
        assert_eq!(
            null,
            Some(ValueSummary::Scalar {
                value_type: "null".into(),
                value: json!(null),
            })
        );
    }

    #[test]
    fn test_objects_and_arrays_need_lookup() {
        assert!(summarize_shallow(&remote(
            json!({"type": "object", "className": "Object", "description": "Object", "objectId": "1"})
        ))
        .is_none());
        assert!(summarize_shallow(&remote(
            json!({"type": "object", "subtype": "array", "className": "Array", "description": "Array(2)", "objectId": "2"})
        ))
        .is_none());
    }

    #[test]
    fn test_special_objects_render_their_description() {
        let summary = summarize_shallow(&remote(json!({
            "type": "object", "subtype": "regexp", "className": "RegExp",
            "description": "/a+/g", "objectId": "4"
        })));
        assert_eq!(
            summary,
            Some(ValueSummary::Scalar {
                value_type: "regexp".into(),
                value: json!("/a+/g"),
            })
        );
    }

    #[test]
    fn test_raw_exception_text() {
        let error = remote(json!({
            "type": "object", "subtype": "error", "className": "Error",
            "description": "Error: sample error\n    at Context.<anonymous> (/w/s.js:19:11)",
            "objectId": "5"
        }));
        assert_eq!(raw_exception_text(&error), "sample error");

        let thrown_string = remote(json!({"type": "string", "value": "boom"}));
        assert_eq!(raw_exception_text(&thrown_string), "boom");

        let thrown_number = remote(json!({"type": "number", "value": 7, "description": "7"}));
        assert_eq!(raw_exception_text(&thrown_number), "7");
    }

    #[test]
    fn test_exception_info_type() {
        let error = remote(json!({"type": "object", "subtype": "error", "className": "TypeError", "objectId": "5"}));
        let info = exception_info(&error, "x is not a function".into());
        assert_eq!(info.exception_type, "error");
        assert_eq!(info.class_name.as_deref(), Some("TypeError"));
        assert!(!is_syntax_error(&error));

        let syntax = remote(json!({"type": "object", "subtype": "error", "className": "SyntaxError"}));
        assert!(is_syntax_error(&syntax));
    }
}
