//! Inspector client for a Node.js child started with `--inspect-brk`
//!
//! The WebSocket is split into a writer task fed by a channel and a reader
//! task that completes pending requests and forwards events. Requests take
//! `&self`, so several can be in flight at once (breakpoints are armed
//! concurrently).

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::common::{Error, Result};

use super::types::*;

/// A request waiting for its response
struct PendingRequest {
    method: String,
    tx: oneshot::Sender<Result<Value>>,
}

type Pending = Arc<Mutex<HashMap<i64, PendingRequest>>>;

/// Connection to one V8 inspector target
pub struct InspectorClient {
    url: String,
    /// Messages for the writer task
    outgoing: mpsc::UnboundedSender<Message>,
    /// Id for the next request
    next_id: AtomicI64,
    /// Requests waiting for their response
    pending: Pending,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl InspectorClient {
    /// Connect to `url` and start forwarding events into `events`
    ///
    /// When the socket closes, every pending request fails with
    /// [`Error::Disconnected`] and a final [`InspectorEvent::Disconnected`]
    /// is sent.
    pub async fn connect<E>(url: &str, events: mpsc::UnboundedSender<E>) -> Result<Self>
    where
        E: From<InspectorEvent> + Send + 'static,
    {
        let (stream, _) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| Error::ConnectionFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
        tracing::debug!(url, "Connected to inspector");

        let (mut sink, mut source) = stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    tracing::debug!("Inspector write failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader_pending = pending.clone();
        let reader = tokio::spawn(async move {
            let mut reason = None;
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        dispatch(text.as_ref(), &reader_pending, &events).await;
                    }
                    Ok(Message::Close(frame)) => {
                        reason = frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        reason = Some(e.to_string());
                        break;
                    }
                }
            }

            // Dropping the senders fails every waiting request
            reader_pending.lock().await.clear();
            tracing::debug!(?reason, "Inspector connection closed");
            let _ = events.send(InspectorEvent::Disconnected { reason }.into());
        });

        Ok(Self {
            url: url.to_string(),
            outgoing,
            next_id: AtomicI64::new(1),
            pending,
            reader,
            writer,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a request and wait for its result
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> Result<T> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(
            id,
            PendingRequest {
                method: method.to_string(),
                tx,
            },
        );

        let request = OutgoingRequest {
            id,
            method,
            params: params.unwrap_or_else(|| json!({})),
        };
        let text = serde_json::to_string(&request)?;
        tracing::trace!("Inspector >>> {}", text);

        if self.outgoing.send(Message::Text(text.into())).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(Error::Disconnected);
        }

        let result = rx.await.map_err(|_| Error::Disconnected)??;
        serde_json::from_value(result)
            .map_err(|e| Error::Protocol(format!("Failed to parse {} response: {}", method, e)))
    }

    /// Send a request whose result carries nothing of interest
    async fn command(&self, method: &str, params: Option<Value>) -> Result<()> {
        let _: Value = self.request(method, params).await?;
        Ok(())
    }

    // === Startup ===

    pub async fn enable_runtime(&self) -> Result<()> {
        self.command("Runtime.enable", None).await
    }

    pub async fn enable_debugger(&self) -> Result<()> {
        self.command("Debugger.enable", None).await
    }

    /// Release a child held by `--inspect-brk`
    pub async fn run_if_waiting_for_debugger(&self) -> Result<()> {
        self.command("Runtime.runIfWaitingForDebugger", None).await
    }

    /// `state` is one of `none`, `uncaught`, `all`
    pub async fn set_pause_on_exceptions(&self, state: &str) -> Result<()> {
        self.command("Debugger.setPauseOnExceptions", Some(json!({ "state": state })))
            .await
    }

    // === Breakpoints ===

    /// Arm a breakpoint on a 1-based `line` of the script loaded from `url`
    pub async fn set_breakpoint_by_url(&self, url: &str, line: usize) -> Result<SetBreakpointByUrlResult> {
        self.request(
            "Debugger.setBreakpointByUrl",
            Some(json!({
                "url": url,
                "lineNumber": to_protocol_line(line),
            })),
        )
        .await
    }

    // === Execution control ===

    pub async fn resume(&self) -> Result<()> {
        self.command("Debugger.resume", None).await
    }

    pub async fn step_over(&self) -> Result<()> {
        self.command("Debugger.stepOver", None).await
    }

    // === Inspection ===

    /// Own properties of a remote object
    pub async fn get_properties(&self, object_id: &str) -> Result<Vec<PropertyDescriptor>> {
        let result: GetPropertiesResult = self
            .request(
                "Runtime.getProperties",
                Some(json!({
                    "objectId": object_id,
                    "ownProperties": true,
                })),
            )
            .await?;
        Ok(result.result)
    }

    /// Close the WebSocket
    ///
    /// A finished Node.js child does not exit while a debugger is attached.
    pub fn close(&self) {
        let _ = self.outgoing.send(Message::Close(None));
    }
}

impl Drop for InspectorClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Route one inbound text frame
async fn dispatch<E>(text: &str, pending: &Pending, events: &mpsc::UnboundedSender<E>)
where
    E: From<InspectorEvent>,
{
    tracing::trace!("Inspector <<< {}", text);

    let message: IncomingMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Ignoring malformed inspector message: {}", e);
            return;
        }
    };

    if let Some(id) = message.id {
        let Some(request) = pending.lock().await.remove(&id) else {
            tracing::debug!(id, "Response for unknown request");
            return;
        };
        let result = match message.error {
            Some(error) => {
                let detail = match error.data {
                    Some(data) => format!("{} ({})", error.message, data),
                    None => error.message,
                };
                Err(Error::request_failed(&request.method, &detail))
            }
            None => Ok(message.result.unwrap_or(Value::Null)),
        };
        let _ = request.tx.send(result);
        return;
    }

    if let Some(method) = message.method {
        match InspectorEvent::from_message(&method, message.params) {
            Ok(event) => {
                let _ = events.send(event.into());
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }
}
