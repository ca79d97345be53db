//! Listening end of the report channel
//!
//! Unix domain socket on Unix/macOS, named pipe on Windows. The child
//! connects once; its newline-delimited messages are forwarded as
//! [`ReportEvent`]s until the stream ends.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::common::paths::{self, ReportEndpoint};
use crate::common::Result;

use super::protocol::ReportMessage;

#[cfg(unix)]
mod platform {
    pub use interprocess::local_socket::tokio::{prelude::*, Listener};
    pub use interprocess::local_socket::{GenericFilePath, ListenerOptions};
}

#[cfg(windows)]
mod platform {
    pub use interprocess::local_socket::tokio::{prelude::*, Listener};
    pub use interprocess::local_socket::{GenericNamespaced, ListenerOptions};
}

use platform::*;

/// What the channel delivers to the session
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    Message(ReportMessage),
    /// The stream ended, or no child ever connected
    Closed,
}

/// One session's report listener
pub struct ReportChannel {
    endpoint: ReportEndpoint,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ReportChannel {
    /// Bind a fresh endpoint and start accepting in the background
    pub async fn bind<E>(events: mpsc::UnboundedSender<E>) -> Result<Self>
    where
        E: From<ReportEvent> + Send + 'static,
    {
        paths::ensure_socket_dir()?;
        let endpoint = paths::report_endpoint();
        paths::remove_socket(&endpoint)?;

        let listener = create_listener(&endpoint)?;
        tracing::debug!(endpoint = %endpoint.child_path, "Report channel listening");

        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(serve(listener, stop_rx, events));

        Ok(Self {
            endpoint,
            stop: Some(stop),
            task,
        })
    }

    /// Path the child connects to
    pub fn child_path(&self) -> &str {
        &self.endpoint.child_path
    }

    /// Give up on a child that has not connected yet
    ///
    /// A stream that is already connected is still read to its end.
    pub fn stop_accepting(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for ReportChannel {
    fn drop(&mut self) {
        self.task.abort();
        if let Err(e) = paths::remove_socket(&self.endpoint) {
            tracing::debug!("Failed to remove report socket: {}", e);
        }
    }
}

fn create_listener(endpoint: &ReportEndpoint) -> std::io::Result<Listener> {
    #[cfg(unix)]
    let listener = {
        let name = endpoint.name.as_str().to_fs_name::<GenericFilePath>()?;
        let listener = ListenerOptions::new().name(name).create_tokio()?;

        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&endpoint.name, std::fs::Permissions::from_mode(0o600))?;
        listener
    };

    #[cfg(windows)]
    let listener = {
        let name = endpoint.name.as_str().to_ns_name::<GenericNamespaced>()?;
        ListenerOptions::new().name(name).create_tokio()?
    };

    Ok(listener)
}

async fn serve<E>(listener: Listener, stop: oneshot::Receiver<()>, events: mpsc::UnboundedSender<E>)
where
    E: From<ReportEvent>,
{
    let stream = tokio::select! {
        biased;
        accepted = listener.accept() => match accepted {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Report channel accept failed: {}", e);
                let _ = events.send(ReportEvent::Closed.into());
                return;
            }
        },
        _ = stop => {
            tracing::debug!("No child connected to the report channel");
            let _ = events.send(ReportEvent::Closed.into());
            return;
        }
    };
    tracing::debug!("Child connected to the report channel");

    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match ReportMessage::parse_line(line) {
                    Ok(message) => {
                        tracing::trace!(?message, "Report");
                        let _ = events.send(ReportEvent::Message(message).into());
                    }
                    Err(e) => tracing::warn!("Skipping malformed report line: {}", e),
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Report channel read failed: {}", e);
                break;
            }
        }
    }

    let _ = events.send(ReportEvent::Closed.into());
}
