//! Starting the Node.js test process
//!
//! The child runs the adapter under `--inspect-brk`, so it sits before its
//! first statement until a debugger releases it. The inspector URL comes from
//! the banner it prints on stderr.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::{Child, Command};

use crate::common::{parse_inspector_banner, Error, Result};
use crate::report::REPORT_SOCKET_ENV;

/// Everything needed to start one child
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub node: PathBuf,
    pub node_args: Vec<String>,
    /// `host:port` for `--inspect-brk`
    pub inspect_address: String,
    pub adapter: PathBuf,
    pub script: PathBuf,
    /// Regex selecting the tests to run
    pub grep: String,
    /// Where the adapter sends its reports
    pub report_path: String,
}

impl LaunchSpec {
    pub fn args(&self) -> Vec<String> {
        let mut args = self.node_args.clone();
        args.push(format!("--inspect-brk={}", self.inspect_address));
        args.push(self.adapter.to_string_lossy().into_owned());
        args.push(self.script.to_string_lossy().into_owned());
        args.push(self.grep.clone());
        args
    }
}

/// A started child and the inspector endpoint it announced
pub struct Launched {
    pub child: Child,
    pub inspector_url: String,
}

/// Start the child and wait for its inspector banner
pub async fn launch(spec: &LaunchSpec) -> Result<Launched> {
    let args = spec.args();
    tracing::debug!(node = %spec.node.display(), ?args, "Starting test process");

    let mut child = Command::new(&spec.node)
        .args(&args)
        .env(REPORT_SOCKET_ENV, &spec.report_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::SpawnFailed(format!("Failed to start {}: {}", spec.node.display(), e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::SpawnFailed("Failed to get child stdout".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::SpawnFailed("Failed to get child stderr".to_string()))?;

    tokio::spawn(forward_output(BufReader::new(stdout).lines(), "stdout"));

    let mut lines = BufReader::new(stderr).lines();
    let mut preamble = Vec::new();
    let inspector_url = loop {
        match lines.next_line().await? {
            Some(line) => {
                if let Some(url) = parse_inspector_banner(&line) {
                    break url;
                }
                preamble.push(line);
            }
            None => {
                let status = child
                    .wait()
                    .await
                    .map(|s| s.to_string())
                    .unwrap_or_else(|e| e.to_string());
                return Err(Error::SpawnFailed(format!(
                    "{} exited ({}) before its inspector started: {}",
                    spec.node.display(),
                    status,
                    preamble.join("\n").trim()
                )));
            }
        }
    };
    tracing::debug!(url = %inspector_url, "Inspector announced");

    tokio::spawn(forward_output(lines, "stderr"));

    Ok(Launched { child, inspector_url })
}

/// Relay child output into the log
async fn forward_output<R: AsyncRead + Unpin>(mut lines: Lines<BufReader<R>>, name: &'static str) {
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(target: "linetrace::child", stream = name, "{}", line);
    }
}
