//! Cross-platform socket and configuration paths
//!
//! Unix/macOS: report sockets live at $XDG_RUNTIME_DIR/linetrace or /tmp/linetrace-<uid>
//! Windows: report channels are named pipes at \\.\pipe\linetrace-report-<pid>-<n>

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Name used for directories, sockets and pipes
const APP_NAME: &str = "linetrace";

/// Per-process counter so concurrent sessions never share an endpoint
static NEXT_ENDPOINT: AtomicU64 = AtomicU64::new(0);

/// Name of one session's report channel
///
/// `name` is what the interprocess listener binds; `child_path` is what the
/// Node.js child hands to `net.connect`.
#[derive(Debug, Clone)]
pub struct ReportEndpoint {
    pub name: String,
    pub child_path: String,
}

/// Directory holding report sockets
#[cfg(unix)]
pub fn socket_dir() -> PathBuf {
    // Try XDG_RUNTIME_DIR first (preferred on Linux)
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_NAME);
    }

    // Fallback to /tmp with uid for security
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/tmp/{}-{}", APP_NAME, uid))
}

/// Allocate a fresh report endpoint
#[cfg(unix)]
pub fn report_endpoint() -> ReportEndpoint {
    let n = NEXT_ENDPOINT.fetch_add(1, Ordering::SeqCst);
    let path = socket_dir().join(format!("report-{}-{}.sock", std::process::id(), n));
    let path = path.to_string_lossy().into_owned();
    ReportEndpoint {
        name: path.clone(),
        child_path: path,
    }
}

#[cfg(windows)]
pub fn report_endpoint() -> ReportEndpoint {
    let n = NEXT_ENDPOINT.fetch_add(1, Ordering::SeqCst);
    let name = format!("{}-report-{}-{}", APP_NAME, std::process::id(), n);
    ReportEndpoint {
        child_path: format!(r"\\.\pipe\{}", name),
        name,
    }
}

/// Ensure the socket directory exists with proper permissions
///
/// On Unix, creates the directory with mode 0700 for security
#[cfg(unix)]
pub fn ensure_socket_dir() -> io::Result<PathBuf> {
    let dir = socket_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        // Set directory permissions to 0700 (owner only)
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
    }

    Ok(dir)
}

#[cfg(windows)]
pub fn ensure_socket_dir() -> io::Result<PathBuf> {
    // Named pipes don't need a directory on Windows
    Ok(PathBuf::new())
}

/// Remove a report socket file if it exists
#[cfg(unix)]
pub fn remove_socket(endpoint: &ReportEndpoint) -> io::Result<()> {
    let path = PathBuf::from(&endpoint.name);
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    Ok(())
}

#[cfg(windows)]
pub fn remove_socket(_endpoint: &ReportEndpoint) -> io::Result<()> {
    // Named pipes are automatically cleaned up on Windows
    Ok(())
}

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/linetrace/`
/// - macOS: `~/Library/Application Support/linetrace/`
/// - Windows: `%APPDATA%\linetrace\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}
