//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Node.js executable settings
    #[serde(default)]
    pub node: NodeConfig,

    /// Inspector endpoint settings
    #[serde(default)]
    pub inspector: InspectorConfig,

    /// Test-framework adapter settings
    #[serde(default)]
    pub adapter: AdapterConfig,

    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Self-instrumentation guard
    #[serde(default)]
    pub guard: GuardConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node.js executable used to run the test process
#[derive(Debug, Deserialize, Clone)]
pub struct NodeConfig {
    /// Executable name or path; bare names are looked up in PATH
    #[serde(default = "default_node")]
    pub path: PathBuf,

    /// Extra arguments placed before the adapter script
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            path: default_node(),
            args: Vec::new(),
        }
    }
}

fn default_node() -> PathBuf {
    PathBuf::from("node")
}

/// Where the child's inspector listens
#[derive(Debug, Deserialize, Clone)]
pub struct InspectorConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// 0 lets the child pick a free port
    #[serde(default)]
    pub port: u16,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Test-framework adapter run inside the child
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AdapterConfig {
    /// Use this script instead of the built-in mocha adapter
    #[serde(default)]
    pub script: Option<PathBuf>,
}

/// Default settings
#[derive(Debug, Deserialize, Clone)]
pub struct Defaults {
    /// Test-registration function when none is given
    #[serde(default = "default_function")]
    pub function: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            function: default_function(),
        }
    }
}

fn default_function() -> String {
    "it".to_string()
}

/// Script names that must never be traced
#[derive(Debug, Deserialize, Clone)]
pub struct GuardConfig {
    #[serde(default = "default_reserved")]
    pub reserved: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            reserved: default_reserved(),
        }
    }
}

fn default_reserved() -> Vec<String> {
    vec!["linetrace.selftest.js".to_string()]
}

/// Log output settings
#[derive(Debug, Deserialize, Default, Clone)]
pub struct LoggingConfig {
    /// Also write logs to this file
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Resolve the Node.js executable
    ///
    /// Paths containing a separator are used as-is, bare names go through PATH
    pub fn node_executable(&self) -> Result<PathBuf> {
        let node = &self.node.path;
        if node.components().count() > 1 {
            if node.exists() {
                return Ok(node.clone());
            }
            return Err(Error::NodeNotFound(node.display().to_string()));
        }
        which::which(node).map_err(|_| Error::NodeNotFound(node.display().to_string()))
    }

    /// Whether `script` is on the self-instrumentation guard list
    pub fn is_reserved(&self, script: &Path) -> bool {
        script
            .file_name()
            .and_then(|n| n.to_str())
            .map(|name| self.guard.reserved.iter().any(|r| r == name))
            .unwrap_or(false)
    }
}
