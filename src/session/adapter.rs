//! The test-framework adapter script run inside the child

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::common::config::Config;
use crate::common::{Error, Result};

/// Mocha driver shipped with linetrace
pub const EMBEDDED_ADAPTER: &str = include_str!("../../assets/mocha-adapter.js");

/// Adapter script on disk for the lifetime of a session
pub enum AdapterScript {
    /// Path from `[adapter].script`
    Configured(PathBuf),
    /// Embedded adapter written to a temporary file
    Embedded(NamedTempFile),
}

impl AdapterScript {
    pub fn prepare(config: &Config) -> Result<Self> {
        if let Some(path) = &config.adapter.script {
            if !path.is_file() {
                return Err(Error::Config(format!(
                    "Adapter script not found: {}",
                    path.display()
                )));
            }
            return Ok(Self::Configured(path.clone()));
        }

        let mut file = tempfile::Builder::new()
            .prefix("linetrace-adapter-")
            .suffix(".js")
            .tempfile()?;
        file.write_all(EMBEDDED_ADAPTER.as_bytes())?;
        file.flush()?;
        Ok(Self::Embedded(file))
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Configured(path) => path,
            Self::Embedded(file) => file.path(),
        }
    }
}
