//! Settings for the twine server and CLI
//!
//! Settings are read from a TOML file. Every key is optional; missing keys
//! take the defaults below.
//!
//! ```toml
//! templates_dir = "templates"
//! static_dir = "static"
//! bind = "127.0.0.1:8080"
//! auto_register_routes = true
//! index_template = "index.html"
//! strict_blocks = false
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::finalize::UnresolvedBlockPolicy;
use crate::RenderConfig;

/// Errors that can occur when loading settings or data files
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported data file {} (expected .json or .toml)", path.display())]
    UnsupportedDataFile { path: PathBuf },
    #[error("Invalid variable assignment '{0}' (expected key=value)")]
    InvalidAssignment(String),
}

/// Server and render settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root directory for template lookup
    pub templates_dir: PathBuf,
    /// Directory served under `/static/`
    pub static_dir: PathBuf,
    /// Socket address the server listens on
    pub bind: String,
    /// Serve every `*route*` template under its own path
    pub auto_register_routes: bool,
    /// Template rendered for `/`
    pub index_template: String,
    /// Fail renders that leave block spans behind instead of stripping them
    pub strict_blocks: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
            bind: "127.0.0.1:8080".to_string(),
            auto_register_routes: true,
            index_template: "index.html".to_string(),
            strict_blocks: false,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_str(&content)
    }

    /// Load settings from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Render configuration derived from these settings
    pub fn render_config(&self) -> RenderConfig {
        let policy = if self.strict_blocks {
            UnresolvedBlockPolicy::Error
        } else {
            UnresolvedBlockPolicy::Strip
        };
        RenderConfig::new()
            .with_templates_dir(&self.templates_dir)
            .with_unresolved_blocks(policy)
    }
}

/// Parse a `key=value` command-line assignment
pub fn parse_assignment(input: &str) -> Result<(String, String), ConfigError> {
    match input.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ConfigError::InvalidAssignment(input.to_string())),
    }
}
