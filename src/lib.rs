//! Twine - template composition for server-rendered HTML
//!
//! Pages are built from a chain of templates using four directives:
//!
//! - `{% extends "base.html" %}` names a parent layout
//! - `{% include "nav.html" %}` splices another file's raw text
//! - `{% block NAME %}...{% endblock %}` declares an overridable region
//! - `{{ block("NAME") }}` asks for a block's resolved content
//!
//! plus `{{ key }}` variables filled from a [`RenderContext`] once the
//! structure has been resolved.
//!
//! # Example
//!
//! ```rust,no_run
//! use twine::{render_with_config, RenderConfig, RenderContext};
//!
//! let config = RenderConfig::new().with_templates_dir("site/templates");
//! let context = RenderContext::new().with("title", "Home");
//!
//! let html = render_with_config("index.html", &context, &config).unwrap();
//! println!("{html}");
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod finalize;
pub mod parser;
pub mod server;
pub mod template;

pub use config::{ConfigError, Settings};
pub use context::{substitute, RenderContext};
pub use error::TemplateError;
pub use finalize::{finalize, UnresolvedBlockPolicy};
pub use template::{analyze, compose, TemplateAnalysis, TemplateInfo};

use std::path::PathBuf;

use tracing::debug;

/// Configuration for the render pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Root directory templates are resolved against
    pub templates_dir: PathBuf,
    /// Policy for block spans left after composition
    pub unresolved_blocks: UnresolvedBlockPolicy,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            unresolved_blocks: UnresolvedBlockPolicy::default(),
        }
    }
}

impl RenderConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the templates root directory
    pub fn with_templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = dir.into();
        self
    }

    /// Set the policy for unresolved blocks
    pub fn with_unresolved_blocks(mut self, policy: UnresolvedBlockPolicy) -> Self {
        self.unresolved_blocks = policy;
        self
    }
}

/// Render a template from `./templates` with default configuration
pub fn render(entry: &str, context: &RenderContext) -> Result<String, TemplateError> {
    render_with_config(entry, context, &RenderConfig::default())
}

/// Render a template with custom configuration
///
/// Analyzes the entry and everything it reaches, composes the chain into one
/// document, substitutes variables, then applies the unresolved-block policy.
/// Every call reads the templates from disk again.
pub fn render_with_config(
    entry: &str,
    context: &RenderContext,
    config: &RenderConfig,
) -> Result<String, TemplateError> {
    let entry_path = template::resolve_entry(entry)?;
    let analysis = analyze(&config.templates_dir, entry)?;
    debug!(entry, templates = analysis.len(), "analysis complete");

    let composed = compose(&analysis, &entry_path)?;
    let substituted = substitute(&composed, context);
    finalize(&substituted, config.unresolved_blocks)
}
