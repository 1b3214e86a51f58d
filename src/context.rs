//! Render context and variable substitution
//!
//! Variables are written `{{ key }}` with exactly one space inside each brace
//! pair. Substitution runs once over the composed document, after every
//! extends/include/block directive has been resolved.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::config::ConfigError;

const OPEN: &str = "{{ ";
const CLOSE: &str = " }}";

/// Flat mapping of variable name to value
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RenderContext {
    vars: BTreeMap<String, Value>,
}

impl RenderContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Copy every entry of `other` over this context
    pub fn merge(&mut self, other: RenderContext) {
        self.vars.extend(other.vars);
    }

    /// Parse a JSON object
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Parse a TOML document; its top-level table becomes the context
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a `.json` or `.toml` data file, picked by extension
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(ConfigError::UnsupportedDataFile {
                path: path.to_path_buf(),
            }),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RenderContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Text form of a value: strings verbatim, null empty, everything else as JSON
fn display_value(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

/// Replace every `{{ key }}` whose key is in `context`
///
/// A single left-to-right pass: substituted values are never scanned again,
/// so the result does not depend on the order of the context. Placeholders
/// with no matching key are left as they are. No escaping is applied.
pub fn substitute(content: &str, context: &RenderContext) -> String {
    if context.is_empty() {
        return content.to_string();
    }

    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(open) = rest.find(OPEN) {
        let inner = &rest[open + OPEN.len()..];
        let Some(close) = inner.find(CLOSE) else {
            break;
        };

        match context.get(&inner[..close]) {
            Some(value) => {
                out.push_str(&rest[..open]);
                out.push_str(&display_value(value));
                rest = &inner[close + CLOSE.len()..];
            }
            None => {
                out.push_str(&rest[..open + OPEN.len()]);
                rest = inner;
            }
        }
    }

    out.push_str(rest);
    out
}
