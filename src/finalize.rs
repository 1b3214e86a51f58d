//! Final pass over a rendered document: deal with leftover block spans

use serde::Deserialize;
use tracing::debug;

use crate::error::{LeftoverBlock, TemplateError};
use crate::parser::{block_spans, splice};

/// What to do with block spans no template supplied content for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedBlockPolicy {
    /// Remove the spans, tags and body alike
    #[default]
    Strip,
    /// Fail the render with [`TemplateError::UnresolvedBlock`]
    Error,
}

/// Strip or reject any `{% block NAME %}...{% endblock %}` span still present
pub fn finalize(content: &str, policy: UnresolvedBlockPolicy) -> Result<String, TemplateError> {
    let leftovers = block_spans(content);
    if leftovers.is_empty() {
        return Ok(content.to_string());
    }

    match policy {
        UnresolvedBlockPolicy::Strip => {
            debug!(count = leftovers.len(), "stripping unresolved blocks");
            Ok(splice(
                content,
                leftovers.into_iter().map(|block| (block.span, "")),
            ))
        }
        UnresolvedBlockPolicy::Error => Err(TemplateError::UnresolvedBlock {
            blocks: leftovers
                .into_iter()
                .map(|block| LeftoverBlock {
                    name: block.name,
                    span: block.span,
                })
                .collect(),
            document: content.to_string(),
        }),
    }
}
