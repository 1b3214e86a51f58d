//! Error types for template analysis, composition and finalization

use std::path::PathBuf;

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::parser::Span;

/// A block span that survived composition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeftoverBlock {
    pub name: String,
    /// Byte range in the rendered document
    pub span: Span,
}

/// Errors that can occur while rendering a template
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Entry, extends target or include target cannot be read
    #[error("error reading template {}: {source}", path.display())]
    TemplateUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Composition reached a path the analysis never recorded
    #[error("template not analyzed: {}", path.display())]
    TemplateNotAnalyzed { path: PathBuf },

    /// Extends/include chain revisits a template still being processed
    #[error("circular template reference detected: {}", format_chain(chain))]
    CircularReference { chain: Vec<PathBuf> },

    /// Reference is absolute or climbs out of the templates root
    #[error("invalid template reference \"{reference}\"{}", format_origin(from.as_ref()))]
    InvalidPath {
        reference: String,
        from: Option<PathBuf>,
    },

    /// Blocks nobody supplied content for, under the strict policy
    #[error("unresolved blocks: {}", format_names(blocks))]
    UnresolvedBlock {
        blocks: Vec<LeftoverBlock>,
        document: String,
    },
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn format_origin(from: Option<&PathBuf>) -> String {
    match from {
        Some(path) => format!(" in {}", path.display()),
        None => String::new(),
    }
}

fn format_names(blocks: &[LeftoverBlock]) -> String {
    blocks
        .iter()
        .map(|b| b.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl TemplateError {
    /// Format the error for a terminal
    ///
    /// Errors that point into the rendered document get an ariadne report
    /// labelling each offending span; the rest fall back to their message.
    pub fn format(&self, filename: &str) -> String {
        let TemplateError::UnresolvedBlock { blocks, document } = self else {
            return self.to_string();
        };

        let offset = blocks.first().map(|b| b.span.start).unwrap_or(0);
        let mut report =
            Report::build(ReportKind::Error, filename, offset).with_message(self.to_string());
        for block in blocks {
            report = report.with_label(
                Label::new((filename, block.span.clone()))
                    .with_message(format!("no template supplies block '{}'", block.name))
                    .with_color(Color::Red),
            );
        }

        let mut buf = Vec::new();
        match report
            .finish()
            .write((filename, Source::from(document.as_str())), &mut buf)
        {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_reference_message() {
        let err = TemplateError::CircularReference {
            chain: vec!["a.html".into(), "b.html".into(), "a.html".into()],
        };
        assert_eq!(
            err.to_string(),
            "circular template reference detected: a.html -> b.html -> a.html"
        );
    }

    #[test]
    fn test_invalid_path_message() {
        let err = TemplateError::InvalidPath {
            reference: "../secret".to_string(),
            from: Some("pages/a.html".into()),
        };
        assert_eq!(
            err.to_string(),
            "invalid template reference \"../secret\" in pages/a.html"
        );
    }

    #[test]
    fn test_format_unresolved_block_report() {
        let document = "<aside>{% block sidebar %}{% endblock %}</aside>".to_string();
        let err = TemplateError::UnresolvedBlock {
            blocks: vec![LeftoverBlock {
                name: "sidebar".to_string(),
                span: 7..40,
            }],
            document,
        };
        let report = err.format("page.html");
        assert!(report.contains("unresolved blocks: sidebar"));
        assert!(report.contains("page.html"));
        assert!(report.contains("no template supplies block 'sidebar'"));
    }

    #[test]
    fn test_format_falls_back_to_message() {
        let err = TemplateError::TemplateNotAnalyzed {
            path: "x.html".into(),
        };
        assert_eq!(err.format("x.html"), "template not analyzed: x.html");
    }
}
