//! Structural pass over the directive token stream

use std::collections::BTreeMap;

use crate::parser::lexer::{lex, Span, Token};

/// Block name to block body text
pub type BlockMap = BTreeMap<String, String>;

/// A `{% block NAME %}...{% endblock %}` span found in a source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    pub name: String,
    /// Range of the body, between the opening tag and `{% endblock %}`
    pub body: Span,
    /// Range of the whole span, tags included
    pub span: Span,
}

impl BlockSpan {
    /// An empty slot is written `{% block NAME %}{% endblock %}`
    pub fn is_empty_slot(&self) -> bool {
        self.body.is_empty()
    }
}

/// Directives extracted from one template's raw text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTemplate {
    /// Parent template reference; the first `extends` directive wins
    pub extends: Option<String>,
    /// Include references in source order, duplicates kept
    pub includes: Vec<String>,
    /// Block definitions; a later declaration of a name overwrites an earlier one
    pub defined_blocks: BlockMap,
    /// Usage markers by block name, holding the literal marker text
    pub used_blocks: BlockMap,
}

/// Parse a template's raw text into its directives
///
/// Parsing never fails: anything that is not one of the four directive forms
/// is plain text.
pub fn parse(source: &str) -> ParsedTemplate {
    let mut parsed = ParsedTemplate::default();

    for (token, span) in lex(source) {
        match token {
            Token::Extends(path) => {
                if parsed.extends.is_none() {
                    parsed.extends = Some(path);
                }
            }
            Token::Include(path) => parsed.includes.push(path),
            Token::BlockUsage(name) => {
                parsed.used_blocks.insert(name, source[span].to_string());
            }
            Token::BlockOpen(_) | Token::EndBlock | Token::Text => {}
        }
    }

    parsed.defined_blocks = defined_blocks(source);
    parsed
}

/// Find every block span in `source`
///
/// A block runs from its opening tag to the first `{% endblock %}` after it.
/// Opening tags inside a body are part of the body. An opening tag without a
/// matching `{% endblock %}` and a stray `{% endblock %}` are plain text.
pub fn block_spans(source: &str) -> Vec<BlockSpan> {
    let mut spans = Vec::new();
    let mut open: Option<(String, Span)> = None;

    for (token, span) in lex(source) {
        match token {
            Token::BlockOpen(name) if open.is_none() => open = Some((name, span)),
            Token::EndBlock => {
                if let Some((name, tag)) = open.take() {
                    spans.push(BlockSpan {
                        name,
                        body: tag.end..span.start,
                        span: tag.start..span.end,
                    });
                }
            }
            _ => {}
        }
    }

    spans
}

/// Collect block definitions, last declaration of a name wins
pub fn defined_blocks(source: &str) -> BlockMap {
    block_spans(source)
        .into_iter()
        .map(|block| (block.name, source[block.body].to_string()))
        .collect()
}

/// Rebuild `source` with each span replaced by its paired text
///
/// Edits must be sorted by position and must not overlap.
pub fn splice<S: AsRef<str>>(source: &str, edits: impl IntoIterator<Item = (Span, S)>) -> String {
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;

    for (span, replacement) in edits {
        debug_assert!(span.start >= cursor, "overlapping or unsorted edit");
        out.push_str(&source[cursor..span.start]);
        out.push_str(replacement.as_ref());
        cursor = span.end;
    }

    out.push_str(&source[cursor..]);
    out
}
