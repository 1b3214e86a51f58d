//! Lexer for template directives using logos

use logos::Logos;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token {
    // Structural directives
    #[regex(r#"\{% extends "[^"]+" %\}"#, quoted)]
    Extends(String),
    #[regex(r#"\{% include "[^"]+" %\}"#, quoted)]
    Include(String),
    #[regex(r"\{% block [A-Za-z0-9_]+ %\}", block_name)]
    BlockOpen(String),
    #[token("{% endblock %}")]
    EndBlock,

    // Usage marker: {{ block("name") }}, whitespace inside the braces is optional
    #[regex(r#"\{\{[ \t\r\n\x0C]*block\("[A-Za-z0-9_]+"\)[ \t\r\n\x0C]*\}\}"#, quoted)]
    BlockUsage(String),

    // Everything else, including a lone brace that starts no directive
    #[regex(r"[^{]+")]
    #[token("{")]
    Text,
}

/// Extract the text between the first and last double quote of the slice
fn quoted(lex: &mut logos::Lexer<Token>) -> Option<String> {
    let slice = lex.slice();
    let start = slice.find('"')? + 1;
    let end = slice.rfind('"')?;
    (start < end).then(|| slice[start..end].to_string())
}

fn block_name(lex: &mut logos::Lexer<Token>) -> Option<String> {
    let slice = lex.slice();
    slice
        .strip_prefix("{% block ")?
        .strip_suffix(" %}")
        .map(str::to_string)
}

/// Lex input string into tokens with spans
///
/// Text the scanner cannot classify comes back as [`Token::Text`], so the
/// spans always tile the whole input.
pub fn lex(input: &str) -> impl Iterator<Item = (Token, Span)> + '_ {
    Lexer {
        input,
        offset: 0,
        inner: Token::lexer(input),
    }
}

/// Restarts the logos lexer one character past a failed match
///
/// A run like `{{% include "x" %}` fails as a whole once the longer pattern
/// dies, but only its first character is unclassifiable text.
struct Lexer<'a> {
    input: &'a str,
    /// Byte offset of `inner`'s source within `input`
    offset: usize,
    inner: logos::Lexer<'a, Token>,
}

impl Iterator for Lexer<'_> {
    type Item = (Token, Span);

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.inner.next()?;
        let span = self.inner.span();
        let start = self.offset + span.start;
        let end = self.offset + span.end;

        match result {
            Ok(token) => Some((token, start..end)),
            Err(()) => {
                let width = self.input[start..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
                let stop = (start + width).min(end);
                if stop < end {
                    self.offset = stop;
                    self.inner = Token::lexer(&self.input[stop..]);
                }
                Some((Token::Text, start..stop))
            }
        }
    }
}
