//! Directive parser for twine templates

mod grammar;
pub mod lexer;

pub use grammar::{block_spans, defined_blocks, parse, splice, BlockMap, BlockSpan, ParsedTemplate};
pub use lexer::Span;
