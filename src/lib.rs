//! Parser helpers for the shell.
//!
//! This crate exposes a minimal API so fuzz targets and black-box tests can
//! link only the tokenizer and grammar without pulling in interactive deps.

mod error;
mod parse;

pub use error::{ErrorKind, ShellError, ShellResult};
pub use parse::{
    check, parse_command, split_segments, tokenize, validate, ParsedCommand, Token, TokenKind,
    AND_OPERATOR,
};

/// Fuzz helper for parser-only targets.
pub fn fuzz_parse_bytes(data: &[u8]) {
    let input = String::from_utf8_lossy(data);
    for segment in parse::split_segments(&input) {
        let tokens = parse::tokenize(segment);
        let accepted = parse::validate(&tokens);
        if let Ok(parsed) = parse::parse_command(segment) {
            assert!(accepted);
            assert!(!parsed.words().is_empty());
        }
    }
}
