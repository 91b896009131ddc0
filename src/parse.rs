//! Line splitting, tokenizing and grammar validation.
//!
//! The output of this module is deliberately flat: a validated command is the
//! original list of word and operator texts, and the executor re-reads the
//! operator positions itself.
use crate::error::ShellError;

mod grammar;
mod tokenizer;

pub use grammar::check;
// Only the library surface uses the boolean form.
#[allow(unused_imports)]
pub use grammar::validate;
pub use tokenizer::{tokenize, Token, TokenKind};

/// Text of the `&&` connector in a flattened command.
pub const AND_OPERATOR: &str = "&&";

/// A command that passed grammar validation, flattened to token texts.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParsedCommand {
    words: Vec<String>,
}

impl ParsedCommand {
    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn into_words(self) -> Vec<String> {
        self.words
    }

    /// Display form of the whole command, operators included.
    pub fn display(&self) -> String {
        self.words.join(" ")
    }

    fn from_tokens(tokens: &[Token]) -> Self {
        let mut words: Vec<String> = Vec::with_capacity(tokens.len());
        let mut prev_amp: Option<usize> = None;
        for token in tokens {
            if token.kind == TokenKind::End {
                break;
            }
            if token.kind == TokenKind::Background {
                if prev_amp.is_some_and(|offset| offset + 1 == token.offset) {
                    if let Some(last) = words.last_mut() {
                        *last = AND_OPERATOR.to_string();
                    }
                    prev_amp = None;
                    continue;
                }
                prev_amp = Some(token.offset);
            } else {
                prev_amp = None;
            }
            words.push(token.text.clone());
        }
        Self { words }
    }
}

/// Tokenize and validate one segment.
pub fn parse_command(input: &str) -> Result<ParsedCommand, ShellError> {
    let tokens = tokenize(input);
    check(&tokens)?;
    Ok(ParsedCommand::from_tokens(&tokens))
}

/// Split a raw input line on `;` into trimmed, non-empty segments.
pub fn split_segments(line: &str) -> Vec<&str> {
    line.split(';')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattened_list_keeps_operators_and_filenames() {
        let parsed = parse_command("cat < in.txt | sort >> out.txt &").unwrap();
        assert_eq!(
            parsed.words(),
            &["cat", "<", "in.txt", "|", "sort", ">>", "out.txt", "&"]
        );
    }

    #[test]
    fn adjacent_ampersands_fold_into_and() {
        let parsed = parse_command("true && echo ok").unwrap();
        assert_eq!(parsed.words(), &["true", "&&", "echo", "ok"]);
    }

    #[test]
    fn rejected_segment_yields_nothing() {
        assert!(parse_command("ls | | wc").is_err());
        assert!(parse_command("ls ; wc").is_err());
    }

    #[test]
    fn segments_split_on_semicolon() {
        assert_eq!(
            split_segments(" echo a ; ;echo b;  "),
            vec!["echo a", "echo b"]
        );
    }

    #[test]
    fn display_joins_words() {
        let parsed = parse_command("sleep   5").unwrap();
        assert_eq!(parsed.display(), "sleep 5");
    }
}
