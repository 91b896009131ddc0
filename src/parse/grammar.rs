//! Recursive-descent validator for the command grammar:
//!
//! ```text
//! shell_cmd := cmd_group (("&&" | "&") cmd_group)* ["&"]
//! cmd_group := atomic ("|" atomic)*
//! atomic    := name (name | redir)*
//! redir     := ("<" | ">" | ">>") name
//! ```
//!
//! The validator only accepts or rejects; it builds no tree.
use crate::error::ShellError;

use super::tokenizer::{Token, TokenKind};

#[derive(Clone, Copy, Eq, PartialEq)]
enum Connector {
    Background,
    And,
}

struct Validator<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Validator<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::End)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.offset)
            .unwrap_or(0)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn fail(&self) -> ShellError {
        ShellError::syntax(self.offset())
    }

    fn name(&mut self) -> Result<(), ShellError> {
        if self.peek() == TokenKind::Name {
            self.advance();
            Ok(())
        } else {
            Err(self.fail())
        }
    }

    fn atomic(&mut self) -> Result<(), ShellError> {
        self.name()?;
        loop {
            match self.tokens.get(self.pos) {
                Some(token) if token.kind == TokenKind::Name => self.advance(),
                Some(token) if token.is_redirection() => {
                    self.advance();
                    self.name()?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn cmd_group(&mut self) -> Result<(), ShellError> {
        self.atomic()?;
        while self.peek() == TokenKind::Pipe {
            self.advance();
            self.atomic()?;
        }
        Ok(())
    }

    /// Consume a `&` or `&&` connector.
    fn connector(&mut self) -> Option<Connector> {
        if self.peek() != TokenKind::Background {
            return None;
        }
        let first = self.tokens[self.pos].offset;
        self.advance();
        if self.peek() == TokenKind::Background && self.tokens[self.pos].offset == first + 1 {
            self.advance();
            return Some(Connector::And);
        }
        Some(Connector::Background)
    }

    fn shell_cmd(&mut self) -> Result<(), ShellError> {
        self.cmd_group()?;
        while let Some(connector) = self.connector() {
            if connector == Connector::Background && self.peek() == TokenKind::End {
                // trailing `&`
                break;
            }
            self.cmd_group()?;
        }
        if self.peek() == TokenKind::End {
            Ok(())
        } else {
            Err(self.fail())
        }
    }
}

/// Check a token stream against the grammar, reporting where it went wrong.
pub fn check(tokens: &[Token]) -> Result<(), ShellError> {
    if let Some(sep) = tokens.iter().find(|t| t.kind == TokenKind::Separator) {
        return Err(ShellError::syntax(sep.offset));
    }
    Validator::new(tokens).shell_cmd()
}

/// Accept/reject form of [`check`].
pub fn validate(tokens: &[Token]) -> bool {
    check(tokens).is_ok()
}
