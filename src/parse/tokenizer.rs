//! Tokenizer for shell input.
//!
//! Splits a segment into typed tokens while remembering the byte offset of
//! each one, so the grammar can point at the offending token and tell `&&`
//! apart from `& &`.

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TokenKind {
    Name,
    Pipe,
    Background,
    Input,
    Output,
    OutputAppend,
    Separator,
    End,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
        }
    }

    pub fn is_redirection(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Input | TokenKind::Output | TokenKind::OutputAppend
        )
    }
}

fn is_operator_char(ch: char) -> bool {
    matches!(ch, '|' | '&' | '<' | '>' | ';')
}

/// Tokenize one input segment. Always ends with a single `End` token.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        match ch {
            c if c.is_whitespace() => {}
            '|' => tokens.push(Token::new(TokenKind::Pipe, "|", offset)),
            '&' => tokens.push(Token::new(TokenKind::Background, "&", offset)),
            '<' => tokens.push(Token::new(TokenKind::Input, "<", offset)),
            ';' => tokens.push(Token::new(TokenKind::Separator, ";", offset)),
            '>' => {
                if matches!(chars.peek(), Some((_, '>'))) {
                    chars.next();
                    tokens.push(Token::new(TokenKind::OutputAppend, ">>", offset));
                } else {
                    tokens.push(Token::new(TokenKind::Output, ">", offset));
                }
            }
            _ => {
                let mut buf = String::new();
                buf.push(ch);
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_whitespace() || is_operator_char(next) {
                        break;
                    }
                    buf.push(next);
                    chars.next();
                }
                tokens.push(Token::new(TokenKind::Name, buf, offset));
            }
        }
    }

    tokens.push(Token::new(TokenKind::End, "", input.len()));
    tokens
}
