//! Error types and reporting for the shell.
//!
//! Every failure a command can hit is reported as a `ShellError`: a kind used
//! for status codes and logging, plus the fixed human-readable text the user
//! sees. Errors never escape the command that raised them.

use std::fmt;
use std::io;

/// Categorized error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The grammar rejected the token stream
    Syntax,
    /// Pipe, fork or file-open failure while building a pipeline
    Resource,
    /// Target job, process or path does not exist
    Lookup,
    /// Job table is full
    Capacity,
    /// Error loading/parsing configuration
    Config,
}

impl ErrorKind {
    /// Exit status recorded for a command that failed with this kind.
    pub fn status(self) -> i32 {
        match self {
            ErrorKind::Syntax => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Syntax => write!(f, "syntax error"),
            ErrorKind::Resource => write!(f, "resource error"),
            ErrorKind::Lookup => write!(f, "lookup error"),
            ErrorKind::Capacity => write!(f, "capacity error"),
            ErrorKind::Config => write!(f, "config error"),
        }
    }
}

/// Error with the user-facing message and optional location details
#[derive(Debug, Clone)]
pub struct ShellError {
    pub kind: ErrorKind,
    pub message: String,
    /// Additional hint shown under the message
    pub context: Option<String>,
    /// Byte offset in the input segment where the error occurred
    pub position: Option<usize>,
}

impl ShellError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ShellError {
            kind,
            message: message.into(),
            context: None,
            position: None,
        }
    }

    pub fn syntax(position: usize) -> Self {
        ShellError::new(ErrorKind::Syntax, "Invalid Syntax!").with_position(position)
    }

    pub fn resource(message: impl Into<String>) -> Self {
        ShellError::new(ErrorKind::Resource, message)
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        ShellError::new(ErrorKind::Lookup, message)
    }

    pub fn capacity(limit: usize) -> Self {
        ShellError::new(ErrorKind::Capacity, "job table full")
            .with_context(format!("at most {limit} jobs can be tracked"))
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_position(mut self, pos: usize) -> Self {
        self.position = Some(pos);
        self
    }

    /// Format the error with a caret under the offending part of `input`.
    pub fn display_with_input(&self, input: &str) -> String {
        let mut msg = self.message.clone();

        if let Some(pos) = self.position {
            if pos < input.len() && input.is_char_boundary(pos) {
                let start = floor_boundary(input, pos.saturating_sub(15));
                let end = ceil_boundary(input, (pos + 15).min(input.len()));
                let snippet = &input[start..end];

                msg.push_str(&format!("\n  near: '{snippet}'"));
                msg.push('\n');

                let offset = input[start..pos].chars().count();
                msg.push_str(&format!("  {}^", " ".repeat(offset + 7)));
            } else {
                msg.push_str("\n  at end of input");
            }
        } else if let Some(context) = &self.context {
            msg.push_str(&format!("\n  hint: {context}"));
        }

        msg
    }
}

fn floor_boundary(input: &str, mut idx: usize) -> usize {
    while idx > 0 && !input.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(input: &str, mut idx: usize) -> usize {
    while idx < input.len() && !input.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(context) = &self.context {
            write!(f, "\n  hint: {context}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ShellError {}

impl From<io::Error> for ShellError {
    fn from(err: io::Error) -> Self {
        ShellError::resource(err.to_string())
    }
}

/// Convenience type alias for Results with ShellError
pub type ShellResult<T> = Result<T, ShellError>;
