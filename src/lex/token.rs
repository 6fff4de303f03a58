//! Token type.

use std::str::FromStr;

use crate::error::{HtkError, Result};

/// A whitespace-delimited token with its source position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    /// The token text, borrowed from the input
    pub text: &'a str,
    /// 1-based line number
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
}

impl<'a> Token<'a> {
    /// Create a new token.
    pub fn new(text: &'a str, line: usize, column: usize) -> Self {
        Self { text, line, column }
    }

    /// Whether the token is wrapped in a pair of double quotes.
    pub fn is_quoted(&self) -> bool {
        self.text.len() >= 2 && self.text.starts_with('"') && self.text.ends_with('"')
    }

    /// The token text with its surrounding double quotes removed.
    pub fn unquoted(&self) -> Result<&'a str> {
        if self.is_quoted() {
            Ok(&self.text[1..self.text.len() - 1])
        } else {
            Err(self.error(format!("expected a quoted string, found `{}`", self.text)))
        }
    }

    /// Parse the token as a value of type `T`.
    ///
    /// `what` names the expected value in the error message.
    pub fn parse<T: FromStr>(&self, what: &str) -> Result<T> {
        self.text
            .parse::<T>()
            .map_err(|_| self.error(format!("expected {what}, found `{}`", self.text)))
    }

    /// Build a syntax error located at this token.
    pub fn error(&self, message: impl Into<String>) -> HtkError {
        HtkError::syntax(self.line, self.column, message)
    }
}
