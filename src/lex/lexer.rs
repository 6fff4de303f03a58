//! Lexer implementation.
//!
//! Tokens are maximal runs of non-whitespace characters. Line and column
//! tracking is done while scanning so diagnostics never rescan the input.

use crate::error::{HtkError, Result};

use super::token::Token;

/// Lexer over one text document.
#[derive(Clone, Copy, Debug)]
pub struct Lexer<'a> {
    input: &'a str,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for already decoded text.
    pub fn new(input: &'a str) -> Self {
        Self { input }
    }

    /// Create a lexer from raw bytes, rejecting invalid UTF-8.
    ///
    /// The error points at the first byte that is not part of a valid
    /// UTF-8 sequence.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self> {
        match std::str::from_utf8(bytes) {
            Ok(input) => Ok(Self { input }),
            Err(err) => {
                let valid = &bytes[..err.valid_up_to()];
                // The prefix is valid by construction.
                let prefix = std::str::from_utf8(valid).unwrap_or_default();
                let (line, column) = end_position(prefix);
                Err(HtkError::lex(
                    line,
                    column,
                    format!(
                        "invalid UTF-8 byte 0x{:02x}",
                        bytes[err.valid_up_to()]
                    ),
                ))
            }
        }
    }

    /// The underlying text.
    pub fn input(&self) -> &'a str {
        self.input
    }

    /// Iterate over the lines of the input, blank ones included.
    pub fn lines(&self) -> Lines<'a> {
        Lines {
            rest: Some(self.input),
            number: 0,
        }
    }

    /// Iterate over every token of the input.
    pub fn tokens(&self) -> TokenStream<'a> {
        TokenStream::new(self.input, 1, 1)
    }
}

/// (line, column) of the position just past `text`, 1-based.
fn end_position(text: &str) -> (usize, usize) {
    let line = text.matches('\n').count() + 1;
    let last = text.rsplit('\n').next().unwrap_or("");
    (line, last.chars().count() + 1)
}

// ---------------------------------------------------------------------------
// Lines
// ---------------------------------------------------------------------------

/// One line of input, without its terminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceLine<'a> {
    /// 1-based line number
    pub number: usize,
    /// Line text with any trailing `\r` removed
    pub text: &'a str,
}

impl<'a> SourceLine<'a> {
    /// Tokens on this line.
    pub fn tokens(&self) -> TokenStream<'a> {
        TokenStream::new(self.text, self.number, 1)
    }

    /// Whether the line holds nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Whether the first non-blank character is `#`.
    pub fn is_comment(&self) -> bool {
        self.text.trim_start().starts_with('#')
    }

    /// Syntax error pointing at the end of the line.
    pub fn error_at_end(&self, message: impl Into<String>) -> HtkError {
        HtkError::syntax(self.number, self.text.chars().count() + 1, message)
    }
}

/// Iterator over the lines of a document.
#[derive(Clone, Debug)]
pub struct Lines<'a> {
    rest: Option<&'a str>,
    number: usize,
}

impl<'a> Iterator for Lines<'a> {
    type Item = SourceLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        let (text, rest) = match rest.find('\n') {
            Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
            None if rest.is_empty() => return None,
            None => (rest, None),
        };
        self.rest = rest;
        self.number += 1;
        Some(SourceLine {
            number: self.number,
            text: text.strip_suffix('\r').unwrap_or(text),
        })
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Lazy token iterator with one token of lookahead.
///
/// Cloning the stream gives an independent cursor at the same position, which
/// is how callers restart a scan.
#[derive(Clone, Debug)]
pub struct TokenStream<'a> {
    rest: &'a str,
    line: usize,
    column: usize,
    peeked: Option<Option<Token<'a>>>,
}

impl<'a> TokenStream<'a> {
    fn new(input: &'a str, line: usize, column: usize) -> Self {
        Self {
            rest: input,
            line,
            column,
            peeked: None,
        }
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> Option<&Token<'a>> {
        if self.peeked.is_none() {
            let next = self.scan();
            self.peeked = Some(next);
        }
        self.peeked.as_ref().and_then(|t| t.as_ref())
    }

    /// Remaining tokens collected into a vector.
    pub fn collect_all(self) -> Vec<Token<'a>> {
        self.collect()
    }

    fn scan(&mut self) -> Option<Token<'a>> {
        let mut chars = self.rest.char_indices();
        let start = loop {
            match chars.next() {
                None => {
                    self.rest = "";
                    return None;
                }
                Some((_, '\n')) => {
                    self.line += 1;
                    self.column = 1;
                }
                Some((_, c)) if c.is_whitespace() => self.column += 1,
                Some((idx, _)) => break idx,
            }
        };

        let tail = &self.rest[start..];
        let end = tail.find(char::is_whitespace).unwrap_or(tail.len());
        let text = &tail[..end];
        let token = Token::new(text, self.line, self.column);

        self.column += text.chars().count();
        self.rest = &tail[end..];
        Some(token)
    }
}

impl<'a> Iterator for TokenStream<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.peeked.take() {
            Some(peeked) => peeked,
            None => self.scan(),
        }
    }
}
