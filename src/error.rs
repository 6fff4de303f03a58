//! Error types shared by every reader and writer in the crate.

use std::path::PathBuf;

/// Error type for HTK / HTS file handling.
///
/// Parse calls are all-or-nothing: any of these aborts the whole call and no
/// partially built model is returned.
#[derive(Debug, thiserror::Error)]
pub enum HtkError {
    /// Text input is not valid UTF-8.
    #[error("Lex error at line {line}, column {column}: {message}")]
    Lex {
        line: usize,
        column: usize,
        message: String,
    },

    /// Grammar violation in a text format.
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// Well-formed text describing an invalid structure (dangling references,
    /// non-tree graphs, duplicate names, overlapping segments).
    #[error("Structure error{}: {message}", fmt_line(.line))]
    Structure { line: Option<usize>, message: String },

    /// Binary buffer whose length or shape does not match the declared layout.
    #[error("Format error: {0}")]
    Format(String),

    /// Re-serialising a parsed file did not reproduce the input.
    #[error("Verified read failed at line {line}: expected `{expected}`, wrote `{found}`")]
    Verification {
        line: usize,
        expected: String,
        found: String,
    },

    /// A caller-supplied parameter makes the operation impossible or lossy.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Filesystem failure in one of the file adapters.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn fmt_line(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!(" at line {line}"),
        None => String::new(),
    }
}

/// Result type for HTK / HTS operations
pub type Result<T> = std::result::Result<T, HtkError>;

impl HtkError {
    /// Create a lex error
    pub fn lex(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Lex {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a syntax error
    pub fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a structure error without positional context
    pub fn structure(message: impl Into<String>) -> Self {
        Self::Structure {
            line: None,
            message: message.into(),
        }
    }

    /// Create a structure error attributed to a source line
    pub fn structure_at(line: usize, message: impl Into<String>) -> Self {
        Self::Structure {
            line: Some(line),
            message: message.into(),
        }
    }

    /// Create a binary format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Source line the error refers to, when known.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Lex { line, .. } | Self::Syntax { line, .. } => Some(*line),
            Self::Verification { line, .. } => Some(*line),
            Self::Structure { line, .. } => *line,
            _ => None,
        }
    }
}
