use std::fmt;

use thiserror::Error;

/// The source line a command came from, kept for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// 1-based line number in the compilation unit.
    pub number: usize,
    pub text: String,
}

impl SourceLine {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        SourceLine {
            number,
            text: text.into(),
        }
    }
}

impl fmt::Display for SourceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.number, self.text)
    }
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("{reason} on {at}")]
    Parse { reason: String, at: SourceLine },

    #[error("{reason} on {at}")]
    Arity { reason: String, at: SourceLine },

    #[error("invalid segment '{segment}' on {at}")]
    InvalidSegment { segment: String, at: SourceLine },

    #[error("{reason} on {at}")]
    Range { reason: String, at: SourceLine },

    #[error("duplicate label name '{label}' on {at}")]
    DuplicateLabel { label: String, at: SourceLine },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TranslateError {
    /// Line the error refers to, if it came from a command or assembly line.
    pub fn source_line(&self) -> Option<&SourceLine> {
        match self {
            TranslateError::Parse { at, .. }
            | TranslateError::Arity { at, .. }
            | TranslateError::InvalidSegment { at, .. }
            | TranslateError::Range { at, .. }
            | TranslateError::DuplicateLabel { at, .. } => Some(at),
            TranslateError::Io(_) => None,
        }
    }
}

pub type Result<T, E = TranslateError> = std::result::Result<T, E>;
