//! Errors raised while reading deck text
use std::fmt::Display;
use pest::RuleType;

/// Type alias for a `Result` with [`DeckError`] as the error type.
pub type DeckResult<T> = Result<T, DeckError>;


/// An error related to tokenizing or structuring deck text
#[derive(Debug)]
pub enum DeckError {
    /// A line of deck text could not be tokenized.
    Grammar { line: usize, reason: String },

    /// A token could not be converted to the type its item declares.
    InvalidValue { keyword: String, item: &'static str, token: String },

    /// A keyword held more records than its region count allows. Only
    /// raised when the parse context is strict for that region count.
    ExtraRecords { keyword: String, expected: usize, found: usize },
}

impl Display for DeckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeckError::Grammar { line, reason } => {
                write!(f, "Could not tokenize line {line}: {reason}")
            },
            DeckError::InvalidValue { keyword, item, token } => {
                write!(f, "Could not parse '{token}' as the value of {keyword} item {item}")
            },
            DeckError::ExtraRecords { keyword, expected, found } => {
                write!(f, "Keyword {keyword} expects at most {expected} records, found {found}")
            }
        }
    }
}

impl std::error::Error for DeckError {}

impl DeckError {
    pub fn from_pest<R: RuleType>(e: pest::error::Error<R>, line: usize) -> Self {
        Self::Grammar { line, reason: e.to_string() }
    }
}
