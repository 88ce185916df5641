//! Errors raised when converting between decks and tables
use std::fmt::Display;

use polars::error::PolarsError;

use crate::deck_error::DeckError;

/// Type alias for a `Result` with [`TableError`] as the error type.
pub type TableResult<T> = Result<T, TableError>;

#[derive(Debug)]
pub enum TableError {
    /// The keyword has no registered schema or handler
    UnsupportedKeyword(String),

    /// A region count was needed but the input was already parsed and does
    /// not declare it, so it cannot be probed.
    AmbiguousDimension(String),

    /// The phase keywords (or contact columns) do not describe a supported
    /// phase configuration.
    PhaseConfiguration(String),

    /// A column that must hold one value across a table holds several.
    InconsistentAxisType { column: String, values: Vec<String> },

    /// The index column is missing and the table holds several groups.
    AmbiguousIndex { keyword: String, index: &'static str, rows: usize },

    /// Table sizes do not agree with the axis lengths that should produce them.
    DimensionMismatch(String),

    /// No region count up to the probe limit parsed cleanly.
    DimensionInference { keyword: &'static str, max_probe: usize },

    /// A dated record appeared before any date was set.
    MissingStartDate { keyword: String },

    /// A column required by a conversion is absent.
    MissingColumn(String),

    /// The index column does not run 1, 2, .., n.
    NonConsecutiveIndex { index: String, values: Vec<i64> },

    /// A value could not be interpreted for its column.
    InvalidValue { column: String, value: String },

    /// The saturation column of a saturation function table is unusable.
    InvalidSaturation(String),

    Deck(DeckError),
    Polars(PolarsError),
    Io(std::io::Error),
}

impl Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableError::UnsupportedKeyword(kw) => write!(f, "Keyword {kw} is not supported"),
            TableError::AmbiguousDimension(kw) => {
                write!(f, "Cannot infer {kw} from an already parsed deck, supply the count or the deck text")
            },
            TableError::PhaseConfiguration(msg) => write!(f, "Unsupported phase configuration: {msg}"),
            TableError::InconsistentAxisType { column, values } => {
                write!(f, "Column {column} must hold a single value, found {}", values.join(", "))
            },
            TableError::AmbiguousIndex { keyword, index, rows } => {
                write!(f, "{keyword} table has {rows} rows but no {index} column to tell them apart")
            },
            TableError::DimensionMismatch(msg) => write!(f, "Dimension mismatch: {msg}"),
            TableError::DimensionInference { keyword, max_probe } => {
                write!(f, "Could not infer a region count for {keyword} within {max_probe} probes")
            },
            TableError::MissingStartDate { keyword } => {
                write!(f, "{keyword} found before any START or DATES keyword")
            },
            TableError::MissingColumn(c) => write!(f, "Missing column {c}"),
            TableError::NonConsecutiveIndex { index, values } => {
                let values: Vec<_> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{index} must run consecutively from 1, got {}", values.join(", "))
            },
            TableError::InvalidValue { column, value } => write!(f, "Invalid value '{value}' in column {column}"),
            TableError::InvalidSaturation(msg) => write!(f, "Invalid saturation column: {msg}"),
            TableError::Deck(e) => write!(f, "{e}"),
            TableError::Polars(e) => write!(f, "{e}"),
            TableError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TableError {}

impl From<DeckError> for TableError {
    fn from(value: DeckError) -> Self {
        Self::Deck(value)
    }
}

impl From<PolarsError> for TableError {
    fn from(value: PolarsError) -> Self {
        Self::Polars(value)
    }
}

impl From<std::io::Error> for TableError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
