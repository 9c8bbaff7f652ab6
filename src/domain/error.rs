// Domain errors for range input and query selection
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SeekerError {
    #[error("invalid range: from ({from}) must be before to ({to})")]
    InvalidRange { from: i64, to: i64 },

    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("unknown metric: {0:?}")]
    UnknownMetric(String),

    #[error("range [{from}, {to}) is outside the supported instants")]
    OutOfBounds { from: i64, to: i64 },

    #[error("context window of {width} ms is wider than {max} ms")]
    RangeTooWide { width: i64, max: i64 },

    #[error("invalid zoom factor: {0}")]
    InvalidFactor(f64),
}

pub type SeekerResult<T> = Result<T, SeekerError>;
