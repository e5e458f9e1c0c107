use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

/// Errors raised by the binning, scaling and palette routines and by the
/// sample file loader.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("degenerate range: minimum and maximum are both {min}")]
    DegenerateRange { min: f64, max: f64 },

    #[error("degenerate weight: sample at x = {x} has y error {y_error}")]
    DegenerateWeight { x: f64, y_error: f64 },

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("no data to process")]
    EmptyInput,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),
}

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
