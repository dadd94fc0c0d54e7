use thiserror::Error;

/// Every way a command can fail, per spec section 7.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Error: {0}")]
    Format(String),

    #[error("Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error: {0}")]
    Argument(String),

    #[error("Error: file exists")]
    Exists,

    #[error("Error: {0}")]
    Missing(String),

    #[error("Error: key not found")]
    NotFound,

    #[error("Error: key already exists")]
    Duplicate,
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Error {
        Error::Format(format!("csv error: {}", e))
    }
}
