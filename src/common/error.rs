use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("record {0} is out of bounds")]
    OutOfBounds(u64),

    #[error("corrupted data file: {0}")]
    CorruptedFile(String),

    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("record {0} is already locked")]
    RecordLocked(u64),
}

pub type Result<T> = std::result::Result<T, StoreError>;
