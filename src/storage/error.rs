use thiserror::Error;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("invalid storage path `{0}`")]
    InvalidPath(String),
    #[error("unknown disk `{0}`")]
    UnknownDisk(String),
    #[error("upload exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}
