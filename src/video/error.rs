use thiserror::Error;

use crate::storage::StorageError;

pub type TranscodeResult<T> = std::result::Result<T, TranscodeError>;

/// Failure of a single HLS export. Never leaves the transcoder; callers only see `None`.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("unable to spawn `{program}`: {error}")]
    Spawn {
        program: String,
        error: std::io::Error,
    },
    #[error("ffmpeg exited with {status}")]
    Failed { status: std::process::ExitStatus },
    #[error("master playlist `{0}` missing after ffmpeg run")]
    MissingOutput(String),
}
