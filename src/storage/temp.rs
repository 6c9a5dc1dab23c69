use std::path::{Component, Path};

use tokio::io::AsyncWriteExt;

use super::{Disk, Storage, StorageError, StorageResult};
use crate::utils::random::random_file_stem;

/// Namespace of raw videos waiting to be transcoded (on [`Disk::Local`]).
pub const TEMP_VIDEO_PREFIX: &str = "temp_videos";
/// Namespace of documents waiting for quiz generation (on [`Disk::Local`]).
pub const TEMP_DOCUMENT_PREFIX: &str = "temp_documents";

/// `true` when `path` is a plain file path directly inside `prefix/`.
pub fn is_temp_path(prefix: &str, path: &str) -> bool {
    let Some(rest) = path.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) else {
        return false;
    };

    let rest = Path::new(rest);
    let mut components = rest.components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

/// Sink for one upload into a temporary namespace, enforcing a byte ceiling.
///
/// The partially written file is removed when the ceiling is exceeded or when
/// [`TempUpload::abort`] is called.
pub struct TempUpload {
    storage: Storage,
    path: String,
    file: tokio::fs::File,
    written: u64,
    limit: u64,
}

impl TempUpload {
    pub async fn begin(
        storage: &Storage,
        prefix: &str,
        extension: &str,
        limit: u64,
    ) -> StorageResult<Self> {
        let path = format!("{prefix}/{}.{extension}", random_file_stem());
        let file = storage.create(Disk::Local, &path).await?;
        Ok(Self {
            storage: storage.clone(),
            path,
            file,
            written: 0,
            limit,
        })
    }

    pub async fn write(&mut self, chunk: &[u8]) -> StorageResult<()> {
        self.written += chunk.len() as u64;
        if self.written > self.limit {
            return Err(StorageError::TooLarge { limit: self.limit });
        }
        self.file.write_all(chunk).await?;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes the file and returns its path relative to [`Disk::Local`].
    pub async fn finish(mut self) -> StorageResult<String> {
        self.file.flush().await?;
        Ok(self.path)
    }

    pub async fn abort(self) {
        drop(self.file);
        if let Err(e) = self.storage.delete(Disk::Local, &self.path).await {
            tracing::warn!("unable to remove aborted upload `{}`: {e}", self.path);
        }
    }
}

impl Storage {
    /// Best-effort removal of a temporary upload; failures are only logged.
    pub async fn discard_temp(&self, path: &str) {
        if let Err(e) = self.delete(Disk::Local, path).await {
            tracing::warn!("unable to delete temporary file `{path}`: {e}");
        }
    }
}
