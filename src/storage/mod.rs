//! Named storage disks.
//!
//! Every stored artifact is addressed by a `(Disk, relative path)` pair. Relative
//! paths are always `/`-separated and may only contain normal components, so a
//! caller can never escape the disk root.

use std::{
    fmt,
    path::{Component, Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::StorageConfig;

mod error;
pub use error::{StorageError, StorageResult};

mod temp;
pub use temp::{TEMP_DOCUMENT_PREFIX, TEMP_VIDEO_PREFIX, TempUpload, is_temp_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Disk {
    /// Publicly served assets (thumbnails, course images).
    Public,
    /// Private application storage, holds temporary uploads.
    Local,
    /// Encrypted HLS output, only reachable through the streaming endpoint.
    Secure,
}

impl Disk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Local => "local",
            Self::Secure => "secure",
        }
    }
}

impl fmt::Display for Disk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Disk {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "local" => Ok(Self::Local),
            "secure" => Ok(Self::Secure),
            other => Err(StorageError::UnknownDisk(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    public_root: PathBuf,
    local_root: PathBuf,
    secure_root: PathBuf,
}

impl Storage {
    pub fn new(
        public_root: impl Into<PathBuf>,
        local_root: impl Into<PathBuf>,
        secure_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            public_root: public_root.into(),
            local_root: local_root.into(),
            secure_root: secure_root.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            &config.public_root,
            &config.local_root,
            &config.secure_root,
        )
    }

    /// All three disks as subdirectories of one root; handy for tests and the CLI.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::new(root.join("public"), root.join("app"), root.join("secure"))
    }

    pub fn root(&self, disk: Disk) -> &Path {
        match disk {
            Disk::Public => &self.public_root,
            Disk::Local => &self.local_root,
            Disk::Secure => &self.secure_root,
        }
    }

    /// Maps a relative path onto the disk root, rejecting anything but plain segments.
    pub fn resolve(&self, disk: Disk, relative: &str) -> StorageResult<PathBuf> {
        let rel = Path::new(relative);
        if relative.is_empty()
            || !rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidPath(relative.to_string()));
        }

        Ok(self.root(disk).join(rel))
    }

    pub async fn exists(&self, disk: Disk, relative: &str) -> bool {
        match self.resolve(disk, relative) {
            Ok(path) => fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn is_file(&self, disk: Disk, relative: &str) -> bool {
        match self.resolve(disk, relative) {
            Ok(path) => fs::metadata(path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn read(&self, disk: Disk, relative: &str) -> StorageResult<Vec<u8>> {
        let path = self.resolve(disk, relative)?;
        Ok(fs::read(path).await?)
    }

    pub async fn open(&self, disk: Disk, relative: &str) -> StorageResult<fs::File> {
        let path = self.resolve(disk, relative)?;
        Ok(fs::File::open(path).await?)
    }

    /// Creates (or truncates) a file, making parent directories as needed.
    pub async fn create(&self, disk: Disk, relative: &str) -> StorageResult<fs::File> {
        let path = self.resolve(disk, relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(fs::File::create(path).await?)
    }

    pub async fn put(&self, disk: Disk, relative: &str, bytes: &[u8]) -> StorageResult<()> {
        let path = self.resolve(disk, relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, bytes).await?;
        Ok(())
    }

    pub async fn delete(&self, disk: Disk, relative: &str) -> StorageResult<()> {
        let path = self.resolve(disk, relative)?;
        fs::remove_file(path).await?;
        Ok(())
    }

    pub async fn make_directory(&self, disk: Disk, relative: &str) -> StorageResult<PathBuf> {
        let path = self.resolve(disk, relative)?;
        fs::create_dir_all(&path).await?;
        Ok(path)
    }

    pub async fn delete_directory(&self, disk: Disk, relative: &str) -> StorageResult<()> {
        let path = self.resolve(disk, relative)?;
        fs::remove_dir_all(path).await?;
        Ok(())
    }

    /// Removes the whole HLS output directory that `path` (a master playlist) lives in.
    ///
    /// Returns `false` when there is nothing to delete or deletion failed; never errors.
    #[tracing::instrument(skip(self))]
    pub async fn delete_video_directory(&self, disk: Disk, path: &str) -> bool {
        let Some(dir) = parent_dir(path) else {
            tracing::warn!("refusing to delete video directory for `{path}`: no parent directory");
            return false;
        };

        if !self.exists(disk, dir).await {
            tracing::warn!("video directory `{dir}` does not exist on disk `{disk}`");
            return false;
        }

        match self.delete_directory(disk, dir).await {
            Ok(()) => {
                tracing::info!("deleted video directory `{dir}` on disk `{disk}`");
                true
            }
            Err(e) => {
                tracing::error!("failed to delete video directory `{dir}` on disk `{disk}`: {e}");
                false
            }
        }
    }

    /// Removes only the artifacts of one HLS export (the files sharing the master
    /// playlist's stem), then the directory itself if nothing else is left in it.
    ///
    /// Used when a lesson's video is replaced and the new export may share the
    /// directory with the old one.
    #[tracing::instrument(skip(self))]
    pub async fn delete_video_export(&self, disk: Disk, path: &str) -> bool {
        let (Some(dir), Some(stem)) = (parent_dir(path), export_stem(path)) else {
            tracing::warn!("refusing to delete video export `{path}`: not a playlist inside a directory");
            return false;
        };

        let dir_path = match self.resolve(disk, dir) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("refusing to delete video export `{path}`: {e}");
                return false;
            }
        };

        let mut entries = match fs::read_dir(&dir_path).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("video directory `{dir}` is not readable on disk `{disk}`: {e}");
                return false;
            }
        };

        let mut removed = 0usize;
        let mut remaining = 0usize;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("failed to list `{dir}` on disk `{disk}`: {e}");
                    return false;
                }
            };

            let name = entry.file_name();
            let name = name.to_string_lossy();
            if belongs_to_export(&name, stem) {
                if let Err(e) = fs::remove_file(entry.path()).await {
                    tracing::error!("failed to delete `{dir}/{name}` on disk `{disk}`: {e}");
                    return false;
                }
                removed += 1;
            } else {
                remaining += 1;
            }
        }

        if remaining == 0 {
            if let Err(e) = fs::remove_dir(&dir_path).await {
                tracing::warn!("unable to remove empty directory `{dir}` on disk `{disk}`: {e}");
            }
        }

        tracing::info!("deleted {removed} files of export `{stem}` in `{dir}` on disk `{disk}`");
        removed > 0
    }
}

/// `lessons/intro/abc.m3u8` -> `lessons/intro`. `None` for a bare file name.
pub fn parent_dir(path: &str) -> Option<&str> {
    let (dir, file) = path.trim_end_matches('/').rsplit_once('/')?;
    if dir.is_empty() || file.is_empty() {
        return None;
    }
    Some(dir)
}

/// Directory-relative sibling of `path`: `sibling_of("a/b/m.m3u8", "x.ts")` is `a/b/x.ts`.
pub fn sibling_of(path: &str, file_name: &str) -> Option<String> {
    parent_dir(path).map(|dir| format!("{dir}/{file_name}"))
}

fn export_stem(path: &str) -> Option<&str> {
    let file = path.rsplit('/').next()?;
    let stem = file.strip_suffix(".m3u8")?;
    (!stem.is_empty()).then_some(stem)
}

fn belongs_to_export(file_name: &str, stem: &str) -> bool {
    match file_name.strip_prefix(stem) {
        Some(rest) => rest.starts_with('.') || rest.starts_with('_'),
        None => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn fixture() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::under(dir.path());
        (dir, storage)
    }

    async fn seed_export(storage: &Storage, dir: &str, stem: &str) {
        for name in [
            format!("{stem}.m3u8"),
            format!("{stem}_0.m3u8"),
            format!("{stem}_1.m3u8"),
            format!("{stem}.key"),
            format!("{stem}_0_000.ts"),
            format!("{stem}_1_000.ts"),
        ] {
            storage
                .put(Disk::Secure, &format!("{dir}/{name}"), b"data")
                .await
                .unwrap();
        }
    }

    #[test]
    fn disk_names_round_trip() {
        for disk in [Disk::Public, Disk::Local, Disk::Secure] {
            assert_eq!(disk.as_str().parse::<Disk>().unwrap(), disk);
        }
        assert!(matches!(
            "s3".parse::<Disk>(),
            Err(StorageError::UnknownDisk(_))
        ));
    }

    #[test]
    fn resolve_rejects_escapes() {
        let (_dir, storage) = fixture();
        assert!(storage.resolve(Disk::Local, "temp_videos/a.mp4").is_ok());
        assert!(storage.resolve(Disk::Local, "../secret").is_err());
        assert!(storage.resolve(Disk::Local, "a/../../b").is_err());
        assert!(storage.resolve(Disk::Local, "/etc/passwd").is_err());
        assert!(storage.resolve(Disk::Local, "./a").is_err());
        assert!(storage.resolve(Disk::Local, "").is_err());
    }

    #[test]
    fn parent_dir_of_paths() {
        assert_eq!(parent_dir("lessons/intro/abc.m3u8"), Some("lessons/intro"));
        assert_eq!(parent_dir("abc.m3u8"), None);
        assert_eq!(parent_dir("/abc.m3u8"), None);
        assert_eq!(
            sibling_of("lessons/intro/abc.m3u8", "abc_0.m3u8").as_deref(),
            Some("lessons/intro/abc_0.m3u8")
        );
    }

    #[tokio::test]
    async fn put_read_delete() {
        let (_dir, storage) = fixture();
        storage.put(Disk::Public, "a/b/c.txt", b"hello").await.unwrap();
        assert!(storage.exists(Disk::Public, "a/b/c.txt").await);
        assert!(!storage.exists(Disk::Secure, "a/b/c.txt").await);
        assert_eq!(storage.read(Disk::Public, "a/b/c.txt").await.unwrap(), b"hello");

        storage.delete(Disk::Public, "a/b/c.txt").await.unwrap();
        assert!(!storage.exists(Disk::Public, "a/b/c.txt").await);
    }

    #[tokio::test]
    async fn deleting_video_removes_whole_directory() {
        let (_dir, storage) = fixture();
        seed_export(&storage, "lessons/intro-to-x", "abc").await;

        assert!(
            storage
                .delete_video_directory(Disk::Secure, "lessons/intro-to-x/abc.m3u8")
                .await
        );
        for sibling in ["abc_0.m3u8", "abc.key", "abc_0_000.ts", "abc_1_000.ts"] {
            assert!(
                !storage
                    .exists(Disk::Secure, &format!("lessons/intro-to-x/{sibling}"))
                    .await
            );
        }
        assert!(!storage.exists(Disk::Secure, "lessons/intro-to-x").await);
        assert!(storage.exists(Disk::Secure, "lessons").await);
    }

    #[tokio::test]
    async fn deleting_missing_video_directory_reports_false() {
        let (_dir, storage) = fixture();
        assert!(
            !storage
                .delete_video_directory(Disk::Secure, "lessons/nope/abc.m3u8")
                .await
        );
        // a bare file name must never take the disk root with it
        storage.put(Disk::Secure, "keep.txt", b"x").await.unwrap();
        assert!(!storage.delete_video_directory(Disk::Secure, "abc.m3u8").await);
        assert!(storage.exists(Disk::Secure, "keep.txt").await);
    }

    #[tokio::test]
    async fn deleting_export_keeps_newer_export() {
        let (_dir, storage) = fixture();
        seed_export(&storage, "lessons/intro", "old").await;
        seed_export(&storage, "lessons/intro", "new").await;

        assert!(
            storage
                .delete_video_export(Disk::Secure, "lessons/intro/old.m3u8")
                .await
        );
        assert!(!storage.exists(Disk::Secure, "lessons/intro/old.key").await);
        assert!(!storage.exists(Disk::Secure, "lessons/intro/old_1_000.ts").await);
        assert!(storage.exists(Disk::Secure, "lessons/intro/new.m3u8").await);
        assert!(storage.exists(Disk::Secure, "lessons/intro/new_0_000.ts").await);
    }

    #[tokio::test]
    async fn deleting_last_export_removes_directory() {
        let (_dir, storage) = fixture();
        seed_export(&storage, "lessons/intro", "only").await;

        assert!(
            storage
                .delete_video_export(Disk::Secure, "lessons/intro/only.m3u8")
                .await
        );
        assert!(!storage.exists(Disk::Secure, "lessons/intro").await);
    }

    #[test]
    fn export_membership() {
        assert!(belongs_to_export("abc.m3u8", "abc"));
        assert!(belongs_to_export("abc_2_013.ts", "abc"));
        assert!(belongs_to_export("abc.key", "abc"));
        assert!(!belongs_to_export("abcd.m3u8", "abc"));
        assert!(!belongs_to_export("xabc.m3u8", "abc"));
    }
}
