use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::TranscoderConfig;
use crate::storage::{Disk, Storage};
use crate::utils::random::{random_bytes, random_file_stem};
use crate::video::{TranscodeError, TranscodeResult};

/// Relative root of all lesson exports on [`Disk::Secure`].
pub const LESSONS_DIR: &str = "lessons";

const KEY_LEN: usize = 16;

/// File layout of one export inside `lessons/<slug>/`.
#[derive(Debug, Clone, PartialEq)]
pub struct HlsExport {
    directory: String,
    name: String,
}

impl HlsExport {
    pub fn new(slug: &str, name: impl Into<String>) -> Self {
        Self {
            directory: format!("{LESSONS_DIR}/{slug}"),
            name: name.into(),
        }
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn master_file(&self) -> String {
        format!("{}.m3u8", self.name)
    }

    pub fn master_path(&self) -> String {
        format!("{}/{}", self.directory, self.master_file())
    }

    pub fn key_file(&self) -> String {
        format!("{}.key", self.name)
    }

    fn key_path(&self) -> String {
        format!("{}/{}", self.directory, self.key_file())
    }

    fn key_info_path(&self) -> String {
        format!("{}/{}.keyinfo", self.directory, self.name)
    }
}

/// Runs ffmpeg to turn an uploaded video into an AES-128 encrypted, multi-bitrate HLS tree.
#[derive(Debug, Clone)]
pub struct HlsTranscoder {
    storage: Storage,
    config: TranscoderConfig,
}

impl HlsTranscoder {
    pub fn new(storage: Storage, config: TranscoderConfig) -> Self {
        Self { storage, config }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Transcodes `source` (relative to [`Disk::Local`]) into `lessons/<slug>/`.
    ///
    /// Returns the master playlist path relative to [`Disk::Secure`], or `None` on
    /// any failure. The temporary source is removed in both cases.
    #[tracing::instrument(skip(self))]
    pub async fn transcode(&self, source: &str, slug: &str) -> Option<String> {
        let export = HlsExport::new(slug, random_file_stem());

        let result = self.try_transcode(source, &export).await;
        self.discard_key_info(&export).await;

        let outcome = match result {
            Ok(()) => {
                tracing::info!(
                    "transcoded `{source}` into `{}` on disk `{}`",
                    export.master_path(),
                    Disk::Secure
                );
                Some(export.master_path())
            }
            Err(e) => {
                tracing::error!("video transcoding failed for `{source}`: {e}");
                self.storage
                    .delete_video_export(Disk::Secure, &export.master_path())
                    .await;
                None
            }
        };

        self.storage.discard_temp(source).await;
        outcome
    }

    async fn try_transcode(&self, source: &str, export: &HlsExport) -> TranscodeResult<()> {
        let input = self.storage.resolve(Disk::Local, source)?;
        if !self.storage.is_file(Disk::Local, source).await {
            return Err(TranscodeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("source `{source}` not found"),
            )));
        }

        let out_dir = self.storage.make_directory(Disk::Secure, export.directory()).await?;

        let key = random_bytes::<KEY_LEN>();
        self.storage.put(Disk::Secure, &export.key_path(), &key).await?;

        let key_path = self.storage.resolve(Disk::Secure, &export.key_path())?;
        let key_info_path = self.storage.resolve(Disk::Secure, &export.key_info_path())?;
        // URI line is relative so players resolve it next to the media playlist.
        let key_info = format!("{}\n{}\n", export.key_file(), key_path.display());
        tokio::fs::write(&key_info_path, key_info).await?;

        let args = build_args(&self.config, &input, &out_dir, export.name(), &key_info_path);
        let command_line = format!("{} {}", self.config.ffmpeg, args.join(" "));
        tracing::debug!("running: {command_line}");

        let output = Command::new(&self.config.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|error| {
                tracing::error!(source, command = %command_line, "unable to spawn ffmpeg: {error}");
                TranscodeError::Spawn {
                    program: self.config.ffmpeg.clone(),
                    error,
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(
                source,
                command = %command_line,
                stderr = %stderr.trim(),
                "ffmpeg exited with {}",
                output.status
            );
            return Err(TranscodeError::Failed {
                status: output.status,
            });
        }

        if !self.storage.is_file(Disk::Secure, &export.master_path()).await {
            tracing::error!(source, command = %command_line, "ffmpeg produced no master playlist");
            return Err(TranscodeError::MissingOutput(export.master_path()));
        }

        Ok(())
    }

    async fn discard_key_info(&self, export: &HlsExport) {
        let path = export.key_info_path();
        if !self.storage.exists(Disk::Secure, &path).await {
            return;
        }
        if let Err(e) = self.storage.delete(Disk::Secure, &path).await {
            tracing::warn!("unable to delete key info file `{path}`: {e}");
        }
    }
}

/// Full ffmpeg argument list for one export.
pub fn build_args(
    config: &TranscoderConfig,
    input: &Path,
    out_dir: &Path,
    name: &str,
    key_info: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-i".into(),
        input.display().to_string(),
    ];

    for _ in &config.renditions {
        args.extend(["-map", "0:v:0", "-map", "0:a:0"].map(String::from));
    }

    for (i, rendition) in config.renditions.iter().enumerate() {
        args.push(format!("-filter:v:{i}"));
        args.push(format!("scale=-2:{}", rendition.height));
        args.push(format!("-c:v:{i}"));
        args.push("libx264".into());
        args.push(format!("-b:v:{i}"));
        args.push(format!("{}k", rendition.video_kbps));
        args.push(format!("-c:a:{i}"));
        args.push("aac".into());
        args.push(format!("-b:a:{i}"));
        args.push(format!("{}k", rendition.audio_kbps));
    }

    let gop = config.keyframe_interval.to_string();
    let stream_map = (0..config.renditions.len())
        .map(|i| format!("v:{i},a:{i}"))
        .collect::<Vec<_>>()
        .join(" ");

    args.extend([
        "-g".into(),
        gop.clone(),
        "-keyint_min".into(),
        gop,
        "-sc_threshold".into(),
        "0".into(),
        "-f".into(),
        "hls".into(),
        "-hls_time".into(),
        config.segment_seconds.to_string(),
        "-hls_playlist_type".into(),
        "vod".into(),
        "-hls_key_info_file".into(),
        key_info.display().to_string(),
        "-hls_segment_filename".into(),
        out_dir.join(format!("{name}_%v_%03d.ts")).display().to_string(),
        "-master_pl_name".into(),
        format!("{name}.m3u8"),
        "-var_stream_map".into(),
        stream_map,
        out_dir.join(format!("{name}_%v.m3u8")).display().to_string(),
    ]);

    args
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::random::FILE_NAME_LEN;
    use std::path::PathBuf;

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn args_describe_three_encrypted_renditions() {
        let config = TranscoderConfig::default();
        let args = build_args(
            &config,
            Path::new("/in/lecture.mp4"),
            Path::new("/out/lessons/intro"),
            "abc",
            Path::new("/out/lessons/intro/abc.keyinfo"),
        );

        assert_eq!(value_after(&args, "-i"), Some("/in/lecture.mp4"));
        assert_eq!(value_after(&args, "-filter:v:0"), Some("scale=-2:360"));
        assert_eq!(value_after(&args, "-filter:v:1"), Some("scale=-2:720"));
        assert_eq!(value_after(&args, "-filter:v:2"), Some("scale=-2:1080"));
        assert_eq!(value_after(&args, "-b:v:0"), Some("500k"));
        assert_eq!(value_after(&args, "-b:v:1"), Some("1500k"));
        assert_eq!(value_after(&args, "-b:v:2"), Some("3000k"));
        assert_eq!(value_after(&args, "-hls_time"), Some("10"));
        assert_eq!(value_after(&args, "-g"), Some("48"));
        assert_eq!(value_after(&args, "-keyint_min"), Some("48"));
        assert_eq!(value_after(&args, "-hls_playlist_type"), Some("vod"));
        assert_eq!(value_after(&args, "-master_pl_name"), Some("abc.m3u8"));
        assert_eq!(
            value_after(&args, "-var_stream_map"),
            Some("v:0,a:0 v:1,a:1 v:2,a:2")
        );
        assert_eq!(
            value_after(&args, "-hls_key_info_file"),
            Some("/out/lessons/intro/abc.keyinfo")
        );
        assert_eq!(
            value_after(&args, "-hls_segment_filename"),
            Some("/out/lessons/intro/abc_%v_%03d.ts")
        );
        assert_eq!(
            args.last().map(String::as_str),
            Some("/out/lessons/intro/abc_%v.m3u8")
        );
        assert_eq!(args.iter().filter(|a| *a == "-map").count(), 6);
    }

    #[test]
    fn export_layout() {
        let export = HlsExport::new("intro-to-x", "abc");
        assert_eq!(export.directory(), "lessons/intro-to-x");
        assert_eq!(export.master_path(), "lessons/intro-to-x/abc.m3u8");
        assert_eq!(export.key_file(), "abc.key");
    }

    async fn stage_source(storage: &Storage) -> String {
        let source = format!("temp_videos/{}.mp4", random_file_stem());
        storage
            .put(Disk::Local, &source, b"not really a video")
            .await
            .unwrap();
        source
    }

    #[tokio::test]
    async fn missing_binary_yields_none_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::under(dir.path());
        let source = stage_source(&storage).await;

        let config = TranscoderConfig {
            ffmpeg: String::from("/nonexistent/ffmpeg-binary"),
            ..TranscoderConfig::default()
        };
        let transcoder = HlsTranscoder::new(storage.clone(), config);

        assert_eq!(transcoder.transcode(&source, "intro-to-x").await, None);
        assert!(!storage.exists(Disk::Local, &source).await);
        assert!(!storage.exists(Disk::Secure, "lessons/intro-to-x").await);
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg.sh");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file.sync_all().unwrap();
        drop(file);

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    const FAKE_FFMPEG_OK: &str = r#"#!/bin/sh
master=""
prev=""
last=""
for arg in "$@"; do
    if [ "$prev" = "-master_pl_name" ]; then master="$arg"; fi
    prev="$arg"
    last="$arg"
done
dir=$(dirname "$last")
stem="${master%.m3u8}"
printf '#EXTM3U\n' > "$dir/$master"
printf '#EXTM3U\n' > "$dir/${stem}_0.m3u8"
printf 'ts' > "$dir/${stem}_0_000.ts"
"#;

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_run_returns_master_path() {
        let dir = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let storage = Storage::under(dir.path());
        let source = stage_source(&storage).await;

        let config = TranscoderConfig {
            ffmpeg: fake_ffmpeg(bin.path(), FAKE_FFMPEG_OK).display().to_string(),
            ..TranscoderConfig::default()
        };
        let transcoder = HlsTranscoder::new(storage.clone(), config);

        let master = transcoder
            .transcode(&source, "intro-to-x")
            .await
            .expect("transcode should succeed");

        let name = master
            .strip_prefix("lessons/intro-to-x/")
            .and_then(|f| f.strip_suffix(".m3u8"))
            .unwrap();
        assert_eq!(name.len(), FILE_NAME_LEN);
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));

        assert!(storage.is_file(Disk::Secure, &master).await);
        let key = storage
            .read(Disk::Secure, &format!("lessons/intro-to-x/{name}.key"))
            .await
            .unwrap();
        assert_eq!(key.len(), KEY_LEN);
        assert!(
            !storage
                .exists(Disk::Secure, &format!("lessons/intro-to-x/{name}.keyinfo"))
                .await
        );
        assert!(!storage.exists(Disk::Local, &source).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_run_keeps_previous_export() {
        let dir = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let storage = Storage::under(dir.path());
        storage
            .put(Disk::Secure, "lessons/intro-to-x/old.m3u8", b"#EXTM3U\n")
            .await
            .unwrap();
        let source = stage_source(&storage).await;

        let config = TranscoderConfig {
            ffmpeg: fake_ffmpeg(bin.path(), "#!/bin/sh\necho 'bad input' >&2\nexit 1\n")
                .display()
                .to_string(),
            ..TranscoderConfig::default()
        };
        let transcoder = HlsTranscoder::new(storage.clone(), config);

        assert_eq!(transcoder.transcode(&source, "intro-to-x").await, None);
        assert!(storage.is_file(Disk::Secure, "lessons/intro-to-x/old.m3u8").await);
        assert!(!storage.exists(Disk::Local, &source).await);
    }
}
