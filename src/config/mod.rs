use serde::Deserialize;

static CONFIG: OnceCell<Config> = OnceCell::const_new();

mod config_dir;
pub use config_dir::{find_config_file, find_config_file_in, read_config, read_config_from};

mod error;
pub use error::{ConfigError, ConfigResult};
use tokio::sync::OnceCell;

#[derive(Debug, Deserialize)]
pub struct Config {
    host: Host,
    app: App,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    transcoder: TranscoderConfig,
    #[serde(default)]
    ai: AiConfig,
}

#[derive(Debug, Deserialize)]
pub struct Host {
    bindto: String,
}

#[derive(Debug, Deserialize)]
pub struct App {
    jwt: String,
    database_uri: String,
    #[serde(default)]
    docs: bool,
}

/// Roots of the storage disks and upload ceilings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub public_root: String,
    pub local_root: String,
    pub secure_root: String,
    pub max_video_bytes: u64,
    pub max_document_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            public_root: String::from("storage/public"),
            local_root: String::from("storage/app"),
            secure_root: String::from("storage/secure"),
            max_video_bytes: 1024 * 1024 * 1024,
            max_document_bytes: 10 * 1024 * 1024,
        }
    }
}

/// One HLS variant produced by the transcoder.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Rendition {
    pub height: u32,
    pub video_kbps: u32,
    pub audio_kbps: u32,
}

impl Rendition {
    pub const fn new(height: u32, video_kbps: u32, audio_kbps: u32) -> Self {
        Self {
            height,
            video_kbps,
            audio_kbps,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    pub ffmpeg: String,
    pub segment_seconds: u32,
    pub keyframe_interval: u32,
    pub renditions: Vec<Rendition>,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: String::from("ffmpeg"),
            segment_seconds: 10,
            keyframe_interval: 48,
            renditions: vec![
                Rendition::new(360, 500, 96),
                Rendition::new(720, 1500, 128),
                Rendition::new(1080, 3000, 192),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: String::from("https://generativelanguage.googleapis.com/v1beta"),
            model: String::from("gemini-1.5-flash"),
            timeout_seconds: 120,
        }
    }
}

impl Config {
    #[tracing::instrument]
    pub async fn get_or_init(use_local: bool) -> &'static Config {
        CONFIG
            .get_or_init(|| async {
                let read_cfg = |use_local| -> ConfigResult<Self> {
                    let bytes = read_config(use_local)?;
                    Self::from_slice(&bytes)
                };

                match read_cfg(use_local) {
                    Ok(c) => c,
                    Err(e) => {
                        if !matches!(e, error::ConfigError::ConfigNotFound) {
                            crate::error::log_error(&e);
                        }
                        tracing::error!("Config not found.");
                        std::process::exit(1);
                    }
                }
            })
            .await
    }

    pub fn from_slice(bytes: &[u8]) -> ConfigResult<Self> {
        let config: Self = toml::from_slice(bytes)?;
        Ok(config)
    }

    #[inline]
    pub fn host(&self) -> &Host {
        &self.host
    }

    #[inline]
    pub fn app(&self) -> &App {
        &self.app
    }

    #[inline]
    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    #[inline]
    pub fn transcoder(&self) -> &TranscoderConfig {
        &self.transcoder
    }

    #[inline]
    pub fn ai(&self) -> &AiConfig {
        &self.ai
    }
}

impl Host {
    #[inline]
    pub fn bindto(&self) -> &str {
        &self.bindto
    }
}

impl App {
    #[inline]
    pub fn jwt(&self) -> &str {
        &self.jwt
    }

    #[inline]
    pub fn database_uri(&self) -> &str {
        &self.database_uri
    }

    #[inline]
    pub fn docs(&self) -> bool {
        self.docs
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn config_test() {
        let config = Config::get_or_init(true).await;
        assert_eq!(config.host().bindto(), "127.0.0.1:5000"); // defaults
        assert_eq!(config.transcoder().segment_seconds, 10);
    }

    #[test]
    fn optional_sections_fall_back_to_defaults() {
        let raw = br#"
            [host]
            bindto = "0.0.0.0:8080"

            [app]
            jwt = "secret"
            database_uri = "postgres://localhost/db"
        "#;

        let config = Config::from_slice(raw).unwrap();
        assert!(!config.app().docs());
        assert_eq!(config.storage().max_video_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.storage().max_document_bytes, 10 * 1024 * 1024);
        assert_eq!(config.transcoder().keyframe_interval, 48);
        assert_eq!(config.transcoder().renditions.len(), 3);
        assert_eq!(config.ai().timeout_seconds, 120);
    }

    #[test]
    fn renditions_can_be_overridden() {
        let raw = br#"
            [host]
            bindto = "0.0.0.0:8080"

            [app]
            jwt = "secret"
            database_uri = "postgres://localhost/db"

            [transcoder]
            ffmpeg = "/opt/ffmpeg/bin/ffmpeg"

            [[transcoder.renditions]]
            height = 480
            video_kbps = 800
            audio_kbps = 96
        "#;

        let config = Config::from_slice(raw).unwrap();
        let transcoder = config.transcoder();
        assert_eq!(transcoder.ffmpeg, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(transcoder.segment_seconds, 10);
        assert_eq!(transcoder.renditions, vec![Rendition::new(480, 800, 96)]);
    }

    #[test]
    fn missing_app_section_is_rejected() {
        let raw = br#"
            [host]
            bindto = "0.0.0.0:8080"
        "#;

        assert!(matches!(
            Config::from_slice(raw),
            Err(ConfigError::TomlDeError(_))
        ));
    }
}
