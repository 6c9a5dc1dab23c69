use std::{ffi::OsString, fs::File, io::Read, path::{Path, PathBuf}};

use tracing::debug;

use super::error::{ConfigError, ConfigResult};

pub fn find_config_file(use_local: bool) -> PathBuf {
    #[cfg(unix)]
    let base = std::env::var_os("HOME");
    #[cfg(windows)]
    let base = std::env::var_os("APPDATA");
    #[cfg(not(any(unix, windows)))]
    let base: Option<OsString> = None;

    find_config_file_in(base, use_local)
}

/// Resolves the config location relative to a user directory (`$HOME` on unix,
/// `%APPDATA%` on windows). Falls back to `./config.toml`.
pub fn find_config_file_in(base: Option<OsString>, use_local: bool) -> PathBuf {
    let app_name = crate::APPLICATION_NAME;

    if use_local {
        return PathBuf::from("./config.toml");
    }

    if let Some(app_path) = base {
        let mut path = PathBuf::from(app_path);

        if cfg!(unix) {
            path = path.join(".config");
        }

        path = path.join(app_name).join("config.toml");

        if path.exists() {
            return path;
        }
    }

    PathBuf::from("./config.toml")
}

pub fn read_config(use_local: bool) -> ConfigResult<Vec<u8>> {
    read_config_from(&find_config_file(use_local))
}

pub fn read_config_from(filename: &Path) -> ConfigResult<Vec<u8>> {
    tracing::trace!("looking for config at: {}", filename.display());
    if !filename.exists() {
        return Err(ConfigError::ConfigNotFound);
    }

    let filename = filename.canonicalize()?;
    debug!("using {} as configuration file", filename.display());

    let mut fd = File::open(filename)?;
    let mut buf = Vec::new();
    fd.read_to_end(&mut buf)?;

    Ok(buf)
}
