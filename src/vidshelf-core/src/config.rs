//! Configuration management
//!
//! TOML configuration with per-section defaults. Every key is optional; a
//! missing file means all defaults.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use vidshelf_web::ServerOptions;

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "vidshelf.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid listen address {0}")]
    Address(String),
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub thumbnails: ThumbnailConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Where the catalog and its companion files live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Catalog JSON file
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,

    /// Remembers the folder last submitted for scanning
    #[serde(default = "default_last_path_file")]
    pub last_path_file: PathBuf,

    /// Frontend assets and `thumbnails/default.png`
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

/// External ffmpeg / ffprobe settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Directory holding the binaries (None = next to the executable, then PATH)
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Upper bound for one tool invocation
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Multi-thumbnail output size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    #[serde(default = "default_thumb_width")]
    pub width: u32,

    #[serde(default = "default_thumb_height")]
    pub height: u32,
}

// Default value functions
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 5000 }
fn default_data_file() -> PathBuf { PathBuf::from("data.json") }
fn default_last_path_file() -> PathBuf { PathBuf::from("last_path.json") }
fn default_static_dir() -> PathBuf { PathBuf::from("static") }
fn default_timeout_secs() -> u64 { 60 }
fn default_thumb_width() -> u32 { 320 }
fn default_thumb_height() -> u32 { 180 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            last_path_file: default_last_path_file(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            width: default_thumb_width(),
            height: default_thumb_height(),
        }
    }
}

/// Locate the config file: explicit path, `./vidshelf.toml`, then the
/// user config directory.
pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_owned());
    }
    let cwd_config = PathBuf::from(LOCAL_CONFIG_FILE);
    if cwd_config.exists() {
        return Some(cwd_config);
    }
    dirs::config_dir()
        .map(|dir| dir.join("vidshelf").join("config.toml"))
        .filter(|path| path.exists())
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Load the first config file found, or defaults when there is none.
    /// An explicit path that cannot be read is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match find_config_file(explicit) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Resolve relative library paths against `data_dir`
    pub fn with_data_dir(mut self, data_dir: &Path) -> Self {
        let library = &mut self.library;
        for path in [
            &mut library.data_file,
            &mut library.last_path_file,
            &mut library.static_dir,
        ] {
            if path.is_relative() {
                *path = data_dir.join(&*path);
            }
        }
        self
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse().map_err(|_| ConfigError::Address(addr))
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tools.timeout_secs.max(1))
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            data_file: self.library.data_file.clone(),
            last_path_file: self.library.last_path_file.clone(),
            static_dir: self.library.static_dir.clone(),
            thumbnail_size: (self.thumbnails.width, self.thumbnails.height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.listen_addr().unwrap().to_string(), "127.0.0.1:5000");
        assert_eq!(config.tool_timeout(), Duration::from_secs(60));
        assert_eq!(config.server_options().thumbnail_size, (320, 180));
        assert_eq!(config.library.data_file, PathBuf::from("data.json"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8080

            [tools]
            dir = "/opt/ffmpeg/bin"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.tools.dir, Some(PathBuf::from("/opt/ffmpeg/bin")));
        assert_eq!(config.tools.timeout_secs, 60);
        assert_eq!(config.thumbnails, ThumbnailConfig::default());
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[thumbnails]\nwidth = 640\nheight = 360\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.server_options().thumbnail_size, (640, 360));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[server\nport = ").unwrap();
        assert!(matches!(
            Config::from_file(&path).unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn test_data_dir_resolves_relative_paths_only() {
        let mut config = Config::default();
        config.library.static_dir = PathBuf::from("/srv/static");
        let config = config.with_data_dir(Path::new("/library"));

        assert_eq!(config.library.data_file, PathBuf::from("/library/data.json"));
        assert_eq!(
            config.library.last_path_file,
            PathBuf::from("/library/last_path.json")
        );
        assert_eq!(config.library.static_dir, PathBuf::from("/srv/static"));
    }

    #[test]
    fn test_bad_host_is_rejected() {
        let mut config = Config::default();
        config.server.host = "not a host".to_string();
        assert!(matches!(config.listen_addr(), Err(ConfigError::Address(_))));
    }
}
