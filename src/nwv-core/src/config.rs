use crate::binary::{binary_name, Platform};
use crate::paths::AppDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub webview: WebViewConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            logging: LoggingConfig::default(),
            webview: WebViewConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
    #[serde(default = "default_stdout_enabled")]
    pub stdout: bool,
    #[serde(default)]
    pub file_name: Option<String>,
    /// Level for renderer output (console logs, script errors, stray stdout).
    #[serde(default)]
    pub remote_level: Option<LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_log_files: default_max_log_files(),
            stdout: default_stdout_enabled(),
            file_name: None,
            remote_level: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// How the renderer process is located and driven.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebViewConfig {
    /// Explicit renderer binary; defaults to the platform binary under `dist/`.
    #[serde(default)]
    pub executable: Option<PathBuf>,
    /// Scheme the renderer uses for virtual content URLs.
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Grace period between sending `close` and killing the process.
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
    #[serde(default)]
    pub transparent: bool,
    /// Directory content requests are resolved against; defaults to the working dir.
    #[serde(default)]
    pub content_root: Option<PathBuf>,
}

impl Default for WebViewConfig {
    fn default() -> Self {
        Self {
            executable: None,
            scheme: default_scheme(),
            close_timeout_ms: default_close_timeout_ms(),
            transparent: false,
            content_root: None,
        }
    }
}

impl WebViewConfig {
    /// The renderer binary to launch: the configured override, or the
    /// platform binary inside the data directory.
    pub fn resolve_executable(&self, dirs: &AppDirs) -> PathBuf {
        match &self.executable {
            Some(path) => path.clone(),
            None => dirs.dist_dir().join(binary_name(Platform::current())),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let scheme_ok = !self.scheme.is_empty()
            && self
                .scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !scheme_ok {
            return Err(ValidationError::InvalidScheme(self.scheme.clone()));
        }
        if self.close_timeout_ms == 0 {
            return Err(ValidationError::ZeroCloseTimeout);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config validation failed: {0}")]
    Validation(ValidationError),
    #[error("failed to prepare configuration directories: {0}")]
    Directories(#[from] crate::paths::DirsError),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unsupported config_version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("webview.scheme {0:?} is not a valid URL scheme")]
    InvalidScheme(String),
    #[error("webview.close_timeout_ms must be greater than zero")]
    ZeroCloseTimeout,
}

impl Config {
    pub fn load_or_default(dirs: &AppDirs) -> Result<Self, ConfigError> {
        dirs.ensure_exists()?;
        let path = Self::config_path(dirs);
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }

    pub fn config_path(dirs: &AppDirs) -> PathBuf {
        dirs.config_dir().join("config.toml")
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.config_version != CURRENT_CONFIG_VERSION {
            return Err(ValidationError::UnsupportedVersion {
                found: self.config_version,
                expected: CURRENT_CONFIG_VERSION,
            });
        }
        self.webview.validate()
    }
}

fn default_config_version() -> u32 {
    CURRENT_CONFIG_VERSION
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_max_log_files() -> usize {
    7
}

fn default_stdout_enabled() -> bool {
    true
}

fn default_scheme() -> String {
    "nwv".to_string()
}

fn default_close_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dirs() -> (tempfile::TempDir, AppDirs) {
        let temp = tempfile::tempdir().unwrap();
        let dirs = AppDirs::from_roots(&temp.path().join("config"), &temp.path().join("data"));
        (temp, dirs)
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.max_log_files, 7);
        assert!(config.logging.stdout);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.webview.scheme, "nwv");
        assert_eq!(config.webview.close_timeout_ms, 5_000);
    }

    #[test]
    fn invalid_version_rejected() {
        let mut config = Config::default();
        config.config_version = CURRENT_CONFIG_VERSION + 1;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ValidationError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn scheme_with_separator_rejected() {
        let mut config = Config::default();
        config.webview.scheme = "nwv://".into();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidScheme(_))
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let (_temp, dirs) = temp_dirs();
        let config = Config::load_or_default(&dirs).expect("defaults");
        assert!(config.webview.executable.is_none());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let (_temp, dirs) = temp_dirs();
        dirs.ensure_exists().unwrap();
        fs::write(
            Config::config_path(&dirs),
            "[webview]\nexecutable = \"/opt/webview\"\ntransparent = true\n\n[logging]\nremote_level = \"debug\"\n",
        )
        .unwrap();

        let config = Config::load_or_default(&dirs).expect("config should load");
        assert_eq!(
            config.webview.executable.as_deref(),
            Some(std::path::Path::new("/opt/webview"))
        );
        assert!(config.webview.transparent);
        assert_eq!(config.webview.scheme, "nwv");
        assert_eq!(config.logging.remote_level, Some(LogLevel::Debug));
    }

    #[test]
    fn executable_defaults_to_dist_binary() {
        let (_temp, dirs) = temp_dirs();
        let path = WebViewConfig::default().resolve_executable(&dirs);
        assert!(path.starts_with(dirs.dist_dir()));
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some(binary_name(Platform::current()).as_str())
        );
    }
}
