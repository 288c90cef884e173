//! Configuration for webshell.
//!
//! Loaded from `~/.webshell/config.toml`. Every table has defaults, so a
//! partial file is valid:
//!
//! ```toml
//! # Program the loopback transport runs (default: $SHELL, then /bin/sh)
//! shell = "/bin/bash"
//!
//! # Extra session environment, after TERM=xterm-256color
//! env = ["EDITOR=vi"]
//!
//! # Forward LANG, LC_*, TZ and COLORTERM from this process
//! inherit_safe_env = true
//!
//! log_level = "info"
//!
//! [endpoint]
//! mode = "production"          # or "development"
//! origin = "https://host:8443"
//! routed = true                # /shell/ws instead of /ws
//!
//! [status_bar]
//! visible = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::endpoint::{self, BuildMode, EndpointShape};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell run by the loopback transport
    pub shell: Option<String>,
    /// Extra `KEY=VALUE` session environment
    pub env: Vec<String>,
    pub inherit_safe_env: bool,
    pub log_level: String,
    pub endpoint: EndpointConfig,
    pub status_bar: StatusBarConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            env: Vec::new(),
            inherit_safe_env: true,
            log_level: "info".to_string(),
            endpoint: EndpointConfig::default(),
            status_bar: StatusBarConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub mode: BuildMode,
    /// Page origin used in production
    pub origin: Option<String>,
    pub routed: bool,
    pub dev_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            mode: BuildMode::Development,
            origin: None,
            routed: false,
            dev_url: endpoint::DEV_URL.to_string(),
        }
    }
}

impl EndpointConfig {
    pub fn shape(&self) -> EndpointShape {
        if self.routed {
            EndpointShape::Routed
        } else {
            EndpointShape::Fixed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusBarConfig {
    pub visible: bool,
}

impl Default for StatusBarConfig {
    fn default() -> Self {
        Self { visible: true }
    }
}

impl Config {
    /// Load `~/.webshell/config.toml`.
    ///
    /// A missing file means defaults. A broken one is an error, left for the
    /// caller to report once logging is up.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_or_default(config_path().as_deref())
    }

    fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) if path.exists() => Self::load_from(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Configured shell, else `$SHELL`, else `/bin/sh`
    pub fn resolved_shell(&self) -> String {
        self.shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| "/bin/sh".to_string())
    }
}

/// `~/.webshell`
pub fn app_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".webshell"))
}

fn config_path() -> Option<PathBuf> {
    app_dir().map(|dir| dir.join("config.toml"))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
