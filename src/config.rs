//! Store configuration
//!
//! Configuration is read from TOML:
//!
//! ```toml
//! image = "alpine:3.16"
//! volume_path = ".vol"
//! bind_path = "/home/data"
//! runtime = "docker"
//! docker_binary = "docker"
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BoxmapError, Result};
use crate::runtime::{DockerRuntime, MemoryRuntime, SandboxRuntime};

/// Project-local configuration file name
const LOCAL_CONFIG_NAME: &str = "boxmap.toml";

/// File name inside the user configuration directory
const USER_CONFIG_NAME: &str = "config.toml";

const APP_NAME: &str = "boxmap";

pub const DEFAULT_IMAGE: &str = "alpine:3.16";
pub const DEFAULT_VOLUME_PATH: &str = ".vol";
pub const DEFAULT_BIND_PATH: &str = "/home/data";

/// Which sandbox backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    #[default]
    Docker,
    Memory,
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeKind::Docker => write!(f, "docker"),
            RuntimeKind::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for RuntimeKind {
    type Err = BoxmapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(RuntimeKind::Docker),
            "memory" => Ok(RuntimeKind::Memory),
            other => Err(BoxmapError::ConfigError(format!(
                "unknown runtime '{}', expected 'docker' or 'memory'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Image every sandbox is started from
    pub image: String,
    /// Host file shared by all sandboxes
    pub volume_path: PathBuf,
    /// Where the volume appears inside each sandbox
    pub bind_path: String,
    pub detach: bool,
    pub tty: bool,
    pub runtime: RuntimeKind,
    pub docker_binary: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            volume_path: PathBuf::from(DEFAULT_VOLUME_PATH),
            bind_path: DEFAULT_BIND_PATH.to_string(),
            detach: true,
            tty: true,
            runtime: RuntimeKind::default(),
            docker_binary: crate::runtime::DEFAULT_DOCKER_BINARY.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    #[must_use]
    pub fn with_volume_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.volume_path = path.into();
        self
    }

    #[must_use]
    pub fn with_bind_path(mut self, path: impl Into<String>) -> Self {
        self.bind_path = path.into();
        self
    }

    #[must_use]
    pub fn with_runtime(mut self, runtime: RuntimeKind) -> Self {
        self.runtime = runtime;
        self
    }

    #[must_use]
    pub fn with_docker_binary(mut self, binary: impl Into<String>) -> Self {
        self.docker_binary = binary.into();
        self
    }

    /// Instantiate the configured runtime backend
    pub fn build_runtime(&self) -> Box<dyn SandboxRuntime> {
        match self.runtime {
            RuntimeKind::Docker => Box::new(DockerRuntime::new(self.docker_binary.clone())),
            RuntimeKind::Memory => Box::new(MemoryRuntime::new()),
        }
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| BoxmapError::ConfigError(e.to_string()))
    }
}

/// Load configuration from the default search paths.
///
/// Search order:
/// 1. `./boxmap.toml`
/// 2. `<config dir>/boxmap/config.toml`
///
/// Returns defaults when no file exists.
pub fn load() -> Result<StoreConfig> {
    for path in search_paths() {
        if path.exists() {
            return from_path(&path);
        }
    }
    Ok(StoreConfig::default())
}

/// Load configuration from a specific file
pub fn from_path(path: &Path) -> Result<StoreConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        BoxmapError::ConfigError(format!("failed to read '{}': {}", path.display(), e))
    })?;

    from_str(&contents).map_err(|e| {
        BoxmapError::ConfigError(format!("failed to parse '{}': {}", path.display(), e))
    })
}

/// Parse configuration from TOML text
pub fn from_str(toml_str: &str) -> Result<StoreConfig> {
    toml::from_str(toml_str).map_err(|e| BoxmapError::ConfigError(format!("invalid TOML: {}", e)))
}

/// Paths that [`load`] looks at, in order
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(APP_NAME).join(USER_CONFIG_NAME));
    }
    paths
}
