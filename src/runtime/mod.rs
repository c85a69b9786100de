//! Sandbox runtime adapters
//!
//! A runtime creates isolated execution units; each unit is driven through
//! the [`Sandbox`] trait:
//! - `pause` / `unpause` suspend and resume its process tree
//! - `remove` destroys it
//! - `state` reports what the runtime currently believes
//!
//! Two backends are provided: [`DockerRuntime`] shells out to the `docker`
//! CLI, [`MemoryRuntime`] simulates sandboxes in-process.

mod docker;
mod memory;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use docker::{DockerRuntime, DockerSandbox, DEFAULT_DOCKER_BINARY};
pub use memory::{MemoryRuntime, MemorySandbox, Operation};

/// Observed state of a sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxState {
    Running,
    Paused,
    Removed,
}

impl fmt::Display for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxState::Running => write!(f, "running"),
            SandboxState::Paused => write!(f, "paused"),
            SandboxState::Removed => write!(f, "removed"),
        }
    }
}

/// Access mode of a bind mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountMode {
    Ro,
    Rw,
}

impl fmt::Display for MountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountMode::Ro => write!(f, "ro"),
            MountMode::Rw => write!(f, "rw"),
        }
    }
}

/// A host path bound into the sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub host_path: PathBuf,
    pub target: String,
    pub mode: MountMode,
}

impl Mount {
    pub fn read_write(host_path: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            target: target.into(),
            mode: MountMode::Rw,
        }
    }
}

/// Everything a runtime needs to start a sandbox
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxSpec {
    pub image: String,
    pub detach: bool,
    pub tty: bool,
    pub mounts: Vec<Mount>,
}

/// A live sandbox owned by whoever holds the box
pub trait Sandbox: fmt::Debug + Send {
    /// Runtime identifier of the sandbox
    fn id(&self) -> &str;

    fn pause(&self) -> Result<()>;

    fn unpause(&self) -> Result<()>;

    /// Destroy the sandbox; `force` kills it even if it is running
    fn remove(&self, force: bool) -> Result<()>;

    fn state(&self) -> Result<SandboxState>;
}

/// Factory for sandboxes
pub trait SandboxRuntime: fmt::Debug + Send {
    /// Short name used in logs and reports
    fn name(&self) -> &'static str;

    /// Start a new sandbox. The sandbox is running when this returns.
    fn create(&self, spec: &SandboxSpec) -> Result<Box<dyn Sandbox>>;

    /// Check that the runtime is reachable
    fn ping(&self) -> Result<String>;
}
