//! Docker backend driven through the `docker` CLI

use std::process::{Command, Output};

use tracing::debug;

use super::{Sandbox, SandboxRuntime, SandboxSpec, SandboxState};
use crate::error::{BoxmapError, Result};

/// Default CLI binary
pub const DEFAULT_DOCKER_BINARY: &str = "docker";

/// Runtime that starts containers with `docker run`
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: String,
}

impl DockerRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Build the argument list for `docker run`
    pub fn run_args(spec: &SandboxSpec) -> Vec<String> {
        let mut args = vec!["run".to_string()];
        if spec.detach {
            args.push("--detach".to_string());
        }
        if spec.tty {
            args.push("--tty".to_string());
        }
        for mount in &spec.mounts {
            args.push("--volume".to_string());
            args.push(format!(
                "{}:{}:{}",
                mount.host_path.display(),
                mount.target,
                mount.mode
            ));
        }
        args.push(spec.image.clone());
        args
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new(DEFAULT_DOCKER_BINARY)
    }
}

impl SandboxRuntime for DockerRuntime {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn create(&self, spec: &SandboxSpec) -> Result<Box<dyn Sandbox>> {
        let args = Self::run_args(spec);
        debug!(image = %spec.image, "docker {}", args.join(" "));
        let output = docker(&self.binary, "create", &args)?;
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if id.is_empty() {
            return Err(BoxmapError::runtime(
                "create",
                "docker run did not print a container id",
            ));
        }
        Ok(Box::new(DockerSandbox {
            id,
            binary: self.binary.clone(),
        }))
    }

    fn ping(&self) -> Result<String> {
        let output = docker(
            &self.binary,
            "ping",
            &["version", "--format", "{{.Server.Version}}"],
        )?;
        Ok(format!(
            "docker server {}",
            String::from_utf8_lossy(&output.stdout).trim()
        ))
    }
}

/// A container started by [`DockerRuntime`]
#[derive(Debug, Clone)]
pub struct DockerSandbox {
    id: String,
    binary: String,
}

impl Sandbox for DockerSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn pause(&self) -> Result<()> {
        docker(&self.binary, "pause", &["pause", self.id.as_str()]).map(|_| ())
    }

    fn unpause(&self) -> Result<()> {
        docker(&self.binary, "unpause", &["unpause", self.id.as_str()]).map(|_| ())
    }

    fn remove(&self, force: bool) -> Result<()> {
        let mut args = vec!["rm"];
        if force {
            args.push("--force");
        }
        args.push(self.id.as_str());
        docker(&self.binary, "remove", &args).map(|_| ())
    }

    fn state(&self) -> Result<SandboxState> {
        let args = ["inspect", "--format", "{{.State.Status}}", self.id.as_str()];
        match docker(&self.binary, "inspect", &args) {
            Ok(output) => parse_status(String::from_utf8_lossy(&output.stdout).trim()),
            Err(e) if is_missing_container(&e) => Ok(SandboxState::Removed),
            Err(e) => Err(e),
        }
    }
}

/// Docker reports an unknown id as "No such object" or "No such container"
fn is_missing_container(err: &BoxmapError) -> bool {
    matches!(
        err,
        BoxmapError::RuntimeError { message, .. }
            if message.contains("No such object") || message.contains("No such container")
    )
}

fn parse_status(status: &str) -> Result<SandboxState> {
    match status {
        "paused" => Ok(SandboxState::Paused),
        "running" | "created" | "restarting" => Ok(SandboxState::Running),
        other => Err(BoxmapError::runtime(
            "inspect",
            format!("container is {}", other),
        )),
    }
}

/// Run the docker CLI and turn a non-zero exit into a runtime error
fn docker<S: AsRef<str>>(binary: &str, operation: &'static str, args: &[S]) -> Result<Output> {
    let output = Command::new(binary)
        .args(args.iter().map(|a| a.as_ref()))
        .output()
        .map_err(|e| BoxmapError::runtime(operation, format!("failed to run {}: {}", binary, e)))?;

    if !output.status.success() {
        return Err(BoxmapError::runtime(
            operation,
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    Ok(output)
}
