//! Container controller
//!
//! Orchestrates sandbox lifecycle and value I/O. This is the only place that
//! touches the shared volume, and it only does so while the key's sandbox is
//! held unpaused by an [`UnpauseGuard`](super::UnpauseGuard).

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::registry::{ContainerRegistry, StoreKey, TeardownReport};
use super::volume::SharedVolume;
use crate::config::StoreConfig;
use crate::error::{BoxmapError, Result};
use crate::runtime::{SandboxRuntime, SandboxSpec, SandboxState};

#[derive(Debug)]
pub struct ContainerController<K: StoreKey> {
    registry: ContainerRegistry<K>,
    volume: SharedVolume,
    runtime: Box<dyn SandboxRuntime>,
    image: String,
    detach: bool,
    tty: bool,
}

impl<K: StoreKey> ContainerController<K> {
    /// Create a controller, opening (and if needed creating) the volume
    pub fn new(runtime: Box<dyn SandboxRuntime>, config: &StoreConfig) -> Result<Self> {
        let volume = SharedVolume::open(&config.volume_path, config.bind_path.clone())?;
        debug!(
            runtime = runtime.name(),
            volume = %volume.host_path().display(),
            "controller ready"
        );
        Ok(Self {
            registry: ContainerRegistry::new(),
            volume,
            runtime,
            image: config.image.clone(),
            detach: config.detach,
            tty: config.tty,
        })
    }

    fn sandbox_spec(&self) -> SandboxSpec {
        SandboxSpec {
            image: self.image.clone(),
            detach: self.detach,
            tty: self.tty,
            mounts: vec![self.volume.mount()],
        }
    }

    /// Start a sandbox for `key`, pause it and register it.
    ///
    /// If the fresh sandbox cannot be paused it is force-removed and nothing
    /// is registered.
    pub fn create_sandbox(&mut self, key: K) -> Result<()> {
        let sandbox = self.runtime.create(&self.sandbox_spec())?;

        if let Err(e) = sandbox.pause() {
            if let Err(remove_err) = sandbox.remove(true) {
                warn!(
                    sandbox = sandbox.id(),
                    error = %remove_err,
                    "could not remove sandbox after failed pause"
                );
            }
            return Err(e);
        }

        info!(key = ?key, sandbox = sandbox.id(), "sandbox created");
        self.registry.add(key, sandbox);
        Ok(())
    }

    /// Store `value` under `key` in a fresh sandbox.
    ///
    /// Any previous sandbox for `key` is removed first. If serialization
    /// fails the new sandbox stays registered (paused) and the volume holds
    /// whatever was partially written.
    pub fn set<V: Serialize + ?Sized>(&mut self, key: K, value: &V) -> Result<()> {
        if self.registry.contains_key(&key) {
            debug!(key = ?key, "dropping previous value");
            self.registry.remove(&key)?;
        }

        self.create_sandbox(key.clone())?;

        let guard = self.registry.block_container(&key)?;
        let written = self.volume.write(value);
        guard.release_with(written)
    }

    /// Read the value stored under `key`
    pub fn get<V: DeserializeOwned>(&self, key: &K) -> Result<V> {
        let guard = self.registry.block_container(key)?;
        let value = self.volume.read();
        guard.release_with(value)
    }

    /// Remove the sandbox for `key`
    pub fn delete(&mut self, key: &K) -> Result<()> {
        self.registry.remove(key)
    }

    /// Current state of the sandbox registered under `key`
    pub fn sandbox_state(&self, key: &K) -> Result<SandboxState> {
        self.registry
            .get(key)
            .ok_or_else(|| BoxmapError::key_not_found(key))?
            .state()
    }

    /// Remove every sandbox this controller created
    pub fn teardown(&mut self) -> TeardownReport {
        self.registry.teardown()
    }

    pub fn registry(&self) -> &ContainerRegistry<K> {
        &self.registry
    }

    pub fn volume(&self) -> &SharedVolume {
        &self.volume
    }

    pub fn runtime_name(&self) -> &'static str {
        self.runtime.name()
    }
}
