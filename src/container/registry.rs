//! Container registry mapping keys to live sandboxes
//!
//! The registry owns every sandbox handle. Dropping it removes every
//! sandbox still registered.

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::guard::UnpauseGuard;
use crate::error::{BoxmapError, Result};
use crate::runtime::Sandbox;

/// Anything usable as a store key. Errors and reports render keys with
/// `Display`, logs with `Debug`.
pub trait StoreKey: Eq + Hash + Clone + Debug + Display {}

impl<T: Eq + Hash + Clone + Debug + Display> StoreKey for T {}

#[derive(Debug)]
struct RegistryEntry {
    sandbox: Box<dyn Sandbox>,
    created_at: DateTime<Utc>,
}

/// Snapshot of one registry entry
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub key: String,
    pub sandbox_id: String,
    pub created_at: DateTime<Utc>,
}

/// A key whose sandbox could not be removed cleanly during teardown
#[derive(Debug, Clone, Serialize)]
pub struct TeardownFailure {
    pub key: String,
    pub error: String,
}

/// Outcome of removing every registered sandbox
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeardownReport {
    pub removed: Vec<String>,
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Key to sandbox bookkeeping, in insertion order
#[derive(Debug)]
pub struct ContainerRegistry<K: StoreKey> {
    entries: HashMap<K, RegistryEntry>,
    order: Vec<K>,
}

impl<K: StoreKey> ContainerRegistry<K> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Look up the sandbox for `key`
    pub fn get(&self, key: &K) -> Option<&dyn Sandbox> {
        self.entries.get(key).map(|e| e.sandbox.as_ref())
    }

    /// Register `sandbox` under `key`, replacing any previous entry in place.
    ///
    /// A replaced sandbox is dropped without being removed from the runtime;
    /// callers evict first.
    pub fn add(&mut self, key: K, sandbox: Box<dyn Sandbox>) {
        debug!(key = ?key, sandbox = sandbox.id(), "registering sandbox");
        let entry = RegistryEntry {
            sandbox,
            created_at: Utc::now(),
        };
        match self.entries.insert(key.clone(), entry) {
            Some(old) => warn!(
                key = ?key,
                sandbox = old.sandbox.id(),
                "replaced a registered sandbox without removing it"
            ),
            None => self.order.push(key),
        }
    }

    /// Unpause and force-remove the sandbox for `key`, then drop the entry.
    ///
    /// Removal is attempted even when unpausing fails. A removal error is
    /// returned in preference to an unpause error and leaves the entry in
    /// place; an unpause error alone is still returned after the entry is
    /// gone.
    pub fn remove(&mut self, key: &K) -> Result<()> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| BoxmapError::key_not_found(key))?;

        info!(key = ?key, sandbox = entry.sandbox.id(), "deleting sandbox");
        let unpaused = entry.sandbox.unpause();
        if let Err(ref e) = unpaused {
            warn!(key = ?key, error = %e, "unpause before removal failed");
        }

        entry.sandbox.remove(true)?;
        self.forget(key);
        unpaused
    }

    /// Remove every registered sandbox.
    ///
    /// Failures are collected, never short-circuit; the registry is empty
    /// afterwards.
    pub fn teardown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        for key in self.order.clone() {
            let label = key.to_string();
            match self.remove(&key) {
                Ok(()) => report.removed.push(label),
                Err(e) => {
                    warn!(key = %label, error = %e, "teardown could not remove sandbox cleanly");
                    self.forget(&key);
                    report.failures.push(TeardownFailure {
                        key: label,
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Unpause the sandbox for `key` for the lifetime of the returned guard
    pub fn block_container(&self, key: &K) -> Result<UnpauseGuard<'_>> {
        let sandbox = self
            .get(key)
            .ok_or_else(|| BoxmapError::key_not_found(key))?;
        UnpauseGuard::acquire(sandbox)
    }

    /// Registered keys in insertion order
    pub fn keys(&self) -> Vec<K> {
        self.order.clone()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Describe every entry in insertion order
    pub fn entries(&self) -> Vec<EntryInfo> {
        self.order
            .iter()
            .filter_map(|key| {
                self.entries.get(key).map(|entry| EntryInfo {
                    key: key.to_string(),
                    sandbox_id: entry.sandbox.id().to_string(),
                    created_at: entry.created_at,
                })
            })
            .collect()
    }

    fn forget(&mut self, key: &K) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}

impl<K: StoreKey> Default for ContainerRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: StoreKey> Drop for ContainerRegistry<K> {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }
        let report = self.teardown();
        info!(
            removed = report.removed.len(),
            failed = report.failures.len(),
            "registry torn down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MemoryRuntime, Operation, SandboxRuntime, SandboxSpec, SandboxState};

    fn paused(runtime: &MemoryRuntime) -> Box<dyn Sandbox> {
        let sandbox = runtime
            .create(&SandboxSpec {
                image: "alpine:3.16".to_string(),
                detach: true,
                tty: true,
                mounts: Vec::new(),
            })
            .unwrap();
        sandbox.pause().unwrap();
        sandbox
    }

    #[test]
    fn test_registry_new() {
        let registry: ContainerRegistry<String> = ContainerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(&"missing".to_string()).is_none());
    }

    #[test]
    fn test_registry_add_and_get() {
        let runtime = MemoryRuntime::new();
        let mut registry = ContainerRegistry::new();
        let sandbox = paused(&runtime);
        let id = sandbox.id().to_string();
        registry.add("a", sandbox);
        assert_eq!(registry.get(&"a").unwrap().id(), id);
        assert!(registry.contains_key(&"a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_add_overwrite_keeps_position() {
        let runtime = MemoryRuntime::new();
        let mut registry = ContainerRegistry::new();
        registry.add("a", paused(&runtime));
        registry.add("b", paused(&runtime));
        let replacement = paused(&runtime);
        let id = replacement.id().to_string();
        registry.add("a", replacement);
        assert_eq!(registry.keys(), vec!["a", "b"]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(&"a").unwrap().id(), id);
    }

    #[test]
    fn test_registry_remove() {
        let runtime = MemoryRuntime::new();
        let mut registry = ContainerRegistry::new();
        let sandbox = paused(&runtime);
        let id = sandbox.id().to_string();
        registry.add("a", sandbox);
        registry.remove(&"a").unwrap();
        assert!(registry.is_empty());
        assert_eq!(runtime.state_of(&id), Some(SandboxState::Removed));
        let ops: Vec<Operation> = runtime.events().into_iter().map(|(op, _)| op).collect();
        assert_eq!(
            &ops[ops.len() - 2..],
            &[Operation::Unpause, Operation::Remove]
        );
    }

    #[test]
    fn test_registry_remove_missing() {
        let mut registry: ContainerRegistry<&str> = ContainerRegistry::new();
        let err = registry.remove(&"nope").unwrap_err();
        assert!(err.is_key_not_found());
    }

    #[test]
    fn test_registry_remove_runs_after_failed_unpause() {
        let runtime = MemoryRuntime::new();
        let mut registry = ContainerRegistry::new();
        let sandbox = paused(&runtime);
        let id = sandbox.id().to_string();
        registry.add("a", sandbox);
        runtime.fail_next(Operation::Unpause);
        let err = registry.remove(&"a").unwrap_err();
        assert!(matches!(
            err,
            BoxmapError::RuntimeError {
                operation: "unpause",
                ..
            }
        ));
        assert!(registry.is_empty());
        assert_eq!(runtime.state_of(&id), Some(SandboxState::Removed));
    }

    #[test]
    fn test_registry_failed_removal_keeps_entry() {
        let runtime = MemoryRuntime::new();
        let mut registry = ContainerRegistry::new();
        registry.add("a", paused(&runtime));
        runtime.fail_next(Operation::Remove);
        let err = registry.remove(&"a").unwrap_err();
        assert!(matches!(
            err,
            BoxmapError::RuntimeError {
                operation: "remove",
                ..
            }
        ));
        assert!(registry.contains_key(&"a"));
    }

    #[test]
    fn test_registry_teardown_survives_failures() {
        let runtime = MemoryRuntime::new();
        let mut registry = ContainerRegistry::new();
        registry.add("a", paused(&runtime));
        registry.add("b", paused(&runtime));
        registry.add("c", paused(&runtime));
        runtime.fail_next(Operation::Remove);
        let report = registry.teardown();
        assert!(registry.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, "a");
        assert_eq!(report.removed, vec!["b", "c"]);
        assert!(!report.is_clean());
        assert_eq!(runtime.live_count(), 1);
    }

    #[test]
    fn test_registry_drop_removes_everything() {
        let runtime = MemoryRuntime::new();
        {
            let mut registry = ContainerRegistry::new();
            registry.add(1, paused(&runtime));
            registry.add(2, paused(&runtime));
            assert_eq!(runtime.live_count(), 2);
        }
        assert_eq!(runtime.live_count(), 0);
    }

    #[test]
    fn test_block_container() {
        let runtime = MemoryRuntime::new();
        let mut registry = ContainerRegistry::new();
        registry.add("a", paused(&runtime));
        {
            let _guard = registry.block_container(&"a").unwrap();
            assert_eq!(
                registry.get(&"a").unwrap().state().unwrap(),
                SandboxState::Running
            );
        }
        assert_eq!(
            registry.get(&"a").unwrap().state().unwrap(),
            SandboxState::Paused
        );
    }

    #[test]
    fn test_block_container_missing() {
        let registry: ContainerRegistry<&str> = ContainerRegistry::new();
        let err = registry.block_container(&"ghost").unwrap_err();
        assert_eq!(err.to_string(), "couldn't find container ghost");
    }

    #[test]
    fn test_registry_entries() {
        let runtime = MemoryRuntime::new();
        let mut registry = ContainerRegistry::new();
        registry.add("x", paused(&runtime));
        let entries = registry.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "x");
        assert!(entries[0].sandbox_id.starts_with("mem-"));
    }
}
