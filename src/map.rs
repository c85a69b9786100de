//! Map facade over the container controller
//!
//! [`ContainerMap`] looks like an ordinary key-value map. Every sandbox it
//! created is removed when the map is closed or dropped.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::config::StoreConfig;
use crate::container::{ContainerController, EntryInfo, StoreKey, TeardownReport};
use crate::error::Result;
use crate::runtime::SandboxRuntime;

/// Key-value map whose values live behind paused sandboxes
///
/// # Example
///
/// ```no_run
/// use boxmap::{ContainerMap, StoreConfig};
///
/// let config = StoreConfig::default();
/// let total = ContainerMap::<&str>::scope(config.build_runtime(), &config, |map| {
///     map.set("int", &0)?;
///     for _ in 0..10 {
///         map.update("int", |n: i64| n + 1)?;
///     }
///     map.get::<i64>(&"int")
/// })
/// .unwrap();
/// assert_eq!(total, 10);
/// ```
#[derive(Debug)]
pub struct ContainerMap<K: StoreKey> {
    controller: ContainerController<K>,
}

impl<K: StoreKey> ContainerMap<K> {
    pub fn new(runtime: Box<dyn SandboxRuntime>, config: &StoreConfig) -> Result<Self> {
        Ok(Self {
            controller: ContainerController::new(runtime, config)?,
        })
    }

    /// Build a map using the runtime named in `config`
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::new(config.build_runtime(), config)
    }

    /// Run `body` against a fresh map and tear the map down afterwards,
    /// whether `body` succeeds, fails or panics.
    pub fn scope<T, F>(runtime: Box<dyn SandboxRuntime>, config: &StoreConfig, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let mut map = Self::new(runtime, config)?;
        let outcome = body(&mut map);
        let report = map.close();
        if !report.is_clean() {
            warn!(failed = report.failures.len(), "scope teardown left failures");
        }
        outcome
    }

    pub fn set<V: Serialize + ?Sized>(&mut self, key: K, value: &V) -> Result<()> {
        self.controller.set(key, value)
    }

    pub fn get<V: DeserializeOwned>(&self, key: &K) -> Result<V> {
        self.controller.get(key)
    }

    pub fn delete(&mut self, key: &K) -> Result<()> {
        self.controller.delete(key)
    }

    /// Read, transform and write back the value under `key`.
    ///
    /// This is a plain `get` followed by a `set`; nothing makes the pair
    /// atomic.
    pub fn update<V, F>(&mut self, key: K, f: F) -> Result<V>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce(V) -> V,
    {
        let current: V = self.get(&key)?;
        let next = f(current);
        self.set(key, &next)?;
        Ok(next)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.controller.registry().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.controller.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.controller.registry().is_empty()
    }

    /// Keys registered right now, in insertion order
    pub fn keys(&self) -> Keys<K> {
        Keys {
            inner: self.controller.registry().keys().into_iter(),
        }
    }

    pub fn entries(&self) -> Vec<EntryInfo> {
        self.controller.registry().entries()
    }

    pub fn controller(&self) -> &ContainerController<K> {
        &self.controller
    }

    /// Remove every sandbox now and report how it went
    pub fn close(mut self) -> TeardownReport {
        self.controller.teardown()
    }
}

impl<'a, K: StoreKey> IntoIterator for &'a ContainerMap<K> {
    type Item = K;
    type IntoIter = Keys<K>;

    fn into_iter(self) -> Keys<K> {
        self.keys()
    }
}

/// Snapshot iterator over map keys
#[derive(Debug, Clone)]
pub struct Keys<K> {
    inner: std::vec::IntoIter<K>,
}

impl<K> Iterator for Keys<K> {
    type Item = K;

    fn next(&mut self) -> Option<K> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K> ExactSizeIterator for Keys<K> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxmapError;
    use crate::runtime::{MemoryRuntime, Operation, SandboxState};
    use tempfile::TempDir;

    fn map() -> (ContainerMap<&'static str>, MemoryRuntime, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let runtime = MemoryRuntime::new();
        let config = StoreConfig::new().with_volume_path(dir.path().join(".vol"));
        let map = ContainerMap::new(Box::new(runtime.clone()), &config).unwrap();
        (map, runtime, dir)
    }

    #[test]
    fn test_map_set_get() {
        let (mut map, _runtime, _dir) = map();
        map.set("a", &vec![1, 2, 3]).unwrap();
        assert_eq!(map.get::<Vec<i32>>(&"a").unwrap(), vec![1, 2, 3]);
        assert!(map.contains_key(&"a"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_map_counter() {
        let (mut map, _runtime, _dir) = map();
        map.set("a", &0).unwrap();
        for _ in 0..10 {
            let n: i32 = map.get(&"a").unwrap();
            map.set("a", &(n + 1)).unwrap();
        }
        assert_eq!(map.get::<i32>(&"a").unwrap(), 10);
    }

    #[test]
    fn test_map_update() {
        let (mut map, runtime, _dir) = map();
        map.set("int", &0).unwrap();
        for _ in 0..10 {
            map.update("int", |n: i32| n + 1).unwrap();
        }
        assert_eq!(map.get::<i32>(&"int").unwrap(), 10);
        assert_eq!(runtime.created_count(), 11);
        assert_eq!(runtime.live_count(), 1);
    }

    #[test]
    fn test_map_update_missing_key() {
        let (mut map, runtime, _dir) = map();
        let err = map.update("ghost", |n: i32| n + 1).unwrap_err();
        assert!(err.is_key_not_found());
        assert_eq!(runtime.created_count(), 0);
    }

    #[test]
    fn test_map_delete() {
        let (mut map, _runtime, _dir) = map();
        map.set("x", &1).unwrap();
        map.delete(&"x").unwrap();
        assert!(matches!(
            map.get::<i32>(&"x"),
            Err(BoxmapError::KeyNotFound(_))
        ));
        assert!(map.is_empty());
    }

    #[test]
    fn test_map_keys_in_insertion_order() {
        let (mut map, _runtime, _dir) = map();
        map.set("b", &1).unwrap();
        map.set("a", &2).unwrap();
        map.set("c", &3).unwrap();
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);

        // A rewrite evicts and re-registers, moving the key to the end
        map.set("b", &4).unwrap();
        let keys: Vec<&str> = (&map).into_iter().collect();
        assert_eq!(keys, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_map_keys_is_snapshot() {
        let (mut map, _runtime, _dir) = map();
        map.set("a", &1).unwrap();
        let keys = map.keys();
        map.set("b", &2).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(map.keys().len(), 2);
    }

    #[test]
    fn test_map_close() {
        let (mut map, runtime, _dir) = map();
        map.set("a", &1).unwrap();
        map.set("b", &2).unwrap();
        let report = map.close();
        assert_eq!(report.removed, vec!["a", "b"]);
        assert_eq!(runtime.live_count(), 0);
    }

    #[test]
    fn test_map_drop_tears_down() {
        let (mut map, runtime, _dir) = map();
        map.set("a", &1).unwrap();
        drop(map);
        assert_eq!(runtime.live_count(), 0);
    }

    #[test]
    fn test_scope_tears_down_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = MemoryRuntime::new();
        let config = StoreConfig::new().with_volume_path(dir.path().join(".vol"));
        let result: Result<()> =
            ContainerMap::scope(Box::new(runtime.clone()), &config, |map| {
                map.set("a", &1)?;
                map.set("b", &2)?;
                map.get::<i32>(&"missing")?;
                Ok(())
            });
        assert!(result.unwrap_err().is_key_not_found());
        assert_eq!(runtime.live_count(), 0);
    }

    #[test]
    fn test_scope_tears_down_despite_remove_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = MemoryRuntime::new();
        let config = StoreConfig::new().with_volume_path(dir.path().join(".vol"));
        let probe = runtime.clone();
        let value = ContainerMap::scope(Box::new(runtime.clone()), &config, |map| {
            map.set(1, &"one")?;
            map.set(2, &"two")?;
            map.set(3, &"three")?;
            probe.fail_next(Operation::Remove);
            map.get::<String>(&3)
        })
        .unwrap();
        assert_eq!(value, "three");
        // Only the sandbox whose removal failed survives
        assert_eq!(runtime.live_count(), 1);
    }

    #[test]
    fn test_pause_invariant_after_operations() {
        let (mut map, runtime, _dir) = map();
        map.set("a", &1).unwrap();
        let _: i32 = map.get(&"a").unwrap();
        let _ = map.get::<String>(&"a");
        let id = map.controller().registry().get(&"a").unwrap().id().to_string();
        assert_eq!(runtime.state_of(&id), Some(SandboxState::Paused));
    }
}
