//! Boxmap - a key-value store that keeps each value behind a paused container
//!
//! Every key owns one sandbox. A value is written or read only while the
//! key's sandbox is unpaused; the rest of the time the sandbox is paused.
//! All sandboxes mount the same host file, so only the value written last
//! is physically resident: reading an older key returns that latest payload.
//!
//! The store is single-threaded. `update` is a plain read followed by a
//! write and is not atomic.
//!
//! # Example
//!
//! ```no_run
//! use boxmap::{ContainerMap, StoreConfig};
//!
//! let config = StoreConfig::default();
//! let mut map: ContainerMap<&str> = ContainerMap::from_config(&config).unwrap();
//! map.set("a", &vec![1, 2, 3]).unwrap();
//! let value: Vec<i32> = map.get(&"a").unwrap();
//! assert_eq!(value, vec![1, 2, 3]);
//! // Dropping the map removes every sandbox
//! ```

pub mod cli;
pub mod config;
pub mod container;
pub mod driver;
pub mod error;
pub mod logging;
pub mod map;
pub mod output;
pub mod runtime;

pub use config::{RuntimeKind, StoreConfig};
pub use container::{ContainerController, ContainerRegistry, TeardownReport, UnpauseGuard};
pub use error::{BoxmapError, Result};
pub use map::ContainerMap;
pub use runtime::{DockerRuntime, MemoryRuntime, Sandbox, SandboxRuntime, SandboxState};
