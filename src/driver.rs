//! Demo driver
//!
//! Exercises a [`ContainerMap`] the way an interactive session would: a
//! list of greetings goes in and comes back out, then a counter is bumped
//! through repeated read-modify-write cycles.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::debug;

use crate::config::StoreConfig;
use crate::container::{EntryInfo, TeardownReport};
use crate::error::Result;
use crate::map::ContainerMap;
use crate::runtime::SandboxRuntime;

pub const HELLO_KEY: &str = "hello";
pub const COUNTER_KEY: &str = "int";

#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub iterations: usize,
    /// Who gets greeted
    pub name: String,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            iterations: 10,
            name: default_name(),
        }
    }
}

/// Login name from the environment, or "world"
pub fn default_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "world".to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub runtime: String,
    /// Greetings consumed before the rest were stored
    pub printed: Vec<String>,
    /// Greetings read back from the store
    pub stored: Vec<String>,
    /// Counter value after each increment
    pub counter: Vec<i64>,
    pub interrupted: bool,
    pub volume_path: String,
    pub volume_bytes: u64,
    /// Sandboxes alive just before teardown
    pub sandboxes: Vec<EntryInfo>,
    pub teardown: TeardownReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub runtime: String,
    pub available: bool,
    pub detail: String,
}

/// Run the demo session. Setting `stop` ends the counter loop early; the
/// map is torn down either way.
pub fn run_demo(
    runtime: Box<dyn SandboxRuntime>,
    config: &StoreConfig,
    options: &DemoOptions,
    stop: &AtomicBool,
) -> Result<DemoReport> {
    let mut map: ContainerMap<String> = ContainerMap::new(runtime, config)?;
    let runtime_name = map.controller().runtime_name().to_string();

    let mut greetings =
        (0..options.iterations).map(|i| format!("[{}] hello, {}", i, options.name));
    let printed: Vec<String> = greetings.by_ref().take(options.iterations / 2).collect();
    let rest: Vec<String> = greetings.collect();

    map.set(HELLO_KEY.to_string(), &rest)?;
    let stored: Vec<String> = map.get(&HELLO_KEY.to_string())?;

    map.set(COUNTER_KEY.to_string(), &0i64)?;
    let mut counter = Vec::with_capacity(options.iterations);
    let mut interrupted = false;
    for _ in 0..options.iterations {
        if stop.load(Ordering::SeqCst) {
            interrupted = true;
            break;
        }
        let value = map.update(COUNTER_KEY.to_string(), |n: i64| n + 1)?;
        debug!(value, "counter incremented");
        counter.push(value);
    }

    let sandboxes = map.entries();
    let volume = map.controller().volume();
    let volume_path = volume.host_path().display().to_string();
    let volume_bytes = volume.size()?;
    let teardown = map.close();

    Ok(DemoReport {
        runtime: runtime_name,
        printed,
        stored,
        counter,
        interrupted,
        volume_path,
        volume_bytes,
        sandboxes,
        teardown,
    })
}

/// Ask the runtime whether it is reachable
pub fn run_check(runtime: &dyn SandboxRuntime) -> CheckReport {
    match runtime.ping() {
        Ok(detail) => CheckReport {
            runtime: runtime.name().to_string(),
            available: true,
            detail,
        },
        Err(e) => CheckReport {
            runtime: runtime.name().to_string(),
            available: false,
            detail: e.to_string(),
        },
    }
}
