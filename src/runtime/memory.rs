//! In-process runtime
//!
//! Sandboxes are plain state records behind a shared lock. The state
//! machine mirrors the docker daemon: pausing a paused sandbox fails,
//! unpausing a running one fails, and only a forced removal may destroy a
//! running or paused sandbox. Faults can be injected per operation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

use super::{Sandbox, SandboxRuntime, SandboxSpec, SandboxState};
use crate::error::{BoxmapError, Result};

/// Runtime operations that can be observed or made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Pause,
    Unpause,
    Remove,
    Inspect,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Pause => "pause",
            Operation::Unpause => "unpause",
            Operation::Remove => "remove",
            Operation::Inspect => "inspect",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug)]
struct Record {
    state: SandboxState,
    spec: SandboxSpec,
}

#[derive(Debug, Default)]
struct Inner {
    sandboxes: BTreeMap<String, Record>,
    next_id: u64,
    faults: Vec<Operation>,
    events: Vec<(Operation, String)>,
}

impl Inner {
    /// Consume a pending fault for `op`, if any
    fn take_fault(&mut self, op: Operation) -> bool {
        match self.faults.iter().position(|f| *f == op) {
            Some(idx) => {
                self.faults.remove(idx);
                true
            }
            None => false,
        }
    }
}

/// Runtime that keeps every sandbox in memory
///
/// Clones share the same sandbox table, so a test can keep one clone for
/// inspection while the store owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryRuntime {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    /// Make the next call of `op` fail
    pub fn fail_next(&self, op: Operation) {
        self.lock().faults.push(op);
    }

    /// State of a sandbox by id; unknown ids report `None`
    pub fn state_of(&self, id: &str) -> Option<SandboxState> {
        self.lock().sandboxes.get(id).map(|r| r.state)
    }

    /// Number of sandboxes not yet removed
    pub fn live_count(&self) -> usize {
        self.lock()
            .sandboxes
            .values()
            .filter(|r| r.state != SandboxState::Removed)
            .count()
    }

    /// Number of sandboxes ever created
    pub fn created_count(&self) -> usize {
        self.lock().sandboxes.len()
    }

    /// Spec a sandbox was created with
    pub fn spec_of(&self, id: &str) -> Option<SandboxSpec> {
        self.lock().sandboxes.get(id).map(|r| r.spec.clone())
    }

    /// Successful operations in call order, as (operation, sandbox id)
    pub fn events(&self) -> Vec<(Operation, String)> {
        self.lock().events.clone()
    }
}

impl SandboxRuntime for MemoryRuntime {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn create(&self, spec: &SandboxSpec) -> Result<Box<dyn Sandbox>> {
        let mut inner = self.lock();
        if inner.take_fault(Operation::Create) {
            return Err(BoxmapError::runtime("create", "injected failure"));
        }

        inner.next_id += 1;
        let id = format!("mem-{:04}", inner.next_id);
        inner.sandboxes.insert(
            id.clone(),
            Record {
                state: SandboxState::Running,
                spec: spec.clone(),
            },
        );
        inner.events.push((Operation::Create, id.clone()));
        trace!(sandbox = %id, image = %spec.image, "memory sandbox created");

        Ok(Box::new(MemorySandbox {
            id,
            inner: Arc::clone(&self.inner),
        }))
    }

    fn ping(&self) -> Result<String> {
        Ok(format!("memory runtime ({} live sandboxes)", self.live_count()))
    }
}

/// Handle to a sandbox in a [`MemoryRuntime`]
#[derive(Debug)]
pub struct MemorySandbox {
    id: String,
    inner: Arc<Mutex<Inner>>,
}

impl MemorySandbox {
    /// Apply a state transition, recording it on success
    fn transition<F>(&self, op: Operation, f: F) -> Result<()>
    where
        F: FnOnce(SandboxState) -> std::result::Result<SandboxState, String>,
    {
        let mut inner = lock(&self.inner);
        if inner.take_fault(op) {
            return Err(BoxmapError::runtime(op.name(), "injected failure"));
        }

        let record = match inner.sandboxes.get_mut(&self.id) {
            Some(record) if record.state != SandboxState::Removed => record,
            _ => {
                return Err(BoxmapError::runtime(
                    op.name(),
                    format!("No such container: {}", self.id),
                ))
            }
        };

        record.state = f(record.state).map_err(|msg| BoxmapError::runtime(op.name(), msg))?;
        inner.events.push((op, self.id.clone()));
        Ok(())
    }
}

impl Sandbox for MemorySandbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn pause(&self) -> Result<()> {
        let id = &self.id;
        self.transition(Operation::Pause, |state| match state {
            SandboxState::Running => Ok(SandboxState::Paused),
            _ => Err(format!("Container {} is already paused", id)),
        })
    }

    fn unpause(&self) -> Result<()> {
        let id = &self.id;
        self.transition(Operation::Unpause, |state| match state {
            SandboxState::Paused => Ok(SandboxState::Running),
            _ => Err(format!("Container {} is not paused", id)),
        })
    }

    fn remove(&self, force: bool) -> Result<()> {
        let id = &self.id;
        self.transition(Operation::Remove, |state| {
            if force {
                Ok(SandboxState::Removed)
            } else {
                Err(format!(
                    "cannot remove {} container {}: stop it first or force remove",
                    state, id
                ))
            }
        })
    }

    fn state(&self) -> Result<SandboxState> {
        let mut inner = lock(&self.inner);
        if inner.take_fault(Operation::Inspect) {
            return Err(BoxmapError::runtime("inspect", "injected failure"));
        }
        Ok(inner
            .sandboxes
            .get(&self.id)
            .map(|r| r.state)
            .unwrap_or(SandboxState::Removed))
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
