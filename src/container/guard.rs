//! Scoped unpause guard
//!
//! Pause state doubles as a non-reentrant lock: a sandbox is only unpaused
//! while a guard for it is alive. Acquiring unpauses, releasing (or dropping)
//! pauses again, whatever way the critical section ends.

use tracing::{error, trace};

use crate::error::Result;
use crate::runtime::Sandbox;

/// Holds a sandbox unpaused until released or dropped
#[derive(Debug)]
#[must_use = "the sandbox is re-paused as soon as the guard is dropped"]
pub struct UnpauseGuard<'a> {
    sandbox: &'a dyn Sandbox,
    released: bool,
}

impl<'a> UnpauseGuard<'a> {
    /// Unpause `sandbox`. If unpausing fails no guard exists and nothing
    /// will try to pause it again.
    pub fn acquire(sandbox: &'a dyn Sandbox) -> Result<Self> {
        sandbox.unpause()?;
        trace!(sandbox = sandbox.id(), "unpaused");
        Ok(Self {
            sandbox,
            released: false,
        })
    }

    pub fn sandbox(&self) -> &dyn Sandbox {
        self.sandbox
    }

    /// Pause the sandbox again and report the outcome
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.sandbox.pause()?;
        trace!(sandbox = self.sandbox.id(), "paused");
        Ok(())
    }

    /// Release, then hand back `outcome` of the critical section.
    ///
    /// An error in `outcome` wins over an error from pausing.
    pub fn release_with<T>(self, outcome: Result<T>) -> Result<T> {
        let sandbox = self.sandbox;
        let paused = self.release();
        match outcome {
            Ok(value) => paused.map(|_| value),
            Err(e) => {
                if let Err(pause_err) = paused {
                    error!(sandbox = sandbox.id(), error = %pause_err, "failed to re-pause sandbox");
                }
                Err(e)
            }
        }
    }
}

impl Drop for UnpauseGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.sandbox.pause() {
            Ok(()) => trace!(sandbox = self.sandbox.id(), "paused on drop"),
            Err(e) => error!(sandbox = self.sandbox.id(), error = %e, "failed to re-pause sandbox"),
        }
    }
}

/// Run `body` with `sandbox` unpaused.
///
/// The sandbox is paused again before this returns. An error from `body`
/// wins over an error from pausing.
pub fn with_unpaused<T, F>(sandbox: &dyn Sandbox, body: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let guard = UnpauseGuard::acquire(sandbox)?;
    let outcome = body();
    guard.release_with(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxmapError;
    use crate::runtime::{MemoryRuntime, Operation, SandboxRuntime, SandboxSpec, SandboxState};

    fn paused_sandbox(runtime: &MemoryRuntime) -> Box<dyn Sandbox> {
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
    fn test_acquire_and_release() {
        let runtime = MemoryRuntime::new();
        let sandbox = paused_sandbox(&runtime);
        let guard = UnpauseGuard::acquire(sandbox.as_ref()).unwrap();
        assert_eq!(guard.sandbox().state().unwrap(), SandboxState::Running);
        guard.release().unwrap();
        assert_eq!(sandbox.state().unwrap(), SandboxState::Paused);
    }

    #[test]
    fn test_drop_repauses() {
        let runtime = MemoryRuntime::new();
        let sandbox = paused_sandbox(&runtime);
        {
            let _guard = UnpauseGuard::acquire(sandbox.as_ref()).unwrap();
            assert_eq!(sandbox.state().unwrap(), SandboxState::Running);
        }
        assert_eq!(sandbox.state().unwrap(), SandboxState::Paused);
    }

    #[test]
    fn test_body_error_still_repauses() {
        let runtime = MemoryRuntime::new();
        let sandbox = paused_sandbox(&runtime);
        let result: Result<()> = with_unpaused(sandbox.as_ref(), || {
            Err(BoxmapError::runtime("body", "boom"))
        });
        assert!(result.is_err());
        assert_eq!(sandbox.state().unwrap(), SandboxState::Paused);
    }

    #[test]
    fn test_panic_still_repauses() {
        let runtime = MemoryRuntime::new();
        let sandbox = paused_sandbox(&runtime);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = UnpauseGuard::acquire(sandbox.as_ref()).unwrap();
            panic!("critical section blew up");
        }));
        assert!(result.is_err());
        assert_eq!(sandbox.state().unwrap(), SandboxState::Paused);
    }

    #[test]
    fn test_failed_unpause_yields_no_guard() {
        let runtime = MemoryRuntime::new();
        let sandbox = paused_sandbox(&runtime);
        runtime.fail_next(Operation::Unpause);
        let mut ran = false;
        let result = with_unpaused(sandbox.as_ref(), || {
            ran = true;
            Ok(())
        });
        assert!(result.is_err());
        assert!(!ran);
        assert_eq!(sandbox.state().unwrap(), SandboxState::Paused);
    }

    #[test]
    fn test_pause_error_surfaces_on_success() {
        let runtime = MemoryRuntime::new();
        let sandbox = paused_sandbox(&runtime);
        runtime.fail_next(Operation::Pause);
        let result = with_unpaused(sandbox.as_ref(), || Ok(1));
        assert!(matches!(
            result,
            Err(BoxmapError::RuntimeError {
                operation: "pause",
                ..
            })
        ));
    }

    #[test]
    fn test_body_error_wins_over_pause_error() {
        let runtime = MemoryRuntime::new();
        let sandbox = paused_sandbox(&runtime);
        runtime.fail_next(Operation::Pause);
        let result: Result<()> = with_unpaused(sandbox.as_ref(), || {
            Err(BoxmapError::key_not_found(&"body"))
        });
        assert!(result.unwrap_err().is_key_not_found());
    }
}
