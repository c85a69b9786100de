//! Container-backed storage
//!
//! The pieces that turn sandboxes into value slots:
//! - [`ContainerRegistry`]: which key owns which sandbox
//! - [`UnpauseGuard`]: pause state used as an access lock
//! - [`SharedVolume`]: the payload file mounted into every sandbox
//! - [`ContainerController`]: value set/get/delete on top of the above

mod controller;
mod guard;
mod registry;
mod volume;

pub use controller::ContainerController;
pub use guard::{with_unpaused, UnpauseGuard};
pub use registry::{ContainerRegistry, EntryInfo, StoreKey, TeardownFailure, TeardownReport};
pub use volume::SharedVolume;
