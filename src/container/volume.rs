//! Shared volume file
//!
//! One host-side file carries the serialized payload. Every sandbox gets the
//! same file bind-mounted, so whatever was written last is what every key
//! reads back.
//!
//! Payloads are bincode: floats keep their exact bits and `Option`s keep
//! their nesting. The format is not self-describing, so payload types must
//! not rely on `#[serde(untagged)]` or `#[serde(flatten)]`.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::error::Result;
use crate::runtime::Mount;

#[derive(Debug, Clone)]
pub struct SharedVolume {
    host_path: PathBuf,
    bind_path: String,
}

impl SharedVolume {
    /// Open the volume at `host_path`, creating an empty file if absent
    pub fn open(host_path: impl AsRef<Path>, bind_path: impl Into<String>) -> Result<Self> {
        let host_path = host_path.as_ref();
        if let Some(parent) = host_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(host_path)?;

        // Docker needs an absolute host path for a bind mount
        let host_path = host_path.canonicalize()?;

        Ok(Self {
            host_path,
            bind_path: bind_path.into(),
        })
    }

    pub fn host_path(&self) -> &Path {
        &self.host_path
    }

    pub fn bind_path(&self) -> &str {
        &self.bind_path
    }

    /// Bind mount handed to every new sandbox
    pub fn mount(&self) -> Mount {
        Mount::read_write(&self.host_path, &self.bind_path)
    }

    /// Replace the payload with `value`
    pub fn write<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let file = File::create(&self.host_path)?;
        let mut writer = BufWriter::new(file);
        codec().serialize_into(&mut writer, value)?;
        writer.flush()?;
        trace!(path = %self.host_path.display(), "volume written");
        Ok(())
    }

    /// Decode the current payload. Leftover bytes mean the payload was
    /// written as a different type and fail the read.
    pub fn read<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes = fs::read(&self.host_path)?;
        let value = codec().deserialize(&bytes)?;
        trace!(path = %self.host_path.display(), "volume read");
        Ok(value)
    }

    /// Payload size in bytes
    pub fn size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.host_path)?.len())
    }
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}
