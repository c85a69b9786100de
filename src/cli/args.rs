//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{self, RuntimeKind, StoreConfig};
use crate::error::Result;

#[derive(Parser)]
#[command(name = "boxmap")]
#[command(author, version, about = "Keep values behind paused containers", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubCommand,

    /// Sandbox runtime to use (docker, memory)
    #[arg(long, global = true, env = "BOXMAP_RUNTIME")]
    pub runtime: Option<RuntimeKind>,

    /// Image every sandbox is started from
    #[arg(long, global = true, env = "BOXMAP_IMAGE")]
    pub image: Option<String>,

    /// Host file used as the shared volume
    #[arg(long, global = true, env = "BOXMAP_VOLUME")]
    pub volume: Option<PathBuf>,

    /// Configuration file (defaults to ./boxmap.toml, then the user config dir)
    #[arg(long, global = true, env = "BOXMAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum SubCommand {
    /// Store greetings and a counter, read them back, then clean up
    Demo {
        /// Number of greetings and counter increments
        #[arg(long, short, default_value = "10")]
        iterations: usize,

        /// Name to greet (defaults to the login name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Check that the sandbox runtime is reachable
    Check,

    /// Print the resolved configuration
    Config,
}

impl Args {
    /// Load the configuration file and apply command-line overrides
    pub fn store_config(&self) -> Result<StoreConfig> {
        let mut store = match &self.config {
            Some(path) => config::from_path(path)?,
            None => config::load()?,
        };

        if let Some(runtime) = self.runtime {
            store.runtime = runtime;
        }
        if let Some(ref image) = self.image {
            store.image = image.clone();
        }
        if let Some(ref volume) = self.volume {
            store.volume_path = volume.clone();
        }
        Ok(store)
    }
}
