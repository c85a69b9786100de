//! Output formatting module

pub mod formatter;
pub mod human;
pub mod json;

use crate::driver::{CheckReport, DemoReport};

pub use formatter::{format_output, OutputFormat};

/// Anything the CLI prints
#[derive(Debug, Clone)]
pub enum Report {
    Demo(DemoReport),
    Check(CheckReport),
}
