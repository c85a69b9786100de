//! Boxmap CLI - keep values behind paused containers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use boxmap::cli::{Args, SubCommand};
use boxmap::driver::{default_name, run_check, run_demo, DemoOptions};
use boxmap::logging::{self, LogLevel};
use boxmap::output::{format_output, OutputFormat, Report};

fn main() {
    let args = Args::parse();

    if let Err(e) = logging::init(LogLevel::from_verbose(args.verbose)) {
        eprintln!("Warning: {}", e);
    }

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = args
        .store_config()
        .context("failed to load configuration")?;
    let output_format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match args.command {
        SubCommand::Demo { iterations, name } => {
            let stop = Arc::new(AtomicBool::new(false));
            let s = stop.clone();

            // Ctrl+C ends the counter loop; sandboxes are still removed
            ctrlc::set_handler(move || {
                s.store(true, Ordering::SeqCst);
            })
            .context("failed to set Ctrl+C handler")?;

            let options = DemoOptions {
                iterations,
                name: name.unwrap_or_else(default_name),
            };
            if args.verbose {
                println!(
                    "Running demo on the {} runtime with image {}",
                    config.runtime, config.image
                );
            }

            let report = run_demo(config.build_runtime(), &config, &options, &stop)
                .context("demo failed")?;
            println!("{}", format_output(&Report::Demo(report), &output_format));
            Ok(())
        }

        SubCommand::Check => {
            let runtime = config.build_runtime();
            let report = run_check(runtime.as_ref());
            let available = report.available;
            println!("{}", format_output(&Report::Check(report), &output_format));
            if !available {
                anyhow::bail!("{} runtime is not reachable", config.runtime);
            }
            Ok(())
        }

        SubCommand::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
