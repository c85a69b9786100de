//! Human-readable output formatting

use crate::output::Report;
use bytesize::ByteSize;

pub fn format_human(report: &Report) -> String {
    match report {
        Report::Demo(demo) => {
            let mut output = String::new();
            for line in &demo.printed {
                output.push_str(line);
                output.push('\n');
            }

            output.push_str(&format!("\nStored under \"hello\" ({} items)\n", demo.stored.len()));
            for line in &demo.stored {
                output.push_str(&format!("  {}\n", line));
            }

            output.push_str("\nCounter \"int\"\n");
            for value in &demo.counter {
                output.push_str(&format!("  map[\"int\"] = {}\n", value));
            }
            if demo.interrupted {
                output.push_str("  (interrupted)\n");
            }

            output.push_str(&format!(
                "\nSandboxes ({} runtime)\n{}\n",
                demo.runtime,
                "-".repeat(40)
            ));
            for entry in &demo.sandboxes {
                output.push_str(&format!(
                    "  {:<10} {:<16} {}\n",
                    entry.key,
                    truncate(&entry.sandbox_id, 16),
                    entry.created_at.format("%H:%M:%S")
                ));
            }
            output.push_str(&format!(
                "\nVolume: {} ({})\n",
                demo.volume_path,
                ByteSize(demo.volume_bytes)
            ));

            output.push_str(&format!(
                "Teardown: {} removed, {} failed\n",
                demo.teardown.removed.len(),
                demo.teardown.failures.len()
            ));
            for failure in &demo.teardown.failures {
                output.push_str(&format!("  {}: {}\n", failure.key, failure.error));
            }
            output
        }
        Report::Check(check) => {
            let status = if check.available {
                "available"
            } else {
                "unavailable"
            };
            format!(
                "Runtime: {}\nStatus:  {}\nDetail:  {}",
                check.runtime, status, check.detail
            )
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
