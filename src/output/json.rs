//! JSON output formatting

use crate::output::Report;
use serde_json::{json, Value};

pub fn format_json(report: &Report) -> String {
    let data: Value = match report {
        Report::Demo(demo) => serde_json::to_value(demo).unwrap_or(json!(null)),
        Report::Check(check) => serde_json::to_value(check).unwrap_or(json!(null)),
    };

    serde_json::to_string_pretty(&data).unwrap_or_else(|_| "{}".to_string())
}
