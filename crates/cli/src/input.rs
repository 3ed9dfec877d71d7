//! Reading snapshots and mappings from disk. Failures are reported and
//! end the process, like every other command error.

use std::path::Path;
use std::process;

use tagsync_analyze::IdMapping;
use tagsync_interchange::Snapshot;

use crate::{report_error, OutputFormat};

fn read_json(path: &Path, output: OutputFormat, quiet: bool) -> serde_json::Value {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error parsing JSON in '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn load_snapshot(path: &Path, output: OutputFormat, quiet: bool) -> Snapshot {
    let doc = read_json(path, output, quiet);
    match tagsync_interchange::from_workspace_json(&doc) {
        Ok(snapshot) => {
            tracing::debug!(
                path = %path.display(),
                entities = snapshot.len(),
                "loaded snapshot"
            );
            snapshot
        }
        Err(e) => {
            let msg = format!("invalid snapshot '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn load_mapping(path: &Path, output: OutputFormat, quiet: bool) -> IdMapping {
    let doc = read_json(path, output, quiet);
    match serde_json::from_value(doc) {
        Ok(mapping) => mapping,
        Err(e) => {
            let msg = format!("invalid id mapping '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// Print any serializable value as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
    println!("{}", json);
}
