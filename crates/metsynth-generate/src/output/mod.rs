//! Snapshot writers for sampled tables.

mod csv;
mod json;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use metsynth_core::{Dataset, Table};

use crate::errors::GenerationError;

pub use self::csv::write_table_csv;
pub use self::json::write_table_json;

/// Write one table to `path`, choosing the format from the extension.
///
/// Returns the number of bytes written.
pub fn write_snapshot(path: &Path, table: &Table) -> Result<u64, GenerationError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("csv") => Ok(write_table_csv(path, table)?),
        Some("json") => write_table_json(path, table),
        _ => Err(GenerationError::InvalidInput(format!(
            "unsupported snapshot format for {}",
            path.display()
        ))),
    }
}

/// Write every configured snapshot and return the paths that were written.
///
/// A failing snapshot is logged and skipped; the rest are still written.
pub fn write_snapshots(paths: &BTreeMap<String, PathBuf>, dataset: &Dataset) -> Vec<PathBuf> {
    let mut written = Vec::new();
    for (name, path) in paths {
        let Some(table) = dataset.table(name) else {
            warn!(table = %name, path = %path.display(), "snapshot requested for unknown table");
            continue;
        };
        match write_snapshot(path, table) {
            Ok(bytes) => {
                info!(
                    table = %name,
                    path = %path.display(),
                    rows = table.len(),
                    bytes,
                    "snapshot written"
                );
                written.push(path.clone());
            }
            Err(err) => {
                warn!(table = %name, path = %path.display(), error = %err, "snapshot write failed");
            }
        }
    }
    written
}
