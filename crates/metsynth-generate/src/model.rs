use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use metsynth_core::Dataset;

/// Rows drawn per table when no count is configured.
pub const DEFAULT_ROWS: u64 = 100;

/// Options for one sampling call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleOptions {
    /// Seed for every random draw; a fixed seed reproduces the output exactly.
    pub seed: u64,
    /// Requested row count per table.
    #[serde(default)]
    pub num_rows: BTreeMap<String, u64>,
    /// Row count for tables absent from `num_rows`.
    pub default_rows: u64,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            num_rows: BTreeMap::new(),
            default_rows: DEFAULT_ROWS,
        }
    }
}

impl SampleOptions {
    pub fn rows_for(&self, table: &str) -> u64 {
        self.num_rows.get(table).copied().unwrap_or(self.default_rows)
    }
}

/// Summary of a sampled table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub rows_requested: u64,
    pub rows_generated: u64,
}

impl TableReport {
    /// Requested versus produced row counts for every sampled table.
    pub fn collect(options: &SampleOptions, dataset: &Dataset) -> Vec<TableReport> {
        dataset
            .tables()
            .iter()
            .map(|table| TableReport {
                table: table.name.clone(),
                rows_requested: options.rows_for(&table.name),
                rows_generated: table.len() as u64,
            })
            .collect()
    }
}
