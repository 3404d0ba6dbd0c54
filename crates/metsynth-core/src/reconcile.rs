use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::graph::RelationshipGraph;
use crate::table::{Dataset, key_of};

/// Row counts for one reconciled table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReconcileReport {
    pub table: String,
    pub rows_before: u64,
    pub rows_after: u64,
    pub rows_dropped: u64,
}

/// Drop counts produced by a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub tables: Vec<TableReconcileReport>,
}

impl ReconcileReport {
    pub fn dropped(&self, table: &str) -> u64 {
        self.tables
            .iter()
            .find(|report| report.table == table)
            .map(|report| report.rows_dropped)
            .unwrap_or(0)
    }

    pub fn total_dropped(&self) -> u64 {
        self.tables.iter().map(|report| report.rows_dropped).sum()
    }
}

/// Remove rows whose declared foreign key does not resolve in the referenced table.
///
/// Edges are applied parents first, so rows dropped from a parent take their
/// children with them in the same pass. Null keys never resolve. Row order is
/// preserved and nothing is repaired.
pub fn reconcile(
    mut dataset: Dataset,
    graph: &RelationshipGraph,
) -> Result<(Dataset, ReconcileReport)> {
    let before: Vec<(String, usize)> = dataset
        .tables()
        .iter()
        .map(|table| (table.name.clone(), table.len()))
        .collect();

    for parent_name in graph.generation_order()? {
        for rel in graph
            .relationships
            .iter()
            .filter(|rel| rel.parent_table == parent_name)
        {
            let Some(parent) = dataset.table(&rel.parent_table) else {
                warn!(
                    parent = %rel.parent_table,
                    child = %rel.child_table,
                    "referenced table missing, skipping relationship"
                );
                continue;
            };
            let keys = parent.key_set(&rel.parent_primary_key);

            let Some(child) = dataset.table_mut(&rel.child_table) else {
                continue;
            };
            child.rows.retain(|row| {
                key_of(row, &rel.child_foreign_key).is_some_and(|key| keys.contains(&key))
            });
        }
    }

    let mut report = ReconcileReport::default();
    for (name, rows_before) in before {
        let rows_after = dataset.table(&name).map(|table| table.len()).unwrap_or(0);
        let rows_dropped = rows_before.saturating_sub(rows_after) as u64;
        if rows_dropped > 0 {
            info!(
                table = %name,
                rows_dropped,
                "dropped rows with unresolved references"
            );
        }
        report.tables.push(TableReconcileReport {
            table: name,
            rows_before: rows_before as u64,
            rows_after: rows_after as u64,
            rows_dropped,
        });
    }

    Ok((dataset, report))
}
