use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::table::{
    DMD_ID, DMDSEC, Dataset, FILE, FILE_ID, PACKAGE_TABLES, PARENT_ID, STRUCT_ID, STRUCTMAP,
    Table, key_of,
};

/// Primary key column of a package table.
pub fn primary_key_column(table: &str) -> Option<&'static str> {
    match table {
        DMDSEC => Some(DMD_ID),
        FILE => Some(FILE_ID),
        STRUCTMAP => Some(STRUCT_ID),
        _ => None,
    }
}

/// Columns a package table must carry, primary key first.
pub fn required_columns(table: &str) -> &'static [&'static str] {
    match table {
        DMDSEC => &[DMD_ID],
        FILE => &[FILE_ID, DMD_ID],
        STRUCTMAP => &[STRUCT_ID, DMD_ID, PARENT_ID],
        _ => &[],
    }
}

/// Validate the structure of one loaded table.
///
/// This checks:
/// - the table has at least one row
/// - required key and foreign key columns exist
/// - primary key values are present and unique
pub fn validate_table(table: &Table) -> Result<()> {
    if table.is_empty() {
        return Err(Error::StructuralValidation(format!(
            "{} data is empty",
            table.name
        )));
    }

    let missing: Vec<&str> = required_columns(&table.name)
        .iter()
        .copied()
        .filter(|column| !table.has_column(column))
        .collect();
    if !missing.is_empty() {
        return Err(Error::StructuralValidation(format!(
            "{} missing required columns: {}",
            table.name,
            missing.join(", ")
        )));
    }

    if let Some(pk) = primary_key_column(&table.name) {
        let mut seen = BTreeSet::new();
        for (idx, row) in table.rows.iter().enumerate() {
            let key = key_of(row, pk).ok_or_else(|| {
                Error::StructuralValidation(format!(
                    "null primary key: {}.{} at row {idx}",
                    table.name, pk
                ))
            })?;
            if !seen.insert(key.clone()) {
                return Err(Error::StructuralValidation(format!(
                    "duplicate primary key: {}.{} = {key}",
                    table.name, pk
                )));
            }
        }
    }

    Ok(())
}

/// Validate that all three package tables are present and well formed.
pub fn validate_dataset(dataset: &Dataset) -> Result<()> {
    for name in PACKAGE_TABLES {
        let table = dataset
            .table(name)
            .ok_or_else(|| Error::StructuralValidation(format!("missing table: {name}")))?;
        validate_table(table)?;
    }
    Ok(())
}
