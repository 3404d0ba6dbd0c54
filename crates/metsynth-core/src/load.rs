use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::table::{DMDSEC, Dataset, FILE, Row, STRUCTMAP, Table, Value};
use crate::validation::validate_table;

/// Locations of the three source tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputPaths {
    pub dmdsec_path: PathBuf,
    pub file_path: PathBuf,
    pub structmap_path: PathBuf,
}

/// Load and structurally validate the three package tables.
pub fn load_dataset(paths: &InputPaths) -> Result<Dataset> {
    let dmdsec = load_table(&paths.dmdsec_path, DMDSEC)?;
    let file = load_table(&paths.file_path, FILE)?;
    let structmap = load_table(&paths.structmap_path, STRUCTMAP)?;

    info!(
        dmdsec_rows = dmdsec.len(),
        file_rows = file.len(),
        structmap_rows = structmap.len(),
        "loaded input tables"
    );

    Ok(Dataset::from_tables(vec![dmdsec, file, structmap]))
}

/// Load one table, choosing the format from the file extension (`.csv` or JSON).
pub fn load_table(path: &Path, name: &str) -> Result<Table> {
    debug!(table = name, path = %path.display(), "loading table");

    if !path.exists() {
        return Err(Error::Load(format!("file not found: {}", path.display())));
    }

    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let parsed = if is_csv {
        let file = fs::File::open(path)
            .map_err(|err| Error::Load(format!("cannot open {}: {err}", path.display())))?;
        parse_csv_table(name, file)
    } else {
        let contents = fs::read_to_string(path)
            .map_err(|err| Error::Load(format!("cannot read {}: {err}", path.display())))?;
        parse_json_table(name, &contents)
    };
    let table = parsed.map_err(|err| match err {
        Error::Load(message) => Error::Load(format!("{}: {message}", path.display())),
        other => other,
    })?;

    validate_table(&table)?;
    debug!(
        table = name,
        rows = table.len(),
        columns = table.columns.len(),
        "validated table structure"
    );
    Ok(table)
}

/// Parse a JSON array of records into a table.
///
/// Columns follow the order keys first appear across the records.
pub fn parse_json_table(name: &str, contents: &str) -> Result<Table> {
    let value: serde_json::Value = serde_json::from_str(contents)
        .map_err(|err| Error::Load(format!("invalid JSON for {name}: {err}")))?;
    let records = value
        .as_array()
        .ok_or_else(|| Error::Load(format!("{name} must be a JSON array of records")))?;

    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        let object = record.as_object().ok_or_else(|| {
            Error::Load(format!("{name} record {idx} is not a JSON object"))
        })?;
        let mut row = Row::new();
        for (column, value) in object {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
            row.insert(column.clone(), Value::from_json(value));
        }
        rows.push(row);
    }

    let mut table = Table::new(name, columns);
    table.rows = rows;
    Ok(table)
}

/// Parse CSV with a header row into a table.
///
/// Identifier columns (`*_id`) stay textual so that keys such as `007` survive.
pub fn parse_csv_table<R: Read>(name: &str, input: R) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|err| Error::Load(format!("invalid CSV header for {name}: {err}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut table = Table::new(name, columns);
    for record in reader.records() {
        let record =
            record.map_err(|err| Error::Load(format!("invalid CSV record for {name}: {err}")))?;
        let row: Row = table
            .columns
            .iter()
            .zip(record.iter())
            .map(|(column, cell)| {
                let value = if column.ends_with("_id") && !cell.is_empty() {
                    Value::Text(cell.to_string())
                } else {
                    Value::parse_cell(cell)
                };
                (column.clone(), value)
            })
            .collect();
        table.rows.push(row);
    }

    Ok(table)
}
