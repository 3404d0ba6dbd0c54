use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Value};

use metsynth_core::Table;

use crate::errors::GenerationError;

/// Write a table as a pretty-printed JSON array of row objects, keys in column order.
///
/// Returns the number of bytes written.
pub fn write_table_json(path: &Path, table: &Table) -> Result<u64, GenerationError> {
    let records: Vec<Value> = table
        .rows
        .iter()
        .map(|row| {
            let record: Map<String, Value> = table
                .columns
                .iter()
                .filter_map(|column| {
                    let value = row.get(column)?;
                    Some((column.clone(), serde_json::to_value(value).ok()?))
                })
                .collect();
            Value::Object(record)
        })
        .collect();

    let mut bytes = serde_json::to_vec_pretty(&records)?;
    bytes.push(b'\n');

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(bytes.len() as u64)
}
