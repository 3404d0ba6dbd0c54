use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use metsynth_core::{
    Dataset, RelationshipGraph, Row, SemanticType, Table, TableMetadata, Value, key_of,
};

use crate::errors::GenerationError;
use crate::model::SampleOptions;
use crate::synthesizer::Synthesizer;

/// Seeded bootstrap synthesizer.
///
/// Each table is drawn on its own: identifier columns come from one source row
/// picked at random, every other column is drawn independently from that
/// column's observed values. Primary keys are reissued as `<table>_<n>` and
/// identifier values are rewritten to the reissued key of the source row they
/// named. A reference whose source row was not drawn keeps its original value,
/// so the output may contain dangling references.
#[derive(Debug, Default)]
pub struct ResamplingSynthesizer {
    fitted: Option<FittedModel>,
}

#[derive(Debug)]
struct FittedModel {
    data: Dataset,
    graph: RelationshipGraph,
    order: Vec<String>,
}

/// Source key -> first reissued key, per table.
type KeyMaps = HashMap<String, HashMap<String, String>>;

impl ResamplingSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Synthesizer for ResamplingSynthesizer {
    fn fit(&mut self, data: &Dataset, graph: &RelationshipGraph) -> Result<(), GenerationError> {
        let order = graph.generation_order()?;

        for name in &order {
            let table = data.table(name).ok_or_else(|| {
                GenerationError::InvalidInput(format!("table '{name}' missing from training data"))
            })?;
            if table.is_empty() {
                return Err(GenerationError::InvalidInput(format!(
                    "table '{name}' has no rows to fit"
                )));
            }
            if graph.table(name).is_none() {
                return Err(GenerationError::InvalidInput(format!(
                    "table '{name}' missing from relationship graph"
                )));
            }
        }

        info!(tables = order.len(), "synthesizer fitted");
        self.fitted = Some(FittedModel {
            data: data.clone(),
            graph: graph.clone(),
            order,
        });
        Ok(())
    }

    fn sample(&self, options: &SampleOptions) -> Result<Dataset, GenerationError> {
        let fitted = self.fitted.as_ref().ok_or(GenerationError::NotFitted)?;

        let mut tables = Vec::with_capacity(fitted.order.len());
        let mut key_maps = KeyMaps::new();

        for name in &fitted.order {
            let (Some(source), Some(meta)) = (fitted.data.table(name), fitted.graph.table(name))
            else {
                return Err(GenerationError::InvalidInput(format!(
                    "table '{name}' is not part of the fitted model"
                )));
            };

            let rows = options.rows_for(name);
            let mut rng = ChaCha8Rng::seed_from_u64(hash_seed(options.seed, name));
            let (table, key_map) = draw_table(source, meta, rows, &mut rng);
            debug!(table = %name, rows, distinct_sources = key_map.len(), "sampled table");

            key_maps.insert(name.clone(), key_map);
            tables.push(table);
        }

        for table in &mut tables {
            rewrite_references(table, &fitted.graph, &key_maps);
        }

        // Keep the training dataset's table order in the output.
        let mut sampled = Dataset::new();
        for source in fitted.data.tables() {
            if let Some(idx) = tables.iter().position(|table| table.name == source.name) {
                sampled.insert(tables.swap_remove(idx));
            }
        }

        info!(tables = sampled.tables().len(), seed = options.seed, "sampled synthetic tables");
        Ok(sampled)
    }
}

fn draw_table(
    source: &Table,
    meta: &TableMetadata,
    rows: u64,
    rng: &mut ChaCha8Rng,
) -> (Table, HashMap<String, String>) {
    let mut key_map = HashMap::new();
    let mut table = Table::new(source.name.clone(), source.columns.clone());
    let source_len = source.rows.len();

    for index in 0..rows {
        let anchor = &source.rows[rng.random_range(0..source_len)];
        let mut row = Row::new();

        for column in &source.columns {
            let value = if *column == meta.primary_key {
                let key = synthetic_key(&source.name, index);
                if let Some(source_key) = key_of(anchor, column) {
                    key_map.entry(source_key).or_insert_with(|| key.clone());
                }
                Value::Text(key)
            } else if meta.columns.get(column) == Some(&SemanticType::Id) {
                anchor.get(column).cloned().unwrap_or(Value::Null)
            } else {
                let donor = &source.rows[rng.random_range(0..source_len)];
                donor.get(column).cloned().unwrap_or(Value::Null)
            };
            row.insert(column.clone(), value);
        }

        table.rows.push(row);
    }

    (table, key_map)
}

fn rewrite_references(table: &mut Table, graph: &RelationshipGraph, key_maps: &KeyMaps) {
    let Some(meta) = graph.table(&table.name) else {
        return;
    };

    let targets: Vec<(String, &HashMap<String, String>)> = meta
        .columns
        .iter()
        .filter(|(column, tag)| **tag == SemanticType::Id && **column != meta.primary_key)
        .filter_map(|(column, _)| {
            let target = reference_target(graph, &table.name, column);
            key_maps.get(&target).map(|map| (column.clone(), map))
        })
        .collect();

    for row in &mut table.rows {
        for (column, map) in &targets {
            let Some(source_key) = key_of(row, column) else {
                continue;
            };
            if let Some(reissued) = map.get(&source_key) {
                row.insert(column.clone(), Value::Text(reissued.clone()));
            }
        }
    }
}

/// Table whose keys an identifier column refers to.
///
/// Declared edges win; otherwise a column named like another table's primary
/// key refers to that table, and anything else refers to its own table.
fn reference_target(graph: &RelationshipGraph, table: &str, column: &str) -> String {
    if let Some(rel) = graph.relationship_for(table, column) {
        return rel.parent_table.clone();
    }
    graph
        .tables
        .iter()
        .find(|candidate| candidate.name != table && candidate.primary_key == column)
        .map(|candidate| candidate.name.clone())
        .unwrap_or_else(|| table.to_string())
}

fn synthetic_key(table: &str, index: u64) -> String {
    format!("{}_{:05}", table.to_lowercase(), index + 1)
}

fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use metsynth_core::{
        DMD_ID, DMDSEC, FILE, FILE_ID, PARENT_ID, STRUCT_ID, STRUCTMAP, build_relationship_graph,
    };

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    fn text(value: &str) -> Value {
        Value::Text(value.to_string())
    }

    fn package() -> Dataset {
        Dataset::from_tables(vec![
            Table::from_rows(
                DMDSEC,
                vec![
                    row(&[(DMD_ID, text("D1")), ("dc_title", text("One"))]),
                    row(&[(DMD_ID, text("D2")), ("dc_title", text("Two"))]),
                ],
            ),
            Table::from_rows(
                FILE,
                vec![
                    row(&[(FILE_ID, text("F1")), (DMD_ID, text("D1")), ("size", Value::Int(10))]),
                    row(&[(FILE_ID, text("F2")), (DMD_ID, text("D2")), ("size", Value::Int(20))]),
                ],
            ),
            Table::from_rows(
                STRUCTMAP,
                vec![
                    row(&[
                        (STRUCT_ID, text("S1")),
                        (DMD_ID, text("D1")),
                        (PARENT_ID, Value::Null),
                        (FILE_ID, text("F1")),
                    ]),
                    row(&[
                        (STRUCT_ID, text("S2")),
                        (DMD_ID, text("D2")),
                        (PARENT_ID, text("S1")),
                        (FILE_ID, text("F2")),
                    ]),
                ],
            ),
        ])
    }

    fn fitted() -> ResamplingSynthesizer {
        let data = package();
        let graph = build_relationship_graph(&data).expect("graph");
        let mut synthesizer = ResamplingSynthesizer::new();
        synthesizer.fit(&data, &graph).expect("fit");
        synthesizer
    }

    #[test]
    fn sampling_before_fit_fails() {
        let synthesizer = ResamplingSynthesizer::new();
        let err = synthesizer.sample(&SampleOptions::default()).unwrap_err();
        assert!(matches!(err, GenerationError::NotFitted));
    }

    #[test]
    fn fit_rejects_empty_table() {
        let mut data = package();
        let graph = build_relationship_graph(&data).expect("graph");
        data.insert(Table::new(FILE, vec![FILE_ID.to_string(), DMD_ID.to_string()]));

        let err = ResamplingSynthesizer::new().fit(&data, &graph).unwrap_err();
        assert!(err.to_string().contains("'file' has no rows"));
    }

    #[test]
    fn respects_row_counts_and_reissues_keys() {
        let mut options = SampleOptions::default();
        options.num_rows.insert(FILE.to_string(), 7);
        options.default_rows = 3;

        let sampled = fitted().sample(&options).expect("sample");

        let files = sampled.table(FILE).unwrap();
        assert_eq!(files.len(), 7);
        assert_eq!(sampled.table(DMDSEC).unwrap().len(), 3);
        assert_eq!(key_of(&files.rows[0], FILE_ID).as_deref(), Some("file_00001"));
        assert_eq!(files.key_set(FILE_ID).len(), 7);

        let names: Vec<&str> = sampled.tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![DMDSEC, FILE, STRUCTMAP]);
    }

    #[test]
    fn same_seed_reproduces_output() {
        let synthesizer = fitted();
        let options = SampleOptions {
            seed: 7,
            ..SampleOptions::default()
        };

        let first = synthesizer.sample(&options).expect("sample");
        let second = synthesizer.sample(&options).expect("sample");
        assert_eq!(first, second);
    }

    #[test]
    fn references_point_at_reissued_keys_when_drawn() {
        let options = SampleOptions {
            seed: 11,
            num_rows: Default::default(),
            default_rows: 50,
        };
        let sampled = fitted().sample(&options).expect("sample");

        // With fifty draws over two source rows both parents are drawn.
        let dmd_keys = sampled.table(DMDSEC).unwrap().key_set(DMD_ID);
        let struct_keys = sampled.table(STRUCTMAP).unwrap().key_set(STRUCT_ID);
        let file_keys = sampled.table(FILE).unwrap().key_set(FILE_ID);

        for row in &sampled.table(STRUCTMAP).unwrap().rows {
            assert!(dmd_keys.contains(&key_of(row, DMD_ID).unwrap()));
            assert!(file_keys.contains(&key_of(row, FILE_ID).unwrap()));
            if let Some(parent) = key_of(row, PARENT_ID) {
                assert!(struct_keys.contains(&parent), "parent {parent} not reissued");
            }
        }
    }

    #[test]
    fn undrawn_references_keep_source_value() {
        let options = SampleOptions {
            seed: 3,
            num_rows: [(DMDSEC.to_string(), 0)].into_iter().collect(),
            default_rows: 4,
        };
        let sampled = fitted().sample(&options).expect("sample");

        for row in &sampled.table(FILE).unwrap().rows {
            let dmd = key_of(row, DMD_ID).unwrap();
            assert!(dmd == "D1" || dmd == "D2");
        }
    }
}
