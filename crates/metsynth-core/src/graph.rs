use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use schemars::schema::RootSchema;
use schemars::schema_for;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::table::{DMD_ID, DMDSEC, Dataset, FILE, PACKAGE_TABLES, STRUCTMAP, Table};
use crate::validation::primary_key_column;

/// Semantic tag attached to every column handed to the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Id,
    Datetime,
    Numerical,
    Categorical,
}

/// Per-table metadata: primary key and column tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableMetadata {
    pub name: String,
    pub primary_key: String,
    pub columns: BTreeMap<String, SemanticType>,
}

/// Declared parent -> child foreign key edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Relationship {
    pub parent_table: String,
    pub parent_primary_key: String,
    pub child_table: String,
    pub child_foreign_key: String,
}

/// Relationship graph consumed by the generative model.
///
/// The `structMap.parent_id -> structMap.struct_id` self-reference is never
/// declared here; it travels as an ordinary identifier column and the tree is
/// rebuilt after generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RelationshipGraph {
    pub tables: Vec<TableMetadata>,
    pub relationships: Vec<Relationship>,
}

impl RelationshipGraph {
    pub fn table(&self, name: &str) -> Option<&TableMetadata> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// Declared edge for a child column, if any.
    pub fn relationship_for(&self, child_table: &str, column: &str) -> Option<&Relationship> {
        self.relationships
            .iter()
            .find(|rel| rel.child_table == child_table && rel.child_foreign_key == column)
    }

    /// Tables ordered parents first.
    pub fn generation_order(&self) -> Result<Vec<String>> {
        let graph = build_adjacency(self);
        toposort(&graph).map_err(|cycle| {
            Error::SchemaModeling(format!(
                "relationship graph contains a cycle through: {}",
                cycle.join(", ")
            ))
        })
    }
}

const DECLARED_EDGES: [(&str, &str, &str, &str); 2] = [
    (DMDSEC, DMD_ID, FILE, DMD_ID),
    (DMDSEC, DMD_ID, STRUCTMAP, DMD_ID),
];

/// Build and validate the relationship graph for the three package tables.
pub fn build_relationship_graph(dataset: &Dataset) -> Result<RelationshipGraph> {
    let mut tables = Vec::with_capacity(PACKAGE_TABLES.len());

    for name in PACKAGE_TABLES {
        let table = dataset
            .table(name)
            .ok_or_else(|| Error::SchemaModeling(format!("missing table: {name}")))?;
        let primary_key = primary_key_column(name).ok_or_else(|| {
            Error::SchemaModeling(format!("no primary key defined for table: {name}"))
        })?;
        if !table.has_column(primary_key) {
            return Err(Error::SchemaModeling(format!(
                "primary key column not found: {name}.{primary_key}"
            )));
        }

        let columns = table
            .columns
            .iter()
            .map(|column| (column.clone(), classify_column(table, column)))
            .collect();

        debug!(table = name, rows = table.len(), "modeled table");
        tables.push(TableMetadata {
            name: name.to_string(),
            primary_key: primary_key.to_string(),
            columns,
        });
    }

    let relationships = DECLARED_EDGES
        .iter()
        .map(
            |(parent_table, parent_primary_key, child_table, child_foreign_key)| Relationship {
                parent_table: parent_table.to_string(),
                parent_primary_key: parent_primary_key.to_string(),
                child_table: child_table.to_string(),
                child_foreign_key: child_foreign_key.to_string(),
            },
        )
        .collect();

    let graph = RelationshipGraph {
        tables,
        relationships,
    };
    validate_graph(&graph)?;

    info!(
        tables = graph.tables.len(),
        relationships = graph.relationships.len(),
        "relationship graph built"
    );
    Ok(graph)
}

/// Tag a column: `*_id` is an identifier, a name containing `date` is temporal,
/// all-numeric values are numerical, anything else is categorical.
pub fn classify_column(table: &Table, column: &str) -> SemanticType {
    if column.ends_with("_id") {
        return SemanticType::Id;
    }
    if column.to_lowercase().contains("date") {
        return SemanticType::Datetime;
    }

    let mut values = table
        .rows
        .iter()
        .filter_map(|row| row.get(column))
        .filter(|value| !value.is_null())
        .peekable();
    if values.peek().is_some() && values.all(|value| value.is_numeric()) {
        SemanticType::Numerical
    } else {
        SemanticType::Categorical
    }
}

/// Validate internal consistency of a relationship graph.
///
/// This checks:
/// - duplicate tables
/// - primary key columns exist
/// - edge tables and columns exist, and no edge is a self-reference
/// - the declared edges are acyclic
pub fn validate_graph(graph: &RelationshipGraph) -> Result<()> {
    let mut names = BTreeSet::new();
    for table in &graph.tables {
        if !names.insert(table.name.as_str()) {
            return Err(Error::SchemaModeling(format!(
                "duplicate table name: {}",
                table.name
            )));
        }
        if !table.columns.contains_key(&table.primary_key) {
            return Err(Error::SchemaModeling(format!(
                "primary key column not found: {}.{}",
                table.name, table.primary_key
            )));
        }
    }

    for rel in &graph.relationships {
        if rel.parent_table == rel.child_table {
            return Err(Error::SchemaModeling(format!(
                "self-referencing relationship cannot be declared: {}.{}",
                rel.child_table, rel.child_foreign_key
            )));
        }

        let parent = graph.table(&rel.parent_table).ok_or_else(|| {
            Error::SchemaModeling(format!("referenced table not found: {}", rel.parent_table))
        })?;
        if !parent.columns.contains_key(&rel.parent_primary_key) {
            return Err(Error::SchemaModeling(format!(
                "referenced column not found: {}.{}",
                rel.parent_table, rel.parent_primary_key
            )));
        }

        let child = graph.table(&rel.child_table).ok_or_else(|| {
            Error::SchemaModeling(format!("child table not found: {}", rel.child_table))
        })?;
        if !child.columns.contains_key(&rel.child_foreign_key) {
            return Err(Error::SchemaModeling(format!(
                "foreign key column not found: {}.{}",
                rel.child_table, rel.child_foreign_key
            )));
        }
    }

    graph.generation_order().map(|_| ())
}

/// Emit the JSON Schema for persisted relationship graphs.
pub fn graph_json_schema() -> RootSchema {
    schema_for!(RelationshipGraph)
}

fn build_adjacency(graph: &RelationshipGraph) -> BTreeMap<String, BTreeSet<String>> {
    let mut adjacency: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for table in &graph.tables {
        adjacency.entry(table.name.clone()).or_default();
    }
    for rel in &graph.relationships {
        adjacency.entry(rel.child_table.clone()).or_default();
        adjacency
            .entry(rel.parent_table.clone())
            .or_default()
            .insert(rel.child_table.clone());
    }

    adjacency
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> std::result::Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<String, usize> = graph.keys().map(|node| (node.clone(), 0)).collect();

    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.clone()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<String> = indegree
        .iter()
        .filter_map(|(node, count)| (*count == 0).then(|| node.clone()))
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.clone());

        if let Some(targets) = graph.get(&node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(target.clone());
                    }
                }
            }
        }
    }

    if order.len() == graph.len() {
        Ok(order)
    } else {
        let cycle_nodes: Vec<String> = indegree
            .into_iter()
            .filter_map(|(node, count)| (count > 0).then_some(node))
            .collect();
        Err(cycle_nodes)
    }
}
