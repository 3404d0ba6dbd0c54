use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::document::{Element, nesting_depth, parse_document, to_json};
use crate::errors::ValidationReportError;

/// Violation details kept per failing schema.
const MAX_DETAILS: usize = 5;

/// Deepest element nesting the schema checks accept.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Result of validating one document against every loaded schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub violations: Vec<String>,
}

struct NamedSchema {
    name: String,
    compiled: JSONSchema,
}

/// Validates package documents against named JSON Schemas.
///
/// Schemas are compiled once when the validator is built.
pub struct DocumentValidator {
    schemas: Vec<NamedSchema>,
}

impl fmt::Debug for DocumentValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentValidator")
            .field("schemas", &self.schema_names())
            .finish()
    }
}

impl DocumentValidator {
    /// Read and compile every schema file, keyed by schema name.
    pub fn load(paths: &BTreeMap<String, PathBuf>) -> Result<Self, ValidationReportError> {
        let mut schemas = Vec::with_capacity(paths.len());
        for (name, path) in paths {
            let schema_load = |message: String| ValidationReportError::SchemaLoad {
                name: name.clone(),
                path: path.display().to_string(),
                message,
            };
            let contents = fs::read_to_string(path).map_err(|err| schema_load(err.to_string()))?;
            let schema: Value =
                serde_json::from_str(&contents).map_err(|err| schema_load(err.to_string()))?;
            schemas.push((name.clone(), schema));
        }
        Self::from_schemas(schemas)
    }

    pub fn from_schemas(
        schemas: Vec<(String, Value)>,
    ) -> Result<Self, ValidationReportError> {
        if schemas.is_empty() {
            return Err(ValidationReportError::NoSchemas);
        }

        let mut compiled_schemas = Vec::with_capacity(schemas.len());
        for (name, schema) in schemas {
            let compiled =
                JSONSchema::compile(&schema).map_err(|err| ValidationReportError::SchemaLoad {
                    name: name.clone(),
                    path: "<inline>".to_string(),
                    message: err.to_string(),
                })?;
            compiled_schemas.push(NamedSchema { name, compiled });
        }

        info!(schemas = compiled_schemas.len(), "validation schemas compiled");
        Ok(Self {
            schemas: compiled_schemas,
        })
    }

    pub fn schema_names(&self) -> Vec<&str> {
        self.schemas.iter().map(|schema| schema.name.as_str()).collect()
    }

    /// Check `root` against every schema, continuing past failures.
    ///
    /// Documents nested deeper than [`MAX_NESTING_DEPTH`] are not projected and
    /// yield a single violation instead.
    pub fn validate(&self, root: &Element) -> ValidationOutcome {
        let depth = nesting_depth(root);
        if depth > MAX_NESTING_DEPTH {
            let message = format!(
                "document nesting depth {depth} exceeds the validation limit of {MAX_NESTING_DEPTH}"
            );
            warn!(depth, "{message}");
            return ValidationOutcome {
                valid: false,
                violations: vec![message],
            };
        }

        let instance = to_json(root);
        let mut violations = Vec::new();

        for schema in &self.schemas {
            if let Err(errors) = schema.compiled.validate(&instance) {
                let details: Vec<String> = errors
                    .take(MAX_DETAILS)
                    .map(|error| {
                        format!(
                            "{}: {}",
                            normalized_json_pointer(&error.instance_path.to_string()),
                            error
                        )
                    })
                    .collect();
                let message = format!(
                    "validation against {} schema failed: {}",
                    schema.name,
                    details.join("; ")
                );
                warn!(schema = %schema.name, "{message}");
                violations.push(message);
            }
        }

        ValidationOutcome {
            valid: violations.is_empty(),
            violations,
        }
    }

    /// Parse then validate a serialized document.
    pub fn validate_str(&self, xml: &str) -> ValidationOutcome {
        match parse_document(xml) {
            Ok(root) => self.validate(&root),
            Err(err) => {
                let message = format!("document could not be parsed: {err}");
                warn!("{message}");
                ValidationOutcome {
                    valid: false,
                    violations: vec![message],
                }
            }
        }
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}
