use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use metsynth_core::InputPaths;
use metsynth_generate::{DEFAULT_ROWS, SampleOptions};
use metsynth_mets::ReassembleOptions;
use metsynth_mets::namespaces::DEFAULT_AGENT_NAME;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Pipeline configuration read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub input: InputPaths,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub document: DocumentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,
    /// Extra copy of the document outside the run directory.
    pub xml_output_path: Option<PathBuf>,
    /// Extra copy of the relationship graph outside the run directory.
    pub graph_path: Option<PathBuf>,
    /// Sampled tables to persist before reconciliation, by table name.
    #[serde(default)]
    pub snapshot_paths: BTreeMap<String, PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_dir: default_run_dir(),
            xml_output_path: None,
            graph_path: None,
            snapshot_paths: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    #[serde(default = "default_seed")]
    pub random_seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            random_seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplingConfig {
    #[serde(default)]
    pub num_rows: BTreeMap<String, u64>,
    #[serde(default = "default_rows")]
    pub default_rows: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            num_rows: BTreeMap::new(),
            default_rows: default_rows(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub schema_paths: BTreeMap<String, PathBuf>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schema_paths: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentConfig {
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            agent_name: default_agent_name(),
        }
    }
}

impl PipelineConfig {
    pub fn sample_options(&self) -> SampleOptions {
        SampleOptions {
            seed: self.model.random_seed,
            num_rows: self.sampling.num_rows.clone(),
            default_rows: self.sampling.default_rows,
        }
    }

    pub fn reassemble_options(&self) -> ReassembleOptions {
        ReassembleOptions {
            agent_name: self.document.agent_name.clone(),
        }
    }

    /// Make every relative path relative to `base`.
    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        resolve(&mut self.input.dmdsec_path);
        resolve(&mut self.input.file_path);
        resolve(&mut self.input.structmap_path);
        resolve(&mut self.output.run_dir);
        if let Some(path) = self.output.xml_output_path.as_mut() {
            resolve(path);
        }
        if let Some(path) = self.output.graph_path.as_mut() {
            resolve(path);
        }
        self.output.snapshot_paths.values_mut().for_each(resolve);
        self.validation.schema_paths.values_mut().for_each(resolve);
    }
}

/// Read `path` and resolve relative paths against its directory.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let display = path.display().to_string();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
    })?;
    let mut config = parse_config(&contents).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })?;

    if let Some(base) = path.parent().filter(|base| !base.as_os_str().is_empty()) {
        config.resolve_paths(base);
    }
    Ok(config)
}

pub fn parse_config(contents: &str) -> Result<PipelineConfig, toml::de::Error> {
    toml::from_str(contents)
}

fn default_run_dir() -> PathBuf {
    PathBuf::from("runs")
}

fn default_seed() -> u64 {
    42
}

fn default_rows() -> u64 {
    DEFAULT_ROWS
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

fn default_agent_name() -> String {
    DEFAULT_AGENT_NAME.to_string()
}
