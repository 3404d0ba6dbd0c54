use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use metsynth_core::{FILE, ReconcileReport, build_relationship_graph, load_dataset, reconcile};
use metsynth_generate::{GenerationError, Synthesizer, TableReport, write_snapshots};
use metsynth_mets::{
    DocumentError, DocumentValidator, ReassemblyError, ReassemblyReport, Reassembler,
    ValidationOutcome, ValidationReportError, to_xml_string,
};

use crate::config::PipelineConfig;
use crate::registry::{RegistryError, RunPaths};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] metsynth_core::Error),
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
    #[error("reassembly failed: {0}")]
    Reassembly(#[from] ReassemblyError),
    #[error("document serialization failed: {0}")]
    Document(#[from] DocumentError),
    #[error("validation setup failed: {0}")]
    Validation(#[from] ValidationReportError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// What one completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub rows_loaded: BTreeMap<String, usize>,
    pub source_reconcile: ReconcileReport,
    pub sampled: Vec<TableReport>,
    pub snapshots: Vec<PathBuf>,
    pub reconcile: ReconcileReport,
    pub reassembly: ReassemblyReport,
    pub validation: Option<ValidationOutcome>,
    pub document_path: PathBuf,
}

/// Load, model, generate, reconcile, reassemble and validate one package.
pub struct Pipeline<S: Synthesizer> {
    config: PipelineConfig,
    synthesizer: S,
}

impl<S: Synthesizer> Pipeline<S> {
    pub fn new(config: PipelineConfig, synthesizer: S) -> Self {
        Self {
            config,
            synthesizer,
        }
    }

    pub fn run(&mut self, paths: &RunPaths) -> Result<RunSummary, PipelineError> {
        // Schemas are compiled before any work so a bad schema fails fast.
        let validator = if self.config.validation.enabled {
            Some(DocumentValidator::load(&self.config.validation.schema_paths)?)
        } else {
            None
        };

        let source = load_dataset(&self.config.input)?;
        let rows_loaded = source.row_counts();
        info!(event = "tables_loaded", rows = ?rows_loaded);

        let graph = build_relationship_graph(&source)?;
        paths.write_json(&paths.graph_path, &graph, self.config.output.graph_path.as_deref())?;
        info!(
            event = "graph_built",
            tables = graph.tables.len(),
            relationships = graph.relationships.len(),
            path = %paths.graph_path.display()
        );

        let (source, source_reconcile) = reconcile(source, &graph)?;
        if source_reconcile.total_dropped() > 0 {
            warn!(
                dropped = source_reconcile.total_dropped(),
                "source rows with unresolved references excluded from training"
            );
        }

        self.synthesizer.fit(&source, &graph)?;
        info!(event = "model_fitted", seed = self.config.model.random_seed);

        let options = self.config.sample_options();
        let sampled = self.synthesizer.sample(&options)?;
        let sampled_report = TableReport::collect(&options, &sampled);
        info!(event = "tables_sampled", rows = ?sampled.row_counts());

        let snapshots = write_snapshots(&self.config.output.snapshot_paths, &sampled);

        let (reconciled, reconcile_report) = reconcile(sampled, &graph)?;
        paths.write_json(&paths.reconcile_path, &reconcile_report, None)?;
        info!(
            event = "tables_reconciled",
            dropped = reconcile_report.total_dropped(),
            rows = ?reconciled.row_counts()
        );

        let document = Reassembler::new(self.config.reassemble_options())
            .reassemble(&reconciled, source.table(FILE))?;
        let xml = to_xml_string(&document.root)?;
        paths.write_document(&xml, self.config.output.xml_output_path.as_deref())?;
        info!(
            event = "document_written",
            path = %paths.document_path.display(),
            bytes = xml.len(),
            divisions = document.report.divisions
        );

        let validation = validator.map(|validator| {
            let outcome = validator.validate_str(&xml);
            for violation in &outcome.violations {
                warn!(violation = %violation, "document does not conform");
            }
            info!(
                event = "validation_finished",
                valid = outcome.valid,
                violations = outcome.violations.len()
            );
            outcome
        });
        if let Some(outcome) = &validation {
            paths.write_json(&paths.validation_path, outcome, None)?;
        }

        Ok(RunSummary {
            rows_loaded,
            source_reconcile,
            sampled: sampled_report,
            snapshots,
            reconcile: reconcile_report,
            reassembly: document.report,
            validation,
            document_path: paths.document_path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use metsynth_core::InputPaths;
    use metsynth_generate::ResamplingSynthesizer;
    use metsynth_mets::{PackageOutline, parse_document};

    use super::*;
    use crate::config::{
        DocumentConfig, LoggingConfig, ModelConfig, OutputConfig, SamplingConfig,
        ValidationConfig,
    };

    fn repo_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
    }

    fn temp_run_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "metsynth_cli_{label}_{}",
            uuid::Uuid::new_v4()
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn sample_config(out: &Path) -> PipelineConfig {
        let data = repo_root().join("data/sample");
        let schemas = repo_root().join("schemas");
        PipelineConfig {
            input: InputPaths {
                dmdsec_path: data.join("dmdSec.json"),
                file_path: data.join("file.json"),
                structmap_path: data.join("structMap.json"),
            },
            output: OutputConfig {
                run_dir: out.join("runs"),
                xml_output_path: Some(out.join("export/mets.xml")),
                graph_path: None,
                snapshot_paths: BTreeMap::from([("file".to_string(), out.join("file.csv"))]),
            },
            model: ModelConfig { random_seed: 42 },
            sampling: SamplingConfig {
                num_rows: BTreeMap::new(),
                default_rows: 20,
            },
            validation: ValidationConfig {
                enabled: true,
                schema_paths: BTreeMap::from([
                    ("mets".to_string(), schemas.join("mets.schema.json")),
                    ("dc".to_string(), schemas.join("dc.schema.json")),
                ]),
            },
            logging: LoggingConfig::default(),
            document: DocumentConfig::default(),
        }
    }

    fn run_once(config: PipelineConfig, root: PathBuf) -> (RunSummary, RunPaths) {
        fs::create_dir_all(&root).expect("create run root");
        let paths = RunPaths::new(root);
        let summary = Pipeline::new(config, ResamplingSynthesizer::new())
            .run(&paths)
            .expect("pipeline run");
        (summary, paths)
    }

    #[test]
    fn run_writes_every_artifact() {
        let out = temp_run_dir("artifacts");
        let (summary, paths) = run_once(sample_config(&out), out.join("run"));

        for path in [
            &paths.graph_path,
            &paths.reconcile_path,
            &paths.document_path,
            &paths.validation_path,
        ] {
            assert!(path.exists(), "missing {}", path.display());
        }
        assert!(out.join("export/mets.xml").exists());
        assert_eq!(summary.snapshots, vec![out.join("file.csv")]);
        assert_eq!(summary.source_reconcile.dropped("file"), 1);

        let validation = summary.validation.expect("validation ran");
        assert!(validation.valid, "{:?}", validation.violations);

        let xml = fs::read_to_string(&paths.document_path).expect("read document");
        let outline = PackageOutline::from_document(&parse_document(&xml).unwrap()).unwrap();
        assert_eq!(outline.divisions.len() as u64, summary.reassembly.divisions);
    }

    #[test]
    fn fixed_seed_reproduces_document() {
        let out = temp_run_dir("determinism");
        let (_, first) = run_once(sample_config(&out), out.join("a"));
        let (_, second) = run_once(sample_config(&out), out.join("b"));

        assert_eq!(
            fs::read(&first.document_path).unwrap(),
            fs::read(&second.document_path).unwrap()
        );
    }

    #[test]
    fn missing_schema_fails_before_loading() {
        let out = temp_run_dir("bad_schema");
        let mut config = sample_config(&out);
        config
            .validation
            .schema_paths
            .insert("extra".to_string(), out.join("missing.schema.json"));

        let paths = RunPaths::new(out.join("run"));
        let err = Pipeline::new(config, ResamplingSynthesizer::new())
            .run(&paths)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(!paths.document_path.exists());
    }

    #[test]
    fn validation_can_be_disabled() {
        let out = temp_run_dir("no_validation");
        let mut config = sample_config(&out);
        config.validation = ValidationConfig {
            enabled: false,
            schema_paths: BTreeMap::new(),
        };

        let (summary, paths) = run_once(config, out.join("run"));
        assert!(summary.validation.is_none());
        assert!(!paths.validation_path.exists());
    }
}
