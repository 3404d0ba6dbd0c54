use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::PipelineConfig;

use super::RegistryResult;
use super::atomic::{write_bytes_atomic, write_json_atomic};

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub config: PipelineConfig,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig<'a> {
    pub run_id: &'a str,
    pub started_at: String,
    pub config: &'a PipelineConfig,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub logs_path: PathBuf,
    pub graph_path: PathBuf,
    pub reconcile_path: PathBuf,
    pub document_path: PathBuf,
    pub validation_path: PathBuf,
}

impl RunPaths {
    pub fn new(root: PathBuf) -> Self {
        Self {
            config_path: root.join("config.json"),
            logs_path: root.join("logs.ndjson"),
            graph_path: root.join("graph.json"),
            reconcile_path: root.join("reconcile.json"),
            document_path: root.join("mets.xml"),
            validation_path: root.join("validation.json"),
            root,
        }
    }

    /// Write a JSON artifact into the run directory and optionally to `copy_to`.
    pub fn write_json<T: Serialize>(
        &self,
        path: &Path,
        value: &T,
        copy_to: Option<&Path>,
    ) -> RegistryResult<()> {
        write_json_atomic(path, value)?;
        if let Some(copy_to) = copy_to {
            write_json_atomic(copy_to, value)?;
        }
        Ok(())
    }

    /// Write the document into the run directory and optionally to `copy_to`.
    pub fn write_document(&self, xml: &str, copy_to: Option<&Path>) -> RegistryResult<()> {
        write_bytes_atomic(&self.document_path, xml.as_bytes())?;
        if let Some(copy_to) = copy_to {
            write_bytes_atomic(copy_to, xml.as_bytes())?;
        }
        Ok(())
    }
}

/// Create `<run_dir>/<timestamp>__run_<id>/` with its `config.json` and an empty log.
pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let run_root = ctx
        .config
        .output
        .run_dir
        .join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&run_root)?;
    let paths = RunPaths::new(run_root);

    let config = RunConfig {
        run_id: &ctx.run_id,
        started_at: ctx.started_at.to_rfc3339(),
        config: &ctx.config,
        git: collect_git_info(),
    };
    write_json_atomic(&paths.config_path, &config)?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.logs_path)?;

    Ok(paths)
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}
