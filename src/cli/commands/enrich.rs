//! Run and Pass Commands
//!
//! Usage:
//!   readloom run --input <dir> [--output-dir <dir>] [--resume <workspace>]
//!   readloom pass <name> --input <dir> --workspace <dir>

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::ai::{ProviderConfig, UsageTracker, create_client};
use crate::analyzer::ProjectWalker;
use crate::cli::Output;
use crate::config::{Config, ConfigLoader};
use crate::constants::documents;
use crate::enrich::{Orchestrator, Pass, RunContext, Workspace};
use crate::types::{EnrichError, Result};

/// Which workspace a command writes into
#[derive(Debug, Clone)]
pub enum WorkspaceTarget {
    /// New `<uuid>` directory under the given or configured output dir
    Fresh { output_dir: Option<PathBuf> },
    /// Existing workspace whose documents are reused
    Resume(PathBuf),
    /// Workspace for a single pass, created when missing
    Single(PathBuf),
}

/// Configuration and workspace, resolved before logging starts so the run
/// log can live inside the workspace
pub struct Prepared {
    pub config: Config,
    pub project_root: PathBuf,
    pub workspace: Workspace,
}

impl Prepared {
    pub fn log_dir(&self) -> PathBuf {
        self.workspace.log_dir()
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_dir().join(documents::LOG_FILE)
    }

    /// Run log, appended to so resumed runs keep earlier entries
    pub fn open_log(&self) -> Result<File> {
        Ok(OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_file())?)
    }

    fn orchestrator(&self) -> Result<Orchestrator> {
        let provider = ProviderConfig::from_llm_config(&self.config.llm);
        let client = create_client(&provider)?;
        let usage = UsageTracker::shared(self.workspace.id());
        let ctx = RunContext::new(&self.config, client, usage, &self.project_root)?;
        Ok(Orchestrator::new(ctx, self.workspace.clone()))
    }
}

pub fn prepare(explicit: Option<&Path>, input: &Path, target: WorkspaceTarget) -> Result<Prepared> {
    let config = ConfigLoader::load(explicit)?;

    if !input.is_dir() {
        return Err(EnrichError::Config(format!(
            "Input is not a directory: {}",
            input.display()
        )));
    }
    let project_root = input.canonicalize()?;

    let workspace = match target {
        WorkspaceTarget::Fresh { output_dir } => {
            let dir = output_dir.unwrap_or_else(|| config.output.dir.clone());
            Workspace::create(&dir)?
        }
        WorkspaceTarget::Resume(dir) => Workspace::open(&dir)?,
        WorkspaceTarget::Single(dir) => {
            fs::create_dir_all(&dir)?;
            Workspace::open(&dir)?
        }
    };
    fs::create_dir_all(workspace.log_dir())?;

    Ok(Prepared {
        config,
        project_root,
        workspace,
    })
}

/// Run every pass
pub async fn run(prepared: Prepared, exclude: &[String], resume: bool) -> Result<()> {
    let output = Output::new();
    let layout = ProjectWalker::new(&prepared.project_root)
        .with_exclude(exclude)?
        .walk()?;
    info!(
        project = %prepared.project_root.display(),
        root_files = layout.root_files.len(),
        nodes = layout.tree.node_count(),
        "Project walked"
    );

    let orchestrator = prepared.orchestrator()?;
    let outcome = orchestrator.run(layout, resume).await?;

    output.section("Enrichment complete");
    output.field("workspace", prepared.workspace.dir().display());
    for pass in Pass::ALL {
        let state = if outcome.summary.resumed_passes.contains(&pass) {
            "resumed"
        } else {
            "enriched"
        };
        output.field(pass.as_str(), format!("{} ({})", pass.document(), state));
    }
    output.field("root files", outcome.summary.root_files);
    output.field("folders", outcome.summary.nodes);
    output.usage(&outcome.summary.usage);
    output.success(&format!(
        "Summary written to {}",
        prepared.workspace.path(documents::RUN_SUMMARY).display()
    ));
    Ok(())
}

/// Run one pass against the workspace documents of its predecessors
pub async fn run_pass(prepared: Prepared, pass: Pass, exclude: &[String]) -> Result<()> {
    let output = Output::new();
    let layout = ProjectWalker::new(&prepared.project_root)
        .with_exclude(exclude)?
        .walk()?;

    let orchestrator = prepared.orchestrator()?;
    orchestrator.run_pass(pass, layout).await?;

    output.success(&format!("Pass {} complete", pass));
    output.document(&prepared.workspace.path(pass.document()));
    output.usage(&orchestrator.usage().summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_fresh_creates_workspace_and_log_dir() {
        let project = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();

        let prepared = prepare(
            None,
            project.path(),
            WorkspaceTarget::Fresh {
                output_dir: Some(out.path().to_path_buf()),
            },
        )
        .unwrap();

        assert!(prepared.workspace.dir().starts_with(out.path()));
        assert!(prepared.log_dir().is_dir());
        assert!(prepared.log_file().ends_with("logs/readloom.log"));
    }

    #[test]
    fn test_prepare_rejects_missing_input_and_workspace() {
        let out = TempDir::new().unwrap();
        let missing = out.path().join("nope");

        let err = prepare(
            None,
            &missing,
            WorkspaceTarget::Fresh {
                output_dir: Some(out.path().to_path_buf()),
            },
        );
        assert!(matches!(err, Err(EnrichError::Config(_))));

        let err = prepare(None, out.path(), WorkspaceTarget::Resume(missing));
        assert!(matches!(err, Err(EnrichError::Checkpoint { .. })));
    }

    #[test]
    fn test_log_survives_resume() {
        let project = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let first = prepare(
            None,
            project.path(),
            WorkspaceTarget::Fresh {
                output_dir: Some(out.path().to_path_buf()),
            },
        )
        .unwrap();
        writeln!(first.open_log().unwrap(), "first run").unwrap();

        let dir = first.workspace.dir().to_path_buf();
        let resumed = prepare(None, project.path(), WorkspaceTarget::Resume(dir)).unwrap();
        writeln!(resumed.open_log().unwrap(), "resumed run").unwrap();

        let log = fs::read_to_string(resumed.log_file()).unwrap();
        assert_eq!(log, "first run\nresumed run\n");
    }

    #[test]
    fn test_prepare_single_pass_creates_workspace() {
        let project = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let dir = out.path().join("ws");

        let prepared = prepare(None, project.path(), WorkspaceTarget::Single(dir.clone())).unwrap();
        assert_eq!(prepared.workspace.dir(), dir.as_path());
        assert_eq!(prepared.workspace.id(), "ws");
    }
}
