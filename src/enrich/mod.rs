//! Enrichment Pipeline
//!
//! Four passes, each persisted to the run workspace:
//!
//! | Pass               | Input                 | Document                     |
//! |--------------------|-----------------------|------------------------------|
//! | `files`            | root files            | `info_files.json`            |
//! | `modules`          | folder tree           | `info_modules.json`          |
//! | `files-extended`   | `info_files.json`     | `info_files_extended.json`   |
//! | `modules-extended` | `info_modules.json`   | `info_modules_extended.json` |
//!
//! Resuming loads the documents already present instead of recomputing
//! them. A usage summary is written after the last pass.

pub mod aggregator;
pub mod checkpoint;
pub mod content;
pub mod files;
pub mod module;
pub mod structural;

pub use aggregator::{NodeScope, NodeTask, aggregate};
pub use checkpoint::Workspace;
pub use content::ContentTask;
pub use module::ModuleTask;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, instrument};

use crate::ai::{BudgetEstimator, RetryPolicy, SharedClient, SharedUsage, UsageSummary};
use crate::analyzer::{FileSupport, ProjectLayout};
use crate::config::{BudgetConfig, Config};
use crate::constants::documents;
use crate::types::{LeafFile, Result, TreeNode};

/// Everything a task needs, shared read-only by every concurrent branch
pub struct RunContext {
    pub client: SharedClient,
    pub policy: RetryPolicy,
    pub usage: SharedUsage,
    pub budget: BudgetConfig,
    pub support: FileSupport,
    pub max_files_per_node: usize,
    /// Folder paths in the tree are relative to this directory
    pub project_root: PathBuf,
}

impl RunContext {
    pub fn new(
        config: &Config,
        client: SharedClient,
        usage: SharedUsage,
        project_root: impl Into<PathBuf>,
    ) -> Result<Self> {
        let estimator = BudgetEstimator::new(config.budget.encoding)?;
        Ok(Self {
            client,
            policy: RetryPolicy::from_config(estimator, config),
            usage,
            budget: config.budget.clone(),
            support: FileSupport::from_config(&config.enrichment),
            max_files_per_node: config.enrichment.max_files_per_node,
            project_root: project_root.into(),
        })
    }
}

// =============================================================================
// Passes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pass {
    Files,
    Modules,
    FilesExtended,
    ModulesExtended,
}

impl Pass {
    pub const ALL: [Pass; 4] = [
        Self::Files,
        Self::Modules,
        Self::FilesExtended,
        Self::ModulesExtended,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Modules => "modules",
            Self::FilesExtended => "files-extended",
            Self::ModulesExtended => "modules-extended",
        }
    }

    pub fn document(&self) -> &'static str {
        match self {
            Self::Files => documents::FILES,
            Self::Modules => documents::MODULES,
            Self::FilesExtended => documents::FILES_EXTENDED,
            Self::ModulesExtended => documents::MODULES_EXTENDED,
        }
    }
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contents of `run_summary.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub workspace_id: String,
    pub project: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Passes loaded from existing documents
    pub resumed_passes: Vec<Pass>,
    pub root_files: usize,
    pub nodes: usize,
    pub usage: UsageSummary,
}

/// Documents produced by a full run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub files: Vec<LeafFile>,
    pub tree: TreeNode,
    pub summary: RunSummary,
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct Orchestrator {
    ctx: RunContext,
    workspace: Workspace,
}

impl Orchestrator {
    pub fn new(ctx: RunContext, workspace: Workspace) -> Self {
        Self { ctx, workspace }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn usage(&self) -> &SharedUsage {
        &self.ctx.usage
    }

    /// Run all passes; with `resume`, reuse documents already present
    #[instrument(skip(self, layout), fields(workspace = %self.workspace.id()))]
    pub async fn run(&self, layout: ProjectLayout, resume: bool) -> Result<RunOutcome> {
        let started_at = Utc::now();
        let mut resumed = Vec::new();

        let files = match self.resume_from(Pass::Files, resume, &mut resumed)? {
            Some(files) => files,
            None => self.files_pass(layout.root_files).await?,
        };

        let modules = match self.resume_from(Pass::Modules, resume, &mut resumed)? {
            Some(tree) => tree,
            None => self.modules_pass(layout.tree).await?,
        };

        let files = match self.resume_from(Pass::FilesExtended, resume, &mut resumed)? {
            Some(files) => files,
            None => self.files_extended_pass(files).await?,
        };

        let tree = match self.resume_from(Pass::ModulesExtended, resume, &mut resumed)? {
            Some(tree) => tree,
            None => self.modules_extended_pass(modules).await?,
        };

        let summary = RunSummary {
            workspace_id: self.workspace.id().to_string(),
            project: self.ctx.project_root.display().to_string(),
            started_at,
            finished_at: Utc::now(),
            resumed_passes: resumed,
            root_files: files.len(),
            nodes: tree.node_count(),
            usage: self.ctx.usage.summary(),
        };
        self.workspace.save(documents::RUN_SUMMARY, &summary)?;

        info!(
            calls = summary.usage.logical_calls,
            invocations = summary.usage.invocations,
            cost_usd = summary.usage.total_cost_usd,
            "Run complete"
        );

        Ok(RunOutcome {
            files,
            tree,
            summary,
        })
    }

    /// Run one pass from the walker output or its predecessor's document
    pub async fn run_pass(&self, pass: Pass, layout: ProjectLayout) -> Result<()> {
        match pass {
            Pass::Files => {
                self.files_pass(layout.root_files).await?;
            }
            Pass::Modules => {
                self.modules_pass(layout.tree).await?;
            }
            Pass::FilesExtended => {
                let files = self.workspace.require(documents::FILES, Pass::Files.as_str())?;
                self.files_extended_pass(files).await?;
            }
            Pass::ModulesExtended => {
                let tree = self
                    .workspace
                    .require(documents::MODULES, Pass::Modules.as_str())?;
                self.modules_extended_pass(tree).await?;
            }
        }
        Ok(())
    }

    fn resume_from<T: serde::de::DeserializeOwned>(
        &self,
        pass: Pass,
        resume: bool,
        resumed: &mut Vec<Pass>,
    ) -> Result<Option<T>> {
        if !resume {
            return Ok(None);
        }
        let loaded = self.workspace.load(pass.document())?;
        if loaded.is_some() {
            info!(%pass, "Resuming from existing document");
            resumed.push(pass);
        }
        Ok(loaded)
    }

    #[instrument(skip_all, fields(files = files.len()))]
    async fn files_pass(&self, mut files: Vec<LeafFile>) -> Result<Vec<LeafFile>> {
        info!("Pass files: classifying root files");
        files::classify_root_files(&self.ctx, &mut files).await?;
        self.workspace.save(Pass::Files.document(), &files)?;
        Ok(files)
    }

    #[instrument(skip_all, fields(nodes = tree.node_count()))]
    async fn modules_pass(&self, mut tree: TreeNode) -> Result<TreeNode> {
        info!("Pass modules: classifying folders");
        aggregate(&ModuleTask, &self.ctx, &mut tree).await?;
        self.workspace.save(Pass::Modules.document(), &tree)?;
        Ok(tree)
    }

    #[instrument(skip_all, fields(files = files.len()))]
    async fn files_extended_pass(&self, mut files: Vec<LeafFile>) -> Result<Vec<LeafFile>> {
        info!("Pass files-extended: summarizing root file contents");
        files::describe_root_files(&self.ctx, &mut files).await?;
        self.workspace.save(Pass::FilesExtended.document(), &files)?;
        Ok(files)
    }

    #[instrument(skip_all, fields(nodes = tree.node_count()))]
    async fn modules_extended_pass(&self, mut tree: TreeNode) -> Result<TreeNode> {
        info!("Pass modules-extended: summarizing folder contents");
        aggregate(&ContentTask, &self.ctx, &mut tree).await?;
        self.workspace.save(Pass::ModulesExtended.document(), &tree)?;
        Ok(tree)
    }
}

/// Context over a mock client with the character encoding and no retry delay
#[cfg(test)]
pub(crate) fn test_context(
    client: impl Into<std::sync::Arc<crate::ai::provider::mock::MockClient>>,
    project_root: &std::path::Path,
) -> RunContext {
    let mut config = Config::default();
    config.budget.encoding = crate::ai::UnitEncoding::Chars;
    config.retry.delay_ms = 0;
    let client: std::sync::Arc<crate::ai::provider::mock::MockClient> = client.into();
    RunContext::new(
        &config,
        client,
        crate::ai::UsageTracker::shared("test"),
        project_root,
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::mock::MockClient;
    use crate::ai::{FallbackCause, UsageTracker};
    use crate::analyzer::ProjectWalker;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// root: a.py, README.md; lib: b.py
    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("a.py"),
            "import os\n\ndef main():\n    print(os.getcwd())\n\nmain()\n",
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "# demo\n").unwrap();
        fs::create_dir_all(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/b.py"), "class B:\n    pass\n").unwrap();
        dir
    }

    fn orchestrator(client: Arc<MockClient>, project: &Path, out: &Path) -> Orchestrator {
        let ctx = test_context(client, project);
        Orchestrator::new(ctx, Workspace::create(out).unwrap())
    }

    #[tokio::test]
    async fn test_full_run_populates_every_node() {
        let project = project();
        let out = TempDir::new().unwrap();
        let client = Arc::new(MockClient::succeeding());
        let orchestrator = orchestrator(client.clone(), project.path(), out.path());
        let layout = ProjectWalker::new(project.path()).walk().unwrap();

        let outcome = orchestrator.run(layout, false).await.unwrap();

        // every file has both passes
        for leaf in &outcome.files {
            assert!(leaf.analysis.as_ref().unwrap().is_enriched());
            assert!(leaf.content.as_ref().unwrap().is_enriched());
        }
        // every folder has both passes
        for node in outcome.tree.nodes() {
            assert!(node.module_analysis.is_some());
            assert!(node.content_analysis.is_some());
        }
        let lib = &outcome.tree.subfolders["lib"];
        let content = lib.content_analysis.as_ref().unwrap().result().unwrap();
        assert!(content.files["b.py"].classes.is_some());
        assert_eq!(
            outcome.tree.content_analysis.as_ref().unwrap().status(),
            "not_applicable"
        );

        for pass in Pass::ALL {
            assert!(orchestrator.workspace().has(pass.document()));
        }
        let summary: RunSummary = orchestrator
            .workspace()
            .load(documents::RUN_SUMMARY)
            .unwrap()
            .unwrap();
        assert_eq!(summary.usage.invocations, client.calls() as u64);
        assert_eq!(summary.root_files, 2);
        assert_eq!(summary.nodes, 2);
        assert!(summary.resumed_passes.is_empty());
    }

    #[tokio::test]
    async fn test_transient_provider_still_yields_full_tree() {
        let project = project();
        let out = TempDir::new().unwrap();
        let client = Arc::new(MockClient::always_transient());
        let orchestrator = orchestrator(client, project.path(), out.path());
        let layout = ProjectWalker::new(project.path()).walk().unwrap();

        let outcome = orchestrator.run(layout, false).await.unwrap();

        for node in outcome.tree.nodes() {
            assert!(node.module_analysis.as_ref().unwrap().is_fallback());
            assert!(node.content_analysis.is_some());
        }
        assert!(outcome.summary.usage.fallbacks[&FallbackCause::Transient] > 0);
    }

    #[tokio::test]
    async fn test_resume_skips_existing_documents() {
        let project = project();
        let out = TempDir::new().unwrap();
        let first = Arc::new(MockClient::succeeding());
        let orchestrator = orchestrator(first, project.path(), out.path());
        let layout = ProjectWalker::new(project.path()).walk().unwrap();
        orchestrator.run(layout.clone(), false).await.unwrap();

        let second = Arc::new(MockClient::succeeding());
        let ctx = RunContext::new(
            &{
                let mut config = Config::default();
                config.budget.encoding = crate::ai::UnitEncoding::Chars;
                config
            },
            second.clone(),
            UsageTracker::shared("resume"),
            project.path(),
        )
        .unwrap();
        let workspace = Workspace::open(orchestrator.workspace().dir()).unwrap();
        let resumed = Orchestrator::new(ctx, workspace);

        let outcome = resumed.run(layout, true).await.unwrap();

        assert_eq!(second.calls(), 0);
        assert_eq!(outcome.summary.resumed_passes, Pass::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_single_pass_needs_predecessor() {
        let project = project();
        let out = TempDir::new().unwrap();
        let client = Arc::new(MockClient::succeeding());
        let orchestrator = orchestrator(client, project.path(), out.path());
        let layout = ProjectWalker::new(project.path()).walk().unwrap();

        assert!(
            orchestrator
                .run_pass(Pass::ModulesExtended, layout.clone())
                .await
                .is_err()
        );

        orchestrator.run_pass(Pass::Modules, layout.clone()).await.unwrap();
        orchestrator
            .run_pass(Pass::ModulesExtended, layout)
            .await
            .unwrap();
        assert!(orchestrator.workspace().has(documents::MODULES_EXTENDED));
    }
}
