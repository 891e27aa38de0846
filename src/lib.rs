//! readloom - Codebase Tree Enrichment
//!
//! Walks a project, then asks a completion provider to classify and
//! summarize every root file and every folder. Results are written as JSON
//! pass documents that README generation consumes.
//!
//! ## Core Features
//!
//! - **Recursive aggregation**: a node is enriched before its children, siblings run concurrently
//! - **Payload budgets**: every request is measured and truncated at string leaves before sending
//! - **Bounded retries**: fixed-delay retry on transient failures, one forced truncation on size rejections
//! - **Structural extraction**: Python sources are split into functions, classes and top-level code
//! - **Resume**: each pass persists its document; later runs reuse what is present
//!
//! ## Quick Start
//!
//! ```ignore
//! use readloom::ai::{ProviderConfig, UsageTracker, create_client};
//! use readloom::analyzer::ProjectWalker;
//! use readloom::enrich::{Orchestrator, RunContext, Workspace};
//!
//! let config = readloom::ConfigLoader::load(None)?;
//! let client = create_client(&ProviderConfig::from_llm_config(&config.llm))?;
//! let workspace = Workspace::create(&config.output.dir)?;
//! let usage = UsageTracker::shared(workspace.id());
//! let ctx = RunContext::new(&config, client, usage, &project_root)?;
//! let layout = ProjectWalker::new(&project_root).walk()?;
//! let outcome = Orchestrator::new(ctx, workspace).run(layout, false).await?;
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: completion client boundary, budgets, retry policy, usage
//! - [`analyzer`]: project walker, source reading, Python decomposition
//! - [`config`]: layered configuration
//! - [`enrich`]: aggregator, node tasks, passes and pass documents
//! - [`types`]: tree, results and errors

pub mod ai;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod constants;
pub mod enrich;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader};
pub use types::error::{CompletionError, EnrichError, Result};

pub use enrich::{Orchestrator, Pass, RunContext, RunOutcome, RunSummary, Workspace};

pub use ai::{CompletionClient, RetryPolicy, SharedClient, UsageTracker};
