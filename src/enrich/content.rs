//! Node Enrichment Task (content pass)
//!
//! Reads the supported files of a folder and summarizes each one. Python
//! files go through the structural extractor, everything else is cut to a
//! snippet and sent in a single call. At most `max_files_per_node` files
//! are processed per folder; the rest are listed as dropped.

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::RunContext;
use super::aggregator::{NodeScope, NodeTask};
use super::structural;
use crate::ai::{CallOutcome, CompletionRequest, InstructionId};
use crate::analyzer::read_source;
use crate::constants::enrichment::README_SECTIONS;
use crate::types::{ContentAnalysis, FileResult, NodeEnrichment, Result, TreeNode};

/// Where a file sits, which decides its instruction and context
#[derive(Debug, Clone, Copy)]
pub enum FileRole<'a> {
    /// File inside a folder node, with that folder's context
    Nested { context: &'a Value },
    /// File at the project root, with its technologies from the files pass
    Root { technologies: &'a [String] },
}

/// Read and summarize one file
pub async fn enrich_file(
    ctx: &RunContext,
    folder: &str,
    filename: &str,
    role: FileRole<'_>,
) -> Result<CallOutcome<FileResult>> {
    let path = ctx.project_root.join(folder).join(filename);
    let text = read_source(&path).await?;

    if ctx.support.is_structural(filename) {
        return structural::extract(ctx, filename, &text).await;
    }

    let snippet = ctx
        .policy
        .estimator()
        .truncate_text(&text, ctx.budget.snippet_units);

    let request = match role {
        FileRole::Nested { context } => CompletionRequest::new(InstructionId::FileContent)
            .var("readme_section", README_SECTIONS.to_vec())
            .var("non_module_file", context.clone())
            .var("filename", filename)
            .var("file_info", snippet),
        FileRole::Root { technologies } => CompletionRequest::new(InstructionId::RootFileContent)
            .var("readme_section", README_SECTIONS.to_vec())
            .var("technologies", technologies.to_vec())
            .var("filename", filename)
            .var("file_info", snippet),
    };

    ctx.policy
        .call::<FileResult>(
            ctx.client.as_ref(),
            request,
            ctx.budget.request_max_units,
            &ctx.usage,
        )
        .await
}

/// What the model is told about the folder a file lives in: its own
/// metadata, what the modules pass found, and where it sits in the tree
pub fn folder_context(node: &TreeNode, scope: &NodeScope) -> Value {
    let analysis = node
        .module_analysis
        .as_ref()
        .and_then(NodeEnrichment::result);
    let nesting = if scope.has_nested_children {
        "There are submodules under this folder"
    } else {
        "No submodules under this folder"
    };

    json!({
        "current_folder": node.current_folder,
        "parent_folder": scope.parent_path,
        "num_files": node.num_files,
        "num_lines": node.num_lines,
        "file_extensions": node.file_extensions,
        "files": node.files,
        "submodules": scope.child_names,
        "nesting": nesting,
        "description": analysis.map(|a| a.description.as_str()),
        "technologies": node.technologies(),
        "parent_technologies": scope.parent_technologies,
    })
}

pub struct ContentTask;

#[async_trait]
impl NodeTask for ContentTask {
    type Output = ContentAnalysis;

    fn name(&self) -> &'static str {
        "modules-extended"
    }

    async fn run(
        &self,
        node: &TreeNode,
        scope: &NodeScope,
        ctx: &RunContext,
    ) -> Result<NodeEnrichment<ContentAnalysis>> {
        if node.is_root() {
            return Ok(NodeEnrichment::not_applicable("project root"));
        }

        let (mut supported, unsupported) = ctx.support.partition(&node.files);
        if supported.is_empty() {
            return Ok(NodeEnrichment::not_applicable("no supported files"));
        }

        let dropped = if supported.len() > ctx.max_files_per_node {
            supported.split_off(ctx.max_files_per_node)
        } else {
            Vec::new()
        };
        if !dropped.is_empty() {
            warn!(
                node = %node.current_folder,
                cap = ctx.max_files_per_node,
                dropped = ?dropped,
                "File cap reached, dropping files"
            );
        }

        let folder = node.current_folder.as_str();
        let context = folder_context(node, scope);
        let context = &context;
        let calls = supported.iter().map(|filename| async move {
            let outcome = enrich_file(ctx, folder, filename, FileRole::Nested { context }).await;
            (filename.as_str(), outcome)
        });

        let mut files = BTreeMap::new();
        let mut failures = Vec::new();
        for (filename, outcome) in join_all(calls).await {
            match outcome {
                Ok(CallOutcome::Success(result)) => {
                    files.insert(filename.to_string(), result);
                }
                Ok(CallOutcome::Fallback { value, cause }) => {
                    failures.push(format!("{} ({})", filename, cause));
                    files.insert(filename.to_string(), value);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(node = %folder, filename, error = %e, "File enrichment failed, storing default");
                    failures.push(format!("{} ({})", filename, e));
                    files.insert(filename.to_string(), FileResult::default());
                }
            }
        }

        debug!(
            node = %folder,
            processed = files.len(),
            failed = failures.len(),
            "Folder content enriched"
        );

        let analysis = ContentAnalysis {
            files,
            truncated: !dropped.is_empty(),
            dropped_files: dropped,
            unsupported_files: unsupported,
        };

        if failures.is_empty() {
            Ok(NodeEnrichment::enriched(analysis))
        } else {
            let reason = format!(
                "{} of {} files fell back: {}",
                failures.len(),
                supported.len(),
                failures.join(", ")
            );
            Ok(NodeEnrichment::fallback(analysis, reason))
        }
    }

    fn fallback(&self, reason: String) -> NodeEnrichment<ContentAnalysis> {
        NodeEnrichment::fallback(ContentAnalysis::default(), reason)
    }

    fn store(&self, node: &mut TreeNode, enrichment: NodeEnrichment<ContentAnalysis>) {
        node.content_analysis = Some(enrichment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::mock::{MockClient, universal_completion};
    use crate::ai::BudgetEstimator;
    use crate::enrich::test_context;
    use crate::types::{CompletionError, ModuleResult};
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn folder_with(files: &[(&str, &str)]) -> (TempDir, TreeNode) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        for (name, body) in files {
            fs::write(dir.path().join("docs").join(name), body).unwrap();
        }
        let node = TreeNode::new("docs").with_files(files.iter().map(|(n, _)| *n));
        (dir, node)
    }

    async fn run(ctx: &RunContext, node: &TreeNode) -> Result<NodeEnrichment<ContentAnalysis>> {
        ContentTask.run(node, &NodeScope::root(node), ctx).await
    }

    #[tokio::test]
    async fn test_file_cap_keeps_first_in_listed_order() {
        let (dir, node) = folder_with(&[
            ("e.md", "e"),
            ("d.md", "d"),
            ("c.txt", "c"),
            ("b.md", "b"),
            ("a.md", "a"),
        ]);
        let client = Arc::new(MockClient::succeeding());
        let ctx = test_context(client.clone(), dir.path());

        let enrichment = run(&ctx, &node).await.unwrap();

        assert!(enrichment.is_enriched());
        let analysis = enrichment.result().unwrap();
        assert_eq!(
            analysis.files.keys().collect::<Vec<_>>(),
            vec!["c.txt", "d.md", "e.md"]
        );
        assert_eq!(analysis.dropped_files, vec!["b.md", "a.md"]);
        assert!(analysis.truncated);
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn test_root_and_unsupported_nodes_not_applicable() {
        let client = Arc::new(MockClient::succeeding());
        let ctx = test_context(client.clone(), Path::new("."));

        let root = TreeNode::new(".").as_root().with_files(["a.py"]);
        let enrichment = run(&ctx, &root).await.unwrap();
        assert_eq!(enrichment.status(), "not_applicable");

        let assets = TreeNode::new("assets").with_files(["logo.png", "font.woff"]);
        let enrichment = run(&ctx, &assets).await.unwrap();
        assert_eq!(enrichment.status(), "not_applicable");

        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_mixed_routing_and_unsupported_listing() {
        let (dir, node) = folder_with(&[
            ("notes.md", "# notes\n"),
            ("tool.py", "import re\n\ndef run():\n    pass\n"),
            ("logo.png", "binary"),
        ]);
        let client = Arc::new(MockClient::succeeding());
        let ctx = test_context(client.clone(), dir.path());

        let enrichment = run(&ctx, &node).await.unwrap();
        let analysis = enrichment.result().unwrap();

        // one plain call plus one functions category
        assert_eq!(client.calls(), 2);
        assert_eq!(analysis.unsupported_files, vec!["logo.png"]);
        assert_eq!(analysis.files["notes.md"].readme_section, "main_modules");
        assert_eq!(analysis.files["tool.py"].imports, vec!["import re"]);
        assert!(analysis.files["tool.py"].functions.is_some());
        assert!(!analysis.truncated);
    }

    #[tokio::test]
    async fn test_snippet_is_bounded() {
        let (dir, node) = folder_with(&[("big.txt", &"word ".repeat(2_000))]);
        let client = Arc::new(MockClient::succeeding());
        let ctx = test_context(client.clone(), dir.path());

        run(&ctx, &node).await.unwrap();

        let request = &client.requests()[0];
        let info = request.variable("file_info").unwrap().as_str().unwrap();
        assert!(BudgetEstimator::chars().count(info) <= ctx.budget.snippet_units);
        let context = request.variable("non_module_file").unwrap();
        assert_eq!(context["current_folder"], json!("docs"));
    }

    #[tokio::test]
    async fn test_request_carries_folder_and_ancestor_context() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg/views.md"), "views").unwrap();

        let mut node = TreeNode::new("pkg")
            .with_files(["views.md"])
            .with_child("sub", TreeNode::new("pkg/sub"));
        node.num_lines = 1;
        node.module_analysis = Some(NodeEnrichment::enriched(ModuleResult {
            description: "request handlers".to_string(),
            technologies: vec!["Flask".to_string()],
            rating: "7".to_string(),
        }));
        let scope = NodeScope::child(".", &["Django".to_string()], &node);

        let client = Arc::new(MockClient::succeeding());
        let ctx = test_context(client.clone(), dir.path());
        ContentTask.run(&node, &scope, &ctx).await.unwrap();

        let request = &client.requests()[0];
        let context = request.variable("non_module_file").unwrap();
        assert_eq!(context["current_folder"], json!("pkg"));
        assert_eq!(context["parent_folder"], json!("."));
        assert_eq!(context["submodules"], json!(["sub"]));
        assert_eq!(context["nesting"], json!("There are submodules under this folder"));
        assert_eq!(context["files"], json!(["views.md"]));
        assert_eq!(context["description"], json!("request handlers"));
        assert_eq!(context["technologies"], json!(["Flask"]));
        assert_eq!(context["parent_technologies"], json!(["Django"]));
    }

    #[tokio::test]
    async fn test_failed_file_marks_node_fallback() {
        let (dir, node) = folder_with(&[("ok.md", "fine"), ("bad.md", "nope")]);
        let client = MockClient::new(|request, _| {
            if request.variable("filename") == Some(&serde_json::json!("bad.md")) {
                Err(CompletionError::transient("mock", "down"))
            } else {
                Ok(universal_completion(request))
            }
        });
        let ctx = test_context(client, dir.path());

        let enrichment = run(&ctx, &node).await.unwrap();

        assert!(enrichment.is_fallback());
        let analysis = enrichment.result().unwrap();
        assert_eq!(analysis.files["bad.md"], FileResult::default());
        assert_eq!(analysis.files["ok.md"].description, "file_content for ok.md");
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let node = TreeNode::new("gone").with_files(["missing.md"]);
        let ctx = test_context(MockClient::succeeding(), dir.path());

        let err = run(&ctx, &node).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
