//! Module classification task: one call per folder from its metadata and
//! the names of its subfolders.

use async_trait::async_trait;
use serde_json::json;

use super::RunContext;
use super::aggregator::{NodeScope, NodeTask};
use crate::ai::{CompletionRequest, InstructionId};
use crate::types::{ModuleResult, NodeEnrichment, Result, TreeNode};

pub struct ModuleTask;

impl ModuleTask {
    pub fn request(node: &TreeNode, scope: &NodeScope) -> CompletionRequest {
        let instruction = if scope.has_nested_children {
            InstructionId::ModuleWithSubmodules
        } else {
            InstructionId::ModuleWithoutSubmodules
        };

        let request = CompletionRequest::new(instruction)
            .var("current_module", node.current_folder.clone())
            .var("num_files", node.num_files)
            .var("extensions", json!(node.file_extensions))
            .var("num_lines", node.num_lines)
            .var("parent_technologies", scope.parent_technologies.clone());

        if scope.has_nested_children {
            request.var("submodules", scope.child_names.clone())
        } else {
            request
        }
    }
}

#[async_trait]
impl NodeTask for ModuleTask {
    type Output = ModuleResult;

    fn name(&self) -> &'static str {
        "modules"
    }

    async fn run(
        &self,
        node: &TreeNode,
        scope: &NodeScope,
        ctx: &RunContext,
    ) -> Result<NodeEnrichment<ModuleResult>> {
        let outcome = ctx
            .policy
            .call::<ModuleResult>(
                ctx.client.as_ref(),
                Self::request(node, scope),
                ctx.budget.request_max_units,
                &ctx.usage,
            )
            .await?;
        Ok(outcome.into_enrichment())
    }

    fn fallback(&self, reason: String) -> NodeEnrichment<ModuleResult> {
        NodeEnrichment::fallback(ModuleResult::default(), reason)
    }

    fn store(&self, node: &mut TreeNode, enrichment: NodeEnrichment<ModuleResult>) {
        node.module_analysis = Some(enrichment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::mock::MockClient;
    use crate::enrich::aggregator::aggregate;
    use crate::enrich::test_context;
    use std::path::Path;
    use std::sync::Arc;

    fn tree() -> TreeNode {
        TreeNode::new(".")
            .as_root()
            .with_files(["setup.py"])
            .with_child(
                "src",
                TreeNode::new("src").with_child("core", TreeNode::new("src/core").with_files(["x.py"])),
            )
    }

    #[test]
    fn test_request_variables() {
        let node = TreeNode::new("src").with_child("core", TreeNode::new("src/core"));
        let scope = NodeScope::child(".", &["Python".to_string()], &node);
        let request = ModuleTask::request(&node, &scope);

        assert_eq!(request.instruction, InstructionId::ModuleWithSubmodules);
        assert_eq!(request.variable("submodules"), Some(&json!(["core"])));
        assert_eq!(request.variable("parent_technologies"), Some(&json!(["Python"])));

        let leaf = TreeNode::new("src/core");
        let request = ModuleTask::request(&leaf, &NodeScope::child("src", &[], &leaf));
        assert_eq!(request.instruction, InstructionId::ModuleWithoutSubmodules);
        assert!(request.variable("submodules").is_none());
    }

    #[tokio::test]
    async fn test_modules_pass_one_call_per_node() {
        let client = Arc::new(MockClient::succeeding());
        let ctx = test_context(client.clone(), Path::new("."));
        let mut root = tree();

        aggregate(&ModuleTask, &ctx, &mut root).await.unwrap();

        assert_eq!(client.calls(), 3);
        for node in root.nodes() {
            let analysis = node.module_analysis.as_ref().unwrap();
            assert!(analysis.is_enriched());
        }
        let core = &root.subfolders["src"].subfolders["core"];
        assert_eq!(
            core.module_analysis.as_ref().unwrap().result().unwrap().description,
            "module_without_submodules for src/core"
        );
    }

    #[tokio::test]
    async fn test_transient_failures_fall_back_per_node() {
        let client = Arc::new(MockClient::always_transient());
        let ctx = test_context(client.clone(), Path::new("."));
        let mut root = tree();

        aggregate(&ModuleTask, &ctx, &mut root).await.unwrap();

        // three attempts for each of the three nodes
        assert_eq!(client.calls(), 9);
        for node in root.nodes() {
            let analysis = node.module_analysis.as_ref().unwrap();
            assert!(analysis.is_fallback());
            assert_eq!(analysis.result(), Some(&ModuleResult::default()));
        }
    }
}
