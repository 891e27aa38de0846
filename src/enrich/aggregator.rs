//! Recursive Tree Aggregator
//!
//! Enriches a node, then fans out to its children concurrently and joins
//! them before returning. Each child future owns its `&mut` subtree, so no
//! two futures ever write the same node.
//!
//! Errors become a fallback result on the failing node. Fatal errors
//! (source reads) also skip the node's children and are returned after
//! every sibling has finished.

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tracing::{debug, error, warn};

use super::RunContext;
use crate::types::{NodeEnrichment, Result, TreeNode};

/// What a node's enrichment may depend on besides its own metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeScope {
    /// `None` for the root
    pub parent_path: Option<String>,
    pub child_names: Vec<String>,
    pub has_nested_children: bool,
    /// Technologies already resolved for the parent folder
    pub parent_technologies: Vec<String>,
}

impl NodeScope {
    pub fn root(node: &TreeNode) -> Self {
        Self {
            parent_path: None,
            child_names: node.child_names(),
            has_nested_children: node.has_children(),
            parent_technologies: Vec::new(),
        }
    }

    pub fn child(parent_path: &str, parent_technologies: &[String], node: &TreeNode) -> Self {
        Self {
            parent_path: Some(parent_path.to_string()),
            child_names: node.child_names(),
            has_nested_children: node.has_children(),
            parent_technologies: parent_technologies.to_vec(),
        }
    }
}

/// Per-node work scheduled by the aggregator
#[async_trait]
pub trait NodeTask: Send + Sync {
    type Output: Send;

    fn name(&self) -> &'static str;

    async fn run(
        &self,
        node: &TreeNode,
        scope: &NodeScope,
        ctx: &RunContext,
    ) -> Result<NodeEnrichment<Self::Output>>;

    /// Result stored when `run` fails
    fn fallback(&self, reason: String) -> NodeEnrichment<Self::Output>;

    /// Write the result into the node's own slot
    fn store(&self, node: &mut TreeNode, enrichment: NodeEnrichment<Self::Output>);
}

/// Enrich every node of `root` in place
pub async fn aggregate<T: NodeTask>(task: &T, ctx: &RunContext, root: &mut TreeNode) -> Result<()> {
    let scope = NodeScope::root(root);
    enrich_subtree(task, ctx, root, scope).await
}

fn enrich_subtree<'a, T: NodeTask>(
    task: &'a T,
    ctx: &'a RunContext,
    node: &'a mut TreeNode,
    scope: NodeScope,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let enrichment = match task.run(node, &scope, ctx).await {
            Ok(enrichment) => enrichment,
            Err(e) if e.is_fatal() => {
                task.store(node, task.fallback(e.to_string()));
                return Err(e);
            }
            Err(e) => {
                warn!(
                    task = task.name(),
                    node = %node.current_folder,
                    error = %e,
                    "Node enrichment failed, storing default"
                );
                task.fallback(e.to_string())
            }
        };
        task.store(node, enrichment);

        if !node.has_children() {
            return Ok(());
        }

        let parent_path = node.current_folder.clone();
        let parent_technologies = node.technologies();
        debug!(
            task = task.name(),
            node = %parent_path,
            children = node.subfolders.len(),
            "Fanning out"
        );

        let children = node.subfolders.iter_mut().map(|(name, child)| {
            let scope = NodeScope::child(&parent_path, &parent_technologies, child);
            async move { (name.as_str(), enrich_subtree(task, ctx, child, scope).await) }
        });

        let mut fatal = None;
        for (name, result) in join_all(children).await {
            if let Err(e) = result {
                error!(
                    task = task.name(),
                    node = %parent_path,
                    child = name,
                    error = %e,
                    "Subtree aborted"
                );
                fatal.get_or_insert(e);
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
    .boxed()
}
