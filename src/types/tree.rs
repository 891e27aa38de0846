//! Analysis Tree
//!
//! Folder tree produced by the walker and enriched in place by the passes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::result::{ContentAnalysis, FileResult, ModuleResult, NodeEnrichment};

/// A folder of the analyzed project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Folder path relative to the project root (`.` for the root)
    pub current_folder: String,
    pub num_files: usize,
    #[serde(default)]
    pub file_extensions: BTreeMap<String, usize>,
    pub num_lines: usize,
    /// File names directly inside this folder, in listed order
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub subfolders: BTreeMap<String, TreeNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_project_folder: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_analysis: Option<NodeEnrichment<ModuleResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_analysis: Option<NodeEnrichment<ContentAnalysis>>,
}

impl TreeNode {
    pub fn new(current_folder: impl Into<String>) -> Self {
        Self {
            current_folder: current_folder.into(),
            ..Default::default()
        }
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self.num_files = self.files.len();
        self
    }

    pub fn with_child(mut self, name: impl Into<String>, child: TreeNode) -> Self {
        self.subfolders.insert(name.into(), child);
        self
    }

    pub fn as_root(mut self) -> Self {
        self.main_project_folder = Some(true);
        self
    }

    /// Pseudo-root node standing for the project itself
    pub fn is_root(&self) -> bool {
        self.main_project_folder.unwrap_or(false)
    }

    pub fn has_children(&self) -> bool {
        !self.subfolders.is_empty()
    }

    pub fn child_names(&self) -> Vec<String> {
        self.subfolders.keys().cloned().collect()
    }

    /// All nodes of the subtree, parents before children
    pub fn nodes(&self) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.subfolders.values().rev());
        }
        out
    }

    pub fn node_count(&self) -> usize {
        1 + self.subfolders.values().map(TreeNode::node_count).sum::<usize>()
    }

    /// Technologies resolved by the module pass, if it succeeded
    pub fn technologies(&self) -> Vec<String> {
        self.module_analysis
            .as_ref()
            .and_then(NodeEnrichment::result)
            .map(|r| r.technologies.clone())
            .unwrap_or_default()
    }
}

/// A file directly under the project root
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeafFile {
    pub file_extension: String,
    pub filename: String,
    pub num_lines: usize,
    pub current_folder: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<NodeEnrichment<ModuleResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<NodeEnrichment<FileResult>>,
}

impl LeafFile {
    pub fn new(filename: impl Into<String>, current_folder: impl Into<String>) -> Self {
        let filename = filename.into();
        let file_extension = std::path::Path::new(&filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        Self {
            file_extension,
            filename,
            current_folder: current_folder.into(),
            ..Default::default()
        }
    }

    /// Technologies found by the file-level pass, if it succeeded
    pub fn technologies(&self) -> Vec<String> {
        self.analysis
            .as_ref()
            .and_then(NodeEnrichment::result)
            .map(|r| r.technologies.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> TreeNode {
        TreeNode::new(".")
            .as_root()
            .with_files(["a.py", "README.md"])
            .with_child(
                "lib",
                TreeNode::new("lib")
                    .with_files(["b.py"])
                    .with_child("util", TreeNode::new("lib/util")),
            )
            .with_child("docs", TreeNode::new("docs"))
    }

    #[test]
    fn test_nodes_parents_first() {
        let tree = sample_tree();
        let folders: Vec<&str> = tree
            .nodes()
            .iter()
            .map(|n| n.current_folder.as_str())
            .collect();
        assert_eq!(folders, vec![".", "docs", "lib", "lib/util"]);
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn test_walker_shape_deserializes() {
        let raw = r#"{
            "current_folder": "proj",
            "num_files": 1,
            "file_extensions": {".py": 1},
            "num_lines": 10,
            "files": ["main.py"],
            "subfolders": {},
            "main_project_folder": true
        }"#;
        let node: TreeNode = serde_json::from_str(raw).unwrap();
        assert!(node.is_root());
        assert!(!node.has_children());
        assert!(node.module_analysis.is_none());
    }

    #[test]
    fn test_leaf_file_extension() {
        let leaf = LeafFile::new("setup.py", ".");
        assert_eq!(leaf.file_extension, ".py");
        let leaf = LeafFile::new("Makefile", ".");
        assert_eq!(leaf.file_extension, "");
        assert!(leaf.technologies().is_empty());
    }
}
