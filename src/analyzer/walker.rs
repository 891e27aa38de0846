//! Project Walker
//!
//! Builds the folder tree and the root file list consumed by the passes.
//! Honors `.gitignore` and skips well-known tool directories.

use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::constants::walker::SKIP_DIRS;
use crate::types::{EnrichError, LeafFile, Result, TreeNode};

/// Walk result: folder tree plus the files directly under the root
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectLayout {
    pub tree: TreeNode,
    pub root_files: Vec<LeafFile>,
}

pub struct ProjectWalker {
    root: PathBuf,
    exclude: Vec<glob::Pattern>,
}

impl ProjectWalker {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            exclude: Vec::new(),
        }
    }

    /// Glob patterns matched against paths relative to the root
    pub fn with_exclude(mut self, patterns: &[String]) -> Result<Self> {
        for pattern in patterns {
            let compiled = glob::Pattern::new(pattern).map_err(|e| {
                EnrichError::Config(format!("Invalid exclude pattern '{}': {}", pattern, e))
            })?;
            self.exclude.push(compiled);
        }
        Ok(self)
    }

    pub fn walk(&self) -> Result<ProjectLayout> {
        if !self.root.is_dir() {
            return Err(EnrichError::Config(format!(
                "Input is not a directory: {}",
                self.root.display()
            )));
        }

        let walker = WalkBuilder::new(&self.root)
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .require_git(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(|entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| SKIP_DIRS.contains(&name)))
            })
            .build();

        let mut tree = TreeNode::new(".").as_root();
        let mut root_files = Vec::new();

        for entry in walker.filter_map(|e| e.ok()) {
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            if relative.as_os_str().is_empty() || self.should_exclude(relative) {
                continue;
            }

            let Some(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                folder_mut(&mut tree, relative);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let Some(filename) = relative.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let lines = count_lines(path)?;
            let parent = relative.parent().unwrap_or(Path::new(""));
            let folder = folder_mut(&mut tree, parent);

            folder.files.push(filename.to_string());
            folder.num_files += 1;
            folder.num_lines += lines;
            if let Some(ext) = Path::new(filename).extension().and_then(|e| e.to_str()) {
                *folder.file_extensions.entry(format!(".{}", ext)).or_default() += 1;
            }

            if parent.as_os_str().is_empty() {
                let mut leaf = LeafFile::new(filename, ".");
                leaf.num_lines = lines;
                root_files.push(leaf);
            }
        }

        debug!(
            nodes = tree.node_count(),
            root_files = root_files.len(),
            "Project walked"
        );

        Ok(ProjectLayout { tree, root_files })
    }

    fn should_exclude(&self, relative: &Path) -> bool {
        let path_str = relative.to_string_lossy();
        self.exclude.iter().any(|p| p.matches(&path_str))
    }
}

/// Folder node for a relative path, created along the way
fn folder_mut<'a>(root: &'a mut TreeNode, relative: &Path) -> &'a mut TreeNode {
    let mut node = root;
    let mut current = String::new();
    for component in relative.components() {
        let Component::Normal(name) = component else {
            continue;
        };
        let name = name.to_string_lossy().into_owned();
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(&name);
        node = node
            .subfolders
            .entry(name)
            .or_insert_with(|| TreeNode::new(current.clone()));
    }
    node
}

fn count_lines(path: &Path) -> Result<usize> {
    let bytes = std::fs::read(path).map_err(|e| EnrichError::source_read(path, e))?;
    Ok(newline_count(&bytes))
}

#[inline]
fn newline_count(bytes: &[u8]) -> usize {
    bytes.iter().filter(|b| **b == b'\n').count()
}
