//! Source Reading
//!
//! Extension allow-list and asynchronous file reads. A read failure is
//! fatal for the whole run.

use std::collections::HashSet;
use std::path::Path;

use crate::config::EnrichmentConfig;
use crate::types::{EnrichError, Result};

/// Which files of a folder are enriched, and how
#[derive(Debug, Clone, Default)]
pub struct FileSupport {
    extensions: HashSet<String>,
    filenames: HashSet<String>,
    structural: HashSet<String>,
}

impl FileSupport {
    pub fn from_config(config: &EnrichmentConfig) -> Self {
        let lower = |items: &[String]| items.iter().map(|s| s.to_lowercase()).collect();
        Self {
            extensions: lower(&config.supported_extensions),
            filenames: config.supported_filenames.iter().cloned().collect(),
            structural: lower(&config.structural_extensions),
        }
    }

    pub fn is_supported(&self, filename: &str) -> bool {
        self.filenames.contains(filename)
            || extension(filename).is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Supported and decomposed by the structural extractor
    pub fn is_structural(&self, filename: &str) -> bool {
        extension(filename).is_some_and(|ext| self.structural.contains(&ext))
            && self.is_supported(filename)
    }

    /// Split into (supported, unsupported), both in listed order
    pub fn partition(&self, files: &[String]) -> (Vec<String>, Vec<String>) {
        files.iter().cloned().partition(|f| self.is_supported(f))
    }
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

/// Read a file as text. Invalid UTF-8 sequences are replaced.
pub async fn read_source(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| EnrichError::source_read(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn support() -> FileSupport {
        FileSupport::from_config(&EnrichmentConfig::default())
    }

    #[test]
    fn test_allow_list() {
        let support = support();
        assert!(support.is_supported("main.py"));
        assert!(support.is_supported("NOTES.MD"));
        assert!(support.is_supported("Dockerfile"));
        assert!(support.is_supported("Makefile"));
        assert!(!support.is_supported("logo.png"));
        assert!(!support.is_supported("makefile"));
    }

    #[test]
    fn test_structural_routing() {
        let support = support();
        assert!(support.is_structural("app.py"));
        assert!(!support.is_structural("README.md"));
        assert!(!support.is_structural("Dockerfile"));
    }

    #[test]
    fn test_partition_keeps_order() {
        let files: Vec<String> = ["b.py", "x.bin", "a.md", "y.so"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (supported, unsupported) = support().partition(&files);
        assert_eq!(supported, vec!["b.py", "a.md"]);
        assert_eq!(unsupported, vec!["x.bin", "y.so"]);
    }

    #[tokio::test]
    async fn test_read_missing_file_is_fatal() {
        let err = read_source(Path::new("/definitely/not/here.py"))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_read_lossy() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bin.txt");
        std::fs::write(&path, [b'o', b'k', 0xff]).unwrap();
        let text = read_source(&path).await.unwrap();
        assert!(text.starts_with("ok"));
    }
}
