pub mod error;
pub mod result;
pub mod tree;

pub use error::{CompletionError, EnrichError, FailureKind, Result};
pub use result::{
    ContentAnalysis, FileResult, ModuleResult, NodeEnrichment, ResultSchema, StructuralCategory,
    StructuralResult,
};
pub use tree::{LeafFile, TreeNode};
