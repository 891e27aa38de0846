//! Project analysis: walking the folder tree, reading sources and
//! decomposing Python files into structural categories.

pub mod python;
pub mod source;
pub mod walker;

pub use python::{ClassInfo, FunctionInfo, SourceUnit, decompose};
pub use source::{FileSupport, read_source};
pub use walker::{ProjectLayout, ProjectWalker};
