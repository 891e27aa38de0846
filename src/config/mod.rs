//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (platform config dir)
//! 3. Project config (.readloom/config.toml)
//! 4. Explicit `--config` file
//! 5. Environment variables (READLOOM_*)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
