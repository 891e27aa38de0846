//! Config Command
//!
//! Usage:
//!   readloom config show [-f toml|json]
//!   readloom config path
//!   readloom config init [--force]

use std::path::Path;

use crate::cli::Output;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged effective configuration
pub fn show(explicit: Option<&Path>, format: &str) -> Result<()> {
    let config = ConfigLoader::load(explicit)?;
    println!("{}", ConfigLoader::render(&config, format)?);
    Ok(())
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Initialize project configuration
pub fn init(force: bool) -> Result<()> {
    let output = Output::new();
    let path = ConfigLoader::project_config_path();
    if ConfigLoader::init_at(&path, force)? {
        output.success("Initialized project configuration");
        output.field("config", path.display());
    } else {
        output.warning(&format!(
            "{} already exists, use --force to overwrite",
            path.display()
        ));
    }
    Ok(())
}
