//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Payload budget constants (in units of the configured encoding)
pub mod budget {
    /// Cap for one completion request payload
    pub const REQUEST_MAX_UNITS: usize = 10_000;

    /// Cap for a non-code file excerpt
    pub const SNIPPET_UNITS: usize = 200;

    /// Cap for one declaration excerpt inside a source unit
    pub const DECLARATION_UNITS: usize = 100;

    /// Cap for one structural category batch
    pub const CATEGORY_BATCH_UNITS: usize = 1_500;

    /// Forced truncation target, as a fraction of the rejected payload
    pub const ESCALATION_RATIO: f64 = 0.5;

    /// Shrink factor applied when one uniform ratio does not fit
    pub const RATIO_SHRINK: f64 = 0.9;

    /// Upper bound on shrink iterations before emptying every string
    pub const MAX_SHRINK_ROUNDS: usize = 64;
}

/// Retry policy constants
pub mod retry {
    /// Attempts per logical call on transient failures
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Fixed delay between attempts (milliseconds)
    pub const DELAY_MS: u64 = 2_000;
}

/// Node enrichment constants
pub mod enrichment {
    /// Supported files processed per folder node
    pub const MAX_FILES_PER_NODE: usize = 3;

    /// Extensions routed to the structural extractor
    pub const STRUCTURAL_EXTENSIONS: &[&str] = &["py"];

    /// Supported extensions (lowercase, without dot)
    pub const SUPPORTED_EXTENSIONS: &[&str] = &[
        "py", "md", "txt", "toml", "yaml", "yml", "json", "ini", "cfg", "env", "ipynb", "sh",
        "dockerfile",
    ];

    /// Supported file names regardless of extension
    pub const SUPPORTED_FILENAMES: &[&str] = &[
        "Dockerfile",
        "Makefile",
        "LICENSE",
        "requirements.txt",
        "setup.py",
        "pyproject.toml",
    ];

    /// README sections a file can be assigned to
    pub const README_SECTIONS: &[&str] = &[
        "requirements",
        "deployment_ci_cd",
        "main_modules",
        "recommended_modules",
        "installation",
        "configuration",
        "license",
    ];
}

/// Tree walker constants
pub mod walker {
    /// Directories never descended into
    pub const SKIP_DIRS: &[&str] = &[
        ".git",
        "__pycache__",
        "node_modules",
        "target",
        ".venv",
        "venv",
        ".mypy_cache",
        ".pytest_cache",
    ];
}

/// Provider constants
pub mod provider {
    pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
    pub const DEFAULT_MAX_TOKENS: usize = 4096;
}

/// Persisted pass documents
pub mod documents {
    pub const FILES: &str = "info_files.json";
    pub const MODULES: &str = "info_modules.json";
    pub const FILES_EXTENDED: &str = "info_files_extended.json";
    pub const MODULES_EXTENDED: &str = "info_modules_extended.json";
    pub const RUN_SUMMARY: &str = "run_summary.json";
    pub const LOG_DIR: &str = "logs";
    pub const LOG_FILE: &str = "readloom.log";
}
