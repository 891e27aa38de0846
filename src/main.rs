use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use readloom::cli::commands::enrich::{self, Prepared, WorkspaceTarget};
use readloom::enrich::Pass;

#[derive(Parser)]
#[command(name = "readloom")]
#[command(
    version,
    about = "AI-driven codebase tree enrichment for README generation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, help = "Configuration file (TOML)")]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich every file and folder of a project
    Run {
        #[arg(long, short, help = "Project directory")]
        input: PathBuf,
        #[arg(long, help = "Parent directory for the run workspace")]
        output_dir: Option<PathBuf>,
        #[arg(long, help = "Resume from an existing workspace")]
        resume: Option<PathBuf>,
        #[arg(long, help = "Glob of paths to skip (repeatable)")]
        exclude: Vec<String>,
    },

    /// Run a single pass
    Pass {
        #[arg(value_enum)]
        name: PassName,
        #[arg(long, short, help = "Project directory")]
        input: PathBuf,
        #[arg(long, short, help = "Workspace holding the pass documents")]
        workspace: PathBuf,
        #[arg(long, help = "Glob of paths to skip (repeatable)")]
        exclude: Vec<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PassName {
    Files,
    Modules,
    FilesExtended,
    ModulesExtended,
}

impl From<PassName> for Pass {
    fn from(name: PassName) -> Self {
        match name {
            PassName::Files => Pass::Files,
            PassName::Modules => Pass::Modules,
            PassName::FilesExtended => Pass::FilesExtended,
            PassName::ModulesExtended => Pass::ModulesExtended,
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Write the default project configuration
    Init {
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mreadloom encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

/// stderr logging, plus a plain-text copy in the workspace when given
fn init_logging(verbose: bool, quiet: bool, log_file: Option<File>) -> anyhow::Result<()> {
    let filter = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };

    let file_layer = log_file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let explicit = cli.config.as_deref();

    match cli.command {
        Commands::Run {
            input,
            output_dir,
            resume,
            exclude,
        } => {
            let resuming = resume.is_some();
            let target = match resume {
                Some(dir) => WorkspaceTarget::Resume(dir),
                None => WorkspaceTarget::Fresh { output_dir },
            };
            let prepared = enrich::prepare(explicit, &input, target)?;
            start(cli.verbose, cli.quiet, &prepared)?;

            let rt = Runtime::new()?;
            rt.block_on(enrich::run(prepared, &exclude, resuming))?;
        }
        Commands::Pass {
            name,
            input,
            workspace,
            exclude,
        } => {
            let prepared = enrich::prepare(explicit, &input, WorkspaceTarget::Single(workspace))?;
            start(cli.verbose, cli.quiet, &prepared)?;

            let rt = Runtime::new()?;
            rt.block_on(enrich::run_pass(prepared, name.into(), &exclude))?;
        }
        Commands::Config { action } => {
            init_logging(cli.verbose, cli.quiet, None)?;
            match action {
                ConfigAction::Show { format } => {
                    readloom::cli::commands::config::show(explicit, &format)?;
                }
                ConfigAction::Path => {
                    readloom::cli::commands::config::path()?;
                }
                ConfigAction::Init { force } => {
                    readloom::cli::commands::config::init(force)?;
                }
            }
        }
    }

    Ok(())
}

fn start(verbose: bool, quiet: bool, prepared: &Prepared) -> anyhow::Result<()> {
    init_logging(verbose, quiet, Some(prepared.open_log()?))?;
    tracing::info!(
        workspace = %prepared.workspace.dir().display(),
        log = %prepared.log_file().display(),
        "Workspace ready"
    );
    Ok(())
}
