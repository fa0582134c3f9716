use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use org_pull::config::LoggingConfig;
use org_pull::sync::{shutdown_channel, spawn_ctrl_c_handler};
use org_pull::{
    Config, ConsoleReporter, Credentials, GitClient, GitHubLister, LocalResolver, Reporter,
    SyncEngine, SyncSummary,
};

#[derive(Parser)]
#[command(name = "org-pull")]
#[command(about = "Pull every locally checked-out repository of a GitHub organization")]
#[command(version)]
struct Cli {
    /// GitHub organization
    #[arg(long, env = "GIT_ORG")]
    org: Option<String>,

    /// GitHub private access token
    #[arg(long, env = "GIT_TOKEN", hide_env_values = true, default_value = "")]
    token: String,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the checkouts (defaults to the parent of the current directory)
    #[arg(long)]
    base_dir: Option<String>,

    /// Report what would be updated without running the update command
    #[arg(long)]
    dry_run: bool,

    /// Write the effective configuration to the config path and exit
    #[arg(long)]
    write_config: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(base_dir) = &cli.base_dir {
        config.base_directory = base_dir.clone();
        config.expand_paths()?;
        config.validate()?;
    }

    init_logging(cli.verbose, &config.logging)?;
    info!("Starting org-pull v{}", env!("CARGO_PKG_VERSION"));

    if cli.write_config {
        return cmd_write_config(cli.config, &config);
    }

    let organization = cli
        .org
        .context("No organization given. Pass --org or set GIT_ORG")?;
    let credentials = Credentials::new(organization, cli.token);

    let summary = cmd_sync(&credentials, &config, cli.dry_run).await?;

    Ok(ExitCode::from(exit_code(&summary)))
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool, logging: &LoggingConfig) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    // stdout carries the relayed command output
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(logging.color),
        )
        .with(filter)
        .init();

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Save the effective configuration
fn cmd_write_config(config_path: Option<PathBuf>, config: &Config) -> Result<ExitCode> {
    let config_path = match config_path {
        Some(path) => path,
        None => Config::default_config_path()?,
    };

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }
    config.save(&config_path)?;

    println!("Configuration written to {}", config_path.display());
    Ok(ExitCode::SUCCESS)
}

/// Update every checked-out repository of the organization
async fn cmd_sync(credentials: &Credentials, config: &Config, dry_run: bool) -> Result<SyncSummary> {
    let start_dir = std::env::current_dir().context("Failed to read the current directory")?;
    let base_directory = config.base_path(&start_dir);

    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter);
    let lister = GitHubLister::new(credentials, config)?;
    let engine = SyncEngine::new(
        Box::new(lister),
        LocalResolver::new(base_directory),
        GitClient::new(config, reporter.clone()),
        reporter,
    )
    .with_dry_run(dry_run);

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    spawn_ctrl_c_handler(shutdown_tx);

    engine.run(shutdown_rx).await
}

/// 130 if interrupted, 2 if any repository failed, 0 otherwise
fn exit_code(summary: &SyncSummary) -> u8 {
    if summary.cancelled {
        130
    } else if summary.has_failures() {
        2
    } else {
        0
    }
}
