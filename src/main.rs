use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use showrunner::api::ApiServer;
use showrunner::config::{AppConfig, ShowConfig};
use showrunner::runtime::ShowRegistry;

#[derive(Parser)]
#[command(
    name = "showrunner",
    version,
    about = "Live broadcast show runtime: segment scheduling, camera failover and switcher control",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); defaults to the config file's setting
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load shows and serve the control API
    Run {
        /// Process settings (TOML); environment variables apply on top
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Show files (TOML or JSON), may be repeated
        #[arg(short, long = "show")]
        shows: Vec<PathBuf>,

        /// Run without sending switcher commands
        #[arg(long, default_value = "false")]
        rehearsal: bool,

        /// Start every loaded show immediately
        #[arg(long, default_value = "false")]
        autostart: bool,

        /// Control API bind address
        #[arg(long)]
        bind: Option<String>,
    },

    /// Check show files without running them
    Validate {
        /// Show files (TOML or JSON)
        #[arg(short, long = "show", required = true)]
        shows: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            shows,
            rehearsal,
            autostart,
            bind,
        } => {
            let mut settings = load_settings(config.as_deref())?;
            if rehearsal {
                settings.scheduler.rehearsal = true;
            }
            if let Some(bind) = bind {
                settings.api.bind_address = bind;
            }
            settings.validate()?;

            let format = cli
                .log_format
                .clone()
                .unwrap_or_else(|| settings.logging.format.clone());
            setup_tracing(&format, &settings.logging.level, cli.verbose)?;

            tracing::info!(
                shows = shows.len(),
                rehearsal = settings.scheduler.rehearsal,
                "showrunner starting"
            );
            run(settings, shows, autostart).await?;
        }

        Commands::Validate { shows } => {
            setup_tracing(
                cli.log_format.as_deref().unwrap_or("text"),
                "info",
                cli.verbose,
            )?;
            validate(&shows)?;
        }
    }

    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::from_env(),
    }
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("showrunner=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("showrunner={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("Failed to install tracing subscriber")?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()
                .context("Failed to install tracing subscriber")?;
        }
    }

    Ok(())
}

async fn run(settings: AppConfig, shows: Vec<PathBuf>, autostart: bool) -> Result<()> {
    if let Err(e) = showrunner::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics disabled");
    }

    let registry = Arc::new(ShowRegistry::new(settings.clone())?);

    for path in &shows {
        let show = ShowConfig::load(path)
            .with_context(|| format!("Failed to load show file: {}", path.display()))?;
        let runtime = registry.load(show).await?;

        if autostart {
            runtime.start_show().await?;
        }
    }

    let server = ApiServer::new(&settings.api, registry.clone())?;
    let served = server.serve_with_shutdown(shutdown_signal()).await;

    registry.shutdown().await;
    served?;

    tracing::info!("showrunner stopped");
    Ok(())
}

fn validate(shows: &[PathBuf]) -> Result<()> {
    let mut failures = 0;

    for path in shows {
        match ShowConfig::load(path) {
            Ok(show) => {
                println!(
                    "ok    {} ({} segments, {} cameras)",
                    path.display(),
                    show.segments.len(),
                    show.cameras.len()
                );
            }
            Err(e) => {
                failures += 1;
                println!("error {}: {e}", path.display());
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} show files failed validation", shows.len());
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
