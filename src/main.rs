//! dyndns-updater - keeps dynamic DNS records on the current public IP.

use anyhow::Context;
use clap::{Parser, Subcommand};
use dyndns_updater::config::{Config, IpQueryConfig};
use dyndns_updater::detector::create_resolver;
use dyndns_updater::updater::{TickReport, Updater};
use dyndns_updater::DdnsError;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// EX_CONFIG from sysexits.h.
const EXIT_CONFIG_ERROR: u8 = 78;

#[derive(Parser)]
#[command(name = "dyndns-updater")]
#[command(about = "Keeps dynamic DNS records pointed at the current public IP")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the update loop until SIGINT/SIGTERM (default)
    Run,

    /// Run a single update pass for every domain
    Once {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the current public IP
    Status,

    /// Validate configuration
    Validate,

    /// Print an example configuration file
    Example,
}

fn get_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }

    // Default locations
    let candidates = [
        dirs::config_dir().map(|p| p.join("dyndns-updater/config.toml")),
        Some(PathBuf::from("/etc/dyndns-updater/config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for candidate in candidates.into_iter().flatten() {
        if candidate.exists() {
            return candidate;
        }
    }

    // Return default even if it doesn't exist
    Config::default_path().unwrap_or_else(|_| PathBuf::from("config.toml"))
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,dyndns_updater={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Run);

    if let Commands::Example = command {
        return match Config::example().to_toml() {
            Ok(rendered) => {
                print!("{}", rendered);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config_path = get_config_path(cli.config);
    let loaded = Config::load_validated(&config_path);

    init_logging(cli.debug || loaded.as_ref().is_ok_and(|c| c.debug));

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %config_path.display(), error = %e, "loading configuration failed");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "failed to create tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async move {
        match command {
            Commands::Run => cmd_run(config).await,
            Commands::Once { json } => cmd_once(config, json).await,
            Commands::Status => cmd_status(config).await,
            Commands::Validate => cmd_validate(config),
            Commands::Example => Ok(()),
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = format!("{:#}", e);
            tracing::error!(error = %message, "command failed");
            match e.downcast_ref::<DdnsError>() {
                Some(DdnsError::Config(_)) => ExitCode::from(EXIT_CONFIG_ERROR),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn cmd_run(config: Config) -> anyhow::Result<()> {
    let mut updater = Updater::from_config(&config)?;
    let shutdown = shutdown_signal()?;

    tracing::info!(
        domains = config.domains.len(),
        interval_secs = config.check_interval_secs,
        "starting dyndns updater"
    );

    updater.run(config.interval(), shutdown).await;

    tracing::info!("stopped dyndns updater");
    Ok(())
}

async fn cmd_once(config: Config, json: bool) -> anyhow::Result<()> {
    let mut updater = Updater::from_config(&config)?;
    let report = updater.tick().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for record in updater.history() {
            match &record.error {
                None => println!("  {}: updated to {}", record.domain, record.ip),
                Some(error) => println!("  {}: FAILED - {}", record.domain, error),
            }
        }
    }

    match report {
        TickReport::ResolveFailed { error } => anyhow::bail!("IP resolution failed: {}", error),
        TickReport::Changed { failed, .. } if !failed.is_empty() => {
            anyhow::bail!("{} domain(s) failed to update", failed.len())
        }
        _ => Ok(()),
    }
}

async fn cmd_status(config: Config) -> anyhow::Result<()> {
    let resolver = create_resolver(&config.ip_query)?;
    let resolved = resolver
        .resolve_ip()
        .await
        .context("failed to detect public IP")?;

    println!("Current Public IP: {}", resolved.ip);
    if let Some(source) = resolved.source {
        println!("Source: {}", source);
    }

    println!("\nDomains:");
    for domain in &config.domains {
        println!("  {}", domain);
    }

    Ok(())
}

fn cmd_validate(config: Config) -> anyhow::Result<()> {
    let resolver = match &config.ip_query {
        IpQueryConfig::Http { url, .. } => format!("http ({})", url),
        IpQueryConfig::Public { url, .. } => format!("public ({})", url),
    };

    println!("Configuration OK");
    println!("  provider: {}", config.provider.base_url);
    println!("  resolver: {}", resolver);
    println!("  interval: {}s", config.check_interval_secs);
    println!("  domains:  {}", config.domains.join(", "));

    Ok(())
}

/// Resolves once SIGTERM or SIGINT arrives.
#[cfg(unix)]
fn shutdown_signal() -> anyhow::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to setup SIGINT handler")?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        tracing::warn!(signal = name, "termination signal received, shutting down gracefully");
    })
}

/// Resolves on CTRL-C.
#[cfg(not(unix))]
fn shutdown_signal() -> anyhow::Result<impl Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to wait for CTRL-C");
            std::future::pending::<()>().await;
        }
        tracing::warn!("termination signal received, shutting down gracefully");
    })
}
