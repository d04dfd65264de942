//! Trackwall
//!
//! On-device tracker classification and blocking-decision engine for a
//! VPN-based tracker blocker. This binary wires the directory, block
//! state, and engine together for offline inspection: classify a
//! destination, evaluate the verdict an app would get, validate
//! configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use tracing::{info, Level};

use trackwall_blockstate::{BlockState, JsonSettingsStore, NoResolver};
use trackwall_config::Config;
use trackwall_directory::{DirectoryOptions, DirectorySources, StaticHostSet, TrackerDirectory};
use trackwall_engine::TrackerEngine;
use trackwall_model::Uid;

mod logging;

use logging::{init_tracing, LogConfig, LogFormat};

/// Trackwall - tracker classification and blocking decisions
#[derive(Parser, Debug)]
#[command(name = "trackwall")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a destination and evaluate the verdict for an app
    Check {
        /// Destination hostname
        host: String,

        /// Destination IP literal, when known
        #[arg(short, long)]
        ip: Option<String>,

        /// App uid to evaluate block state for
        #[arg(short, long, default_value_t = 0)]
        uid: u32,
    },

    /// Validate configuration file
    Validate {
        /// Show the effective configuration
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show version information
    Version,
}

/// Find the configuration file in standard locations
fn find_config_file(explicit_path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path);
    }

    let search_paths = [
        PathBuf::from("./trackwall.yaml"),
        PathBuf::from("./trackwall.yml"),
        PathBuf::from("/etc/trackwall/config.yaml"),
        dirs::config_dir()
            .map(|p| p.join("trackwall/config.yaml"))
            .unwrap_or_default(),
    ];

    search_paths.into_iter().find(|path| path.exists())
}

/// Parse log level from string
fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging/tracing subsystem
fn init_logging(config: &Config, cli_level: Option<&str>, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if let Some(lvl) = cli_level {
        parse_log_level(lvl)
    } else {
        parse_log_level(&config.logging.level)
    };

    let format = match config.logging.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    };

    init_tracing(&LogConfig {
        level,
        format,
        span_events: false,
    });
}

/// Builds the directory, block state, and engine from configuration, the
/// way the VPN service's application context would.
fn build_engine(config: &Config) -> Result<TrackerEngine> {
    let directory = Arc::new(TrackerDirectory::new(DirectoryOptions {
        domain_based_blocking: config.blocking.domain_based,
    }));

    let summary = directory.load(&DirectorySources {
        companies: config.assets.companies.clone(),
        categories: config.assets.categories.clone(),
        ip_list: config.assets.ip_list.clone(),
    });
    info!(
        domains = summary.domains_indexed,
        ips = summary.ips_loaded,
        sources_skipped = summary.sources_skipped,
        "Directory loaded"
    );

    if let Some(hosts_path) = config.assets.merged_hosts.as_deref() {
        match StaticHostSet::from_file(hosts_path) {
            Ok(hosts) => directory.set_hosts(Arc::new(hosts)),
            Err(e) => tracing::warn!(
                path = %hosts_path.display(),
                error = %e,
                "Skipping unreadable merged hosts list"
            ),
        }
    }

    let state = Arc::new(BlockState::new());
    if let Some(state_path) = config.state.path.as_deref() {
        let store = JsonSettingsStore::new(state_path);
        state
            .load_from(&store, &NoResolver)
            .context("loading persisted block state")?;
    }

    Ok(TrackerEngine::new(directory, state))
}

fn cmd_check(config: &Config, host: &str, ip: Option<&str>, uid: u32, quiet: bool) -> Result<()> {
    let engine = build_engine(config)?;
    let uid = Uid(uid);
    let decision = engine.evaluate(uid, host, ip);

    match &decision.identity {
        Some(identity) => {
            println!(
                "  {} {}",
                style("Tracker:").green(),
                style(identity.name()).bold()
            );
            println!("  {} {}", style("Category:").green(), identity.category());
            if let Some(country) = identity.country().or(identity.source_country()) {
                println!("  {} {}", style("Country:").green(), country);
            }
            if identity.is_uncertain() && !quiet {
                println!("  {}", style("(hosts-list match, owner uncertain)").dim());
            }
        }
        None => println!("  {} not a known tracker", style("Tracker:").green()),
    }

    let verdict = if decision.verdict.is_blocked() {
        style("BLOCK").red().bold()
    } else {
        style("ALLOW").green().bold()
    };
    println!("  {} {} (uid {})", style("Verdict:").green(), verdict, uid);

    Ok(())
}

fn cmd_validate(config_path: Option<&PathBuf>, config: &Config, verbose: bool) -> Result<()> {
    config.validate().context("configuration is invalid")?;

    match config_path {
        Some(path) => println!(
            "  {} {}",
            style("OK").green().bold(),
            style(path.display()).dim()
        ),
        None => println!("  {} (built-in defaults)", style("OK").green().bold()),
    }
    if verbose {
        print!("{}", config.to_yaml()?);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = find_config_file(cli.config.clone());
    let config = match &config_path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };

    init_logging(&config, cli.log_level.as_deref(), cli.quiet);

    match cli.command {
        Commands::Check { host, ip, uid } => {
            cmd_check(&config, &host, ip.as_deref(), uid, cli.quiet)
        }
        Commands::Validate { verbose } => cmd_validate(config_path.as_ref(), &config, verbose),
        Commands::Version => {
            println!(
                "trackwall {} ({})",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::ARCH
            );
            Ok(())
        }
    }
}
