//! Seedline main entry point
//!
//! This is the command-line interface for the Seedline content-fetch pipeline.

use anyhow::Context;
use clap::Parser;
use seedline::config::{load_config_with_hash, Config};
use seedline::storage::{shared, SqliteStorage};
use seedline::url::{extract_domain, is_domain_allowed, parse_http_url};
use seedline::{canonicalize, Pipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Seedline: a polite, idempotent content-fetch pipeline
///
/// Seedline fetches a fixed set of seed URLs while respecting robots.txt,
/// revalidates them with conditional GETs, and stores one record per
/// canonical URL. A lease-based lock keeps runs from overlapping.
#[derive(Parser, Debug)]
#[command(name = "seedline")]
#[command(version = "1.0.0")]
#[command(about = "A polite, idempotent content-fetch pipeline", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Execute one run and print the JSON report (default)
    #[arg(long, conflicts_with_all = ["serve", "dry_run", "stats"])]
    run: bool,

    /// Start the HTTP trigger server
    #[arg(long, conflicts_with_all = ["run", "dry_run", "stats"])]
    serve: bool,

    /// Validate config and show what would be fetched without fetching
    #[arg(long, conflicts_with_all = ["run", "serve", "stats"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["run", "serve", "dry_run"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.serve {
        handle_serve(config, config_hash).await?;
    } else {
        handle_run(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("seedline=info,warn"),
            1 => EnvFilter::new("seedline=debug,info"),
            2 => EnvFilter::new("seedline=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_pipeline(config: Config, config_hash: String) -> anyhow::Result<Pipeline> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .with_context(|| format!("Failed to open database {}", config.output.database_path))?;
    Ok(Pipeline::new(config, config_hash, shared(storage))?)
}

/// Handles the --dry-run mode: validates config and shows what would be fetched
fn handle_dry_run(config: &Config) {
    println!("=== Seedline Dry Run ===\n");

    println!("Pipeline:");
    println!("  Lock: {} ({} min lease)", config.pipeline.lock_name, config.pipeline.lock_ttl_minutes);
    println!("  Concurrency: {}", config.pipeline.concurrency);
    println!(
        "  Retries: {} (base {}ms)",
        config.fetch.max_retries, config.fetch.retry_base_delay_ms
    );
    println!(
        "  Delay per fetch: {}ms + up to {}ms jitter",
        config.fetch.rate_limit_base_ms, config.fetch.rate_limit_jitter_ms
    );

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nTrigger:");
    println!("  Enabled: {}", config.trigger.enabled);
    println!("  Hardened: {}", config.trigger.hardened);
    println!("  Bind: {}", config.trigger.bind);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!(
        "\nAllowed Domains ({}):",
        config.policy.allowed_domains.len()
    );
    for pattern in &config.policy.allowed_domains {
        println!("  - {}", pattern);
    }

    println!("\nSeeds ({}):", config.pipeline.seeds.len());
    let mut fetchable = 0;
    for seed in &config.pipeline.seeds {
        let allowed = parse_http_url(seed)
            .ok()
            .as_ref()
            .and_then(extract_domain)
            .is_some_and(|domain| is_domain_allowed(&config.policy.allowed_domains, &domain));
        if allowed {
            fetchable += 1;
        }
        println!(
            "  {} {} -> {}",
            if allowed { "*" } else { "x" },
            seed,
            canonicalize(seed)
        );
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ {} of {} seeds are on the allow-list (robots.txt is checked at run time)",
        fetchable,
        config.pipeline.seeds.len()
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use seedline::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --serve mode: runs the trigger server
async fn handle_serve(config: Config, config_hash: String) -> anyhow::Result<()> {
    let bind = config.trigger.bind.clone();
    let pipeline = Arc::new(open_pipeline(config, config_hash)?);
    seedline::server::serve(pipeline, &bind).await?;
    Ok(())
}

/// Handles the default mode: one internal run, report on stdout
async fn handle_run(config: Config, config_hash: String) -> anyhow::Result<()> {
    let pipeline = open_pipeline(config, config_hash)?;

    match pipeline.run_internal().await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) if e.is_skip() => {
            tracing::info!("Another run holds the lock; nothing to do");
            Ok(())
        }
        Err(e) => {
            tracing::error!(code = e.code(), "Run refused: {}", e);
            Err(e.into())
        }
    }
}
