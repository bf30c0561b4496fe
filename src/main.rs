//! Reply-Harvest main entry point
//!
//! This is the command-line interface for the Reply-Harvest comment mirror.

use clap::Parser;
use reply_harvest::config::{load_config_with_hash, Config, UnboundedPolicy};
use reply_harvest::ingest::{Coordinator, PageCount};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Reply-Harvest: mirrors a paginated comment thread into SQLite
///
/// Reply-Harvest finds how many pages a discussion has, walks every page's
/// reply tree and inserts or refreshes each comment in a local database.
#[derive(Parser, Debug)]
#[command(name = "reply-harvest")]
#[command(version)]
#[command(about = "Mirrors a paginated comment thread into SQLite", long_about = None)]
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

    /// Validate config and show what would be harvested without any requests
    #[arg(long, conflicts_with_all = ["stats", "probe"])]
    dry_run: bool,

    /// Discover the number of pages and exit without writing
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    probe: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "probe"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.probe {
        handle_probe(config, config_hash).await?;
    } else {
        handle_harvest(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("reply_harvest=info,warn"),
            1 => EnvFilter::new("reply_harvest=debug,info"),
            2 => EnvFilter::new("reply_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    println!("=== Reply-Harvest Dry Run ===\n");

    println!("Source:");
    match (config.source.subject_id, &config.source.bvid) {
        (Some(subject_id), _) => {
            println!("  Subject id: {}", subject_id);
            println!("  Endpoint: {}", config.source.endpoint_for(subject_id));
        }
        (None, Some(bvid)) => {
            println!("  Video: {}", bvid);
            println!("  Resolved via: {}{}", config.source.view_endpoint(), bvid);
        }
        (None, None) => {}
    }
    println!("  Upper bound: {}", config.source.upper_bound);
    println!(
        "  When unbounded: {}",
        match config.source.unbounded {
            UnboundedPolicy::Follow => "follow",
            UnboundedPolicy::Abort => "abort",
        }
    );

    println!("\nRate Limit:");
    println!("  Average delay: {}ms", config.rate_limit.average_delay);
    println!("  Delay range: {}ms", config.rate_limit.delay_range);
    match config.rate_limit.seed {
        Some(seed) => println!("  Seed: {}", seed),
        None => println!("  Seed: (random)"),
    }

    println!("\nDispatch:");
    println!("  Writers: {}", config.dispatch.workers);
    println!("  Fail fast: {}", config.dispatch.fail_fast);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use reply_harvest::output::{load_statistics, print_statistics};
    use reply_harvest::storage::open_storage;
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --probe mode: runs discovery only
async fn handle_probe(config: Config, config_hash: String) -> Result<(), Box<dyn std::error::Error>> {
    let upper_bound = config.source.upper_bound;
    let coordinator = Coordinator::new(config, config_hash).await?;

    match coordinator.probe().await? {
        PageCount::Empty => println!("Thread is empty"),
        PageCount::Boundary(boundary) => {
            println!("First empty page: {}", boundary);
            println!("Data pages: {}", boundary - 1);
        }
        PageCount::Unbounded => {
            println!("Page {} still has data; no boundary found", upper_bound)
        }
    }

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let workers = config.dispatch.workers;
    let coordinator = Coordinator::new(config, config_hash).await?;
    tracing::info!("Harvesting with {} writers", workers);

    // Ctrl-C stops the page loop; queued writes still drain
    let cancel = coordinator.cancel_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            cancel.cancel();
        }
    });

    match coordinator.run().await {
        Ok(report) => {
            reply_harvest::output::print_report(&report);
            tracing::info!("Harvest finished with status {}", report.status.to_db_string());
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
