//! IP risk analysis CLI.

use anyhow::Result;
use clap::Parser;
use ip_insight::engine::AnalysisOutcome;
use ip_insight::signals::http::BackendClient;
use ip_insight::{Config, MembershipCache, RiskEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ip-insight")]
#[command(about = "Analyze an IP address: combine threat intel, behavioral, network, and geographic signals into a composite risk score")]
#[command(version)]
struct Args {
    /// IP address to analyze
    #[arg(value_name = "IP", required_unless_present_any = ["print_config", "validate", "classify_lists"])]
    ip: Option<String>,

    /// Classify a comma-separated batch of IPs against the membership
    /// lists instead of analyzing a single IP
    #[arg(long, value_name = "IPS", value_delimiter = ',')]
    classify_lists: Vec<String>,

    /// Path to configuration file
    #[arg(short, long, default_value = "ip-insight.yaml")]
    config: PathBuf,

    /// Force-refresh external intelligence before scoring (slower,
    /// rate-limit-sensitive)
    #[arg(long)]
    enrich: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "warn")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Handle --validate
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let backend = Arc::new(BackendClient::new(&config.backend)?);

    if !args.classify_lists.is_empty() {
        let cache = MembershipCache::new(
            backend,
            config.membership.cache_ttl_seconds,
            config.membership.list_page_limit,
        );
        let statuses = cache.classify(&args.classify_lists).await;
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    let ip = args.ip.expect("clap enforces the IP argument");
    let engine = RiskEngine::new(
        backend.clone(),
        backend.clone(),
        backend,
        config.scoring.clone(),
    );

    if args.enrich {
        match engine.enrich(&ip).await {
            Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
            Err(e) => {
                eprintln!("{}", e.user_message());
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    match engine.analyze(&ip).await? {
        AnalysisOutcome::Resolved(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        AnalysisOutcome::NotFound { ip } => {
            println!(
                "No data available for {} - run with --enrich to fetch from upstream sources.",
                ip
            );
        }
        AnalysisOutcome::Superseded => {
            // Single-request CLI path; cannot happen.
        }
    }

    Ok(())
}
