// Quota Broker - Main Entry Point
//
// Loads the service configuration and resource catalog, then either serves
// the HTTP API or prints the catalog.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quota_broker::config::Config;
use quota_broker::metrics;
use quota_broker::quota::{AdmissionCoordinator, ModelName, ResourceCatalog};
use quota_broker::server;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Quota Broker: token quota allocation across model deployments
#[derive(Parser, Debug)]
#[command(name = "quota-broker")]
#[command(version)]
#[command(about = "Sliding-window token quota broker for pooled model deployments", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to the service configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the quota HTTP API (default)
    Serve,
    /// Load the resource catalog and print it
    Catalog,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    init_tracing(&config, args.verbose)?;

    let catalog = ResourceCatalog::load(&config.catalog.path)
        .with_context(|| format!("Failed to load catalog from {:?}", config.catalog.path))?;

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, catalog).await?,
        Commands::Catalog => print_catalog(&catalog),
    }

    Ok(())
}

fn init_tracing(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.log_level()?
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
    Ok(())
}

async fn serve(config: Config, catalog: ResourceCatalog) -> Result<()> {
    info!(
        "Quota broker v{} starting with {} resources",
        env!("CARGO_PKG_VERSION"),
        catalog.resource_count()
    );

    if config.metrics.enabled {
        metrics::init().context("Failed to initialize metrics")?;
        metrics::QUOTA_CATALOG_RESOURCES.set(catalog.resource_count() as i64);
    }

    for model in ModelName::ALL {
        if catalog.resources(model).is_empty() {
            warn!(model = %model, "No resources configured, every request will be rejected");
        }
    }

    let coordinator = Arc::new(AdmissionCoordinator::new(Arc::new(catalog)));
    server::serve(&config.server.bind_addr(), coordinator, config.metrics.enabled).await
}

fn print_catalog(catalog: &ResourceCatalog) {
    for model in ModelName::ALL {
        println!("{}", model);
        let resources = catalog.resources(model);
        if resources.is_empty() {
            println!("  (no resources)");
        }
        for resource in resources {
            println!("  {}", resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_default_command_is_none() {
        let args = Args::parse_from(["quota-broker"]);
        assert!(args.command.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_catalog_subcommand_with_config() {
        let args = Args::parse_from(["quota-broker", "-v", "--config", "/tmp/c.toml", "catalog"]);
        assert!(matches!(args.command, Some(Commands::Catalog)));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(args.verbose);
    }
}
