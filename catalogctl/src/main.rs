//! Per-tenant schema provisioning tool for the catalog service.
//!
//! Ensures every tenant listed in the configuration file has an isolated
//! schema inside the shared PostgreSQL server, applies the canonical schema
//! definition, optionally loads seed data, and prints the tenant-to-DSN
//! mapping consumed by the serving application.

use std::path::PathBuf;

use catalogctl_core::{
    CatalogConfig, Result, dsn_map, init_logging, provision, redact_database_url,
};
use clap::{Args, Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "catalogctl")]
#[command(about = "Per-tenant schema provisioning for the catalog service")]
#[command(version)]
#[command(long_about = "
catalogctl - per-tenant schema provisioning

Reads a tenant configuration file and a base PostgreSQL connection URL, and
scopes each tenant to its own schema via a composed search_path DSN.

COMMANDS:
  bootstrap   ensure each tenant schema exists and apply the schema script
  seed        apply the configured seed script to each tenant
  print-env   print the tenant -> DSN JSON map for the API

EXAMPLES:
  catalogctl bootstrap --config tenants.yaml --database-url postgres://app@db/catalog
  catalogctl seed --config tenants.yaml
  catalogctl print-env --config tenants.yaml > tenant_dsn_map.json
")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ensure tenant schemas exist and apply the schema script
    Bootstrap(RunArgs),
    /// Apply the seed script to each tenant
    Seed(RunArgs),
    /// Print the tenant identifier -> composed DSN map as one JSON line
    PrintEnv(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Tenant configuration file
    #[arg(short, long, help = "Path to the tenant configuration YAML file")]
    config: PathBuf,

    /// Base connection URL
    #[arg(
        long,
        env = "DATABASE_URL",
        help = "Base PostgreSQL connection URL (credentials are redacted in logs)"
    )]
    database_url: String,
}

#[derive(Args)]
struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    verbose: u8,

    /// Suppress output
    #[arg(short, long, help = "Suppress all output except errors")]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.global.verbose, cli.global.quiet)?;

    match &cli.command {
        Command::Bootstrap(args) => {
            let config = CatalogConfig::load(&args.config)?;
            info!("Target: {}", redact_database_url(&args.database_url));
            info!("Provisioning {} tenants", config.tenants.len());
            provision::bootstrap(&config, &args.database_url).await?;
            println!("Done.");
        }
        Command::Seed(args) => {
            let config = CatalogConfig::load(&args.config)?;
            info!("Target: {}", redact_database_url(&args.database_url));
            provision::seed(&config, &args.database_url).await?;
            println!("Done.");
        }
        Command::PrintEnv(args) => {
            let config = CatalogConfig::load(&args.config)?;
            println!("{}", dsn_map(&config.tenants, &args.database_url)?);
        }
    }

    Ok(())
}
