use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memostore::connection::Neo4jConfig;
use memostore::{
    CacheConfig, CacheStore, DocumentStore, KeyFilter, Neo4jClient, Neo4jDocumentStore,
};

#[derive(Parser)]
#[command(name = "memostore")]
#[command(about = "Administer the memostore durable cache", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Neo4j connection URI
    #[arg(long, env = "NEO4J_URI", default_value = "bolt://localhost:7687")]
    neo4j_uri: String,

    /// Neo4j user
    #[arg(long, env = "NEO4J_USER", default_value = "neo4j")]
    neo4j_user: String,

    /// Neo4j password
    #[arg(long, env = "NEO4J_PASSWORD", default_value = "password", hide_env_values = true)]
    neo4j_password: String,

    /// Neo4j database name
    #[arg(long, env = "NEO4J_DATABASE", default_value = "neo4j")]
    database: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the durable store is reachable
    Health,

    /// Create the cache entry indexes
    Init,

    /// Delete every durable cache entry
    Clear {
        /// Skip the confirmation guard
        #[arg(long)]
        yes: bool,
    },

    /// Delete entries of a function matching any of the given filters
    Invalidate {
        /// Qualified function identity (e.g. "stats::team_registrations")
        function: String,

        /// JSON filter, e.g. '{"kwargs.event_id": "e1"}' (repeatable)
        #[arg(short, long = "filter", required = true)]
        filters: Vec<String>,
    },

    /// Remove expired entries once
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose {
        "memostore=debug"
    } else {
        "memostore=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Neo4jConfig::new(
        &cli.neo4j_uri,
        &cli.neo4j_user,
        &cli.neo4j_password,
        &cli.database,
    );

    match cli.command {
        Commands::Health => {
            let client = Neo4jClient::connect(config).await?;
            let result = client.health_check_detailed().await;

            println!("Status:        {:?}", result.status);
            println!("Response time: {}ms", result.response_time_ms);
            if let Some(name) = &result.database_name {
                println!("Database:      {}", name);
            }
            if let Some(error) = &result.error {
                println!("Error:         {}", error);
            }

            if !result.status.is_operational() {
                anyhow::bail!("durable store is not operational");
            }
        }

        Commands::Init => {
            let store = open_store(config).await?;
            store.ensure_indexes().await?;
            println!("Cache indexes ready");
        }

        Commands::Clear { yes } => {
            if !yes {
                anyhow::bail!("refusing to clear the cache without --yes");
            }
            let store = open_store(config).await?;
            store.clear_all().await?;
            println!("Cache cleared");
        }

        Commands::Invalidate { function, filters } => {
            let filters = filters
                .iter()
                .map(|raw| parse_filter(raw))
                .collect::<Result<Vec<_>>>()?;

            let store = open_store(config).await?;
            let removed = memostore::invalidate(&store, &function, &filters).await?;
            println!("Removed {} entries for {}", removed, function);
        }

        Commands::Sweep => {
            let client = Arc::new(Neo4jClient::connect(config).await?);
            let removed = Neo4jDocumentStore::new(client).sweep_expired().await?;
            println!("Swept {} expired entries", removed);
        }
    }

    Ok(())
}

async fn open_store(config: Neo4jConfig) -> Result<CacheStore> {
    let client = Arc::new(Neo4jClient::connect(config).await?);
    let durable = Arc::new(Neo4jDocumentStore::new(client));
    // The CLI is short-lived; never start a background sweep
    let cache_config = CacheConfig {
        enable_ttl_sweeper: false,
        ..CacheConfig::from_env()?
    };

    Ok(CacheStore::new(durable, cache_config)?)
}

fn parse_filter(raw: &str) -> Result<KeyFilter> {
    let value: serde_json::Value =
        serde_json::from_str(raw).with_context(|| format!("invalid filter JSON: {}", raw))?;
    Ok(KeyFilter::from_json(&value)?)
}
