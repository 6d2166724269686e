//! Neo4j connection management for the durable tier
//!
//! Wraps a pooled `neo4rs::Graph` together with the settings used to open it,
//! and exposes the health checks the admin CLI reports on.

use crate::error::{CacheError, Result};
use chrono::{DateTime, Utc};
use neo4rs::{query, ConfigBuilder, Graph};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Connection settings for Neo4j
#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    /// Connection URI (e.g. "bolt://localhost:7687")
    pub uri: String,
    pub user: String,
    pub password: String,
    /// Database name (default: "neo4j")
    pub database: String,
    /// Size of the driver connection pool
    pub max_connections: usize,
    /// Rows fetched per round trip
    pub fetch_size: usize,
    /// Response time above which a healthy database is reported as degraded
    pub degraded_threshold: Duration,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "password".to_string(),
            database: "neo4j".to_string(),
            max_connections: 16,
            fetch_size: 500,
            degraded_threshold: Duration::from_millis(1000),
        }
    }
}

impl Neo4jConfig {
    pub fn new(uri: &str, user: &str, password: &str, database: &str) -> Self {
        Self {
            uri: uri.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            database: database.to_string(),
            ..Default::default()
        }
    }

    /// Read `NEO4J_URI`, `NEO4J_USER`, `NEO4J_PASSWORD` and `NEO4J_DATABASE`,
    /// loading a `.env` file first if one exists. Unset variables keep their
    /// defaults.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        Self {
            uri: std::env::var("NEO4J_URI").unwrap_or(defaults.uri),
            user: std::env::var("NEO4J_USER").unwrap_or(defaults.user),
            password: std::env::var("NEO4J_PASSWORD").unwrap_or(defaults.password),
            database: std::env::var("NEO4J_DATABASE").unwrap_or(defaults.database),
            ..defaults
        }
    }
}

/// Reachability of the durable store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    /// Answering, but slower than `degraded_threshold`
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Whether cache reads and writes can still go through
    pub fn is_operational(self) -> bool {
        self != HealthStatus::Unhealthy
    }
}

/// Outcome of [`Neo4jClient::health_check_detailed`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub response_time_ms: u64,
    /// Name reported by `db.info()`
    pub database_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

impl HealthCheckResult {
    fn from_outcome(
        outcome: Result<String>,
        elapsed: Duration,
        degraded_threshold: Duration,
    ) -> Self {
        let (status, database_name, error) = match outcome {
            Ok(name) if elapsed > degraded_threshold => (HealthStatus::Degraded, Some(name), None),
            Ok(name) => (HealthStatus::Healthy, Some(name), None),
            Err(e) => (HealthStatus::Unhealthy, None, Some(e.to_string())),
        };

        Self {
            status,
            response_time_ms: elapsed.as_millis() as u64,
            database_name,
            timestamp: Utc::now(),
            error,
        }
    }
}

/// Pooled Neo4j client
pub struct Neo4jClient {
    graph: Graph,
    config: Neo4jConfig,
}

impl Neo4jClient {
    /// Connect with default pool settings
    pub async fn new(uri: &str, user: &str, password: &str, database: &str) -> Result<Self> {
        Self::connect(Neo4jConfig::new(uri, user, password, database)).await
    }

    /// Connect using settings from the environment
    pub async fn from_env() -> Result<Self> {
        Self::connect(Neo4jConfig::from_env()).await
    }

    pub async fn connect(config: Neo4jConfig) -> Result<Self> {
        info!(
            "Opening durable cache store at {} (database: {})",
            config.uri, config.database
        );

        let driver_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .db(config.database.as_str())
            .fetch_size(config.fetch_size)
            .max_connections(config.max_connections)
            .build()
            .map_err(|e| CacheError::ConfigError(e.to_string()))?;

        let graph = Graph::connect(driver_config)
            .await
            .map_err(|e| CacheError::ConnectionError(e.to_string()))?;

        info!("Durable cache store connected");
        Ok(Self { graph, config })
    }

    /// `RETURN 1` round trip
    pub async fn health_check(&self) -> Result<bool> {
        debug!("Pinging durable store");

        self.graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| CacheError::ConnectionError(e.to_string()))?;

        Ok(true)
    }

    /// Timed `CALL db.info()`; failures are reported in the result, never raised
    pub async fn health_check_detailed(&self) -> HealthCheckResult {
        let started = Instant::now();
        let outcome = self.database_info().await;
        let elapsed = started.elapsed();

        if let Err(e) = &outcome {
            error!("Durable store health check failed: {}", e);
        } else {
            debug!("Durable store answered in {}ms", elapsed.as_millis());
        }

        HealthCheckResult::from_outcome(outcome, elapsed, self.config.degraded_threshold)
    }

    async fn database_info(&self) -> Result<String> {
        let mut rows = self
            .graph
            .execute(query("CALL db.info()"))
            .await
            .map_err(|e| CacheError::ConnectionError(format!("db.info() failed: {}", e)))?;

        let row = rows
            .next()
            .await
            .map_err(|e| CacheError::QueryError(format!("Failed to read db.info(): {}", e)))?
            .ok_or_else(|| CacheError::QueryError("db.info() returned no rows".to_string()))?;

        row.get("name")
            .map_err(|e| CacheError::QueryError(format!("db.info() has no name: {}", e)))
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &Neo4jConfig {
        &self.config
    }
}
