use common::auth::JwtConfig;
use common::postgres::PostgresConfig;
use common::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use finrisk_api::{HttpServerConfig, RiskScorerConfig};
use ledger_worker::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment prefix, e.g. `FINRISK_WORK_QUEUE`
const ENV_PREFIX: &str = "FINRISK";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Queues
    /// Work queue the ingestion endpoint hands batches to. Required.
    pub work_queue: String,

    /// Dead-letter queue for records of rejected batches. Required.
    pub dead_letter_queue: String,

    /// Messages fetched per receive, clamped to 1..=10
    #[serde(default = "default_receive_batch_size")]
    pub receive_batch_size: usize,

    /// Max wait for a receive in seconds
    #[serde(default = "default_receive_wait_secs")]
    pub receive_wait_secs: u64,

    /// Seconds a received message stays hidden before redelivery
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    // NATS configuration
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    /// Path to PostgreSQL migrations directory
    #[serde(default = "default_postgres_migrations_dir")]
    pub postgres_migrations_dir: String,

    /// Path to goose binary
    #[serde(default = "default_postgres_goose_binary_path")]
    pub postgres_goose_binary_path: String,

    // HTTP configuration
    #[serde(default = "default_http_host")]
    pub http_host: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    // JWT configuration
    /// JWT signing secret (required for production)
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    /// JWT token expiration in hours (default: 24)
    #[serde(default = "default_jwt_expiration_hours")]
    pub jwt_expiration_hours: u64,

    // Risk scorer
    #[serde(default = "default_risk_scorer_url")]
    pub risk_scorer_url: String,

    #[serde(default = "default_risk_scorer_timeout_secs")]
    pub risk_scorer_timeout_secs: u64,

    // OpenTelemetry configuration
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_receive_batch_size() -> usize {
    ledger_worker::MAX_RECEIVE_BATCH_SIZE
}

fn default_receive_wait_secs() -> u64 {
    5
}

fn default_visibility_timeout_secs() -> u64 {
    30
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_postgres_host() -> String {
    PostgresConfig::default().host
}

fn default_postgres_port() -> u16 {
    PostgresConfig::default().port
}

fn default_postgres_database() -> String {
    PostgresConfig::default().database
}

fn default_postgres_username() -> String {
    PostgresConfig::default().username
}

fn default_postgres_password() -> String {
    PostgresConfig::default().password
}

fn default_postgres_max_pool_size() -> usize {
    PostgresConfig::default().max_pool_size
}

fn default_postgres_migrations_dir() -> String {
    PostgresConfig::default().migrations_dir
}

fn default_postgres_goose_binary_path() -> String {
    PostgresConfig::default().goose_binary_path
}

fn default_http_host() -> String {
    HttpServerConfig::default().host
}

fn default_http_port() -> u16 {
    HttpServerConfig::default().port
}

fn default_jwt_secret() -> String {
    "finrisk-dev-secret-change-me".to_string()
}

fn default_jwt_expiration_hours() -> u64 {
    24
}

fn default_risk_scorer_url() -> String {
    "http://localhost:9000/risk-score".to_string()
}

fn default_risk_scorer_timeout_secs() -> u64 {
    30
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_service_name() -> String {
    "finrisk".to_string()
}

impl ServiceConfig {
    /// Load from `FINRISK_*` variables and validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_source(source: Environment) -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects empty queue names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("work_queue", &self.work_queue),
            ("dead_letter_queue", &self.dead_letter_queue),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Message(format!(
                    "{}_{} must not be empty",
                    ENV_PREFIX,
                    name.to_uppercase()
                )));
            }
        }
        if self.work_queue == self.dead_letter_queue {
            return Err(ConfigError::Message(
                "work queue and dead-letter queue must differ".to_string(),
            ));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new(
            self.work_queue.clone(),
            self.dead_letter_queue.clone(),
            self.receive_batch_size,
            Duration::from_secs(self.receive_wait_secs),
        )
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
            migrations_dir: self.postgres_migrations_dir.clone(),
            goose_binary_path: self.postgres_goose_binary_path.clone(),
        }
    }

    pub fn http_config(&self) -> HttpServerConfig {
        HttpServerConfig {
            host: self.http_host.clone(),
            port: self.http_port,
        }
    }

    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig::new(self.jwt_secret.clone(), self.jwt_expiration_hours)
    }

    pub fn risk_scorer_config(&self) -> RiskScorerConfig {
        RiskScorerConfig {
            url: self.risk_scorer_url.clone(),
            timeout: Duration::from_secs(self.risk_scorer_timeout_secs),
        }
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.otel_service_name.clone(),
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
        }
    }
}
