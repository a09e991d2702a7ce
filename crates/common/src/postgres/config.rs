use serde::{Deserialize, Serialize};

/// PostgreSQL configuration for the ledger store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_pool_size: usize,
    pub migrations_dir: String,
    pub goose_binary_path: String,
}

impl PostgresConfig {
    /// Connection string in the form goose and libpq accept
    pub fn dsn(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode=disable",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "finrisk".to_string(),
            username: "finrisk".to_string(),
            password: "finrisk".to_string(),
            max_pool_size: 10,
            migrations_dir: "crates/finrisk_all_in_one/migrations/postgres".to_string(),
            goose_binary_path: "goose".to_string(),
        }
    }
}
