use serde::Deserialize;

use crate::error::AppError;

/// Default `tracing` filter when `FOLIO_LOG_FILTER` and `RUST_LOG` are unset.
pub const DEFAULT_LOG_FILTER: &str = "folio=info,tower_http=info";

/// Server configuration.
///
/// Sources, later ones overriding earlier ones:
/// - built-in defaults
/// - an optional TOML file (`folio.toml` unless another path is given)
/// - environment variables prefixed with `FOLIO_`, e.g. `FOLIO_SERVER_ADDR`,
///   `FOLIO_MONGODB_URI`, `FOLIO_PROPAGATION_QUEUE_CAPACITY`
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub server_addr: String,
    /// MongoDB connection string. Without it the in-memory store is used.
    #[serde(default)]
    pub mongodb_uri: Option<String>,
    pub mongodb_database: String,
    /// Maximum number of pending link propagation jobs.
    pub propagation_queue_capacity: usize,
    pub log_filter: String,
}

impl AppConfig {
    /// Load the configuration, reading `file` (if it exists) and the environment.
    pub fn load(file: Option<&str>) -> Result<Self, AppError> {
        let file = file.unwrap_or("folio");

        config::Config::builder()
            .set_default("server_addr", "127.0.0.1:3000")
            .and_then(|b| b.set_default("mongodb_database", "folio"))
            .and_then(|b| b.set_default("propagation_queue_capacity", 1024_i64))
            .and_then(|b| b.set_default("log_filter", DEFAULT_LOG_FILTER))
            .map_err(|e| AppError::Config(e.to_string()))?
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix("FOLIO").try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize::<AppConfig>())
            .map_err(|e| AppError::Config(e.to_string()))
    }

    /// Whether the server runs without a database.
    pub fn demo_mode(&self) -> bool {
        self.mongodb_uri
            .as_deref()
            .map_or(true, |uri| uri.trim().is_empty())
    }
}
