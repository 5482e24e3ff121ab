use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Queue configuration
    /// SQS queue URL for incoming statements
    #[serde(default = "default_queue_url")]
    pub queue_url: String,

    /// Messages requested per poll (the queue caps a fetch at 10)
    #[serde(default = "default_poll_batch_size")]
    pub poll_batch_size: usize,

    /// Lease window for fetched messages, in seconds. A message not deleted
    /// within this window is redelivered; pair it with a redrive policy on
    /// the queue so permanently-failing messages do not cycle forever.
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Delay between polls in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum concurrently-processing messages
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    // Invocation identity
    /// Caller name checked against write credentials
    #[serde(default = "default_function_name")]
    pub function_name: String,

    /// Log group recorded in response envelopes
    #[serde(default = "default_log_group_name")]
    pub log_group_name: String,

    /// Log stream recorded in response envelopes
    #[serde(default = "default_log_stream_name")]
    pub log_stream_name: String,

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

    #[serde(default = "default_postgres_pool_size")]
    pub postgres_pool_size: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

// Queue defaults
fn default_queue_url() -> String {
    "http://localhost:9324/queue/statements".to_string()
}

fn default_poll_batch_size() -> usize {
    10
}

fn default_visibility_timeout_secs() -> u64 {
    60
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_in_flight() -> usize {
    10
}

// Invocation identity defaults
fn default_function_name() -> String {
    "statement-ingest".to_string()
}

fn default_log_group_name() -> String {
    "/ingest/statement-ingest".to_string()
}

fn default_log_stream_name() -> String {
    "local".to_string()
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "lrs".to_string()
}

fn default_postgres_username() -> String {
    "lrs".to_string()
}

fn default_postgres_password() -> String {
    "lrs".to_string()
}

fn default_postgres_pool_size() -> usize {
    5
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("LRS"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests run serially and don't interfere with each other
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();

        std::env::remove_var("LRS_POLL_BATCH_SIZE");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.poll_batch_size, 10);
        assert_eq!(config.visibility_timeout_secs, 60);
        assert_eq!(config.function_name, "statement-ingest");
    }

    #[test]
    fn test_env_overrides() {
        let _lock = TEST_LOCK.lock().unwrap();

        std::env::set_var("LRS_POLL_BATCH_SIZE", "5");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.poll_batch_size, 5);

        std::env::remove_var("LRS_POLL_BATCH_SIZE");
    }
}
