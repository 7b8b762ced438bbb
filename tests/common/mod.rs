//! Shared helpers for integration tests.
//!
//! Tests run against a live TDengine server described by environment
//! variables (a `.env` file is honored). Every test skips gracefully when
//! the native client library or the server is unavailable, so the suite
//! passes on hosts without a TDengine installation.

use taos_cursor::{client_available, ConnectConfig, TaosConnection};

/// Test connection parameters from the environment.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl TestConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            host: std::env::var("TAOS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("TAOS_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(6030),
            user: std::env::var("TAOS_USER").unwrap_or_else(|_| "root".to_string()),
            password: std::env::var("TAOS_PASSWORD").unwrap_or_else(|_| "taosdata".to_string()),
            database: std::env::var("TAOS_DATABASE").unwrap_or_else(|_| "test".to_string()),
        }
    }

    pub fn connect_config(&self) -> ConnectConfig {
        ConnectConfig {
            host: self.host.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            database: None,
            port: self.port,
        }
    }
}

/// Connects to the test server, or returns `None` when the native library
/// is missing or the server is unreachable.
pub fn connect_or_skip() -> Option<(TestConfig, TaosConnection)> {
    if !client_available() {
        eprintln!("skipping: TDengine client library not available");
        return None;
    }
    let config = TestConfig::from_env();
    match TaosConnection::connect(&config.connect_config()) {
        Ok(conn) => Some((config, conn)),
        Err(e) => {
            eprintln!("skipping: cannot reach TDengine server: {e}");
            None
        }
    }
}
