//! Connection configuration.
//!
//! These settings are consumed by concrete adapters; the engine itself
//! never opens a connection.

use serde::{Deserialize, Serialize};

/// Connection settings for a storage adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database server host.
    pub host: String,

    /// Database server port.
    pub port: u16,

    /// Database (schema) name.
    pub database: String,

    /// Authentication user.
    pub username: String,

    /// Authentication password.
    pub password: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            database: "strata".to_string(),
            username: "root".to_string(),
            password: String::new(),
        }
    }
}

impl ConnectionConfig {
    /// Creates a configuration for the named database on localhost.
    #[must_use]
    pub fn with_database(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Default::default()
        }
    }

    /// Creates a configuration for test runs.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database: "strata_test".to_string(),
            ..Default::default()
        }
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("host must not be empty".to_string());
        }
        if self.port == 0 {
            return Err("port must be non-zero".to_string());
        }
        if self.database.is_empty() {
            return Err("database must not be empty".to_string());
        }
        Ok(())
    }

    /// Renders a connection URL for drivers that accept one.
    pub fn url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        let config = ConnectionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 3306);
    }

    #[test]
    fn test_invalid_config() {
        let config = ConnectionConfig {
            database: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_url_render() {
        let config = ConnectionConfig::for_testing();
        assert_eq!(config.url(), "mysql://root:@localhost:3306/strata_test");
    }
}
