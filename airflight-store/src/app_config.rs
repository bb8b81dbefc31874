use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Largest `connections` value a route search may request
    #[serde(default = "default_search_connections")]
    pub max_connections: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_connections: default_search_connections() }
    }
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout() -> u64 { 3 }
fn default_true() -> bool { true }
fn default_search_connections() -> u32 { 3 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file
            // Default to 'development' env
            // Note that this file is _optional_
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked in to git
            .add_source(config::File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of AIRFLIGHT)
            // Eg.. `AIRFLIGHT__DATABASE__URL=postgres://...` would set `database.url`
            .add_source(config::Environment::with_prefix("AIRFLIGHT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn from_toml(toml: &str) -> Result<Config, config::ConfigError> {
        config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn test_defaults_fill_optional_keys() {
        let config = from_toml(
            r#"
            [server]
            port = 8000

            [database]
            url = "postgres://localhost/demo"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.acquire_timeout_secs, 3);
        assert!(config.database.run_migrations);
        assert_eq!(config.search.max_connections, 3);
    }

    #[test]
    fn test_explicit_values_win() {
        let config = from_toml(
            r#"
            [server]
            port = 9100

            [database]
            url = "postgres://db/demo"
            max_connections = 20
            run_migrations = false

            [search]
            max_connections = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.database.max_connections, 20);
        assert!(!config.database.run_migrations);
        assert_eq!(config.search.max_connections, 1);
    }

    #[test]
    fn test_missing_database_url_is_an_error() {
        assert!(from_toml("[server]\nport = 8000\n[database]\n").is_err());
    }
}
