use std::env;
use std::time::Duration;

pub mod cors;

pub use cors::create_cors_layer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/ticketing";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    /// Upper bound on how long a purchase waits for a ticket type row lock.
    pub lock_timeout: Duration,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string());

        Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            max_connections: parse_nonzero_or(
                "DATABASE_MAX_CONNECTIONS",
                lookup("DATABASE_MAX_CONNECTIONS"),
                DEFAULT_MAX_CONNECTIONS,
            ),
            // Zero would mean "wait forever" to Postgres.
            lock_timeout: Duration::from_millis(parse_nonzero_or(
                "LOCK_TIMEOUT_MS",
                lookup("LOCK_TIMEOUT_MS"),
                DEFAULT_LOCK_TIMEOUT_MS,
            )),
            port: parse_or("PORT", lookup("PORT"), DEFAULT_PORT),
            allowed_origins: origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Config: invalid {} '{}', using {}", key, raw, default);
            default
        }),
    }
}

fn parse_nonzero_or<T>(key: &str, value: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display + PartialEq + Default,
{
    let parsed = parse_or(key, value, default);
    if parsed == T::default() {
        tracing::warn!("Config: {} must be greater than zero, using {}", key, default);
        default
    } else {
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.lock_timeout, Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.allowed_origins.len(), 2);
    }

    #[test]
    fn test_reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/tickets"),
            ("DATABASE_MAX_CONNECTIONS", "32"),
            ("LOCK_TIMEOUT_MS", "250"),
            ("PORT", "8080"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
        ]));
        assert_eq!(config.database_url, "postgres://db/tickets");
        assert_eq!(config.max_connections, 32);
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_malformed_numbers_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("LOCK_TIMEOUT_MS", "soon"),
            ("PORT", "-1"),
        ]));
        assert_eq!(config.lock_timeout, Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_zero_lock_timeout_falls_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("LOCK_TIMEOUT_MS", "0"),
            ("DATABASE_MAX_CONNECTIONS", "0"),
        ]));
        assert!(!config.lock_timeout.is_zero());
        assert_eq!(config.lock_timeout, Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS));
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
    }
}
