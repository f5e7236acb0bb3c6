use std::{str::FromStr, time::Duration};

use crate::{
    error::{Error, Result},
    http::parser::FrameLimits,
};

/// Server settings. Every field can be overridden from the environment
/// with [`ServerConfig::from_env`].
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// `LOOPLITE_HOST`
    pub host: String,
    /// `LOOPLITE_PORT`
    pub port: u16,
    /// `LOOPLITE_READ_CHUNK`
    pub read_chunk_size: usize,
    /// `LOOPLITE_MAX_HEADER_BYTES`
    pub max_header_bytes: usize,
    /// `LOOPLITE_MAX_BODY_BYTES`
    pub max_body_bytes: usize,
    /// `LOOPLITE_TIMEOUT_SECS`; bounds the whole life of one connection.
    pub connection_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let limits = FrameLimits::default();
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            read_chunk_size: limits.read_chunk_size,
            max_header_bytes: limits.max_header_bytes,
            max_body_bytes: limits.max_body_bytes,
            connection_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from defaults plus whatever `lookup` returns.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = ServerConfig::default();
        Ok(ServerConfig {
            host: lookup("LOOPLITE_HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "LOOPLITE_PORT", defaults.port)?,
            read_chunk_size: parse_var(&lookup, "LOOPLITE_READ_CHUNK", defaults.read_chunk_size)?,
            max_header_bytes: parse_var(
                &lookup,
                "LOOPLITE_MAX_HEADER_BYTES",
                defaults.max_header_bytes,
            )?,
            max_body_bytes: parse_var(
                &lookup,
                "LOOPLITE_MAX_BODY_BYTES",
                defaults.max_body_bytes,
            )?,
            connection_timeout: Duration::from_secs(parse_var(
                &lookup,
                "LOOPLITE_TIMEOUT_SECS",
                defaults.connection_timeout.as_secs(),
            )?),
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            read_chunk_size: self.read_chunk_size,
            max_header_bytes: self.max_header_bytes,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has invalid value `{}`", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.frame_limits().read_chunk_size, 1024);
        assert_eq!(config.frame_limits().max_body_bytes, 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("LOOPLITE_HOST", "0.0.0.0"),
            ("LOOPLITE_PORT", "9000"),
            ("LOOPLITE_TIMEOUT_SECS", "5"),
            ("LOOPLITE_MAX_BODY_BYTES", "2048"),
        ]))
        .unwrap();

        assert_eq!(config.frame_limits().max_body_bytes, 2048);
        assert_eq!(config.address(), "0.0.0.0:9000");
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_value() {
        let err = ServerConfig::from_lookup(lookup(&[("LOOPLITE_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
