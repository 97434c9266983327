use std::{fmt::Display, str::FromStr, time::Duration};

/// Configuration loading failures
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Reported as the origin of in-band errors
    pub service_name: String,
    /// Further `/process` hop consulted before local handling; `None` disables it
    pub auto_function_url: Option<String>,
    pub audio_service_url: String,
    pub upstream_timeout: Duration,
    pub audio_context_ttl: Duration,
    pub audio_context_max_entries: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8129,
            service_name: "main_server".to_string(),
            auto_function_url: Some("http://localhost:8128".to_string()),
            audio_service_url: "http://localhost:8130".to_string(),
            upstream_timeout: Duration::from_secs(30),
            audio_context_ttl: Duration::from_secs(3600),
            audio_context_max_entries: 256,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// *   `HOST` / `PORT`: bind address. Defaults to `0.0.0.0:8129`.
    /// *   `SERVICE_NAME`: name attached to in-band errors. Defaults to `main_server`.
    /// *   `AUTO_FUNCTION_URL`: upstream relay. Empty or `none` disables the hop.
    /// *   `AUDIO_SERVICE_URL`: where uploaded audio is forwarded.
    /// *   `UPSTREAM_TIMEOUT_SECS`, `AUDIO_CONTEXT_TTL_SECS`, `AUDIO_CONTEXT_MAX_ENTRIES`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let auto_function_url = match lookup("AUTO_FUNCTION_URL") {
            Some(url) if url.trim().is_empty() || url.trim().eq_ignore_ascii_case("none") => None,
            Some(url) => Some(url.trim().to_string()),
            None => defaults.auto_function_url,
        };

        let audio_context_max_entries: u64 = parse_var(
            &lookup,
            "AUDIO_CONTEXT_MAX_ENTRIES",
            defaults.audio_context_max_entries,
        )?;
        if audio_context_max_entries == 0 {
            return Err(ConfigError::InvalidValue(
                "AUDIO_CONTEXT_MAX_ENTRIES".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT", defaults.port)?,
            service_name: lookup("SERVICE_NAME").unwrap_or(defaults.service_name),
            auto_function_url,
            audio_service_url: lookup("AUDIO_SERVICE_URL").unwrap_or(defaults.audio_service_url),
            upstream_timeout: Duration::from_secs(parse_var(
                &lookup,
                "UPSTREAM_TIMEOUT_SECS",
                defaults.upstream_timeout.as_secs(),
            )?),
            audio_context_ttl: Duration::from_secs(parse_var(
                &lookup,
                "AUDIO_CONTEXT_TTL_SECS",
                defaults.audio_context_ttl.as_secs(),
            )?),
            audio_context_max_entries,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
