use anyhow::{anyhow, Context, Result};
use std::env;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

pub fn required_env(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("missing env: {name}"))
}

/// Reads an unsigned integer from `name`, falling back to `default` when unset.
/// A present but unparsable value is an error rather than a silent fallback.
pub fn u32_from_env(name: &str, default: u32) -> Result<u32> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u32>()
            .map_err(|err| anyhow!("invalid integer for {name}: {err}")),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        let url = required_env("DATABASE_URL")?;
        Self::with_url(url)
    }

    /// Uses an explicit URL (e.g. from a CLI flag) and the env for the rest.
    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        let max_connections = u32_from_env("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        if max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be at least 1"));
        }
        Ok(Self {
            url: url.into(),
            max_connections,
        })
    }
}
