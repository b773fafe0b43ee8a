//! Configuration file for fanout.
//!
//! ```toml
//! [client]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4o-mini"
//!
//! [batch]
//! concurrency = 4
//! ```
//!
//! Located at `$FANOUT_CONFIG`, else `~/.fanout/config.toml`. A missing file
//! is not an error. String values may reference environment variables as
//! `${VAR}`. Environment variables override file values; the API credential
//! is never read from this file.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "FANOUT_CONFIG";
pub const CONCURRENCY_ENV: &str = "FANOUT_CONCURRENCY";
pub const DEFAULT_CONCURRENCY: NonZeroUsize = NonZeroUsize::MIN.saturating_add(3);

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FanoutConfig {
    pub client: Option<ClientSection>,
    pub batch: Option<BatchSection>,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientSection {
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BatchSection {
    /// Maximum in-flight calls per batch. Must be at least 1.
    pub concurrency: Option<usize>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid concurrency from {origin}: {value:?} (expected an integer >= 1)")]
    InvalidConcurrency { origin: &'static str, value: String },
}

impl FanoutConfig {
    /// Load from the default location. `Ok(None)` when no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match Self::parse(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// `[client].base_url` with `${VAR}` references expanded.
    #[must_use]
    pub fn base_url(&self) -> Option<String> {
        self.client
            .as_ref()
            .and_then(|c| c.base_url.as_deref())
            .map(expand_env_vars)
    }

    /// `[client].model` with `${VAR}` references expanded.
    #[must_use]
    pub fn model(&self) -> Option<String> {
        self.client
            .as_ref()
            .and_then(|c| c.model.as_deref())
            .map(expand_env_vars)
    }

    /// Batch concurrency: `FANOUT_CONCURRENCY`, then `[batch].concurrency`,
    /// then [`DEFAULT_CONCURRENCY`].
    pub fn concurrency(config: Option<&Self>) -> Result<NonZeroUsize, ConfigError> {
        resolve_concurrency(
            std::env::var(CONCURRENCY_ENV).ok().as_deref(),
            config
                .and_then(|c| c.batch.as_ref())
                .and_then(|b| b.concurrency),
        )
    }
}

/// Pick the concurrency limit from an environment value and a file value.
pub fn resolve_concurrency(
    env_value: Option<&str>,
    file_value: Option<usize>,
) -> Result<NonZeroUsize, ConfigError> {
    if let Some(raw) = env_value.map(str::trim).filter(|v| !v.is_empty()) {
        return raw
            .parse::<usize>()
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| ConfigError::InvalidConcurrency {
                origin: CONCURRENCY_ENV,
                value: raw.to_string(),
            });
    }

    match file_value {
        Some(value) => NonZeroUsize::new(value).ok_or_else(|| ConfigError::InvalidConcurrency {
            origin: "[batch].concurrency",
            value: value.to_string(),
        }),
        None => Ok(DEFAULT_CONCURRENCY),
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Ok(custom) = std::env::var(CONFIG_PATH_ENV)
        && !custom.trim().is_empty()
    {
        return Some(PathBuf::from(custom));
    }
    dirs::home_dir().map(|home| home.join(".fanout").join("config.toml"))
}

/// Expand `${VAR}` references from the process environment.
///
/// Unset variables expand to the empty string; an unclosed `${` is kept
/// literally.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    expand_env_vars_with(value, |name| std::env::var(name).ok())
}

pub fn expand_env_vars_with<L>(value: &str, lookup: L) -> String
where
    L: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&lookup(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}
