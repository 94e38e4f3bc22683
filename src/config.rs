//! Controller configuration
//!
//! Read from environment variables (a `.env` file is honoured by the
//! server binary):
//!   BIND_ADDR:              listen address (default: 0.0.0.0:20001)
//!   FILTER_API_URL:         filtering service base URL
//!   DATASET_API_URL:        dataset catalog base URL
//!   HIERARCHY_API_URL:      hierarchy service base URL
//!   SERVICE_AUTH_TOKEN:     bearer token sent to every service (optional)
//!   BATCH_SIZE:             options per page when reading collections (default: 100)
//!   BATCH_MAX_WORKERS:      concurrent page requests (default: 10)
//!   REQUEST_TIMEOUT_SECS:   per-request timeout (default: 30)

use anyhow::{bail, Context, Result};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:20001";
const DEFAULT_FILTER_API_URL: &str = "http://localhost:22100";
const DEFAULT_DATASET_API_URL: &str = "http://localhost:22000";
const DEFAULT_HIERARCHY_API_URL: &str = "http://localhost:22600";
const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_BATCH_MAX_WORKERS: usize = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub filter_api_url: Url,
    pub dataset_api_url: Url,
    pub hierarchy_api_url: Url,
    pub service_auth_token: Option<String>,
    pub batch: BatchConfig,
    pub request_timeout: Duration,
}

/// Paging limits for reading option collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub page_size: usize,
    pub max_concurrent_pages: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_BATCH_SIZE,
            max_concurrent_pages: DEFAULT_BATCH_MAX_WORKERS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so tests never touch the process env
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = |key: &str, default: &str| -> Result<Url> {
            let raw = lookup(key).unwrap_or_else(|| default.to_string());
            Url::parse(&raw).with_context(|| format!("{key} is not a valid URL: {raw}"))
        };

        let config = Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            filter_api_url: url("FILTER_API_URL", DEFAULT_FILTER_API_URL)?,
            dataset_api_url: url("DATASET_API_URL", DEFAULT_DATASET_API_URL)?,
            hierarchy_api_url: url("HIERARCHY_API_URL", DEFAULT_HIERARCHY_API_URL)?,
            service_auth_token: lookup("SERVICE_AUTH_TOKEN").filter(|t| !t.is_empty()),
            batch: BatchConfig {
                page_size: number_or_default(&lookup, "BATCH_SIZE", DEFAULT_BATCH_SIZE),
                max_concurrent_pages: number_or_default(
                    &lookup,
                    "BATCH_MAX_WORKERS",
                    DEFAULT_BATCH_MAX_WORKERS,
                ),
            },
            request_timeout: Duration::from_secs(number_or_default(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch.page_size == 0 {
            bail!("BATCH_SIZE must be greater than zero");
        }
        if self.batch.max_concurrent_pages == 0 {
            bail!("BATCH_MAX_WORKERS must be greater than zero");
        }
        Ok(())
    }
}

fn number_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {}={:?}, using default {}", key, raw, default);
            default
        }),
    }
}
