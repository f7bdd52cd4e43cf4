use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Resources smaller than this are always fetched over one connection.
pub const DEFAULT_SINGLE_CONNECTION_THRESHOLD: u64 = 1024 * 1024;

/// Settings for one download, passed explicitly down to the client, planner
/// and coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloaderConfig {
    /// Number of chunks a range-capable resource is split into.
    pub concurrency: usize,
    /// Upper bound on chunk tasks running at once. `None` starts every chunk
    /// together.
    pub max_workers: Option<usize>,
    /// Timeout applied to each HTTP call.
    pub timeout_secs: u64,
    pub single_connection_threshold: u64,
    /// Reject bodies whose length differs from the requested range.
    pub verify_length: bool,
    /// Cancel sibling chunks after the first failure.
    pub fail_fast: bool,
    pub log_level: String,
    pub user_agent: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_workers: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            single_connection_threshold: DEFAULT_SINGLE_CONNECTION_THRESHOLD,
            verify_length: true,
            fail_fast: false,
            log_level: "warn".to_string(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl DownloaderConfig {
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: DownloaderConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        if self.max_workers == Some(0) {
            anyhow::bail!("max_workers must be at least 1");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
