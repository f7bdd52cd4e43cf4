pub mod error;
mod executor;
mod fetcher;
pub mod output;
mod planer;
mod probe;
mod sink;
#[cfg(test)]
mod test_server;

use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::DownloaderConfig;
use error::DownloadError;
use planer::DownloadPlan;
use sink::{FileSink, Sink};

/// Summary of a finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub path: PathBuf,
    pub bytes: u64,
    /// Number of ranged requests; 0 for a single-connection transfer.
    pub chunks: usize,
    pub elapsed: Duration,
}

/// Download `url` to `output` (or a name derived from the URL).
///
/// Probe failures abort before the output file is touched. After that, a
/// failed transfer leaves whatever was written in place.
pub async fn download(
    url: &str,
    output: Option<&Path>,
    config: &DownloaderConfig,
) -> Result<DownloadReport, DownloadError> {
    let started = Instant::now();
    let url = parse_url(url)?;
    let client = build_client(config)?;

    let capabilities = probe::probe(&client, &url).await?;
    let path = output::resolve_output_path(output, &url);

    let plan = DownloadPlan::new(&capabilities, config);
    info!(
        "downloading {} to {} (size: {:?}, range support: {}, chunks: {}, workers: {})",
        url,
        path.display(),
        plan.total_size,
        plan.range_supported,
        plan.ranges.len(),
        plan.workers
    );

    let sink = FileSink::create(&path, plan.total_size).map_err(|source| {
        DownloadError::io(
            format!("failed to create output file {}", path.display()),
            source,
        )
    })?;
    let sink = Arc::new(sink);

    let bytes = executor::execute_plan(
        &client,
        &url,
        &plan,
        Arc::clone(&sink),
        config.verify_length,
        config.fail_fast,
    )
    .await?;

    sink.finish().map_err(|source| {
        DownloadError::io(
            format!("failed to flush output file {}", path.display()),
            source,
        )
    })?;

    let report = DownloadReport {
        path: sink.path().to_path_buf(),
        bytes,
        chunks: if plan.is_chunked() { plan.ranges.len() } else { 0 },
        elapsed: started.elapsed(),
    };
    info!(
        "downloaded {} bytes to {} in {:.2?}",
        report.bytes,
        report.path.display(),
        report.elapsed
    );
    Ok(report)
}

fn parse_url(raw: &str) -> Result<Url, DownloadError> {
    let invalid = |reason: String| DownloadError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|err| invalid(err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(invalid(format!("unsupported scheme {:?}", scheme))),
    }
}

fn build_client(config: &DownloaderConfig) -> Result<Client, DownloadError> {
    Client::builder()
        .timeout(config.timeout())
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(DownloadError::Client)
}
