use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use crate::downloader::error::ProbeError;

/// What the server told us about the resource before any data was fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `None` when the server did not send a usable `Content-Length`.
    pub content_length: Option<u64>,
    pub accepts_ranges: bool,
}

pub async fn probe(client: &Client, url: &Url) -> Result<Capabilities, ProbeError> {
    let content_length = content_length(client, url).await?;
    let accepts_ranges = accepts_ranges(client, url).await?;
    debug!(
        "probed {}: content_length={:?}, accepts_ranges={}",
        url, content_length, accepts_ranges
    );
    Ok(Capabilities {
        content_length,
        accepts_ranges,
    })
}

/// HEAD the resource and read its size. Anything but 200 is a failure.
pub async fn content_length(client: &Client, url: &Url) -> Result<Option<u64>, ProbeError> {
    const PROBE: &str = "content length probe";

    let resp = client
        .head(url.clone())
        .send()
        .await
        .map_err(|source| ProbeError::Request {
            probe: PROBE,
            source,
        })?;

    if resp.status() != StatusCode::OK {
        return Err(ProbeError::Status {
            probe: PROBE,
            status: resp.status(),
        });
    }

    // `Response::content_length` reflects the (empty) HEAD body, so read the
    // header directly.
    Ok(resp
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok()))
}

/// A server supports ranges only if a one-byte ranged HEAD yields 206.
pub async fn accepts_ranges(client: &Client, url: &Url) -> Result<bool, ProbeError> {
    let resp = client
        .head(url.clone())
        .header(RANGE, "bytes=0-0")
        .send()
        .await
        .map_err(|source| ProbeError::Request {
            probe: "range support probe",
            source,
        })?;

    Ok(resp.status() == StatusCode::PARTIAL_CONTENT)
}
