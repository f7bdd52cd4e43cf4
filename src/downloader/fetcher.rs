use reqwest::header::RANGE;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::downloader::error::{FetchError, FetchErrorKind};
use crate::downloader::planer::ByteRange;
use crate::downloader::sink::Sink;

/// Bytes written on success.
pub type FetchOutcome = Result<u64, FetchError>;

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Fail when the body is shorter than expected. Longer bodies always fail.
    pub verify_length: bool,
    /// Checked at every network suspension point.
    pub cancel: Option<CancellationToken>,
}

/// GET one byte range and write it at `range.start`. Only 206 is accepted.
pub async fn fetch_range<S: Sink>(
    client: &Client,
    url: &Url,
    range: ByteRange,
    sink: Arc<S>,
    options: &FetchOptions,
) -> FetchOutcome {
    debug!("fetching bytes {}", range);

    let request = client.get(url.clone()).header(RANGE, range.header_value());
    let result = transfer(
        request,
        StatusCode::PARTIAL_CONTENT,
        range.start,
        Some(range.len()),
        &sink,
        options,
    )
    .await;

    match result {
        Ok(written) => {
            debug!("bytes {} done ({} bytes)", range, written);
            Ok(written)
        }
        Err(kind) => Err(FetchError::new(Some(range), kind)),
    }
}

/// GET the whole resource with a plain request and write it from offset 0.
/// Only 200 is accepted.
pub async fn fetch_whole<S: Sink>(
    client: &Client,
    url: &Url,
    expected_len: Option<u64>,
    sink: Arc<S>,
    options: &FetchOptions,
) -> FetchOutcome {
    debug!("fetching {} over a single connection", url);

    let request = client.get(url.clone());
    transfer(request, StatusCode::OK, 0, expected_len, &sink, options)
        .await
        .map_err(|kind| FetchError::new(expected_len.and_then(ByteRange::whole), kind))
}

async fn transfer<S: Sink>(
    request: RequestBuilder,
    expected_status: StatusCode,
    base: u64,
    expected_len: Option<u64>,
    sink: &Arc<S>,
    options: &FetchOptions,
) -> Result<u64, FetchErrorKind> {
    let resp = until_cancelled(options, request.send())
        .await?
        .map_err(FetchErrorKind::Request)?;
    if resp.status() != expected_status {
        return Err(FetchErrorKind::Status(resp.status()));
    }
    stream_body(resp, base, expected_len, sink, options).await
}

/// Copy the response body into the sink at `base..`, never past `expected`
/// bytes when that is known.
async fn stream_body<S: Sink>(
    mut resp: Response,
    base: u64,
    expected: Option<u64>,
    sink: &Arc<S>,
    options: &FetchOptions,
) -> Result<u64, FetchErrorKind> {
    let mut written = 0u64;

    while let Some(buf) = until_cancelled(options, resp.chunk())
        .await?
        .map_err(FetchErrorKind::Body)?
    {
        let received = written + buf.len() as u64;
        if let Some(expected) = expected {
            // Writing on would overwrite the next range.
            if received > expected {
                return Err(FetchErrorKind::LengthMismatch { expected, received });
            }
        }

        write_at(sink, base + written, buf)
            .await
            .map_err(FetchErrorKind::Write)?;
        written = received;
    }

    if let Some(expected) = expected {
        if written < expected {
            if options.verify_length {
                return Err(FetchErrorKind::LengthMismatch {
                    expected,
                    received: written,
                });
            }
            warn!(
                "short body at offset {}: expected {} bytes, received {}",
                base, expected, written
            );
        }
    }

    Ok(written)
}

async fn write_at<S, B>(sink: &Arc<S>, offset: u64, buf: B) -> io::Result<()>
where
    S: Sink,
    B: AsRef<[u8]> + Send + 'static,
{
    let sink = Arc::clone(sink);
    tokio::task::spawn_blocking(move || sink.write_at(offset, buf.as_ref()))
        .await
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?
}

async fn until_cancelled<F: Future>(
    options: &FetchOptions,
    fut: F,
) -> Result<F::Output, FetchErrorKind> {
    match &options.cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(FetchErrorKind::Cancelled),
            output = fut => Ok(output),
        },
        None => Ok(fut.await),
    }
}
