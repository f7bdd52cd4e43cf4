use futures::StreamExt;
use futures::stream::FuturesUnordered;
use reqwest::{Client, Url};
use std::sync::Arc;
use tokio::sync::AcquireError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::downloader::error::{DownloadError, FetchError, FetchErrorKind};
use crate::downloader::fetcher::{self, FetchOptions, FetchOutcome};
use crate::downloader::planer::{ByteRange, DownloadPlan, Strategy};
use crate::downloader::sink::Sink;
use crate::utils::limited_spawner::LimitedSpawner;
use crate::utils::multierr::MultiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Dispatching,
    AwaitingAll,
    Succeeded,
    Failed,
}

/// Coordinator: runs every fetch the plan calls for and folds the outcomes
/// into one result. Returns the number of bytes written.
///
/// Every dispatched task is awaited, even after a failure. With `fail_fast`
/// the first failing task asks its siblings to stop; they still report an
/// outcome.
pub async fn execute_plan<S: Sink>(
    client: &Client,
    url: &Url,
    plan: &DownloadPlan,
    sink: Arc<S>,
    verify_length: bool,
    fail_fast: bool,
) -> Result<u64, DownloadError> {
    match plan.strategy {
        Strategy::SingleConnection => {
            let options = FetchOptions {
                verify_length,
                cancel: None,
            };
            fetcher::fetch_whole(client, url, plan.total_size, sink, &options)
                .await
                .map_err(whole_file_error)
        }
        Strategy::Chunked => {
            execute_chunks(client, url, plan, sink, verify_length, fail_fast).await
        }
    }
}

async fn execute_chunks<S: Sink>(
    client: &Client,
    url: &Url,
    plan: &DownloadPlan,
    sink: Arc<S>,
    verify_length: bool,
    fail_fast: bool,
) -> Result<u64, DownloadError> {
    let mut state = State::Idle;
    let cancel = CancellationToken::new();
    let options = FetchOptions {
        verify_length,
        cancel: fail_fast.then(|| cancel.clone()),
    };

    transition(&mut state, State::Dispatching);
    let spawner = LimitedSpawner::new(plan.workers);
    let mut pending = FuturesUnordered::new();
    for &range in &plan.ranges {
        let client = client.clone();
        let url = url.clone();
        let sink = Arc::clone(&sink);
        let options = options.clone();
        let cancel = cancel.clone();
        let task = async move {
            let outcome = fetcher::fetch_range(&client, &url, range, sink, &options).await;
            if outcome.is_err() && fail_fast {
                cancel.cancel();
            }
            outcome
        };

        let spawned = spawner.spawn(task).await;
        pending.push(join_outcome(range, spawned));
    }
    debug!(
        "dispatched {} chunks to {} workers",
        plan.ranges.len(),
        spawner.max_concurrent()
    );

    transition(&mut state, State::AwaitingAll);
    let total = pending.len();
    let mut written = 0u64;
    let mut errors = MultiError::default();
    let mut cancelled = Vec::new();
    while let Some(outcome) = pending.next().await {
        match outcome {
            Ok(bytes) => written += bytes,
            Err(err) if err.is_cancelled() => cancelled.push(err),
            Err(err) => {
                warn!("chunk failed: {}", err);
                errors.push(err);
            }
        }
    }
    // Cancellations are a consequence of an earlier failure, never its cause.
    for err in cancelled {
        errors.push(err);
    }

    if let Some(first) = errors.first() {
        transition(&mut state, State::Failed);
        debug!("{} of {} chunks failed, first: {}", errors.len(), total, first);
        Err(DownloadError::ChunksFailed {
            failed: errors.len(),
            total,
            errors,
        })
    } else {
        transition(&mut state, State::Succeeded);
        Ok(written)
    }
}

/// Local write failures are I/O errors, not HTTP ones.
fn whole_file_error(err: FetchError) -> DownloadError {
    match err.kind {
        FetchErrorKind::Write(source) => {
            let target = match err.range {
                Some(range) => format!("bytes {}", range),
                None => "response body".to_string(),
            };
            DownloadError::io(format!("failed to write {} to output", target), source)
        }
        kind => DownloadError::Fetch(FetchError::new(err.range, kind)),
    }
}

async fn join_outcome(
    range: ByteRange,
    spawned: Result<JoinHandle<FetchOutcome>, AcquireError>,
) -> FetchOutcome {
    let joined = match spawned {
        Ok(handle) => handle.await.map_err(|err| err.to_string()),
        Err(err) => Err(err.to_string()),
    };
    joined.unwrap_or_else(|reason| {
        Err(FetchError::new(
            Some(range),
            FetchErrorKind::TaskPanicked(reason),
        ))
    })
}

fn transition(state: &mut State, next: State) {
    debug!("coordinator {:?} -> {:?}", state, next);
    *state = next;
}
