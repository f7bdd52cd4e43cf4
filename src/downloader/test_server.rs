//! In-process HTTP file server and memory sink used by the downloader tests.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{
        HeaderMap, Method, StatusCode,
        header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use reqwest::Url;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::downloader::sink::Sink;

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Honor `Range` headers with 206 responses.
    pub ranges: bool,
    /// Answer 500, after the paired delay, to ranged GETs starting at these
    /// offsets.
    pub fail_ranges: Vec<(u64, Duration)>,
    /// Status returned to every unranged GET instead of 200.
    pub plain_status: Option<StatusCode>,
    /// Drop the last byte of every ranged GET body.
    pub short_body: bool,
    /// Stream bodies without a `Content-Length`.
    pub omit_length: bool,
    /// Wait before answering each successful ranged GET.
    pub delay: Option<Duration>,
}

impl ServerOptions {
    /// Fail the ranged GET starting at `start` right away.
    pub fn failing_at(start: u64) -> Self {
        ServerOptions {
            fail_ranges: vec![(start, Duration::ZERO)],
            ..ServerOptions::default()
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            ranges: true,
            fail_ranges: Vec::new(),
            plain_status: None,
            short_body: false,
            omit_length: false,
            delay: None,
        }
    }
}

struct ServerState {
    body: Vec<u8>,
    options: ServerOptions,
    ranged_gets: AtomicUsize,
    plain_gets: AtomicUsize,
}

pub struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(body: Vec<u8>, options: ServerOptions) -> Self {
        let state = Arc::new(ServerState {
            body,
            options,
            ranged_gets: AtomicUsize::new(0),
            plain_gets: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/file.bin", get(serve_file))
            .with_state(Arc::clone(&state));
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}/file.bin", self.addr)).unwrap()
    }

    /// Ranged GETs received, including ones answered with an error.
    pub fn ranged_gets(&self) -> usize {
        self.state.ranged_gets.load(Ordering::SeqCst)
    }

    pub fn plain_gets(&self) -> usize {
        self.state.plain_gets.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Deterministic, non-repeating-looking payload.
pub fn sample_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + 7) % 251) as u8).collect()
}

fn parse_range(value: &str) -> Option<(u64, u64)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

fn respond(
    status: StatusCode,
    data: Vec<u8>,
    content_range: Option<String>,
    omit_length: bool,
) -> Response {
    let mut builder = axum::http::Response::builder().status(status);
    if let Some(content_range) = content_range {
        builder = builder.header(CONTENT_RANGE, content_range);
    }
    let body = if omit_length {
        Body::from_stream(futures::stream::iter(vec![Ok::<_, io::Error>(data)]))
    } else {
        builder = builder.header(CONTENT_LENGTH, data.len());
        Body::from(data)
    };
    builder.body(body).unwrap()
}

async fn serve_file(
    State(state): State<Arc<ServerState>>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    let options = &state.options;
    let is_get = method == Method::GET;
    let total = state.body.len() as u64;
    let requested = headers
        .get(RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_range);

    match requested {
        Some((start, end)) if options.ranges => {
            if is_get {
                state.ranged_gets.fetch_add(1, Ordering::SeqCst);
                if let Some(&(_, wait)) = options.fail_ranges.iter().find(|(s, _)| *s == start) {
                    tokio::time::sleep(wait).await;
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
                if let Some(delay) = options.delay {
                    tokio::time::sleep(delay).await;
                }
            }
            if start >= total || end < start {
                return StatusCode::RANGE_NOT_SATISFIABLE.into_response();
            }
            let end = end.min(total - 1);
            let mut data = state.body[start as usize..=end as usize].to_vec();
            if is_get && options.short_body {
                data.pop();
            }
            respond(
                StatusCode::PARTIAL_CONTENT,
                data,
                Some(format!("bytes {}-{}/{}", start, end, total)),
                options.omit_length,
            )
        }
        _ => {
            if is_get {
                state.plain_gets.fetch_add(1, Ordering::SeqCst);
                if let Some(status) = options.plain_status {
                    return status.into_response();
                }
            }
            respond(
                StatusCode::OK,
                state.body.clone(),
                None,
                options.omit_length,
            )
        }
    }
}

/// Growable in-memory sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    data: Mutex<Vec<u8>>,
}

impl MemorySink {
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl Sink for MemorySink {
    fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<()> {
        let mut data = self.data.lock().unwrap();
        let offset = offset as usize;
        let end = offset + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset..end].copy_from_slice(buf);
        Ok(())
    }

    fn finish(&self) -> io::Result<()> {
        Ok(())
    }
}
