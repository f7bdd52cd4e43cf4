use std::fmt;

use crate::config::DownloaderConfig;
use crate::downloader::probe::Capabilities;

/// Inclusive byte range `start..=end` of the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(end >= start, "empty byte range {}-{}", start, end);
        ByteRange { start, end }
    }

    /// Range covering a whole resource of `total_size` bytes.
    pub fn whole(total_size: u64) -> Option<Self> {
        (total_size > 0).then(|| ByteRange::new(0, total_size - 1))
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Range` request header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Split `[0, total_size)` into at most `concurrency` contiguous ranges.
///
/// Every range but the last is `total_size / concurrency` bytes long; the last
/// one absorbs the remainder. When there are fewer bytes than workers the
/// whole resource becomes a single range.
pub fn plan(total_size: u64, concurrency: usize) -> Vec<ByteRange> {
    let concurrency = concurrency.max(1) as u64;
    let Some(whole) = ByteRange::whole(total_size) else {
        return Vec::new();
    };

    let chunk_size = total_size / concurrency;
    if chunk_size == 0 {
        return vec![whole];
    }

    let mut ranges = Vec::with_capacity(concurrency.min(total_size) as usize);
    let mut start = 0u64;
    for i in 0..concurrency {
        let end = if i == concurrency - 1 {
            whole.end
        } else {
            start + chunk_size - 1
        };
        ranges.push(ByteRange::new(start, end));

        start = end + 1;
        if start >= total_size {
            break;
        }
    }
    ranges
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One ranged GET per planned range, expecting 206.
    Chunked,
    /// One unranged GET for the whole resource, expecting 200.
    SingleConnection,
}

/// How a single download will be carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    pub strategy: Strategy,
    pub total_size: Option<u64>,
    pub range_supported: bool,
    pub ranges: Vec<ByteRange>,
    /// Chunk tasks allowed to run at once, within `1..=ranges.len()`.
    pub workers: usize,
}

impl DownloadPlan {
    pub fn new(capabilities: &Capabilities, config: &DownloaderConfig) -> Self {
        match capabilities.content_length {
            Some(total_size)
                if total_size > 0
                    && capabilities.accepts_ranges
                    && total_size >= config.single_connection_threshold =>
            {
                let ranges = plan(total_size, config.concurrency);
                let workers = config
                    .max_workers
                    .unwrap_or(config.concurrency)
                    .clamp(1, ranges.len().max(1));
                DownloadPlan {
                    strategy: Strategy::Chunked,
                    total_size: Some(total_size),
                    range_supported: true,
                    ranges,
                    workers,
                }
            }
            _ => Self::single(capabilities.content_length, capabilities.accepts_ranges),
        }
    }

    /// One unranged transfer covering the whole resource.
    pub fn single(total_size: Option<u64>, range_supported: bool) -> Self {
        DownloadPlan {
            strategy: Strategy::SingleConnection,
            total_size,
            range_supported,
            ranges: total_size.and_then(ByteRange::whole).into_iter().collect(),
            workers: 1,
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.strategy == Strategy::Chunked
    }
}
