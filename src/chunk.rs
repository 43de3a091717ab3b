//! Partitioning of a resource into per-worker byte ranges.
//!
//! The engine hands one file handle to every worker and lets each of them
//! write without a lock. That is only sound because the chunks produced here
//! never overlap: any change that lets two chunks share a byte turns the
//! shared positional writes into a data race.
use crate::error::{DownloadError, Result};

/// A specific range of bytes within the resource, owned by a single worker.
///
/// The range is half-open: `start` is the first byte of the chunk and `end`
/// is the first byte of the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based id of the worker, used to correlate every event.
    pub worker_id: usize,
    /// The starting byte index (0-based).
    pub start: u64,
    /// One past the last byte of the chunk.
    pub end: u64,
}

impl Chunk {
    /// Number of bytes in this chunk.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The value of the `Range` header for this chunk.
    ///
    /// HTTP ranges are inclusive on both ends, hence `end - 1`.
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end.saturating_sub(1))
    }
}

/// The full set of chunks for one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    pub total_length: u64,
    /// Length of every chunk but the last, which absorbs the remainder.
    pub chunk_length: u64,
    pub chunks: Vec<Chunk>,
}

/// Divides `total_length` bytes into `workers` contiguous chunks.
///
/// The last chunk expands to cover the division remainder. When there are
/// more workers than bytes, the worker count is reduced so that no chunk is
/// empty.
///
/// # Errors
///
/// Returns [`DownloadError::Planning`] when there is nothing to download or
/// no worker to download it with.
pub fn calculate_chunks(total_length: u64, workers: usize) -> Result<ChunkPlan> {
    if total_length == 0 {
        return Err(DownloadError::Planning(
            "server did not report a usable content length".to_string(),
        ));
    }
    if workers == 0 {
        return Err(DownloadError::Planning(
            "at least one worker is required".to_string(),
        ));
    }

    let workers = (workers as u64).min(total_length);
    let chunk_length = total_length / workers;

    let chunks = (0..workers)
        .map(|i| {
            let start = i * chunk_length;
            let end = if i == workers - 1 {
                total_length
            } else {
                start + chunk_length
            };
            Chunk {
                worker_id: i as usize + 1,
                start,
                end,
            }
        })
        .collect();

    Ok(ChunkPlan {
        total_length,
        chunk_length,
        chunks,
    })
}
