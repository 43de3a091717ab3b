use crate::chunk::Chunk;
use crate::client::RangeClient;
use crate::error::{DownloadError, Result};
use crate::observer::EventSink;
use reqwest::StatusCode;
use std::io;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Largest slice handed to a single positional write.
pub const WRITE_BUFFER_SIZE: usize = 1024 * 1024;

/// A sink that accepts writes at explicit offsets.
///
/// No cursor is shared between callers, so several workers may write through
/// the same value as long as they address disjoint ranges.
pub trait WriteAt: Send + Sync {
    /// Writes `buf` at `offset`, returning how many bytes were accepted.
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize>;
}

#[cfg(not(any(unix, windows)))]
compile_error!("positional file writes are only implemented for unix and windows targets");

#[cfg(any(unix, windows))]
impl WriteAt for std::fs::File {
    #[cfg(unix)]
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::write_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn write_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_write(self, buf, offset)
    }
}

/// Downloads a single chunk into `output`, returning the bytes written.
///
/// The body is written in increments of at most [`WRITE_BUFFER_SIZE`] at the
/// chunk's own offsets. `cancel` is checked before the request, while waiting
/// for every body increment and before every write.
pub async fn download_chunk<W>(
    client: &RangeClient,
    chunk: Chunk,
    output: &W,
    sink: &dyn EventSink,
    cancel: &CancellationToken,
) -> Result<u64>
where
    W: WriteAt + ?Sized,
{
    let worker_id = chunk.worker_id;
    sink.on_start(worker_id, chunk.len());

    let mut response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
        response = client.fetch_range(&chunk) => response?,
    };

    if response.status != StatusCode::PARTIAL_CONTENT {
        return Err(DownloadError::ServerContract {
            worker_id,
            status: response.status,
        });
    }

    // Anything but the exact chunk would leave a gap or spill into a
    // sibling's range.
    let expected = chunk.len();
    if let Some(declared) = response.declared_length
        && declared != expected
    {
        return Err(DownloadError::RangeMismatch {
            worker_id,
            expected,
            actual: declared,
        });
    }

    let mut offset = chunk.start;
    let mut written: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            next = response.next_bytes() => next,
        };

        let bytes = match next {
            Ok(Some(bytes)) => bytes,
            Ok(None) => break,
            // The connection dropped before the body was complete. reqwest
            // may report this as a decode error of the body stream.
            Err(e) if (e.is_body() || e.is_decode()) && written < expected => {
                debug!(worker_id, error = %e, "body ended early");
                return Err(DownloadError::TruncatedTransfer {
                    worker_id,
                    received: written,
                    declared: expected,
                });
            }
            Err(e) => return Err(e.into()),
        };

        for piece in bytes.chunks(WRITE_BUFFER_SIZE) {
            if cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            if written + piece.len() as u64 > expected {
                return Err(DownloadError::RangeMismatch {
                    worker_id,
                    expected,
                    actual: written + piece.len() as u64,
                });
            }

            let n = output.write_at(piece, offset)?;
            if n != piece.len() {
                return Err(DownloadError::ShortWrite {
                    worker_id,
                    written: n,
                    expected: piece.len(),
                });
            }

            offset += n as u64;
            written += n as u64;
            sink.on_progress(worker_id, written);
        }
    }

    if written != expected {
        return Err(DownloadError::TruncatedTransfer {
            worker_id,
            received: written,
            declared: expected,
        });
    }

    debug!(worker_id, written, "chunk complete");
    sink.on_finish(worker_id);
    Ok(written)
}
