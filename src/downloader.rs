//! The download engine: probe, plan, fan out one worker per chunk, join.
use crate::chunk::{self, Chunk};
use crate::client::RangeClient;
use crate::error::{DownloadError, Result};
use crate::observer::{EventSink, NoopSink};
use crate::utils;
use crate::worker::{self, WriteAt};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_WORKERS: usize = 3;

/// What to download and where to put it.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub url: String,
    /// Desired concurrency. Forced to 1 when the server cannot serve ranges.
    pub workers: usize,
    pub output: PathBuf,
    /// Added to every request, probe included.
    pub headers: HashMap<String, String>,
}

impl DownloadConfig {
    /// Creates a config with the default worker count, writing to the URL's
    /// file name in the current directory.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(DownloadError::InvalidUrl {
                url,
                reason: "url is empty".to_string(),
            });
        }
        if let Err(e) = Url::parse(&url) {
            return Err(DownloadError::InvalidUrl {
                reason: e.to_string(),
                url,
            });
        }

        let output = PathBuf::from(utils::get_filename_from_url(&url));
        Ok(Self {
            url,
            workers: DEFAULT_WORKERS,
            output,
            headers: HashMap::new(),
        })
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Outcome of a successful download.
#[derive(Debug)]
pub struct DownloadResult {
    pub url: String,
    pub size: u64,
    /// The fully written output. Nothing writes to it once it is returned.
    pub output_file: File,
    pub output_path: PathBuf,
    /// Time spent fetching, from dispatch of the first worker.
    pub elapsed: Duration,
}

pub struct FastGetter {
    config: DownloadConfig,
    client: RangeClient,
    sink: Arc<dyn EventSink>,
}

impl FastGetter {
    pub fn new(config: DownloadConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Uses `client` for every request, e.g. one with a timeout or user agent.
    pub fn with_client(config: DownloadConfig, client: reqwest::Client) -> Self {
        let client = RangeClient::new(client, config.url.clone(), config.headers.clone());
        Self {
            config,
            client,
            sink: Arc::new(NoopSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    pub async fn get(&self) -> Result<DownloadResult> {
        self.get_with_cancel(CancellationToken::new()).await
    }

    /// Runs the download until it completes, fails, or `cancel` fires.
    ///
    /// Cancelling `cancel` stops every worker at its next checkpoint. Failures
    /// inside the run only cancel a child token, never `cancel` itself.
    pub async fn get_with_cancel(&self, cancel: CancellationToken) -> Result<DownloadResult> {
        let probe = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            probe = self.client.probe() => probe?,
        };

        let mut workers = self.config.workers;
        if !probe.range_supported {
            warn!(url = %self.config.url, "server does not accept byte ranges, downloading with a single worker");
            workers = 1;
        }

        let plan = chunk::calculate_chunks(probe.total_length, workers)?;
        debug!(
            total = plan.total_length,
            chunk_length = plan.chunk_length,
            workers = plan.chunks.len(),
            "planned download"
        );

        self.sink.on_before_start(plan.total_length, plan.chunk_length);

        let output = Arc::new(open_output(&self.config.output, plan.total_length)?);

        let started = Instant::now();
        run_workers(
            &self.client,
            &plan.chunks,
            Arc::clone(&output),
            Arc::clone(&self.sink),
            cancel.child_token(),
        )
        .await?;
        let elapsed = started.elapsed();

        // Every worker has been joined, so this is the last reference.
        let output_file = Arc::try_unwrap(output).or_else(|shared| shared.try_clone())?;

        info!(url = %self.config.url, size = plan.total_length, ?elapsed, "download finished");

        Ok(DownloadResult {
            url: self.config.url.clone(),
            size: plan.total_length,
            output_file,
            output_path: self.config.output.clone(),
            elapsed,
        })
    }
}

fn open_output(path: &Path, total_length: u64) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    // Also drops any tail left over from an older, longer file.
    file.set_len(total_length)?;
    Ok(file)
}

/// Spawns one task per chunk and waits for all of them.
///
/// The first error cancels `cancel` so that siblings stop early; it is the
/// only error returned.
pub(crate) async fn run_workers<W>(
    client: &RangeClient,
    chunks: &[Chunk],
    output: Arc<W>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: WriteAt + 'static,
{
    let mut tasks = JoinSet::new();

    for &chunk in chunks {
        let client = client.clone();
        let output = Arc::clone(&output);
        let sink = Arc::clone(&sink);
        let cancel = cancel.clone();

        tasks.spawn(async move {
            worker::download_chunk(&client, chunk, output.as_ref(), sink.as_ref(), &cancel).await
        });
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let Err(err) = joined.map_err(DownloadError::from).and_then(|res| res) else {
            continue;
        };

        if first_error.is_none() {
            cancel.cancel();
            first_error = Some(err);
        } else {
            debug!(error = %err, "discarding error from sibling worker");
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
