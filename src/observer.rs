//! Progress notifications emitted by the engine.
//!
//! Every callback runs synchronously on the worker that triggers it, so
//! implementations should return quickly and must be shareable between
//! workers.
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;

/// Receives download events. All methods default to doing nothing.
pub trait EventSink: Send + Sync {
    /// Called once, after planning and before any worker starts.
    fn on_before_start(&self, _total_length: u64, _chunk_length: u64) {}

    /// Called by a worker before it issues its request.
    fn on_start(&self, _worker_id: usize, _chunk_length: u64) {}

    /// Called after every write with the worker's cumulative byte count.
    fn on_progress(&self, _worker_id: usize, _written: u64) {}

    /// Called exactly once per worker, after its chunk is complete.
    fn on_finish(&self, _worker_id: usize) {}
}

/// Sink for callers that do not care about progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {}

/// Renders one progress bar per worker.
pub struct ConsoleSink {
    multi: MultiProgress,
    style: ProgressStyle,
    bars: Mutex<HashMap<usize, ProgressBar>>,
}

impl ConsoleSink {
    pub fn new(multi: MultiProgress) -> Self {
        let style = ProgressStyle::with_template(
            "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} ({eta})",
        )
        .map(|style| style.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());

        Self {
            multi,
            style,
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bar(&self, worker_id: usize) -> Option<ProgressBar> {
        let bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        bars.get(&worker_id).cloned()
    }
}

impl EventSink for ConsoleSink {
    fn on_before_start(&self, total_length: u64, chunk_length: u64) {
        let _ = self.multi.println(format!(
            "Download started: {} in chunks of {}",
            HumanBytes(total_length),
            HumanBytes(chunk_length)
        ));
    }

    fn on_start(&self, worker_id: usize, chunk_length: u64) {
        let pb = self.multi.add(ProgressBar::new(chunk_length));
        pb.set_style(self.style.clone());
        pb.set_message(format!("Part {}", worker_id));

        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        bars.insert(worker_id, pb);
    }

    fn on_progress(&self, worker_id: usize, written: u64) {
        if let Some(pb) = self.bar(worker_id) {
            pb.set_position(written);
        }
    }

    fn on_finish(&self, worker_id: usize) {
        if let Some(pb) = self.bar(worker_id) {
            pb.finish_with_message(format!("Part {} done", worker_id));
        }
    }
}
