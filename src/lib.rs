//! # fastget
//!
//! `fastget` downloads a file over HTTP(S) by splitting it into byte ranges
//! and fetching the ranges concurrently:
//! - A HEAD probe decides whether the server honours `Range` requests
//! - The resource is cut into one contiguous chunk per worker
//! - Every worker writes its chunk straight into the shared output file at
//!   its own offsets
//! - The first failing worker cancels the others
//!
//! ## Example Usage
//!
//! ```no_run
//! use fastget::{DownloadConfig, FastGetter};
//!
//! # async fn run() -> Result<(), fastget::DownloadError> {
//! let config = DownloadConfig::new("https://example.com/big.iso")?.workers(4);
//! let result = FastGetter::new(config).get().await?;
//! println!("{} bytes in {:?}", result.size, result.elapsed);
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod client;
pub mod config;
pub mod downloader;
pub mod error;
pub mod observer;
pub mod utils;
pub mod worker;

pub use chunk::{Chunk, ChunkPlan, calculate_chunks};
pub use downloader::{DownloadConfig, DownloadResult, FastGetter};
pub use error::DownloadError;
pub use observer::{ConsoleSink, EventSink, NoopSink};
pub use worker::{WriteAt, download_chunk};
