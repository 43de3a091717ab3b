//! Command-line binary entrypoint for `fastget`.
//!
//! Parses arguments, merges them with the user's settings file, renders
//! per-worker progress bars and reports the result of the download.
mod args;
mod version;

use anyhow::{Context, Result};
use args::Args;
use clap::{CommandFactory, Parser};
use fastget::config::Settings;
use fastget::downloader::DEFAULT_WORKERS;
use fastget::{ConsoleSink, DownloadConfig, FastGetter, utils};
use indicatif::{HumanDuration, MultiProgress};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use version::BuildInfo;

fn init_logging(debug: bool) {
    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();
}

/// Decides where the download is written.
///
/// An explicit output naming an existing directory receives the URL's file
/// name, any other explicit output is used verbatim.
fn resolve_output(url: &str, output: Option<PathBuf>, default_dir: Option<&str>) -> PathBuf {
    let filename = utils::get_filename_from_url(url);
    match output {
        Some(path) if path.is_dir() => path.join(filename),
        Some(path) => path,
        None => Path::new(default_dir.unwrap_or(".")).join(filename),
    }
}

fn build_client(settings: &Settings, build: BuildInfo) -> Result<reqwest::Client> {
    let user_agent = settings
        .user_agent
        .clone()
        .unwrap_or_else(|| format!("fastget/{}", build.version));

    let mut builder = reqwest::Client::builder().user_agent(user_agent);
    if let Some(secs) = settings.connect_timeout_secs {
        builder = builder.connect_timeout(Duration::from_secs(secs));
    }

    builder.build().context("Failed to build HTTP client")
}

async fn run(url: String, args: Args, build: BuildInfo) -> Result<()> {
    let settings = Settings::load().unwrap_or_else(|e| {
        warn!("{:#}; using default settings", e);
        Settings::default()
    });

    let workers = args.workers.or(settings.workers).unwrap_or(DEFAULT_WORKERS);
    let output = resolve_output(&url, args.output, settings.default_dir.as_deref());

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut config = DownloadConfig::new(url)?.workers(workers).output(&output);
    for (name, value) in &settings.headers {
        config = config.header(name, value);
    }
    for line in &args.headers {
        let (name, value) = utils::parse_header(line)?;
        config = config.header(name, value);
    }
    debug!(?config, "starting download");

    let client = build_client(&settings, build)?;
    let multi_progress = MultiProgress::new();
    let getter = FastGetter::with_client(config, client)
        .with_sink(Arc::new(ConsoleSink::new(multi_progress.clone())));

    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = multi_progress.println("Received Ctrl+C, stopping download...");
            signal_token.cancel();
        }
    });

    let result = getter.get_with_cancel(cancel_token).await?;

    let path = std::fs::canonicalize(&result.output_path).unwrap_or(result.output_path);
    let elapsed = Duration::from_secs(result.elapsed.as_secs_f64().round() as u64);
    println!(
        "Download finished in {}. File: {}",
        HumanDuration(elapsed),
        path.display()
    );

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    let build = BuildInfo::current();
    if args.version {
        println!("{}", build);
        return ExitCode::SUCCESS;
    }

    let Some(url) = args.url.clone() else {
        let _ = Args::command().print_help();
        return ExitCode::SUCCESS;
    };

    match run(url, args, build).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
