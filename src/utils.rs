//! Utility helpers used across the crate.
//!
//! Filename extraction for default output paths and header parsing for
//! user supplied request headers.
use anyhow::{Result, anyhow};
use percent_encoding::percent_decode_str;
use sanitize_filename::sanitize;
use url::Url;

/// Default output name for `url`: its final path segment, percent-decoded
/// and stripped of characters the filesystem would reject.
///
/// URLs that fail to parse, or whose path ends in `/`, yield `output.bin`.
pub fn get_filename_from_url(url: &str) -> String {
    const FALLBACK: &str = "output.bin";

    let Ok(parsed) = Url::parse(url) else {
        return FALLBACK.to_string();
    };
    let last = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    let name = sanitize(percent_decode_str(last).decode_utf8_lossy());
    if name.is_empty() {
        FALLBACK.to_string()
    } else {
        name
    }
}

/// Splits a `Name: value` header line into its name and value.
pub fn parse_header(line: &str) -> Result<(String, String)> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| anyhow!("header {:?} is not in `Name: value` form", line))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("header {:?} has an empty name", line));
    }

    Ok((name.to_string(), value.trim().to_string()))
}
