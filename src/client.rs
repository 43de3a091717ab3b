//! The two HTTP requests a download needs: the HEAD probe and ranged GETs.
//!
//! Caller supplied headers decorate both kinds of request. The client keeps
//! no state of its own beyond the shared [`reqwest::Client`], so clones are
//! handed out freely to workers.
use crate::chunk::Chunk;
use crate::error::Result;
use bytes::Bytes;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, HeaderMap, RANGE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::collections::HashMap;

/// What the HEAD probe learned about the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    /// `Accept-Ranges: bytes` was present.
    pub range_supported: bool,
    /// Declared `Content-Length`, or 0 when the server did not send one.
    pub total_length: u64,
}

#[derive(Debug, Clone)]
pub struct RangeClient {
    client: Client,
    url: String,
    headers: HashMap<String, String>,
}

impl RangeClient {
    pub fn new(client: Client, url: impl Into<String>, headers: HashMap<String, String>) -> Self {
        Self {
            client,
            url: url.into(),
            headers,
        }
    }

    fn decorate(&self, mut request: RequestBuilder) -> RequestBuilder {
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        request
    }

    /// Issues a HEAD request to find out whether the resource can be split.
    ///
    /// The status code is not inspected: a server that answers the probe with
    /// an error will fail the ranged GETs instead.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Transport`](crate::DownloadError::Transport)
    /// if the request cannot be sent or no response arrives.
    pub async fn probe(&self) -> Result<Probe> {
        let response = self.decorate(self.client.head(&self.url)).send().await?;
        let headers = response.headers();

        let range_supported = headers
            .get(ACCEPT_RANGES)
            .is_some_and(|value| value.as_bytes() == b"bytes");

        Ok(Probe {
            range_supported,
            total_length: declared_length(headers).unwrap_or(0),
        })
    }

    /// Issues a GET for the bytes of `chunk`.
    ///
    /// The status code is returned as-is so that the fetcher can enforce it
    /// right before it starts consuming the body.
    pub async fn fetch_range(&self, chunk: &Chunk) -> Result<RangeResponse> {
        let response = self
            .decorate(self.client.get(&self.url))
            .header(RANGE, chunk.range_header())
            .send()
            .await?;

        Ok(RangeResponse {
            status: response.status(),
            declared_length: declared_length(response.headers()),
            response,
        })
    }
}

/// A ranged GET response whose body has not been read yet.
#[derive(Debug)]
pub struct RangeResponse {
    pub status: StatusCode,
    /// `Content-Length` of this response, if the server declared one.
    pub declared_length: Option<u64>,
    response: Response,
}

impl RangeResponse {
    /// Next increment of the body, `None` at end of stream.
    pub async fn next_bytes(&mut self) -> Result<Option<Bytes>, reqwest::Error> {
        self.response.chunk().await
    }
}

// `Response::content_length` reports the body size hint, which is zero for
// HEAD responses, so the header is read directly.
fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
