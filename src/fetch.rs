//! HTTP collaborator wrapper.
//!
//! One shared [`reqwest::Client`] is built per run with a fixed timeout and
//! the default redirect-following policy. Every request resolves to either a
//! value or a [`FetchError`] naming the transient failure; callers match on
//! the result and degrade instead of propagating. No retries happen inside a
//! run; the next scheduled invocation is the retry mechanism.

use reqwest::Client;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Per-request timeout. A hung request is bounded solely by this.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

const USER_AGENT: &str = concat!("lokalnytt/", env!("CARGO_PKG_VERSION"));

/// A completed HTTP exchange for a text resource.
///
/// The body is surfaced regardless of status code: article pages behind soft
/// errors still carry usable metadata, and the extractor decides what to use.
#[derive(Debug)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
    /// Response headers, preserved for the proof artifact.
    pub headers: BTreeMap<String, String>,
}

/// Why a request produced no usable response. Always recovered locally.
#[derive(Debug)]
pub enum FetchError {
    /// Connection failure, timeout, or other transport-level error.
    Transport(reqwest::Error),
    /// The exchange completed but the body could not be read.
    Body(reqwest::Error),
    /// Non-success status on a request that requires one (binary fetches).
    Status(u16),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(e) => write!(f, "transport error: {e}"),
            FetchError::Body(e) => write!(f, "body read error: {e}"),
            FetchError::Status(code) => write!(f, "unexpected status {code}"),
        }
    }
}

/// Build the shared client used for every request in a run.
pub fn build_client() -> Client {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Fetch a text resource (feed document or article page).
#[instrument(level = "debug", skip(client))]
pub async fn fetch_text(client: &Client, url: &str) -> Result<PageResponse, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(FetchError::Transport)?;
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    let body = response.text().await.map_err(FetchError::Body)?;
    debug!(status, bytes = body.len(), "Fetched text resource");
    Ok(PageResponse {
        status,
        body,
        headers,
    })
}

/// Fetch a binary resource (feed bytes or image). Unlike [`fetch_text`],
/// only a successful status with a non-empty body counts.
#[instrument(level = "debug", skip(client))]
pub async fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(FetchError::Transport)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    let bytes = response.bytes().await.map_err(FetchError::Body)?;
    if bytes.is_empty() {
        return Err(FetchError::Status(status.as_u16()));
    }
    debug!(bytes = bytes.len(), "Fetched binary resource");
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let e = FetchError::Status(404);
        assert_eq!(e.to_string(), "unexpected status 404");
    }

    #[test]
    fn test_user_agent_carries_version() {
        assert!(USER_AGENT.starts_with("lokalnytt/"));
    }
}
