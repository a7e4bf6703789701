use std::time::Duration;

use lexwatch_core::error::AppError;
use lexwatch_core::traits::DocumentFetcher;
use reqwest::header::{CONTENT_LENGTH, HeaderMap, RANGE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use url::Url;

const DEFAULT_USER_AGENT: &str = "lexwatch/0.3 (consolidated text monitor)";

/// HTTP fetcher using reqwest.
///
/// Implements the three access patterns of the staged check: HEAD for the
/// content length, a ranged GET for a bounded prefix, and a plain GET for the
/// whole body. Every request carries the deadline passed by the caller.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self { client })
    }

    async fn send(
        &self,
        request: RequestBuilder,
        url: &str,
        timeout: Duration,
    ) -> Result<Response, AppError> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }
        Ok(response)
    }
}

impl DocumentFetcher for ReqwestFetcher {
    async fn head(&self, url: &str, timeout: Duration) -> Result<u64, AppError> {
        validate_url(url)?;
        let response = self.send(self.client.head(url), url, timeout).await?;

        // `Response::content_length` reflects the (empty) HEAD body, so read
        // the header itself.
        content_length(response.headers()).ok_or_else(|| {
            AppError::HttpError(format!("No usable Content-Length in HEAD response for {url}"))
        })
    }

    async fn fetch_prefix(
        &self,
        url: &str,
        max_bytes: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, AppError> {
        validate_url(url)?;
        if max_bytes == 0 {
            return Ok(Vec::new());
        }

        let request = self
            .client
            .get(url)
            .header(RANGE, format!("bytes=0-{}", max_bytes - 1));
        let mut response = self.send(request, url, timeout).await?;
        if response.status() == StatusCode::OK {
            tracing::debug!(%url, "Range ignored, truncating full response");
        }

        // Stop reading once the window is full.
        let mut prefix = Vec::with_capacity(max_bytes);
        while prefix.len() < max_bytes {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| map_reqwest_error(e, timeout))?;
            let Some(chunk) = chunk else {
                break;
            };
            let room = max_bytes - prefix.len();
            prefix.extend_from_slice(&chunk[..chunk.len().min(room)]);
        }
        Ok(prefix)
    }

    async fn fetch_full(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, AppError> {
        validate_url(url)?;
        let response = self.send(self.client.get(url), url, timeout).await?;

        response
            .bytes()
            .await
            .map(|body| body.to_vec())
            .map_err(|e| map_reqwest_error(e, timeout))
    }
}

fn map_reqwest_error(e: reqwest::Error, timeout: Duration) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout)
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {e}"))
    } else {
        AppError::HttpError(e.to_string())
    }
}

/// Parse the `Content-Length` header, if present and numeric.
fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Only absolute `http`/`https` URLs are fetched.
fn validate_url(url: &str) -> Result<(), AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(AppError::HttpError(format!(
            "URL scheme '{scheme}' is not allowed (only http/https)"
        ))),
    }
}
