// ABOUTME: Blocking HTTP client for the Notion API
// ABOUTME: Handles pagination, rate-limit pacing, retries, and status mapping

use crate::cancel::CancelToken;
use crate::model::{ListResponse, RawBlock, RawPage};
use crate::ratelimit::TokenBucket;
use crate::util::truncate_str;
use crate::{Error, Result};
use backoff::ExponentialBackoff;
use reqwest::blocking::Client;
use reqwest::header::RETRY_AFTER;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_API_BASE: &str = "https://api.notion.com";
pub const NOTION_VERSION: &str = "2022-06-28";

/// Everything the sync engine needs from the document workspace.
pub trait PageSource: Send + Sync {
    fn get_page(&self, page_id: &str) -> Result<RawPage>;

    /// All children of a block or page. Pagination is drained internally.
    fn list_children(&self, block_id: &str) -> Result<Vec<RawBlock>>;

    /// Fetch a binary asset, usually from a short-lived signed URL.
    fn download(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(30),
        }
    }
}

enum Failure {
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },
    Fatal(Error),
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
    limiter: Option<Arc<TokenBucket>>,
    retry: RetryPolicy,
    cancel: CancelToken,
}

impl ApiClient {
    pub fn new(token: String, base_url: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(ApiClient {
            client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_API_BASE.into())
                .trim_end_matches('/')
                .to_string(),
            token,
            limiter: Some(Arc::new(TokenBucket::new(3.0, 3))),
            retry: RetryPolicy::default(),
            cancel: CancelToken::new(),
        })
    }

    pub fn with_rate_limit(mut self, per_second: f64, burst: u32) -> Self {
        self.limiter = Some(Arc::new(TokenBucket::new(per_second, burst)));
        self
    }

    pub fn disable_throttle(mut self) -> Self {
        self.limiter = None;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        subject: &str,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut attempts = 0u32;

        let policy = ExponentialBackoff {
            current_interval: self.retry.initial_interval,
            initial_interval: self.retry.initial_interval,
            max_interval: self.retry.max_interval,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };

        let result = backoff::retry(policy, || {
            attempts += 1;
            self.cancel.check().map_err(backoff::Error::permanent)?;
            if let Some(limiter) = &self.limiter {
                limiter.acquire();
            }
            debug!(endpoint, attempt = attempts, "GET");

            match self.send_once(&url, endpoint, query, subject) {
                Ok(value) => Ok(value),
                Err(Failure::Fatal(e)) => Err(backoff::Error::permanent(e)),
                Err(Failure::Transient {
                    message,
                    retry_after,
                }) => {
                    let err = Error::Transient {
                        page_id: subject.to_string(),
                        attempts,
                        message,
                    };
                    if attempts >= self.retry.max_attempts {
                        return Err(backoff::Error::permanent(err));
                    }
                    debug!(endpoint, attempt = attempts, error = %err, "retrying");
                    Err(match retry_after {
                        Some(wait) => backoff::Error::retry_after(err, wait),
                        None => backoff::Error::transient(err),
                    })
                }
            }
        });

        result.map_err(|e| match e {
            backoff::Error::Permanent(err) => err,
            backoff::Error::Transient { err, .. } => err,
        })
    }

    fn send_once<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        endpoint: &str,
        query: &[(&str, String)],
        subject: &str,
    ) -> std::result::Result<T, Failure> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Notion-Version", NOTION_VERSION)
            .header("Accept", "application/json")
            .header("User-Agent", "notion-mirror/0.1 (Rust)")
            .send();

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_builder() => return Err(Failure::Fatal(Error::Network(e))),
            Err(e) => {
                return Err(Failure::Transient {
                    message: e.to_string(),
                    retry_after: None,
                })
            }
        };

        let status = response.status();
        if status.is_success() {
            let body = response.text().map_err(|e| Failure::Transient {
                message: e.to_string(),
                retry_after: None,
            })?;
            return serde_json::from_str(&body).map_err(|e| {
                error!(
                    endpoint,
                    body = %truncate_str(&body, 500),
                    "failed to parse response: {}", e
                );
                Failure::Fatal(Error::Parse(e))
            });
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let message = truncate_str(&response.text().unwrap_or_default(), 100);

        Err(match status.as_u16() {
            401 => Failure::Fatal(Error::Auth(format!(
                "integration token rejected on {}: {}",
                endpoint, message
            ))),
            403 | 404 => Failure::Fatal(Error::NotFound {
                page_id: subject.to_string(),
                status: status.as_u16(),
            }),
            429 | 500..=599 => Failure::Transient {
                message: format!("HTTP {}: {}", status.as_u16(), message),
                retry_after,
            },
            code => Failure::Fatal(Error::Api {
                endpoint: endpoint.into(),
                status: code,
                message,
            }),
        })
    }
}

impl PageSource for ApiClient {
    fn get_page(&self, page_id: &str) -> Result<RawPage> {
        self.get(&format!("/v1/pages/{}", page_id), &[], page_id)
    }

    fn list_children(&self, block_id: &str) -> Result<Vec<RawBlock>> {
        let endpoint = format!("/v1/blocks/{}/children", block_id);
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("page_size", "100".to_string())];
            if let Some(c) = &cursor {
                query.push(("start_cursor", c.clone()));
            }

            let page: ListResponse<RawBlock> = self.get(&endpoint, &query, block_id)?;
            blocks.extend(page.results);

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(blocks)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        self.cancel.check()?;
        // signed file URLs reject extra Authorization headers
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                endpoint: truncate_str(url.split('?').next().unwrap_or(url), 100),
                status: status.as_u16(),
                message: "download failed".into(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}
