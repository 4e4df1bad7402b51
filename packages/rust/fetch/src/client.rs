//! Configured HTTP client.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, LAST_MODIFIED};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use siphon_shared::{FetchConfig, Result, SiphonError};

use crate::guard::is_ssrf_target;

/// User-Agent string for outgoing requests.
pub const USER_AGENT: &str = concat!("Siphon/", env!("CARGO_PKG_VERSION"));

/// A successfully fetched HTTP response.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after following redirects.
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub last_modified: Option<String>,
    pub body: String,
}

impl FetchedPage {
    /// Whether the response declares an HTML body (or declares nothing).
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_none_or(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
    }
}

/// HTTP client with the user agent, redirect limit, timeout and SSRF policy applied.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    allow_private: bool,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let max_redirects = config.max_redirects;
        let allow_private = config.allow_private_hosts;

        let redirects = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= max_redirects {
                attempt.error(format!("too many redirects (limit {max_redirects})"))
            } else if !allow_private && is_ssrf_target(attempt.url()) {
                let msg = format!("redirect to blocked host {}", attempt.url());
                attempt.error(msg)
            } else {
                attempt.follow()
            }
        });

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirects)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SiphonError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            allow_private,
        })
    }

    /// GET `url`; non-2xx statuses are errors.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        if !self.allow_private && is_ssrf_target(url) {
            warn!("SSRF protection: blocked");
            return Err(SiphonError::Network(format!(
                "{url}: blocked private or non-http host"
            )));
        }

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| SiphonError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SiphonError::Network(format!("{url}: HTTP {status}")));
        }

        let header = |name| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(CONTENT_TYPE);
        let last_modified = header(LAST_MODIFIED);
        let final_url = response.url().clone();

        let body = response
            .text()
            .await
            .map_err(|e| SiphonError::Network(format!("{url}: body read failed: {e}")))?;

        debug!(
            status = status.as_u16(),
            %final_url,
            body_len = body.len(),
            "fetched"
        );

        Ok(FetchedPage {
            final_url,
            status: status.as_u16(),
            content_type,
            last_modified,
            body,
        })
    }

    /// GET `url` and decode the body as JSON.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let page = self.fetch(url).await?;
        serde_json::from_str(&page.body)
            .map_err(|e| SiphonError::Conversion(format!("{url}: invalid JSON: {e}")))
    }
}
