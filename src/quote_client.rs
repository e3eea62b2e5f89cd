use std::time::Duration;

use reqwest::Client;

use crate::domain::Quote;
use crate::helpers::error_chain_fmt;

#[derive(Clone)]
pub struct QuoteClient {
    http_client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(serde::Deserialize)]
struct ZenQuote {
    q: String,
    a: String,
}

#[derive(thiserror::Error)]
pub enum QuoteError {
    #[error("Quote API request timed out.")]
    Timeout(#[source] reqwest::Error),
    #[error("Quote API returned status {0}.")]
    Status(reqwest::StatusCode),
    #[error("Quote API returned an empty list.")]
    Empty,
    #[error("Quote API request failed.")]
    Request(#[source] reqwest::Error),
}

impl std::fmt::Debug for QuoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<reqwest::Error> for QuoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            QuoteError::Timeout(e)
        } else {
            QuoteError::Request(e)
        }
    }
}

impl QuoteClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            http_client: Client::new(),
            base_url,
            timeout,
        }
    }

    /// A fresh quote, or [`Quote::fallback`] on any failure. Never retried.
    #[tracing::instrument(name = "Fetching random quote", skip(self))]
    pub async fn fetch_quote(&self) -> Quote {
        match self.try_fetch_quote().await {
            Ok(quote) => {
                tracing::info!("Quote retrieved: {quote}");
                quote
            }
            Err(QuoteError::Status(status)) => {
                tracing::warn!("Quote API returned non-200 status: {status}");
                Self::fallback()
            }
            Err(e @ QuoteError::Timeout(_)) => {
                tracing::error!(
                    "Quote API request timed out after {} seconds",
                    self.timeout.as_secs()
                );
                tracing::debug!(error.cause_chain = ?e);
                Self::fallback()
            }
            Err(e) => {
                tracing::error!(error.cause_chain = ?e, "Error fetching quote");
                Self::fallback()
            }
        }
    }

    fn fallback() -> Quote {
        let quote = Quote::fallback();
        tracing::info!("Using fallback quote: {quote}");
        quote
    }

    pub async fn try_fetch_quote(&self) -> Result<Quote, QuoteError> {
        let url = format!("{}/api/random", self.base_url.trim_end_matches('/'));
        let response = self
            .http_client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(QuoteError::Status(status));
        }

        let quotes: Vec<ZenQuote> = response.json().await?;
        quotes
            .into_iter()
            .next()
            .map(|ZenQuote { q, a }| Quote::new(q, a))
            .ok_or(QuoteError::Empty)
    }
}
