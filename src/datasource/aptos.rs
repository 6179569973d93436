//! Aptos fullnode REST client for the transaction listing.

use super::transaction::parse_transactions_page;
use super::{DataSourceError, LedgerSource, TransactionPage};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout of the upstream HTTP client.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Ledger source backed by a fullnode's `/transactions` endpoint.
#[derive(Debug, Clone)]
pub struct AptosLedgerSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AptosLedgerSource {
    /// Create a client for `base_url` (e.g. `http://localhost:8080/v1`).
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DataSourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataSourceError::Other(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    fn transactions_url(&self) -> String {
        format!("{}/transactions", self.base_url)
    }
}

#[async_trait]
impl LedgerSource for AptosLedgerSource {
    async fn fetch_transactions(
        &self,
        start_version: u64,
        limit: u64,
    ) -> Result<TransactionPage, DataSourceError> {
        debug!(start_version, limit, "Fetching transactions");

        let mut request = self
            .client
            .get(self.transactions_url())
            .query(&[("start", start_version), ("limit", limit)]);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DataSourceError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DataSourceError::HttpError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DataSourceError::NetworkError(e.to_string()))?;

        parse_transactions_page(&body)
    }
}
