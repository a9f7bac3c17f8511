//! # Finance API Client
//!
//! reqwest client for the Psiuu admin API.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET (read-only)                                                        │
//! │    send ──► handle_response ──► ok ──► schema::parse_*                 │
//! │                 │                                                       │
//! │                 └─ retryable? ──► ExponentialBackoff ──► send again     │
//! │                                   (until max_retry_secs elapsed)        │
//! │                                                                         │
//! │  POST (payout transitions)                                              │
//! │    send ──► handle_response ──► ok / error                             │
//! │    Never retried: a lost response may still have moved money.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::Utc;
use psiuu_core::{Agent, BankAccount, InfraChannel, InfraCost, Influencer, LedgerEntry, Payout, Sale};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiSettings;
use crate::error::{ApiError, ApiResult};
use crate::schema::{self, RejectBody};
use crate::source::{FinanceSource, PayoutGateway};

/// HTTP client for the finance endpoints.
#[derive(Debug, Clone)]
pub struct FinanceApiClient {
    client: Client,
    base_url: String,
    base: Url,
    token: Option<String>,
    timeout_secs: u64,
    max_retry: Duration,
}

impl FinanceApiClient {
    /// Builds a client from validated settings.
    pub fn new(settings: &ApiSettings) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        let base = Url::parse(&settings.base_url)?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            base,
            token: settings.token.clone(),
            timeout_secs: settings.timeout_secs,
            max_retry: Duration::from_secs(settings.max_retry_secs),
        })
    }

    /// Replaces the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `{base}/finance/payouts/{id}/{action}` with the id percent-encoded.
    fn payout_url(&self, payout_id: &str, action: &str) -> ApiResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(schema::payout_action_segments(payout_id, action));
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    fn map_send_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.timeout_secs)
        } else {
            ApiError::Http(err)
        }
    }

    /// Maps non-2xx statuses to errors and returns the body text.
    async fn handle_response(path: &str, response: reqwest::Response) -> ApiResult<String> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }
        match status {
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(path.to_string())),
            _ => Err(ApiError::Status {
                status: status.as_u16(),
                body,
            }),
        }
    }

    async fn get_once(&self, path: &str) -> ApiResult<String> {
        let request = self.authorize(self.client.get(self.url(path)));
        let response = request.send().await.map_err(|e| self.map_send_error(e))?;
        Self::handle_response(path, response).await
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(2),
            multiplier: 2.0,
            max_elapsed_time: Some(self.max_retry),
            ..Default::default()
        }
    }

    /// GET with retries on transient failures.
    async fn get(&self, path: &str) -> ApiResult<String> {
        let mut backoff = self.create_backoff();
        let mut attempt = 1u32;

        loop {
            match self.get_once(path).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && !self.max_retry.is_zero() => match backoff.next_backoff() {
                    Some(wait) => {
                        warn!(path, attempt, ?wait, error = %e, "GET failed, retrying");
                        tokio::time::sleep(wait).await;
                        attempt += 1;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// POST whose response body is ignored.
    async fn post_action<B: serde::Serialize + ?Sized>(
        &self,
        payout_id: &str,
        action: &str,
        body: Option<&B>,
    ) -> ApiResult<()> {
        let url = self.payout_url(payout_id, action)?;
        let path = url.path().to_string();
        let mut request = self.authorize(self.client.post(url));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| self.map_send_error(e))?;
        Self::handle_response(&path, response).await?;
        debug!(path = %path, "POST accepted");
        Ok(())
    }

    // ========== Messaging Stats ==========

    async fn messaging_cost(&self, endpoint: &str, channel: InfraChannel) -> ApiResult<InfraCost> {
        let body = self.get(endpoint).await?;
        schema::parse_messaging_stats(endpoint, &body, channel, Utc::now())
    }
}

#[async_trait]
impl FinanceSource for FinanceApiClient {
    async fn sales(&self) -> ApiResult<Vec<Sale>> {
        schema::parse_sales(&self.get(schema::SALES).await?)
    }

    async fn influencers(&self) -> ApiResult<Vec<Influencer>> {
        schema::parse_influencers(&self.get(schema::INFLUENCERS).await?)
    }

    async fn agents(&self) -> ApiResult<Vec<Agent>> {
        schema::parse_agents(&self.get(schema::AGENTS).await?)
    }

    async fn payouts(&self) -> ApiResult<Vec<Payout>> {
        schema::parse_payouts(&self.get(schema::PAYOUTS).await?)
    }

    async fn ledger_entries(&self) -> ApiResult<Vec<LedgerEntry>> {
        schema::parse_entries(&self.get(schema::ENTRIES).await?)
    }

    async fn bank_accounts(&self) -> ApiResult<Vec<BankAccount>> {
        schema::parse_bank_accounts(&self.get(schema::BANK_ACCOUNTS).await?)
    }

    async fn infra_costs(&self) -> ApiResult<Vec<InfraCost>> {
        let (sms, whatsapp) = tokio::join!(
            self.messaging_cost(schema::SMS_STATS, InfraChannel::Sms),
            self.messaging_cost(schema::WHATSAPP_STATS, InfraChannel::WhatsApp),
        );
        Ok(vec![sms?, whatsapp?])
    }
}

#[async_trait]
impl PayoutGateway for FinanceApiClient {
    async fn approve(&self, payout_id: &str) -> ApiResult<()> {
        self.post_action::<()>(payout_id, schema::APPROVE_ACTION, None).await
    }

    async fn reject(&self, payout_id: &str, reason: &str) -> ApiResult<()> {
        self.post_action(payout_id, schema::REJECT_ACTION, Some(&RejectBody { reason }))
            .await
    }

    async fn pay(&self, payout_id: &str) -> ApiResult<()> {
        self.post_action::<()>(payout_id, schema::PAY_ACTION, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(base_url: &str) -> ApiSettings {
        ApiSettings {
            base_url: base_url.to_string(),
            token: None,
            timeout_secs: 2,
            max_retry_secs: 0,
        }
    }

    #[test]
    fn test_url_joining() {
        let client = FinanceApiClient::new(&settings("https://api.psiuu.app/api/")).unwrap();
        assert_eq!(client.base_url(), "https://api.psiuu.app/api");
        assert_eq!(
            client.url(schema::SALES),
            "https://api.psiuu.app/api/finance/sales"
        );
        assert_eq!(
            client.payout_url("p1", schema::APPROVE_ACTION).unwrap().as_str(),
            "https://api.psiuu.app/api/finance/payouts/p1/process"
        );
    }

    #[test]
    fn test_payout_id_is_escaped() {
        let client = FinanceApiClient::new(&settings("https://api.psiuu.app/api")).unwrap();
        let url = client.payout_url("a/b c?x#y", schema::PAY_ACTION).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.psiuu.app/api/finance/payouts/a%2Fb%20c%3Fx%23y/complete"
        );
        assert_eq!(url.path_segments().unwrap().count(), 5);
        assert!(url.query().is_none());
    }

    #[test]
    fn test_backoff_bounded_by_settings() {
        let mut s = settings("http://localhost");
        s.max_retry_secs = 7;
        let client = FinanceApiClient::new(&s).unwrap();
        assert_eq!(client.create_backoff().max_elapsed_time, Some(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_retryable_error() {
        let client = FinanceApiClient::new(&settings("http://127.0.0.1:1")).unwrap();
        let err = client.sales().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!err.is_schema_error());
    }
}
