//! # Payout Manager
//!
//! Drives payout lifecycle transitions against the remote API and the local
//! store.
//!
//! ## Transition Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  approve / reject(reason) / process_batch(ids)                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. Validate locally (ids, reason, transition, whole batch selection)  │
//! │       │   failure → ValidationError, NO remote call                    │
//! │       ▼                                                                 │
//! │  2. PayoutGateway call (one per payout, optional per-call timeout)     │
//! │       │   failure → ExternalCall { payout_id }, record unchanged        │
//! │       ▼                                                                 │
//! │  3. PayoutStore::apply_transition (merge the updated copy)             │
//! │       │   failure after a paid call → BatchReport::unrecorded           │
//! │                                                                         │
//! │  Batches run ids one after another. A failure is recorded against its  │
//! │  id and the rest carry on. Nothing is rolled back.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use psiuu_core::balance::{open_eligible_payouts, open_payout, open_payout_of};
use psiuu_core::extract::{approximate_extract, reconcile_extract, CommissionExtract};
use psiuu_core::payout::validate_batch_selection;
use psiuu_core::validation::{validate_identifier, validate_rejection_reason};
use psiuu_core::{BeneficiaryRef, CoreError, FinanceRules, Payout, PayoutAction, Sale, ValidationError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::source::PayoutGateway;
use crate::store::PayoutStore;

// =============================================================================
// Batch Report
// =============================================================================

/// One payout the batch could not pay.
#[derive(Debug)]
pub struct BatchFailure {
    pub payout_id: String,
    pub error: ApiError,
}

/// Outcome of a batch payment, per payout.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Payouts now `Paid`, in processing order.
    pub paid: Vec<Payout>,
    /// Payouts still `Approved`, with the reason.
    pub failed: Vec<BatchFailure>,
    /// Paid through the API, but the local record is still `Approved`.
    /// Must not be paid again.
    pub unrecorded: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.unrecorded.is_empty()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            paid: self.paid.iter().map(|p| p.id.clone()).collect(),
            failed: self
                .failed
                .iter()
                .map(|f| (f.payout_id.clone(), f.error.to_string()))
                .collect(),
            unrecorded: self
                .unrecorded
                .iter()
                .map(|f| (f.payout_id.clone(), f.error.to_string()))
                .collect(),
        }
    }
}

/// Serializable view of a [`BatchReport`] for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub paid: Vec<String>,
    pub failed: BTreeMap<String, String>,
    pub unrecorded: BTreeMap<String, String>,
}

// =============================================================================
// Manager
// =============================================================================

/// Coordinates the gateway, the store and the pure lifecycle rules.
pub struct PayoutManager {
    gateway: Arc<dyn PayoutGateway>,
    store: Arc<dyn PayoutStore>,
    rules: FinanceRules,
    call_timeout: Option<Duration>,
}

impl PayoutManager {
    pub fn new(gateway: Arc<dyn PayoutGateway>, store: Arc<dyn PayoutStore>, rules: FinanceRules) -> Self {
        Self {
            gateway,
            store,
            rules,
            call_timeout: None,
        }
    }

    /// Bounds each remote call; `None` waits indefinitely.
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn PayoutStore> {
        &self.store
    }

    async fn find(&self, payout_id: &str) -> ApiResult<Payout> {
        self.store
            .get_payouts()
            .await?
            .into_iter()
            .find(|p| p.id == payout_id)
            .ok_or_else(|| CoreError::PayoutNotFound(payout_id.to_string()).into())
    }

    /// Runs one remote call, mapping any failure to `ExternalCall`.
    async fn call<F>(&self, payout_id: &str, fut: F) -> ApiResult<()>
    where
        F: Future<Output = ApiResult<()>>,
    {
        let result = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(ApiError::Timeout(limit.as_secs())),
            },
            None => fut.await,
        };

        result.map_err(|e| {
            CoreError::ExternalCall {
                payout_id: payout_id.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    // ========== Single Transitions ==========

    /// Records an invoice submitted outside the dashboard.
    ///
    /// Local only: the invoice upload itself happens elsewhere.
    pub async fn record_invoice(&self, payout_id: &str, invoice_ref: &str) -> ApiResult<Payout> {
        validate_identifier("payout id", payout_id)?;
        let action = PayoutAction::SubmitInvoice {
            invoice_ref: invoice_ref.to_string(),
        };
        let updated = self.store.apply_transition(payout_id, &action).await?;
        info!(payout_id, "Invoice recorded, payout under review");
        Ok(updated)
    }

    /// `UnderReview → Approved`.
    pub async fn approve(&self, payout_id: &str) -> ApiResult<Payout> {
        self.transition(payout_id, PayoutAction::Approve).await
    }

    /// `UnderReview → Rejected`. A blank reason fails before any call.
    pub async fn reject(&self, payout_id: &str, reason: &str) -> ApiResult<Payout> {
        validate_rejection_reason(reason)?;
        self.transition(
            payout_id,
            PayoutAction::Reject {
                reason: reason.to_string(),
            },
        )
        .await
    }

    async fn transition(&self, payout_id: &str, action: PayoutAction) -> ApiResult<Payout> {
        validate_identifier("payout id", payout_id)?;
        // Dry run: an invalid transition must not reach the API.
        self.find(payout_id).await?.apply(&action)?;

        match &action {
            PayoutAction::Approve => self.call(payout_id, self.gateway.approve(payout_id)).await?,
            PayoutAction::Reject { reason } => self.call(payout_id, self.gateway.reject(payout_id, reason)).await?,
            PayoutAction::MarkPaid => self.call(payout_id, self.gateway.pay(payout_id)).await?,
            PayoutAction::SubmitInvoice { .. } => {}
        }

        let updated = self.store.apply_transition(payout_id, &action).await?;
        info!(payout_id, status = %updated.status, "Payout transition applied");
        Ok(updated)
    }

    // ========== Batch Payment ==========

    /// Pays every selected payout, one call each.
    ///
    /// ## Errors
    /// The whole batch is refused, with no remote call made, if any id is
    /// malformed, unknown or not `Approved`. After that, failures are per
    /// payout and end up in [`BatchReport::failed`], or in
    /// [`BatchReport::unrecorded`] when the API paid but the store refused.
    pub async fn process_batch(&self, payout_ids: &[String]) -> ApiResult<BatchReport> {
        for payout_id in payout_ids {
            validate_identifier("payout id", payout_id)?;
        }
        let payouts = self.store.get_payouts().await?;
        let selected: Vec<String> = validate_batch_selection(payout_ids, &payouts)?
            .into_iter()
            .map(|p| p.id.clone())
            .collect();

        info!(count = selected.len(), "Processing payout batch");
        let mut report = BatchReport::default();

        for payout_id in selected {
            if let Err(error) = self.call(&payout_id, self.gateway.pay(&payout_id)).await {
                warn!(payout_id = %payout_id, error = %error, "Payout payment failed");
                report.failed.push(BatchFailure { payout_id, error });
                continue;
            }

            match self.store.apply_transition(&payout_id, &PayoutAction::MarkPaid).await {
                Ok(paid) => report.paid.push(paid),
                Err(error) => {
                    error!(payout_id = %payout_id, error = %error, "Payout paid remotely but not recorded");
                    report.unrecorded.push(BatchFailure { payout_id, error });
                }
            }
        }

        info!(
            paid = report.paid.len(),
            failed = report.failed.len(),
            unrecorded = report.unrecorded.len(),
            "Payout batch finished"
        );
        Ok(report)
    }

    // ========== Opening ==========

    /// Opens payouts for every eligible beneficiary and stores them.
    pub async fn open_eligible(
        &self,
        sales: &[Sale],
        names: &BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> ApiResult<Vec<Payout>> {
        let existing = self.store.get_payouts().await?;
        let candidates = open_eligible_payouts(sales, &existing, names, &self.rules, now);
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let opened = self.store.insert_opened(candidates).await?;
        info!(count = opened.len(), "Opened payouts");
        Ok(opened)
    }

    /// Opens one payout for `beneficiary`, refusing a second open one.
    pub async fn open_for(
        &self,
        beneficiary: &BeneficiaryRef,
        sales: &[Sale],
        now: DateTime<Utc>,
    ) -> ApiResult<Payout> {
        validate_identifier("beneficiary id", &beneficiary.id)?;
        let existing = self.store.get_payouts().await?;
        let payout = open_payout(beneficiary, sales, &existing, &self.rules, now)?;

        // Another opener may have won since the read above.
        match self.store.insert_opened(vec![payout]).await?.pop() {
            Some(payout) => {
                info!(payout_id = %payout.id, beneficiary_id = %beneficiary.id, amount = %payout.amount, "Opened payout");
                Ok(payout)
            }
            None => {
                let current = self.store.get_payouts().await?;
                let payout_id = open_payout_of(&current, beneficiary)
                    .map(|p| p.id.clone())
                    .unwrap_or_default();
                Err(ValidationError::PayoutAlreadyOpen {
                    beneficiary_id: beneficiary.id.clone(),
                    payout_id,
                }
                .into())
            }
        }
    }

    // ========== Extracts ==========

    /// Rebuilds the commission extract from the sales ledger.
    ///
    /// A mismatch is logged and returned; there is no silent fallback to
    /// the approximate extract.
    pub async fn extract(&self, payout_id: &str, sales: &[Sale]) -> ApiResult<CommissionExtract> {
        let payouts = self.store.get_payouts().await?;
        let payout = payouts
            .iter()
            .find(|p| p.id == payout_id)
            .ok_or_else(|| CoreError::PayoutNotFound(payout_id.to_string()))?;

        reconcile_extract(payout, sales, &payouts, &self.rules).map_err(|e| {
            error!(payout_id, error = %e, "Commission extract does not reconcile");
            e.into()
        })
    }

    /// Demo-only extract, marked `Approximate`.
    pub async fn approximate(&self, payout_id: &str, seed: u64) -> ApiResult<CommissionExtract> {
        let payout = self.find(payout_id).await?;
        let mut rng = StdRng::seed_from_u64(seed);
        Ok(approximate_extract(&payout, &self.rules, &mut rng))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
