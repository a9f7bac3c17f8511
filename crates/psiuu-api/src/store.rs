//! # Payout Store
//!
//! Source of truth for payout records on this side of the API.
//!
//! ## Store Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PayoutManager                                                          │
//! │       │                                                                 │
//! │       │  store.apply_transition("pay_ab12", &Approve)                  │
//! │       ▼                                                                 │
//! │  PayoutStore                                                            │
//! │  ├── get_payouts()                                                      │
//! │  ├── apply_transition(id, action)  (lookup + Payout::apply + replace)  │
//! │  ├── insert_opened(payouts)        (skips beneficiaries already open)  │
//! │  └── replace_all(payouts)          (refresh from the API)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  InMemoryPayoutStore: tokio RwLock<Vec<Payout>>                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The core never holds payouts between calls; it returns updated copies
//! and the store merges them.

use async_trait::async_trait;
use psiuu_core::{CoreError, Payout, PayoutAction};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ApiResult;

#[async_trait]
pub trait PayoutStore: Send + Sync {
    /// Snapshot of every payout, in insertion order.
    async fn get_payouts(&self) -> ApiResult<Vec<Payout>>;

    /// Applies one lifecycle action atomically and returns the new record.
    ///
    /// Fails with `PayoutNotFound` or the core's validation error; the
    /// stored record is unchanged on failure.
    async fn apply_transition(&self, payout_id: &str, action: &PayoutAction) -> ApiResult<Payout>;

    /// Adds newly opened payouts and returns the ones actually stored.
    ///
    /// A payout whose beneficiary already has an open payout is skipped. The
    /// check and the insert happen under one write, so two concurrent openers
    /// cannot both succeed for the same beneficiary.
    async fn insert_opened(&self, payouts: Vec<Payout>) -> ApiResult<Vec<Payout>>;

    /// Replaces everything, e.g. after a fresh fetch.
    async fn replace_all(&self, payouts: Vec<Payout>) -> ApiResult<()>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryPayoutStore {
    payouts: RwLock<Vec<Payout>>,
}

impl InMemoryPayoutStore {
    pub fn new(payouts: Vec<Payout>) -> Self {
        Self {
            payouts: RwLock::new(payouts),
        }
    }

    pub async fn get(&self, payout_id: &str) -> Option<Payout> {
        self.payouts
            .read()
            .await
            .iter()
            .find(|p| p.id == payout_id)
            .cloned()
    }
}

#[async_trait]
impl PayoutStore for InMemoryPayoutStore {
    async fn get_payouts(&self) -> ApiResult<Vec<Payout>> {
        Ok(self.payouts.read().await.clone())
    }

    async fn apply_transition(&self, payout_id: &str, action: &PayoutAction) -> ApiResult<Payout> {
        let mut payouts = self.payouts.write().await;
        let slot = payouts
            .iter_mut()
            .find(|p| p.id == payout_id)
            .ok_or_else(|| CoreError::PayoutNotFound(payout_id.to_string()))?;

        let updated = slot.apply(action)?;
        debug!(payout_id, from = %slot.status, to = %updated.status, "Payout transition stored");
        *slot = updated.clone();
        Ok(updated)
    }

    async fn insert_opened(&self, payouts: Vec<Payout>) -> ApiResult<Vec<Payout>> {
        let mut stored = self.payouts.write().await;
        let mut inserted = Vec::with_capacity(payouts.len());

        for payout in payouts {
            let open_id = stored
                .iter()
                .find(|p| p.belongs_to(payout.beneficiary_type, &payout.beneficiary_id) && p.status.is_open())
                .map(|p| p.id.clone());
            match open_id {
                Some(open_id) => debug!(
                    payout_id = %payout.id,
                    open_payout_id = %open_id,
                    "Beneficiary already has an open payout, skipped"
                ),
                None => {
                    stored.push(payout.clone());
                    inserted.push(payout);
                }
            }
        }
        Ok(inserted)
    }

    async fn replace_all(&self, payouts: Vec<Payout>) -> ApiResult<()> {
        *self.payouts.write().await = payouts;
        Ok(())
    }
}
