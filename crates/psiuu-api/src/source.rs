//! # Data Sources
//!
//! Seams between the dashboard and the outside world.
//!
//! ## Collaborators
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   FinanceSource (read-only)          PayoutGateway (side effects)      │
//! │   ├── FinanceApiClient               ├── FinanceApiClient               │
//! │   └── MockFallback<S>                └── test fakes                     │
//! │         │                                                               │
//! │         └── wraps any FinanceSource; when the API is unreachable,      │
//! │             logs at warn, answers from a seeded MockDataset and        │
//! │             reports the collection in mocked_collections()             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The fallback never touches payout transitions: a failed approval or
//! payment is always reported, never papered over. Schema and auth errors
//! are never masked.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use psiuu_core::{Agent, BankAccount, InfraCost, Influencer, LedgerEntry, Payout, Sale};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::ApiResult;
use crate::mock::MockDataset;

/// Read-only access to the finance collections.
#[async_trait]
pub trait FinanceSource: Send + Sync {
    async fn sales(&self) -> ApiResult<Vec<Sale>>;

    async fn influencers(&self) -> ApiResult<Vec<Influencer>>;

    async fn agents(&self) -> ApiResult<Vec<Agent>>;

    async fn payouts(&self) -> ApiResult<Vec<Payout>>;

    async fn ledger_entries(&self) -> ApiResult<Vec<LedgerEntry>>;

    async fn bank_accounts(&self) -> ApiResult<Vec<BankAccount>>;

    async fn infra_costs(&self) -> ApiResult<Vec<InfraCost>>;

    /// Collections whose latest fetch was answered with mock data.
    async fn mocked_collections(&self) -> Vec<&'static str> {
        Vec::new()
    }
}

/// Remote payout transitions. One call per payout.
#[async_trait]
pub trait PayoutGateway: Send + Sync {
    async fn approve(&self, payout_id: &str) -> ApiResult<()>;

    /// `reason` has already been validated as non-blank.
    async fn reject(&self, payout_id: &str, reason: &str) -> ApiResult<()>;

    async fn pay(&self, payout_id: &str) -> ApiResult<()>;
}

// =============================================================================
// Mock Fallback
// =============================================================================

/// Decorator that answers from mock data when the inner source is unreachable.
pub struct MockFallback<S> {
    inner: S,
    dataset: MockDataset,
    fallbacks: AtomicUsize,
    mocked: Mutex<BTreeSet<&'static str>>,
}

impl<S: FinanceSource> MockFallback<S> {
    pub fn new(inner: S, dataset: MockDataset) -> Self {
        Self {
            inner,
            dataset,
            fallbacks: AtomicUsize::new(0),
            mocked: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// How many fetches were answered from mock data so far.
    pub fn fallback_count(&self) -> usize {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Only outages are covered; any other error is returned as is.
    async fn recover<T: Clone + Send + Sync>(
        &self,
        collection: &'static str,
        result: ApiResult<Vec<T>>,
        mock: &[T],
    ) -> ApiResult<Vec<T>> {
        match result {
            Ok(items) => {
                self.mocked.lock().await.remove(collection);
                Ok(items)
            }
            Err(e) if e.is_retryable() => {
                warn!(collection, error = %e, count = mock.len(), "Finance API unavailable, using mock data");
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                self.mocked.lock().await.insert(collection);
                Ok(mock.to_vec())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<S: FinanceSource> FinanceSource for MockFallback<S> {
    async fn sales(&self) -> ApiResult<Vec<Sale>> {
        let result = self.inner.sales().await;
        self.recover("sales", result, &self.dataset.sales).await
    }

    async fn influencers(&self) -> ApiResult<Vec<Influencer>> {
        let result = self.inner.influencers().await;
        self.recover("influencers", result, &self.dataset.influencers).await
    }

    async fn agents(&self) -> ApiResult<Vec<Agent>> {
        let result = self.inner.agents().await;
        self.recover("agents", result, &self.dataset.agents).await
    }

    async fn payouts(&self) -> ApiResult<Vec<Payout>> {
        let result = self.inner.payouts().await;
        self.recover("payouts", result, &self.dataset.payouts).await
    }

    async fn ledger_entries(&self) -> ApiResult<Vec<LedgerEntry>> {
        let result = self.inner.ledger_entries().await;
        self.recover("ledger_entries", result, &self.dataset.entries).await
    }

    async fn bank_accounts(&self) -> ApiResult<Vec<BankAccount>> {
        let result = self.inner.bank_accounts().await;
        self.recover("bank_accounts", result, &self.dataset.bank_accounts).await
    }

    async fn infra_costs(&self) -> ApiResult<Vec<InfraCost>> {
        let result = self.inner.infra_costs().await;
        self.recover("infra_costs", result, &self.dataset.infra_costs).await
    }

    async fn mocked_collections(&self) -> Vec<&'static str> {
        self.mocked.lock().await.iter().copied().collect()
    }
}

// =============================================================================
// Static Source
// =============================================================================

/// Serves a fixed dataset. Used by the binary's `--offline` mode and tests.
#[async_trait]
impl FinanceSource for MockDataset {
    async fn sales(&self) -> ApiResult<Vec<Sale>> {
        Ok(self.sales.clone())
    }

    async fn influencers(&self) -> ApiResult<Vec<Influencer>> {
        Ok(self.influencers.clone())
    }

    async fn agents(&self) -> ApiResult<Vec<Agent>> {
        Ok(self.agents.clone())
    }

    async fn payouts(&self) -> ApiResult<Vec<Payout>> {
        Ok(self.payouts.clone())
    }

    async fn ledger_entries(&self) -> ApiResult<Vec<LedgerEntry>> {
        Ok(self.entries.clone())
    }

    async fn bank_accounts(&self) -> ApiResult<Vec<BankAccount>> {
        Ok(self.bank_accounts.clone())
    }

    async fn infra_costs(&self) -> ApiResult<Vec<InfraCost>> {
        Ok(self.infra_costs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use chrono::Utc;
    use std::sync::atomic::AtomicBool;
    use psiuu_core::FinanceRules;

    /// Sales are down, agents refuse the token, infra stats are malformed.
    struct FlakySource;

    #[async_trait]
    impl FinanceSource for FlakySource {
        async fn sales(&self) -> ApiResult<Vec<Sale>> {
            Err(ApiError::Status {
                status: 502,
                body: "bad gateway".into(),
            })
        }
        async fn influencers(&self) -> ApiResult<Vec<Influencer>> {
            Ok(vec![])
        }
        async fn agents(&self) -> ApiResult<Vec<Agent>> {
            Err(ApiError::Unauthorized)
        }
        async fn payouts(&self) -> ApiResult<Vec<Payout>> {
            Ok(vec![])
        }
        async fn ledger_entries(&self) -> ApiResult<Vec<LedgerEntry>> {
            Ok(vec![])
        }
        async fn bank_accounts(&self) -> ApiResult<Vec<BankAccount>> {
            Ok(vec![])
        }
        async fn infra_costs(&self) -> ApiResult<Vec<InfraCost>> {
            Err(ApiError::schema("/sms/stats", "missing data"))
        }
    }

    /// Payouts time out until `down` is cleared.
    struct PayoutsDown {
        down: AtomicBool,
    }

    #[async_trait]
    impl FinanceSource for PayoutsDown {
        async fn sales(&self) -> ApiResult<Vec<Sale>> {
            Ok(vec![])
        }
        async fn influencers(&self) -> ApiResult<Vec<Influencer>> {
            Ok(vec![])
        }
        async fn agents(&self) -> ApiResult<Vec<Agent>> {
            Ok(vec![])
        }
        async fn payouts(&self) -> ApiResult<Vec<Payout>> {
            if self.down.load(Ordering::Relaxed) {
                return Err(ApiError::Timeout(10));
            }
            Ok(vec![])
        }
        async fn ledger_entries(&self) -> ApiResult<Vec<LedgerEntry>> {
            Ok(vec![])
        }
        async fn bank_accounts(&self) -> ApiResult<Vec<BankAccount>> {
            Ok(vec![])
        }
        async fn infra_costs(&self) -> ApiResult<Vec<InfraCost>> {
            Ok(vec![])
        }
    }

    fn dataset() -> MockDataset {
        MockDataset::generate(&FinanceRules::default(), 42, 50, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_fallback_only_for_outages() {
        let mock = dataset();
        let source = MockFallback::new(FlakySource, mock.clone());

        assert_eq!(source.sales().await.unwrap().len(), mock.sales.len());
        assert!(source.payouts().await.unwrap().is_empty());
        assert_eq!(source.fallback_count(), 1);
        assert_eq!(source.mocked_collections().await, vec!["sales"]);
    }

    #[tokio::test]
    async fn test_schema_and_auth_errors_are_not_masked() {
        let source = MockFallback::new(FlakySource, dataset());

        assert!(matches!(source.agents().await, Err(ApiError::Unauthorized)));
        assert!(source.infra_costs().await.unwrap_err().is_schema_error());
        assert_eq!(source.fallback_count(), 0);
        assert!(source.mocked_collections().await.is_empty());
    }

    #[tokio::test]
    async fn test_recovered_collection_is_no_longer_mocked() {
        let mock = dataset();
        let source = MockFallback::new(
            PayoutsDown {
                down: AtomicBool::new(true),
            },
            mock.clone(),
        );

        assert_eq!(source.payouts().await.unwrap(), mock.payouts);
        assert_eq!(source.mocked_collections().await, vec!["payouts"]);

        source.inner().down.store(false, Ordering::Relaxed);
        assert!(source.payouts().await.unwrap().is_empty());
        assert!(source.mocked_collections().await.is_empty());
        assert_eq!(source.fallback_count(), 1);
    }

    #[tokio::test]
    async fn test_dataset_serves_itself() {
        let mock = dataset();
        assert_eq!(mock.bank_accounts().await.unwrap().len(), 3);
        assert_eq!(mock.sales().await.unwrap().len(), 50);
        assert!(mock.mocked_collections().await.is_empty());
    }
}
