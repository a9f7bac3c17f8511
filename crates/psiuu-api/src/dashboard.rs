//! # Dashboard Loader
//!
//! Fetches every collection at once and folds them into the KPI summary.
//!
//! ```text
//!            ┌── sales ────────┐
//!            ├── influencers ──┤
//!            ├── agents ───────┤
//!  load() ───┼── payouts ──────┼──► DashboardSnapshot ──► summarize()
//!  join!     ├── entries ──────┤       (failed source → empty + recorded)
//!            ├── bank accounts ┤
//!            └── infra costs ──┘
//! ```
//!
//! Sources are independent: one failing fetch empties its own collection
//! and leaves the rest of the dashboard intact. Collections the source
//! answered with mock data are listed as failures too, and a snapshot with
//! any of them cannot seed a payout store.

use std::collections::BTreeMap;
use std::sync::Arc;

use psiuu_core::summary::{summarize, DashboardSummary};
use psiuu_core::{Agent, BankAccount, FinanceRules, InfraCost, Influencer, LedgerEntry, Payout, Sale};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::source::FinanceSource;
use crate::store::InMemoryPayoutStore;

/// A source that could not be loaded from the API.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub source: &'static str,
    pub message: String,
    /// The collection holds mock data rather than nothing.
    pub mocked: bool,
}

/// Everything the dashboard shows, plus what went missing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardSnapshot {
    pub sales: Vec<Sale>,
    pub influencers: Vec<Influencer>,
    pub agents: Vec<Agent>,
    pub payouts: Vec<Payout>,
    pub entries: Vec<LedgerEntry>,
    pub bank_accounts: Vec<BankAccount>,
    pub infra_costs: Vec<InfraCost>,
    pub summary: DashboardSummary,
    pub failures: Vec<SourceFailure>,
}

impl DashboardSnapshot {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Collections shown with mock data.
    pub fn mocked_sources(&self) -> Vec<&'static str> {
        self.failures.iter().filter(|f| f.mocked).map(|f| f.source).collect()
    }

    /// Payout store seeded from the loaded payouts.
    ///
    /// ## Errors
    /// `MockData` if any collection is mock data: its payouts and sales must
    /// never drive a real payment or an extract.
    pub fn payout_store(&self) -> ApiResult<InMemoryPayoutStore> {
        let mocked = self.mocked_sources();
        if !mocked.is_empty() {
            return Err(ApiError::MockData(mocked.join(", ")));
        }
        Ok(InMemoryPayoutStore::new(self.payouts.clone()))
    }

    /// Display names by beneficiary id, influencers and agents together.
    pub fn beneficiary_names(&self) -> BTreeMap<String, String> {
        self.influencers
            .iter()
            .map(|i| (i.id.clone(), i.name.clone()))
            .chain(self.agents.iter().map(|a| (a.id.clone(), a.name.clone())))
            .collect()
    }
}

pub struct DashboardLoader {
    source: Arc<dyn FinanceSource>,
    rules: FinanceRules,
}

impl DashboardLoader {
    pub fn new(source: Arc<dyn FinanceSource>, rules: FinanceRules) -> Self {
        Self { source, rules }
    }

    pub async fn load(&self) -> DashboardSnapshot {
        let source = &self.source;
        let (sales, influencers, agents, payouts, entries, bank_accounts, infra_costs) = tokio::join!(
            source.sales(),
            source.influencers(),
            source.agents(),
            source.payouts(),
            source.ledger_entries(),
            source.bank_accounts(),
            source.infra_costs(),
        );

        let mut failures = Vec::new();
        let mut snapshot = DashboardSnapshot {
            sales: settle("sales", sales, &mut failures),
            influencers: settle("influencers", influencers, &mut failures),
            agents: settle("agents", agents, &mut failures),
            payouts: settle("payouts", payouts, &mut failures),
            entries: settle("ledger_entries", entries, &mut failures),
            bank_accounts: settle("bank_accounts", bank_accounts, &mut failures),
            infra_costs: settle("infra_costs", infra_costs, &mut failures),
            ..Default::default()
        };

        snapshot.summary = summarize(
            &snapshot.sales,
            &snapshot.infra_costs,
            &snapshot.entries,
            &snapshot.bank_accounts,
            &self.rules,
        );
        for source in self.source.mocked_collections().await {
            failures.push(SourceFailure {
                source,
                message: "API unreachable, showing mock data".to_string(),
                mocked: true,
            });
        }
        snapshot.failures = failures;

        info!(
            sales = snapshot.sales.len(),
            payouts = snapshot.payouts.len(),
            failed_sources = snapshot.failures.len(),
            "Dashboard loaded"
        );
        snapshot
    }
}

fn settle<T>(source: &'static str, result: ApiResult<Vec<T>>, failures: &mut Vec<SourceFailure>) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(e) => {
            warn!(source, error = %e, "Dashboard source failed");
            failures.push(SourceFailure {
                source,
                message: e.to_string(),
                mocked: false,
            });
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDataset;
    use crate::source::MockFallback;
    use async_trait::async_trait;
    use chrono::Utc;
    use psiuu_core::summary::total_approved_revenue;
    use psiuu_core::Money;

    /// Serves a dataset but fails bank accounts.
    struct NoBank(MockDataset);

    #[async_trait]
    impl FinanceSource for NoBank {
        async fn sales(&self) -> ApiResult<Vec<Sale>> {
            self.0.sales().await
        }
        async fn influencers(&self) -> ApiResult<Vec<Influencer>> {
            self.0.influencers().await
        }
        async fn agents(&self) -> ApiResult<Vec<Agent>> {
            self.0.agents().await
        }
        async fn payouts(&self) -> ApiResult<Vec<Payout>> {
            self.0.payouts().await
        }
        async fn ledger_entries(&self) -> ApiResult<Vec<LedgerEntry>> {
            self.0.ledger_entries().await
        }
        async fn bank_accounts(&self) -> ApiResult<Vec<BankAccount>> {
            Err(ApiError::Unauthorized)
        }
        async fn infra_costs(&self) -> ApiResult<Vec<InfraCost>> {
            self.0.infra_costs().await
        }
    }

    /// Payouts time out; everything else is served from the dataset.
    struct PayoutsDown(MockDataset);

    #[async_trait]
    impl FinanceSource for PayoutsDown {
        async fn sales(&self) -> ApiResult<Vec<Sale>> {
            self.0.sales().await
        }
        async fn influencers(&self) -> ApiResult<Vec<Influencer>> {
            self.0.influencers().await
        }
        async fn agents(&self) -> ApiResult<Vec<Agent>> {
            self.0.agents().await
        }
        async fn payouts(&self) -> ApiResult<Vec<Payout>> {
            Err(ApiError::Status {
                status: 503,
                body: "maintenance".into(),
            })
        }
        async fn ledger_entries(&self) -> ApiResult<Vec<LedgerEntry>> {
            self.0.ledger_entries().await
        }
        async fn bank_accounts(&self) -> ApiResult<Vec<BankAccount>> {
            self.0.bank_accounts().await
        }
        async fn infra_costs(&self) -> ApiResult<Vec<InfraCost>> {
            self.0.infra_costs().await
        }
    }

    fn dataset() -> MockDataset {
        MockDataset::generate(&FinanceRules::default(), 3, 80, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_load_summarizes_everything() {
        let data = dataset();
        let loader = DashboardLoader::new(Arc::new(data.clone()), FinanceRules::default());

        let snapshot = loader.load().await;
        assert!(!snapshot.is_partial());
        assert_eq!(snapshot.sales.len(), 80);
        assert_eq!(snapshot.summary.approved_revenue, total_approved_revenue(&data.sales));
        assert!(snapshot.summary.cash_balance.is_positive());
        assert!(snapshot.beneficiary_names().contains_key("inf-1"));
        assert!(snapshot.payout_store().is_ok());
    }

    #[tokio::test]
    async fn test_failed_source_is_isolated() {
        let data = dataset();
        let loader = DashboardLoader::new(Arc::new(NoBank(data.clone())), FinanceRules::default());

        let snapshot = loader.load().await;
        assert!(snapshot.is_partial());
        assert_eq!(snapshot.failures.len(), 1);
        assert_eq!(snapshot.failures[0].source, "bank_accounts");
        assert!(!snapshot.failures[0].mocked);
        assert_eq!(snapshot.summary.cash_balance, Money::zero());
        assert_eq!(snapshot.sales.len(), data.sales.len());
    }

    #[tokio::test]
    async fn test_mocked_collection_marks_snapshot_and_blocks_payouts() {
        let real = dataset();
        let mock = MockDataset::generate(&FinanceRules::default(), 99, 200, Utc::now()).unwrap();
        let source = MockFallback::new(PayoutsDown(real.clone()), mock.clone());
        let loader = DashboardLoader::new(Arc::new(source), FinanceRules::default());

        let snapshot = loader.load().await;
        assert!(snapshot.is_partial());
        assert_eq!(snapshot.mocked_sources(), vec!["payouts"]);
        assert_eq!(snapshot.payouts, mock.payouts);
        assert_eq!(snapshot.sales.len(), real.sales.len());

        let err = snapshot.payout_store().unwrap_err();
        assert!(matches!(err, ApiError::MockData(ref sources) if sources == "payouts"));
    }
}
