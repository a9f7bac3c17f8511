//! # psiuu-api: I/O Layer for Psiuu Finance
//!
//! Connects the pure rules in `psiuu-core` to the finance API, the config
//! file and the environment.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         psiuu-api Layout                                │
//! │                                                                         │
//! │  FinanceConfig (defaults → finance.toml → PSIUU_* env → validate)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  FinanceApiClient ──── schema (wire → core, typed errors)              │
//! │       │                                                                 │
//! │       ├──► MockFallback<FinanceApiClient>  (read side, warn + mock)    │
//! │       │         │                                                       │
//! │       │         ▼                                                       │
//! │       │    DashboardLoader  (join! over every collection → summary)    │
//! │       │                                                                 │
//! │       └──► PayoutManager    (approve / reject / batch pay)             │
//! │                 │                                                       │
//! │                 ▼                                                       │
//! │            PayoutStore      (in-memory, RwLock)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`client`] - reqwest client for the finance endpoints
//! - [`config`] - `FinanceConfig` loading and validation
//! - [`dashboard`] - concurrent loader and KPI snapshot
//! - [`error`] - `ApiError` and `ApiResult`
//! - [`mock`] - seeded demo dataset
//! - [`payouts`] - `PayoutManager` and batch reports
//! - [`schema`] - wire payloads and conversion into core types
//! - [`source`] - `FinanceSource`, `PayoutGateway`, `MockFallback`
//! - [`store`] - `PayoutStore` and the in-memory implementation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use psiuu_api::{build_source, DashboardLoader, FinanceConfig};
//!
//! let config = FinanceConfig::load(None)?;
//! let (source, _client) = build_source(&config)?;
//! let snapshot = DashboardLoader::new(source, config.rules.clone()).load().await;
//! println!("Receita: {}", snapshot.summary.approved_revenue);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod mock;
pub mod payouts;
pub mod schema;
pub mod source;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::FinanceApiClient;
pub use config::{ApiSettings, FallbackSettings, FinanceConfig, PayoutSettings};
pub use dashboard::{DashboardLoader, DashboardSnapshot, SourceFailure};
pub use error::{ApiError, ApiResult};
pub use mock::{MockDataset, MockGenerator};
pub use payouts::{BatchFailure, BatchReport, BatchSummary, PayoutManager};
pub use source::{FinanceSource, MockFallback, PayoutGateway};
pub use store::{InMemoryPayoutStore, PayoutStore};

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

/// Builds the read-side source from config.
///
/// Returns the source to read from and the raw client, which also serves as
/// the payout gateway. With fallback enabled the client is wrapped in
/// [`MockFallback`], which only covers outages and reports what it mocked.
pub fn build_source(config: &FinanceConfig) -> ApiResult<(Arc<dyn FinanceSource>, Arc<FinanceApiClient>)> {
    let client = FinanceApiClient::new(&config.api)?;

    let source: Arc<dyn FinanceSource> = if config.is_fallback_enabled() {
        let dataset = MockDataset::generate(
            &config.rules,
            config.fallback.seed,
            config.fallback.sales_count,
            Utc::now(),
        )?;
        info!(seed = config.fallback.seed, "Mock fallback enabled");
        Arc::new(MockFallback::new(client.clone(), dataset))
    } else {
        Arc::new(client.clone())
    };

    Ok((source, Arc::new(client)))
}
