//! # psiuu-core: Commission and Payout Logic for Psiuu Finance
//!
//! The financial rules behind the admin dashboard, as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Psiuu Finance Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   Admin Dashboard (React)                       │   │
//! │  │    Vendas ──► Comissões ──► Pagamentos ──► Tesouraria           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ ts-rs bindings                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 psiuu-api (I/O layer)                           │   │
//! │  │   HTTP client, schema boundary, mock fallback, payout manager   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ psiuu-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ allocator │  │  summary  │  │  payout   │  │  extract  │  │   │
//! │  │   │ fee/comm. │  │   KPIs    │  │ lifecycle │  │ per-sale  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO LOGGING • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money in centavos, basis-point rates, fixed FX rate
//! - [`types`] - Sales, beneficiaries, ledger entries, infra costs, accounts
//! - [`rules`] - Tier prices, commission rates, payout threshold
//! - [`allocator`] - Store fee and commission split of a sale
//! - [`summary`] - Dashboard KPI folds
//! - [`balance`] - Beneficiary balances and payout opening
//! - [`payout`] - Payout state machine
//! - [`extract`] - Commission extract per payout
//! - [`query`] - Listing filters
//! - [`validation`] - Business rule validation
//! - [`error`] - Domain error types
//!
//! ## Dependency Order
//!
//! money → allocator → summary → payout/balance → extract
//!
//! ## Example Usage
//!
//! ```rust
//! use psiuu_core::allocator::CommissionAllocator;
//! use psiuu_core::rules::FinanceRules;
//! use psiuu_core::types::PackageTier;
//!
//! let allocator = CommissionAllocator::new(FinanceRules::default()).unwrap();
//! let sale = allocator.allocate(PackageTier::Credits15, Some("inf-1"));
//!
//! assert_eq!(sale.gross.to_string(), "R$ 24,90");
//! assert_eq!(sale.influencer_commission.cents(), 498);
//! assert_eq!(sale.agent_commission.cents(), 125); // 124.5 rounds half-up
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocator;
pub mod balance;
pub mod error;
pub mod extract;
pub mod money;
pub mod payout;
pub mod query;
pub mod rules;
pub mod summary;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Currency, ExchangeRate, Money, Rate};
pub use payout::{Payout, PayoutAction, PayoutStatus};
pub use rules::FinanceRules;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Local (reporting) currency.
pub const LOCAL_CURRENCY: Currency = Currency::Brl;
