//! # Commission Extract
//!
//! Itemised breakdown of the sales behind a payout.
//!
//! ## Modes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Reconciled (source of truth)                                          │
//! │  ─────────────────────────────                                          │
//! │  approved sales of the beneficiary, dated <= payout.created_at,        │
//! │  sorted (created_at, id)                                                │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  skip the prefix already covered by earlier non-rejected payouts       │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  remaining lines MUST sum to payout.amount, else Reconciliation error  │
//! │                                                                         │
//! │  Approximate (demo only)                                               │
//! │  ───────────────────────                                                │
//! │  3..=7 synthetic lines around amount / n, roughly the payout amount    │
//! │  Never used for accounting.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both modes return lines newest first.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::payout::Payout;
use crate::rules::FinanceRules;
use crate::types::{PackageTier, Sale};

/// How an extract was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    /// Rebuilt from sales; sums to the payout amount exactly.
    Reconciled,
    /// Synthetic; for display when sales are unavailable.
    Approximate,
}

/// One sale's contribution to a payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExtractItem {
    pub id: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub buyer_id: String,
    pub package_label: String,
    pub amount: Money,
    pub rate_label: String,
}

/// Lines of a payout's extract, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionExtract {
    pub payout_id: String,
    pub mode: ExtractMode,
    pub items: Vec<ExtractItem>,
}

impl CommissionExtract {
    pub fn total(&self) -> Money {
        self.items.iter().map(|i| i.amount).sum()
    }

    #[inline]
    pub fn is_reconciled(&self) -> bool {
        self.mode == ExtractMode::Reconciled
    }
}

// =============================================================================
// Reconciled
// =============================================================================

/// Rebuilds the extract of `payout` from the sales ledger.
///
/// `payouts` is every payout known for the beneficiary (others are ignored);
/// the one being reconciled may be included.
///
/// ## Errors
/// `Reconciliation` when the lines do not add up to `payout.amount`.
pub fn reconcile_extract(
    payout: &Payout,
    sales: &[Sale],
    payouts: &[Payout],
    rules: &FinanceRules,
) -> CoreResult<CommissionExtract> {
    let kind = payout.beneficiary_type;
    let beneficiary_id = payout.beneficiary_id.as_str();

    let mut contributing: Vec<(&Sale, Money)> = sales
        .iter()
        .filter(|s| s.is_approved() && s.created_at <= payout.created_at)
        .filter_map(|s| s.commission_for(kind, beneficiary_id).map(|amount| (s, amount)))
        .collect();
    contributing.sort_by(|(a, _), (b, _)| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

    let consumed: Money = payouts
        .iter()
        .filter(|p| p.belongs_to(kind, beneficiary_id))
        .filter(|p| p.status.commits_balance() && p.precedes(payout))
        .map(|p| p.amount)
        .sum();

    let mut skipped = Money::zero();
    let mut start = 0;
    while let Some((_, amount)) = contributing.get(start) {
        if skipped + *amount > consumed {
            break;
        }
        skipped += *amount;
        start += 1;
    }

    let remaining = &contributing[start..];
    let actual: Money = remaining.iter().map(|(_, amount)| *amount).sum();

    if skipped != consumed || actual != payout.amount {
        return Err(CoreError::Reconciliation {
            payout_id: payout.id.clone(),
            expected: payout.amount,
            actual,
        });
    }

    let rate_label = rules.commission_rate(kind).label();
    let items = remaining
        .iter()
        .rev()
        .map(|(sale, amount)| ExtractItem {
            id: format!("com_{}", sale.id),
            date: sale.created_at,
            buyer_id: sale.buyer_id.clone(),
            package_label: sale.tier.label(),
            amount: *amount,
            rate_label: rate_label.clone(),
        })
        .collect();

    Ok(CommissionExtract {
        payout_id: payout.id.clone(),
        mode: ExtractMode::Reconciled,
        items,
    })
}

// =============================================================================
// Approximate
// =============================================================================

/// Synthesises a plausible extract when per-sale data is missing.
///
/// Lines hover around `amount / n` with up to R$ 1,00 of jitter, one per day
/// going back from the payout date. The total is close to, not equal to, the
/// payout amount.
pub fn approximate_extract<R: Rng>(
    payout: &Payout,
    rules: &FinanceRules,
    rng: &mut R,
) -> CommissionExtract {
    let count: i64 = rng.gen_range(3..=7);
    let average = payout.amount.cents() / count;
    let rate_label = rules.commission_rate(payout.beneficiary_type).label();

    let items = (0..count)
        .map(|i| {
            let jitter: i64 = rng.gen_range(-100..=100);
            let tier = PackageTier::ALL[rng.gen_range(0..PackageTier::ALL.len())];
            ExtractItem {
                id: format!("approx_{}_{}", payout.id, i),
                date: payout.created_at - Duration::days(i),
                buyer_id: format!("user_{}", rng.gen_range(1..=9999)),
                package_label: tier.label(),
                amount: Money::from_cents((average + jitter).max(1)),
                rate_label: rate_label.clone(),
            }
        })
        .collect();

    CommissionExtract {
        payout_id: payout.id.clone(),
        mode: ExtractMode::Approximate,
        items,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
