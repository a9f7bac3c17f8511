//! # Beneficiary Balances
//!
//! A balance is derived, never stored:
//!
//! ```text
//! accrued    = Σ commission over approved sales attributed to the beneficiary
//! committed  = Σ amount over the beneficiary's payouts that are not Rejected
//! available  = accrued − committed
//! eligible   ⇔ available > threshold   (strict: R$ 50,00 is not enough)
//! ```
//!
//! A beneficiary may hold at most one open payout. A rejected payout is
//! terminal and releases its amount, so the next payout opened picks it up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::payout::Payout;
use crate::rules::FinanceRules;
use crate::types::{BeneficiaryRef, BeneficiaryType, Sale};

/// Commission earned by a beneficiary over approved sales.
pub fn accrued_commission(sales: &[Sale], kind: BeneficiaryType, beneficiary_id: &str) -> Money {
    sales
        .iter()
        .filter(|s| s.is_approved())
        .filter_map(|s| s.commission_for(kind, beneficiary_id))
        .sum()
}

/// Amount already claimed by payouts (anything but Rejected).
pub fn committed_amount(payouts: &[Payout], kind: BeneficiaryType, beneficiary_id: &str) -> Money {
    payouts
        .iter()
        .filter(|p| p.belongs_to(kind, beneficiary_id) && p.status.commits_balance())
        .map(|p| p.amount)
        .sum()
}

/// Balance snapshot of one beneficiary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BeneficiaryBalance {
    pub beneficiary: BeneficiaryRef,
    pub accrued: Money,
    pub committed: Money,
    pub available: Money,
}

impl BeneficiaryBalance {
    pub fn compute(beneficiary: BeneficiaryRef, sales: &[Sale], payouts: &[Payout]) -> Self {
        let accrued = accrued_commission(sales, beneficiary.kind, &beneficiary.id);
        let committed = committed_amount(payouts, beneficiary.kind, &beneficiary.id);
        BeneficiaryBalance {
            beneficiary,
            accrued,
            committed,
            available: accrued - committed,
        }
    }

    /// Strictly above the threshold.
    #[inline]
    pub fn is_eligible(&self, threshold: Money) -> bool {
        self.available > threshold
    }
}

/// The open payout of a beneficiary, if any.
pub fn open_payout_of<'a>(payouts: &'a [Payout], beneficiary: &BeneficiaryRef) -> Option<&'a Payout> {
    payouts
        .iter()
        .find(|p| p.belongs_to(beneficiary.kind, &beneficiary.id) && p.status.is_open())
}

/// Every beneficiary that appears on an approved sale, with its balance.
///
/// `names` supplies display names; ids missing from it are shown as the id.
/// Output is sorted by (type, id).
pub fn balances_from_sales(
    sales: &[Sale],
    payouts: &[Payout],
    names: &BTreeMap<String, String>,
) -> Vec<BeneficiaryBalance> {
    let mut ids: BTreeSet<(BeneficiaryType, String)> = BTreeSet::new();
    for sale in sales.iter().filter(|s| s.is_approved()) {
        if let Some(id) = sale.influencer_id.as_ref().filter(|_| sale.influencer_commission.is_positive()) {
            ids.insert((BeneficiaryType::Influencer, id.clone()));
        }
        if let Some(id) = sale.agent_id.as_ref().filter(|_| sale.agent_commission.is_positive()) {
            ids.insert((BeneficiaryType::Agent, id.clone()));
        }
    }

    ids.into_iter()
        .map(|(kind, id)| {
            let name = names.get(&id).cloned().unwrap_or_else(|| id.clone());
            BeneficiaryBalance::compute(BeneficiaryRef { id, name, kind }, sales, payouts)
        })
        .collect()
}

/// Balances that may open a payout right now: above threshold, no open payout.
pub fn eligible_balances<'a>(
    balances: &'a [BeneficiaryBalance],
    payouts: &[Payout],
    threshold: Money,
) -> Vec<&'a BeneficiaryBalance> {
    balances
        .iter()
        .filter(|b| b.is_eligible(threshold))
        .filter(|b| open_payout_of(payouts, &b.beneficiary).is_none())
        .collect()
}

/// Opens a payout for a beneficiary's full available balance.
///
/// ## Errors
/// - `PayoutAlreadyOpen` if a non-terminal payout exists for the beneficiary
/// - `BelowPayoutThreshold` if the available balance is not above the threshold
pub fn open_payout(
    beneficiary: &BeneficiaryRef,
    sales: &[Sale],
    payouts: &[Payout],
    rules: &FinanceRules,
    now: DateTime<Utc>,
) -> CoreResult<Payout> {
    if let Some(open) = open_payout_of(payouts, beneficiary) {
        return Err(ValidationError::PayoutAlreadyOpen {
            beneficiary_id: beneficiary.id.clone(),
            payout_id: open.id.clone(),
        }
        .into());
    }

    let balance = BeneficiaryBalance::compute(beneficiary.clone(), sales, payouts);
    let threshold = rules.payout_threshold();
    if !balance.is_eligible(threshold) {
        return Err(ValidationError::BelowPayoutThreshold {
            beneficiary_id: beneficiary.id.clone(),
            balance: balance.available,
            threshold,
        }
        .into());
    }

    Ok(Payout::new(beneficiary, balance.available, now, rules.payout_due_days))
}

/// Opens a payout for every eligible beneficiary found in `sales`.
///
/// Returns only the new payouts; merging them is the caller's job.
pub fn open_eligible_payouts(
    sales: &[Sale],
    payouts: &[Payout],
    names: &BTreeMap<String, String>,
    rules: &FinanceRules,
    now: DateTime<Utc>,
) -> Vec<Payout> {
    let balances = balances_from_sales(sales, payouts, names);
    eligible_balances(&balances, payouts, rules.payout_threshold())
        .into_iter()
        .map(|b| Payout::new(&b.beneficiary, b.available, now, rules.payout_due_days))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::payout::{PayoutAction, PayoutStatus};
    use crate::types::{PackageTier, PaymentMethod, SaleStatus};

    fn sale(id: &str, influencer_cents: i64, status: SaleStatus) -> Sale {
        Sale {
            id: id.to_string(),
            created_at: Utc::now(),
            buyer_id: "user_1".to_string(),
            tier: PackageTier::Credits15,
            gross: Money::from_cents(2490),
            store_fee: Money::from_cents(374),
            influencer_id: Some("inf-1".to_string()),
            agent_id: Some("agt-1".to_string()),
            influencer_commission: Money::from_cents(influencer_cents),
            agent_commission: Money::from_cents(125),
            status,
            payment_method: PaymentMethod::Pix,
        }
    }

    fn ana() -> BeneficiaryRef {
        BeneficiaryRef {
            id: "inf-1".to_string(),
            name: "Ana".to_string(),
            kind: BeneficiaryType::Influencer,
        }
    }

    #[test]
    fn test_exactly_threshold_is_not_eligible() {
        let rules = FinanceRules::default();
        let sales = vec![sale("s1", 2500, SaleStatus::Approved), sale("s2", 2500, SaleStatus::Approved)];

        let err = open_payout(&ana(), &sales, &[], &rules, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::BelowPayoutThreshold { .. })
        ));
    }

    #[test]
    fn test_one_centavo_over_threshold_is_eligible() {
        let rules = FinanceRules::default();
        let sales = vec![sale("s1", 2500, SaleStatus::Approved), sale("s2", 2501, SaleStatus::Approved)];

        let payout = open_payout(&ana(), &sales, &[], &rules, Utc::now()).unwrap();
        assert_eq!(payout.amount.cents(), 5001);
        assert_eq!(payout.status, PayoutStatus::AwaitingInvoice);
    }

    #[test]
    fn test_only_approved_sales_accrue() {
        let sales = vec![
            sale("s1", 1000, SaleStatus::Approved),
            sale("s2", 9000, SaleStatus::Pending),
            sale("s3", 9000, SaleStatus::Reversed),
        ];
        assert_eq!(
            accrued_commission(&sales, BeneficiaryType::Influencer, "inf-1").cents(),
            1000
        );
        assert_eq!(accrued_commission(&sales, BeneficiaryType::Agent, "agt-1").cents(), 125);
    }

    #[test]
    fn test_second_open_payout_refused() {
        let rules = FinanceRules::default();
        let sales: Vec<Sale> = (0..30)
            .map(|i| sale(&format!("s{i}"), 498, SaleStatus::Approved))
            .collect();
        let first = open_payout(&ana(), &sales, &[], &rules, Utc::now()).unwrap();

        let err = open_payout(&ana(), &sales, &[first.clone()], &rules, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::PayoutAlreadyOpen { .. })
        ));
    }

    #[test]
    fn test_rejected_payout_releases_balance() {
        let rules = FinanceRules::default();
        let sales: Vec<Sale> = (0..30)
            .map(|i| sale(&format!("s{i}"), 498, SaleStatus::Approved))
            .collect();
        let first = open_payout(&ana(), &sales, &[], &rules, Utc::now()).unwrap();
        let rejected = first
            .apply(&PayoutAction::SubmitInvoice {
                invoice_ref: "nf-1".to_string(),
            })
            .and_then(|p| {
                p.apply(&PayoutAction::Reject {
                    reason: "ilegível".to_string(),
                })
            })
            .unwrap();

        let again = open_payout(&ana(), &sales, &[rejected], &rules, Utc::now()).unwrap();
        assert_eq!(again.amount, first.amount);
    }

    #[test]
    fn test_paid_payout_consumes_balance() {
        let sales = vec![sale("s1", 6000, SaleStatus::Approved)];
        let mut paid = Payout::new(&ana(), Money::from_cents(6000), Utc::now(), 15);
        paid.status = PayoutStatus::Paid;

        let balance = BeneficiaryBalance::compute(ana(), &sales, &[paid]);
        assert!(balance.available.is_zero());
        assert!(!balance.is_eligible(Money::from_cents(5000)));
    }

    #[test]
    fn test_open_eligible_payouts() {
        let rules = FinanceRules::default();
        let sales: Vec<Sale> = (0..30)
            .map(|i| sale(&format!("s{i}"), 498, SaleStatus::Approved))
            .collect();
        let mut names = BTreeMap::new();
        names.insert("inf-1".to_string(), "Ana".to_string());

        // influencer: 30 × 4,98 = 149,40; agent: 30 × 1,25 = 37,50 (below)
        let opened = open_eligible_payouts(&sales, &[], &names, &rules, Utc::now());
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].beneficiary_name, "Ana");
        assert_eq!(opened[0].amount.cents(), 14_940);

        assert!(open_eligible_payouts(&sales, &opened, &names, &rules, Utc::now()).is_empty());
    }
}
