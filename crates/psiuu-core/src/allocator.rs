//! # Commission Allocator
//!
//! Splits the price of a credit package into store fee and commissions.
//!
//! ## Breakdown
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  15 Créditos, referred by influencer inf-1 (agent agt-1)               │
//! │                                                                         │
//! │  gross                  = tier price               R$ 24,90            │
//! │  store fee              = gross × 15%              R$  3,74            │
//! │  influencer commission  = gross × 20%              R$  4,98            │
//! │  agent commission       = gross ×  5%              R$  1,25            │
//! │                                                                         │
//! │  No influencer? Both commissions are R$ 0,00.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every component is computed from gross independently, rounded half-up to
//! the centavo. The allocator is deterministic: the extract reconciliation
//! relies on stored commission fields matching a re-run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::money::Money;
use crate::rules::FinanceRules;
use crate::types::{resolve_agent, Influencer, PackageTier, PaymentMethod, Sale, SaleStatus};

/// Financial breakdown of one package sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleBreakdown {
    pub tier: PackageTier,
    pub gross: Money,
    pub store_fee: Money,
    pub influencer_commission: Money,
    pub agent_commission: Money,
}

impl SaleBreakdown {
    /// What the business keeps after the store fee and commissions.
    pub fn retained(&self) -> Money {
        self.gross - self.store_fee - self.influencer_commission - self.agent_commission
    }
}

/// Inputs for recording a new sale.
#[derive(Debug, Clone)]
pub struct SaleRequest {
    pub buyer_id: String,
    pub tier: PackageTier,
    pub influencer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
}

impl SaleRequest {
    pub fn new(buyer_id: impl Into<String>, tier: PackageTier, payment_method: PaymentMethod) -> Self {
        SaleRequest {
            buyer_id: buyer_id.into(),
            tier,
            influencer_id: None,
            payment_method,
            status: SaleStatus::Approved,
            created_at: Utc::now(),
        }
    }

    pub fn referred_by(mut self, influencer_id: impl Into<String>) -> Self {
        self.influencer_id = Some(influencer_id.into());
        self
    }

    pub fn with_status(mut self, status: SaleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Computes sale breakdowns from validated [`FinanceRules`].
#[derive(Debug, Clone)]
pub struct CommissionAllocator {
    rules: FinanceRules,
}

impl CommissionAllocator {
    /// Builds an allocator, rejecting rules that cannot price every tier.
    pub fn new(rules: FinanceRules) -> CoreResult<Self> {
        rules.validate()?;
        Ok(CommissionAllocator { rules })
    }

    pub fn rules(&self) -> &FinanceRules {
        &self.rules
    }

    #[inline]
    pub fn price_of(&self, tier: PackageTier) -> Money {
        self.rules.price_of(tier)
    }

    /// Computes the breakdown for a tier.
    ///
    /// A blank influencer id counts as no influencer. The agent id only
    /// decides attribution, so it does not change any amount.
    pub fn allocate(&self, tier: PackageTier, influencer_id: Option<&str>) -> SaleBreakdown {
        let gross = self.price_of(tier);
        let store_fee = gross.apply_rate(self.rules.store_fee_rate());

        let referred = influencer_id.is_some_and(|id| !id.trim().is_empty());
        let (influencer_commission, agent_commission) = if referred {
            (
                gross.apply_rate(self.rules.influencer_rate()),
                gross.apply_rate(self.rules.agent_rate()),
            )
        } else {
            (Money::zero(), Money::zero())
        };

        SaleBreakdown {
            tier,
            gross,
            store_fee,
            influencer_commission,
            agent_commission,
        }
    }

    /// Same as [`CommissionAllocator::allocate`] with the tier given by name.
    ///
    /// ## Errors
    /// `InvalidInput` for an unknown tier.
    pub fn allocate_named(&self, tier: &str, influencer_id: Option<&str>) -> CoreResult<SaleBreakdown> {
        let tier: PackageTier = tier.parse()?;
        Ok(self.allocate(tier, influencer_id))
    }

    /// Builds a [`Sale`] with its commission fields frozen.
    ///
    /// The agent is resolved from the influencer directory. A sale from an
    /// influencer with no agent still carries the agent commission, but it is
    /// attributed to nobody.
    pub fn record_sale(&self, request: SaleRequest, influencers: &[Influencer]) -> Sale {
        let influencer_id = request
            .influencer_id
            .filter(|id| !id.trim().is_empty());
        let breakdown = self.allocate(request.tier, influencer_id.as_deref());
        let agent_id = influencer_id
            .as_deref()
            .and_then(|id| resolve_agent(id, influencers))
            .map(str::to_string);

        Sale {
            id: format!("sale_{}", Uuid::new_v4().simple()),
            created_at: request.created_at,
            buyer_id: request.buyer_id,
            tier: breakdown.tier,
            gross: breakdown.gross,
            store_fee: breakdown.store_fee,
            influencer_id,
            agent_id,
            influencer_commission: breakdown.influencer_commission,
            agent_commission: breakdown.agent_commission,
            status: request.status,
            payment_method: request.payment_method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::types::PartnerStatus;

    fn allocator() -> CommissionAllocator {
        CommissionAllocator::new(FinanceRules::default()).unwrap()
    }

    fn influencer(id: &str, agent: Option<&str>) -> Influencer {
        Influencer {
            id: id.to_string(),
            name: "Ana".to_string(),
            coupon_code: "ANA10".to_string(),
            instagram_handle: "@ana".to_string(),
            status: PartnerStatus::Active,
            agent_id: agent.map(String::from),
            total_sales: 0,
            balance_available: Money::zero(),
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn test_fifteen_credit_sale_with_influencer() {
        let b = allocator().allocate(PackageTier::Credits15, Some("inf-1"));
        assert_eq!(b.gross.cents(), 2490);
        assert_eq!(b.influencer_commission.cents(), 498);
        // 124.5 centavos rounds half-up
        assert_eq!(b.agent_commission.cents(), 125);
        assert_eq!(b.store_fee.cents(), 374);
        assert_eq!(b.retained().cents(), 2490 - 374 - 498 - 125);
    }

    #[test]
    fn test_commissions_zero_without_influencer() {
        let a = allocator();
        for tier in PackageTier::ALL {
            let b = a.allocate(tier, None);
            assert!(b.influencer_commission.is_zero());
            assert!(b.agent_commission.is_zero());
            assert!(b.store_fee.is_positive());

            let blank = a.allocate(tier, Some("  "));
            assert_eq!(blank, b);
        }
    }

    #[test]
    fn test_every_tier_matches_rounded_rates() {
        let a = allocator();
        for tier in PackageTier::ALL {
            let price = a.price_of(tier).cents();
            let b = a.allocate(tier, Some("inf-1"));
            let half_up = |bps: i64| (price * bps + 5000) / 10_000;
            assert_eq!(b.influencer_commission.cents(), half_up(2000));
            assert_eq!(b.agent_commission.cents(), half_up(500));
            assert_eq!(b, a.allocate(tier, Some("inf-1")));
        }
    }

    #[test]
    fn test_allocate_named_unknown_tier() {
        let err = allocator().allocate_named("12_creditos", None).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));
        assert!(allocator().allocate_named("30_creditos", None).is_ok());
    }

    #[test]
    fn test_invalid_rules_rejected_at_construction() {
        let mut rules = FinanceRules::default();
        rules.tier_prices_cents.credits_8 = 0;
        assert!(CommissionAllocator::new(rules).unwrap_err().is_validation());
    }

    #[test]
    fn test_record_sale_resolves_agent() {
        let directory = vec![influencer("inf-1", Some("agt-1")), influencer("inf-2", None)];
        let a = allocator();

        let sale = a.record_sale(
            SaleRequest::new("user_1", PackageTier::Credits15, PaymentMethod::Pix).referred_by("inf-1"),
            &directory,
        );
        assert_eq!(sale.agent_id.as_deref(), Some("agt-1"));
        assert_eq!(sale.agent_commission.cents(), 125);
        assert!(sale.is_approved());

        let orphan = a.record_sale(
            SaleRequest::new("user_2", PackageTier::Credits8, PaymentMethod::CreditCard).referred_by("inf-2"),
            &directory,
        );
        assert_eq!(orphan.agent_id, None);
        assert!(orphan.agent_commission.is_positive());

        let direct = a.record_sale(
            SaleRequest::new("user_3", PackageTier::Credits30, PaymentMethod::InAppPurchase),
            &directory,
        );
        assert_eq!(direct.influencer_id, None);
        assert!(direct.influencer_commission.is_zero());
    }
}
