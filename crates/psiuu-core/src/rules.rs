//! # Finance Rules
//!
//! The numbers the business can change without a release: tier prices,
//! fee/commission rates, the USD→BRL conversion used for the cash position,
//! and the payout threshold.
//!
//! These are configuration, not constants. `psiuu-api` loads them from
//! `finance.toml` / environment; the defaults below are what the dashboard
//! shipped with.
//!
//! ```toml
//! [rules]
//! store_fee_bps = 1500
//! influencer_commission_bps = 2000
//! agent_commission_bps = 500
//! usd_brl_rate = 5.5
//! payout_threshold_cents = 5000
//! payout_due_days = 15
//!
//! [rules.tier_prices_cents]
//! credits_8 = 1490
//! credits_15 = 2490
//! credits_30 = 4490
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::{ExchangeRate, Money, Rate};
use crate::types::{BeneficiaryType, PackageTier};
use crate::validation::{validate_bps, ValidationResult};

/// Gross price of each package tier, in centavos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPrices {
    pub credits_8: i64,
    pub credits_15: i64,
    pub credits_30: i64,
}

impl Default for TierPrices {
    fn default() -> Self {
        TierPrices {
            credits_8: 1490,
            credits_15: 2490,
            credits_30: 4490,
        }
    }
}

impl TierPrices {
    /// Raw price for a tier.
    pub fn cents(&self, tier: PackageTier) -> i64 {
        match tier {
            PackageTier::Credits8 => self.credits_8,
            PackageTier::Credits15 => self.credits_15,
            PackageTier::Credits30 => self.credits_30,
        }
    }
}

/// Business rules for commission, consolidation and payouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceRules {
    /// Store (app store / processor) fee on gross.
    #[serde(default = "default_store_fee_bps")]
    pub store_fee_bps: u32,

    #[serde(default = "default_influencer_commission_bps")]
    pub influencer_commission_bps: u32,

    #[serde(default = "default_agent_commission_bps")]
    pub agent_commission_bps: u32,

    /// Fixed USD→BRL rate for the consolidated cash figure.
    #[serde(default = "default_usd_brl_rate")]
    pub usd_brl_rate: ExchangeRate,

    /// Balances must be strictly greater than this to open a payout.
    #[serde(default = "default_payout_threshold_cents")]
    pub payout_threshold_cents: i64,

    /// Days between payout creation and its due date.
    #[serde(default = "default_payout_due_days")]
    pub payout_due_days: u32,

    /// Must stay the last field: TOML writes it as a trailing sub-table.
    #[serde(default)]
    pub tier_prices_cents: TierPrices,
}

fn default_store_fee_bps() -> u32 {
    1500
}

fn default_influencer_commission_bps() -> u32 {
    2000
}

fn default_agent_commission_bps() -> u32 {
    500
}

fn default_usd_brl_rate() -> ExchangeRate {
    ExchangeRate::from_scaled(55_000)
}

fn default_payout_threshold_cents() -> i64 {
    5000
}

fn default_payout_due_days() -> u32 {
    15
}

impl Default for FinanceRules {
    fn default() -> Self {
        FinanceRules {
            store_fee_bps: default_store_fee_bps(),
            influencer_commission_bps: default_influencer_commission_bps(),
            agent_commission_bps: default_agent_commission_bps(),
            usd_brl_rate: default_usd_brl_rate(),
            payout_threshold_cents: default_payout_threshold_cents(),
            payout_due_days: default_payout_due_days(),
            tier_prices_cents: TierPrices::default(),
        }
    }
}

impl FinanceRules {
    /// Validates the rules. A failure here is fatal at startup.
    pub fn validate(&self) -> ValidationResult<()> {
        for tier in PackageTier::ALL {
            if self.tier_prices_cents.cents(tier) <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: format!("price of {}", tier),
                });
            }
        }

        validate_bps("store_fee_bps", self.store_fee_bps)?;
        validate_bps("influencer_commission_bps", self.influencer_commission_bps)?;
        validate_bps("agent_commission_bps", self.agent_commission_bps)?;

        if self.usd_brl_rate.scaled() == 0 {
            return Err(ValidationError::MustBePositive {
                field: "usd_brl_rate".to_string(),
            });
        }

        if self.payout_threshold_cents < 0 {
            return Err(ValidationError::OutOfRange {
                field: "payout_threshold_cents".to_string(),
                min: 0,
                max: i64::MAX,
            });
        }

        if self.payout_due_days > 365 {
            return Err(ValidationError::OutOfRange {
                field: "payout_due_days".to_string(),
                min: 0,
                max: 365,
            });
        }

        Ok(())
    }

    #[inline]
    pub fn price_of(&self, tier: PackageTier) -> Money {
        Money::from_cents(self.tier_prices_cents.cents(tier))
    }

    #[inline]
    pub fn store_fee_rate(&self) -> Rate {
        Rate::from_bps(self.store_fee_bps)
    }

    #[inline]
    pub fn influencer_rate(&self) -> Rate {
        Rate::from_bps(self.influencer_commission_bps)
    }

    #[inline]
    pub fn agent_rate(&self) -> Rate {
        Rate::from_bps(self.agent_commission_bps)
    }

    /// Commission rate paid to a kind of beneficiary.
    pub fn commission_rate(&self, kind: BeneficiaryType) -> Rate {
        match kind {
            BeneficiaryType::Influencer => self.influencer_rate(),
            BeneficiaryType::Agent => self.agent_rate(),
        }
    }

    #[inline]
    pub fn payout_threshold(&self) -> Money {
        Money::from_cents(self.payout_threshold_cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let rules = FinanceRules::default();
        assert!(rules.validate().is_ok());
        assert_eq!(rules.price_of(PackageTier::Credits15).cents(), 2490);
        assert_eq!(rules.commission_rate(BeneficiaryType::Influencer).label(), "20%");
        assert_eq!(rules.commission_rate(BeneficiaryType::Agent).label(), "5%");
        assert_eq!(rules.payout_threshold().cents(), 5000);
    }

    #[test]
    fn test_non_positive_price_is_fatal() {
        let mut rules = FinanceRules::default();
        rules.tier_prices_cents.credits_30 = 0;
        assert!(matches!(
            rules.validate(),
            Err(ValidationError::MustBePositive { .. })
        ));

        rules.tier_prices_cents.credits_30 = -100;
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_rate_bounds() {
        let mut rules = FinanceRules::default();
        rules.store_fee_bps = 10_001;
        assert!(rules.validate().is_err());

        let mut rules = FinanceRules::default();
        rules.usd_brl_rate = ExchangeRate::from_scaled(0);
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_partial_rules_fill_defaults() {
        let rules: FinanceRules = serde_json::from_str(r#"{ "store_fee_bps": 3000 }"#).unwrap();
        assert_eq!(rules.store_fee_bps, 3000);
        assert_eq!(rules.influencer_commission_bps, 2000);
        assert_eq!(rules.usd_brl_rate.scaled(), 55_000);
    }
}
