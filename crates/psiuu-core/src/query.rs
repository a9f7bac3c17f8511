//! Filters for the sales and payout listings.

use crate::payout::{Payout, PayoutStatus};
use crate::types::{BeneficiaryType, PaymentMethod, Sale, SaleStatus};
use crate::validation::{validate_search_query, ValidationResult};

/// Sales listing filter. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub status: Option<SaleStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub influencer_id: Option<String>,
    search: String,
}

impl SaleFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: SaleStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn influencer(mut self, influencer_id: impl Into<String>) -> Self {
        self.influencer_id = Some(influencer_id.into());
        self
    }

    /// Case-insensitive substring search over sale id and buyer id.
    pub fn search(mut self, query: &str) -> ValidationResult<Self> {
        self.search = validate_search_query(query)?;
        Ok(self)
    }

    pub fn matches(&self, sale: &Sale) -> bool {
        if self.status.is_some_and(|s| s != sale.status) {
            return false;
        }
        if self.payment_method.is_some_and(|m| m != sale.payment_method) {
            return false;
        }
        if let Some(id) = &self.influencer_id {
            if sale.influencer_id.as_ref() != Some(id) {
                return false;
            }
        }
        self.search.is_empty()
            || sale.id.to_lowercase().contains(&self.search)
            || sale.buyer_id.to_lowercase().contains(&self.search)
    }

    pub fn apply<'a>(&self, sales: &'a [Sale]) -> Vec<&'a Sale> {
        sales.iter().filter(|s| self.matches(s)).collect()
    }
}

/// Payout listing filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayoutFilter {
    pub status: Option<PayoutStatus>,
    pub beneficiary_type: Option<BeneficiaryType>,
}

impl PayoutFilter {
    pub fn matches(&self, payout: &Payout) -> bool {
        self.status.map_or(true, |s| s == payout.status)
            && self.beneficiary_type.map_or(true, |t| t == payout.beneficiary_type)
    }

    pub fn apply<'a>(&self, payouts: &'a [Payout]) -> Vec<&'a Payout> {
        payouts.iter().filter(|p| self.matches(p)).collect()
    }
}
