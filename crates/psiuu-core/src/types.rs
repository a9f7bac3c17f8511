//! # Domain Types
//!
//! Core records the dashboard works with.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Sale       │   │   Influencer    │   │     Agent       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  tier, gross    │   │  coupon_code    │   │  email          │       │
//! │  │  store_fee      │   │  agent_id ──────┼──►│  influencers    │       │
//! │  │  commissions    │   │  balance        │   │  balance        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  LedgerEntry    │   │    InfraCost    │   │  BankAccount    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Revenue/Expense│   │  SMS/WhatsApp   │   │  BRL / USD      │       │
//! │  │  gross / net    │   │  total_cost     │   │  balance        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Payouts live in [`crate::payout`], extract lines in [`crate::extract`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::{Currency, Money};

// =============================================================================
// Package Tier
// =============================================================================

/// A credit package sold in the app. Prices come from [`crate::rules::FinanceRules`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PackageTier {
    #[serde(rename = "8_creditos")]
    Credits8,
    #[serde(rename = "15_creditos")]
    Credits15,
    #[serde(rename = "30_creditos")]
    Credits30,
}

impl PackageTier {
    /// Every tier, cheapest first.
    pub const ALL: [PackageTier; 3] = [
        PackageTier::Credits8,
        PackageTier::Credits15,
        PackageTier::Credits30,
    ];

    /// Number of credits in the package.
    pub const fn credits(&self) -> u32 {
        match self {
            PackageTier::Credits8 => 8,
            PackageTier::Credits15 => 15,
            PackageTier::Credits30 => 30,
        }
    }

    /// Label shown on extracts: "15 Créditos".
    pub fn label(&self) -> String {
        format!("{} Créditos", self.credits())
    }

    /// Wire name: "15_creditos".
    pub const fn code(&self) -> &'static str {
        match self {
            PackageTier::Credits8 => "8_creditos",
            PackageTier::Credits15 => "15_creditos",
            PackageTier::Credits30 => "30_creditos",
        }
    }
}

impl fmt::Display for PackageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for PackageTier {
    type Err = CoreError;

    /// Accepts the wire code ("15_creditos") or the bare credit count ("15").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "8_creditos" | "8" => Ok(PackageTier::Credits8),
            "15_creditos" | "15" => Ok(PackageTier::Credits15),
            "30_creditos" | "30" => Ok(PackageTier::Credits30),
            other => Err(CoreError::invalid_input(
                "package tier",
                format!(
                    "unknown tier '{}'. Valid options: 8_creditos, 15_creditos, 30_creditos",
                    other
                ),
            )),
        }
    }
}

// =============================================================================
// Sale Status / Payment Method
// =============================================================================

/// Status of a credit-package purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Payment captured; counts toward revenue and commissions.
    Approved,
    /// Waiting on the payment processor.
    #[default]
    Pending,
    /// Refunded.
    Reversed,
}

/// How the buyer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    Pix,
    InAppPurchase,
}

// =============================================================================
// Beneficiaries
// =============================================================================

/// Who receives a commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BeneficiaryType {
    Influencer,
    Agent,
}

impl fmt::Display for BeneficiaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeneficiaryType::Influencer => write!(f, "influencer"),
            BeneficiaryType::Agent => write!(f, "agent"),
        }
    }
}

/// Active flag shared by influencers and agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PartnerStatus {
    #[default]
    Active,
    Inactive,
}

/// Identifies a beneficiary without the rest of its profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BeneficiaryRef {
    pub id: String,
    pub name: String,
    pub kind: BeneficiaryType,
}

/// An influencer who refers buyers with a coupon code.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Influencer {
    pub id: String,
    pub name: String,
    pub coupon_code: String,
    pub instagram_handle: String,
    pub status: PartnerStatus,
    /// Agent managing this influencer, if any.
    pub agent_id: Option<String>,
    /// Number of referred sales (as reported by the API).
    pub total_sales: u32,
    /// Balance reported by the API; not used for payout math.
    pub balance_available: Money,
    #[ts(as = "String")]
    pub registered_at: DateTime<Utc>,
}

impl Influencer {
    pub fn as_beneficiary(&self) -> BeneficiaryRef {
        BeneficiaryRef {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: BeneficiaryType::Influencer,
        }
    }
}

/// An agent who manages a portfolio of influencers.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub email: String,
    pub influencers_count: u32,
    /// Balance reported by the API; not used for payout math.
    pub balance_available: Money,
    pub status: PartnerStatus,
}

impl Agent {
    pub fn as_beneficiary(&self) -> BeneficiaryRef {
        BeneficiaryRef {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: BeneficiaryType::Agent,
        }
    }
}

/// Looks up the agent managing `influencer_id`.
pub fn resolve_agent<'a>(influencer_id: &str, influencers: &'a [Influencer]) -> Option<&'a str> {
    influencers
        .iter()
        .find(|i| i.id == influencer_id)
        .and_then(|i| i.agent_id.as_deref())
}

// =============================================================================
// Sale
// =============================================================================

/// One credit-package purchase.
///
/// Commission fields are computed once by
/// [`crate::allocator::CommissionAllocator`] and frozen on the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub buyer_id: String,
    pub tier: PackageTier,
    pub gross: Money,
    pub store_fee: Money,
    pub influencer_id: Option<String>,
    pub agent_id: Option<String>,
    pub influencer_commission: Money,
    pub agent_commission: Money,
    pub status: SaleStatus,
    pub payment_method: PaymentMethod,
}

impl Sale {
    #[inline]
    pub fn is_approved(&self) -> bool {
        self.status == SaleStatus::Approved
    }

    /// Commission this sale attributes to the given beneficiary, if any.
    ///
    /// Returns `None` when the sale does not reference the beneficiary or the
    /// stored commission is zero.
    pub fn commission_for(&self, kind: BeneficiaryType, beneficiary_id: &str) -> Option<Money> {
        let (owner, amount) = match kind {
            BeneficiaryType::Influencer => (self.influencer_id.as_deref(), self.influencer_commission),
            BeneficiaryType::Agent => (self.agent_id.as_deref(), self.agent_commission),
        };
        match owner {
            Some(id) if id == beneficiary_id && amount.is_positive() => Some(amount),
            _ => None,
        }
    }
}

// =============================================================================
// Ledger Entry
// =============================================================================

/// Side of a manual ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Revenue,
    Expense,
}

/// Settlement status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Confirmed,
    #[default]
    Pending,
    Reversed,
}

/// A manually recorded operating revenue or expense.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub account_id: Option<String>,
    pub cost_center_id: Option<String>,
    pub description: String,
    pub partner: String,
    pub gross: Money,
    pub net: Money,
    pub status: EntryStatus,
    pub entry_type: EntryType,
}

// =============================================================================
// Infrastructure Cost
// =============================================================================

/// Messaging channel an infra cost was incurred on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InfraChannel {
    Sms,
    WhatsApp,
    Email,
}

/// Messaging vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InfraProvider {
    Twilio,
    SendGrid,
    Meta,
}

/// Messaging spend for one channel over one period.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InfraCost {
    pub id: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub channel: InfraChannel,
    pub provider: InfraProvider,
    pub quantity: u64,
    /// Per-message cost in BRL. Often sub-centavo, so display only.
    pub unit_cost_brl: f64,
    /// Total in local currency; this is what gets summed.
    pub total_cost: Money,
}

// =============================================================================
// Bank Account
// =============================================================================

/// A treasury account, read-only from this crate's point of view.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BankAccount {
    pub id: String,
    pub bank_name: String,
    pub account_number: String,
    /// Balance in the account's own currency.
    pub balance: Money,
    pub currency: Currency,
}

// =============================================================================
// Unit Tests
// =============================================================================
