//! # Payout Lifecycle
//!
//! State machine for a beneficiary's commission payout.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ┌──────────────────┐  SubmitInvoice  ┌──────────────┐                  │
//! │  │ AwaitingInvoice  │ ──────────────► │ UnderReview  │                  │
//! │  └──────────────────┘                 └──────┬───────┘                  │
//! │                                  Approve     │     Reject{reason}       │
//! │                               ┌──────────────┴──────────────┐           │
//! │                               ▼                             ▼           │
//! │                        ┌──────────────┐              ┌──────────────┐   │
//! │                        │   Approved   │              │   Rejected   │   │
//! │                        └──────┬───────┘              └──────────────┘   │
//! │                               │ MarkPaid (batch)          terminal      │
//! │                               ▼                                         │
//! │                        ┌──────────────┐                                 │
//! │                        │     Paid     │  terminal                       │
//! │                        └──────────────┘                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any other (state, action) pair is an `InvalidTransition`. Transitions
//! return an updated copy; the input payout is never touched.
//!
//! The amount is a snapshot taken when the payout is opened. It is never
//! recomputed. Callers must keep at most one transition in flight per payout.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{BeneficiaryRef, BeneficiaryType};
use crate::validation::{validate_invoice_reference, validate_rejection_reason};

// =============================================================================
// Payout Status
// =============================================================================

/// Where a payout is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Opened; the beneficiary has not sent an invoice yet.
    AwaitingInvoice,
    /// Invoice received, waiting for a reviewer.
    UnderReview,
    /// Reviewer accepted the invoice; eligible for batch payment.
    Approved,
    /// Money sent.
    Paid,
    /// Reviewer refused the invoice. The amount goes back to the balance.
    Rejected,
}

impl PayoutStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::AwaitingInvoice => "awaiting_invoice",
            PayoutStatus::UnderReview => "under_review",
            PayoutStatus::Approved => "approved",
            PayoutStatus::Paid => "paid",
            PayoutStatus::Rejected => "rejected",
        }
    }

    /// Label the dashboard shows.
    pub const fn label(&self) -> &'static str {
        match self {
            PayoutStatus::AwaitingInvoice => "Aguardando Nota",
            PayoutStatus::UnderReview => "Em Análise",
            PayoutStatus::Approved => "Aprovado",
            PayoutStatus::Paid => "Pago",
            PayoutStatus::Rejected => "Rejeitado",
        }
    }

    /// No transition leaves a terminal state.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, PayoutStatus::Paid | PayoutStatus::Rejected)
    }

    #[inline]
    pub const fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether the payout's amount is withdrawn from the beneficiary's balance.
    #[inline]
    pub const fn commits_balance(&self) -> bool {
        !matches!(self, PayoutStatus::Rejected)
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payout Action
// =============================================================================

/// An event that moves a payout between states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PayoutAction {
    /// The beneficiary sent an invoice (recorded, not uploaded, here).
    SubmitInvoice { invoice_ref: String },
    Approve,
    /// Reason is mandatory and stored verbatim.
    Reject { reason: String },
    /// Emitted by batch payment processing only.
    MarkPaid,
}

impl PayoutAction {
    pub const fn name(&self) -> &'static str {
        match self {
            PayoutAction::SubmitInvoice { .. } => "submit invoice",
            PayoutAction::Approve => "approve",
            PayoutAction::Reject { .. } => "reject",
            PayoutAction::MarkPaid => "mark paid",
        }
    }
}

/// Target state for `action` from `status`, if the edge exists.
pub fn next_status(status: PayoutStatus, action: &PayoutAction) -> Option<PayoutStatus> {
    use PayoutAction as A;
    use PayoutStatus as S;

    match (status, action) {
        (S::AwaitingInvoice, A::SubmitInvoice { .. }) => Some(S::UnderReview),
        (S::UnderReview, A::Approve) => Some(S::Approved),
        (S::UnderReview, A::Reject { .. }) => Some(S::Rejected),
        (S::Approved, A::MarkPaid) => Some(S::Paid),
        _ => None,
    }
}

// =============================================================================
// Payout
// =============================================================================

/// One pending disbursement to one beneficiary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payout {
    pub id: String,
    pub beneficiary_id: String,
    pub beneficiary_name: String,
    pub beneficiary_type: BeneficiaryType,
    /// Snapshot of the available balance when opened.
    pub amount: Money,
    pub status: PayoutStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub due_date: DateTime<Utc>,
    pub invoice_ref: Option<String>,
    pub rejection_reason: Option<String>,
    pub ticket_id: Option<String>,
}

impl Payout {
    /// Builds a fresh payout in `AwaitingInvoice`.
    ///
    /// No eligibility checks here; see [`crate::balance::open_payout`].
    pub fn new(
        beneficiary: &BeneficiaryRef,
        amount: Money,
        created_at: DateTime<Utc>,
        due_days: u32,
    ) -> Self {
        Payout {
            id: format!("pay_{}", Uuid::new_v4().simple()),
            beneficiary_id: beneficiary.id.clone(),
            beneficiary_name: beneficiary.name.clone(),
            beneficiary_type: beneficiary.kind,
            amount,
            status: PayoutStatus::AwaitingInvoice,
            created_at,
            due_date: created_at + Duration::days(i64::from(due_days)),
            invoice_ref: None,
            rejection_reason: None,
            ticket_id: None,
        }
    }

    pub fn belongs_to(&self, kind: BeneficiaryType, beneficiary_id: &str) -> bool {
        self.beneficiary_type == kind && self.beneficiary_id == beneficiary_id
    }

    /// Orders payouts of one beneficiary: creation time, then id.
    pub fn precedes(&self, other: &Payout) -> bool {
        (self.created_at, self.id.as_str()) < (other.created_at, other.id.as_str())
    }

    /// Applies a lifecycle action and returns the updated payout.
    ///
    /// ## Errors
    /// - `InvalidTransition` when the state machine has no such edge
    /// - `Required` when a rejection reason or invoice reference is blank
    ///
    /// ## Example
    /// ```rust
    /// use chrono::Utc;
    /// use psiuu_core::money::Money;
    /// use psiuu_core::payout::{Payout, PayoutAction, PayoutStatus};
    /// use psiuu_core::types::{BeneficiaryRef, BeneficiaryType};
    ///
    /// let who = BeneficiaryRef { id: "inf-1".into(), name: "Ana".into(), kind: BeneficiaryType::Influencer };
    /// let payout = Payout::new(&who, Money::from_cents(125_000), Utc::now(), 15);
    /// let reviewed = payout
    ///     .apply(&PayoutAction::SubmitInvoice { invoice_ref: "nf-1".into() })
    ///     .unwrap();
    /// assert_eq!(reviewed.status, PayoutStatus::UnderReview);
    /// assert!(payout.apply(&PayoutAction::MarkPaid).is_err());
    /// ```
    pub fn apply(&self, action: &PayoutAction) -> CoreResult<Payout> {
        let next = next_status(self.status, action).ok_or_else(|| ValidationError::InvalidTransition {
            payout_id: self.id.clone(),
            from: self.status.to_string(),
            action: action.name().to_string(),
        })?;

        let mut updated = self.clone();
        match action {
            PayoutAction::SubmitInvoice { invoice_ref } => {
                validate_invoice_reference(invoice_ref)?;
                updated.invoice_ref = Some(invoice_ref.clone());
            }
            PayoutAction::Reject { reason } => {
                validate_rejection_reason(reason)?;
                updated.rejection_reason = Some(reason.clone());
            }
            PayoutAction::Approve | PayoutAction::MarkPaid => {}
        }
        updated.status = next;
        Ok(updated)
    }
}

// =============================================================================
// Listing & Selection
// =============================================================================

/// Resolves a batch selection against the current payouts.
///
/// Every id must exist and be `Approved`. Duplicates are dropped, first
/// occurrence wins. Nothing is returned unless the whole selection is valid.
pub fn validate_batch_selection<'a>(ids: &[String], payouts: &'a [Payout]) -> CoreResult<Vec<&'a Payout>> {
    let mut seen = HashSet::new();
    let mut selected = Vec::with_capacity(ids.len());

    for id in ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        let payout = payouts
            .iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| CoreError::PayoutNotFound(id.clone()))?;
        if payout.status != PayoutStatus::Approved {
            return Err(ValidationError::NotSelectable {
                payout_id: id.clone(),
                status: payout.status.to_string(),
            }
            .into());
        }
        selected.push(payout);
    }

    Ok(selected)
}

/// The payouts a batch may currently include.
pub fn selectable_for_payment(payouts: &[Payout]) -> impl Iterator<Item = &Payout> {
    payouts.iter().filter(|p| p.status == PayoutStatus::Approved)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [PayoutStatus; 5] = [
        PayoutStatus::AwaitingInvoice,
        PayoutStatus::UnderReview,
        PayoutStatus::Approved,
        PayoutStatus::Paid,
        PayoutStatus::Rejected,
    ];

    fn all_actions() -> Vec<PayoutAction> {
        vec![
            PayoutAction::SubmitInvoice {
                invoice_ref: "nf-1".to_string(),
            },
            PayoutAction::Approve,
            PayoutAction::Reject {
                reason: "CNPJ divergente".to_string(),
            },
            PayoutAction::MarkPaid,
        ]
    }

    fn payout_in(status: PayoutStatus) -> Payout {
        let who = BeneficiaryRef {
            id: "inf-1".to_string(),
            name: "Ana".to_string(),
            kind: BeneficiaryType::Influencer,
        };
        let mut p = Payout::new(&who, Money::from_cents(125_000), Utc::now(), 15);
        p.status = status;
        p
    }

    #[test]
    fn test_only_listed_edges_are_allowed() {
        let allowed = [
            (PayoutStatus::AwaitingInvoice, "submit invoice", PayoutStatus::UnderReview),
            (PayoutStatus::UnderReview, "approve", PayoutStatus::Approved),
            (PayoutStatus::UnderReview, "reject", PayoutStatus::Rejected),
            (PayoutStatus::Approved, "mark paid", PayoutStatus::Paid),
        ];

        for status in ALL_STATUSES {
            for action in all_actions() {
                let payout = payout_in(status);
                let result = payout.apply(&action);
                let expected = allowed
                    .iter()
                    .find(|(from, name, _)| *from == status && *name == action.name());

                match expected {
                    Some((_, _, to)) => assert_eq!(result.unwrap().status, *to),
                    None => {
                        let err = result.unwrap_err();
                        assert!(matches!(
                            err,
                            CoreError::Validation(ValidationError::InvalidTransition { .. })
                        ));
                        assert_eq!(payout.status, status);
                    }
                }
            }
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(PayoutStatus::Paid.is_terminal());
        assert!(PayoutStatus::Rejected.is_terminal());
        assert!(PayoutStatus::Approved.is_open());
        assert!(!PayoutStatus::Rejected.commits_balance());
        assert!(PayoutStatus::Paid.commits_balance());
    }

    #[test]
    fn test_reject_requires_reason() {
        let payout = payout_in(PayoutStatus::UnderReview);
        for blank in ["", "   ", "\n\t"] {
            let err = payout
                .apply(&PayoutAction::Reject {
                    reason: blank.to_string(),
                })
                .unwrap_err();
            assert!(err.is_validation());
        }
        assert_eq!(payout.status, PayoutStatus::UnderReview);
        assert_eq!(payout.rejection_reason, None);
    }

    #[test]
    fn test_reject_stores_reason_verbatim() {
        let reason = "  Nota sem CNPJ  ".to_string();
        let rejected = payout_in(PayoutStatus::UnderReview)
            .apply(&PayoutAction::Reject { reason: reason.clone() })
            .unwrap();
        assert_eq!(rejected.status, PayoutStatus::Rejected);
        assert_eq!(rejected.rejection_reason, Some(reason));
    }

    #[test]
    fn test_reject_accepts_long_reason() {
        let reason = format!("Divergências na nota: {}", "x".repeat(5000));
        let rejected = payout_in(PayoutStatus::UnderReview)
            .apply(&PayoutAction::Reject { reason: reason.clone() })
            .unwrap();
        assert_eq!(rejected.status, PayoutStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some(reason.as_str()));
    }

    #[test]
    fn test_submit_invoice_records_reference() {
        let reviewed = payout_in(PayoutStatus::AwaitingInvoice)
            .apply(&PayoutAction::SubmitInvoice {
                invoice_ref: "https://files/nf-42.pdf".to_string(),
            })
            .unwrap();
        assert_eq!(reviewed.invoice_ref.as_deref(), Some("https://files/nf-42.pdf"));
    }

    #[test]
    fn test_due_date_from_creation() {
        let p = payout_in(PayoutStatus::AwaitingInvoice);
        assert_eq!(p.due_date - p.created_at, Duration::days(15));
    }

    #[test]
    fn test_batch_selection() {
        let approved = payout_in(PayoutStatus::Approved);
        let review = payout_in(PayoutStatus::UnderReview);
        let payouts = vec![approved.clone(), review.clone()];

        let ok = validate_batch_selection(&[approved.id.clone(), approved.id.clone()], &payouts).unwrap();
        assert_eq!(ok.len(), 1);

        let err = validate_batch_selection(&[approved.id.clone(), review.id.clone()], &payouts).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::NotSelectable { .. })
        ));

        let err = validate_batch_selection(&["pay_missing".to_string()], &payouts).unwrap_err();
        assert!(matches!(err, CoreError::PayoutNotFound(_)));

        assert_eq!(selectable_for_payment(&payouts).count(), 1);
    }
}
