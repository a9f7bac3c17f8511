//! # Error Types
//!
//! Domain-specific error types for psiuu-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  psiuu-core errors (this file)                                         │
//! │  ├── CoreError        - Domain taxonomy                                 │
//! │  │   ├── InvalidInput      unknown tier, NaN / negative money          │
//! │  │   ├── Validation        bad transition, empty rejection reason      │
//! │  │   ├── Reconciliation    extract does not add up to payout amount    │
//! │  │   └── ExternalCall      one payout failed at the remote API         │
//! │  └── ValidationError  - Checked before any external effect             │
//! │                                                                         │
//! │  psiuu-api errors (separate crate)                                     │
//! │  └── ApiError         - HTTP, schema, config failures                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → Dashboard              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input could not be interpreted.
    ///
    /// ## When This Occurs
    /// - Unknown package tier name
    /// - Monetary value is NaN, infinite or negative where not permitted
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The extract rebuilt from sales does not add up to the payout amount.
    ///
    /// ## When This Occurs
    /// - A sale was reversed after the payout snapshot was taken
    /// - The payout amount was edited outside the lifecycle
    /// - Sales attribution changed after the payout was opened
    ///
    /// Never suppress this one: it means the books disagree.
    #[error("Extract for payout {payout_id} sums to {actual}, expected {expected}")]
    Reconciliation {
        payout_id: String,
        expected: Money,
        actual: Money,
    },

    /// A remote call for a single payout failed.
    #[error("External call failed for payout {payout_id}: {message}")]
    ExternalCall { payout_id: String, message: String },

    /// Payout cannot be found in the current collection.
    #[error("Payout not found: {0}")]
    PayoutNotFound(String),
}

impl CoreError {
    /// Creates an InvalidInput error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors raised before any external effect.
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input and state validation errors.
///
/// Raised locally, before the remote API is ever called.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or blank.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The payout state machine has no edge for this action.
    ///
    /// ## User Workflow
    /// ```text
    /// Reviewer clicks "Aprovar" on a payout already Paid
    ///      │
    ///      ▼
    /// InvalidTransition { from: "paid", action: "approve" }
    ///      │
    ///      ▼
    /// Payout left untouched, no API call made
    /// ```
    #[error("Payout {payout_id} is {from}, cannot {action}")]
    InvalidTransition {
        payout_id: String,
        from: String,
        action: String,
    },

    /// Payout selected for batch payment is not Approved.
    #[error("Payout {payout_id} is {status}, only approved payouts can be paid")]
    NotSelectable { payout_id: String, status: String },

    /// Beneficiary already has a payout that has not reached a terminal state.
    #[error("Beneficiary {beneficiary_id} already has open payout {payout_id}")]
    PayoutAlreadyOpen {
        beneficiary_id: String,
        payout_id: String,
    },

    /// Balance does not exceed the payout threshold.
    #[error("Balance {balance} for {beneficiary_id} does not exceed threshold {threshold}")]
    BelowPayoutThreshold {
        beneficiary_id: String,
        balance: Money,
        threshold: Money,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
