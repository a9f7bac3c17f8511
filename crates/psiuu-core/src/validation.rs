//! # Validation Module
//!
//! Input validation utilities for Psiuu Finance.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Dashboard (TypeScript)                                       │
//! │  └── Empty field checks, immediate feedback                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Schema boundary (psiuu-api)                                  │
//! │  └── Wire payload → domain type, NaN / negative money rejected         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: THIS MODULE                                                  │
//! │  └── Business rule validation, before any remote call                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use psiuu_core::validation::validate_rejection_reason;
//!
//! assert!(validate_rejection_reason("Nota fiscal ilegível").is_ok());
//! assert!(validate_rejection_reason("   ").is_err());
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest invoice reference accepted.
pub const MAX_INVOICE_REF_LEN: usize = 500;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a payout rejection reason.
///
/// Any reason with something other than whitespace is accepted, whatever
/// its length. The reason is stored verbatim; trimming is only used for the
/// emptiness check.
pub fn validate_rejection_reason(reason: &str) -> ValidationResult<()> {
    if reason.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "rejection reason".to_string(),
        });
    }

    Ok(())
}

/// Validates an invoice reference (URL or document id).
pub fn validate_invoice_reference(invoice_ref: &str) -> ValidationResult<()> {
    if invoice_ref.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "invoice reference".to_string(),
        });
    }

    if invoice_ref.chars().count() > MAX_INVOICE_REF_LEN {
        return Err(ValidationError::TooLong {
            field: "invoice reference".to_string(),
            max: MAX_INVOICE_REF_LEN,
        });
    }

    Ok(())
}

/// Validates a record identifier coming from a caller.
pub fn validate_identifier(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > 100 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 100,
        });
    }

    if id.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates a search query over sales.
///
/// ## Returns
/// The trimmed, lowercased query. Empty means "everything".
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_lowercase())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a rate in basis points (0% to 100%).
pub fn validate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
