//! # API Error Types
//!
//! Error types for everything that crosses the process boundary.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        API Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Schema              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Http           │  │  Schema (bad payload)   │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  (bad JSON or values)   │ │
//! │  │  ConfigLoad/Save│  │  Status 4xx/5xx │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │     Domain      │  CoreError from psiuu-core (validation,          │
//! │  │  Core(CoreError)│  reconciliation, invalid input)                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use psiuu_core::CoreError;
use thiserror::Error;

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Failures of the I/O layer.
#[derive(Debug, Error)]
pub enum ApiError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid finance configuration: {0}")]
    InvalidConfig(String),

    /// Invalid API base URL.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Call took longer than the configured limit.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// 401 from the API.
    #[error("Unauthorized: check PSIUU_API_TOKEN")]
    Unauthorized,

    /// 404 from the API.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-2xx status.
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    // =========================================================================
    // Schema Errors
    // =========================================================================
    /// Payload is not valid JSON, or lacks the expected shape or values.
    #[error("Unexpected payload from {endpoint}: {reason}")]
    Schema { endpoint: String, reason: String },

    // =========================================================================
    // Domain Errors
    // =========================================================================
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Payout actions need real data; these collections came from mock.
    #[error("Payout actions disabled: {0} served from mock data")]
    MockData(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ApiError {
    fn from(err: toml::de::Error) -> Self {
        ApiError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ApiError {
    fn from(err: toml::ser::Error) -> Self {
        ApiError::ConfigSaveFailed(err.to_string())
    }
}

impl From<psiuu_core::ValidationError> for ApiError {
    fn from(err: psiuu_core::ValidationError) -> Self {
        ApiError::Core(CoreError::Validation(err))
    }
}

impl ApiError {
    /// Creates a schema error for an endpoint.
    pub fn schema(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        ApiError::Schema {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the same request may succeed if sent again.
    ///
    /// ## Retryable Errors
    /// - Connection failures and timeouts
    /// - 5xx and 429 responses
    ///
    /// ## Non-Retryable Errors
    /// - Configuration and schema errors
    /// - 4xx other than 429
    /// - Domain errors
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Http(e) => e.is_connect() || e.is_timeout(),
            ApiError::Timeout(_) => true,
            ApiError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ApiError::InvalidConfig(_)
                | ApiError::InvalidUrl(_)
                | ApiError::ConfigLoadFailed(_)
                | ApiError::ConfigSaveFailed(_)
                | ApiError::Unauthorized
        )
    }

    /// Returns true if the API answered with a payload we cannot use.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, ApiError::Schema { .. })
    }

    /// Returns true for a reconciliation failure from the core.
    pub fn is_reconciliation_error(&self) -> bool {
        matches!(self, ApiError::Core(CoreError::Reconciliation { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ApiError::Timeout(10).is_retryable());
        assert!(ApiError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(ApiError::Status {
            status: 429,
            body: String::new()
        }
        .is_retryable());

        assert!(!ApiError::Status {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!ApiError::schema("/finance/sales", "missing data").is_retryable());
        assert!(!ApiError::Unauthorized.is_retryable());
    }

    #[test]
    fn test_categories() {
        assert!(ApiError::InvalidUrl("x".into()).is_config_error());
        assert!(ApiError::schema("/finance/payouts", "bad status").is_schema_error());

        let err: ApiError = CoreError::Reconciliation {
            payout_id: "pay-1".into(),
            expected: psiuu_core::Money::from_cents(100),
            actual: psiuu_core::Money::from_cents(99),
        }
        .into();
        assert!(err.is_reconciliation_error());
        assert!(!err.is_schema_error());
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::schema("/finance/sales", "valorBruto is NaN");
        assert_eq!(
            err.to_string(),
            "Unexpected payload from /finance/sales: valorBruto is NaN"
        );
    }
}
