//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type MarketResult<T> = Result<T, MarketError>;

/// Domain-level error.
///
/// Every variant is a deterministic, synchronous refusal that is recoverable
/// by the caller (retry with corrected input). A failed operation leaves
/// registry and ledger state exactly as it was before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarketError {
    /// Caller lacks the required role or ownership.
    #[error("unauthorized")]
    Unauthorized,

    /// Referenced product or store does not exist.
    #[error("not found")]
    NotFound,

    /// A product with this id already exists in the catalog.
    #[error("duplicate product")]
    DuplicateProduct,

    /// Requested quantity exceeds the current stock level.
    #[error("insufficient stock")]
    InsufficientStock,

    /// Tendered payment does not match the exact purchase cost.
    #[error("incorrect payment")]
    IncorrectPayment,

    /// Requested withdrawal exceeds the collected balance.
    #[error("insufficient balance")]
    InsufficientBalance,

    /// Arithmetic would exceed the representable range.
    #[error("overflow")]
    Overflow,

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The external funds transfer refused or failed; state was rolled back.
    #[error("transfer failed: {0}")]
    TransferFailed(String),
}

impl MarketError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn transfer_failed(msg: impl Into<String>) -> Self {
        Self::TransferFailed(msg.into())
    }
}
