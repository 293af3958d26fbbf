//! Store error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;

/// Result type used by store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level violation.
///
/// Raised by inventory/ledger operations when a caller attempts a mutation that
/// would break a store invariant. These are local, typed failures: the plan
/// interpreter either resolves them into a business status or reports them as
/// a fault.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("not found: {id}")]
    NotFound { id: String },

    /// A stock adjustment would leave the quantity negative (or overflow).
    #[error("invalid adjustment for {item_id}: {available} in stock, delta {delta}")]
    InvalidAdjustment {
        item_id: String,
        available: i64,
        delta: i64,
    },

    /// An identifier is already taken.
    #[error("duplicate id: {id}")]
    DuplicateId { id: String },

    /// A supplied `balance_after` does not continue the chain.
    #[error("balance mismatch: expected {expected}, got {actual}")]
    BalanceMismatch { expected: Money, actual: Money },

    /// A value failed validation (empty name, negative price, overflow...).
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// The store could not be acquired (e.g. a poisoned handle).
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    /// Loading or saving the store failed.
    #[error("persistence failed: {message}")]
    Persistence { message: String },
}

impl StoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn duplicate(id: impl Into<String>) -> Self {
        Self::DuplicateId { id: id.into() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable {
            message: msg.into(),
        }
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence {
            message: msg.into(),
        }
    }

    /// Short machine-readable code, used in logs and fault records.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "not_found",
            StoreError::InvalidAdjustment { .. } => "invalid_adjustment",
            StoreError::DuplicateId { .. } => "duplicate_id",
            StoreError::BalanceMismatch { .. } => "balance_mismatch",
            StoreError::Validation { .. } => "validation",
            StoreError::Unavailable { .. } => "unavailable",
            StoreError::Persistence { .. } => "persistence",
        }
    }
}
