//! Service-level error taxonomy and its HTTP mapping

use rust_decimal::Decimal;
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::{PositionError, ReferralError, WalletError};
use crate::ports::StoreError;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Missing or out-of-range input; nothing was changed
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: Decimal, requested: Decimal },

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn user_not_found() -> Self {
        LedgerError::NotFound("User not found".to_string())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            LedgerError::Validation(_) | LedgerError::InsufficientBalance { .. } => 400,
            LedgerError::NotFound(_) => 404,
            LedgerError::Store(_) | LedgerError::Internal(_) => 500,
        }
    }

    /// JSON body returned to callers
    pub fn to_body(&self) -> Value {
        match self {
            LedgerError::Validation(msg) => json!({ "error": "Validation failed", "details": msg }),
            LedgerError::NotFound(msg) => json!({ "error": msg }),
            LedgerError::InsufficientBalance { available, requested } => json!({
                "error": "Insufficient balance",
                "availableAmount": available.normalize().to_string(),
                "requestedAmount": requested.normalize().to_string(),
            }),
            LedgerError::Store(e) => json!({ "error": "Internal error", "details": e.to_string() }),
            LedgerError::Internal(msg) => json!({ "error": "Internal error", "details": msg }),
        }
    }
}

impl From<PositionError> for LedgerError {
    fn from(e: PositionError) -> Self {
        match e {
            PositionError::InsufficientBalance { available, requested } => {
                LedgerError::InsufficientBalance { available, requested }
            }
            other => LedgerError::Validation(other.to_string()),
        }
    }
}

impl From<WalletError> for LedgerError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::NotFound(_) => LedgerError::NotFound("Wallet not found".to_string()),
            other => LedgerError::Validation(other.to_string()),
        }
    }
}

impl From<ReferralError> for LedgerError {
    fn from(e: ReferralError) -> Self {
        LedgerError::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_codes() {
        assert_eq!(LedgerError::Validation("x".into()).status_code(), 400);
        assert_eq!(LedgerError::user_not_found().status_code(), 404);
        assert_eq!(
            LedgerError::InsufficientBalance { available: dec!(15), requested: dec!(100) }.status_code(),
            400
        );
        assert_eq!(LedgerError::from(StoreError::WriteError("disk".into())).status_code(), 500);
    }

    #[test]
    fn test_insufficient_balance_body() {
        let err: LedgerError = PositionError::InsufficientBalance {
            available: dec!(15.000),
            requested: dec!(100),
        }
        .into();
        let body = err.to_body();
        assert_eq!(body["availableAmount"], "15");
        assert_eq!(body["requestedAmount"], "100");
    }

    #[test]
    fn test_domain_conversions() {
        assert!(matches!(
            LedgerError::from(WalletError::NotFound("main".into())),
            LedgerError::NotFound(_)
        ));
        assert!(matches!(
            LedgerError::from(WalletError::InvalidGasLimit(1)),
            LedgerError::Validation(_)
        ));
        let err = LedgerError::from(ReferralError::AlreadyReferred);
        assert_eq!(err.to_body()["details"], "User has already been referred");
    }
}
