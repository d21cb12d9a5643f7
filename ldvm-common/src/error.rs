//ldvm-common/src/error.rs
//! Standardized error types for all ledger components

use num_bigint::BigUint;
use thiserror::Error;

/// Standard result type used throughout the ledger core
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Every rejection the ledger core can produce.
///
/// All variants are recoverable: a failure rejects one operation or one
/// transaction, never the process.
#[derive(Error, Debug)]
pub enum LedgerError {
    // Amount errors
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient {symbol} balance, expected {expected}, got {got}")]
    InsufficientBalance {
        symbol: String,
        expected: BigUint,
        got: BigUint,
    },

    // Replay guard errors
    #[error("nonce mismatch, expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },

    #[error("nonce {nonce} not exists at {expire}")]
    NonceNotFound { expire: u64, nonce: u64 },

    #[error("nonce {nonce} exists at {expire}")]
    NonceExists { expire: u64, nonce: u64 },

    #[error("too many nonce groups, expected <= {max}")]
    TooManyNonceGroups { max: usize },

    // Account type errors
    #[error("invalid account type: {0}")]
    InvalidAccountType(String),

    #[error("{tx_type} is not allowed as {role}")]
    RoleNotAllowed { tx_type: String, role: &'static str },

    // Authorization errors
    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),

    // Lending errors
    #[error("lending error: {0}")]
    LendingState(String),

    // Transaction shape errors
    #[error("syntactic error: {0}")]
    Syntactic(String),

    // Gas price and gas limit errors
    #[error("invalid fee: {0}")]
    InvalidFee(String),

    // Configuration errors
    #[error("config error: {0}")]
    Config(String),

    // Serialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("internal error: {0}")]
    Internal(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error annotated with the account, operation or transaction that
    /// produced it.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<LedgerError>,
    },
}

impl LedgerError {
    /// Create a new invalid amount error
    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    /// Create a new insufficient balance error
    pub fn insufficient(symbol: impl ToString, expected: &BigUint, got: &BigUint) -> Self {
        Self::InsufficientBalance {
            symbol: symbol.to_string(),
            expected: expected.clone(),
            got: got.clone(),
        }
    }

    /// Create a new account type error
    pub fn account_type(msg: impl Into<String>) -> Self {
        Self::InvalidAccountType(msg.into())
    }

    /// Create a new authorization error
    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::AuthorizationFailed(msg.into())
    }

    /// Create a new lending state error
    pub fn lending(msg: impl Into<String>) -> Self {
        Self::LendingState(msg.into())
    }

    /// Create a new syntactic error
    pub fn syntactic(msg: impl Into<String>) -> Self {
        Self::Syntactic(msg.into())
    }

    /// Create a new fee error
    pub fn fee(msg: impl Into<String>) -> Self {
        Self::InvalidFee(msg.into())
    }

    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap this error with the identity of the operation that failed
    pub fn wrap(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error kind, looking through every context layer
    pub fn root(&self) -> &LedgerError {
        let mut err = self;
        while let LedgerError::Context { source, .. } = err {
            err = source.as_ref();
        }
        err
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        LedgerError::serialization(err.to_string())
    }
}

/// Attach operation context to a [`LedgerResult`]
pub trait ErrorContext<T> {
    /// Prefix the error (if any) with `context`
    fn context(self, context: impl Into<String>) -> LedgerResult<T>;

    /// Prefix the error (if any) with a lazily built context
    fn with_context<F, S>(self, f: F) -> LedgerResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ErrorContext<T> for LedgerResult<T> {
    fn context(self, context: impl Into<String>) -> LedgerResult<T> {
        self.map_err(|e| e.wrap(context))
    }

    fn with_context<F, S>(self, f: F) -> LedgerResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.wrap(f()))
    }
}

/// Convenience macro for creating LedgerError instances
#[macro_export]
macro_rules! ldvm_error {
    ($variant:ident, $($arg:tt)*) => {
        $crate::error::LedgerError::$variant(format!($($arg)*))
    };
}

/// Convenience macro for returning early with a LedgerError
#[macro_export]
macro_rules! ldvm_bail {
    ($variant:ident, $($arg:tt)*) => {
        return Err($crate::ldvm_error!($variant, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_looks_through_context() {
        let err = LedgerError::NonceMismatch {
            expected: 1,
            got: 2,
        }
        .wrap("Account(0x00).SubtractByNonce")
        .wrap("TxTransfer(abc).accept");

        assert!(matches!(
            err.root(),
            LedgerError::NonceMismatch {
                expected: 1,
                got: 2
            }
        ));
        assert_eq!(
            err.to_string(),
            "TxTransfer(abc).accept: Account(0x00).SubtractByNonce: nonce mismatch, expected 1, got 2"
        );
    }

    #[test]
    fn test_context_extension() {
        let res: LedgerResult<()> = Err(LedgerError::lending("not open"));
        let err = res.context("Account(0x01).Borrow").unwrap_err();
        assert!(matches!(err.root(), LedgerError::LendingState(_)));
        assert!(err.to_string().starts_with("Account(0x01).Borrow"));
    }

    #[test]
    fn test_macros() {
        fn fails() -> LedgerResult<()> {
            ldvm_bail!(Syntactic, "invalid from {}", 0);
        }
        let err = fails().unwrap_err();
        assert_eq!(err.to_string(), "syntactic error: invalid from 0");

        let err = ldvm_error!(Internal, "boom {}", 1);
        assert!(matches!(err, LedgerError::Internal(_)));
    }

    #[test]
    fn test_bincode_error_is_serialization() {
        let err: LedgerError = bincode::deserialize::<u64>(&[1, 2]).unwrap_err().into();
        assert!(matches!(err, LedgerError::Serialization(_)));
        assert!(err.to_string().starts_with("serialization error: "));
    }

    #[test]
    fn test_insufficient_display() {
        let err = LedgerError::insufficient("$LDC", &BigUint::from(10u32), &BigUint::from(3u32));
        assert_eq!(
            err.to_string(),
            "insufficient $LDC balance, expected 10, got 3"
        );
    }
}
