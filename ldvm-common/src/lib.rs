//! # LDVM Common
//!
//! Shared building blocks of the LDVM ledger core: the error taxonomy,
//! fixed-byte identifiers, transaction type tags, hashing, the signature
//! capability and canonical encoding.
//!
//! ## Modules
//!
//! - **error**: `LedgerError`, context wrapping and convenience macros
//! - **types**: addresses, symbols, keys, `TxType` and limits
//! - **crypto**: SHA-256 helpers, Merkle root, `SignatureVerifier`
//! - **validation**: symbol, keeper, rate and amount checks
//! - **serialization**: canonical `bincode` encoding and content hashes

#![warn(rustdoc::missing_crate_level_docs)]

pub mod crypto;
pub mod error;
pub mod serialization;
pub mod types;
pub mod validation;

/// Re-export commonly used types and traits
pub mod prelude {
    pub use crate::crypto::{CryptoUtils, Ed25519Verifier, Keypair, SignatureVerifier};
    pub use crate::error::{ErrorContext, LedgerError, LedgerResult};
    pub use crate::serialization::{HashCompute, LedgerSerialize};
    pub use crate::types::{
        amount_serde, limits, Address, BlockHeight, Hash, PublicKey, Signature, StakeSymbol,
        Timestamp, TokenSymbol, TxType, NATIVE_TOKEN,
    };
    pub use crate::validation::ValidationUtils;
}

/// LDVM Common crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
