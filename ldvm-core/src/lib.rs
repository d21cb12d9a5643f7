// lib.rs - LDVM Core Library
//! # LDVM Core
//!
//! Drives the ledger core over batches of transactions.
//!
//! ## Architecture
//!
//! - **ChainConfig**: chain id, block builder and fee schedule, loaded from
//!   TOML, JSON or YAML
//! - **BatchExecutor**: runs the three-phase pipeline per transaction,
//!   committing accepted ones and checking out after rejected ones
//!
//! ## Example
//!
//! ```
//! use ldvm_common::prelude::*;
//! use ldvm_core::{BatchExecutor, ChainConfig};
//! use ldvm_state::MemoryState;
//!
//! let config = ChainConfig::default();
//! let state = MemoryState::new(1, 1_000, config.fees.fee_sink);
//! let outcome = BatchExecutor::new(&config, &Ed25519Verifier)
//!     .apply_batch(&state, Vec::new())
//!     .unwrap();
//! assert!(outcome.rejections.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Configuration module
#[allow(missing_docs)]
pub mod config;

/// Batch execution
#[allow(missing_docs)]
pub mod executor;

/// Prelude with commonly used types
pub mod prelude {
    pub use crate::config::ChainConfig;
    pub use crate::executor::{BatchExecutor, BatchOutcome, Rejection};
    pub use ldvm_common::prelude::*;
}

pub use config::ChainConfig;
pub use executor::{BatchExecutor, BatchOutcome, Rejection};

/// LDVM core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
