//! # LDVM State
//!
//! The account aggregate and everything layered on it.
//!
//! ## Architecture Overview
//!
//! ### [`Account`]
//! - Native balance and token balances; the spendable native balance
//!   excludes the pledge
//! - Sequential nonce plus a capped table of expiring one-time nonces
//! - Keeper threshold, two-tier "plus" verification and the approver gate
//! - Kind state machine: native, token issuer, staker
//!
//! ### Lending
//! - One market per account, a side ledger of positions per borrower
//! - Interest is accrued lazily on borrow, repay and queries
//!
//! ### [`ChainState`]
//! - What the transaction pipeline needs from the chain: account loading,
//!   fee sink, reward accounts and commit/checkout snapshots
//! - [`MemoryState`] keeps committed encodings and restores them on checkout
//!
//! ## Example Usage
//!
//! ```
//! use ldvm_common::prelude::*;
//! use ldvm_state::{ChainState, MemoryState};
//! use num_bigint::BigUint;
//!
//! let state = MemoryState::new(1, 1_000, Address::EMPTY);
//! let alice = state.load_account(Address([1u8; 20])).unwrap();
//! alice.add(TokenSymbol::NATIVE, &BigUint::from(100u32)).unwrap();
//! alice.subtract_by_nonce(TokenSymbol::NATIVE, 0, &BigUint::from(10u32)).unwrap();
//! assert_eq!(alice.nonce(), 1);
//! state.commit().unwrap();
//! ```

pub mod account;
pub mod kind;
pub mod lending;
pub mod nonce;
pub mod state;
pub mod token;

pub use account::{Account, AccountData};
pub use kind::{AccountKind, KindTag, StakeConfig};
pub use lending::{accrue, AccountLedger, LendingConfig, LendingEntry};
pub use nonce::NonceTable;
pub use state::{ChainState, MemoryState};
pub use token::{StakeSpec, TokenSpec};
