// lib.rs

pub mod config;
pub mod handlers;
pub mod pipeline;
pub mod types;

pub use config::FeeConfig;
pub use handlers::{handler_for, TxHandler};
pub use pipeline::{
    accept, apply_transaction, syntactic_verify, verify, AuthorizedTx, Phase, Receipt, TxBase,
    TxContext, ValidatedTx,
};
pub use types::{AccountInfo, BorrowTerms, NonceTableInput, Transaction, TxData};
