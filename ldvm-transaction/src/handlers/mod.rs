//! Concrete transaction types

use crate::config::FeeConfig;
use crate::pipeline::{TxBase, TxContext, ValidatedTx};
use crate::types::{Transaction, TxData};
use ldvm_common::prelude::*;
use num_bigint::BigUint;
use num_traits::Zero;

mod account;
mod lending;
mod token;
mod transfer;

pub use account::{AddNonceTableHandler, UpdateAccountInfoHandler};
pub use lending::{BorrowHandler, CloseLendingHandler, OpenLendingHandler, RepayHandler};
pub use token::{CreateStakeHandler, CreateTokenHandler, DestroyStakeHandler, DestroyTokenHandler};
pub use transfer::TransferHandler;

/// Type specific hooks of the pipeline
pub trait TxHandler: Send + Sync {
    /// Shape checks beyond the generic ones
    fn syntactic(&self, tx: &Transaction, fees: &FeeConfig) -> LedgerResult<()>;

    /// Whether the generic accept step moves `amount` from sender to recipient
    fn moves_amount(&self) -> bool {
        true
    }

    /// Whether the sender must pass the stricter keeper check
    fn plus_verified(&self) -> bool {
        false
    }

    /// Read-only checks after the generic ones
    fn verify(&self, _validated: &ValidatedTx, _base: &TxBase, _ctx: &TxContext<'_>) -> LedgerResult<()> {
        Ok(())
    }

    /// Type specific effect after the generic accept step; returns the amount
    /// actually settled
    fn apply(&self, _validated: &ValidatedTx, base: &TxBase, _ctx: &TxContext<'_>) -> LedgerResult<BigUint> {
        Ok(base.amount.clone())
    }
}

/// The handler of `tx_type`
pub fn handler_for(tx_type: TxType) -> &'static dyn TxHandler {
    match tx_type {
        TxType::Transfer => &TransferHandler,
        TxType::UpdateAccountInfo => &UpdateAccountInfoHandler,
        TxType::AddNonceTable => &AddNonceTableHandler,
        TxType::CreateToken => &CreateTokenHandler,
        TxType::DestroyToken => &DestroyTokenHandler,
        TxType::CreateStake => &CreateStakeHandler,
        TxType::DestroyStake => &DestroyStakeHandler,
        TxType::OpenLending => &OpenLendingHandler,
        TxType::CloseLending => &CloseLendingHandler,
        TxType::Borrow => &BorrowHandler,
        TxType::Repay => &RepayHandler,
    }
}

pub(crate) fn require_to(tx: &Transaction) -> LedgerResult<Address> {
    tx.to.ok_or_else(|| LedgerError::syntactic("nil to"))
}

pub(crate) fn forbid_to(tx: &Transaction) -> LedgerResult<()> {
    if tx.to.is_some() {
        return Err(LedgerError::syntactic("invalid to, should be nil"));
    }
    Ok(())
}

pub(crate) fn forbid_token(tx: &Transaction) -> LedgerResult<()> {
    if tx.token.is_some() {
        return Err(LedgerError::syntactic("invalid token, should be nil"));
    }
    Ok(())
}

pub(crate) fn require_amount(tx: &Transaction) -> LedgerResult<&BigUint> {
    match &tx.amount {
        Some(amount) if !amount.is_zero() => Ok(amount),
        _ => Err(LedgerError::invalid_amount("amount must be positive")),
    }
}

pub(crate) fn forbid_amount(tx: &Transaction) -> LedgerResult<()> {
    if tx.amount.is_some() {
        return Err(LedgerError::syntactic("invalid amount, should be nil"));
    }
    Ok(())
}

pub(crate) fn forbid_data(tx: &Transaction) -> LedgerResult<()> {
    if tx.data != TxData::None {
        return Err(LedgerError::syntactic("invalid data, should be nil"));
    }
    Ok(())
}
