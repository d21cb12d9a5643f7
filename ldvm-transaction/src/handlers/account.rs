use super::{forbid_amount, forbid_to, forbid_token, TxHandler};
use crate::config::FeeConfig;
use crate::pipeline::{TxBase, TxContext, ValidatedTx};
use crate::types::{AccountInfo, NonceTableInput, Transaction, TxData};
use ldvm_common::prelude::*;
use num_bigint::BigUint;

/// Replace the sender's keepers, threshold and approver
pub struct UpdateAccountInfoHandler;

fn account_info(tx: &Transaction) -> LedgerResult<&AccountInfo> {
    match &tx.data {
        TxData::AccountInfo(info) => Ok(info),
        _ => Err(LedgerError::syntactic("invalid data, expected account info")),
    }
}

impl TxHandler for UpdateAccountInfoHandler {
    fn syntactic(&self, tx: &Transaction, _fees: &FeeConfig) -> LedgerResult<()> {
        forbid_to(tx)?;
        forbid_token(tx)?;
        forbid_amount(tx)?;
        let info = account_info(tx)?;
        ValidationUtils::validate_keepers(info.threshold, &info.keepers)
    }

    fn plus_verified(&self) -> bool {
        true
    }

    fn apply(&self, validated: &ValidatedTx, base: &TxBase, _ctx: &TxContext<'_>) -> LedgerResult<BigUint> {
        let info = account_info(validated.tx())?;
        base.sender.update_keepers(
            info.threshold,
            info.keepers.clone(),
            info.approver,
            info.approve_list.clone(),
        )?;
        Ok(BigUint::default())
    }
}

/// Add one-time nonces to the sender's nonce table
pub struct AddNonceTableHandler;

fn nonce_input(tx: &Transaction) -> LedgerResult<&NonceTableInput> {
    match &tx.data {
        TxData::NonceTable(input) => Ok(input),
        _ => Err(LedgerError::syntactic("invalid data, expected nonce table")),
    }
}

impl TxHandler for AddNonceTableHandler {
    fn syntactic(&self, tx: &Transaction, _fees: &FeeConfig) -> LedgerResult<()> {
        forbid_to(tx)?;
        forbid_token(tx)?;
        forbid_amount(tx)?;
        let input = nonce_input(tx)?;
        if input.nonces.is_empty() || input.nonces.len() > limits::MAX_NONCES_PER_TX {
            return Err(LedgerError::syntactic(format!(
                "invalid nonces, expected 1..={}, got {}",
                limits::MAX_NONCES_PER_TX,
                input.nonces.len()
            )));
        }
        Ok(())
    }

    fn verify(&self, validated: &ValidatedTx, _base: &TxBase, ctx: &TxContext<'_>) -> LedgerResult<()> {
        let input = nonce_input(validated.tx())?;
        let now = ctx.state.timestamp();
        let latest = now.saturating_add(limits::MAX_NONCE_EXPIRE_SECS);
        if input.expire <= now || input.expire > latest {
            return Err(LedgerError::syntactic(format!(
                "invalid expire, expected > {} and <= {}, got {}",
                now, latest, input.expire
            )));
        }
        Ok(())
    }

    fn apply(&self, validated: &ValidatedTx, base: &TxBase, _ctx: &TxContext<'_>) -> LedgerResult<BigUint> {
        let input = nonce_input(validated.tx())?;
        base.sender.add_nonce_table(input.expire, &input.nonces)?;
        Ok(BigUint::default())
    }
}
