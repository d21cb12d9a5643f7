use super::{forbid_amount, forbid_data, forbid_token, require_amount, require_to, TxHandler};
use crate::config::FeeConfig;
use crate::pipeline::{TxBase, TxContext, ValidatedTx};
use crate::types::{Transaction, TxData};
use ldvm_common::prelude::*;
use ldvm_state::{Account, AccountKind, StakeSpec, TokenSpec};
use num_bigint::BigUint;

fn token_spec(tx: &Transaction) -> LedgerResult<&TokenSpec> {
    match &tx.data {
        TxData::Token(spec) => Ok(spec),
        _ => Err(LedgerError::syntactic("invalid data, expected token spec")),
    }
}

fn stake_spec(tx: &Transaction) -> LedgerResult<&StakeSpec> {
    match &tx.data {
        TxData::Stake(spec) => Ok(spec),
        _ => Err(LedgerError::syntactic("invalid data, expected stake spec")),
    }
}

fn ensure_pledge(tx: &Transaction, min: &BigUint) -> LedgerResult<()> {
    let pledge = require_amount(tx)?;
    if pledge < min {
        return Err(LedgerError::invalid_amount(format!(
            "pledge too low, expected >= {}, got {}",
            min, pledge
        )));
    }
    Ok(())
}

fn ensure_fresh(account: &Account) -> LedgerResult<()> {
    if !account.is_empty() || account.kind() != AccountKind::Native {
        return Err(LedgerError::account_type(format!(
            "{} exists",
            account.id()
        )));
    }
    Ok(())
}

/// Create a token issuer at the address spelling the token symbol
pub struct CreateTokenHandler;

impl TxHandler for CreateTokenHandler {
    fn syntactic(&self, tx: &Transaction, fees: &FeeConfig) -> LedgerResult<()> {
        let to = require_to(tx)?;
        TokenSymbol::try_from(to)?;
        forbid_token(tx)?;
        ensure_pledge(tx, &fees.min_token_pledge)?;
        let spec = token_spec(tx)?;
        ValidationUtils::validate_positive("token amount", &spec.amount)?;
        if !TokenSymbol::try_from(to)?.is_native_issuer() {
            ValidationUtils::validate_keepers(spec.threshold, &spec.keepers)?;
        }
        Ok(())
    }

    fn verify(&self, _validated: &ValidatedTx, base: &TxBase, _ctx: &TxContext<'_>) -> LedgerResult<()> {
        ensure_fresh(base.recipient()?)
    }

    fn apply(&self, validated: &ValidatedTx, base: &TxBase, ctx: &TxContext<'_>) -> LedgerResult<BigUint> {
        let spec = token_spec(validated.tx())?;
        base.recipient()?
            .create_token(spec, &ctx.fees.min_token_pledge)?;
        Ok(base.amount.clone())
    }
}

/// Return a fully unissued token issuer to a native account
pub struct DestroyTokenHandler;

impl TxHandler for DestroyTokenHandler {
    fn syntactic(&self, tx: &Transaction, _fees: &FeeConfig) -> LedgerResult<()> {
        TokenSymbol::try_from(tx.from)?;
        require_to(tx)?;
        forbid_token(tx)?;
        forbid_amount(tx)?;
        forbid_data(tx)
    }

    fn moves_amount(&self) -> bool {
        false
    }

    fn plus_verified(&self) -> bool {
        true
    }

    fn apply(&self, _validated: &ValidatedTx, base: &TxBase, ctx: &TxContext<'_>) -> LedgerResult<BigUint> {
        ctx.state.load_ledger(&base.sender)?;
        let released = base.sender.total_of(TokenSymbol::NATIVE);
        base.sender.destroy_token(base.recipient()?)?;
        Ok(released)
    }
}

/// Create a staking account at the address spelling the stake symbol
pub struct CreateStakeHandler;

impl TxHandler for CreateStakeHandler {
    fn syntactic(&self, tx: &Transaction, fees: &FeeConfig) -> LedgerResult<()> {
        let to = require_to(tx)?;
        StakeSymbol::try_from(to)?;
        forbid_token(tx)?;
        ensure_pledge(tx, &fees.min_stake_pledge)?;
        let spec = stake_spec(tx)?;
        spec.stake.validate()?;
        ValidationUtils::validate_keepers(spec.threshold, &spec.keepers)
    }

    fn verify(&self, _validated: &ValidatedTx, base: &TxBase, _ctx: &TxContext<'_>) -> LedgerResult<()> {
        ensure_fresh(base.recipient()?)
    }

    fn apply(&self, validated: &ValidatedTx, base: &TxBase, ctx: &TxContext<'_>) -> LedgerResult<BigUint> {
        let spec = stake_spec(validated.tx())?;
        base.recipient()?
            .create_stake(spec, &ctx.fees.min_stake_pledge)?;
        Ok(base.amount.clone())
    }
}

/// Return a settled staking account to a native account
pub struct DestroyStakeHandler;

impl TxHandler for DestroyStakeHandler {
    fn syntactic(&self, tx: &Transaction, _fees: &FeeConfig) -> LedgerResult<()> {
        StakeSymbol::try_from(tx.from)?;
        require_to(tx)?;
        forbid_token(tx)?;
        forbid_amount(tx)?;
        forbid_data(tx)
    }

    fn moves_amount(&self) -> bool {
        false
    }

    fn plus_verified(&self) -> bool {
        true
    }

    fn apply(&self, _validated: &ValidatedTx, base: &TxBase, ctx: &TxContext<'_>) -> LedgerResult<BigUint> {
        ctx.state.load_ledger(&base.sender)?;
        let released = base.sender.total_of(TokenSymbol::NATIVE);
        base.sender.destroy_stake(base.recipient()?)?;
        Ok(released)
    }
}
