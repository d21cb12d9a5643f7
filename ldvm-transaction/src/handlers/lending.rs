use super::{forbid_amount, forbid_data, forbid_to, forbid_token, require_amount, require_to, TxHandler};
use crate::config::FeeConfig;
use crate::pipeline::{TxBase, TxContext, ValidatedTx};
use crate::types::{BorrowTerms, Transaction, TxData};
use ldvm_common::prelude::*;
use ldvm_state::LendingConfig;
use num_bigint::BigUint;
use num_traits::Zero;

fn lending_config(tx: &Transaction) -> LedgerResult<&LendingConfig> {
    match &tx.data {
        TxData::Lending(cfg) => Ok(cfg),
        _ => Err(LedgerError::syntactic("invalid data, expected lending config")),
    }
}

fn borrow_terms(tx: &Transaction) -> LedgerResult<&BorrowTerms> {
    match &tx.data {
        TxData::Borrow(terms) => Ok(terms),
        _ => Err(LedgerError::syntactic("invalid data, expected borrow terms")),
    }
}

/// Open a lending market on the sender
pub struct OpenLendingHandler;

impl TxHandler for OpenLendingHandler {
    fn syntactic(&self, tx: &Transaction, _fees: &FeeConfig) -> LedgerResult<()> {
        forbid_to(tx)?;
        forbid_token(tx)?;
        forbid_amount(tx)?;
        lending_config(tx)?.validate()
    }

    fn apply(&self, validated: &ValidatedTx, base: &TxBase, ctx: &TxContext<'_>) -> LedgerResult<BigUint> {
        let cfg = lending_config(validated.tx())?;
        ctx.state.load_ledger(&base.sender)?;
        base.sender.open_lending(cfg.clone())?;
        Ok(BigUint::zero())
    }
}

/// Close the sender's lending market once every position is settled
pub struct CloseLendingHandler;

impl TxHandler for CloseLendingHandler {
    fn syntactic(&self, tx: &Transaction, _fees: &FeeConfig) -> LedgerResult<()> {
        forbid_to(tx)?;
        forbid_token(tx)?;
        forbid_amount(tx)?;
        forbid_data(tx)
    }

    fn apply(&self, _validated: &ValidatedTx, base: &TxBase, ctx: &TxContext<'_>) -> LedgerResult<BigUint> {
        ctx.state.load_ledger(&base.sender)?;
        base.sender.close_lending()?;
        Ok(BigUint::zero())
    }
}

/// Draw from the recipient's lending market under terms the lender signed
pub struct BorrowHandler;

impl TxHandler for BorrowHandler {
    fn syntactic(&self, tx: &Transaction, _fees: &FeeConfig) -> LedgerResult<()> {
        require_to(tx)?;
        require_amount(tx)?;
        let terms = borrow_terms(tx)?;
        if terms.due_time > 0 && terms.due_time <= terms.expire {
            return Err(LedgerError::syntactic(format!(
                "invalid due_time, expected > {}, got {}",
                terms.expire, terms.due_time
            )));
        }
        if tx.ex_signatures.is_empty() {
            return Err(LedgerError::syntactic("no lender signatures"));
        }
        Ok(())
    }

    fn moves_amount(&self) -> bool {
        false
    }

    fn verify(&self, validated: &ValidatedTx, base: &TxBase, ctx: &TxContext<'_>) -> LedgerResult<()> {
        let tx = validated.tx();
        let terms = borrow_terms(tx)?;
        let lender = base.recipient()?;

        let ex_digest = tx.ex_digest()?;
        if !lender.verify(ctx.verifier, &ex_digest, &tx.ex_signatures, None) {
            return Err(LedgerError::authorization("invalid signatures for lender"));
        }
        if !lender.is_approved(ctx.verifier, &ex_digest, &tx.ex_signatures, tx.tx_type) {
            return Err(LedgerError::authorization(
                "invalid signature for lender approver",
            ));
        }
        if !lender.has_nonce(terms.expire, terms.nonce) {
            return Err(LedgerError::NonceNotFound {
                expire: terms.expire,
                nonce: terms.nonce,
            });
        }
        if lender.lending_config().is_none() {
            return Err(LedgerError::lending("lender has no open lending"));
        }
        lender.check_balance(base.token, &base.amount)
    }

    fn apply(&self, validated: &ValidatedTx, base: &TxBase, ctx: &TxContext<'_>) -> LedgerResult<BigUint> {
        let terms = borrow_terms(validated.tx())?;
        let lender = base.recipient()?;
        ctx.state.load_ledger(lender)?;
        lender.borrow(base.token, base.sender.id(), &base.amount, terms.due_time)?;
        lender.subtract_by_nonce_table(base.token, terms.expire, terms.nonce, &base.amount)?;
        base.sender.add(base.token, &base.amount)?;
        Ok(base.amount.clone())
    }
}

/// Repay a position in the recipient's lending market
pub struct RepayHandler;

impl TxHandler for RepayHandler {
    fn syntactic(&self, tx: &Transaction, _fees: &FeeConfig) -> LedgerResult<()> {
        require_to(tx)?;
        require_amount(tx)?;
        forbid_data(tx)
    }

    fn moves_amount(&self) -> bool {
        false
    }

    fn verify(&self, _validated: &ValidatedTx, base: &TxBase, _ctx: &TxContext<'_>) -> LedgerResult<()> {
        let lender = base.recipient()?;
        let total = lender.calc_borrow_total(base.sender.id())?;
        if total.is_zero() {
            return Err(LedgerError::lending(format!(
                "{} has no borrow from {}",
                base.sender.id(),
                lender.id()
            )));
        }
        let owed = std::cmp::min(total, base.amount.clone());
        if base.token.is_native() {
            base.sender
                .check_balance(TokenSymbol::NATIVE, &(&owed + &base.cost))
        } else {
            base.sender.check_balance(base.token, &owed)
        }
    }

    fn apply(&self, _validated: &ValidatedTx, base: &TxBase, ctx: &TxContext<'_>) -> LedgerResult<BigUint> {
        let lender = base.recipient()?;
        ctx.state.load_ledger(lender)?;
        let actual = lender.repay(base.token, base.sender.id(), &base.amount)?;
        base.sender.subtract(base.token, &actual)?;
        lender.add(base.token, &actual)?;
        Ok(actual)
    }
}
