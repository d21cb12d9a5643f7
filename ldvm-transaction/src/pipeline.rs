//! Three-phase transaction application.
//!
//! `syntactic_verify` checks the shape of a transaction without any state and
//! yields a [`ValidatedTx`]. `verify` loads the accounts involved and checks
//! roles, nonce, signatures and balances without mutating anything, yielding
//! an [`AuthorizedTx`]. `accept` applies the effects and yields a
//! [`Receipt`]. Each stage can only be reached through the previous one.

use crate::config::FeeConfig;
use crate::handlers::{handler_for, TxHandler};
use crate::types::Transaction;
use ldvm_common::prelude::*;
use ldvm_state::{Account, ChainState};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Pipeline stage a failure happened in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Syntactic,
    Verify,
    Accept,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Syntactic => f.write_str("syntacticVerify"),
            Phase::Verify => f.write_str("verify"),
            Phase::Accept => f.write_str("accept"),
        }
    }
}

/// Collaborators of the stateful phases
pub struct TxContext<'a> {
    pub state: &'a dyn ChainState,
    pub fees: &'a FeeConfig,
    pub verifier: &'a dyn SignatureVerifier,
    /// Block builder receiving tips
    pub builder: Address,
}

/// A transaction whose shape has been checked
pub struct ValidatedTx {
    tx: Transaction,
    id: Hash,
    digest: Hash,
    gas: u64,
    handler: &'static dyn TxHandler,
}

impl ValidatedTx {
    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn id(&self) -> Hash {
        self.id
    }

    pub fn digest(&self) -> Hash {
        self.digest
    }

    pub fn gas(&self) -> u64 {
        self.gas
    }

    fn ctx(&self, phase: Phase) -> String {
        tx_ctx(self.tx.tx_type, &self.id, phase)
    }
}

/// Accounts and amounts derived from a transaction for one application
pub struct TxBase {
    pub sender: Arc<Account>,
    pub recipient: Option<Arc<Account>>,
    pub fee_sink: Arc<Account>,
    pub reward: Arc<Account>,
    pub token: TokenSymbol,
    pub amount: BigUint,
    pub fee: BigUint,
    pub tip: BigUint,
    pub cost: BigUint,
}

impl TxBase {
    /// The recipient, which syntactic checks guarantee for types needing one
    pub fn recipient(&self) -> LedgerResult<&Arc<Account>> {
        self.recipient
            .as_ref()
            .ok_or_else(|| LedgerError::syntactic("nil to"))
    }
}

/// A transaction that passed every read-only check against chain state
pub struct AuthorizedTx {
    validated: ValidatedTx,
    base: TxBase,
}

impl std::fmt::Debug for AuthorizedTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedTx")
            .field("id", &self.validated.id)
            .finish_non_exhaustive()
    }
}

impl AuthorizedTx {
    pub fn validated(&self) -> &ValidatedTx {
        &self.validated
    }

    pub fn base(&self) -> &TxBase {
        &self.base
    }
}

/// Outcome of an accepted transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(with = "hex::serde")]
    pub tx_id: Hash,
    pub tx_type: TxType,
    pub from: Address,
    pub to: Option<Address>,
    pub token: TokenSymbol,
    /// Amount actually settled by the transaction
    #[serde(with = "amount_serde")]
    pub amount: BigUint,
    pub gas: u64,
    #[serde(with = "amount_serde")]
    pub fee: BigUint,
    #[serde(with = "amount_serde")]
    pub tip: BigUint,
    pub height: BlockHeight,
    pub timestamp: Timestamp,
}

impl LedgerSerialize for Receipt {}

fn tx_ctx(tx_type: TxType, id: &Hash, phase: Phase) -> String {
    format!("Tx{:?}({}).{}", tx_type, CryptoUtils::short_id(id), phase)
}

/// Phase 1: stateless shape checks. Failures are permanent.
pub fn syntactic_verify(tx: Transaction, chain_id: u64, fees: &FeeConfig) -> LedgerResult<ValidatedTx> {
    let id = tx.id()?;
    let ctx = || tx_ctx(tx.tx_type, &id, Phase::Syntactic);

    let check = || -> LedgerResult<()> {
        if tx.chain_id != chain_id {
            return Err(LedgerError::syntactic(format!(
                "invalid chain_id, expected {}, got {}",
                chain_id, tx.chain_id
            )));
        }
        if tx.from == Address::EMPTY {
            return Err(LedgerError::syntactic("invalid from"));
        }
        if tx.to == Some(tx.from) {
            return Err(LedgerError::syntactic("invalid to, should not equal from"));
        }
        if tx.signatures.is_empty() {
            return Err(LedgerError::syntactic("no signatures"));
        }
        if let Some(token) = tx.token {
            if !token.is_valid() {
                return Err(LedgerError::syntactic(format!("invalid token {}", token)));
            }
        }
        handler_for(tx.tx_type).syntactic(&tx, fees)
    };
    check().with_context(ctx)?;

    let digest = tx.digest()?;
    let gas = fees.gas(tx.tx_type, tx.size()?);
    debug!(tx = %CryptoUtils::short_id(&id), tx_type = %tx.tx_type, gas, "syntactic ok");
    Ok(ValidatedTx {
        handler: handler_for(tx.tx_type),
        tx,
        id,
        digest,
        gas,
    })
}

/// Phase 2: read-only checks against chain state
pub fn verify(validated: ValidatedTx, ctx: &TxContext<'_>) -> LedgerResult<AuthorizedTx> {
    let base = load_base(&validated, ctx).with_context(|| validated.ctx(Phase::Verify))?;
    check_base(&validated, &base, ctx).with_context(|| validated.ctx(Phase::Verify))?;
    validated
        .handler
        .verify(&validated, &base, ctx)
        .with_context(|| validated.ctx(Phase::Verify))?;
    debug!(tx = %CryptoUtils::short_id(&validated.id), cost = %base.cost, "verify ok");
    Ok(AuthorizedTx { validated, base })
}

fn load_base(validated: &ValidatedTx, ctx: &TxContext<'_>) -> LedgerResult<TxBase> {
    let tx = &validated.tx;
    let fees = ctx.fees;
    if tx.gas_fee_cap < fees.gas_price {
        return Err(LedgerError::fee(format!(
            "gas_fee_cap too low, expected >= {}, got {}",
            fees.gas_price, tx.gas_fee_cap
        )));
    }
    if validated.gas > fees.max_tx_gas {
        return Err(LedgerError::fee(format!(
            "gas too high, expected <= {}, got {}",
            fees.max_tx_gas, validated.gas
        )));
    }

    let gas = BigUint::from(validated.gas);
    let fee = &gas * fees.gas_price;
    let tip = &gas * tx.gas_tip;
    let cost = &fee + &tip;

    Ok(TxBase {
        fee_sink: ctx.state.fee_sink()?,
        reward: ctx.state.reward_account(ctx.builder)?,
        sender: ctx.state.load_account(tx.from)?,
        recipient: tx.to.map(|to| ctx.state.load_account(to)).transpose()?,
        token: tx.token_or_native(),
        amount: tx.amount.clone().unwrap_or_default(),
        fee,
        tip,
        cost,
    })
}

fn check_base(validated: &ValidatedTx, base: &TxBase, ctx: &TxContext<'_>) -> LedgerResult<()> {
    let tx = &validated.tx;
    let sender = &base.sender;

    sender.check_as_from(tx.tx_type)?;
    if let Some(recipient) = &base.recipient {
        recipient.check_as_to(tx.tx_type)?;
    }

    if tx.nonce != sender.nonce() {
        return Err(LedgerError::NonceMismatch {
            expected: sender.nonce(),
            got: tx.nonce,
        });
    }

    let authorized = if validated.handler.plus_verified() {
        sender.verify_plus(
            ctx.verifier,
            &validated.digest,
            &tx.signatures,
            ctx.fees.plus_keepers_cutoff,
        )
    } else {
        sender.verify(ctx.verifier, &validated.digest, &tx.signatures, None)
    };
    if !authorized {
        return Err(LedgerError::authorization("invalid signatures for sender"));
    }
    if !sender.is_approved(ctx.verifier, &validated.digest, &tx.signatures, tx.tx_type) {
        return Err(LedgerError::authorization("invalid signature for approver"));
    }

    if validated.handler.moves_amount() && base.token.is_native() {
        sender.check_balance(TokenSymbol::NATIVE, &(&base.amount + &base.cost))?;
    } else {
        sender.check_balance(TokenSymbol::NATIVE, &base.cost)?;
        if validated.handler.moves_amount() {
            sender.check_balance(base.token, &base.amount)?;
        }
    }
    Ok(())
}

/// Phase 3: apply the effects. A failure may leave partial effects that the
/// caller discards through [`ChainState::checkout`].
pub fn accept(authorized: AuthorizedTx, ctx: &TxContext<'_>) -> LedgerResult<Receipt> {
    let AuthorizedTx { validated, base } = authorized;
    let tx = &validated.tx;

    let apply = || -> LedgerResult<BigUint> {
        base.sender
            .subtract_by_nonce(TokenSymbol::NATIVE, tx.nonce, &base.cost)?;
        if validated.handler.moves_amount() && !base.amount.is_zero() {
            let recipient = base.recipient()?;
            base.sender.subtract(base.token, &base.amount)?;
            recipient.add(base.token, &base.amount)?;
        }
        base.reward.add(TokenSymbol::NATIVE, &base.tip)?;
        base.fee_sink.add(TokenSymbol::NATIVE, &base.fee)?;
        validated.handler.apply(&validated, &base, ctx)
    };
    let settled = apply().with_context(|| validated.ctx(Phase::Accept))?;

    debug!(tx = %CryptoUtils::short_id(&validated.id), %settled, "accepted");
    Ok(Receipt {
        tx_id: validated.id,
        tx_type: tx.tx_type,
        from: tx.from,
        to: tx.to,
        token: base.token,
        amount: settled,
        gas: validated.gas,
        fee: base.fee.clone(),
        tip: base.tip.clone(),
        height: ctx.state.height(),
        timestamp: ctx.state.timestamp(),
    })
}

/// Run all three phases, tagging a failure with the phase it happened in
pub fn apply_transaction(
    tx: Transaction,
    chain_id: u64,
    ctx: &TxContext<'_>,
) -> Result<Receipt, (Phase, LedgerError)> {
    let validated = syntactic_verify(tx, chain_id, ctx.fees).map_err(|e| (Phase::Syntactic, e))?;
    let authorized = verify(validated, ctx).map_err(|e| (Phase::Verify, e))?;
    accept(authorized, ctx).map_err(|e| (Phase::Accept, e))
}
