//! The account aggregate: amount ledger, replay guard, authorization and
//! persistence. Token, stake and lending operations live in their own
//! modules as further `impl Account` blocks.

use crate::kind::{AccountKind, KindTag};
use crate::lending::{AccountLedger, LendingConfig};
use crate::nonce::NonceTable;
use ldvm_common::prelude::*;
use num_bigint::BigUint;
use num_traits::Zero;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// The persisted record of an account
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountData {
    pub id: Address,
    #[serde(default)]
    pub kind: AccountKind,
    #[serde(with = "amount_serde", default)]
    pub balance: BigUint,
    #[serde(with = "amount_serde::map", default)]
    tokens: BTreeMap<TokenSymbol, BigUint>,
    #[serde(with = "amount_serde", default)]
    pub pledge: BigUint,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    nonce_table: NonceTable,
    #[serde(default)]
    pub threshold: u16,
    #[serde(default)]
    pub keepers: Vec<PublicKey>,
    #[serde(default)]
    pub approver: Option<PublicKey>,
    #[serde(default)]
    pub approve_list: BTreeSet<TxType>,
    #[serde(default)]
    pub lending: Option<LendingConfig>,
    /// Last block timestamp this account was loaded at
    #[serde(default)]
    pub timestamp: Timestamp,
}

impl LedgerSerialize for AccountData {}

impl AccountData {
    /// A fresh, empty native account
    pub fn new(id: Address) -> Self {
        Self {
            id,
            kind: AccountKind::Native,
            balance: BigUint::zero(),
            tokens: BTreeMap::new(),
            pledge: BigUint::zero(),
            nonce: 0,
            nonce_table: NonceTable::default(),
            threshold: 0,
            keepers: Vec::new(),
            approver: None,
            approve_list: BTreeSet::new(),
            lending: None,
            timestamp: 0,
        }
    }

    /// Raw holdings of `symbol`, ignoring the pledge
    pub(crate) fn total_of(&self, symbol: TokenSymbol) -> BigUint {
        if symbol.is_native() {
            self.balance.clone()
        } else {
            self.tokens.get(&symbol).cloned().unwrap_or_default()
        }
    }

    /// Spendable holdings of `symbol`
    pub(crate) fn balance_of(&self, symbol: TokenSymbol) -> BigUint {
        if symbol.is_native() {
            if self.balance > self.pledge {
                &self.balance - &self.pledge
            } else {
                BigUint::zero()
            }
        } else {
            self.total_of(symbol)
        }
    }

    pub(crate) fn check_balance(&self, symbol: TokenSymbol, amount: &BigUint) -> LedgerResult<()> {
        let spendable = self.balance_of(symbol);
        if *amount > spendable {
            return Err(LedgerError::insufficient(symbol, amount, &spendable));
        }
        Ok(())
    }

    pub(crate) fn credit(&mut self, symbol: TokenSymbol, amount: &BigUint) {
        if amount.is_zero() {
            return;
        }
        if symbol.is_native() {
            self.balance += amount;
        } else {
            *self.tokens.entry(symbol).or_default() += amount;
        }
    }

    /// Debit after a successful `check_balance`
    pub(crate) fn debit(&mut self, symbol: TokenSymbol, amount: &BigUint) -> LedgerResult<()> {
        self.check_balance(symbol, amount)?;
        if symbol.is_native() {
            self.balance -= amount;
        } else if let Some(held) = self.tokens.get_mut(&symbol) {
            *held -= amount;
            if held.is_zero() {
                self.tokens.remove(&symbol);
            }
        }
        Ok(())
    }

    pub(crate) fn tokens(&self) -> &BTreeMap<TokenSymbol, BigUint> {
        &self.tokens
    }

    pub(crate) fn tokens_mut(&mut self) -> &mut BTreeMap<TokenSymbol, BigUint> {
        &mut self.tokens
    }

    pub(crate) fn nonce_table(&self) -> &NonceTable {
        &self.nonce_table
    }

    /// No keepers yet
    pub(crate) fn is_empty(&self) -> bool {
        self.keepers.is_empty()
    }

    /// Validity of this record as an account of kind `tag`
    pub(crate) fn valid(&self, tag: KindTag) -> bool {
        if self.kind.tag() != tag {
            return false;
        }
        match &self.kind {
            AccountKind::Native => true,
            kind => {
                if (self.is_empty() && self.id != Address::EMPTY) || self.balance < self.pledge {
                    return false;
                }
                match kind {
                    AccountKind::TokenIssuer { max_total_supply } => !max_total_supply.is_zero(),
                    AccountKind::Staker { stake } => stake.validate().is_ok(),
                    AccountKind::Native => true,
                }
            }
        }
    }

    /// Clear every type specific field, keeping id, nonce and foreign tokens
    pub(crate) fn reset_to_native(&mut self) {
        self.kind = AccountKind::Native;
        self.pledge = BigUint::zero();
        self.threshold = 0;
        self.keepers.clear();
        self.nonce_table = NonceTable::default();
        self.approver = None;
        self.approve_list.clear();
        self.lending = None;
    }
}

pub(crate) struct AccountInner {
    pub(crate) data: AccountData,
    pub(crate) ledger: Option<AccountLedger>,
}

/// A fund-bearing account guarded by its own reader-writer lock.
///
/// Every operation takes the lock once, runs to completion and releases it.
/// No operation holds the locks of two accounts at the same time.
pub struct Account {
    id: Address,
    inner: RwLock<AccountInner>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("data", &self.inner.read().data)
            .finish()
    }
}

impl Account {
    /// A fresh, empty native account
    pub fn new(id: Address) -> Self {
        Self::from_data(AccountData::new(id))
    }

    pub fn from_data(data: AccountData) -> Self {
        Self {
            id: data.id,
            inner: RwLock::new(AccountInner { data, ledger: None }),
        }
    }

    pub fn id(&self) -> Address {
        self.id
    }

    pub(crate) fn ctx(&self, op: &str) -> String {
        format!("Account({}).{}", self.id, op)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, AccountInner> {
        self.inner.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, AccountInner> {
        self.inner.write()
    }

    /// A copy of the persisted record
    pub fn data(&self) -> AccountData {
        self.read().data.clone()
    }

    pub fn kind(&self) -> AccountKind {
        self.read().data.kind.clone()
    }

    pub fn nonce(&self) -> u64 {
        self.read().data.nonce
    }

    pub fn threshold(&self) -> u16 {
        self.read().data.threshold
    }

    pub fn keepers(&self) -> Vec<PublicKey> {
        self.read().data.keepers.clone()
    }

    pub fn pledge(&self) -> BigUint {
        self.read().data.pledge.clone()
    }

    pub fn timestamp(&self) -> Timestamp {
        self.read().data.timestamp
    }

    /// Stamp the account with the current block timestamp
    pub fn touch(&self, timestamp: Timestamp) {
        self.write().data.timestamp = timestamp;
    }

    /// Whether the account has no keepers
    pub fn is_empty(&self) -> bool {
        self.read().data.is_empty()
    }

    /// Raw holdings of `symbol`
    pub fn total_of(&self, symbol: TokenSymbol) -> BigUint {
        self.read().data.total_of(symbol)
    }

    /// Spendable holdings of `symbol`; the native balance excludes the pledge
    pub fn balance_of(&self, symbol: TokenSymbol) -> BigUint {
        self.read().data.balance_of(symbol)
    }

    /// Circulating supply of a token issuer, zero for other kinds
    pub fn total_supply(&self) -> BigUint {
        let inner = self.read();
        match &inner.data.kind {
            AccountKind::TokenIssuer { max_total_supply } => {
                let unissued = TokenSymbol::try_from(self.id)
                    .map(|own| inner.data.balance_of(own))
                    .unwrap_or_default();
                if *max_total_supply > unissued {
                    max_total_supply - unissued
                } else {
                    BigUint::zero()
                }
            }
            _ => BigUint::zero(),
        }
    }

    pub fn check_balance(&self, symbol: TokenSymbol, amount: &BigUint) -> LedgerResult<()> {
        self.read()
            .data
            .check_balance(symbol, amount)
            .with_context(|| self.ctx("CheckBalance"))
    }

    pub fn add(&self, symbol: TokenSymbol, amount: &BigUint) -> LedgerResult<()> {
        self.write().data.credit(symbol, amount);
        Ok(())
    }

    /// Check and debit under one write lock
    pub fn subtract(&self, symbol: TokenSymbol, amount: &BigUint) -> LedgerResult<()> {
        self.write()
            .data
            .debit(symbol, amount)
            .with_context(|| self.ctx("Sub"))
    }

    /// Debit `amount` and advance the sequential nonce. Nothing changes unless
    /// `nonce` equals the account nonce and the balance suffices.
    pub fn subtract_by_nonce(
        &self,
        symbol: TokenSymbol,
        nonce: u64,
        amount: &BigUint,
    ) -> LedgerResult<()> {
        let mut inner = self.write();
        let data = &mut inner.data;
        if data.nonce != nonce {
            return Err(LedgerError::NonceMismatch {
                expected: data.nonce,
                got: nonce,
            }
            .wrap(self.ctx("SubByNonce")));
        }
        data.debit(symbol, amount)
            .with_context(|| self.ctx("SubByNonce"))?;
        data.nonce += 1;
        Ok(())
    }

    /// Add one-time nonces under `expire`
    pub fn add_nonce_table(&self, expire: u64, nonces: &[u64]) -> LedgerResult<()> {
        let mut inner = self.write();
        let now = inner.data.timestamp;
        inner
            .data
            .nonce_table
            .insert(now, expire, nonces)
            .with_context(|| self.ctx("AddNonceTable"))?;
        debug!(account = %self.id, expire, count = nonces.len(), "nonce table updated");
        Ok(())
    }

    /// Whether `(expire, nonce)` is live in the nonce table
    pub fn has_nonce(&self, expire: u64, nonce: u64) -> bool {
        let inner = self.read();
        inner
            .data
            .nonce_table
            .contains(inner.data.timestamp, expire, nonce)
    }

    /// Consume `(expire, nonce)` from the nonce table and debit `amount`
    pub fn subtract_by_nonce_table(
        &self,
        symbol: TokenSymbol,
        expire: u64,
        nonce: u64,
        amount: &BigUint,
    ) -> LedgerResult<()> {
        let mut inner = self.write();
        let now = inner.data.timestamp;
        let data = &mut inner.data;
        data.nonce_table
            .ensure(now, expire, nonce)
            .and_then(|_| data.check_balance(symbol, amount))
            .and_then(|_| data.nonce_table.remove(now, expire, nonce))
            .and_then(|_| data.debit(symbol, amount))
            .with_context(|| self.ctx("SubByNonceTable"))
    }

    /// Threshold check over the keepers, or a direct signature by `direct_key`
    pub fn verify(
        &self,
        verifier: &dyn SignatureVerifier,
        digest: &Hash,
        signatures: &[Signature],
        direct_key: Option<&PublicKey>,
    ) -> bool {
        if let Some(key) = direct_key {
            if verifier.verify(digest, signatures, key) {
                return true;
            }
        }
        let inner = self.read();
        verifier.verify_threshold(digest, signatures, &inner.data.keepers, inner.data.threshold)
    }

    /// Threshold check where only keepers below `cutoff` may sign
    pub fn verify_plus(
        &self,
        verifier: &dyn SignatureVerifier,
        digest: &Hash,
        signatures: &[Signature],
        cutoff: usize,
    ) -> bool {
        let inner = self.read();
        let data = &inner.data;
        if data.keepers.is_empty() || data.threshold == 0 {
            return false;
        }
        let signers = verifier.signers(digest, signatures, &data.keepers);
        signers.len() >= data.threshold as usize && signers.iter().all(|&i| i < cutoff)
    }

    /// Approver gate for `tx_type`
    pub fn is_approved(
        &self,
        verifier: &dyn SignatureVerifier,
        digest: &Hash,
        signatures: &[Signature],
        tx_type: TxType,
    ) -> bool {
        let inner = self.read();
        match &inner.data.approver {
            None => true,
            Some(approver) if inner.data.approve_list.contains(&tx_type) => {
                verifier.verify(digest, signatures, approver)
            }
            Some(_) => true,
        }
    }

    /// Replace the keeper set, threshold and approver
    pub fn update_keepers(
        &self,
        threshold: u16,
        keepers: Vec<PublicKey>,
        approver: Option<PublicKey>,
        approve_list: BTreeSet<TxType>,
    ) -> LedgerResult<()> {
        ValidationUtils::validate_keepers(threshold, &keepers)
            .with_context(|| self.ctx("UpdateKeepers"))?;
        let mut inner = self.write();
        inner.data.threshold = threshold;
        inner.data.keepers = keepers;
        inner.data.approver = approver;
        inner.data.approve_list = approve_list;
        Ok(())
    }

    /// Validity as an account of kind `tag`
    pub fn valid(&self, tag: KindTag) -> bool {
        self.read().data.valid(tag)
    }

    pub fn check_as_from(&self, tx_type: TxType) -> LedgerResult<()> {
        self.read()
            .data
            .kind
            .check_as_from(tx_type)
            .with_context(|| self.ctx("CheckAsFrom"))
    }

    pub fn check_as_to(&self, tx_type: TxType) -> LedgerResult<()> {
        self.read()
            .data
            .kind
            .check_as_to(tx_type)
            .with_context(|| self.ctx("CheckAsTo"))
    }

    /// Canonical encoding of the account record
    pub fn marshal(&self) -> LedgerResult<Vec<u8>> {
        self.read().data.encode()
    }

    /// Canonical encoding of the attached ledger, if any
    pub fn marshal_ledger(&self) -> LedgerResult<Option<Vec<u8>>> {
        self.read().ledger.as_ref().map(|l| l.encode()).transpose()
    }

    /// Whether the stored encoding `stored` differs from this account
    pub fn account_changed(&self, stored: &[u8]) -> LedgerResult<bool> {
        let current = self.read().data.content_hash()?;
        Ok(current != CryptoUtils::hash(stored))
    }

    /// Whether the stored ledger encoding differs from the attached ledger
    pub fn ledger_changed(&self, stored: Option<&[u8]>) -> LedgerResult<bool> {
        let inner = self.read();
        match (&inner.ledger, stored) {
            (None, None) => Ok(false),
            (Some(ledger), Some(bytes)) => {
                Ok(ledger.content_hash()? != CryptoUtils::hash(bytes))
            }
            _ => Ok(true),
        }
    }

    /// Replace the record and ledger with stored encodings
    pub fn restore(&self, data: &[u8], ledger: Option<&[u8]>) -> LedgerResult<()> {
        let data = AccountData::decode(data).with_context(|| self.ctx("Restore"))?;
        if data.id != self.id {
            return Err(LedgerError::internal(format!(
                "restoring {} from a record of {}",
                self.id, data.id
            )));
        }
        let ledger = ledger
            .map(AccountLedger::decode)
            .transpose()
            .with_context(|| self.ctx("Restore"))?;
        let mut inner = self.write();
        inner.data = data;
        inner.ledger = ledger;
        Ok(())
    }
}
