//! Token issuer and staking account lifecycle

use crate::account::{Account, AccountData};
use crate::kind::{AccountKind, KindTag, StakeConfig};
use ldvm_common::prelude::*;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Parameters of a new token issuer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpec {
    pub threshold: u16,
    pub keepers: Vec<PublicKey>,
    #[serde(default)]
    pub approver: Option<PublicKey>,
    #[serde(default)]
    pub approve_list: BTreeSet<TxType>,
    /// Total supply minted at creation
    #[serde(with = "amount_serde")]
    pub amount: BigUint,
}

/// Parameters of a new staking account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeSpec {
    pub threshold: u16,
    pub keepers: Vec<PublicKey>,
    #[serde(default)]
    pub approver: Option<PublicKey>,
    #[serde(default)]
    pub approve_list: BTreeSet<TxType>,
    pub stake: StakeConfig,
}

fn ensure_pristine(data: &AccountData) -> LedgerResult<()> {
    if !data.is_empty()
        || data.kind != AccountKind::Native
        || !data.tokens().is_empty()
        || data.lending.is_some()
    {
        return Err(LedgerError::account_type(format!(
            "{} exists",
            data.id
        )));
    }
    Ok(())
}

impl Account {
    /// Turn this empty account into the issuer of the token named by its
    /// address. The reserved native symbol mints into the native balance.
    pub fn create_token(&self, spec: &TokenSpec, pledge: &BigUint) -> LedgerResult<()> {
        let op = || self.ctx("CreateToken");
        let symbol = TokenSymbol::try_from(self.id()).with_context(op)?;
        ValidationUtils::validate_positive("amount", &spec.amount).with_context(op)?;

        if !symbol.is_native_issuer() {
            ValidationUtils::validate_keepers(spec.threshold, &spec.keepers).with_context(op)?;
        }

        let mut inner = self.write();
        let data = &mut inner.data;
        ensure_pristine(data).with_context(op)?;

        data.kind = AccountKind::TokenIssuer {
            max_total_supply: spec.amount.clone(),
        };
        data.pledge = pledge.clone();
        if symbol.is_native_issuer() {
            data.balance += &spec.amount;
        } else {
            data.threshold = spec.threshold;
            data.keepers = spec.keepers.clone();
            data.approver = spec.approver;
            data.approve_list = spec.approve_list.clone();
            data.tokens_mut().insert(symbol, spec.amount.clone());
        }
        info!(token = %symbol, supply = %spec.amount, "token created");
        Ok(())
    }

    /// Return a fully unissued token issuer to an empty native account and
    /// move its native balance to `recipient`
    pub fn destroy_token(&self, recipient: &Account) -> LedgerResult<()> {
        let op = || self.ctx("DestroyToken");
        let symbol = TokenSymbol::try_from(self.id()).with_context(op)?;

        let released = {
            let mut inner = self.write();
            if !inner.data.valid(KindTag::TokenIssuer) {
                return Err(LedgerError::account_type("invalid token account").wrap(op()));
            }
            let max_total_supply = match &inner.data.kind {
                AccountKind::TokenIssuer { max_total_supply } => max_total_supply.clone(),
                _ => BigUint::zero(),
            };
            let unissued = inner.data.total_of(symbol);
            if unissued != max_total_supply {
                return Err(LedgerError::account_type(format!(
                    "some token in use, expected {}, got {}",
                    max_total_supply, unissued
                ))
                .wrap(op()));
            }
            ensure_settled(&inner).with_context(op)?;

            let released = std::mem::take(&mut inner.data.balance);
            inner.data.tokens_mut().remove(&symbol);
            inner.data.reset_to_native();
            released
        };

        recipient.add(TokenSymbol::NATIVE, &released)?;
        info!(token = %symbol, recipient = %recipient.id(), %released, "token destroyed");
        Ok(())
    }

    /// Turn this empty account into the staking account named by its address
    pub fn create_stake(&self, spec: &StakeSpec, pledge: &BigUint) -> LedgerResult<()> {
        let op = || self.ctx("CreateStake");
        let symbol = StakeSymbol::try_from(self.id()).with_context(op)?;
        spec.stake.validate().with_context(op)?;
        ValidationUtils::validate_keepers(spec.threshold, &spec.keepers).with_context(op)?;

        let mut inner = self.write();
        let data = &mut inner.data;
        ensure_pristine(data).with_context(op)?;

        data.kind = AccountKind::Staker {
            stake: spec.stake.clone(),
        };
        data.pledge = pledge.clone();
        data.threshold = spec.threshold;
        data.keepers = spec.keepers.clone();
        data.approver = spec.approver;
        data.approve_list = spec.approve_list.clone();
        info!(stake = %symbol, tier = spec.stake.tier, "stake created");
        Ok(())
    }

    /// Return a settled staking account to an empty native account and move
    /// its native balance to `recipient`
    pub fn destroy_stake(&self, recipient: &Account) -> LedgerResult<()> {
        let op = || self.ctx("DestroyStake");

        let released = {
            let mut inner = self.write();
            if !inner.data.valid(KindTag::Staker) {
                return Err(LedgerError::account_type("invalid stake account").wrap(op()));
            }
            if !inner.data.tokens().is_empty() {
                return Err(LedgerError::account_type("stake account holds tokens").wrap(op()));
            }
            ensure_settled(&inner).with_context(op)?;

            let released = std::mem::take(&mut inner.data.balance);
            inner.data.reset_to_native();
            released
        };

        recipient.add(TokenSymbol::NATIVE, &released)?;
        debug!(stake = %self.id(), recipient = %recipient.id(), %released, "stake destroyed");
        Ok(())
    }
}

fn ensure_settled(inner: &crate::account::AccountInner) -> LedgerResult<()> {
    let open = inner.ledger.as_ref().map_or(0, |l| l.lending.len());
    if (inner.data.lending.is_some() || inner.ledger.is_some()) && open > 0 {
        return Err(LedgerError::lending(format!(
            "please repay all before destroy, {} entries open",
            open
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::tests::{amount, funded};
    use crate::lending::LendingConfig;

    fn token_account(symbol: &str) -> Account {
        Account::new(TokenSymbol::new(symbol).unwrap().address())
    }

    fn spec(supply: u64) -> TokenSpec {
        TokenSpec {
            threshold: 1,
            keepers: vec![PublicKey([7; 32])],
            approver: None,
            approve_list: BTreeSet::new(),
            amount: amount(supply),
        }
    }

    #[test]
    fn test_create_token() {
        let acc = token_account("$USD");
        acc.add(TokenSymbol::NATIVE, &amount(10)).unwrap();
        acc.create_token(&spec(1_000), &amount(10)).unwrap();

        let usd = TokenSymbol::new("$USD").unwrap();
        assert!(acc.valid(KindTag::TokenIssuer));
        assert_eq!(acc.balance_of(usd), amount(1_000));
        assert_eq!(acc.total_supply(), amount(0));
        assert_eq!(acc.balance_of(TokenSymbol::NATIVE), amount(0));

        acc.subtract(usd, &amount(300)).unwrap();
        assert_eq!(acc.total_supply(), amount(300));

        // a second create is rejected
        let err = acc.create_token(&spec(1), &amount(0)).unwrap_err();
        assert!(matches!(err.root(), LedgerError::InvalidAccountType(_)));
    }

    #[test]
    fn test_create_token_rejects_bad_address() {
        let acc = funded(1, 10);
        assert!(acc.create_token(&spec(1_000), &amount(10)).is_err());
        assert!(acc.valid(KindTag::Native));
    }

    #[test]
    fn test_native_issuer_mints_native() {
        let acc = token_account(NATIVE_TOKEN);
        acc.create_token(&spec(1_000_000), &amount(0)).unwrap();
        assert_eq!(acc.balance_of(TokenSymbol::NATIVE), amount(1_000_000));
        assert!(acc.keepers().is_empty());
    }

    #[test]
    fn test_token_round_trip() {
        let acc = token_account("$USD");
        let pristine = acc.data();
        acc.add(TokenSymbol::NATIVE, &amount(10)).unwrap();
        acc.create_token(&spec(1_000), &amount(10)).unwrap();
        acc.init_ledger(None);

        let recipient = funded(2, 0);
        acc.destroy_token(&recipient).unwrap();

        assert_eq!(acc.data(), pristine);
        assert_eq!(acc.threshold(), 0);
        assert!(acc.keepers().is_empty());
        assert_eq!(recipient.balance_of(TokenSymbol::NATIVE), amount(10));
    }

    #[test]
    fn test_destroy_requires_full_supply() {
        let acc = token_account("$USD");
        acc.create_token(&spec(1_000), &amount(0)).unwrap();
        let usd = TokenSymbol::new("$USD").unwrap();
        acc.subtract(usd, &amount(1)).unwrap();

        let recipient = funded(2, 0);
        let err = acc.destroy_token(&recipient).unwrap_err();
        assert!(matches!(err.root(), LedgerError::InvalidAccountType(_)));

        acc.add(usd, &amount(1)).unwrap();
        acc.destroy_token(&recipient).unwrap();
    }

    #[test]
    fn test_destroy_requires_settled_lending() {
        let acc = token_account("$USD");
        acc.add(TokenSymbol::NATIVE, &amount(100)).unwrap();
        acc.create_token(&spec(1_000), &amount(0)).unwrap();
        acc.init_ledger(None);
        acc.open_lending(LendingConfig {
            token: TokenSymbol::NATIVE,
            daily_interest: 100,
            overdue_interest: 100,
            min_amount: amount(1),
            max_amount: amount(50),
        })
        .unwrap();
        acc.borrow(TokenSymbol::NATIVE, Address([3; 20]), &amount(10), 0)
            .unwrap();

        let recipient = funded(2, 0);
        let err = acc.destroy_token(&recipient).unwrap_err();
        assert!(matches!(err.root(), LedgerError::LendingState(_)));

        acc.repay(TokenSymbol::NATIVE, Address([3; 20]), &amount(10))
            .unwrap();
        acc.destroy_token(&recipient).unwrap();
        assert!(acc.lending_config().is_none());
        assert_eq!(recipient.balance_of(TokenSymbol::NATIVE), amount(100));
    }

    #[test]
    fn test_stake_round_trip() {
        let acc = Account::new(StakeSymbol::new("#POOL").unwrap().address());
        acc.add(TokenSymbol::NATIVE, &amount(50)).unwrap();
        let pristine_nonce = acc.nonce();

        let spec = StakeSpec {
            threshold: 1,
            keepers: vec![PublicKey([8; 32])],
            approver: None,
            approve_list: BTreeSet::new(),
            stake: StakeConfig {
                tier: 1,
                token: TokenSymbol::NATIVE,
                lock_time: 0,
            },
        };
        acc.create_stake(&spec, &amount(50)).unwrap();
        assert!(acc.valid(KindTag::Staker));
        assert!(acc.check_as_from(TxType::CreateStake).is_ok());
        assert!(acc.check_as_from(TxType::Transfer).is_err());

        let recipient = funded(2, 0);
        acc.destroy_stake(&recipient).unwrap();
        assert!(acc.valid(KindTag::Native));
        assert!(acc.is_empty());
        assert_eq!(acc.nonce(), pristine_nonce);
        assert_eq!(recipient.balance_of(TokenSymbol::NATIVE), amount(50));
    }
}
