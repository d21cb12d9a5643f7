//! Lending markets: configuration, the per-counterparty side ledger and
//! compound interest accrual.

use crate::account::Account;
use ldvm_common::prelude::*;
use num_bigint::BigUint;
use num_traits::{Float, Zero};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Terms of an open lending market. Rates are parts-per-million per day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingConfig {
    pub token: TokenSymbol,
    pub daily_interest: u32,
    /// Surcharge added to `daily_interest` once an entry is overdue
    pub overdue_interest: u32,
    #[serde(with = "amount_serde")]
    pub min_amount: BigUint,
    #[serde(with = "amount_serde")]
    pub max_amount: BigUint,
}

impl LendingConfig {
    pub fn validate(&self) -> LedgerResult<()> {
        if !self.token.is_native() && !self.token.is_valid() {
            return Err(LedgerError::syntactic(format!(
                "invalid lending token {}",
                self.token
            )));
        }
        ValidationUtils::validate_rate("daily_interest", self.daily_interest)?;
        ValidationUtils::validate_rate("overdue_interest", self.overdue_interest)?;
        ValidationUtils::validate_positive("min_amount", &self.min_amount)?;
        ValidationUtils::validate_range(&self.min_amount, &self.max_amount)?;
        Ok(())
    }
}

/// One open borrow position
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingEntry {
    /// Principal plus interest accrued up to `update_at`
    #[serde(with = "amount_serde")]
    pub amount: BigUint,
    pub update_at: Timestamp,
    /// Zero means no due date
    pub due_time: Timestamp,
}

/// Side table of open positions keyed by borrower
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLedger {
    pub lending: BTreeMap<Address, LendingEntry>,
}

impl LedgerSerialize for AccountLedger {}

/// `amount * Π factors`, computed exactly and truncated toward zero once.
///
/// Large principals can land one unit away from `(amount as f64 * factor)`
/// truncated, since the float product rounds before truncating.
fn mul_factors(amount: &BigUint, factors: &[f64]) -> LedgerResult<BigUint> {
    let mut product = amount.clone();
    let mut exponent: i32 = 0;
    for &factor in factors {
        if !factor.is_finite() || factor < 0.0 {
            return Err(LedgerError::lending(format!(
                "interest factor out of range: {}",
                factor
            )));
        }
        let (mantissa, exp, _) = factor.integer_decode();
        product *= mantissa;
        exponent += i32::from(exp);
    }
    Ok(if exponent >= 0 {
        product << exponent as usize
    } else {
        product >> exponent.unsigned_abs() as usize
    })
}

/// Accrued total of `entry` at `now` under `cfg`.
///
/// Interest compounds daily with fractional days allowed. The overdue
/// surcharge applies to the part of the interval after `due_time`.
pub fn accrue(cfg: &LendingConfig, entry: &LendingEntry, now: Timestamp) -> LedgerResult<BigUint> {
    if now <= entry.update_at {
        return Ok(entry.amount.clone());
    }

    let denominator = f64::from(limits::RATE_DENOMINATOR);
    let plain = 1.0 + f64::from(cfg.daily_interest) / denominator;
    let overdue =
        1.0 + (f64::from(cfg.daily_interest) + f64::from(cfg.overdue_interest)) / denominator;
    let days = |secs: u64| secs as f64 / limits::SECONDS_PER_DAY as f64;

    let factors = if entry.due_time == 0 || now <= entry.due_time {
        vec![plain.powf(days(now - entry.update_at))]
    } else if entry.update_at >= entry.due_time {
        vec![overdue.powf(days(now - entry.update_at))]
    } else {
        vec![
            plain.powf(days(entry.due_time - entry.update_at)),
            overdue.powf(days(now - entry.due_time)),
        ]
    };
    // exact product, one truncation; may differ by one unit from float math
    mul_factors(&entry.amount, &factors)
}

impl Account {
    /// Attach the lending side table. `None` attaches an empty table unless
    /// one is already attached.
    pub fn init_ledger(&self, ledger: Option<AccountLedger>) {
        let mut inner = self.write();
        if ledger.is_some() || inner.ledger.is_none() {
            inner.ledger = Some(ledger.unwrap_or_default());
        }
    }

    pub fn has_ledger(&self) -> bool {
        self.read().ledger.is_some()
    }

    /// A copy of the attached side table
    pub fn ledger(&self) -> Option<AccountLedger> {
        self.read().ledger.clone()
    }

    pub fn lending_config(&self) -> Option<LendingConfig> {
        self.read().data.lending.clone()
    }

    pub fn open_lending(&self, cfg: LendingConfig) -> LedgerResult<()> {
        let op = || self.ctx("OpenLending");
        cfg.validate().with_context(op)?;

        let mut inner = self.write();
        if inner.ledger.is_none() {
            return Err(LedgerError::lending("ledger not initialized").wrap(op()));
        }
        if inner.data.lending.is_some() {
            return Err(LedgerError::lending("lending exists").wrap(op()));
        }
        debug!(account = %self.id(), token = %cfg.token, "lending opened");
        inner.data.lending = Some(cfg);
        Ok(())
    }

    pub fn close_lending(&self) -> LedgerResult<()> {
        let op = || self.ctx("CloseLending");
        let mut inner = self.write();
        if inner.data.lending.is_none() {
            return Err(LedgerError::lending("invalid lending").wrap(op()));
        }
        let open = inner.ledger.as_ref().map_or(0, |l| l.lending.len());
        if open > 0 {
            return Err(LedgerError::lending(format!(
                "please repay all before close, {} entries open",
                open
            ))
            .wrap(op()));
        }
        inner.data.lending = None;
        debug!(account = %self.id(), "lending closed");
        Ok(())
    }

    /// Record a draw of `amount` by `from`. The balance is checked but not
    /// debited.
    pub fn borrow(
        &self,
        token: TokenSymbol,
        from: Address,
        amount: &BigUint,
        due_time: Timestamp,
    ) -> LedgerResult<()> {
        let op = || self.ctx("Borrow");
        ValidationUtils::validate_positive("amount", amount).with_context(op)?;

        let mut inner = self.write();
        let now = inner.data.timestamp;
        let cfg = inner
            .data
            .lending
            .clone()
            .ok_or_else(|| LedgerError::lending("invalid lending").wrap(op()))?;
        if cfg.token != token {
            return Err(LedgerError::lending(format!(
                "invalid token, expected {}, got {}",
                cfg.token, token
            ))
            .wrap(op()));
        }
        if due_time > 0 && due_time <= now {
            return Err(LedgerError::lending(format!(
                "invalid due_time, expected > {}, got {}",
                now, due_time
            ))
            .wrap(op()));
        }
        if *amount < cfg.min_amount {
            return Err(LedgerError::invalid_amount(format!(
                "expected >= {}, got {}",
                cfg.min_amount, amount
            ))
            .wrap(op()));
        }

        let ledger = inner
            .ledger
            .as_ref()
            .ok_or_else(|| LedgerError::lending("ledger not initialized").wrap(op()))?;
        let accrued = match ledger.lending.get(&from) {
            Some(entry) => accrue(&cfg, entry, now).with_context(op)?,
            None => BigUint::zero(),
        };
        let total = accrued + amount;
        if total > cfg.max_amount {
            return Err(LedgerError::invalid_amount(format!(
                "total borrow {} exceeds max {}",
                total, cfg.max_amount
            ))
            .wrap(op()));
        }
        inner.data.check_balance(token, amount).with_context(op)?;

        debug!(lender = %self.id(), borrower = %from, %total, due_time, "borrow recorded");
        if let Some(ledger) = inner.ledger.as_mut() {
            ledger.lending.insert(
                from,
                LendingEntry {
                    amount: total,
                    update_at: now,
                    due_time,
                },
            );
        }
        Ok(())
    }

    /// Settle up to `amount` of `from`'s position, returning the amount
    /// actually repaid. Repaying the accrued total or more closes the entry.
    pub fn repay(&self, token: TokenSymbol, from: Address, amount: &BigUint) -> LedgerResult<BigUint> {
        let op = || self.ctx("Repay");
        ValidationUtils::validate_positive("amount", amount).with_context(op)?;

        let mut inner = self.write();
        let now = inner.data.timestamp;
        let cfg = inner
            .data
            .lending
            .clone()
            .ok_or_else(|| LedgerError::lending("invalid lending").wrap(op()))?;
        if cfg.token != token {
            return Err(LedgerError::lending(format!(
                "invalid token, expected {}, got {}",
                cfg.token, token
            ))
            .wrap(op()));
        }
        let ledger = inner
            .ledger
            .as_mut()
            .ok_or_else(|| LedgerError::lending("ledger not initialized").wrap(op()))?;
        let entry = ledger
            .lending
            .get_mut(&from)
            .ok_or_else(|| LedgerError::lending(format!("{} has no borrow", from)).wrap(op()))?;

        let total = accrue(&cfg, entry, now).with_context(op)?;
        if *amount >= total {
            ledger.lending.remove(&from);
            debug!(lender = %self.id(), borrower = %from, repaid = %total, "borrow settled");
            return Ok(total);
        }
        entry.amount = total - amount;
        entry.update_at = now;
        Ok(amount.clone())
    }

    /// Accrued total owed by `from` at the account timestamp, zero if none
    pub fn calc_borrow_total(&self, from: Address) -> LedgerResult<BigUint> {
        let inner = self.read();
        let (Some(cfg), Some(ledger)) = (&inner.data.lending, &inner.ledger) else {
            return Ok(BigUint::zero());
        };
        match ledger.lending.get(&from) {
            Some(entry) => accrue(cfg, entry, inner.data.timestamp)
                .with_context(|| self.ctx("CalcBorrowTotal")),
            None => Ok(BigUint::zero()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::tests::{amount, funded};

    const UNIT: u64 = 1_000_000_000;
    const DAY: u64 = 86_400;

    fn config(min: u64, max: u64) -> LendingConfig {
        LendingConfig {
            token: TokenSymbol::NATIVE,
            daily_interest: 10_000,
            overdue_interest: 10_000,
            min_amount: amount(min),
            max_amount: amount(max),
        }
    }

    fn lender() -> Account {
        let acc = funded(1, 100 * UNIT);
        acc.touch(1_000);
        acc.init_ledger(None);
        acc.open_lending(config(UNIT, 10 * UNIT)).unwrap();
        acc
    }

    fn entry(amount_: u64, update_at: u64, due_time: u64) -> LendingEntry {
        LendingEntry {
            amount: amount(amount_),
            update_at,
            due_time,
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(config(1, 10).validate().is_ok());
        assert!(config(0, 10).validate().is_err());
        assert!(config(11, 10).validate().is_err());

        let mut cfg = config(1, 10);
        cfg.daily_interest = 10_001;
        assert!(cfg.validate().is_err());
        cfg.daily_interest = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_open_close_state_machine() {
        let acc = funded(1, 100);
        let err = acc.open_lending(config(1, 10)).unwrap_err();
        assert!(matches!(err.root(), LedgerError::LendingState(_)));

        acc.init_ledger(None);
        assert!(acc.close_lending().is_err());
        acc.open_lending(config(1, 10)).unwrap();
        assert!(acc.open_lending(config(1, 10)).is_err());

        acc.borrow(TokenSymbol::NATIVE, Address([2; 20]), &amount(5), 0)
            .unwrap();
        assert!(acc.close_lending().is_err());

        acc.repay(TokenSymbol::NATIVE, Address([2; 20]), &amount(5))
            .unwrap();
        acc.close_lending().unwrap();
        assert!(acc.lending_config().is_none());
    }

    #[test]
    fn test_accrual_identity_and_monotonicity() {
        let cfg = config(1, u64::MAX);
        let e = entry(UNIT, 1_000, 0);
        assert_eq!(accrue(&cfg, &e, 1_000).unwrap(), amount(UNIT));
        assert_eq!(accrue(&cfg, &e, 500).unwrap(), amount(UNIT));

        let mut last = amount(UNIT);
        for now in [1_001, 2_000, 1_000 + DAY / 2, 1_000 + DAY, 1_000 + 10 * DAY] {
            let total = accrue(&cfg, &e, now).unwrap();
            assert!(total >= last, "accrual decreased at {}", now);
            last = total;
        }
    }

    #[test]
    fn test_accrual_one_day() {
        let cfg = config(1, u64::MAX);
        let e = entry(UNIT, 0, 0);
        assert_eq!(accrue(&cfg, &e, DAY).unwrap(), amount(1_010_000_000));
    }

    #[test]
    fn test_accrual_overdue() {
        let cfg = config(1, u64::MAX);

        // overdue for the whole interval: 2% per day
        let e = entry(UNIT, DAY, DAY);
        assert_eq!(accrue(&cfg, &e, 2 * DAY).unwrap(), amount(1_020_000_000));

        // due date at the end of the interval still uses the plain rate
        let e = entry(UNIT, 0, DAY);
        assert_eq!(accrue(&cfg, &e, DAY).unwrap(), amount(1_010_000_000));

        // one plain day then one overdue day
        let e = entry(UNIT, 0, DAY);
        let expected = mul_factors(&amount(UNIT), &[1.01, 1.02]).unwrap();
        assert_eq!(accrue(&cfg, &e, 2 * DAY).unwrap(), expected);
        assert_eq!(expected, amount(1_030_200_000));
    }

    #[test]
    fn test_accrual_extreme_rates() {
        // neither rate is range-checked here; the sum must not wrap in u32
        let cfg = LendingConfig {
            daily_interest: u32::MAX,
            overdue_interest: u32::MAX,
            ..config(1, u64::MAX)
        };
        let e = entry(UNIT, DAY, DAY);
        let total = accrue(&cfg, &e, 2 * DAY).unwrap();
        assert!(total > amount(8_590 * UNIT));
        assert!(total < amount(8_592 * UNIT));

        let e = entry(UNIT, 0, DAY);
        assert!(accrue(&cfg, &e, 2 * DAY).unwrap() > total);
    }

    #[test]
    fn test_exact_product_vs_float() {
        // 2^60 + 1 has no exact f64 form, so the float route loses the low bit
        let principal = (BigUint::from(1u64) << 60usize) + 1u32;
        let exact = mul_factors(&principal, &[1.5]).unwrap();
        assert_eq!(exact, (BigUint::from(3u64) << 59usize) + 1u32);

        let float = ((1u64 << 60) + 1) as f64 * 1.5;
        assert_eq!(float as u64, 3u64 << 59);
    }

    #[test]
    fn test_borrow_bounds() {
        let acc = lender();
        let borrower = Address([2; 20]);

        let err = acc
            .borrow(TokenSymbol::NATIVE, borrower, &amount(UNIT - 1), 0)
            .unwrap_err();
        assert!(matches!(err.root(), LedgerError::InvalidAmount(_)));

        let usd = TokenSymbol::new("$USD").unwrap();
        assert!(acc.borrow(usd, borrower, &amount(UNIT), 0).is_err());
        assert!(acc
            .borrow(TokenSymbol::NATIVE, borrower, &amount(UNIT), 1_000)
            .is_err());

        acc.borrow(TokenSymbol::NATIVE, borrower, &amount(6 * UNIT), 0)
            .unwrap();
        let err = acc
            .borrow(TokenSymbol::NATIVE, borrower, &amount(5 * UNIT), 0)
            .unwrap_err();
        assert!(matches!(err.root(), LedgerError::InvalidAmount(_)));
        acc.borrow(TokenSymbol::NATIVE, borrower, &amount(4 * UNIT), 5_000)
            .unwrap();

        let ledger = acc.ledger().unwrap();
        let e = ledger.lending.get(&borrower).unwrap();
        assert_eq!(e.amount, amount(10 * UNIT));
        assert_eq!(e.due_time, 5_000);
        // borrowing does not debit the lender
        assert_eq!(acc.balance_of(TokenSymbol::NATIVE), amount(100 * UNIT));
    }

    #[test]
    fn test_borrow_checks_balance() {
        let acc = funded(1, UNIT);
        acc.init_ledger(None);
        acc.open_lending(config(UNIT, 10 * UNIT)).unwrap();
        let err = acc
            .borrow(TokenSymbol::NATIVE, Address([2; 20]), &amount(2 * UNIT), 0)
            .unwrap_err();
        assert!(matches!(err.root(), LedgerError::InsufficientBalance { .. }));
    }

    #[test]
    fn test_repay_partial_and_capped() {
        let acc = lender();
        let borrower = Address([2; 20]);
        acc.borrow(TokenSymbol::NATIVE, borrower, &amount(2 * UNIT), 0)
            .unwrap();

        acc.touch(1_000 + DAY);
        assert_eq!(
            acc.calc_borrow_total(borrower).unwrap(),
            amount(2_020_000_000)
        );

        let actual = acc
            .repay(TokenSymbol::NATIVE, borrower, &amount(UNIT))
            .unwrap();
        assert_eq!(actual, amount(UNIT));
        let e = acc.ledger().unwrap().lending[&borrower].clone();
        assert_eq!(e.amount, amount(1_020_000_000));
        assert_eq!(e.update_at, 1_000 + DAY);

        let actual = acc
            .repay(TokenSymbol::NATIVE, borrower, &amount(5 * UNIT))
            .unwrap();
        assert_eq!(actual, amount(1_020_000_000));
        assert!(acc.ledger().unwrap().lending.is_empty());
        assert_eq!(acc.calc_borrow_total(borrower).unwrap(), amount(0));

        let err = acc
            .repay(TokenSymbol::NATIVE, borrower, &amount(1))
            .unwrap_err();
        assert!(matches!(err.root(), LedgerError::LendingState(_)));
    }

    #[test]
    fn test_one_percent_scenario() {
        let acc = lender();
        let borrower = Address([2; 20]);
        acc.borrow(TokenSymbol::NATIVE, borrower, &amount(UNIT), 0)
            .unwrap();

        acc.touch(1_000 + DAY);
        let total = acc.calc_borrow_total(borrower).unwrap();
        assert_eq!(total, amount(1_010_000_000));

        let actual = acc
            .repay(TokenSymbol::NATIVE, borrower, &amount(2 * UNIT))
            .unwrap();
        assert_eq!(actual, amount(1_010_000_000));
        assert_eq!(acc.calc_borrow_total(borrower).unwrap(), amount(0));
    }

    #[test]
    fn test_ledger_change_detection() {
        let acc = lender();
        let stored = acc.marshal_ledger().unwrap();
        assert!(!acc.ledger_changed(stored.as_deref()).unwrap());

        acc.borrow(TokenSymbol::NATIVE, Address([2; 20]), &amount(UNIT), 0)
            .unwrap();
        assert!(acc.ledger_changed(stored.as_deref()).unwrap());
        assert!(acc.ledger_changed(None).unwrap());
    }
}
