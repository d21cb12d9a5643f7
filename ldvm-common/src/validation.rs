//! Input validation utilities and patterns

use crate::{
    error::{LedgerError, LedgerResult},
    types::{limits, PublicKey},
};
use num_bigint::BigUint;
use num_traits::Zero;
use std::collections::BTreeSet;

/// Validation utilities for common data types
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate a zero padded symbol: prefix byte, then an uppercase letter,
    /// then uppercase letters or digits, 2 to 10 bytes in total.
    pub fn validate_symbol(bytes: &[u8; 20], prefix: u8) -> LedgerResult<()> {
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());

        if !(limits::MIN_SYMBOL_LEN..=limits::MAX_SYMBOL_LEN).contains(&len) {
            return Err(LedgerError::syntactic(format!(
                "symbol length {} out of range",
                len
            )));
        }
        if bytes[0] != prefix {
            return Err(LedgerError::syntactic(format!(
                "symbol must start with {:?}",
                prefix as char
            )));
        }
        if !bytes[1].is_ascii_uppercase() {
            return Err(LedgerError::syntactic(
                "symbol must start with an uppercase letter",
            ));
        }
        if !bytes[2..len]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            return Err(LedgerError::syntactic("symbol has invalid characters"));
        }
        if bytes[len..].iter().any(|&b| b != 0) {
            return Err(LedgerError::syntactic("symbol has trailing bytes"));
        }
        Ok(())
    }

    /// Validate a keeper set: `1 <= threshold <= keepers.len() <= MAX_KEEPERS`,
    /// no duplicates, no zero keys
    pub fn validate_keepers(threshold: u16, keepers: &[PublicKey]) -> LedgerResult<()> {
        if keepers.is_empty() {
            return Err(LedgerError::syntactic("keepers cannot be empty"));
        }
        if keepers.len() > limits::MAX_KEEPERS {
            return Err(LedgerError::syntactic(format!(
                "too many keepers, expected <= {}, got {}",
                limits::MAX_KEEPERS,
                keepers.len()
            )));
        }
        if threshold == 0 || threshold as usize > keepers.len() {
            return Err(LedgerError::syntactic(format!(
                "invalid threshold, expected 1..={}, got {}",
                keepers.len(),
                threshold
            )));
        }
        let mut seen = BTreeSet::new();
        for key in keepers {
            if key.is_zero() {
                return Err(LedgerError::syntactic("keeper cannot be the zero key"));
            }
            if !seen.insert(key) {
                return Err(LedgerError::syntactic(format!(
                    "duplicate keeper {}",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Validate a daily interest rate in parts-per-million
    pub fn validate_rate(name: &str, ppm: u32) -> LedgerResult<()> {
        if ppm == 0 || ppm > limits::MAX_DAILY_INTEREST {
            return Err(LedgerError::lending(format!(
                "invalid {}, expected 1..={}, got {}",
                name,
                limits::MAX_DAILY_INTEREST,
                ppm
            )));
        }
        Ok(())
    }

    /// Validate a strictly positive amount
    pub fn validate_positive(name: &str, amount: &BigUint) -> LedgerResult<()> {
        if amount.is_zero() {
            return Err(LedgerError::invalid_amount(format!(
                "{} must be positive",
                name
            )));
        }
        Ok(())
    }

    /// Validate `min <= max`
    pub fn validate_range(min: &BigUint, max: &BigUint) -> LedgerResult<()> {
        if max < min {
            return Err(LedgerError::invalid_amount(format!(
                "invalid range, max {} < min {}",
                max, min
            )));
        }
        Ok(())
    }
}
