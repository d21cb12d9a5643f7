//! Fee schedule

use ldvm_common::prelude::*;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Gas pricing, gas limits and account creation pledges
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Current gas price in native units
    pub gas_price: u64,

    /// Maximum gas of one transaction
    pub max_tx_gas: u64,

    /// Gas charged per byte of the encoded transaction
    pub gas_per_byte: u64,

    /// Base gas for types missing from `base_gas`
    pub default_base_gas: u64,

    /// Per-type base gas
    pub base_gas: BTreeMap<TxType, u64>,

    /// Minimum native pledge of a token issuer
    #[serde(with = "amount_serde")]
    pub min_token_pledge: BigUint,

    /// Minimum native pledge of a staking account
    #[serde(with = "amount_serde")]
    pub min_stake_pledge: BigUint,

    /// Account receiving fees
    pub fee_sink: Address,

    /// Keepers at this index or above do not count for "plus" verification
    pub plus_keepers_cutoff: usize,
}

impl Default for FeeConfig {
    fn default() -> Self {
        let base_gas = [
            (TxType::CreateToken, 10_000),
            (TxType::CreateStake, 10_000),
            (TxType::DestroyToken, 5_000),
            (TxType::DestroyStake, 5_000),
            (TxType::OpenLending, 2_000),
        ]
        .into_iter()
        .collect();

        Self {
            gas_price: 1_000,
            max_tx_gas: 42_000_000,
            gas_per_byte: 1,
            default_base_gas: 100,
            base_gas,
            min_token_pledge: BigUint::from(10_000_000_000_000u64),
            min_stake_pledge: BigUint::from(1_000_000_000_000u64),
            fee_sink: Address::EMPTY,
            plus_keepers_cutoff: limits::MAX_KEEPERS,
        }
    }
}

impl FeeConfig {
    /// Validate configuration
    pub fn validate(&self) -> LedgerResult<()> {
        if self.gas_price == 0 {
            return Err(LedgerError::config("gas_price must be greater than 0"));
        }
        if self.max_tx_gas == 0 {
            return Err(LedgerError::config("max_tx_gas must be greater than 0"));
        }
        if self.plus_keepers_cutoff == 0 {
            return Err(LedgerError::config(
                "plus_keepers_cutoff must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Base gas of `tx_type`
    pub fn base_gas_of(&self, tx_type: TxType) -> u64 {
        self.base_gas
            .get(&tx_type)
            .copied()
            .unwrap_or(self.default_base_gas)
    }

    /// `base(type) + bytes * gas_per_byte`, saturating
    pub fn gas(&self, tx_type: TxType, bytes: u64) -> u64 {
        self.base_gas_of(tx_type)
            .saturating_add(bytes.saturating_mul(self.gas_per_byte))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        FeeConfig::default().validate().unwrap();
    }

    #[test]
    fn test_gas_schedule() {
        let fees = FeeConfig::default();
        assert_eq!(fees.gas(TxType::Transfer, 200), 300);
        assert_eq!(fees.gas(TxType::CreateToken, 200), 10_200);
        assert_eq!(fees.gas(TxType::Transfer, u64::MAX), u64::MAX);
    }

    #[test]
    fn test_invalid_values() {
        let mut fees = FeeConfig::default();
        fees.gas_price = 0;
        assert!(matches!(fees.validate(), Err(LedgerError::Config(_))));

        let mut fees = FeeConfig::default();
        fees.plus_keepers_cutoff = 0;
        assert!(fees.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let fees: FeeConfig = toml::from_str("gas_price = 5\nmin_token_pledge = \"7\"").unwrap();
        assert_eq!(fees.gas_price, 5);
        assert_eq!(fees.min_token_pledge, BigUint::from(7u32));
        assert_eq!(fees.max_tx_gas, FeeConfig::default().max_tx_gas);
    }
}
