//! Account kinds and the sender/recipient role tables

use ldvm_common::prelude::*;
use num_bigint::BigUint;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Highest stake tier
pub const MAX_STAKE_TIER: u8 = 2;

/// Descriptor of a staking account.
///
/// `tier` 0 may only manage itself, 1 may additionally fund other staking
/// accounts, 2 may additionally transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeConfig {
    pub tier: u8,
    pub token: TokenSymbol,
    pub lock_time: u64,
}

impl StakeConfig {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.tier > MAX_STAKE_TIER {
            return Err(LedgerError::syntactic(format!(
                "invalid stake tier, expected <= {}, got {}",
                MAX_STAKE_TIER, self.tier
            )));
        }
        if !self.token.is_native() && !self.token.is_valid() {
            return Err(LedgerError::syntactic(format!(
                "invalid stake token {}",
                self.token
            )));
        }
        Ok(())
    }
}

/// Shape of an account
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    #[default]
    Native,
    TokenIssuer {
        #[serde(with = "amount_serde")]
        max_total_supply: BigUint,
    },
    Staker {
        stake: StakeConfig,
    },
}

/// Discriminant of [`AccountKind`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KindTag {
    Native,
    TokenIssuer,
    Staker,
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindTag::Native => f.write_str("NativeAccount"),
            KindTag::TokenIssuer => f.write_str("TokenAccount"),
            KindTag::Staker => f.write_str("StakeAccount"),
        }
    }
}

impl AccountKind {
    pub fn tag(&self) -> KindTag {
        match self {
            AccountKind::Native => KindTag::Native,
            AccountKind::TokenIssuer { .. } => KindTag::TokenIssuer,
            AccountKind::Staker { .. } => KindTag::Staker,
        }
    }

    fn role_key(&self) -> (KindTag, u8) {
        match self {
            AccountKind::Staker { stake } => (KindTag::Staker, stake.tier),
            other => (other.tag(), 0),
        }
    }

    fn roles(&self) -> LedgerResult<&'static RolePolicy> {
        ROLE_TABLE.get(&self.role_key()).ok_or_else(|| {
            LedgerError::account_type(format!("no role policy for {:?}", self.role_key()))
        })
    }

    /// Whether this kind may send `tx_type`
    pub fn check_as_from(&self, tx_type: TxType) -> LedgerResult<()> {
        if !self.roles()?.senders.contains(&tx_type) {
            return Err(LedgerError::RoleNotAllowed {
                tx_type: tx_type.to_string(),
                role: "sender",
            });
        }
        Ok(())
    }

    /// Whether this kind may receive `tx_type`
    pub fn check_as_to(&self, tx_type: TxType) -> LedgerResult<()> {
        if !self.roles()?.recipients.contains(&tx_type) {
            return Err(LedgerError::RoleNotAllowed {
                tx_type: tx_type.to_string(),
                role: "recipient",
            });
        }
        Ok(())
    }
}

struct RolePolicy {
    senders: BTreeSet<TxType>,
    recipients: BTreeSet<TxType>,
}

impl RolePolicy {
    fn new(senders: &[TxType], recipients: &[TxType]) -> Self {
        Self {
            senders: senders.iter().copied().collect(),
            recipients: recipients.iter().copied().collect(),
        }
    }
}

static ROLE_TABLE: Lazy<HashMap<(KindTag, u8), RolePolicy>> = Lazy::new(|| {
    use TxType::*;

    let native_senders: Vec<TxType> = TxType::ALL
        .iter()
        .copied()
        .filter(|t| !matches!(t, DestroyToken | DestroyStake))
        .collect();
    let issuer_senders = [
        Transfer,
        UpdateAccountInfo,
        AddNonceTable,
        DestroyToken,
        OpenLending,
        CloseLending,
    ];
    let staker_senders = [
        UpdateAccountInfo,
        AddNonceTable,
        DestroyStake,
        OpenLending,
        CloseLending,
    ];
    let typed_recipients = [Transfer, Borrow, Repay];

    let mut tier1 = staker_senders.to_vec();
    tier1.push(CreateStake);
    let mut tier2 = tier1.clone();
    tier2.push(Transfer);

    let mut table = HashMap::new();
    table.insert(
        (KindTag::Native, 0),
        RolePolicy::new(&native_senders, &TxType::ALL),
    );
    table.insert(
        (KindTag::TokenIssuer, 0),
        RolePolicy::new(&issuer_senders, &typed_recipients),
    );
    table.insert(
        (KindTag::Staker, 0),
        RolePolicy::new(&staker_senders, &typed_recipients),
    );
    table.insert(
        (KindTag::Staker, 1),
        RolePolicy::new(&tier1, &typed_recipients),
    );
    table.insert(
        (KindTag::Staker, 2),
        RolePolicy::new(&tier2, &typed_recipients),
    );
    table
});
