//ldvm-common/src/types.rs
//! Common type definitions and constants used throughout the ledger core

use crate::error::{LedgerError, LedgerResult};
use crate::validation::ValidationUtils;
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Block timestamp in seconds since Unix epoch
pub type Timestamp = u64;

/// Block height
pub type BlockHeight = u64;

/// Hash type - 32-byte SHA-256
pub type Hash = [u8; 32];

/// Ledger limits and numeric constants
pub mod limits {
    /// Maximum number of live expiration groups in one nonce table
    pub const MAX_NONCE_GROUPS: usize = 1024;

    /// Maximum number of nonces added by one transaction
    pub const MAX_NONCES_PER_TX: usize = 1024;

    /// Maximum distance between a nonce group expiry and the block timestamp
    pub const MAX_NONCE_EXPIRE_SECS: u64 = 30 * SECONDS_PER_DAY;

    /// Maximum number of keepers of one account
    pub const MAX_KEEPERS: usize = 64;

    /// Seconds in one interest day
    pub const SECONDS_PER_DAY: u64 = 86_400;

    /// Interest rates are expressed in parts-per-million
    pub const RATE_DENOMINATOR: u32 = 1_000_000;

    /// Upper bound of the daily and the overdue interest rate (1% per day)
    pub const MAX_DAILY_INTEREST: u32 = 10_000;

    /// Symbol length bounds including the prefix byte
    pub const MIN_SYMBOL_LEN: usize = 2;
    pub const MAX_SYMBOL_LEN: usize = 10;
}

/// Reserved symbol of the native-asset issuer account
pub const NATIVE_TOKEN: &str = "$LDC";

struct BytesVisitor<const N: usize>;

impl<'de, const N: usize> Visitor<'de> for BytesVisitor<N> {
    type Value = [u8; N];

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} bytes", N)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        v.try_into()
            .map_err(|_| E::invalid_length(v.len(), &self))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut out = [0u8; N];
        for (i, b) in out.iter_mut().enumerate() {
            *b = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(i, &self))?;
        }
        Ok(out)
    }
}

/// Fixed-size byte identifiers rendered as `0x` hex
macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Length in bytes
            pub const LEN: usize = $len;

            /// All-zero value
            pub const fn zero() -> Self {
                Self([0u8; $len])
            }

            /// Check if every byte is zero
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|&b| b == 0)
            }

            /// Build from a slice of exactly `LEN` bytes
            pub fn from_slice(bytes: &[u8]) -> LedgerResult<Self> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| {
                    LedgerError::syntactic(format!(
                        "invalid {} length: expected {}, got {}",
                        stringify!($name),
                        $len,
                        bytes.len()
                    ))
                })?;
                Ok(Self(arr))
            }

            /// Raw bytes
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// `0x` prefixed lowercase hex
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::zero()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> LedgerResult<Self> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(s).map_err(|e| {
                    LedgerError::syntactic(format!("invalid {} hex: {}", stringify!($name), e))
                })?;
                Self::from_slice(&bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_hex())
                } else {
                    serializer.serialize_bytes(&self.0)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    s.parse().map_err(de::Error::custom)
                } else {
                    deserializer
                        .deserialize_bytes(BytesVisitor::<$len>)
                        .map(Self)
                }
            }
        }
    };
}

fixed_bytes!(
    /// Account address - 20 bytes. Token and stake accounts live at the
    /// address whose bytes spell their symbol.
    Address,
    20
);

fixed_bytes!(
    /// Ed25519 verifying key of a keeper or an approver
    PublicKey,
    32
);

fixed_bytes!(
    /// Ed25519 signature
    Signature,
    64
);

impl Address {
    /// The zero address. It is the only account allowed to stay keeper-less
    /// and it is the default fee sink.
    pub const EMPTY: Address = Address::zero();
}

/// Prefixed, zero padded ASCII symbols (`$TOKEN`, `#STAKE`)
macro_rules! symbol_type {
    ($(#[$meta:meta])* $name:ident, $prefix:expr, $zero_display:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; 20]);

        impl $name {
            /// Prefix byte of every valid symbol of this kind
            pub const PREFIX: u8 = $prefix;

            /// Parse and validate a symbol
            pub fn new(symbol: &str) -> LedgerResult<Self> {
                let bytes = symbol.as_bytes();
                if bytes.len() > 20 {
                    return Err(LedgerError::syntactic(format!(
                        "invalid {} {:?}",
                        stringify!($name),
                        symbol
                    )));
                }
                let mut out = [0u8; 20];
                out[..bytes.len()].copy_from_slice(bytes);
                let sym = Self(out);
                if !sym.is_valid() {
                    return Err(LedgerError::syntactic(format!(
                        "invalid {} {:?}",
                        stringify!($name),
                        symbol
                    )));
                }
                Ok(sym)
            }

            /// Check if every byte is zero
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|&b| b == 0)
            }

            /// Check the symbol grammar
            pub fn is_valid(&self) -> bool {
                ValidationUtils::validate_symbol(&self.0, $prefix).is_ok()
            }

            /// The symbol text without padding
            pub fn as_str(&self) -> &str {
                let end = self.0.iter().position(|&b| b == 0).unwrap_or(20);
                std::str::from_utf8(&self.0[..end]).unwrap_or("")
            }

            /// The account address this symbol lives at
            pub fn address(&self) -> Address {
                Address(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_zero() {
                    f.write_str($zero_display)
                } else {
                    f.write_str(self.as_str())
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> LedgerResult<Self> {
                Self::new(s)
            }
        }

        impl From<$name> for Address {
            fn from(sym: $name) -> Address {
                sym.address()
            }
        }

        impl TryFrom<Address> for $name {
            type Error = LedgerError;

            fn try_from(addr: Address) -> LedgerResult<Self> {
                let sym = Self(addr.0);
                if !sym.is_valid() {
                    return Err(LedgerError::syntactic(format!(
                        "{} is not a valid {}",
                        addr,
                        stringify!($name)
                    )));
                }
                Ok(sym)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(self.as_str())
                } else {
                    serializer.serialize_bytes(&self.0)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    if s.is_empty() {
                        return Ok(Self::default());
                    }
                    Self::new(&s).map_err(de::Error::custom)
                } else {
                    deserializer
                        .deserialize_bytes(BytesVisitor::<20>)
                        .map(Self)
                }
            }
        }
    };
}

symbol_type!(
    /// Token symbol. The all-zero symbol denotes the native asset.
    TokenSymbol,
    b'$',
    "NativeToken"
);

symbol_type!(
    /// Staking account symbol
    StakeSymbol,
    b'#',
    ""
);

impl TokenSymbol {
    /// The native asset
    pub const NATIVE: TokenSymbol = TokenSymbol([0u8; 20]);

    /// Whether this is the native asset
    pub fn is_native(&self) -> bool {
        self.is_zero()
    }

    /// Whether these are the bytes of the reserved native issuer symbol
    pub fn is_native_issuer(&self) -> bool {
        self.as_str() == NATIVE_TOKEN
    }
}

/// Transaction types known to the ledger core
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TxType {
    Transfer,
    UpdateAccountInfo,
    AddNonceTable,
    CreateToken,
    DestroyToken,
    CreateStake,
    DestroyStake,
    OpenLending,
    CloseLending,
    Borrow,
    Repay,
}

impl TxType {
    /// Every transaction type
    pub const ALL: [TxType; 11] = [
        TxType::Transfer,
        TxType::UpdateAccountInfo,
        TxType::AddNonceTable,
        TxType::CreateToken,
        TxType::DestroyToken,
        TxType::CreateStake,
        TxType::DestroyStake,
        TxType::OpenLending,
        TxType::CloseLending,
        TxType::Borrow,
        TxType::Repay,
    ];
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type{:?}", self)
    }
}

/// Serde adapters for big amounts: decimal strings in human-readable formats,
/// the native `num-bigint` encoding otherwise.
pub mod amount_serde {
    use num_bigint::BigUint;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(u64),
    }

    fn parse<E: de::Error>(repr: Repr) -> Result<BigUint, E> {
        match repr {
            Repr::Text(s) => s
                .parse::<BigUint>()
                .map_err(|e| E::custom(format!("invalid amount {:?}: {}", s, e))),
            Repr::Number(n) => Ok(BigUint::from(n)),
        }
    }

    pub fn serialize<S: Serializer>(v: &BigUint, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.serialize_str(&v.to_str_radix(10))
        } else {
            v.serialize(s)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BigUint, D::Error> {
        if d.is_human_readable() {
            parse(Repr::deserialize(d)?)
        } else {
            BigUint::deserialize(d)
        }
    }

    /// Adapter for `Option<BigUint>`
    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(v: &Option<BigUint>, s: S) -> Result<S::Ok, S::Error> {
            if s.is_human_readable() {
                v.as_ref().map(|a| a.to_str_radix(10)).serialize(s)
            } else {
                v.serialize(s)
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<BigUint>, D::Error> {
            if d.is_human_readable() {
                Option::<Repr>::deserialize(d)?.map(parse).transpose()
            } else {
                Option::<BigUint>::deserialize(d)
            }
        }
    }

    /// Adapter for maps keyed by anything ordered with big amount values
    pub mod map {
        use super::*;

        pub fn serialize<K, S>(v: &BTreeMap<K, BigUint>, s: S) -> Result<S::Ok, S::Error>
        where
            K: Serialize + Ord,
            S: Serializer,
        {
            if s.is_human_readable() {
                v.iter()
                    .map(|(k, a)| (k, a.to_str_radix(10)))
                    .collect::<BTreeMap<_, _>>()
                    .serialize(s)
            } else {
                v.serialize(s)
            }
        }

        pub fn deserialize<'de, K, D>(d: D) -> Result<BTreeMap<K, BigUint>, D::Error>
        where
            K: Deserialize<'de> + Ord,
            D: Deserializer<'de>,
        {
            if d.is_human_readable() {
                BTreeMap::<K, Repr>::deserialize(d)?
                    .into_iter()
                    .map(|(k, r)| parse(r).map(|a| (k, a)))
                    .collect()
            } else {
                BTreeMap::<K, BigUint>::deserialize(d)
            }
        }
    }
}
