//! Transaction record and its payloads

use ldvm_common::prelude::*;
use ldvm_state::{LendingConfig, StakeSpec, TokenSpec};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// New keeper set of the sender
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub threshold: u16,
    pub keepers: Vec<PublicKey>,
    #[serde(default)]
    pub approver: Option<PublicKey>,
    #[serde(default)]
    pub approve_list: BTreeSet<TxType>,
}

/// One-time nonces to add to the sender's nonce table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceTableInput {
    pub expire: u64,
    pub nonces: Vec<u64>,
}

/// Terms a lender pre-approved for one draw
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowTerms {
    /// Nonce consumed from the lender's nonce table
    pub nonce: u64,
    /// Expiration group of `nonce`
    pub expire: u64,
    /// Zero means no due date
    #[serde(default)]
    pub due_time: u64,
}

/// Type specific payload
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxData {
    #[default]
    None,
    AccountInfo(AccountInfo),
    NonceTable(NonceTableInput),
    Token(TokenSpec),
    Stake(StakeSpec),
    Lending(LendingConfig),
    Borrow(BorrowTerms),
}

/// A signed transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_type: TxType,
    pub chain_id: u64,
    pub nonce: u64,
    #[serde(default)]
    pub gas_tip: u64,
    pub gas_fee_cap: u64,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    /// `None` means the native asset
    #[serde(default)]
    pub token: Option<TokenSymbol>,
    #[serde(with = "amount_serde::option", default)]
    pub amount: Option<BigUint>,
    #[serde(default)]
    pub data: TxData,
    #[serde(default)]
    pub signatures: Vec<Signature>,
    /// Counterparty signatures over [`Transaction::ex_digest`]
    #[serde(default)]
    pub ex_signatures: Vec<Signature>,
}

impl LedgerSerialize for Transaction {}

#[derive(Serialize)]
struct SigningPayload<'a> {
    tx_type: TxType,
    chain_id: u64,
    nonce: u64,
    gas_tip: u64,
    gas_fee_cap: u64,
    from: &'a Address,
    to: &'a Option<Address>,
    token: &'a Option<TokenSymbol>,
    amount: &'a Option<BigUint>,
    data: &'a TxData,
}

impl Transaction {
    pub fn new(tx_type: TxType, chain_id: u64, nonce: u64, from: Address) -> Self {
        Self {
            tx_type,
            chain_id,
            nonce,
            gas_tip: 0,
            gas_fee_cap: 0,
            from,
            to: None,
            token: None,
            amount: None,
            data: TxData::None,
            signatures: Vec::new(),
            ex_signatures: Vec::new(),
        }
    }

    pub fn with_gas(mut self, gas_tip: u64, gas_fee_cap: u64) -> Self {
        self.gas_tip = gas_tip;
        self.gas_fee_cap = gas_fee_cap;
        self
    }

    pub fn with_to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    pub fn with_token(mut self, token: TokenSymbol) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_amount(mut self, amount: BigUint) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_data(mut self, data: TxData) -> Self {
        self.data = data;
        self
    }

    fn signing_payload(&self) -> SigningPayload<'_> {
        SigningPayload {
            tx_type: self.tx_type,
            chain_id: self.chain_id,
            nonce: self.nonce,
            gas_tip: self.gas_tip,
            gas_fee_cap: self.gas_fee_cap,
            from: &self.from,
            to: &self.to,
            token: &self.token,
            amount: &self.amount,
            data: &self.data,
        }
    }

    /// Digest signed by the sender: every field except the signatures
    pub fn digest(&self) -> LedgerResult<Hash> {
        Ok(CryptoUtils::hash(&bincode::serialize(&self.signing_payload())?))
    }

    /// Digest signed by the counterparty: the sender's digest and signatures
    pub fn ex_digest(&self) -> LedgerResult<Hash> {
        let digest = self.digest()?;
        let sigs = bincode::serialize(&self.signatures)?;
        Ok(CryptoUtils::hash_multiple(&[&digest, &sigs]))
    }

    /// Identity of the fully signed transaction
    pub fn id(&self) -> LedgerResult<Hash> {
        self.content_hash()
    }

    /// Size of the canonical encoding in bytes
    pub fn size(&self) -> LedgerResult<u64> {
        Ok(self.encode()?.len() as u64)
    }

    /// Effective token symbol
    pub fn token_or_native(&self) -> TokenSymbol {
        self.token.unwrap_or(TokenSymbol::NATIVE)
    }

    /// Append a sender signature
    pub fn sign(&mut self, keypair: &Keypair) -> LedgerResult<()> {
        let digest = self.digest()?;
        self.signatures.push(keypair.sign(&digest));
        Ok(())
    }

    /// Append a counterparty signature. Must follow every sender signature.
    pub fn sign_ex(&mut self, keypair: &Keypair) -> LedgerResult<()> {
        let digest = self.ex_digest()?;
        self.ex_signatures.push(keypair.sign(&digest));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer() -> Transaction {
        Transaction::new(TxType::Transfer, 2357, 0, Address([1; 20]))
            .with_gas(0, 1_000)
            .with_to(Address([2; 20]))
            .with_amount(BigUint::from(100u32))
    }

    #[test]
    fn test_digest_ignores_signatures() {
        let mut tx = transfer();
        let digest = tx.digest().unwrap();
        let id = tx.id().unwrap();
        tx.sign(&Keypair::from_seed([1; 32])).unwrap();
        assert_eq!(tx.digest().unwrap(), digest);
        assert_ne!(tx.id().unwrap(), id);

        let mut other = transfer();
        other.nonce = 1;
        assert_ne!(other.digest().unwrap(), digest);
    }

    #[test]
    fn test_ex_digest_covers_sender_signatures() {
        let mut tx = transfer();
        let before = tx.ex_digest().unwrap();
        tx.sign(&Keypair::from_seed([1; 32])).unwrap();
        assert_ne!(tx.ex_digest().unwrap(), before);
    }

    #[test]
    fn test_json_shape() {
        let mut tx = transfer().with_data(TxData::NonceTable(NonceTableInput {
            expire: 10,
            nonces: vec![1, 2],
        }));
        tx.sign(&Keypair::from_seed([1; 32])).unwrap();

        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains(r#""amount":"100""#));
        assert!(json.contains(r#""tx_type":"Transfer""#));
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
        assert_eq!(Transaction::decode(&tx.encode().unwrap()).unwrap(), tx);
    }
}
