//! Batch execution over a chain state.
//!
//! Every transaction either commits all of its effects or none of them: a
//! failure in any phase is followed by `checkout`, which discards whatever
//! an accept step may have applied before failing.

use crate::config::ChainConfig;
use ldvm_common::prelude::*;
use ldvm_state::ChainState;
use ldvm_transaction::{apply_transaction, Phase, Receipt, Transaction, TxContext};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// A transaction that was not applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Position in the batch
    pub index: usize,
    #[serde(with = "hex::serde")]
    pub tx_id: Hash,
    pub phase: Phase,
    pub error: String,
}

/// Result of one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub receipts: Vec<Receipt>,
    pub rejections: Vec<Rejection>,
    /// Merkle root over the receipt hashes, zero for an empty batch
    #[serde(with = "hex::serde")]
    pub merkle_root: Hash,
}

pub struct BatchExecutor<'a> {
    config: &'a ChainConfig,
    verifier: &'a dyn SignatureVerifier,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(config: &'a ChainConfig, verifier: &'a dyn SignatureVerifier) -> Self {
        Self { config, verifier }
    }

    /// Apply `txs` in order. Rejected transactions do not stop the batch;
    /// only a failing state backend or a broken global invariant does.
    pub fn apply_batch(
        &self,
        state: &dyn ChainState,
        txs: Vec<Transaction>,
    ) -> LedgerResult<BatchOutcome> {
        let ctx = TxContext {
            state,
            fees: &self.config.fees,
            verifier: self.verifier,
            builder: self.config.builder,
        };

        let mut receipts = Vec::with_capacity(txs.len());
        let mut rejections = Vec::new();
        for (index, tx) in txs.into_iter().enumerate() {
            let tx_id = tx.id()?;
            match apply_transaction(tx, self.config.chain_id, &ctx) {
                Ok(receipt) => {
                    state.commit()?;
                    receipts.push(receipt);
                }
                Err((phase, error)) => {
                    state.checkout()?;
                    warn!(
                        index,
                        tx = %CryptoUtils::short_id(&tx_id),
                        %phase,
                        %error,
                        "transaction rejected"
                    );
                    rejections.push(Rejection {
                        index,
                        tx_id,
                        phase,
                        error: error.to_string(),
                    });
                }
            }
        }

        state.verify_global_invariants()?;
        let merkle_root = HashCompute::merkle_root(&receipts)?;
        info!(
            height = state.height(),
            accepted = receipts.len(),
            rejected = rejections.len(),
            root = %CryptoUtils::hash_to_hex(&merkle_root),
            "batch applied"
        );
        Ok(BatchOutcome {
            receipts,
            rejections,
            merkle_root,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldvm_state::{AccountData, MemoryState};
    use num_bigint::BigUint;

    fn setup() -> (ChainConfig, MemoryState, Keypair) {
        let config = ChainConfig {
            builder: Address([0xbb; 20]),
            ..ChainConfig::default()
        };
        let state = MemoryState::new(1, 1_000, config.fees.fee_sink);
        let key = Keypair::from_seed([1; 32]);
        let mut alice = AccountData::new(Address([1; 20]));
        alice.balance = BigUint::from(10_000_000_000u64);
        alice.threshold = 1;
        alice.keepers = vec![key.public_key()];
        state.insert(alice).unwrap();
        (config, state, key)
    }

    fn transfer(config: &ChainConfig, nonce: u64, key: &Keypair) -> Transaction {
        let mut tx = Transaction::new(TxType::Transfer, config.chain_id, nonce, Address([1; 20]))
            .with_gas(0, config.fees.gas_price)
            .with_to(Address([2; 20]))
            .with_amount(BigUint::from(1_000u64));
        tx.sign(key).unwrap();
        tx
    }

    #[test]
    fn test_empty_batch() {
        let (config, state, _) = setup();
        let outcome = BatchExecutor::new(&config, &Ed25519Verifier)
            .apply_batch(&state, Vec::new())
            .unwrap();
        assert!(outcome.receipts.is_empty());
        assert_eq!(outcome.merkle_root, [0u8; 32]);
    }

    #[test]
    fn test_rejection_does_not_stop_batch() {
        let (config, state, key) = setup();
        let txs = vec![
            transfer(&config, 0, &key),
            transfer(&config, 5, &key),
            transfer(&config, 1, &key),
        ];
        let outcome = BatchExecutor::new(&config, &Ed25519Verifier)
            .apply_batch(&state, txs)
            .unwrap();

        assert_eq!(outcome.receipts.len(), 2);
        assert_eq!(outcome.rejections.len(), 1);
        assert_eq!(outcome.rejections[0].index, 1);
        assert_eq!(outcome.rejections[0].phase, Phase::Verify);
        assert_eq!(
            outcome.merkle_root,
            HashCompute::merkle_root(&outcome.receipts).unwrap()
        );
        let bob = state.load_account(Address([2; 20])).unwrap();
        assert_eq!(bob.total_of(TokenSymbol::NATIVE), BigUint::from(2_000u64));
    }

    #[test]
    fn test_outcome_json() {
        let (config, state, key) = setup();
        let outcome = BatchExecutor::new(&config, &Ed25519Verifier)
            .apply_batch(&state, vec![transfer(&config, 0, &key)])
            .unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["receipts"][0]["amount"], "1000");
        assert_eq!(json["merkle_root"].as_str().unwrap().len(), 64);
    }
}
