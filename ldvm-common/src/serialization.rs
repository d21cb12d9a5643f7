//! Canonical encoding and content hashing for persisted ledger records

use crate::{
    crypto::{CryptoUtils, MerkleTree},
    error::LedgerResult,
    types::Hash,
};
use serde::{de::DeserializeOwned, Serialize};

/// Canonical binary encoding shared by every persisted record.
///
/// The encoding is `bincode` 1.x with its default configuration. Ordered
/// collections are required for the encoding to be deterministic.
pub trait LedgerSerialize: Serialize + DeserializeOwned {
    /// Serialize to the canonical encoding
    fn encode(&self) -> LedgerResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from the canonical encoding
    fn decode(bytes: &[u8]) -> LedgerResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// SHA-256 over the canonical encoding
    fn content_hash(&self) -> LedgerResult<Hash> {
        Ok(CryptoUtils::hash(&self.encode()?))
    }
}

/// Hash computation utilities
pub struct HashCompute;

impl HashCompute {
    /// Compute the Merkle root over the content hashes of a list of records
    pub fn merkle_root<T: LedgerSerialize>(items: &[T]) -> LedgerResult<Hash> {
        let leaves = items
            .iter()
            .map(LedgerSerialize::content_hash)
            .collect::<LedgerResult<Vec<_>>>()?;
        Ok(MerkleTree::new(&leaves).root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct TestRecord {
        id: u64,
        entries: BTreeMap<u64, String>,
    }

    impl LedgerSerialize for TestRecord {}

    fn record(id: u64) -> TestRecord {
        let mut entries = BTreeMap::new();
        entries.insert(2, "b".to_string());
        entries.insert(1, "a".to_string());
        TestRecord { id, entries }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(TestRecord::decode(&[1, 2, 3]).is_err());
        let bytes = record(7).encode().unwrap();
        assert_eq!(TestRecord::decode(&bytes).unwrap(), record(7));
    }

    #[test]
    fn test_content_hash_is_deterministic() {
        assert_eq!(
            record(1).content_hash().unwrap(),
            record(1).content_hash().unwrap()
        );
        assert_ne!(
            record(1).content_hash().unwrap(),
            record(2).content_hash().unwrap()
        );
    }

    #[test]
    fn test_merkle_root() {
        let items = vec![record(1), record(2), record(3)];
        let root = HashCompute::merkle_root(&items).unwrap();
        assert_ne!(root, [0u8; 32]);
        assert_eq!(HashCompute::merkle_root::<TestRecord>(&[]).unwrap(), [0u8; 32]);
    }
}
