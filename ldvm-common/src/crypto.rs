//! Hashing utilities and the signature capability used for authorization

use crate::types::{Hash, PublicKey, Signature};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

/// Cryptographic constants
pub const HASH_SIZE: usize = 32;
pub const PUBKEY_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;

/// Central cryptographic utilities
pub struct CryptoUtils;

impl CryptoUtils {
    /// Compute SHA-256 hash of data
    pub fn hash(data: &[u8]) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().into()
    }

    /// Compute hash of multiple data chunks
    pub fn hash_multiple(chunks: &[&[u8]]) -> Hash {
        let mut hasher = Sha256::new();
        for chunk in chunks {
            hasher.update(chunk);
        }
        hasher.finalize().into()
    }

    /// Convert hash to hex string
    pub fn hash_to_hex(hash: &Hash) -> String {
        hex::encode(hash)
    }

    /// Short form of a hash used to identify transactions in logs and errors
    pub fn short_id(hash: &Hash) -> String {
        hex::encode(&hash[..8])
    }
}

/// Merkle tree over leaf hashes, duplicating the last node of odd levels
pub struct MerkleTree {
    nodes: Vec<Hash>,
}

impl MerkleTree {
    /// Build merkle tree from leaf hashes
    pub fn new(leaves: &[Hash]) -> Self {
        if leaves.is_empty() {
            return Self {
                nodes: vec![[0u8; HASH_SIZE]],
            };
        }

        let mut nodes = leaves.to_vec();
        let mut level_start = 0;
        let mut level_len = leaves.len();

        while level_len > 1 {
            let level: Vec<Hash> = nodes[level_start..level_start + level_len].to_vec();
            level_start += level_len;
            for pair in level.chunks(2) {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                nodes.push(CryptoUtils::hash_multiple(&[&left, &right]));
            }
            level_len = level.len().div_ceil(2);
        }

        Self { nodes }
    }

    /// Get root hash
    pub fn root(&self) -> Hash {
        self.nodes.last().copied().unwrap_or([0u8; HASH_SIZE])
    }
}

/// Signature capability consumed by the authorization engine.
///
/// Implementations decide whether one of `signatures` was produced by `key`
/// over `digest`. Threshold checks are derived from that single primitive.
pub trait SignatureVerifier: Send + Sync {
    /// Whether any of `signatures` is a valid signature of `digest` by `key`
    fn verify(&self, digest: &Hash, signatures: &[Signature], key: &PublicKey) -> bool;

    /// Indices of the keys in `keys` that signed `digest`
    fn signers(&self, digest: &Hash, signatures: &[Signature], keys: &[PublicKey]) -> Vec<usize> {
        keys.iter()
            .enumerate()
            .filter(|(_, key)| self.verify(digest, signatures, key))
            .map(|(i, _)| i)
            .collect()
    }

    /// Whether at least `threshold` distinct keys signed. An empty key list
    /// or a zero threshold never passes.
    fn verify_threshold(
        &self,
        digest: &Hash,
        signatures: &[Signature],
        keys: &[PublicKey],
        threshold: u16,
    ) -> bool {
        if keys.is_empty() || threshold == 0 {
            return false;
        }
        self.signers(digest, signatures, keys).len() >= threshold as usize
    }
}

/// Ed25519 signature verification backed by `ed25519-dalek`
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, digest: &Hash, signatures: &[Signature], key: &PublicKey) -> bool {
        let Ok(vk) = VerifyingKey::from_bytes(&key.0) else {
            return false;
        };
        signatures.iter().any(|sig| {
            let sig = ed25519_dalek::Signature::from_bytes(&sig.0);
            vk.verify(digest, &sig).is_ok()
        })
    }
}

/// Keypair helper for signing transaction digests
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Deterministic keypair from a 32-byte seed
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    /// The public key of this keypair
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }

    /// Sign a digest
    pub fn sign(&self, digest: &Hash) -> Signature {
        Signature(self.signing.sign(digest).to_bytes())
    }
}
