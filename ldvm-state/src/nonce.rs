//! Table of one-time nonces grouped by expiration time

use ldvm_common::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One-time nonces keyed by their expiration timestamp.
///
/// A group is live while `expire >= now`. At most
/// [`limits::MAX_NONCE_GROUPS`] live groups are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NonceTable(BTreeMap<u64, BTreeSet<u64>>);

impl NonceTable {
    /// Number of groups, live or not
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Nonces of one group
    pub fn group(&self, expire: u64) -> Option<&BTreeSet<u64>> {
        self.0.get(&expire)
    }

    /// Whether `(expire, nonce)` can be consumed at `now`
    pub fn contains(&self, now: Timestamp, expire: u64, nonce: u64) -> bool {
        expire >= now && self.0.get(&expire).is_some_and(|g| g.contains(&nonce))
    }

    /// Drop every group that expired before `now`
    pub fn purge(&mut self, now: Timestamp) {
        self.0.retain(|&expire, _| expire >= now);
    }

    /// Insert `nonces` under `expire`, which must not be in the past. Stale
    /// groups are purged first. Nothing changes when the insert is rejected.
    pub fn insert(&mut self, now: Timestamp, expire: u64, nonces: &[u64]) -> LedgerResult<()> {
        if expire < now {
            return Err(LedgerError::syntactic(format!(
                "nonce group expired at {}, now {}",
                expire, now
            )));
        }
        let existing = self.0.get(&expire);

        let mut fresh = BTreeSet::new();
        for &nonce in nonces {
            let taken = existing.is_some_and(|g| g.contains(&nonce));
            if taken || !fresh.insert(nonce) {
                return Err(LedgerError::NonceExists { expire, nonce });
            }
        }

        if existing.is_none() {
            let live = self.0.range(now..).count();
            if live >= limits::MAX_NONCE_GROUPS {
                return Err(LedgerError::TooManyNonceGroups {
                    max: limits::MAX_NONCE_GROUPS,
                });
            }
        }

        self.purge(now);
        self.0.entry(expire).or_default().extend(fresh);
        Ok(())
    }

    /// Check that `(expire, nonce)` is live and present
    pub fn ensure(&self, now: Timestamp, expire: u64, nonce: u64) -> LedgerResult<()> {
        if !self.contains(now, expire, nonce) {
            return Err(LedgerError::NonceNotFound { expire, nonce });
        }
        Ok(())
    }

    /// Consume `(expire, nonce)`, dropping the group once it is empty
    pub fn remove(&mut self, now: Timestamp, expire: u64, nonce: u64) -> LedgerResult<()> {
        self.ensure(now, expire, nonce)?;
        if let Some(group) = self.0.get_mut(&expire) {
            group.remove(&nonce);
            if group.is_empty() {
                self.0.remove(&expire);
            }
        }
        Ok(())
    }
}
