//! Chain state accessor and its in-memory implementation

use crate::account::{Account, AccountData};
use crate::kind::AccountKind;
use ldvm_common::prelude::*;
use num_traits::Zero;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything the transaction pipeline needs from the chain.
///
/// Loaded accounts are shared handles: mutations through them are visible
/// to every later load until `checkout` discards them.
pub trait ChainState: Send + Sync {
    /// Current block height
    fn height(&self) -> BlockHeight;

    /// Current block timestamp
    fn timestamp(&self) -> Timestamp;

    /// Load (or create) the account at `id`, stamped with the block timestamp
    fn load_account(&self, id: Address) -> LedgerResult<Arc<Account>>;

    /// Attach the lending ledger of `account`
    fn load_ledger(&self, account: &Account) -> LedgerResult<()>;

    /// The account collecting transaction fees
    fn fee_sink(&self) -> LedgerResult<Arc<Account>>;

    /// The account collecting tips for `builder`
    fn reward_account(&self, builder: Address) -> LedgerResult<Arc<Account>> {
        self.load_account(builder)
    }

    /// Make every mutation since the last commit permanent
    fn commit(&self) -> LedgerResult<()>;

    /// Discard every mutation since the last commit
    fn checkout(&self) -> LedgerResult<()>;

    /// Check chain-wide invariants over every account
    fn verify_global_invariants(&self) -> LedgerResult<()>;
}

#[derive(Clone)]
struct CommittedRecord {
    data: Vec<u8>,
    ledger: Option<Vec<u8>>,
}

/// In-memory chain state with commit/checkout snapshots
pub struct MemoryState {
    height: RwLock<BlockHeight>,
    timestamp: RwLock<Timestamp>,
    fee_sink: Address,
    accounts: RwLock<HashMap<Address, Arc<Account>>>,
    committed: RwLock<HashMap<Address, CommittedRecord>>,
}

impl MemoryState {
    pub fn new(height: BlockHeight, timestamp: Timestamp, fee_sink: Address) -> Self {
        Self {
            height: RwLock::new(height),
            timestamp: RwLock::new(timestamp),
            fee_sink,
            accounts: RwLock::new(HashMap::new()),
            committed: RwLock::new(HashMap::new()),
        }
    }

    /// Advance to a new block
    pub fn set_block(&self, height: BlockHeight, timestamp: Timestamp) {
        *self.height.write() = height;
        *self.timestamp.write() = timestamp;
    }

    /// Seed an account record and commit it
    pub fn insert(&self, data: AccountData) -> LedgerResult<()> {
        let id = data.id;
        let account = Arc::new(Account::from_data(data));
        let record = CommittedRecord {
            data: account.marshal()?,
            ledger: None,
        };
        self.accounts.write().insert(id, account);
        self.committed.write().insert(id, record);
        Ok(())
    }

    /// Records of every known account, ordered by address
    pub fn accounts(&self) -> Vec<AccountData> {
        let mut all: Vec<AccountData> = self.accounts.read().values().map(|a| a.data()).collect();
        all.sort_by_key(|d| d.id);
        all
    }
}

impl ChainState for MemoryState {
    fn height(&self) -> BlockHeight {
        *self.height.read()
    }

    fn timestamp(&self) -> Timestamp {
        *self.timestamp.read()
    }

    fn load_account(&self, id: Address) -> LedgerResult<Arc<Account>> {
        let account = self
            .accounts
            .write()
            .entry(id)
            .or_insert_with(|| Arc::new(Account::new(id)))
            .clone();
        account.touch(self.timestamp());
        Ok(account)
    }

    fn load_ledger(&self, account: &Account) -> LedgerResult<()> {
        account.init_ledger(None);
        Ok(())
    }

    fn fee_sink(&self) -> LedgerResult<Arc<Account>> {
        self.load_account(self.fee_sink)
    }

    fn commit(&self) -> LedgerResult<()> {
        let accounts = self.accounts.read();
        let mut committed = self.committed.write();
        let mut changed = 0usize;
        for (id, account) in accounts.iter() {
            let dirty = match committed.get(id) {
                Some(rec) => {
                    account.account_changed(&rec.data)?
                        || account.ledger_changed(rec.ledger.as_deref())?
                }
                None => true,
            };
            if dirty {
                committed.insert(
                    *id,
                    CommittedRecord {
                        data: account.marshal()?,
                        ledger: account.marshal_ledger()?,
                    },
                );
                changed += 1;
            }
        }
        debug!(changed, "state committed");
        Ok(())
    }

    fn checkout(&self) -> LedgerResult<()> {
        let mut accounts = self.accounts.write();
        let committed = self.committed.read();
        accounts.retain(|id, _| committed.contains_key(id));
        for (id, account) in accounts.iter() {
            if let Some(rec) = committed.get(id) {
                account.restore(&rec.data, rec.ledger.as_deref())?;
            }
        }
        debug!("state checked out");
        Ok(())
    }

    fn verify_global_invariants(&self) -> LedgerResult<()> {
        for account in self.accounts.read().values() {
            let data = account.data();
            if data.kind != AccountKind::Native && data.balance < data.pledge {
                return Err(LedgerError::internal(format!(
                    "{} balance {} below pledge {}",
                    data.id, data.balance, data.pledge
                )));
            }
            if let AccountKind::TokenIssuer { max_total_supply } = &data.kind {
                let unissued = TokenSymbol::try_from(data.id)
                    .map(|own| account.total_of(own))
                    .unwrap_or_default();
                if max_total_supply.is_zero() || unissued > *max_total_supply {
                    return Err(LedgerError::internal(format!(
                        "{} supply out of range, max {}, unissued {}",
                        data.id, max_total_supply, unissued
                    )));
                }
            }
            if let Some(cfg) = &data.lending {
                cfg.validate()
                    .with_context(|| format!("{} lending config", data.id))?;
            }
        }
        info!(height = self.height(), "global invariants hold");
        Ok(())
    }
}
