use super::{forbid_data, require_amount, require_to, TxHandler};
use crate::config::FeeConfig;
use crate::types::Transaction;
use ldvm_common::prelude::*;

/// Move native or token amounts between accounts
pub struct TransferHandler;

impl TxHandler for TransferHandler {
    fn syntactic(&self, tx: &Transaction, _fees: &FeeConfig) -> LedgerResult<()> {
        require_to(tx)?;
        require_amount(tx)?;
        forbid_data(tx)
    }
}
