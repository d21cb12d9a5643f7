use ldvm_core::prelude::*;
use ldvm_state::{AccountData, ChainState, LendingConfig, MemoryState};
use ldvm_transaction::{BorrowTerms, NonceTableInput, Phase, Transaction, TxData};
use num_bigint::BigUint;

const UNIT: u64 = 1_000_000_000;
const DAY: u64 = 86_400;
const START: u64 = 1_700_000_000;

struct Chain {
    config: ChainConfig,
    state: MemoryState,
}

impl Chain {
    fn new() -> Self {
        let config = ChainConfig {
            builder: Address([0xbb; 20]),
            ..ChainConfig::default()
        };
        let state = MemoryState::new(1, START, config.fees.fee_sink);
        Self { config, state }
    }

    fn keyed(&self, seed: u8, native: u64, extra: &[&Keypair]) -> Keypair {
        let key = Keypair::from_seed([seed; 32]);
        let mut data = AccountData::new(Address([seed; 20]));
        data.balance = BigUint::from(native);
        data.threshold = 1;
        data.keepers = vec![key.public_key()];
        data.keepers.extend(extra.iter().map(|k| k.public_key()));
        self.state.insert(data).unwrap();
        key
    }

    fn run(&self, txs: Vec<Transaction>) -> BatchOutcome {
        BatchExecutor::new(&self.config, &Ed25519Verifier)
            .apply_batch(&self.state, txs)
            .unwrap()
    }

    fn tx(&self, tx_type: TxType, nonce: u64, from: u8) -> Transaction {
        Transaction::new(tx_type, self.config.chain_id, nonce, Address([from; 20]))
            .with_gas(0, self.config.fees.gas_price)
    }

    fn native(&self, seed: u8) -> BigUint {
        self.state
            .load_account(Address([seed; 20]))
            .unwrap()
            .total_of(TokenSymbol::NATIVE)
    }
}

fn signed(mut tx: Transaction, key: &Keypair) -> Transaction {
    tx.sign(key).unwrap();
    tx
}

fn open_lending(chain: &Chain, key: &Keypair, max: u64) -> Vec<Transaction> {
    vec![
        signed(
            chain.tx(TxType::OpenLending, 0, 1).with_data(TxData::Lending(LendingConfig {
                token: TokenSymbol::NATIVE,
                daily_interest: 10_000,
                overdue_interest: 10_000,
                min_amount: BigUint::from(UNIT),
                max_amount: BigUint::from(max),
            })),
            key,
        ),
        signed(
            chain.tx(TxType::AddNonceTable, 1, 1).with_data(TxData::NonceTable(NonceTableInput {
                expire: START + DAY,
                nonces: vec![1, 2],
            })),
            key,
        ),
    ]
}

fn borrow(chain: &Chain, borrower: &Keypair, lender: &Keypair, nonce: u64, amount: u64) -> Transaction {
    let mut tx = chain
        .tx(TxType::Borrow, nonce, 2)
        .with_to(Address([1; 20]))
        .with_amount(BigUint::from(amount))
        .with_data(TxData::Borrow(BorrowTerms {
            nonce: 1,
            expire: START + DAY,
            due_time: 0,
        }));
    tx.sign(borrower).unwrap();
    tx.sign_ex(lender).unwrap();
    tx
}

#[test]
fn one_percent_daily_interest_end_to_end() {
    let chain = Chain::new();
    let lender = chain.keyed(1, 100 * UNIT, &[]);
    let borrower = chain.keyed(2, 10 * UNIT, &[]);

    let outcome = chain.run(open_lending(&chain, &lender, 10 * UNIT));
    assert!(outcome.rejections.is_empty(), "{:?}", outcome.rejections);
    let lender_funds = chain.native(1);

    let outcome = chain.run(vec![borrow(&chain, &borrower, &lender, 0, UNIT)]);
    assert!(outcome.rejections.is_empty(), "{:?}", outcome.rejections);
    assert_eq!(chain.native(1), &lender_funds - UNIT);

    chain.state.set_block(2, START + DAY);
    let repay = signed(
        chain
            .tx(TxType::Repay, 1, 2)
            .with_to(Address([1; 20]))
            .with_amount(BigUint::from(2 * UNIT)),
        &borrower,
    );
    let outcome = chain.run(vec![repay]);
    assert!(outcome.rejections.is_empty(), "{:?}", outcome.rejections);

    let receipt = &outcome.receipts[0];
    assert_eq!(receipt.amount, BigUint::from(1_010_000_000u64));
    assert_eq!(receipt.height, 2);
    assert_eq!(chain.native(1), &lender_funds + BigUint::from(10_000_000u64));
}

#[test]
fn accept_failure_is_rolled_back() {
    let chain = Chain::new();
    let lender = chain.keyed(1, 100 * UNIT, &[]);
    let borrower = chain.keyed(2, 10 * UNIT, &[]);
    chain.run(open_lending(&chain, &lender, 5 * UNIT));
    let before = chain.state.accounts();

    // above max_amount, which only the accept step checks
    let outcome = chain.run(vec![borrow(&chain, &borrower, &lender, 0, 6 * UNIT)]);
    assert_eq!(outcome.receipts.len(), 0);
    assert_eq!(outcome.rejections[0].phase, Phase::Accept);
    assert!(outcome.rejections[0].error.contains("exceeds max"));

    let after: Vec<AccountData> = chain
        .state
        .accounts()
        .into_iter()
        .filter(|a| before.iter().any(|b| b.id == a.id))
        .collect();
    assert_eq!(after, before);
    assert_eq!(chain.state.load_account(Address([2; 20])).unwrap().nonce(), 0);

    // the nonce is still live, so a smaller draw goes through
    let outcome = chain.run(vec![borrow(&chain, &borrower, &lender, 0, 5 * UNIT)]);
    assert!(outcome.rejections.is_empty(), "{:?}", outcome.rejections);
}

#[test]
fn any_keeper_meets_threshold_one_of_two() {
    let chain = Chain::new();
    let second = Keypair::from_seed([42; 32]);
    chain.keyed(1, 10 * UNIT, &[&second]);

    let tx = chain
        .tx(TxType::Transfer, 0, 1)
        .with_to(Address([3; 20]))
        .with_amount(BigUint::from(UNIT));
    let outcome = chain.run(vec![signed(tx, &second)]);
    assert!(outcome.rejections.is_empty(), "{:?}", outcome.rejections);
    assert_eq!(chain.native(3), BigUint::from(UNIT));

    let stranger = Keypair::from_seed([43; 32]);
    let tx = chain
        .tx(TxType::Transfer, 1, 1)
        .with_to(Address([3; 20]))
        .with_amount(BigUint::from(UNIT));
    let outcome = chain.run(vec![signed(tx, &stranger)]);
    assert_eq!(outcome.rejections[0].phase, Phase::Verify);
}

#[test]
fn genesis_and_batch_from_json() {
    let chain = Chain::new();
    let key = Keypair::from_seed([1; 32]);
    let genesis = format!(
        r#"[{{"id": "{}", "balance": "5000000000", "threshold": 1, "keepers": ["{}"]}}]"#,
        Address([1; 20]),
        key.public_key()
    );
    let accounts: Vec<AccountData> = serde_json::from_str(&genesis).unwrap();
    for account in accounts {
        chain.state.insert(account).unwrap();
    }

    let tx = signed(
        chain
            .tx(TxType::Transfer, 0, 1)
            .with_to(Address([2; 20]))
            .with_amount(BigUint::from(UNIT)),
        &key,
    );
    let batch = serde_json::to_string(&vec![tx]).unwrap();
    let txs: Vec<Transaction> = serde_json::from_str(&batch).unwrap();

    let outcome = chain.run(txs);
    assert_eq!(outcome.receipts.len(), 1);
    assert_eq!(chain.native(2), BigUint::from(UNIT));
}
