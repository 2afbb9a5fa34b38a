//! Position Ledger Integration Tests
//!
//! Exercises the services end to end against the JSON file store:
//! 1. Buy/sell sequence -> weighted average, close, reopen
//! 2. Oversell rejection leaves the document untouched
//! 3. History over persisted trades
//! 4. Wallets and referrals sharing one user document
//! 5. Reading a legacy (v1) document
//! 6. Two store instances writing the same file
//!
//! Each test gets its own temp directory.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::TempDir;

use position_ledger::adapters::JsonFileStore;
use position_ledger::application::{
    LedgerError, LedgerOptions, PositionLedger, ReferralOptions, ReferralService, UserRepository, WalletService,
};
use position_ledger::domain::{
    NewWallet, PositionStatus, SettingsUpdate, Timeframe, TradeAction, TradeRequest, UserRecord, WalletSettings,
};
use position_ledger::ports::UserStore;

// ============================================================================
// Test Fixtures
// ============================================================================

struct Harness {
    _dir: TempDir,
    store: Arc<JsonFileStore>,
    ledger: PositionLedger,
    wallets: WalletService,
    referrals: ReferralService,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path()));
    let repo = UserRepository::new(store.clone());
    Harness {
        ledger: PositionLedger::new(repo.clone(), LedgerOptions { auto_create_users: true }),
        wallets: WalletService::new(repo.clone(), WalletSettings::default()),
        referrals: ReferralService::new(repo, ReferralOptions::default()),
        store,
        _dir: dir,
    }
}

fn trade(action: TradeAction, amount: Decimal, price: Decimal) -> TradeRequest {
    TradeRequest {
        token_address: "0xPEPE".to_string(),
        chain: "eth".to_string(),
        token_symbol: "PEPE".to_string(),
        token_name: "Pepe".to_string(),
        action,
        amount,
        price_per_token: price,
        total_value_usd: amount * price,
        transaction_hash: format!("0x{}{}", action, amount),
        wallet_address: "0xwallet".to_string(),
    }
}

// ============================================================================
// Positions
// ============================================================================

#[tokio::test]
async fn test_buy_sell_close_reopen() {
    let h = harness();

    h.ledger.record_transaction("u1", trade(TradeAction::Buy, dec!(10), dec!(100))).await.unwrap();
    let position = h
        .ledger
        .record_transaction("u1", trade(TradeAction::Buy, dec!(10), dec!(200)))
        .await
        .unwrap();
    assert_eq!(position.amount, dec!(20));
    assert_eq!(position.average_basis, dec!(150));

    let position = h
        .ledger
        .record_transaction("u1", trade(TradeAction::Sell, dec!(20), dec!(180)))
        .await
        .unwrap();
    assert!(position.amount.is_zero());
    assert!(position.closed_at.is_some());
    assert_eq!(h.ledger.list_positions("u1", PositionStatus::Closed).await.unwrap().len(), 1);

    let position = h
        .ledger
        .record_transaction("u1", trade(TradeAction::Buy, dec!(5), dec!(50)))
        .await
        .unwrap();
    assert_eq!(position.amount, dec!(5));
    assert_eq!(position.transactions.len(), 4);
    assert!(position.closed_at.is_none());

    // lookup is case-insensitive on both key parts
    let shown = h.ledger.get_position("u1", "0xpepe", "ETH").await.unwrap();
    assert_eq!(shown, position);
    assert!(h.store.path().exists());
}

#[tokio::test]
async fn test_oversell_leaves_document_untouched() {
    let h = harness();
    h.ledger.record_transaction("u1", trade(TradeAction::Buy, dec!(15), dec!(10))).await.unwrap();

    let err = h
        .ledger
        .record_transaction("u1", trade(TradeAction::Sell, dec!(20), dec!(12)))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    let body = err.to_body();
    assert_eq!(body["error"], "Insufficient balance");
    assert_eq!(body["availableAmount"], "15");
    assert_eq!(body["requestedAmount"], "20");

    let position = h.ledger.get_position("u1", "0xpepe", "eth").await.unwrap();
    assert_eq!(position.amount, dec!(15));
    assert_eq!(position.transactions.len(), 1);
}

#[tokio::test]
async fn test_sell_without_position_creates_nothing() {
    let h = harness();
    h.wallets
        .create_wallet(
            "u1",
            NewWallet {
                name: "main".into(),
                address: "0xmain".into(),
                private_key: "pk".into(),
                seed_phrase: "seed".into(),
                settings: SettingsUpdate::default(),
            },
        )
        .await
        .unwrap();

    let result = h.ledger.record_transaction("u1", trade(TradeAction::Sell, dec!(1), dec!(1))).await;
    assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
    assert!(h.ledger.list_positions("u1", PositionStatus::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_history_from_persisted_trades() {
    let h = harness();
    h.ledger.record_transaction("u1", trade(TradeAction::Buy, dec!(10), dec!(100))).await.unwrap();
    h.ledger.record_transaction("u1", trade(TradeAction::Sell, dec!(4), dec!(130))).await.unwrap();
    h.ledger.record_transaction("u1", trade(TradeAction::Sell, dec!(2), dec!(90))).await.unwrap();

    let metrics = h.ledger.compute_history("u1", Timeframe::Day, true).await.unwrap();
    assert_eq!(metrics.total_trades, 2);
    assert_eq!(metrics.winning_trades, 1);
    assert_eq!(metrics.losing_trades, 1);
    // 4 * 30 - 2 * 10
    assert_eq!(metrics.realized_pnl, dec!(100));
    assert_eq!(metrics.win_rate, dec!(50));
    assert_eq!(metrics.trades.map(|t| t.len()), Some(2));

    assert!(matches!(
        h.ledger.compute_history("ghost", Timeframe::All, false).await,
        Err(LedgerError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_state_survives_new_store_instance() {
    let h = harness();
    h.ledger.record_transaction("u1", trade(TradeAction::Buy, dec!(3), dec!(7))).await.unwrap();

    let reopened = PositionLedger::new(
        UserRepository::new(Arc::new(JsonFileStore::with_path(h.store.path()))),
        LedgerOptions::default(),
    );
    let positions = reopened.list_positions("u1", PositionStatus::Open).await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].average_basis, dec!(7));
}

// ============================================================================
// Wallets and referrals
// ============================================================================

#[tokio::test]
async fn test_wallets_and_referrals_share_user() {
    let h = harness();
    for user in ["alice", "bob"] {
        h.wallets
            .create_wallet(
                user,
                NewWallet {
                    name: "main".into(),
                    address: format!("0x{}", user),
                    private_key: "pk".into(),
                    seed_phrase: "seed".into(),
                    settings: SettingsUpdate { slippage: Some(dec!(2.5)), gas_limit: None },
                },
            )
            .await
            .unwrap();
    }

    let info = h.referrals.referral_info("alice").await.unwrap();
    let code = info.referral_code.clone().unwrap();
    h.referrals.process_referral(&code, "bob").await.unwrap();

    let info = h.referrals.referral_info("alice").await.unwrap();
    assert_eq!(info.referral_count, 1);
    assert_eq!(info.rewards_earned, dec!(10));
    assert_eq!(info.referral_code.as_deref(), Some(code.as_str()));

    // the referral commit kept the wallet data of both users
    let settings = h.wallets.get_settings("bob", "main").await.unwrap();
    assert_eq!(settings.slippage, dec!(2.5));
    assert_eq!(h.wallets.list_wallets("alice").await.unwrap().len(), 1);
}

// ============================================================================
// Legacy documents
// ============================================================================

#[tokio::test]
async fn test_reads_legacy_document() {
    let dir = TempDir::new().unwrap();
    let legacy = r#"{
        "users": {
            "42": {
                "telegram_id": "42",
                "evm_wallets": [],
                "trade_positions": [{
                    "token_address": "0xabc",
                    "chain": "ETH",
                    "amount": 5,
                    "average_mcap": 20,
                    "transactions": [{
                        "action": "buy",
                        "amount": 5,
                        "mcap": 20,
                        "total_value_usd": 100,
                        "transaction_hash": "0x1",
                        "wallet_address": "0xw",
                        "timestamp": "2024-01-01T00:00:00Z"
                    }],
                    "opened_at": "2024-01-01T00:00:00Z"
                }],
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z"
            }
        }
    }"#;
    std::fs::write(dir.path().join("users.json"), legacy).unwrap();

    let ledger = PositionLedger::new(
        UserRepository::new(Arc::new(JsonFileStore::new(dir.path()))),
        LedgerOptions::default(),
    );
    let position = ledger.get_position("42", "0xABC", "eth").await.unwrap();
    assert_eq!(position.amount, dec!(5));
    assert_eq!(position.average_basis, dec!(20));

    let position = ledger
        .record_transaction(
            "42",
            TradeRequest {
                token_address: "0xabc".into(),
                chain: "ETH".into(),
                ..trade(TradeAction::Sell, dec!(5), dec!(30))
            },
        )
        .await
        .unwrap();
    assert!(position.amount.is_zero());

    let rewritten = std::fs::read_to_string(dir.path().join("users.json")).unwrap();
    assert!(rewritten.contains("\"schema_version\": 2"));
    assert!(rewritten.contains("average_basis"));
}

// ============================================================================
// Shared file
// ============================================================================

#[tokio::test]
async fn test_second_writer_between_load_and_commit() {
    let dir = TempDir::new().unwrap();
    let first = JsonFileStore::new(dir.path());
    let second = JsonFileStore::new(dir.path());
    first.commit(vec![UserRecord::new("alice", chrono::Utc::now())]).await.unwrap();

    let mut stale = first.load("alice").await.unwrap().unwrap();
    let mut fresh = second.load("alice").await.unwrap().unwrap();
    fresh.referral.referral_code = Some("SECOND01".to_string());
    second.commit(vec![fresh]).await.unwrap();

    stale.referral.referral_code = Some("FIRST001".to_string());
    let err = first.commit(vec![stale]).await.unwrap_err();
    assert!(err.is_conflict());

    let stored = first.load("alice").await.unwrap().unwrap();
    assert_eq!(stored.referral.referral_code.as_deref(), Some("SECOND01"));
    assert_eq!(stored.version, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_ledgers_on_one_file_lose_no_trades() {
    let dir = TempDir::new().unwrap();
    let ledgers: Vec<PositionLedger> = (0..2)
        .map(|_| {
            let repo = UserRepository::new(Arc::new(JsonFileStore::new(dir.path()))).with_max_retries(50);
            PositionLedger::new(repo, LedgerOptions { auto_create_users: true })
        })
        .collect();

    let mut handles = Vec::new();
    for i in 0..10 {
        let ledger = ledgers[i % 2].clone();
        handles.push(tokio::spawn(async move {
            ledger.record_transaction("u1", trade(TradeAction::Buy, dec!(1), dec!(10))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let position = ledgers[0].get_position("u1", "0xpepe", "eth").await.unwrap();
    assert_eq!(position.amount, dec!(10));
    assert_eq!(position.transactions.len(), 10);
}
