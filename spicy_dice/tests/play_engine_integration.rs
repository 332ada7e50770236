//! Integration tests for the play engine against the in-memory ledger.
//!
//! Covers settlement, validation ordering, the single-active-session rule
//! under concurrent bets, and rollback when a unit of work fails midway.

use async_trait::async_trait;
use rust_decimal::Decimal;
use spicy_dice::db::{LedgerResult, LedgerStore, MemoryLedger, UnitOfWork};
use spicy_dice::game::errors::codes;
use spicy_dice::game::{BetType, GameConfig, GameError, GameSession, PlayEngine, PlayRequest};
use spicy_dice::{DiceRoller, LoadedDice, PlayerId};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn setup(balance: i64, faces: Vec<u8>) -> (PlayEngine, MemoryLedger) {
    let ledger = MemoryLedger::new();
    ledger.insert_player(1, Decimal::from(balance)).unwrap();
    let engine = PlayEngine::new(
        Arc::new(ledger.clone()),
        Arc::new(LoadedDice::sequence(faces)),
        GameConfig::default(),
    )
    .unwrap();
    (engine, ledger)
}

fn play(client_id: PlayerId, amount: i64, bet_type: BetType) -> PlayRequest {
    PlayRequest {
        client_id,
        bet_amount: Decimal::from(amount),
        bet_type,
    }
}

/// Store that counts every call and owns no data
#[derive(Default)]
struct CountingStore {
    calls: AtomicUsize,
}

#[async_trait]
impl LedgerStore for CountingStore {
    async fn get_balance(&self, player_id: PlayerId) -> LedgerResult<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(spicy_dice::LedgerError::PlayerNotFound(player_id))
    }

    async fn get_active_session(&self, _player_id: PlayerId) -> LedgerResult<Option<GameSession>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    async fn close_active_session(&self, _player_id: PlayerId) -> LedgerResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    async fn begin(&self) -> LedgerResult<Box<dyn UnitOfWork>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(spicy_dice::LedgerError::Storage("no units".to_string()))
    }

    async fn health_check(&self) -> LedgerResult<()> {
        Ok(())
    }
}

/// Dice that always fail
struct BrokenDice;

impl DiceRoller for BrokenDice {
    fn roll(&self) -> spicy_dice::dice::DiceResult<u8> {
        Err(spicy_dice::DiceError::Entropy("entropy exhausted".to_string()))
    }

    fn sides(&self) -> u8 {
        6
    }
}

#[tokio::test]
async fn test_even_bet_on_two_wins() {
    let (engine, ledger) = setup(200, vec![2]);

    let outcome = engine.resolve_bet(play(1, 100, BetType::Even)).await.unwrap();

    assert_eq!(outcome.dice_result, 2);
    assert!(outcome.won);
    assert_eq!(outcome.balance, Decimal::from(300));
    assert_eq!(outcome.bet_amount, Decimal::from(100));

    let sessions = ledger.sessions(1).unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].active);
    assert!(sessions[0].won);
    assert_eq!(sessions[0].dice_result, 2);
    assert_eq!(sessions[0].session_end, None);
}

#[tokio::test]
async fn test_bet_above_balance_is_rejected_without_mutation() {
    let (engine, ledger) = setup(200, vec![2]);

    let err = engine.resolve_bet(play(1, 300, BetType::Even)).await.unwrap_err();

    assert_eq!(err.code(), codes::INSUFFICIENT_FUNDS);
    assert_eq!(ledger.get_balance(1).await.unwrap(), Decimal::from(200));
    assert!(ledger.sessions(1).unwrap().is_empty());
}

#[tokio::test]
async fn test_non_positive_bet_never_touches_store() {
    let store = Arc::new(CountingStore::default());
    let engine = PlayEngine::new(
        store.clone(),
        Arc::new(LoadedDice::always(2)),
        GameConfig::default(),
    )
    .unwrap();

    for amount in [0, -5] {
        let err = engine.resolve_bet(play(1, amount, BetType::Odd)).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_BET_AMOUNT);
    }
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sub_cent_bet_is_rejected() {
    let (engine, ledger) = setup(200, vec![3]);
    let request: PlayRequest = serde_json::from_value(serde_json::json!({
        "client_id": 1,
        "bet_amount": 10.005,
        "bet_type": "even"
    }))
    .unwrap();

    let err = engine.resolve_bet(request).await.unwrap_err();

    assert_eq!(err.code(), codes::INVALID_BET_AMOUNT);
    assert_eq!(ledger.get_balance(1).await.unwrap(), Decimal::from(200));
    assert!(ledger.sessions(1).unwrap().is_empty());

    // Rejected before the balance is even read
    let store = Arc::new(CountingStore::default());
    let engine = PlayEngine::new(
        store.clone(),
        Arc::new(LoadedDice::always(3)),
        GameConfig::default(),
    )
    .unwrap();
    let err = engine
        .resolve_bet(PlayRequest {
            client_id: 1,
            bet_amount: Decimal::new(1_001, 3),
            bet_type: BetType::Odd,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), codes::INVALID_BET_AMOUNT);
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cent_precision_bet_settles_exactly() {
    let (engine, ledger) = setup(200, vec![3]);

    let outcome = engine
        .resolve_bet(PlayRequest {
            client_id: 1,
            bet_amount: Decimal::new(1_001, 2),
            bet_type: BetType::Even,
        })
        .await
        .unwrap();

    assert_eq!(outcome.balance, Decimal::new(18_999, 2));
    assert_eq!(ledger.sessions(1).unwrap()[0].bet_amount, Decimal::new(1_001, 2));
}

#[tokio::test]
async fn test_insufficient_funds_checked_before_limits() {
    // 500 is both above max_bet and above the balance
    let (engine, _) = setup(50, vec![2]);
    let err = engine.resolve_bet(play(1, 500, BetType::Even)).await.unwrap_err();
    assert_eq!(err.code(), codes::INSUFFICIENT_FUNDS);
}

#[tokio::test]
async fn test_bet_outside_limits() {
    let (engine, ledger) = setup(1_000, vec![2]);

    let err = engine.resolve_bet(play(1, 9, BetType::Even)).await.unwrap_err();
    assert_eq!(err.code(), codes::INVALID_BET_AMOUNT);
    assert!(err.to_string().contains("minimum bet amount is 10"));

    let err = engine.resolve_bet(play(1, 150, BetType::Even)).await.unwrap_err();
    assert_eq!(err.code(), codes::INVALID_BET_AMOUNT);
    assert!(err.to_string().contains("maximum bet amount is 100"));

    assert_eq!(ledger.get_balance(1).await.unwrap(), Decimal::from(1_000));
}

#[tokio::test]
async fn test_limit_boundaries_are_inclusive() {
    let (engine, _) = setup(1_000, vec![1, 1]);

    engine.resolve_bet(play(1, 10, BetType::Even)).await.unwrap();
    engine.end_session(1).await.unwrap();
    engine.resolve_bet(play(1, 100, BetType::Even)).await.unwrap();
}

#[tokio::test]
async fn test_bet_of_entire_balance_can_reach_zero() {
    let (engine, ledger) = setup(100, vec![3]);

    let outcome = engine.resolve_bet(play(1, 100, BetType::Even)).await.unwrap();

    assert!(!outcome.won);
    assert_eq!(outcome.balance, Decimal::ZERO);
    assert_eq!(ledger.get_balance(1).await.unwrap(), Decimal::ZERO);
}

#[tokio::test]
async fn test_unknown_player() {
    let (engine, _) = setup(100, vec![2]);

    let err = engine.resolve_bet(play(42, 20, BetType::Even)).await.unwrap_err();
    assert!(matches!(err, GameError::UserNotFound(42)));

    let err = engine.get_balance(42).await.unwrap_err();
    assert_eq!(err.code(), codes::USER_NOT_FOUND);
}

#[tokio::test]
async fn test_concurrent_bets_open_exactly_one_session() {
    let (engine, ledger) = setup(1_000, vec![2, 4, 6]);
    let engine = Arc::new(engine);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.resolve_bet(play(1, 50, BetType::Even)).await })
        })
        .collect();

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(GameError::ActiveSession(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(ledger.active_session_count(1).unwrap(), 1);
    assert_eq!(ledger.get_balance(1).await.unwrap(), Decimal::from(1_050));
}

#[tokio::test]
async fn test_failed_adjustment_rolls_back_session() {
    let (engine, ledger) = setup(200, vec![2]);
    ledger.fail_next_adjust();

    let err = engine.resolve_bet(play(1, 50, BetType::Even)).await.unwrap_err();

    assert_eq!(err.code(), codes::INTERNAL);
    assert!(err.is_retryable());
    assert!(ledger.sessions(1).unwrap().is_empty());
    assert_eq!(ledger.get_balance(1).await.unwrap(), Decimal::from(200));

    // The player is not left locked or half-settled
    let outcome = engine.resolve_bet(play(1, 50, BetType::Even)).await.unwrap();
    assert_eq!(outcome.balance, Decimal::from(250));
}

#[tokio::test]
async fn test_dice_failure_commits_nothing() {
    let ledger = MemoryLedger::new();
    ledger.insert_player(1, Decimal::from(200)).unwrap();
    let engine = PlayEngine::new(
        Arc::new(ledger.clone()),
        Arc::new(BrokenDice),
        GameConfig::default(),
    )
    .unwrap();

    let err = engine.resolve_bet(play(1, 50, BetType::Even)).await.unwrap_err();

    assert_eq!(err.code(), codes::DICE_ROLL);
    assert!(ledger.sessions(1).unwrap().is_empty());
    assert_eq!(ledger.get_balance(1).await.unwrap(), Decimal::from(200));
}

#[tokio::test]
async fn test_end_session_lifecycle() {
    let (engine, ledger) = setup(200, vec![5, 2]);

    let err = engine.end_session(1).await.unwrap_err();
    assert_eq!(err.code(), codes::ACTIVE_SESSION);
    assert!(err.to_string().contains("Client ID 1 does not have an active session."));

    let first = engine.resolve_bet(play(1, 20, BetType::Odd)).await.unwrap();
    assert!(first.won);

    let ended = engine.end_session(1).await.unwrap();
    assert_eq!(ended.client_id, 1);

    let sessions = ledger.sessions(1).unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(!sessions[0].active);
    assert!(sessions[0].session_end.is_some());

    // Ending twice reports the missing session again
    let err = engine.end_session(1).await.unwrap_err();
    assert_eq!(err.code(), codes::ACTIVE_SESSION);

    let second = engine.resolve_bet(play(1, 20, BetType::Even)).await.unwrap();
    assert_eq!(second.balance, Decimal::from(240));
    assert_eq!(ledger.sessions(1).unwrap().len(), 2);
}

#[tokio::test]
async fn test_balance_read_has_no_side_effects() {
    let (engine, ledger) = setup(321, vec![2]);

    let wallet = engine.get_balance(1).await.unwrap();
    assert_eq!(wallet.client_id, 1);
    assert_eq!(wallet.balance, Decimal::from(321));

    let again = engine.get_balance(1).await.unwrap();
    assert_eq!(again, wallet);
    assert!(ledger.sessions(1).unwrap().is_empty());
}

#[tokio::test]
async fn test_players_are_independent() {
    let (engine, ledger) = setup(200, vec![2]);
    ledger.insert_player(2, Decimal::from(200)).unwrap();

    engine.resolve_bet(play(1, 30, BetType::Even)).await.unwrap();
    engine.resolve_bet(play(2, 30, BetType::Odd)).await.unwrap();

    assert_eq!(ledger.get_balance(1).await.unwrap(), Decimal::from(230));
    assert_eq!(ledger.get_balance(2).await.unwrap(), Decimal::from(170));
    assert_eq!(ledger.active_session_count(1).unwrap(), 1);
    assert_eq!(ledger.active_session_count(2).unwrap(), 1);
}
