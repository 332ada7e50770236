/// Property-based tests for ledger balance invariants
///
/// Random sequences of bets, rolls and session closes are replayed against
/// the play engine backed by the in-memory ledger. Whatever the outcome of
/// each request, the balance must never go negative and must always equal
/// the starting balance plus the net of the bets that were accepted.
use proptest::prelude::*;
use rust_decimal::Decimal;
use spicy_dice::db::{LedgerStore, MemoryLedger};
use spicy_dice::game::{BetType, GameConfig, GameError, PlayEngine, PlayRequest};
use spicy_dice::{DieFace, LoadedDice};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Step {
    Bet { cents: i64, bet_type: BetType },
    End,
}

fn bet_type_strategy() -> impl Strategy<Value = BetType> {
    prop_oneof![Just(BetType::Even), Just(BetType::Odd)]
}

// Bets in cents, including non-positive and out-of-range amounts
fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (-500i64..15_000, bet_type_strategy())
            .prop_map(|(cents, bet_type)| Step::Bet { cents, bet_type }),
        2 => Just(Step::End),
    ]
}

fn run_steps(
    start_cents: i64,
    faces: Vec<DieFace>,
    steps: Vec<Step>,
) -> Result<(Decimal, Decimal, usize), TestCaseError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(e.to_string()))?;

    runtime.block_on(async move {
        let ledger = MemoryLedger::new();
        let start = Decimal::new(start_cents, 2);
        ledger.insert_player(1, start).unwrap();
        let engine = PlayEngine::new(
            Arc::new(ledger.clone()),
            Arc::new(LoadedDice::sequence(faces)),
            GameConfig::default(),
        )
        .unwrap();

        let mut expected = start;
        for step in steps {
            match step {
                Step::Bet { cents, bet_type } => {
                    let bet_amount = Decimal::new(cents, 2);
                    let before = ledger.get_balance(1).await.unwrap();
                    match engine
                        .resolve_bet(PlayRequest {
                            client_id: 1,
                            bet_amount,
                            bet_type,
                        })
                        .await
                    {
                        Ok(outcome) => {
                            prop_assert!(bet_amount > Decimal::ZERO);
                            prop_assert!(bet_amount <= before);
                            prop_assert_eq!(outcome.won, bet_type.wins_on(outcome.dice_result));
                            expected += if outcome.won { bet_amount } else { -bet_amount };
                            prop_assert_eq!(outcome.balance, expected);
                        }
                        Err(
                            GameError::InvalidBetAmount(_)
                            | GameError::InsufficientFunds { .. }
                            | GameError::ActiveSession(_),
                        ) => {
                            prop_assert_eq!(ledger.get_balance(1).await.unwrap(), before);
                        }
                        Err(other) => {
                            return Err(TestCaseError::fail(format!("unexpected error: {other}")));
                        }
                    }
                }
                Step::End => {
                    let _ = engine.end_session(1).await;
                }
            }

            let balance = ledger.get_balance(1).await.unwrap();
            prop_assert!(balance >= Decimal::ZERO, "balance went negative: {}", balance);
            prop_assert!(ledger.active_session_count(1).unwrap() <= 1);
        }

        let final_balance = ledger.get_balance(1).await.unwrap();
        let sessions = ledger.sessions(1).unwrap().len();
        Ok((final_balance, expected, sessions))
    })
}

proptest! {
    #[test]
    fn test_balance_never_negative(
        start_cents in 0i64..50_000,
        faces in prop::collection::vec(1u8..=6, 1..8),
        steps in prop::collection::vec(step_strategy(), 1..40),
    ) {
        let (final_balance, expected, _) = run_steps(start_cents, faces, steps)?;
        prop_assert_eq!(final_balance, expected);
    }

    #[test]
    fn test_every_accepted_bet_records_one_session(
        faces in prop::collection::vec(1u8..=6, 1..8),
        bets in prop::collection::vec((1_000i64..=10_000, bet_type_strategy()), 1..20),
    ) {
        // Close after every bet so each in-range bet is accepted
        let steps: Vec<Step> = bets
            .into_iter()
            .flat_map(|(cents, bet_type)| [Step::Bet { cents, bet_type }, Step::End])
            .collect();
        let bet_count = steps.len() / 2;

        let (final_balance, _, sessions) = run_steps(1_000_000, faces, steps)?;
        prop_assert_eq!(sessions, bet_count);
        prop_assert!(final_balance >= Decimal::ZERO);
    }
}
