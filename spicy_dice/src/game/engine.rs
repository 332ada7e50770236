//! Play engine: turns bets into persisted, atomically settled outcomes.

use chrono::Utc;
use log::{info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;

use super::{
    config::{GameConfig, GameConfigError},
    errors::{GameError, GameResult},
    models::{
        BetType, EndPlayResponse, NewSession, PlayRequest, PlayResponse, PlayerId, WalletResponse,
    },
};
use crate::{
    db::{LedgerStore, UnitOfWork},
    dice::{DiceRoller, DieFace},
};

/// Decimal places a monetary amount may carry, matching `NUMERIC(12,2)`
pub const MONEY_SCALE: u32 = 2;

/// Resolves bets and session lifecycle against a ledger store
///
/// The engine keeps no per-player state of its own. Concurrent bets for the
/// same player are serialized by the store's row lock, so several processes
/// may share one store.
#[derive(Clone)]
pub struct PlayEngine {
    store: Arc<dyn LedgerStore>,
    dice: Arc<dyn DiceRoller>,
    config: GameConfig,
}

impl PlayEngine {
    /// Create a new play engine
    ///
    /// # Arguments
    ///
    /// * `store` - Ledger store holding balances and sessions
    /// * `dice` - Randomness source
    /// * `config` - Betting limits
    ///
    /// # Errors
    ///
    /// * `GameConfigError` - The limits are inconsistent, or `dice` does not
    ///   have `config.dice_sides` faces
    pub fn new(
        store: Arc<dyn LedgerStore>,
        dice: Arc<dyn DiceRoller>,
        config: GameConfig,
    ) -> Result<Self, GameConfigError> {
        config.validate()?;
        if dice.sides() != config.dice_sides {
            return Err(GameConfigError::DiceMismatch {
                configured: config.dice_sides,
                actual: dice.sides(),
            });
        }

        Ok(Self {
            store,
            dice,
            config,
        })
    }

    /// Current balance of a player
    ///
    /// # Errors
    ///
    /// * `GameError::UserNotFound` - No such player
    pub async fn get_balance(&self, player_id: PlayerId) -> GameResult<WalletResponse> {
        let balance = self.store.get_balance(player_id).await?;
        Ok(WalletResponse {
            client_id: player_id,
            balance,
        })
    }

    /// Validate, roll and settle a bet in one unit of work
    ///
    /// Winning pays the stake back plus an equal profit (net `+bet_amount`);
    /// losing debits the stake. The new session and the balance change commit
    /// together or not at all.
    ///
    /// # Errors
    ///
    /// * `GameError::InvalidBetAmount` - Non-positive, finer than a cent, or outside
    ///   `[min_bet, max_bet]`
    /// * `GameError::InsufficientFunds` - Bet larger than the balance
    /// * `GameError::UserNotFound` - No such player
    /// * `GameError::DiceRoll` - Entropy source failed (nothing committed)
    /// * `GameError::ActiveSession` - The player already has an open session
    /// * `GameError::Internal` - Store failure or lost race; safe to retry
    pub async fn resolve_bet(&self, request: PlayRequest) -> GameResult<PlayResponse> {
        let PlayRequest {
            client_id: player_id,
            bet_amount,
            bet_type,
        } = request;

        info!(
            "Processing play for player {}: bet {} on {}",
            player_id, bet_amount, bet_type
        );

        if bet_amount <= Decimal::ZERO {
            return Err(GameError::InvalidBetAmount(format!(
                "bet amount must be positive, got {bet_amount}"
            )));
        }
        if bet_amount.normalize().scale() > MONEY_SCALE {
            return Err(GameError::InvalidBetAmount(format!(
                "bet amount must have at most {MONEY_SCALE} decimal places, got {bet_amount}"
            )));
        }

        let balance = self.store.get_balance(player_id).await?;
        if bet_amount > balance {
            return Err(GameError::InsufficientFunds {
                available: balance,
                required: bet_amount,
            });
        }

        if !self.config.accepts(bet_amount) {
            let reason = if bet_amount < self.config.min_bet {
                format!("minimum bet amount is {:.2}", self.config.min_bet)
            } else {
                format!("maximum bet amount is {:.2}", self.config.max_bet)
            };
            return Err(GameError::InvalidBetAmount(reason));
        }

        let dice_result = self.dice.roll()?;
        let won = bet_type.wins_on(dice_result);

        let mut uow = self.store.begin().await?;
        let settled = settle(uow.as_mut(), player_id, bet_amount, bet_type, dice_result, won).await;
        let new_balance = match settled {
            Ok(new_balance) => new_balance,
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(
                        "Rollback failed for player {}: {}",
                        player_id, rollback_err
                    );
                }
                return Err(err);
            }
        };
        uow.commit().await?;

        info!(
            "Player {} rolled {} ({}), balance now {}",
            player_id,
            dice_result,
            if won { "won" } else { "lost" },
            new_balance
        );

        Ok(PlayResponse {
            dice_result,
            won,
            balance: new_balance,
            bet_amount,
        })
    }

    /// Close the player's active session
    ///
    /// # Errors
    ///
    /// * `GameError::ActiveSession` - There is no active session to end
    /// * `GameError::Internal` - The session was closed concurrently, or a store failure
    pub async fn end_session(&self, player_id: PlayerId) -> GameResult<EndPlayResponse> {
        info!("Finishing play session for player {}", player_id);

        if self.store.get_active_session(player_id).await?.is_none() {
            return Err(GameError::ActiveSession(format!(
                "Client ID {player_id} does not have an active session."
            )));
        }

        let affected = self.store.close_active_session(player_id).await?;
        if affected == 0 {
            return Err(GameError::Internal(format!(
                "active session for player {player_id} was closed concurrently"
            )));
        }

        Ok(EndPlayResponse {
            client_id: player_id,
        })
    }
}

/// Body of the play unit of work: lock, check, record, pay out
async fn settle(
    uow: &mut dyn UnitOfWork,
    player_id: PlayerId,
    bet_amount: Decimal,
    bet_type: BetType,
    dice_result: DieFace,
    won: bool,
) -> GameResult<Decimal> {
    uow.lock_player(player_id).await?;

    if uow.get_active_session(player_id).await?.is_some() {
        return Err(GameError::ActiveSession(
            "Player already has an active session".to_string(),
        ));
    }

    let session = uow
        .create_session(&NewSession {
            player_id,
            bet_amount,
            dice_result,
            won,
            session_start: Utc::now(),
        })
        .await?;

    let delta = if won { bet_amount } else { -bet_amount };
    let new_balance = uow.adjust_balance(player_id, delta).await?;

    log::debug!(
        "Session {} opened for player {} ({} on {})",
        session.session_id,
        player_id,
        bet_amount,
        bet_type
    );

    Ok(new_balance)
}
