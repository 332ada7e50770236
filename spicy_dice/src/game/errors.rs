//! Client-facing game error taxonomy.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{db::LedgerError, dice::DiceError, game::models::PlayerId};

/// Stable numeric error codes sent to clients
pub mod codes {
    pub const INTERNAL: u16 = 1000;
    pub const INVALID_INPUT: u16 = 1001;
    pub const INSUFFICIENT_FUNDS: u16 = 1002;
    pub const INVALID_BET_AMOUNT: u16 = 1003;
    pub const USER_NOT_FOUND: u16 = 1004;
    pub const ACTIVE_SESSION: u16 = 1005;
    pub const DICE_ROLL: u16 = 1006;
}

/// Game errors
#[derive(Debug, Error)]
pub enum GameError {
    /// Unexpected store or transport failure
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Malformed request
    #[error("Invalid input provided: {0}")]
    InvalidInput(String),

    /// Bet exceeds the available balance
    #[error("Bet amount exceeds available balance: bet {required}, balance {available}")]
    InsufficientFunds { available: Decimal, required: Decimal },

    /// Bet breaks the configured limits
    #[error("Invalid bet amount: {0}")]
    InvalidBetAmount(String),

    /// No such player
    #[error("User not found: {0}")]
    UserNotFound(PlayerId),

    /// Session conflict (already active, or nothing to end)
    #[error("Active session error: {0}")]
    ActiveSession(String),

    /// Entropy source failure
    #[error("Error rolling dice: {0}")]
    DiceRoll(String),
}

impl GameError {
    /// Numeric code for this error
    pub fn code(&self) -> u16 {
        match self {
            GameError::Internal(_) => codes::INTERNAL,
            GameError::InvalidInput(_) => codes::INVALID_INPUT,
            GameError::InsufficientFunds { .. } => codes::INSUFFICIENT_FUNDS,
            GameError::InvalidBetAmount(_) => codes::INVALID_BET_AMOUNT,
            GameError::UserNotFound(_) => codes::USER_NOT_FOUND,
            GameError::ActiveSession(_) => codes::ACTIVE_SESSION,
            GameError::DiceRoll(_) => codes::DICE_ROLL,
        }
    }

    /// Short, stable description of the error category
    pub fn client_message(&self) -> &'static str {
        match self {
            GameError::Internal(_) => "Internal server error",
            GameError::InvalidInput(_) => "Invalid input provided",
            GameError::InsufficientFunds { .. } => "Bet amount exceeds available balance",
            GameError::InvalidBetAmount(_) => "Invalid bet amount",
            GameError::UserNotFound(_) => "User not found",
            GameError::ActiveSession(_) => "Active session error",
            GameError::DiceRoll(_) => "Error rolling dice",
        }
    }

    /// Details safe to show the client
    ///
    /// Internal failures are redacted; the cause only goes to the server log.
    pub fn client_details(&self) -> String {
        match self {
            GameError::Internal(_) => String::new(),
            GameError::InvalidInput(details)
            | GameError::InvalidBetAmount(details)
            | GameError::ActiveSession(details)
            | GameError::DiceRoll(details) => details.clone(),
            GameError::InsufficientFunds {
                available,
                required,
            } => format!(
                "bet amount {:.2} exceeds available balance {:.2}",
                required, available
            ),
            GameError::UserNotFound(player_id) => format!("No player found with ID: {player_id}"),
        }
    }

    /// Payload of the `error` envelope sent to the client
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code(),
            message: self.client_message().to_string(),
            details: self.client_details(),
        }
    }

    /// Whether the client may simply resend the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, GameError::Internal(_) | GameError::DiceRoll(_))
    }
}

impl From<LedgerError> for GameError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::PlayerNotFound(player_id) => GameError::UserNotFound(player_id),
            LedgerError::NegativeBalance { balance, delta, .. } => GameError::InsufficientFunds {
                available: balance,
                required: -delta,
            },
            other => GameError::Internal(other.to_string()),
        }
    }
}

impl From<DiceError> for GameError {
    fn from(err: DiceError) -> Self {
        GameError::DiceRoll(err.to_string())
    }
}

/// Body of an `error` envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: u16,
    pub message: String,
    pub details: String,
}

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;
