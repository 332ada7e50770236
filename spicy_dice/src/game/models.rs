//! Game data models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dice::DieFace;

/// Opaque player identifier supplied by the client
pub type PlayerId = i64;

/// Parity the player bets on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    Even,
    Odd,
}

impl BetType {
    /// Whether a die face satisfies this bet
    pub fn wins_on(self, face: DieFace) -> bool {
        let is_even = face % 2 == 0;
        match self {
            BetType::Even => is_even,
            BetType::Odd => !is_even,
        }
    }
}

impl std::fmt::Display for BetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BetType::Even => write!(f, "even"),
            BetType::Odd => write!(f, "odd"),
        }
    }
}

/// Balance check request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRequest {
    pub client_id: PlayerId,
}

/// Current balance of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletResponse {
    pub client_id: PlayerId,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

/// Bet placement request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRequest {
    pub client_id: PlayerId,
    #[serde(with = "rust_decimal::serde::float")]
    pub bet_amount: Decimal,
    pub bet_type: BetType,
}

/// Resolved bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayResponse {
    pub dice_result: DieFace,
    pub won: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub bet_amount: Decimal,
}

/// Session close request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndPlayRequest {
    pub client_id: PlayerId,
}

/// Session close confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndPlayResponse {
    pub client_id: PlayerId,
}

/// Persisted record of one bet, from placement to closure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    pub session_id: i64,
    pub player_id: PlayerId,
    pub bet_amount: Decimal,
    pub dice_result: DieFace,
    pub won: bool,
    pub active: bool,
    pub session_start: DateTime<Utc>,
    pub session_end: Option<DateTime<Utc>>,
}

/// Data needed to open a new session inside a unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub player_id: PlayerId,
    pub bet_amount: Decimal,
    pub dice_result: DieFace,
    pub won: bool,
    pub session_start: DateTime<Utc>,
}
