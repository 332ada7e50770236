//! Ledger store error types.

use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

use crate::game::models::PlayerId;

/// Ledger store errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Player row does not exist
    #[error("No player found with ID: {0}")]
    PlayerNotFound(PlayerId),

    /// Adjustment would leave the balance below zero
    #[error("Negative balance: player {player_id} has {balance}, adjustment {delta}")]
    NegativeBalance {
        player_id: PlayerId,
        balance: Decimal,
        delta: Decimal,
    },

    /// Another writer won a race on the same rows
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    /// Query exceeded its deadline
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    /// Non-SQL backend failure
    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
