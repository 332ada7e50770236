//! Dice betting game: wire-facing models, betting limits and the play engine.
//!
//! A player bets an amount on the parity of a single die roll. The
//! [`PlayEngine`] validates the bet, rolls, and settles the outcome together
//! with a new active session in one unit of work. A player holds at most one
//! active session; it must be ended before the next bet.

pub mod config;
pub mod engine;
pub mod errors;
pub mod models;

pub use config::{GameConfig, GameConfigError};
pub use engine::PlayEngine;
pub use errors::{ErrorPayload, GameError, GameResult};
pub use models::{
    BetType, EndPlayRequest, EndPlayResponse, GameSession, NewSession, PlayRequest, PlayResponse,
    PlayerId, WalletRequest, WalletResponse,
};
