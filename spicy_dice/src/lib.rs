//! # Spicy Dice
//!
//! Wallet and dice betting engine behind a realtime game server.
//!
//! A player checks their balance, bets an amount on whether a die lands even
//! or odd, and ends the resulting session before betting again. Every bet is
//! settled atomically: the session record and the balance change are
//! committed together, a balance never goes negative, and a player never
//! holds more than one active session, even under concurrent requests.
//!
//! ## Core Modules
//!
//! - [`dice`]: Randomness source (cryptographic die rolls)
//! - [`game`]: Play engine, betting limits, request/response models and errors
//! - [`db`]: Ledger store trait with PostgreSQL and in-memory backends
//! - [`net`]: JSON envelopes exchanged with clients
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use spicy_dice::{BetType, Decimal, GameConfig, LoadedDice, MemoryLedger, PlayEngine, PlayRequest};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let ledger = MemoryLedger::new();
//! ledger.insert_player(1, Decimal::from(200)).unwrap();
//!
//! let engine = PlayEngine::new(
//!     Arc::new(ledger),
//!     Arc::new(LoadedDice::always(4)),
//!     GameConfig::default(),
//! )
//! .unwrap();
//!
//! let outcome = engine
//!     .resolve_bet(PlayRequest { client_id: 1, bet_amount: Decimal::from(50), bet_type: BetType::Even })
//!     .await
//!     .unwrap();
//! assert!(outcome.won);
//! assert_eq!(outcome.balance, Decimal::from(250));
//! # }
//! ```

/// Persistence: connection pool and ledger stores.
pub mod db;

/// Randomness source for die rolls.
pub mod dice;

/// Play engine and game domain.
pub mod game;

/// Wire envelopes.
pub mod net;

pub use db::{LedgerError, LedgerStore, MemoryLedger, PgLedgerStore, UnitOfWork};
pub use dice::{Dice, DiceError, DiceRoller, DieFace, LoadedDice};
pub use game::{
    BetType, EndPlayRequest, EndPlayResponse, GameConfig, GameError, GameResult, PlayEngine,
    PlayRequest, PlayResponse, PlayerId, WalletRequest, WalletResponse,
};
pub use net::{ClientRequest, Envelope, InboundEnvelope, MessageType};
pub use rust_decimal::Decimal;
