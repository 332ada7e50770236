//! Ledger store abstractions and the PostgreSQL implementation.
//!
//! The play engine only ever talks to [`LedgerStore`] and [`UnitOfWork`], so the
//! same engine runs against PostgreSQL in production and against
//! [`MemoryLedger`](super::memory::MemoryLedger) in tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use super::{
    errors::{LedgerError, LedgerResult},
    timeouts::{DEFAULT_TRANSACTION_TIMEOUT, with_default_timeout, with_timeout},
};
use crate::game::models::{GameSession, NewSession, PlayerId};

/// Store holding player balances and game sessions
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current balance of a player
    async fn get_balance(&self, player_id: PlayerId) -> LedgerResult<Decimal>;

    /// The player's active session, if any
    async fn get_active_session(&self, player_id: PlayerId) -> LedgerResult<Option<GameSession>>;

    /// Mark the player's active session closed; returns the number of rows affected
    async fn close_active_session(&self, player_id: PlayerId) -> LedgerResult<u64>;

    /// Open an atomic unit of work
    async fn begin(&self) -> LedgerResult<Box<dyn UnitOfWork>>;

    /// Check the store is reachable
    async fn health_check(&self) -> LedgerResult<()>;
}

/// Operations that commit or roll back together
///
/// Dropping a unit without calling [`commit`](UnitOfWork::commit) rolls it back.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Read the balance while taking the player's row lock for the rest of the unit
    async fn lock_player(&mut self, player_id: PlayerId) -> LedgerResult<Decimal>;

    /// The player's active session as seen from inside this unit
    async fn get_active_session(&mut self, player_id: PlayerId)
    -> LedgerResult<Option<GameSession>>;

    /// Insert a new active session
    async fn create_session(&mut self, session: &NewSession) -> LedgerResult<GameSession>;

    /// Add `delta` to the balance; fails with `NegativeBalance` instead of clamping
    async fn adjust_balance(&mut self, player_id: PlayerId, delta: Decimal)
    -> LedgerResult<Decimal>;

    /// Make every operation of this unit permanent
    async fn commit(self: Box<Self>) -> LedgerResult<()>;

    /// Discard every operation of this unit
    async fn rollback(self: Box<Self>) -> LedgerResult<()>;
}

const SESSION_COLUMNS: &str =
    "session_id, player_id, bet_amount, dice_result, won, active, session_start, session_end";

fn session_from_row(row: &PgRow) -> LedgerResult<GameSession> {
    let dice_result: i16 = row.try_get("dice_result")?;
    Ok(GameSession {
        session_id: row.try_get("session_id")?,
        player_id: row.try_get("player_id")?,
        bet_amount: row.try_get("bet_amount")?,
        dice_result: u8::try_from(dice_result)
            .map_err(|_| LedgerError::Storage(format!("dice result {dice_result} out of range")))?,
        won: row.try_get("won")?,
        active: row.try_get("active")?,
        session_start: row.try_get("session_start")?,
        session_end: row.try_get("session_end")?,
    })
}

/// PostgreSQL implementation of [`LedgerStore`]
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn get_balance(&self, player_id: PlayerId) -> LedgerResult<Decimal> {
        let row = with_default_timeout(
            sqlx::query("SELECT balance FROM player WHERE id = $1")
                .bind(player_id)
                .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(LedgerError::PlayerNotFound(player_id))?;

        Ok(row.try_get("balance")?)
    }

    async fn get_active_session(&self, player_id: PlayerId) -> LedgerResult<Option<GameSession>> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM game_session WHERE player_id = $1 AND active = TRUE"
        );
        let row = with_default_timeout(
            sqlx::query(&query)
                .bind(player_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn close_active_session(&self, player_id: PlayerId) -> LedgerResult<u64> {
        let result = with_default_timeout(
            sqlx::query(
                "UPDATE game_session
                 SET active = FALSE, session_end = NOW()
                 WHERE player_id = $1 AND active = TRUE",
            )
            .bind(player_id)
            .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected())
    }

    async fn begin(&self) -> LedgerResult<Box<dyn UnitOfWork>> {
        let tx = with_timeout(DEFAULT_TRANSACTION_TIMEOUT, self.pool.begin()).await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn health_check(&self) -> LedgerResult<()> {
        with_default_timeout(sqlx::query("SELECT 1").execute(&self.pool)).await?;
        Ok(())
    }
}

/// Unit of work backed by a PostgreSQL transaction
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_player(&mut self, player_id: PlayerId) -> LedgerResult<Decimal> {
        let row = sqlx::query("SELECT balance FROM player WHERE id = $1 FOR UPDATE")
            .bind(player_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or(LedgerError::PlayerNotFound(player_id))?;

        Ok(row.try_get("balance")?)
    }

    async fn get_active_session(
        &mut self,
        player_id: PlayerId,
    ) -> LedgerResult<Option<GameSession>> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM game_session WHERE player_id = $1 AND active = TRUE"
        );
        let row = sqlx::query(&query)
            .bind(player_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn create_session(&mut self, session: &NewSession) -> LedgerResult<GameSession> {
        let query = format!(
            "INSERT INTO game_session (player_id, bet_amount, dice_result, won, active, session_start)
             VALUES ($1, $2, $3, $4, TRUE, $5)
             RETURNING {SESSION_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(session.player_id)
            .bind(session.bet_amount)
            .bind(i16::from(session.dice_result))
            .bind(session.won)
            .bind(session.session_start)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| match e {
                // unique_active_player_session caught a concurrent insert
                sqlx::Error::Database(ref db) if db.is_unique_violation() => LedgerError::Conflict(
                    format!("player {} already has an active session", session.player_id),
                ),
                other => LedgerError::Database(other),
            })?;

        session_from_row(&row)
    }

    async fn adjust_balance(
        &mut self,
        player_id: PlayerId,
        delta: Decimal,
    ) -> LedgerResult<Decimal> {
        // Check and update in one statement so the balance can never go negative
        let updated = sqlx::query(
            "UPDATE player
             SET balance = balance + $1
             WHERE id = $2 AND balance + $1 >= 0
             RETURNING balance",
        )
        .bind(delta)
        .bind(player_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match updated {
            Some(row) => Ok(row.try_get("balance")?),
            None => {
                let current = sqlx::query("SELECT balance FROM player WHERE id = $1")
                    .bind(player_id)
                    .fetch_optional(&mut *self.tx)
                    .await?;

                match current {
                    Some(row) => Err(LedgerError::NegativeBalance {
                        player_id,
                        balance: row.try_get("balance")?,
                        delta,
                    }),
                    None => Err(LedgerError::PlayerNotFound(player_id)),
                }
            }
        }
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> LedgerResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
