//! In-process ledger store.
//!
//! Mirrors the PostgreSQL semantics the play engine relies on: per-player row
//! locks held for the lifetime of a unit of work, writes that only become
//! visible on commit, and a single active session per player.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use super::{
    errors::{LedgerError, LedgerResult},
    repository::{LedgerStore, UnitOfWork},
};
use crate::game::models::{GameSession, NewSession, PlayerId};

#[derive(Default)]
struct LedgerState {
    balances: HashMap<PlayerId, Decimal>,
    sessions: Vec<GameSession>,
}

impl LedgerState {
    fn active_session(&self, player_id: PlayerId) -> Option<&GameSession> {
        self.sessions
            .iter()
            .find(|s| s.player_id == player_id && s.active)
    }
}

#[derive(Default)]
struct Inner {
    state: Mutex<LedgerState>,
    row_locks: Mutex<HashMap<PlayerId, Arc<RowLock<()>>>>,
    next_session_id: AtomicI64,
    fail_next_adjust: AtomicBool,
}

impl Inner {
    fn state(&self) -> LedgerResult<MutexGuard<'_, LedgerState>> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Storage("ledger state lock poisoned".to_string()))
    }

    fn row_lock(&self, player_id: PlayerId) -> LedgerResult<Arc<RowLock<()>>> {
        let mut locks = self
            .row_locks
            .lock()
            .map_err(|_| LedgerError::Storage("row lock table poisoned".to_string()))?;
        Ok(locks
            .entry(player_id)
            .or_insert_with(|| Arc::new(RowLock::new(())))
            .clone())
    }
}

/// Ledger store kept entirely in memory
#[derive(Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<Inner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite a player with the given balance
    pub fn insert_player(&self, player_id: PlayerId, balance: Decimal) -> LedgerResult<()> {
        self.inner.state()?.balances.insert(player_id, balance);
        Ok(())
    }

    /// Every session ever recorded for a player, oldest first
    pub fn sessions(&self, player_id: PlayerId) -> LedgerResult<Vec<GameSession>> {
        Ok(self
            .inner
            .state()?
            .sessions
            .iter()
            .filter(|s| s.player_id == player_id)
            .cloned()
            .collect())
    }

    /// Number of active sessions for a player
    pub fn active_session_count(&self, player_id: PlayerId) -> LedgerResult<usize> {
        Ok(self
            .inner
            .state()?
            .sessions
            .iter()
            .filter(|s| s.player_id == player_id && s.active)
            .count())
    }

    /// Make the next `adjust_balance` inside any unit of work fail
    pub fn fail_next_adjust(&self) {
        self.inner.fail_next_adjust.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn get_balance(&self, player_id: PlayerId) -> LedgerResult<Decimal> {
        self.inner
            .state()?
            .balances
            .get(&player_id)
            .copied()
            .ok_or(LedgerError::PlayerNotFound(player_id))
    }

    async fn get_active_session(&self, player_id: PlayerId) -> LedgerResult<Option<GameSession>> {
        Ok(self.inner.state()?.active_session(player_id).cloned())
    }

    async fn close_active_session(&self, player_id: PlayerId) -> LedgerResult<u64> {
        let mut state = self.inner.state()?;
        let now = Utc::now();
        let mut affected = 0;
        for session in state
            .sessions
            .iter_mut()
            .filter(|s| s.player_id == player_id && s.active)
        {
            session.active = false;
            session.session_end = Some(now);
            affected += 1;
        }
        Ok(affected)
    }

    async fn begin(&self) -> LedgerResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork {
            inner: self.inner.clone(),
            guards: HashMap::new(),
            balance_deltas: HashMap::new(),
            new_sessions: Vec::new(),
        }))
    }

    async fn health_check(&self) -> LedgerResult<()> {
        self.inner.state().map(|_| ())
    }
}

/// Unit of work over a [`MemoryLedger`]
pub struct MemoryUnitOfWork {
    inner: Arc<Inner>,
    guards: HashMap<PlayerId, OwnedMutexGuard<()>>,
    balance_deltas: HashMap<PlayerId, Decimal>,
    new_sessions: Vec<GameSession>,
}

impl MemoryUnitOfWork {
    fn staged_balance(&self, player_id: PlayerId) -> LedgerResult<Decimal> {
        let committed = self
            .inner
            .state()?
            .balances
            .get(&player_id)
            .copied()
            .ok_or(LedgerError::PlayerNotFound(player_id))?;
        let delta = self
            .balance_deltas
            .get(&player_id)
            .copied()
            .unwrap_or_default();
        Ok(committed + delta)
    }

    fn staged_active_session(&self, player_id: PlayerId) -> LedgerResult<Option<GameSession>> {
        if let Some(session) = self
            .new_sessions
            .iter()
            .find(|s| s.player_id == player_id && s.active)
        {
            return Ok(Some(session.clone()));
        }
        Ok(self.inner.state()?.active_session(player_id).cloned())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_player(&mut self, player_id: PlayerId) -> LedgerResult<Decimal> {
        if !self.guards.contains_key(&player_id) {
            let lock = self.inner.row_lock(player_id)?;
            let guard = lock.lock_owned().await;
            self.guards.insert(player_id, guard);
        }
        self.staged_balance(player_id)
    }

    async fn get_active_session(
        &mut self,
        player_id: PlayerId,
    ) -> LedgerResult<Option<GameSession>> {
        self.staged_active_session(player_id)
    }

    async fn create_session(&mut self, session: &NewSession) -> LedgerResult<GameSession> {
        if self.staged_active_session(session.player_id)?.is_some() {
            return Err(LedgerError::Conflict(format!(
                "player {} already has an active session",
                session.player_id
            )));
        }
        let created = GameSession {
            session_id: self.inner.next_session_id.fetch_add(1, Ordering::SeqCst) + 1,
            player_id: session.player_id,
            bet_amount: session.bet_amount,
            dice_result: session.dice_result,
            won: session.won,
            active: true,
            session_start: session.session_start,
            session_end: None,
        };
        self.new_sessions.push(created.clone());
        Ok(created)
    }

    async fn adjust_balance(
        &mut self,
        player_id: PlayerId,
        delta: Decimal,
    ) -> LedgerResult<Decimal> {
        if self.inner.fail_next_adjust.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Storage("injected adjust failure".to_string()));
        }
        let balance = self.lock_player(player_id).await?;
        let updated = balance + delta;
        if updated < Decimal::ZERO {
            return Err(LedgerError::NegativeBalance {
                player_id,
                balance,
                delta,
            });
        }
        *self.balance_deltas.entry(player_id).or_default() += delta;
        Ok(updated)
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        let MemoryUnitOfWork {
            inner,
            guards,
            balance_deltas,
            new_sessions,
        } = *self;
        {
            let mut state = inner.state()?;
            if let Some(missing) = balance_deltas
                .keys()
                .find(|id| !state.balances.contains_key(*id))
            {
                return Err(LedgerError::PlayerNotFound(*missing));
            }
            // Same backstop as the partial unique index on active sessions
            if let Some(taken) = new_sessions
                .iter()
                .find(|s| s.active && state.active_session(s.player_id).is_some())
            {
                return Err(LedgerError::Conflict(format!(
                    "player {} already has an active session",
                    taken.player_id
                )));
            }
            for (player_id, delta) in balance_deltas {
                *state.balances.entry(player_id).or_default() += delta;
            }
            state.sessions.extend(new_sessions);
        }
        drop(guards);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> LedgerResult<()> {
        Ok(())
    }
}
