//! Transaction scope over the SQLite pool.
//!
//! `Store::begin` bounds the wait for the writer slot and a connection;
//! dropping the returned transaction without committing rolls it back.
//! SQLite admits one writer at a time, so write transactions queue on a
//! single in-process writer lock instead of failing with `SQLITE_BUSY`.
//! `KeyedLocks` serializes work on a single account or collection. Keyed
//! locks must be taken before `begin` so that a task never waits on a lock
//! while holding the writer slot or a pooled connection.

use std::collections::{BTreeSet, HashMap};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{AppError, AppResult};

/// Lock keys. The derived ordering (accounts first, then collections, each by
/// ascending id) is the acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Account(i64),
    Collection(i64),
}

#[derive(Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

/// Held locks; released on drop.
pub struct LockGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub async fn acquire(&self, keys: &[LockKey]) -> LockGuard {
        let ordered: BTreeSet<LockKey> = keys.iter().copied().collect();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            // Drop slots nobody is holding or waiting on.
            slots.retain(|_, m| Arc::strong_count(m) > 1);
            ordered
                .iter()
                .map(|k| slots.entry(*k).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for m in mutexes {
            guards.push(m.lock_owned().await);
        }

        LockGuard { _guards: guards }
    }
}

/// An open write transaction holding the writer slot until it is finished
/// or dropped.
#[derive(Debug)]
pub struct WriteTx {
    tx: Transaction<'static, Sqlite>,
    _writer: OwnedMutexGuard<()>,
}

impl Deref for WriteTx {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

impl DerefMut for WriteTx {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tx
    }
}

pub struct Store {
    pool: SqlitePool,
    begin_timeout: Duration,
    locks: KeyedLocks,
    writer: Arc<AsyncMutex<()>>,
}

impl Store {
    pub fn new(pool: SqlitePool, begin_timeout: Duration) -> Self {
        Self {
            pool,
            begin_timeout,
            locks: KeyedLocks::default(),
            writer: Arc::new(AsyncMutex::new(())),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Open a write transaction, failing with `BeginTimeout` once the
    /// configured budget is spent waiting for the writer slot or a connection.
    pub async fn begin(&self) -> AppResult<WriteTx> {
        let open = async {
            let writer = self.writer.clone().lock_owned().await;
            let tx = self.pool.begin().await?;
            Ok::<_, sqlx::Error>(WriteTx {
                tx,
                _writer: writer,
            })
        };
        match tokio::time::timeout(self.begin_timeout, open).await {
            Ok(tx) => tx.map_err(AppError::Database),
            Err(_) => {
                tracing::warn!(
                    "Timed out after {:?} waiting to begin a transaction",
                    self.begin_timeout
                );
                Err(AppError::BeginTimeout(self.begin_timeout))
            }
        }
    }

    pub async fn lock(&self, keys: &[LockKey]) -> LockGuard {
        self.locks.acquire(keys).await
    }

    /// Commit on success, roll back on error. The original error is returned
    /// even if the rollback itself fails.
    pub async fn finish<T>(tx: WriteTx, result: AppResult<T>) -> AppResult<T> {
        match result {
            Ok(value) => {
                tx.tx.commit().await.map_err(AppError::Database)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.tx.rollback().await {
                    tracing::warn!("Rollback failed after {}: {:?}", e, rollback_err);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn begin_fails_when_budget_is_spent() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = Store::new(pool, Duration::from_millis(50));

        let _held = store.begin().await.unwrap();
        let err = store.begin().await.unwrap_err();
        assert!(matches!(err, AppError::BeginTimeout(_)));
        assert!(err.is_store_failure());
    }

    #[tokio::test]
    async fn writers_queue_instead_of_failing() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = Arc::new(Store::new(pool, Duration::from_secs(2)));

        let first = store.begin().await.unwrap();
        let waiter = {
            let store = store.clone();
            tokio::spawn(async move {
                let tx = store.begin().await?;
                Store::finish(tx, Ok(())).await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        Store::finish(first, Ok(())).await.unwrap();
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::default());
        let guard = locks.acquire(&[LockKey::Collection(10)]).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(&[LockKey::Collection(10)]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block() {
        let locks = KeyedLocks::default();
        let _a = locks.acquire(&[LockKey::Account(1), LockKey::Collection(10)]).await;
        let _b = tokio::time::timeout(
            Duration::from_millis(100),
            locks.acquire(&[LockKey::Account(2), LockKey::Collection(11)]),
        )
        .await
        .expect("independent keys should not contend");
    }
}
