//! Per-couple lock backends.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use db::{DbHandle, DbLockGuard, LockConfig};

use crate::contract::couple_id::CoupleId;
use crate::contract::lock::LockLease;
use crate::domain::repo::CoupleLocks;

const LOCK_NAMESPACE: &str = "pairing.couple";

type LockTable = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// In-process lock table keyed by couple id. Entries are dropped once the
/// last holder or waiter is gone.
#[derive(Clone)]
pub struct LocalCoupleLocks {
    table: LockTable,
    max_wait: Duration,
}

impl LocalCoupleLocks {
    pub fn new(max_wait: Duration) -> Self {
        Self {
            table: Arc::new(DashMap::new()),
            max_wait,
        }
    }

    /// Number of couples currently locked or waited on.
    pub fn active(&self) -> usize {
        self.table.len()
    }
}

#[async_trait]
impl CoupleLocks for LocalCoupleLocks {
    async fn acquire(&self, couple_id: &CoupleId) -> anyhow::Result<Option<Box<dyn LockLease>>> {
        let key = couple_id.as_str().to_owned();
        let mutex = self
            .table
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(self.max_wait, mutex.lock_owned()).await {
            Ok(guard) => Ok(Some(Box::new(LocalLease {
                table: self.table.clone(),
                key,
                guard: Some(guard),
            }))),
            Err(_) => {
                debug!(couple_id = %couple_id, "Local couple lock wait timed out");
                evict_if_idle(&self.table, &key);
                Ok(None)
            }
        }
    }
}

struct LocalLease {
    table: LockTable,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

#[async_trait]
impl LockLease for LocalLease {
    async fn release(self: Box<Self>) {
        drop(self);
    }
}

impl Drop for LocalLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        evict_if_idle(&self.table, &self.key);
    }
}

fn evict_if_idle(table: &LockTable, key: &str) {
    table.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
}

/// Database advisory locks, shared by every service instance on the same
/// database.
pub struct DbCoupleLocks {
    db: Arc<DbHandle>,
    max_wait: Duration,
}

impl DbCoupleLocks {
    pub fn new(db: Arc<DbHandle>, max_wait: Duration) -> Self {
        Self { db, max_wait }
    }
}

#[async_trait]
impl CoupleLocks for DbCoupleLocks {
    async fn acquire(&self, couple_id: &CoupleId) -> anyhow::Result<Option<Box<dyn LockLease>>> {
        let config = LockConfig {
            max_wait: Some(self.max_wait),
            ..LockConfig::default()
        };
        let guard = self
            .db
            .try_lock(LOCK_NAMESPACE, couple_id.as_str(), config)
            .await?;
        Ok(guard.map(|g| Box::new(DbLease(g)) as Box<dyn LockLease>))
    }
}

struct DbLease(DbLockGuard);

#[async_trait]
impl LockLease for DbLease {
    async fn release(self: Box<Self>) {
        self.0.release().await;
    }
}
