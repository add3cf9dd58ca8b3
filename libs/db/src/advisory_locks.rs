//! Namespaced advisory locks, polled until granted or the wait budget runs out.
//!
//! PostgreSQL takes `pg_try_advisory_lock` on a pooled connection. The lock
//! belongs to that session, so the guard keeps the connection until release.
//! SQLite has no advisory locks; an exclusive OS lock (`flock` / `LockFileEx`)
//! on a per-key marker file stands in. The kernel drops it when the holder's
//! file handle closes, so a crashed process never leaves a key locked.

#![cfg_attr(
    not(any(feature = "pg", feature = "sqlite")),
    allow(unused_imports, unused_variables, dead_code, unreachable_code)
)]

use anyhow::Context;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use xxhash_rust::xxh3::xxh3_64;

#[cfg(feature = "pg")]
use sqlx::{pool::PoolConnection, Postgres};

use crate::{DbEngine, DbError, DbHandle, DbPool, Result};

/// Polling policy for [`DbHandle::try_lock`].
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Give up after this long (`None` = keep polling).
    pub max_wait: Option<Duration>,
    /// First pause between attempts; doubles up to `max_backoff`.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Spread of each pause in [0.0, 1.0]; 0.2 means +/-20%.
    pub jitter_pct: f32,
    /// Give up after this many attempts (`None` = unlimited).
    pub max_attempts: Option<u32>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_wait: Some(Duration::from_secs(30)),
            initial_backoff: Duration::from_millis(25),
            max_backoff: Duration::from_secs(1),
            jitter_pct: 0.2,
            max_attempts: None,
        }
    }
}

impl LockConfig {
    /// Pause before attempt `attempt + 1`. The jitter is derived from the key
    /// so that waiters on different keys drift apart.
    fn pause(&self, key: &str, attempt: u32) -> Duration {
        let doubled = self
            .initial_backoff
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_backoff);
        let pct = f64::from(self.jitter_pct.clamp(0.0, 1.0));
        if pct == 0.0 {
            return doubled;
        }
        let seed = xxh3_64(format!("{key}#{attempt}").as_bytes());
        let frac = seed as f64 / u64::MAX as f64;
        doubled.mul_f64((1.0 - pct) + frac * 2.0 * pct)
    }
}

enum Held {
    #[cfg(feature = "pg")]
    Postgres {
        conn: PoolConnection<Postgres>,
        key_hash: i64,
    },
    Marker(File),
}

/// A granted advisory lock.
///
/// Call [`DbLockGuard::release`]; dropping only schedules the unlock on the
/// current runtime.
pub struct DbLockGuard {
    key: String,
    held: Option<Held>,
}

impl DbLockGuard {
    /// `namespace:key` as requested.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn release(mut self) {
        if let Some(held) = self.held.take() {
            unlock(&self.key, held).await;
        }
    }
}

impl Drop for DbLockGuard {
    fn drop(&mut self) {
        let Some(held) = self.held.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                let key = std::mem::take(&mut self.key);
                rt.spawn(async move { unlock(&key, held).await });
            }
            Err(_) => tracing::warn!(key = %self.key, "advisory lock dropped outside a runtime"),
        }
    }
}

async fn unlock(key: &str, held: Held) {
    match held {
        #[cfg(feature = "pg")]
        Held::Postgres { mut conn, key_hash } => {
            let res = sqlx::query("SELECT pg_advisory_unlock($1)")
                .bind(key_hash)
                .execute(&mut *conn)
                .await;
            if let Err(e) = res {
                tracing::warn!(key, error = %e, "pg_advisory_unlock failed");
            }
        }
        // the file itself stays: unlinking it would let a waiter that already
        // opened it lock an inode nobody else can see
        Held::Marker(file) => {
            if let Err(e) = fs2::FileExt::unlock(&file) {
                tracing::warn!(key, error = %e, "lock marker unlock failed, closing it");
            }
        }
    }
}

impl DbHandle {
    /// Poll for `{namespace}:{key}` under `config`.
    /// `Ok(None)` means the wait or attempt budget ran out.
    pub async fn try_lock(
        &self,
        namespace: &str,
        key: &str,
        config: LockConfig,
    ) -> Result<Option<DbLockGuard>> {
        let key = format!("{namespace}:{key}");
        let deadline = config.max_wait.map(|w| Instant::now() + w);
        let mut attempt = 0u32;

        loop {
            if let Some(guard) = self.acquire_once(&key).await.map_err(DbError::Lock)? {
                tracing::trace!(key = %guard.key, attempt, "advisory lock granted");
                return Ok(Some(guard));
            }
            attempt += 1;
            if config.max_attempts.is_some_and(|max| attempt >= max) {
                return Ok(None);
            }

            let mut pause = config.pause(&key, attempt - 1);
            if let Some(deadline) = deadline {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return Ok(None);
                }
                pause = pause.min(left);
            }
            tokio::time::sleep(pause).await;
        }
    }

    async fn acquire_once(&self, key: &str) -> anyhow::Result<Option<DbLockGuard>> {
        match (&self.engine, &self.pool) {
            #[cfg(feature = "pg")]
            (DbEngine::Postgres, DbPool::Postgres(pool)) => {
                let mut conn = pool.acquire().await.context("acquire connection for lock")?;
                let key_hash = xxh3_64(key.as_bytes()) as i64;
                let (granted,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
                    .bind(key_hash)
                    .fetch_one(&mut *conn)
                    .await
                    .context("pg_try_advisory_lock")?;
                Ok(granted.then(|| DbLockGuard {
                    key: key.to_string(),
                    held: Some(Held::Postgres { conn, key_hash }),
                }))
            }
            (DbEngine::Sqlite, _) => self.lock_marker(key).await,
            #[allow(unreachable_patterns)]
            _ => anyhow::bail!("no lock backend for {:?}", self.engine),
        }
    }

    async fn lock_marker(&self, key: &str) -> anyhow::Result<Option<DbLockGuard>> {
        let path = self.marker_path(key);
        let owner = format!("pid={} key={}\n", std::process::id(), key);
        let file = tokio::task::spawn_blocking(move || lock_file(&path, &owner))
            .await
            .context("lock marker task")??;
        Ok(file.map(|file| DbLockGuard {
            key: key.to_string(),
            held: Some(Held::Marker(file)),
        }))
    }

    /// `<cache>/pairing/locks/<dsn hash>/<key hash>.lock`; in-memory
    /// databases use the temp dir.
    fn marker_path(&self, key: &str) -> PathBuf {
        let root = if self.dsn.contains("memory") {
            std::env::temp_dir().join("pairing-locks")
        } else {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("pairing")
                .join("locks")
        };
        root.join(format!("{:016x}", xxh3_64(self.dsn.as_bytes())))
            .join(format!("{:016x}.lock", xxh3_64(key.as_bytes())))
    }
}

/// Open or reuse the marker at `path` and try to lock it without blocking.
/// A marker left behind by a dead process is simply locked again.
fn lock_file(path: &Path, owner: &str) -> anyhow::Result<Option<File>> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create lock dir {}", dir.display()))?;
    }
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("open lock marker {}", path.display()))?;

    match fs2::FileExt::try_lock_exclusive(&file) {
        Ok(()) => {}
        Err(e) if is_contended(&e) => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("lock marker {}", path.display()));
        }
    }

    // owner info only helps operators; the OS lock is what counts
    let _ = file.set_len(0).and_then(|()| file.write_all(owner.as_bytes()));
    Ok(Some(file))
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
