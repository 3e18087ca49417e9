//! Per-key async mutexes with bounded acquisition

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::domain::DomainError;

/// Default time to wait for a key lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

type LockTable = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Serializes mutations per key (model name, experiment id).
///
/// Distinct keys never contend. Waiting longer than the configured timeout
/// yields `DomainError::Concurrency`.
#[derive(Debug)]
pub struct KeyedLocks {
    scope: &'static str,
    timeout: Duration,
    locks: LockTable,
}

/// Held for the duration of a keyed mutation; releasing it drops the key's
/// table entry once nobody else waits on it
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: LockTable,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        let Ok(mut locks) = self.locks.lock() else {
            warn!(key = %self.key, "Lock table poisoned, keeping entry");
            return;
        };
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

impl KeyedLocks {
    pub fn new(scope: &'static str, timeout: Duration) -> Self {
        Self {
            scope,
            timeout,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for exclusive access to `key`
    pub async fn acquire(&self, key: &str) -> Result<KeyGuard, DomainError> {
        let lock = {
            let mut locks = self.locks.lock().map_err(|e| {
                DomainError::concurrency(format!("Lock table poisoned: {}", e))
            })?;
            locks.entry(key.to_string()).or_default().clone()
        };

        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => {
                debug!(scope = self.scope, key = %key, "Acquired key lock");
                Ok(KeyGuard {
                    key: key.to_string(),
                    guard: Some(guard),
                    locks: Arc::clone(&self.locks),
                })
            }
            Err(_) => Err(DomainError::concurrency(format!(
                "Timed out after {}ms waiting for {} lock on '{}'",
                self.timeout.as_millis(),
                self.scope,
                key
            ))),
        }
    }

    /// Keys currently held or waited on
    pub fn tracked_keys(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

impl Default for KeyedLocks {
    fn default() -> Self {
        Self::new("key", DEFAULT_LOCK_TIMEOUT)
    }
}
