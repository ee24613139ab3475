//! Per-case-key mutual exclusion.
//!
//! Two commits for the same key must never interleave; different keys run
//! freely. Entries are dropped from the table once nobody holds or awaits
//! them, so the table only ever holds in-flight keys.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Table = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Shared lock table. Cloning shares the table.
#[derive(Clone, Default)]
pub struct KeyLocks {
  table: Table,
}

/// Holds the lock for one key until dropped.
pub struct KeyGuard {
  key:   String,
  table: Table,
  entry: Arc<AsyncMutex<()>>,
  _held: OwnedMutexGuard<()>,
}

impl KeyLocks {
  pub fn new() -> Self { Self::default() }

  /// Wait until no other holder of `key` remains, then hold it.
  pub async fn lock(&self, key: &str) -> KeyGuard {
    let entry = {
      let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
      table.entry(key.to_owned()).or_default().clone()
    };
    let held = entry.clone().lock_owned().await;
    KeyGuard {
      key: key.to_owned(),
      table: self.table.clone(),
      entry,
      _held: held,
    }
  }

  /// Number of keys currently held or awaited.
  pub fn in_flight(&self) -> usize {
    self.table.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}

impl Drop for KeyGuard {
  fn drop(&mut self) {
    let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
    // The table, this guard's `entry` and its `_held` guard account for
    // three references; anything more is a waiter.
    if Arc::strong_count(&self.entry) <= 3 {
      table.remove(&self.key);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{sync::atomic::{AtomicUsize, Ordering}, time::Duration};

  use super::*;

  #[tokio::test]
  async fn same_key_is_serialized() {
    let locks = KeyLocks::new();
    let inside = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
      let (locks, inside, peak) = (locks.clone(), inside.clone(), peak.clone());
      tasks.spawn(async move {
        let _guard = locks.lock("HC 1").await;
        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        inside.fetch_sub(1, Ordering::SeqCst);
      });
    }
    while tasks.join_next().await.is_some() {}

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(locks.in_flight(), 0);
  }

  #[tokio::test]
  async fn different_keys_do_not_block() {
    let locks = KeyLocks::new();
    let _a = locks.lock("A").await;
    let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("B")).await;
    assert!(b.is_ok());
    assert_eq!(locks.in_flight(), 2);
  }
}
