//! Editorial mount locks.
//!
//! Locks live beside the resolution tree, keyed by mount identifier, so
//! registries stay immutable and a lock survives a configuration reload.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use crate::hosting::error::LockError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountLock {
    pub locked_by: String,
    /// Seconds since the unix epoch.
    pub locked_on: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MountLocks {
    inner: Arc<DashMap<String, MountLock>>,
}

impl MountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock a mount for `user`. Locking again as the holder refreshes
    /// the lock time.
    pub fn lock(&self, identifier: &str, user: &str) -> Result<MountLock, LockError> {
        let lock = MountLock {
            locked_by: user.to_string(),
            locked_on: now_secs(),
        };
        match self.inner.entry(identifier.to_string()) {
            Entry::Occupied(mut held) if held.get().locked_by == user => {
                held.insert(lock.clone());
            }
            Entry::Occupied(held) => {
                return Err(LockError::AlreadyLocked {
                    identifier: identifier.to_string(),
                    locked_by: held.get().locked_by.clone(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(lock.clone());
            }
        }
        tracing::info!(identifier, user, "Mount locked");
        Ok(lock)
    }

    /// Release a lock held by `user`. Unlocking an unlocked mount is a
    /// no-op.
    pub fn unlock(&self, identifier: &str, user: &str) -> Result<(), LockError> {
        match self.inner.entry(identifier.to_string()) {
            Entry::Occupied(held) if held.get().locked_by == user => {
                held.remove();
                tracing::info!(identifier, user, "Mount unlocked");
                Ok(())
            }
            Entry::Occupied(_) => Err(LockError::NotLockedBy {
                identifier: identifier.to_string(),
                user: user.to_string(),
            }),
            Entry::Vacant(_) => Ok(()),
        }
    }

    pub fn lock_of(&self, identifier: &str) -> Option<MountLock> {
        self.inner.get(identifier).map(|r| r.value().clone())
    }

    /// Snapshot of every lock.
    pub fn locks(&self) -> Vec<(String, MountLock)> {
        self.inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_conflicts() {
        let locks = MountLocks::new();
        locks.lock("m1", "alice").unwrap();
        assert!(locks.lock("m1", "alice").is_ok());
        assert_eq!(
            locks.lock("m1", "bob"),
            Err(LockError::AlreadyLocked {
                identifier: "m1".into(),
                locked_by: "alice".into()
            })
        );
        assert!(matches!(locks.unlock("m1", "bob"), Err(LockError::NotLockedBy { .. })));
        assert_eq!(locks.lock_of("m1").unwrap().locked_by, "alice");

        locks.unlock("m1", "alice").unwrap();
        assert!(locks.lock_of("m1").is_none());
        assert!(locks.locks().is_empty());
    }
}
