use std::sync::{Arc, Mutex, TryLockError};

use planledger_core::{StoreError, StoreResult};

use crate::store::{Store, StoreSnapshot};

/// Shared, caller-owned handle to one store.
///
/// The mutex serializes plan runs: one closure holds the store at a time.
/// Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct StoreHandle {
    inner: Arc<Mutex<Store>>,
}

impl StoreHandle {
    pub fn new(store: Store) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run `f` with exclusive access, waiting for any active run to finish.
    pub fn with_exclusive<R>(&self, f: impl FnOnce(&mut Store) -> R) -> StoreResult<R> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| StoreError::unavailable("store lock poisoned"))?;
        Ok(f(&mut guard))
    }

    /// Like [`with_exclusive`](Self::with_exclusive) but fails instead of
    /// waiting when another run holds the store.
    pub fn try_with_exclusive<R>(&self, f: impl FnOnce(&mut Store) -> R) -> StoreResult<R> {
        let mut guard = match self.inner.try_lock() {
            Ok(g) => g,
            Err(TryLockError::WouldBlock) => {
                return Err(StoreError::unavailable("another plan run holds the store"));
            }
            Err(TryLockError::Poisoned(_)) => {
                return Err(StoreError::unavailable("store lock poisoned"));
            }
        };
        Ok(f(&mut guard))
    }

    pub fn snapshot(&self) -> StoreResult<StoreSnapshot> {
        self.with_exclusive(|s| s.snapshot())
    }
}
