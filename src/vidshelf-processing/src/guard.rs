//! Per-item generation guard
//!
//! Membership set of catalog indexes that have a thumbnail job in flight.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
pub struct GenerationGuard {
    in_flight: Mutex<HashSet<usize>>,
}

impl GenerationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as in flight. Returns false if it already was.
    pub fn try_acquire(&self, key: usize) -> bool {
        let acquired = self.set().insert(key);
        debug!("guard acquire for item {}: {}", key, acquired);
        acquired
    }

    /// Clear the marker for `key`; a no-op when it is not held
    pub fn release(&self, key: usize) {
        if self.set().remove(&key) {
            debug!("guard released for item {}", key);
        }
    }

    pub fn is_held(&self, key: usize) -> bool {
        self.set().contains(&key)
    }

    /// Keys currently held, for logging
    pub fn held(&self) -> Vec<usize> {
        let mut keys: Vec<usize> = self.set().iter().copied().collect();
        keys.sort_unstable();
        keys
    }

    // A poisoned set only means another holder panicked mid-insert or
    // mid-remove; the set itself is still consistent.
    fn set(&self) -> MutexGuard<'_, HashSet<usize>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_acquire_release_cycle() {
        let guard = GenerationGuard::new();
        assert!(guard.try_acquire(3));
        assert!(!guard.try_acquire(3));
        assert!(guard.try_acquire(4));
        assert_eq!(guard.held(), vec![3, 4]);

        guard.release(3);
        guard.release(3);
        assert!(!guard.is_held(3));
        assert!(guard.try_acquire(3));
    }

    #[test]
    fn test_concurrent_acquire_single_winner() {
        let guard = Arc::new(GenerationGuard::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = guard.clone();
                std::thread::spawn(move || guard.try_acquire(7))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
