// src/animation/driver.rs
//! Ownership of the shared view and playback index

use std::sync::{Arc, Mutex, MutexGuard};

/// Who is currently moving the marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Playback,
    Export,
}

/// Mutual-exclusion flag shared by the playback controller and the export
/// pipeline. At most one driver holds it at a time.
#[derive(Debug, Clone, Default)]
pub struct DriverLock {
    owner: Arc<Mutex<Option<Driver>>>,
}

impl DriverLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Option<Driver>> {
        self.owner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the lock for `driver`. Succeeds if free or already held by `driver`.
    pub fn try_acquire(&self, driver: Driver) -> bool {
        let mut owner = self.guard();
        match *owner {
            Some(current) if current != driver => false,
            _ => {
                *owner = Some(driver);
                true
            }
        }
    }

    /// Release the lock if `driver` holds it
    pub fn release(&self, driver: Driver) {
        let mut owner = self.guard();
        if *owner == Some(driver) {
            *owner = None;
        }
    }

    pub fn owner(&self) -> Option<Driver> {
        *self.guard()
    }

    pub fn is_held_by(&self, driver: Driver) -> bool {
        self.owner() == Some(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_ownership() {
        let lock = DriverLock::new();
        assert!(lock.try_acquire(Driver::Playback));
        assert!(lock.try_acquire(Driver::Playback));
        assert!(!lock.try_acquire(Driver::Export));

        // releasing on behalf of the wrong driver is ignored
        lock.release(Driver::Export);
        assert_eq!(lock.owner(), Some(Driver::Playback));

        lock.release(Driver::Playback);
        assert!(lock.try_acquire(Driver::Export));
        assert!(lock.is_held_by(Driver::Export));
    }

    #[test]
    fn test_clones_share_state() {
        let lock = DriverLock::new();
        let other = lock.clone();
        assert!(lock.try_acquire(Driver::Export));
        assert!(!other.try_acquire(Driver::Playback));
    }
}
