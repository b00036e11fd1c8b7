//! Router guards: the non-reentrant in-flight flag and the active-backend
//! restore.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use hearth_core::BackendKind;
use tracing::debug;

use crate::SdkError;

/// Held for the duration of one router operation; released on drop.
#[derive(Debug)]
pub(crate) struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    /// # Errors
    ///
    /// [`SdkError::Busy`] if another operation holds the flag.
    pub fn acquire(flag: &'a AtomicBool) -> Result<Self, SdkError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SdkError::Busy)?;
        Ok(Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Puts the active backend back to its value at construction unless
/// disarmed. Covers both the all-failed path and a dropped future.
#[derive(Debug)]
pub(crate) struct RestoreGuard<'a> {
    active: &'a RwLock<Option<BackendKind>>,
    original: Option<BackendKind>,
    armed: bool,
}

impl<'a> RestoreGuard<'a> {
    pub fn new(active: &'a RwLock<Option<BackendKind>>) -> Self {
        let original = active.read().ok().and_then(|a| *a);
        Self {
            active,
            original,
            armed: true,
        }
    }

    pub fn original(&self) -> Option<BackendKind> {
        self.original
    }

    /// Keeps whatever backend is active now.
    pub fn disarm(mut self) {
        self.armed = false;
    }

    /// Restores immediately, reporting a poisoned lock.
    pub fn restore(mut self) -> Result<(), SdkError> {
        self.armed = false;
        let mut active = self.active.write().map_err(|_| SdkError::StoreFailed)?;
        *active = self.original;
        Ok(())
    }
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut active) = self.active.write() {
            *active = self.original;
        }
        debug!(restored = ?self.original, "active backend restored on drop");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_busy_until_release() {
        let flag = AtomicBool::new(false);
        let guard = InFlightGuard::acquire(&flag).unwrap();
        assert_eq!(InFlightGuard::acquire(&flag).unwrap_err(), SdkError::Busy);
        drop(guard);
        assert!(InFlightGuard::acquire(&flag).is_ok());
    }

    #[test]
    fn restore_guard_reverts_unless_disarmed() {
        let active = RwLock::new(Some(BackendKind::Lnbits));

        let guard = RestoreGuard::new(&active);
        *active.write().unwrap() = Some(BackendKind::Voltage);
        drop(guard);
        assert_eq!(*active.read().unwrap(), Some(BackendKind::Lnbits));

        let guard = RestoreGuard::new(&active);
        *active.write().unwrap() = Some(BackendKind::Breez);
        guard.disarm();
        assert_eq!(*active.read().unwrap(), Some(BackendKind::Breez));

        let guard = RestoreGuard::new(&active);
        assert_eq!(guard.original(), Some(BackendKind::Breez));
        *active.write().unwrap() = None;
        guard.restore().unwrap();
        assert_eq!(*active.read().unwrap(), Some(BackendKind::Breez));
    }
}
