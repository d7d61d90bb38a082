use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::sync_ext::CondvarExt;

/// Cooperative cancellation flag checked at every segment and stage boundary
/// (spec.md §4.5). Cheap to clone and share across the runner and the
/// queue's pause/cancel handlers.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cooperative pause gate checked alongside `CancelToken` at the same
/// boundaries. Queue operations (C6) flip this; the runner blocks on it
/// between segments rather than mid-segment.
#[derive(Clone)]
pub struct PauseGate(Arc<(Mutex<bool>, Condvar)>);

impl PauseGate {
    pub fn new() -> Self {
        PauseGate(Arc::new((Mutex::new(false), Condvar::new())))
    }

    pub fn pause(&self) {
        let (lock, cv) = &*self.0;
        *lock.lock().unwrap_or_else(|e| e.into_inner()) = true;
        cv.notify_all();
    }

    pub fn resume(&self) {
        let (lock, cv) = &*self.0;
        *lock.lock().unwrap_or_else(|e| e.into_inner()) = false;
        cv.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        let (lock, _) = &*self.0;
        *lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Blocks until resumed or `cancel` latches `cancelled`. Returns `true`
    /// if the wait ended because of a cancel rather than a resume.
    pub fn wait_while_paused(&self, cancel: &CancelToken) -> bool {
        let (lock, cv) = &*self.0;
        let guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = cv.wait_while_unpoisoned(guard, |paused| *paused && !cancel.is_cancelled());
        cancel.is_cancelled()
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled_and_latches_once_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn clone_shares_the_same_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn pause_gate_wait_returns_immediately_when_not_paused() {
        let gate = PauseGate::new();
        let cancel = CancelToken::new();
        assert!(!gate.wait_while_paused(&cancel));
    }

    #[test]
    fn pause_gate_wait_unblocks_on_cancel() {
        let gate = PauseGate::new();
        let cancel = CancelToken::new();
        gate.pause();
        cancel.cancel();
        assert!(gate.wait_while_paused(&cancel));
    }

    #[test]
    fn pause_gate_resume_clears_paused_state() {
        let gate = PauseGate::new();
        gate.pause();
        assert!(gate.is_paused());
        gate.resume();
        assert!(!gate.is_paused());
    }
}
