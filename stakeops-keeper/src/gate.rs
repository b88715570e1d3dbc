//! Re-entrancy gate for batch staking.
//!
//! One gate is shared between the deposit-event handler and the polling
//! loop. A trigger that finds the gate taken is dropped, not queued; the
//! next poll re-evaluates the pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "batch in flight" flag.
#[derive(Debug, Clone, Default)]
pub struct BatchGate {
    busy: Arc<AtomicBool>,
}

impl BatchGate {
    /// Create an open gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the gate, or `None` if a batch is already in flight.
    pub fn try_acquire(&self) -> Option<GateGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard {
                busy: self.busy.clone(),
            })
    }

    /// Whether a batch is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the gate when dropped.
#[derive(Debug)]
pub struct GateGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused() {
        let gate = BatchGate::new();
        let guard = gate.try_acquire();
        assert!(guard.is_some());
        assert!(gate.is_busy());
        assert!(gate.clone().try_acquire().is_none());

        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_some());
    }
}
