//! The single in-flight turn and its cancellation handle.

use std::sync::{Arc, Mutex, MutexGuard};

use agent_provider::CancelSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a turn is already in flight")]
pub struct TurnBusy;

/// Shared slot holding the cancellation handle of the active turn.
///
/// The controller fills it for the duration of a turn; the interrupt
/// listener takes the handle out to cancel.
#[derive(Debug, Clone, Default)]
pub struct TurnSlot {
    active: Arc<Mutex<Option<CancelSignal>>>,
}

impl TurnSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a turn; the slot is cleared again when the returned guard drops.
    pub fn begin(&self) -> Result<ActiveTurn, TurnBusy> {
        let mut active = lock_unpoisoned(&self.active);
        if active.is_some() {
            return Err(TurnBusy);
        }
        let signal = CancelSignal::new();
        *active = Some(signal.clone());
        Ok(ActiveTurn {
            slot: Arc::clone(&self.active),
            signal,
        })
    }

    /// Cancels the active turn, if any, and empties the slot.
    pub fn cancel_active(&self) -> bool {
        match lock_unpoisoned(&self.active).take() {
            Some(signal) => {
                signal.cancel();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        lock_unpoisoned(&self.active).is_some()
    }
}

#[derive(Debug)]
pub struct ActiveTurn {
    slot: Arc<Mutex<Option<CancelSignal>>>,
    signal: CancelSignal,
}

impl ActiveTurn {
    #[must_use]
    pub fn signal(&self) -> &CancelSignal {
        &self.signal
    }
}

impl Drop for ActiveTurn {
    fn drop(&mut self) {
        *lock_unpoisoned(&self.slot) = None;
    }
}

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
