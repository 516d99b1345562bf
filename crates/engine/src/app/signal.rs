use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Read side of the terminal "gameplay active" flag.
///
/// Starts `true`. Once the writer ends gameplay it stays `false` for the rest
/// of the session.
#[derive(Debug, Clone)]
pub struct GameplaySignal {
    active: Arc<AtomicBool>,
}

/// The single write side of [`GameplaySignal`], held by the collision
/// collaborator.
#[derive(Debug)]
pub struct GameplaySignalWriter {
    active: Arc<AtomicBool>,
}

pub fn gameplay_signal() -> (GameplaySignalWriter, GameplaySignal) {
    let active = Arc::new(AtomicBool::new(true));
    (
        GameplaySignalWriter {
            active: Arc::clone(&active),
        },
        GameplaySignal { active },
    )
}

impl GameplaySignal {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl GameplaySignalWriter {
    /// Returns `true` only for the call that performed the transition.
    pub fn end_gameplay(&self) -> bool {
        self.active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn reader(&self) -> GameplaySignal {
        GameplaySignal {
            active: Arc::clone(&self.active),
        }
    }
}
