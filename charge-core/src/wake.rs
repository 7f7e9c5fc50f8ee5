use portable_atomic::{AtomicBool, Ordering};

/// Pending auto-wake event.
///
/// Single producer, single consumer: the timer side only ever stores `true`,
/// the charge loop is the only reader and clears it with [`WakeFlag::take`].
pub struct WakeFlag {
    pending: AtomicBool,
}

impl WakeFlag {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }

    /// Timer side. Safe to call from interrupt context.
    pub fn raise(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Loop side. Returns whether a wakeup was pending and clears it.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for WakeFlag {
    fn default() -> Self {
        Self::new()
    }
}
