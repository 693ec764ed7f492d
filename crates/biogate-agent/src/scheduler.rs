//! Skip-if-busy scheduling.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Admits at most one unit of work at a time.
///
/// A caller that finds the slot taken is turned away rather than queued, and
/// the refusal is counted.
///
/// ```
/// use biogate_agent::SingleFlight;
/// use std::sync::Arc;
///
/// let flight = Arc::new(SingleFlight::new());
/// let guard = flight.try_begin().unwrap();
/// assert!(flight.try_begin().is_none());
/// assert_eq!(flight.dropped(), 1);
///
/// drop(guard);
/// assert!(flight.try_begin().is_some());
/// ```
#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: AtomicBool,
    dropped: AtomicU64,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, or return `None` (and count a drop) if it is held.
    pub fn try_begin(self: &Arc<Self>) -> Option<FlightGuard> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(FlightGuard {
                flight: Arc::clone(self),
            })
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Number of refused attempts so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Holds the [`SingleFlight`] slot until dropped.
#[derive(Debug)]
pub struct FlightGuard {
    flight: Arc<SingleFlight>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flight.busy.store(false, Ordering::Release);
    }
}
