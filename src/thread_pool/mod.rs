use crossbeam::channel::{at, never, Receiver};
use std::time::{Duration, Instant};

mod cancel;
mod pool;
mod worker;
pub use cancel::CancelHandle;
pub use pool::Pool;

/// A unit of work bound to a worker's private state.
///
/// It runs on the worker thread, so it must be sendable and own everything it
/// touches besides the state.
pub type Job<S, T> = Box<dyn FnOnce(&mut S) -> Result<T, failure::Error> + Send + 'static>;

/// Point in time after which a caller stops waiting. `None` waits forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn never() -> Self {
        Deadline(None)
    }

    pub fn at(instant: Instant) -> Self {
        Deadline(Some(instant))
    }

    /// Zero millis means no deadline at all.
    pub fn after_millis(millis: u64) -> Self {
        if millis == 0 {
            return Deadline::never();
        }
        Deadline::at(Instant::now() + Duration::from_millis(millis))
    }

    pub fn is_expired(&self) -> bool {
        match self.0 {
            Some(instant) => Instant::now() >= instant,
            None => false,
        }
    }

    // `at` fires exactly once, so each wait builds its own timer
    fn timer(&self) -> Receiver<Instant> {
        match self.0 {
            Some(instant) => at(instant),
            None => never(),
        }
    }
}
