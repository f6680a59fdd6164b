use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};

/// Single-fire shutdown broadcast shared by a pool and its workers.
///
/// Nothing is ever sent on the channel. Firing drops the only [`Sender`], after
/// which every clone of the receiver reports disconnection, so `recv` arms in a
/// `select!` become ready for all observers at once.
#[derive(Clone)]
pub struct CancelHandle {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (sender, signal) = bounded(0);
        CancelHandle {
            trigger: Arc::new(Mutex::new(Some(sender))),
            signal,
        }
    }

    /// Fires the signal. Calling it again does nothing.
    pub fn cancel(&self) -> bool {
        let mut trigger = match self.trigger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        trigger.take().is_some()
    }

    pub fn is_canceled(&self) -> bool {
        match self.signal.try_recv() {
            Err(TryRecvError::Disconnected) => true,
            _ => false,
        }
    }

    pub(crate) fn signal(&self) -> &Receiver<()> {
        &self.signal
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        CancelHandle::new()
    }
}
