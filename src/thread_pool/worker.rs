use super::{CancelHandle, Deadline, Job};
use crate::error::{Error, ErrorKind, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use crossbeam::select;
use slog::{debug, o, trace, Logger};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Caller-side handle of one worker thread.
///
/// The pool never hands the same worker to two callers, so at most one job is
/// in flight per worker and the state owned by its thread needs no locking.
pub struct Worker<S, T> {
    id: usize,
    input: Sender<Job<S, T>>,
    output: Receiver<T>,
    failure: Receiver<Error>,
    // single slot, a timed out caller leaves a mark even if nobody reads it yet
    timed_out: Sender<()>,
    cancel: CancelHandle,
    canceled: Arc<AtomicBool>,
    initiated: bool,
    // thread side of the channels, moved out once the worker starts
    runner: Option<Runner<S, T>>,
    logger: Logger,
}

struct Runner<S, T> {
    input: Receiver<Job<S, T>>,
    output: Sender<T>,
    failure: Sender<Error>,
    timed_out: Receiver<()>,
    cancel: CancelHandle,
    canceled: Arc<AtomicBool>,
    logger: Logger,
}

// counts running worker threads, decremented however the thread ends
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        LiveGuard(live)
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<S, T> Worker<S, T>
where
    S: Send + 'static,
    T: Send + 'static,
{
    pub fn new(id: usize, cancel: CancelHandle, logger: &Logger) -> Self {
        let (input_sender, input_receiver) = bounded(0);
        let (output_sender, output_receiver) = bounded(0);
        let (failure_sender, failure_receiver) = bounded(0);
        let (timed_out_sender, timed_out_receiver) = bounded(1);
        let canceled = Arc::new(AtomicBool::new(false));
        let logger = logger.new(o!("worker" => id));

        let runner = Runner {
            input: input_receiver,
            output: output_sender,
            failure: failure_sender,
            timed_out: timed_out_receiver,
            cancel: cancel.clone(),
            canceled: canceled.clone(),
            logger: logger.clone(),
        };

        Worker {
            id,
            input: input_sender,
            output: output_receiver,
            failure: failure_receiver,
            timed_out: timed_out_sender,
            cancel,
            canceled,
            initiated: false,
            runner: Some(runner),
            logger,
        }
    }

    /// Builds the private state and starts the worker thread.
    ///
    /// `live` counts running worker threads; it is bumped before the thread
    /// starts and released when the run loop returns.
    pub fn init<F, E>(&mut self, init: F, live: &Arc<AtomicUsize>) -> Result<()>
    where
        F: FnOnce() -> std::result::Result<S, E>,
        E: Into<failure::Error>,
    {
        let runner = match self.runner.take() {
            Some(runner) => runner,
            None => panic!("worker {} cannot be initiated twice", self.id),
        };
        let state = init().map_err(|err| Error::init(err.into()))?;

        let guard = LiveGuard::new(live.clone());
        thread::Builder::new()
            .name(format!("workpool-worker-{}", self.id))
            .spawn(move || {
                let _guard = guard;
                runner.run(state);
            })?;

        self.initiated = true;
        trace!(self.logger, "worker initiated");
        Ok(())
    }

    /// Runs `job` on the worker thread and waits for its outcome, the pool's
    /// cancellation, or `deadline`, whichever comes first.
    ///
    /// On timeout the job keeps running; its outcome is dropped by the worker
    /// thread once it finishes.
    ///
    /// # Panics
    ///
    /// Panics if the worker was never initiated.
    pub fn execute(&self, job: Job<S, T>, deadline: Deadline) -> Result<T> {
        assert!(self.initiated, "worker {} was not initiated", self.id);
        let timer = deadline.timer();

        select! {
            send(self.input, job) -> sent => {
                if sent.is_err() {
                    return Err(self.mark_canceled());
                }
            },
            recv(self.cancel.signal()) -> _ => return Err(self.mark_canceled()),
            recv(timer) -> _ => return Err(Error::from(ErrorKind::Timeout)),
        }

        select! {
            recv(self.output) -> value => match value {
                Ok(value) => Ok(value),
                Err(_) => Err(self.mark_canceled()),
            },
            recv(self.failure) -> err => match err {
                Ok(err) => Err(err),
                Err(_) => Err(self.mark_canceled()),
            },
            recv(self.cancel.signal()) -> _ => Err(self.mark_canceled()),
            recv(timer) -> _ => {
                // full only if a previous mark was never consumed, same meaning
                let _ = self.timed_out.try_send(());
                debug!(self.logger, "job timed out");
                Err(Error::from(ErrorKind::Timeout))
            },
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_initiated(&self) -> bool {
        self.initiated
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    fn mark_canceled(&self) -> Error {
        self.canceled.store(true, Ordering::Release);
        Error::from(ErrorKind::Canceled)
    }
}

impl<S, T> Runner<S, T> {
    fn run(self, mut state: S) {
        debug!(self.logger, "worker started");
        loop {
            select! {
                recv(self.cancel.signal()) -> _ => {
                    self.canceled.store(true, Ordering::Release);
                },
                recv(self.input) -> job => match job {
                    Ok(job) => self.process(job, &mut state),
                    // handle dropped
                    Err(_) => break,
                },
            }
            if self.canceled.load(Ordering::Acquire) {
                break;
            }
        }
        debug!(self.logger, "worker stopped");
    }

    fn process(&self, job: Job<S, T>, state: &mut S) {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| job(state))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(Error::work(err)),
            Err(payload) => Err(Error::panic(payload)),
        };

        // the caller already gave up, nobody will ever read this outcome
        if self.timed_out.try_recv().is_ok() {
            debug!(self.logger, "discarding stale outcome");
            return;
        }

        // the caller may still give up while we wait for it to take the outcome
        let delivered = match outcome {
            Ok(value) => select! {
                send(self.output, value) -> sent => sent.is_ok(),
                recv(self.timed_out) -> _ => false,
                recv(self.cancel.signal()) -> _ => {
                    self.canceled.store(true, Ordering::Release);
                    false
                },
            },
            Err(err) => select! {
                send(self.failure, err) -> sent => sent.is_ok(),
                recv(self.timed_out) -> _ => false,
                recv(self.cancel.signal()) -> _ => {
                    self.canceled.store(true, Ordering::Release);
                    false
                },
            },
        };

        if !delivered {
            debug!(self.logger, "discarding stale outcome");
        }
    }
}
