use super::{worker::Worker, CancelHandle, Deadline, Job};
use crate::error::{Error, ErrorKind, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use crossbeam::select;
use slog::{debug, info, o, warn, Logger};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A fixed set of worker threads, each owning state built by an initializer.
///
/// Callers borrow an idle worker for the duration of one call. When every
/// worker is busy, callers block until one is returned or their deadline
/// passes; there is no queue and no ordering among waiting callers.
///
/// # Example
///
/// ```
/// use workpool::thread_pool::Pool;
///
/// let pool = Pool::with_init(|| Ok::<_, failure::Error>(0_u64), 2).unwrap();
/// let count = pool
///     .execute_timeout(
///         |count: &mut u64| {
///             *count += 1;
///             Ok::<_, failure::Error>(*count)
///         },
///         1000,
///     )
///     .unwrap();
/// assert_eq!(count, 1);
/// pool.cancel();
/// ```
pub struct Pool<S, T> {
    size: usize,
    available: (Sender<Worker<S, T>>, Receiver<Worker<S, T>>),
    cancel: CancelHandle,
    live: Arc<AtomicUsize>,
    logger: Logger,
}

impl<S, T> Pool<S, T>
where
    S: Send + 'static,
    T: Send + 'static,
{
    /// Allocates room for `size` workers without starting any.
    pub fn new(size: usize) -> Result<Self> {
        Pool::with_logger(size, Logger::root(slog::Discard, o!()))
    }

    pub fn with_logger(size: usize, logger: Logger) -> Result<Self> {
        if size == 0 {
            return Err(Error::from(ErrorKind::InvalidSize(size)));
        }
        Ok(Pool {
            size,
            available: bounded(size),
            cancel: CancelHandle::new(),
            live: Arc::new(AtomicUsize::new(0)),
            logger,
        })
    }

    /// Builds a pool and initializes every worker, or returns the first
    /// initializer error. No worker thread survives a failed construction.
    pub fn with_init<F, E>(init: F, size: usize) -> Result<Self>
    where
        F: FnMut() -> std::result::Result<S, E>,
        E: Into<failure::Error>,
    {
        Pool::with_init_and_logger(init, size, Logger::root(slog::Discard, o!()))
    }

    pub fn with_init_and_logger<F, E>(init: F, size: usize, logger: Logger) -> Result<Self>
    where
        F: FnMut() -> std::result::Result<S, E>,
        E: Into<failure::Error>,
    {
        let mut pool = Pool::with_logger(size, logger)?;
        pool.init(init)?;
        Ok(pool)
    }

    /// Runs `init` once per slot, in order, starting each worker as soon as
    /// its state is ready.
    ///
    /// Stops at the first failure and cancels the pool, which stops the
    /// workers already started.
    pub fn init<F, E>(&mut self, mut init: F) -> Result<()>
    where
        F: FnMut() -> std::result::Result<S, E>,
        E: Into<failure::Error>,
    {
        for id in 0..self.size {
            let mut worker = Worker::new(id, self.cancel.clone(), &self.logger);
            if let Err(err) = worker.init(&mut init, &self.live) {
                warn!(self.logger, "worker initialization failed";
                    "worker" => id,
                    "error" => %err
                );
                self.cancel();
                return Err(err);
            }
            self.checkin(worker);
        }
        info!(self.logger, "pool initialized"; "size" => self.size);
        Ok(())
    }

    /// Runs `work` on an idle worker with no deadline.
    pub fn execute<F, E>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut S) -> std::result::Result<T, E> + Send + 'static,
        E: Into<failure::Error>,
    {
        self.execute_timeout(work, 0)
    }

    /// Runs `work` on an idle worker, giving up after `timeout` milliseconds.
    ///
    /// The deadline covers both waiting for a worker and waiting for `work`.
    /// A `timeout` of zero waits forever.
    pub fn execute_timeout<F, E>(&self, work: F, timeout: u64) -> Result<T>
    where
        F: FnOnce(&mut S) -> std::result::Result<T, E> + Send + 'static,
        E: Into<failure::Error>,
    {
        let deadline = Deadline::after_millis(timeout);
        let worker = self.checkout(deadline)?;
        let job: Job<S, T> = Box::new(move |state: &mut S| work(state).map_err(Into::into));
        let result = worker.execute(job, deadline);
        self.checkin(worker);
        result
    }

    /// Fires the pool's cancellation signal. Safe to call more than once.
    pub fn cancel(&self) {
        if self.cancel.cancel() {
            debug!(self.logger, "pool canceled");
        }
    }

    /// A handle that cancels this pool from anywhere, including from inside a
    /// unit of work.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of workers currently waiting in the pool.
    pub fn idle_workers(&self) -> usize {
        self.available.1.len()
    }

    /// Number of worker threads that have not exited yet.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn checkout(&self, deadline: Deadline) -> Result<Worker<S, T>> {
        let timer = deadline.timer();
        select! {
            recv(self.available.1) -> worker => match worker {
                Ok(worker) if !self.is_canceled() && !worker.is_canceled() => Ok(worker),
                Ok(worker) => {
                    debug!(self.logger, "discarding canceled worker"; "worker" => worker.id());
                    Err(Error::from(ErrorKind::Canceled))
                }
                Err(_) => Err(Error::from(ErrorKind::Canceled)),
            },
            recv(self.cancel.signal()) -> _ => Err(Error::from(ErrorKind::Canceled)),
            recv(timer) -> _ => Err(Error::from(ErrorKind::Timeout)),
        }
    }

    fn checkin(&self, worker: Worker<S, T>) {
        debug_assert!(worker.is_initiated());
        if worker.is_canceled() {
            debug!(self.logger, "dropping canceled worker"; "worker" => worker.id());
            return;
        }
        // capacity equals the number of workers, so this never fills up
        if let Err(err) = self.available.0.try_send(worker) {
            warn!(self.logger, "unable to return worker"; "worker" => err.into_inner().id());
        }
    }
}

// stop every worker when pool is dead
impl<S, T> Drop for Pool<S, T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
