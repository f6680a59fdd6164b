//! A bounded pool of long-lived worker threads.
//!
//! Every worker owns private state built once by an initializer. Callers run
//! units of work against that state, one at a time per worker, with a per-call
//! timeout, pool-wide cancellation and panics reported as errors.

pub mod error;
pub mod thread_pool;

pub use error::{Error, ErrorKind, Result};
pub use thread_pool::{CancelHandle, Deadline, Pool};
