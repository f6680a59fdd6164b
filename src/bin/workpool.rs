use clap::{crate_authors, crate_version, Clap};
use crossbeam::channel::unbounded;
use slog::{error, info, o, warn, Drain, Logger};
use std::{fmt, process::exit, thread, time::Duration};
use workpool::{ErrorKind, Pool};

/// Drives a pool with sleeping tasks and reports how they ended.
#[derive(Clap)]
#[clap(version = crate_version!(), author = crate_authors!())]
struct Options {
    /// number of workers
    #[clap(long, short, default_value = "4")]
    size: usize,

    /// number of tasks submitted at once
    #[clap(long, default_value = "16")]
    tasks: usize,

    /// per task timeout in milliseconds, 0 waits forever
    #[clap(long, default_value = "0")]
    timeout: u64,

    /// how long each task sleeps
    #[clap(long, default_value = "10")]
    work_ms: u64,

    /// every nth task panics, 0 never
    #[clap(long, default_value = "0")]
    panic_every: usize,

    /// cancel the pool after this many milliseconds
    #[clap(long)]
    cancel_after: Option<u64>,
}

#[derive(Default)]
struct Summary {
    ok: usize,
    timeout: usize,
    canceled: usize,
    failed: usize,
}

impl Summary {
    fn record(&mut self, outcome: Result<u64, ErrorKind>) {
        match outcome {
            Ok(_) => self.ok += 1,
            Err(ErrorKind::Timeout) => self.timeout += 1,
            Err(ErrorKind::Canceled) => self.canceled += 1,
            Err(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ok={} timeout={} canceled={} failed={}",
            self.ok, self.timeout, self.canceled, self.failed
        )
    }
}

fn main() {
    let logger = logger();
    let options = Options::parse();

    let res = run(&options, &logger);
    if let Err(e) = res {
        error!(&logger, "{}", e);
        // flush the async drain before leaving
        drop(logger);
        exit(1);
    }
}

fn logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, o!())
}

fn run(options: &Options, logger: &Logger) -> workpool::Result<()> {
    info!(logger, "workpool starting";
        "version" => crate_version!(),
        "size" => options.size,
        "tasks" => options.tasks,
        "timeout" => options.timeout
    );

    let pool = Pool::with_init_and_logger(
        || Ok::<_, failure::Error>(0_u64),
        options.size,
        logger.new(o!("component" => "pool")),
    )?;

    let (sender, receiver) = unbounded();
    let work = Duration::from_millis(options.work_ms);
    let panic_every = options.panic_every;
    let timeout = options.timeout;

    if let Some(millis) = options.cancel_after {
        let cancel = pool.cancel_handle();
        let logger = logger.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(millis));
            if cancel.cancel() {
                warn!(logger, "pool canceled"; "after_ms" => millis);
            }
        });
    }

    let submitted = crossbeam::scope(|scope| {
        for task in 1..=options.tasks {
            let pool = &pool;
            let sender = sender.clone();
            scope.spawn(move |_| {
                let outcome = pool.execute_timeout(
                    move |handled: &mut u64| {
                        thread::sleep(work);
                        if panic_every > 0 && task % panic_every == 0 {
                            panic!("task {} panicked", task);
                        }
                        *handled += 1;
                        Ok::<_, failure::Error>(*handled)
                    },
                    timeout,
                );
                // receiver outlives the scope
                let _ = sender.send(outcome.map_err(|e| e.kind().clone()));
            });
        }
    });
    drop(sender);
    if submitted.is_err() {
        error!(logger, "a submitting thread panicked");
    }

    let mut summary = Summary::default();
    for outcome in receiver {
        summary.record(outcome);
    }
    pool.cancel();

    info!(logger, "workpool finished";
        "ok" => summary.ok,
        "timeout" => summary.timeout,
        "canceled" => summary.canceled,
        "failed" => summary.failed
    );
    println!("{}", summary);
    Ok(())
}
