use failure::{Context, Fail};
use std::fmt::Display;
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Fail)]
pub enum ErrorKind {
    /// an initializer refused to produce worker state
    #[fail(display = "{}", _0)]
    Init(String),

    #[fail(display = "timeout")]
    Timeout,

    #[fail(display = "canceled")]
    Canceled,

    /// the unit of work returned an error
    #[fail(display = "{}", _0)]
    Work(String),

    /// the unit of work panicked, carries the payload text
    #[fail(display = "{}", _0)]
    Panic(String),

    #[fail(display = "pool size must be positive, got {}", _0)]
    InvalidSize(usize),

    #[fail(display = "{}", _0)]
    Io(String),
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.inner.get_context()
    }

    pub fn is_timeout(&self) -> bool {
        *self.kind() == ErrorKind::Timeout
    }

    pub fn is_canceled(&self) -> bool {
        *self.kind() == ErrorKind::Canceled
    }

    pub(crate) fn init(err: failure::Error) -> Self {
        let message = err.to_string();
        Error {
            inner: err.context(ErrorKind::Init(message)),
        }
    }

    pub(crate) fn work(err: failure::Error) -> Self {
        let message = err.to_string();
        Error {
            inner: err.context(ErrorKind::Work(message)),
        }
    }

    // panic payloads are usually &str or String
    pub(crate) fn panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "unknown panic".to_string(),
            },
        };
        Error::from(ErrorKind::Panic(message))
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error {
            inner: Context::new(ErrorKind::Io(err.to_string())),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            inner: Context::new(kind),
        }
    }
}
