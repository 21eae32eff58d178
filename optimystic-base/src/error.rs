// We want a few things here:
// 1. A way to create a new error with a backtrace
// 2. A way to centralize setting a breakpoint to trap any error in the system fairly soon
//    after it's created (or at least when it's propagated from a library we use back to us)
// 3. Same but for logging / emitting error messages into the tracing/logging system
// 4. A closed, matchable ErrorKind so callers can tell recoverable optimistic-concurrency
//    failures apart from fatal ones (the propagation policy needs this).

use std::borrow::Cow;
use std::fmt;

use backtrace_error::DynBacktraceError;
use tracing::error;

#[cfg(test)]
use test_log::test;

/// Closed set of error kinds. `Other` covers anything raised by a
/// collaborator (serialization, I/O, a handler) that doesn't map onto one
/// of the named kinds below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    NoHandler,
    LogNotFound,
    StaleFailure,
    RedirectLoop,
    Timeout,
    UnknownEngine,
    SchemaMismatch,
    ReExecutionFailed,
    OperationsHashMismatch,
    StaleRead,
    PartialCommit,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    inner: DynBacktraceError,
}
pub type Result<T> = std::result::Result<T, Error>;

struct SimpleErr(Cow<'static, str>);
impl fmt::Debug for SimpleErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl fmt::Display for SimpleErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for SimpleErr {}

impl<E: std::error::Error + Send + Sync + 'static> From<E> for Error {
    fn from(err: E) -> Error {
        Error::new(err)
    }
}

impl Error {
    pub fn new<E: std::error::Error + Send + Sync + 'static>(err: E) -> Error {
        Self::with_kind(ErrorKind::Other, err)
    }

    pub fn with_kind<E: std::error::Error + Send + Sync + 'static>(
        kind: ErrorKind,
        err: E,
    ) -> Error {
        error!(target: "optimystic", kind = %kind, "{:?}", err);
        let inner = DynBacktraceError::from(err);
        Error { kind, inner }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Whether the caller may retry (pull-and-retry / backoff) rather than
    /// surfacing the error to its own caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind, ErrorKind::StaleFailure | ErrorKind::Timeout)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.inner)
    }
}

pub fn err(msg: impl Into<Cow<'static, str>>) -> Error {
    kind_err(ErrorKind::Other, msg)
}

pub fn kind_err(kind: ErrorKind, msg: impl Into<Cow<'static, str>>) -> Error {
    let e = SimpleErr(msg.into());
    Error::with_kind(kind, e)
}

#[test]
fn test_error() {
    let _err = err("test error");
}

#[test]
fn test_error_kind_recoverable() {
    let e = kind_err(ErrorKind::StaleFailure, "stale");
    assert!(e.is_recoverable());
    let e = kind_err(ErrorKind::RedirectLoop, "loop");
    assert!(!e.is_recoverable());
}
