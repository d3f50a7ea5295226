use std::io;
use std::net::AddrParseError;

/// Top-level error type returned by the public `Sender`/`Receiver` API.
///
/// Transient network conditions (timeouts, reordering, duplicate or stale
/// datagrams) are never represented here — the reliability engine absorbs
/// them internally. Only configuration failures and unrecoverable I/O
/// bubble up to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("could not resolve host: {0}")]
    Resolve(String),

    #[error("port {0} already in use")]
    PortInUse(u16),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid socket address: {0}")]
    Addr(#[from] AddrParseError),

    #[error("malformed packet: {0}")]
    Malformed(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
