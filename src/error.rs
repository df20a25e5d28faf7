//! Error types shared across the crate.

use std::io;

use thiserror::Error;

/// Errors raised while constructing a [`Collector`](crate::Collector).
///
/// Construction is the only fatal path in the crate: a collector that cannot
/// bind its socket must not start. Runtime I/O failures inside the event loop
/// are logged and swallowed instead.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid user supplied configuration.
    #[error("invalid collector configuration: {0}")]
    InvalidConfig(String),
    /// Underlying I/O error whilst binding the socket or opening the sink.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors surfaced by [`Emitter::send`](crate::Emitter::send).
///
/// Delivery is at-most-once: every variant means the record was dropped. The
/// emitter has already logged a (rate limited) warning by the time the caller
/// sees the error, so ignoring the result is acceptable for callers that do
/// not track delivery.
#[derive(Debug, Error)]
pub enum EmitError {
    /// The emitter never connected, or tore its connection down after a
    /// failed send.
    #[error("emitter has no active connection")]
    Disconnected,
    /// The emitter closed its socket after a shutdown request.
    #[error("emitter closed after shutdown request")]
    Closed,
    /// The record is larger than the negotiated frame limit.
    #[error("record of {len} bytes exceeds the {max} byte frame limit")]
    FrameTooLarge {
        /// Size of the rejected record.
        len: usize,
        /// Configured maximum frame length.
        max: usize,
    },
    /// The write failed part way; the connection has been torn down.
    #[error(transparent)]
    Io(#[from] io::Error),
}
