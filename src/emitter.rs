//! Client-side emitter forwarding formatted records to the collector.
//!
//! One emitter per logging call site, each owning a single persistent
//! connection. Delivery is best-effort and at-most-once: a failed connect
//! leaves the emitter inert, a failed send drops the record and tears the
//! connection down, and nothing is ever retried or queued. Record formatting
//! (timestamp, level, logger name) happens upstream; the emitter treats each
//! record as an opaque payload.

use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};

use crate::error::EmitError;
use crate::frame::{self, DEFAULT_MAX_FRAME_LEN};
use crate::rate_limited_warner::RateLimitedWarner;
use crate::shutdown::ShutdownToken;

/// Default timeout applied to emitter writes.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration consumed by [`Emitter::with_config`].
#[derive(Clone, Debug)]
pub struct EmitterConfig {
    /// Socket path of the collector.
    pub socket_path: PathBuf,
    /// Write timeout for each send.
    pub send_timeout: Duration,
    /// Largest payload the emitter will frame.
    pub max_frame_len: usize,
    /// Optional termination signal; once set, the next send closes the
    /// socket instead of writing.
    pub shutdown: Option<ShutdownToken>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(crate::collector::DEFAULT_SOCKET_PATH),
            send_timeout: DEFAULT_SEND_TIMEOUT,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            shutdown: None,
        }
    }
}

/// Per-process client that frames records and writes them to the socket.
pub struct Emitter {
    stream: Option<UnixStream>,
    max_frame_len: usize,
    shutdown: Option<ShutdownToken>,
    warner: RateLimitedWarner,
}

impl Emitter {
    /// Connect to the collector at `path` with default configuration.
    ///
    /// Construction never fails: when no listener is present the failure is
    /// logged as a warning and the emitter stays in a disconnected, inert
    /// state in which every send drops its record.
    pub fn connect(path: impl AsRef<Path>) -> Self {
        Self::with_config(EmitterConfig {
            socket_path: path.as_ref().to_path_buf(),
            ..EmitterConfig::default()
        })
    }

    /// Connect using an explicit configuration.
    pub fn with_config(config: EmitterConfig) -> Self {
        let stream = match UnixStream::connect(&config.socket_path) {
            Ok(stream) => {
                if let Err(err) = stream.set_write_timeout(Some(config.send_timeout)) {
                    warn!("emitter: failed to set write timeout: {err}");
                }
                info!("emitter: connected to {}", config.socket_path.display());
                Some(stream)
            }
            Err(err) => {
                warn!(
                    "emitter: failed to connect to {}: {err}",
                    config.socket_path.display()
                );
                None
            }
        };
        Self {
            stream,
            max_frame_len: config.max_frame_len,
            shutdown: config.shutdown,
            warner: RateLimitedWarner::default(),
        }
    }

    /// Whether the emitter currently holds a connection.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Frame an already-formatted record and write it to the collector.
    pub fn send(&mut self, record: &str) -> Result<(), EmitError> {
        self.send_bytes(record.as_bytes())
    }

    /// Frame an opaque payload and write it to the collector.
    ///
    /// The write blocks until complete or the send timeout elapses. On any
    /// failure the record is dropped, a rate limited warning is logged, and
    /// the connection is torn down; later sends report
    /// [`EmitError::Disconnected`].
    pub fn send_bytes(&mut self, payload: &[u8]) -> Result<(), EmitError> {
        if let Some(token) = &self.shutdown {
            if token.is_requested() {
                if self.stream.take().is_some() {
                    info!("emitter: closing connection after shutdown request");
                }
                return Err(EmitError::Closed);
            }
        }
        let Some(stream) = self.stream.as_mut() else {
            self.warner.record_drop();
            self.warner.warn_if_due(|count| {
                warn!("emitter: no active connection; dropped {count} records");
            });
            return Err(EmitError::Disconnected);
        };
        let Some(framed) = frame::encode(payload, self.max_frame_len) else {
            warn!(
                "emitter: record of {} bytes exceeds the {} byte frame limit; dropped",
                payload.len(),
                self.max_frame_len
            );
            return Err(EmitError::FrameTooLarge {
                len: payload.len(),
                max: self.max_frame_len,
            });
        };
        let result = stream.write_all(&framed);
        if let Err(err) = result {
            warn!("emitter: send failed: {err}");
            self.stream = None;
            self.warner.record_drop();
            self.warner.warn_if_due(|count| {
                warn!("emitter: dropped {count} records due to send failures");
            });
            return Err(EmitError::Io(err));
        }
        Ok(())
    }

    /// Close the connection. Idempotent; later sends drop their records.
    pub fn close(&mut self) {
        self.stream = None;
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("connected", &self.is_connected())
            .field("max_frame_len", &self.max_frame_len)
            .finish()
    }
}
