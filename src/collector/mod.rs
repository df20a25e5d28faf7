//! Collector owning the listening socket and its event-loop thread.
//!
//! The collector is the server half of the pipeline: it binds a Unix domain
//! socket, spawns the reactor on a dedicated thread, and hands callers a
//! handle that can stop it. Everything the loop touches (connections, batch
//! buffer, sink) lives on that thread; the handle communicates with it only
//! through the shutdown token.

mod batch;
mod reactor;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use log::info;
use mio::net::UnixListener;
use mio::{Interest, Poll, Waker};
use parking_lot::Mutex;

use crate::error::BuildError;
use crate::frame::DEFAULT_MAX_FRAME_LEN;
use crate::shutdown::ShutdownToken;
use crate::sink::{BatchSink, FileSink, NoRotation, RotationPolicy, TimestampRotation};
use self::reactor::{LISTENER, Reactor, WAKER};

/// Default Unix domain socket path shared by collector and emitters.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/socket";
/// Default batch threshold in payload bytes.
pub const DEFAULT_BATCH_CAPACITY: usize = 20_000;

/// Builder validating collector configuration before start-up.
#[derive(Clone, Debug)]
pub struct CollectorBuilder {
    socket_path: PathBuf,
    file_path: Option<PathBuf>,
    batch_capacity: usize,
    max_frame_len: usize,
    max_bytes: u64,
    rotation_suffix: Option<String>,
    shutdown: Option<ShutdownToken>,
}

impl Default for CollectorBuilder {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            file_path: None,
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            max_bytes: 0,
            rotation_suffix: None,
            shutdown: None,
        }
    }
}

impl CollectorBuilder {
    /// Create a builder with default configuration and no log file set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the socket path the collector binds.
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Set the active log file path. Required unless a custom sink is
    /// supplied via [`build_with_sink`](Self::build_with_sink).
    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Set the batch threshold in payload bytes.
    pub fn with_batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = capacity;
        self
    }

    /// Set the maximum accepted frame payload length.
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Enable size-based rotation at `max_bytes`. Zero disables rotation.
    pub fn with_rotation(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Override the strftime suffix used when naming archived files.
    pub fn with_rotation_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.rotation_suffix = Some(suffix.into());
        self
    }

    /// Supply an externally owned shutdown token.
    ///
    /// Useful when one token, set from a signal handler, should stop the
    /// collector and any in-process emitters together. When omitted the
    /// collector creates its own.
    pub fn with_shutdown(mut self, token: ShutdownToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    fn validate(&self) -> Result<(), BuildError> {
        if self.batch_capacity == 0 {
            return Err(BuildError::InvalidConfig(
                "batch_capacity must be greater than zero".into(),
            ));
        }
        if self.max_frame_len == 0 {
            return Err(BuildError::InvalidConfig(
                "max_frame_len must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Build a collector writing to the configured log file.
    pub fn build(self) -> Result<Collector, BuildError> {
        self.validate()?;
        let Some(file_path) = self.file_path.clone() else {
            return Err(BuildError::InvalidConfig(
                "collector requires a log file path".into(),
            ));
        };
        let policy: Box<dyn RotationPolicy> = if self.max_bytes == 0 {
            Box::new(NoRotation)
        } else {
            let mut rotation = TimestampRotation::new(self.max_bytes);
            if let Some(suffix) = &self.rotation_suffix {
                rotation = rotation.with_suffix(suffix.clone());
            }
            Box::new(rotation)
        };
        let sink = FileSink::open(file_path, policy)?;
        self.start(Box::new(sink))
    }

    /// Build a collector writing flushed batches to the supplied sink.
    pub fn build_with_sink(self, sink: Box<dyn BatchSink>) -> Result<Collector, BuildError> {
        self.validate()?;
        self.start(sink)
    }

    fn start(self, sink: Box<dyn BatchSink>) -> Result<Collector, BuildError> {
        remove_stale_socket(&self.socket_path)?;
        let poll = Poll::new()?;
        let mut listener = UnixListener::bind(&self.socket_path)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let shutdown = self.shutdown.unwrap_or_default();
        shutdown.attach_waker(Waker::new(poll.registry(), WAKER)?);
        info!("collector: listening on {}", self.socket_path.display());

        let reactor = Reactor::new(
            poll,
            listener,
            self.batch_capacity,
            self.max_frame_len,
            sink,
            shutdown.clone(),
        );
        let thread = thread::Builder::new()
            .name("socklog-collector".into())
            .spawn(move || reactor.run())?;
        Ok(Collector {
            thread: Mutex::new(Some(thread)),
            shutdown,
            socket_path: self.socket_path,
        })
    }
}

/// Handle to a running collector.
///
/// Stopping is graceful: the event loop finishes the events it has already
/// picked up, flushes any sub-threshold remainder of the batch buffer, closes
/// every connection, and exits. Records still unread in socket buffers at
/// that point are lost, which is within the at-most-once contract.
pub struct Collector {
    thread: Mutex<Option<JoinHandle<()>>>,
    shutdown: ShutdownToken,
    socket_path: PathBuf,
}

impl Collector {
    /// Start configuring a collector.
    pub fn builder() -> CollectorBuilder {
        CollectorBuilder::new()
    }

    /// Clone of the shutdown token driving this collector.
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// Path of the bound socket file.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Request shutdown and wait for the event loop to drain and exit.
    ///
    /// Idempotent; only the first call performs work.
    pub fn stop(&mut self) {
        self.shutdown.request_shutdown();
        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        if handle.join().is_err() {
            log::warn!("collector: event loop thread panicked");
        }
        if let Err(err) = remove_stale_socket(&self.socket_path) {
            log::warn!("collector: failed to remove socket file: {err}");
        }
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("socket_path", &self.socket_path)
            .field("shutdown", &self.shutdown)
            .finish()
    }
}

fn remove_stale_socket(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
