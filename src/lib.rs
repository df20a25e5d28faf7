//! Batched log collection over a Unix domain socket.
//!
//! Many worker processes hand their formatted log records to an [`Emitter`],
//! which frames each record with a big-endian length prefix and writes it to
//! a shared local socket. A single [`Collector`] thread multiplexes every
//! connection with a readiness-driven event loop, concatenates decoded
//! payloads into a batch buffer, and flushes whole batches to a rotating file
//! sink once a byte threshold is crossed.
//!
//! Delivery is deliberately best-effort: emitters never retry, never queue,
//! and never block on collector capacity beyond OS socket buffering. Failures
//! on either side are logged through the [`log`] facade and the affected
//! record is dropped.
//!
//! ```ignore
//! let mut collector = Collector::builder()
//!     .with_socket_path("/tmp/socket")
//!     .with_file_path("/var/log/workers.log")
//!     .with_rotation(100_000)
//!     .build()?;
//!
//! // In each worker process:
//! let mut emitter = Emitter::connect("/tmp/socket");
//! emitter.send("2024-01-31 12:00:00 - worker - [INFO]: started")?;
//!
//! // On shutdown the collector drains whatever is still buffered.
//! collector.stop();
//! ```

mod collector;
mod emitter;
mod error;
pub mod frame;
mod rate_limited_warner;
mod shutdown;
pub mod sink;

pub use collector::{Collector, CollectorBuilder, DEFAULT_BATCH_CAPACITY, DEFAULT_SOCKET_PATH};
pub use emitter::{DEFAULT_SEND_TIMEOUT, Emitter, EmitterConfig};
pub use error::{BuildError, EmitError};
pub use shutdown::ShutdownToken;
pub use sink::{BatchSink, FileSink, NoRotation, RotationPolicy, TimestampRotation};
