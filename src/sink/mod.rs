//! File sink with pluggable rotation.
//!
//! The sink receives whole batches from the collector's event loop and
//! appends them to the active log file. Rotation is composed in through a
//! [`RotationPolicy`] strategy rather than inherited behaviour, so the write
//! path stays identical whether or not rollover is configured.

mod rotation;

pub use rotation::{DEFAULT_ROTATION_SUFFIX, NoRotation, RotationPolicy, TimestampRotation};

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Destination for flushed batches.
///
/// Implemented by [`FileSink`] for production use; tests substitute in-memory
/// sinks to observe flush boundaries without touching the filesystem.
pub trait BatchSink: Send {
    /// Persist one flushed batch.
    fn write(&mut self, batch: &[u8]) -> io::Result<()>;
}

/// Appends batches to a log file, rolling it over per the configured policy.
///
/// A batch is written verbatim: the batch buffer terminates every record with
/// a separator, so the sink adds nothing. Each write is flushed immediately;
/// the only buffering in the pipeline is the batch buffer upstream.
pub struct FileSink {
    file: File,
    path: PathBuf,
    policy: Box<dyn RotationPolicy>,
}

impl FileSink {
    /// Open the active file in append mode, creating it if absent.
    pub fn open(path: impl Into<PathBuf>, policy: Box<dyn RotationPolicy>) -> io::Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;
        Ok(Self { file, path, policy })
    }

    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BatchSink for FileSink {
    fn write(&mut self, batch: &[u8]) -> io::Result<()> {
        self.policy.before_write(&mut self.file, &self.path)?;
        self.file.write_all(batch)?;
        self.file.flush()
    }
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink").field("path", &self.path).finish()
    }
}

pub(crate) fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
