//! Size-based rotation with timestamped archival naming.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;

use super::open_append;

/// Default strftime suffix appended to archived file names.
pub const DEFAULT_ROTATION_SUFFIX: &str = "%Y-%m-%d.%H%M%S";

/// Strategy deciding when and how the active log file rolls over.
///
/// Consulted before every batch write. Implementations rotate in place by
/// replacing the supplied file handle with a fresh one.
pub trait RotationPolicy: Send {
    /// Rotate if a rollover is due; returns whether rotation occurred.
    fn before_write(&mut self, file: &mut File, path: &Path) -> io::Result<bool>;
}

/// Policy that never rotates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRotation;

impl RotationPolicy for NoRotation {
    fn before_write(&mut self, _file: &mut File, _path: &Path) -> io::Result<bool> {
        Ok(false)
    }
}

/// Rolls the active file over once it reaches a size threshold.
///
/// The check runs before a batch is written, so the active file can exceed
/// `max_bytes` by at most one batch. Archives are named
/// `<base>.<strftime(suffix)>` using local time; a collision at that exact
/// name (two rotations within the suffix granularity) overwrites the earlier
/// archive rather than failing. Archives are never pruned: there is no backup
/// count and disk usage grows with every rotation.
#[derive(Clone, Debug)]
pub struct TimestampRotation {
    max_bytes: u64,
    suffix: String,
}

impl TimestampRotation {
    /// Create a policy rotating at `max_bytes` with the default suffix.
    ///
    /// A threshold of `0` disables rotation entirely.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            suffix: DEFAULT_ROTATION_SUFFIX.to_owned(),
        }
    }

    /// Override the strftime format used for archive suffixes.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Whether the active file has reached the rotation threshold.
    fn should_rotate(&self, file: &File) -> io::Result<bool> {
        if self.max_bytes == 0 {
            return Ok(false);
        }
        Ok(file.metadata()?.len() >= self.max_bytes)
    }

    /// Archive the active file and replace the handle with a fresh one.
    fn rotate(&self, file: &mut File, path: &Path) -> io::Result<()> {
        let archive = self.archive_path(path);
        remove_file_if_exists(&archive)?;
        fs::rename(path, &archive)?;
        // The old handle still points at the renamed file; swapping it out
        // closes it and opens an empty active file at the base path.
        *file = open_append(path)?;
        Ok(())
    }

    fn archive_path(&self, path: &Path) -> PathBuf {
        let suffix = Local::now().format(&self.suffix);
        let mut name = path.as_os_str().to_os_string();
        name.push(format!(".{suffix}"));
        PathBuf::from(name)
    }
}

impl RotationPolicy for TimestampRotation {
    fn before_write(&mut self, file: &mut File, path: &Path) -> io::Result<bool> {
        if !self.should_rotate(file)? {
            return Ok(false);
        }
        self.rotate(file, path)?;
        Ok(true)
    }
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{BatchSink, FileSink};
    use std::fs;
    use tempfile::tempdir;

    /// Suffix with nanosecond precision so consecutive rotations never
    /// collide.
    const UNIQUE_SUFFIX: &str = "%H%M%S%.9f";

    fn archives(dir: &Path, base: &str) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = fs::read_dir(dir)
            .expect("read archive dir")
            .map(|entry| entry.expect("dir entry").path())
            .filter(|path| {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                name.starts_with(base) && name != base
            })
            .collect();
        found.sort();
        found
    }

    #[test]
    fn rotates_once_threshold_is_reached() -> io::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("app.log");
        let policy = TimestampRotation::new(200).with_suffix(UNIQUE_SUFFIX);
        let mut sink = FileSink::open(&path, Box::new(policy))?;
        let batch = vec![b'x'; 149].into_iter().chain([b'\n']).collect::<Vec<_>>();

        // 150 < 200: no rotation before either of the first two writes.
        sink.write(&batch)?;
        sink.write(&batch)?;
        assert!(archives(dir.path(), "app.log").is_empty());
        assert_eq!(fs::metadata(&path)?.len(), 300);

        // 300 >= 200: the third write rotates first, then lands in a fresh
        // file. The archive holds 300 bytes, within the M + B bound.
        sink.write(&batch)?;
        let archived = archives(dir.path(), "app.log");
        assert_eq!(archived.len(), 1);
        assert_eq!(fs::metadata(&archived[0])?.len(), 300);
        assert!(fs::metadata(&archived[0])?.len() <= 200 + batch.len() as u64);
        assert_eq!(fs::metadata(&path)?.len(), batch.len() as u64);
        Ok(())
    }

    #[test]
    fn keeps_every_archive() -> io::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("app.log");
        let policy = TimestampRotation::new(10).with_suffix(UNIQUE_SUFFIX);
        let mut sink = FileSink::open(&path, Box::new(policy))?;

        // Every write after the first exceeds the threshold, so four writes
        // produce three rotations and three retained archives.
        for _ in 0..4 {
            sink.write(b"twenty bytes of data\n")?;
        }
        assert_eq!(archives(dir.path(), "app.log").len(), 3);
        Ok(())
    }

    #[test]
    fn colliding_archive_names_overwrite() -> io::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("app.log");
        // A literal suffix makes every rotation target the same archive name.
        let policy = TimestampRotation::new(4).with_suffix("archived");
        let mut sink = FileSink::open(&path, Box::new(policy))?;

        sink.write(b"first\n")?;
        sink.write(b"second\n")?;
        sink.write(b"third\n")?;

        let archived = archives(dir.path(), "app.log");
        assert_eq!(archived.len(), 1);
        assert_eq!(fs::read_to_string(&archived[0])?, "second\n");
        assert_eq!(fs::read_to_string(&path)?, "third\n");
        Ok(())
    }

    #[test]
    fn zero_threshold_disables_rotation() -> io::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("app.log");
        let policy = TimestampRotation::new(0).with_suffix(UNIQUE_SUFFIX);
        let mut sink = FileSink::open(&path, Box::new(policy))?;
        for _ in 0..8 {
            sink.write(b"some output that would normally trigger rollover\n")?;
        }
        assert!(archives(dir.path(), "app.log").is_empty());
        Ok(())
    }

    #[test]
    fn default_suffix_produces_timestamped_names() -> io::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("app.log");
        let mut sink = FileSink::open(&path, Box::new(TimestampRotation::new(4)))?;
        sink.write(b"first\n")?;
        sink.write(b"second\n")?;

        let archived = archives(dir.path(), "app.log");
        assert_eq!(archived.len(), 1);
        let name = archived[0].file_name().unwrap().to_string_lossy();
        // app.log.YYYY-MM-DD.HHMMSS
        let suffix = name.strip_prefix("app.log.").expect("suffixed name");
        assert_eq!(suffix.len(), "2024-01-31.120000".len());
        Ok(())
    }
}
