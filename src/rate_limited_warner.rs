//! Rate limiting for dropped-record warnings.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default interval between dropped-record warnings.
pub const DEFAULT_WARN_INTERVAL: Duration = Duration::from_secs(5);

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Helper that rate limits dropped-record warnings.
///
/// The caller increments the drop counter via [`record_drop`]. The next call
/// to [`warn_if_due`] emits a warning through the provided callback if the
/// configured interval has elapsed, reporting how many records were dropped
/// since the previous emission.
///
/// [`record_drop`]: Self::record_drop
/// [`warn_if_due`]: Self::warn_if_due
pub(crate) struct RateLimitedWarner {
    interval_secs: u64,
    last_warn: AtomicU64,
    dropped: AtomicU64,
}

impl RateLimitedWarner {
    /// Create a warner. The first warning can be emitted immediately.
    pub(crate) fn new(interval: Duration) -> Self {
        let interval_secs = interval.as_secs();
        Self {
            interval_secs,
            last_warn: AtomicU64::new(now_secs().saturating_sub(interval_secs)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Increment the dropped-record counter.
    pub(crate) fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Emit a warning if the rate limit interval has elapsed.
    pub(crate) fn warn_if_due(&self, mut warn: impl FnMut(u64)) {
        let now = now_secs();
        let prev = self.last_warn.load(Ordering::Relaxed);
        if now.saturating_sub(prev) >= self.interval_secs {
            let count = self.dropped.swap(0, Ordering::Relaxed);
            if count > 0 {
                warn(count);
            }
            self.last_warn.store(now, Ordering::Relaxed);
        }
    }
}

impl Default for RateLimitedWarner {
    fn default() -> Self {
        Self::new(DEFAULT_WARN_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_first_warning_immediately() {
        let warner = RateLimitedWarner::default();
        let mut warnings = Vec::new();
        warner.record_drop();
        warner.warn_if_due(|count| warnings.push(count));
        assert_eq!(warnings, vec![1]);
    }

    #[test]
    fn rate_limits_subsequent_warnings() {
        let warner = RateLimitedWarner::default();
        let mut warnings = Vec::new();
        warner.record_drop();
        warner.warn_if_due(|count| warnings.push(count));
        warner.record_drop();
        warner.warn_if_due(|count| warnings.push(count));
        assert_eq!(warnings, vec![1]);
    }

    #[test]
    fn zero_interval_reports_every_drop() {
        let warner = RateLimitedWarner::new(Duration::ZERO);
        let mut warnings = Vec::new();
        for _ in 0..3 {
            warner.record_drop();
            warner.warn_if_due(|count| warnings.push(count));
        }
        assert_eq!(warnings, vec![1, 1, 1]);
    }
}
