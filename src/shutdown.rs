//! Cancellation token coordinating graceful shutdown.
//!
//! The token replaces process-wide signal flags with an explicit handle: any
//! thread (including a signal handler wrapper) may call
//! [`ShutdownToken::request_shutdown`], and the collector's event loop polls
//! [`ShutdownToken::is_requested`] once per iteration. When a poll waker has
//! been attached the request also interrupts a pending readiness wait, so
//! shutdown latency is one loop iteration rather than the next socket event.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;
use mio::Waker;
use parking_lot::Mutex;

/// Shared, clonable termination signal.
///
/// Set-once semantics: the first [`request_shutdown`](Self::request_shutdown)
/// wins and later calls are no-ops. Reading the flag is wait-free and safe
/// from any thread.
#[derive(Clone, Default)]
pub struct ShutdownToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    requested: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl ShutdownToken {
    /// Create a token with shutdown not yet requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent; wakes the attached event loop, if any.
    pub fn request_shutdown(&self) {
        if self.inner.requested.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(waker) = self.inner.waker.lock().as_ref() {
            if let Err(err) = waker.wake() {
                warn!("shutdown: failed to wake event loop: {err}");
            }
        }
    }

    /// Whether shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Attach the collector's poll waker.
    ///
    /// The waker is stored before the flag is re-checked, both under the slot
    /// lock. A request racing this call either locks the slot after the store
    /// and finds the waker, or set the flag first and is seen by the check
    /// here; either way exactly one side delivers the wake.
    pub(crate) fn attach_waker(&self, waker: Waker) {
        let mut slot = self.inner.waker.lock();
        let waker = slot.insert(waker);
        if self.is_requested() {
            if let Err(err) = waker.wake() {
                warn!("shutdown: failed to wake event loop: {err}");
            }
        }
    }
}

impl fmt::Debug for ShutdownToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownToken")
            .field("requested", &self.is_requested())
            .finish()
    }
}
