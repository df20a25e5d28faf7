//! Single-threaded readiness-driven event loop.
//!
//! One dedicated thread owns the listening socket, every accepted connection,
//! the batch buffer, and the sink. All mutation happens here, so none of that
//! state needs locking; the only concurrent touch point is the shutdown
//! token. Each registered descriptor maps to a dispatch arm: the listener
//! token accepts, connection tokens read frames, and the waker token exists
//! purely to interrupt the poll when shutdown is requested.

use std::collections::HashMap;
use std::io;

use log::{info, warn};
use mio::net::{UnixListener, UnixStream};
use mio::{Events, Interest, Poll, Token};

use super::batch::BatchBuffer;
use crate::frame::{FrameReadError, read_frame};
use crate::shutdown::ShutdownToken;
use crate::sink::BatchSink;

pub(crate) const LISTENER: Token = Token(0);
pub(crate) const WAKER: Token = Token(1);
const FIRST_CONNECTION: usize = 2;
const EVENT_CAPACITY: usize = 128;

pub(crate) struct Reactor {
    poll: Poll,
    /// `None` once the listener has been deregistered during shutdown.
    listener: Option<UnixListener>,
    connections: HashMap<Token, UnixStream>,
    next_token: usize,
    batch: BatchBuffer,
    sink: Box<dyn BatchSink>,
    shutdown: ShutdownToken,
    max_frame_len: usize,
}

impl Reactor {
    pub(crate) fn new(
        poll: Poll,
        listener: UnixListener,
        batch_capacity: usize,
        max_frame_len: usize,
        sink: Box<dyn BatchSink>,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            poll,
            listener: Some(listener),
            connections: HashMap::new(),
            next_token: FIRST_CONNECTION,
            batch: BatchBuffer::new(batch_capacity),
            sink,
            shutdown,
            max_frame_len,
        }
    }

    /// Drive the loop until shutdown is requested.
    ///
    /// The readiness wait is unbounded; a wake arrives either from socket
    /// activity or from the shutdown token's waker. The shutdown flag is
    /// checked once per iteration after all ready events have been handled.
    /// Every exit path drains, so buffered bytes reach the sink even when
    /// the loop stops because the readiness wait itself failed.
    pub(crate) fn run(mut self) {
        let mut events = Events::with_capacity(EVENT_CAPACITY);
        loop {
            if let Err(err) = self.poll.poll(&mut events, None) {
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                warn!("collector: readiness wait failed: {err}");
                break;
            }
            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_ready(),
                    WAKER => {}
                    token => self.read_ready(token),
                }
            }
            if self.shutdown.is_requested() {
                break;
            }
        }
        self.drain();
    }

    /// Accept every pending connection.
    ///
    /// Readiness is edge-triggered, so the accept loop runs until the
    /// listener would block. A shutdown request observed mid-accept stops
    /// further accepts without closing the connection just taken.
    fn accept_ready(&mut self) {
        loop {
            let Some(listener) = self.listener.as_ref() else {
                return;
            };
            match listener.accept() {
                Ok((mut stream, addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    if let Err(err) =
                        self.poll
                            .registry()
                            .register(&mut stream, token, Interest::READABLE)
                    {
                        warn!("collector: failed to register connection: {err}");
                        continue;
                    }
                    info!("collector: accepted connection from {addr:?}");
                    self.connections.insert(token, stream);
                    if self.shutdown.is_requested() {
                        self.stop_accepting();
                        return;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!("collector: accept failed: {err}");
                    return;
                }
            }
        }
    }

    /// Read every complete frame the connection has pending.
    fn read_ready(&mut self, token: Token) {
        let Some(mut stream) = self.connections.remove(&token) else {
            return;
        };
        let mut closed = false;
        loop {
            match read_frame(&mut stream, self.max_frame_len) {
                Ok(Some(payload)) => {
                    if self.batch.push(&payload) {
                        self.flush_batch();
                    }
                }
                Ok(None) => break,
                Err(FrameReadError::Disconnected) => {
                    info!("collector: peer disconnected");
                    closed = true;
                    break;
                }
                Err(FrameReadError::Oversized(len)) => {
                    warn!(
                        "collector: peer announced a {len} byte frame (limit {}); disconnecting",
                        self.max_frame_len
                    );
                    closed = true;
                    break;
                }
                Err(FrameReadError::Io(err)) => {
                    warn!("collector: read failed: {err}");
                    closed = true;
                    break;
                }
            }
        }
        if closed {
            self.close_connection(stream);
        } else {
            self.connections.insert(token, stream);
        }
    }

    /// Write the buffered batch to the sink.
    ///
    /// Sink failures are best-effort: the batch is lost, a warning is logged,
    /// and the loop carries on with the next event.
    fn flush_batch(&mut self) {
        let bytes = self.batch.take();
        if bytes.is_empty() {
            return;
        }
        if let Err(err) = self.sink.write(&bytes) {
            warn!("collector: sink write failed: {err}");
        }
    }

    /// Final flush and teardown once shutdown has been requested.
    fn drain(&mut self) {
        if !self.batch.is_empty() {
            info!("collector: draining {} buffered bytes", self.batch.len());
        }
        self.flush_batch();
        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            if let Some(stream) = self.connections.remove(&token) {
                self.close_connection(stream);
            }
        }
        self.stop_accepting();
    }

    fn stop_accepting(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            if let Err(err) = self.poll.registry().deregister(&mut listener) {
                warn!("collector: failed to deregister listener: {err}");
            }
        }
    }

    fn close_connection(&mut self, mut stream: UnixStream) {
        if let Err(err) = self.poll.registry().deregister(&mut stream) {
            warn!("collector: failed to deregister connection: {err}");
        }
    }
}
