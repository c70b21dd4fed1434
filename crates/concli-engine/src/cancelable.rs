//! Input stream wrapper whose blocking reads can be canceled.
//!
//! A read polls the source's readiness every `poll_interval` and only takes
//! bytes through the source's non-blocking `read_available`, which refuses
//! once the stream is canceled. After
//! [`CancelHandle::cancel`], reads are served from the sentinel line instead,
//! so a tokenizer sitting on top sees the sentinel as if it had been typed.

use std::io::{self, Cursor, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::source::InputSource;

/// Cloneable trigger for canceling a [`CancelableInputStream`].
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    canceled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns immediately; repeated calls are no-ops.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

/// A readable stream over `source` that switches to `cancel_signal` once
/// canceled.
pub struct CancelableInputStream<S> {
    source: S,
    cancel_signal: Cursor<Vec<u8>>,
    handle: CancelHandle,
    poll_interval: Duration,
}

impl<S: InputSource> CancelableInputStream<S> {
    /// Wrap `source`; after cancel, reads yield `sentinel` followed by a
    /// newline and then end of stream.
    pub fn new(source: S, sentinel: &str, handle: CancelHandle, poll_interval: Duration) -> Self {
        let mut line = sentinel.as_bytes().to_vec();
        line.push(b'\n');
        Self {
            source,
            cancel_signal: Cursor::new(line),
            handle,
            poll_interval,
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.handle.is_canceled()
    }
}

impl<S: InputSource> Read for CancelableInputStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.handle.is_canceled() {
                return self.cancel_signal.read(buf);
            }
            match self.source.poll_ready() {
                Ok(true) => match self.source.read_available(buf, &self.handle)? {
                    Some(n) => return Ok(n),
                    // Canceled, or another reader took the bytes first.
                    None => continue,
                },
                Ok(false) => std::thread::sleep(self.poll_interval),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    log::debug!("input poll interrupted, treating as cancel");
                    self.handle.cancel();
                    return Ok(0);
                },
                Err(e) => return Err(e),
            }
        }
    }
}
