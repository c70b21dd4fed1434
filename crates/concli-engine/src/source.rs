//! Input sources with readiness polling.
//!
//! Interactive standard input has no portable "bytes available" query and no
//! safe way to abort a read that is already blocked. [`stdin_source`] solves
//! both by pumping stdin on one process-wide thread into a [`QueueInput`],
//! whose readiness can be polled without blocking.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::cancelable::CancelHandle;

/// Size of a single read from the real standard input.
const STDIN_CHUNK: usize = 1024;

/// A byte source whose readiness can be checked without blocking.
pub trait InputSource: Read + Send {
    /// Whether a `read` would return immediately: bytes are buffered or the
    /// stream has reached its end.
    fn poll_ready(&mut self) -> io::Result<bool>;

    /// Read buffered bytes without blocking, unless `cancel` is already set.
    ///
    /// `None` means there was nothing to take, either because another reader
    /// drained the source since the last poll or because of the cancel. The
    /// default suits sources with a single reader, where a positive poll
    /// guarantees a non-blocking `read`.
    fn read_available(&mut self, buf: &mut [u8], cancel: &CancelHandle) -> io::Result<Option<usize>> {
        if cancel.is_canceled() {
            return Ok(None);
        }
        self.read(buf).map(Some)
    }
}

impl InputSource for Box<dyn InputSource> {
    fn poll_ready(&mut self) -> io::Result<bool> {
        (**self).poll_ready()
    }

    fn read_available(&mut self, buf: &mut [u8], cancel: &CancelHandle) -> io::Result<Option<usize>> {
        (**self).read_available(buf, cancel)
    }
}

// ---------------------------------------------------------------------------
// In-memory queue
// ---------------------------------------------------------------------------

struct QueueState {
    buf: VecDeque<u8>,
    closed: bool,
}

struct QueueShared {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl QueueShared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reading end of an in-memory byte queue.
///
/// Clones share the same buffer, so a new scan can pick up bytes that an
/// earlier scan left unread.
#[derive(Clone)]
pub struct QueueInput {
    shared: Arc<QueueShared>,
}

/// Writing end of an in-memory byte queue.
#[derive(Clone)]
pub struct InputFeeder {
    shared: Arc<QueueShared>,
}

impl QueueInput {
    /// Create a connected feeder/input pair.
    pub fn pair() -> (InputFeeder, QueueInput) {
        let shared = Arc::new(QueueShared {
            state: Mutex::new(QueueState {
                buf: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        });
        (
            InputFeeder {
                shared: Arc::clone(&shared),
            },
            QueueInput { shared },
        )
    }

    /// Number of buffered bytes not yet read.
    pub fn buffered(&self) -> usize {
        self.shared.lock().buf.len()
    }

    /// Whether the writing side has signalled end of stream.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

impl Read for QueueInput {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let mut state = self.shared.lock();
        while state.buf.is_empty() && !state.closed {
            state = self
                .shared
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Ok(drain_into(&mut state.buf, out))
    }
}

fn drain_into(buf: &mut VecDeque<u8>, out: &mut [u8]) -> usize {
    let n = out.len().min(buf.len());
    for (slot, byte) in out.iter_mut().zip(buf.drain(..n)) {
        *slot = byte;
    }
    n
}

impl InputSource for QueueInput {
    fn poll_ready(&mut self) -> io::Result<bool> {
        let state = self.shared.lock();
        Ok(!state.buf.is_empty() || state.closed)
    }

    /// Several engine lifetimes may hold clones of one queue, so the cancel
    /// check and the take happen under the queue lock.
    fn read_available(&mut self, out: &mut [u8], cancel: &CancelHandle) -> io::Result<Option<usize>> {
        let mut state = self.shared.lock();
        if cancel.is_canceled() {
            return Ok(None);
        }
        if state.buf.is_empty() {
            return Ok(state.closed.then_some(0));
        }
        Ok(Some(drain_into(&mut state.buf, out)))
    }
}

impl InputFeeder {
    /// Append raw bytes. Ignored once the queue is closed.
    pub fn push(&self, bytes: &[u8]) {
        let mut state = self.shared.lock();
        if state.closed {
            return;
        }
        state.buf.extend(bytes);
        self.shared.ready.notify_all();
    }

    /// Append a line terminated by `\n`.
    pub fn push_line(&self, line: &str) {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.push(&bytes);
    }

    /// Mark end of stream. Buffered bytes remain readable.
    pub fn close(&self) {
        self.shared.lock().closed = true;
        self.shared.ready.notify_all();
    }
}

// ---------------------------------------------------------------------------
// Process standard input
// ---------------------------------------------------------------------------

static STDIN: OnceLock<QueueInput> = OnceLock::new();

/// The process's standard input as a pollable source.
///
/// The first call starts the pump thread; later calls return handles onto the
/// same buffer. The pump lives for the rest of the process and never keeps it
/// from exiting.
pub fn stdin_source() -> QueueInput {
    STDIN
        .get_or_init(|| {
            let (feeder, input) = QueueInput::pair();
            let pump_feeder = feeder.clone();
            let spawned = std::thread::Builder::new()
                .name("concli-stdin".into())
                .spawn(move || pump_stdin(&pump_feeder));
            if let Err(e) = spawned {
                log::error!("failed to spawn stdin pump: {e}");
                feeder.close();
            }
            input
        })
        .clone()
}

fn pump_stdin(feeder: &InputFeeder) {
    let stdin = io::stdin();
    let mut handle = stdin.lock();
    let mut chunk = [0u8; STDIN_CHUNK];
    loop {
        match handle.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => feeder.push(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("stdin read error: {e}");
                break;
            },
        }
    }
    log::debug!("stdin reached end of stream");
    feeder.close();
}
