//! Token scanner over a cancelable input stream.
//!
//! ```text
//!   Idle ──start()──▶ Scanning ──sentinel / end of input / read error──▶ Stopped
//! ```
//!
//! `cancel()` only requests the transition; the loop reaches `Stopped` on its
//! own within one poll interval, and [`InputScanner::wait_stopped`] is how
//! callers observe it.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use concli_types::error::{ConcliError, Result};

use crate::cancelable::{CancelHandle, CancelableInputStream};
use crate::dispatcher::CommandDispatcher;
use crate::source::InputSource;

/// Lifecycle of one scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Idle,
    Scanning,
    Stopped,
}

/// Splits a byte stream into whitespace-delimited tokens.
pub struct TokenReader<R> {
    reader: R,
    pending: VecDeque<String>,
}

impl<R: BufRead> TokenReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: VecDeque::new(),
        }
    }

    /// The next token, or `None` at end of input.
    pub fn next_token(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(Some(token));
            }
            let mut line = Vec::new();
            if self.reader.read_until(b'\n', &mut line)? == 0 {
                return Ok(None);
            }
            self.pending.extend(
                String::from_utf8_lossy(&line)
                    .split_whitespace()
                    .map(str::to_string),
            );
        }
    }
}

/// Reads tokens from the shared input and hands them to the dispatcher.
pub struct InputScanner<O> {
    dispatcher: Arc<CommandDispatcher<O>>,
    sentinel: String,
    poll_interval: Duration,
    cancel: CancelHandle,
    state: Mutex<ScannerState>,
    stopped: Condvar,
}

/// Moves the scanner to `Stopped` however the scan loop exits.
struct StopOnExit<'a, O>(&'a InputScanner<O>);

impl<O> Drop for StopOnExit<'_, O> {
    fn drop(&mut self) {
        *self.0.lock_state() = ScannerState::Stopped;
        self.0.stopped.notify_all();
    }
}

impl<O> InputScanner<O> {
    fn lock_state(&self) -> MutexGuard<'_, ScannerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Request the scan loop to stop. Never blocks.
    ///
    /// A cancel issued before `start` makes the loop stop at its first read.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    pub fn state(&self) -> ScannerState {
        *self.lock_state()
    }

    /// Wait until the scan loop has exited. Returns whether it did so within
    /// `timeout`.
    pub fn wait_stopped(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock_state();
        while *state != ScannerState::Stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .stopped
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        true
    }
}

impl<O: Send + Sync + 'static> InputScanner<O> {
    pub fn new(dispatcher: Arc<CommandDispatcher<O>>, sentinel: &str, poll_interval: Duration) -> Self {
        Self {
            dispatcher,
            sentinel: sentinel.trim().to_string(),
            poll_interval,
            cancel: CancelHandle::new(),
            state: Mutex::new(ScannerState::Idle),
            stopped: Condvar::new(),
        }
    }

    /// Run the scan loop on the calling thread until it stops.
    ///
    /// A scanner runs once; starting it again is an error.
    pub fn start<S: InputSource>(&self, source: S) -> Result<()> {
        {
            let mut state = self.lock_state();
            if *state != ScannerState::Idle {
                return Err(ConcliError::Scanner(format!(
                    "cannot start a scanner that is {:?}",
                    *state
                )));
            }
            *state = ScannerState::Scanning;
        }
        let _stop = StopOnExit(self);
        log::debug!("scanner started");

        let stream = CancelableInputStream::new(
            source,
            &self.sentinel,
            self.cancel.clone(),
            self.poll_interval,
        );
        let mut tokens = TokenReader::new(BufReader::new(stream));
        loop {
            match tokens.next_token() {
                // Tokens buffered before a cancel belong to no live registry.
                Ok(Some(_)) if self.cancel.is_canceled() => {
                    log::debug!("scanner canceled with input still buffered");
                    break;
                },
                Ok(Some(token)) if token == self.sentinel => {
                    log::debug!("scanner received cancel sentinel");
                    break;
                },
                Ok(Some(token)) => self.dispatcher.dispatch(&token),
                Ok(None) => {
                    log::debug!("scanner reached end of input");
                    break;
                },
                Err(e) => {
                    log::debug!("scanner stopped on read error: {e}");
                    break;
                },
            }
        }
        Ok(())
    }
}
