//! Cached thread pool with asynchronous, bounded, two-phase shutdown.
//!
//! Tasks are fire-and-forget. A worker is spawned whenever no idle worker can
//! take a new task, and idle workers retire after the keep-alive period, so a
//! long-running task (the scan loop) never starves command execution.
//!
//! [`ExecutorServiceAdapter::stop`] never blocks the caller: a dedicated
//! shutdown thread first closes intake and lets queued work drain, then
//! discards whatever is still queued, each phase bounded by half the timeout.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use concli_types::error::{ConcliError, Result};

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    /// Accepting tasks.
    Running,
    /// No new tasks; queued tasks still run.
    Draining,
    /// No new tasks; queue discarded.
    Stopped,
}

/// How a completed shutdown got there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every queued task ran before the workers exited.
    Drained,
    /// Queued tasks were discarded to make the workers exit in time.
    Forced {
        /// Number of tasks that never ran.
        discarded: usize,
    },
}

struct PoolState {
    queue: VecDeque<Task>,
    run_state: RunState,
    live_workers: usize,
    idle_workers: usize,
    spawned_total: usize,
}

struct PoolShared {
    state: Mutex<PoolState>,
    work_ready: Condvar,
    terminated: Condvar,
    keep_alive: Duration,
    name_prefix: String,
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until every worker has exited. Returns whether that happened
    /// within `timeout`.
    fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.live_workers > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .terminated
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        true
    }
}

/// Owns the background worker threads.
pub struct ExecutorServiceAdapter {
    shared: Arc<PoolShared>,
    shutdown_timeout: Duration,
}

impl ExecutorServiceAdapter {
    /// Create an empty pool. Workers are spawned on demand.
    pub fn new(name_prefix: &str, keep_alive: Duration, shutdown_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    queue: VecDeque::new(),
                    run_state: RunState::Running,
                    live_workers: 0,
                    idle_workers: 0,
                    spawned_total: 0,
                }),
                work_ready: Condvar::new(),
                terminated: Condvar::new(),
                keep_alive,
                name_prefix: name_prefix.to_string(),
            }),
            shutdown_timeout,
        }
    }

    /// Submit a task. Never waits for it to run.
    ///
    /// Fails once shutdown has been requested, or when no worker exists and
    /// none can be spawned.
    pub fn execute(&self, task: impl FnOnce() + Send + 'static) -> Result<()> {
        let mut state = self.shared.lock();
        if state.run_state != RunState::Running {
            return Err(ConcliError::Executor(
                "task rejected: executor is shutting down".to_string(),
            ));
        }
        state.queue.push_back(Box::new(task));
        if state.queue.len() <= state.idle_workers {
            self.shared.work_ready.notify_one();
            return Ok(());
        }

        state.spawned_total += 1;
        let name = format!("{}-worker-{}", self.shared.name_prefix, state.spawned_total);
        let shared = Arc::clone(&self.shared);
        match std::thread::Builder::new()
            .name(name)
            .spawn(move || worker_loop(&shared))
        {
            Ok(_) => {
                state.live_workers += 1;
                Ok(())
            },
            Err(e) if state.live_workers > 0 => {
                log::warn!("could not grow worker pool, task stays queued: {e}");
                Ok(())
            },
            Err(e) => {
                state.queue.pop_back();
                Err(ConcliError::Executor(format!("failed to spawn worker: {e}")))
            },
        }
    }

    /// Request shutdown without blocking the caller.
    ///
    /// A thread named `<prefix>-executor-shutdown` performs both phases and
    /// hands the outcome to `on_complete`. A pool still busy after the full
    /// timeout yields [`ConcliError::ShutdownTimeout`], which is also logged
    /// at error level.
    pub fn stop(&self, on_complete: impl FnOnce(Result<ShutdownOutcome>) + Send + 'static) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let timeout = self.shutdown_timeout;
        std::thread::Builder::new()
            .name(format!("{}-executor-shutdown", self.shared.name_prefix))
            .spawn(move || on_complete(shut_down(&shared, timeout)))
            .map(|_| ())
            .map_err(|e| ConcliError::Executor(format!("failed to spawn shutdown thread: {e}")))
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shared.lock().run_state != RunState::Running
    }

    /// Whether shutdown was requested and every worker has exited.
    pub fn is_terminated(&self) -> bool {
        let state = self.shared.lock();
        state.run_state != RunState::Running && state.live_workers == 0
    }

    /// Number of worker threads currently alive.
    pub fn worker_count(&self) -> usize {
        self.shared.lock().live_workers
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }
}

fn shut_down(shared: &PoolShared, timeout: Duration) -> Result<ShutdownOutcome> {
    let phase = timeout / 2;
    {
        let mut state = shared.lock();
        if state.run_state == RunState::Running {
            state.run_state = RunState::Draining;
        }
        shared.work_ready.notify_all();
    }
    if shared.await_termination(phase) {
        log::debug!("executor drained");
        return Ok(ShutdownOutcome::Drained);
    }

    let discarded = {
        let mut state = shared.lock();
        state.run_state = RunState::Stopped;
        let discarded = state.queue.len();
        state.queue.clear();
        shared.work_ready.notify_all();
        discarded
    };
    log::warn!("executor still busy after {phase:?}, discarded {discarded} queued tasks");
    if shared.await_termination(phase) {
        return Ok(ShutdownOutcome::Forced { discarded });
    }

    let busy = shared.lock().live_workers;
    log::error!("executor did not terminate within {timeout:?}, {busy} workers still running");
    Err(ConcliError::ShutdownTimeout(timeout))
}

fn worker_loop(shared: &PoolShared) {
    let mut state = shared.lock();
    loop {
        if let Some(task) = state.queue.pop_front() {
            drop(state);
            run_task(task);
            state = shared.lock();
            continue;
        }
        if state.run_state != RunState::Running {
            break;
        }
        state.idle_workers += 1;
        let (guard, wait) = shared
            .work_ready
            .wait_timeout(state, shared.keep_alive)
            .unwrap_or_else(PoisonError::into_inner);
        state = guard;
        state.idle_workers -= 1;
        if wait.timed_out() && state.queue.is_empty() && state.run_state == RunState::Running {
            break;
        }
    }
    state.live_workers -= 1;
    if state.live_workers == 0 {
        shared.terminated.notify_all();
    }
}

fn run_task(task: Task) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        let thread = std::thread::current();
        log::error!(
            "task panicked on {}: {}",
            thread.name().unwrap_or("worker"),
            panic_message(payload.as_ref())
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
