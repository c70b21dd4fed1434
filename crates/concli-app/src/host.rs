//! A host instance with its own start/stop lifecycle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use concli_engine::{CliEngine, LifecycleHook, PendingShutdown, Result};

use crate::commands::host_commands;

/// Lifecycle phases of a [`Host`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    New,
    Starting,
    Running,
    Stopping,
    Stopped,
}

struct Phase {
    state: HostState,
    started_at: Option<Instant>,
}

/// One application instance sharing the console with its siblings.
pub struct Host {
    name: String,
    phase: Mutex<Phase>,
    restarts: AtomicUsize,
    finished: AtomicBool,
    hook: LifecycleHook<Host>,
    shutdown: Mutex<Option<PendingShutdown>>,
}

impl Host {
    pub fn new(name: impl Into<String>, engine: Arc<CliEngine<Host>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            phase: Mutex::new(Phase {
                state: HostState::New,
                started_at: None,
            }),
            restarts: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            hook: LifecycleHook::new(engine, host_commands()),
            shutdown: Mutex::new(None),
        })
    }

    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: HostState) {
        let mut phase = self.lock_phase();
        log::debug!("{}: {:?} -> {state:?}", self.name, phase.state);
        phase.state = state;
        phase.started_at = match state {
            HostState::Running => Some(Instant::now()),
            HostState::Stopped => None,
            _ => phase.started_at,
        };
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> HostState {
        self.lock_phase().state
    }

    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    /// The console ordinal while attached.
    pub fn ordinal(&self) -> Option<usize> {
        self.hook.ordinal()
    }

    /// Whether the host was quit for good.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn start(self: &Arc<Self>) -> Result<()> {
        self.set_state(HostState::Starting);
        if let Err(e) = self.hook.on_starting(self) {
            self.set_state(HostState::Stopped);
            return Err(e);
        }
        self.set_state(HostState::Running);
        log::info!("{} started", self.name);
        Ok(())
    }

    pub fn stop(self: &Arc<Self>) {
        if self.state() != HostState::Running {
            return;
        }
        self.set_state(HostState::Stopping);
        if let Some(pending) = self.hook.on_stopped(self) {
            *self.shutdown.lock().unwrap_or_else(PoisonError::into_inner) = Some(pending);
        }
        self.set_state(HostState::Stopped);
        log::info!("{} stopped", self.name);
    }

    /// Stop for good.
    pub fn quit(self: &Arc<Self>) {
        self.stop();
        self.finished.store(true, Ordering::SeqCst);
    }

    pub fn restart(self: &Arc<Self>) -> Result<()> {
        self.stop();
        self.restarts.fetch_add(1, Ordering::SeqCst);
        self.start()
    }

    /// The console shutdown this host's last stop triggered, if any.
    pub fn take_shutdown(&self) -> Option<PendingShutdown> {
        self.shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// One-line summary for the status command.
    pub fn status_line(&self) -> String {
        let phase = self.lock_phase();
        let uptime = phase
            .started_at
            .map(|t| format!(" for {}s", t.elapsed().as_secs()))
            .unwrap_or_default();
        let ordinal = self
            .ordinal()
            .map_or_else(|| "detached".to_string(), |o| format!("console #{o}"));
        format!(
            "{}: {:?}{uptime} ({ordinal}, {} restarts)",
            self.name,
            phase.state,
            self.restarts()
        )
    }
}
