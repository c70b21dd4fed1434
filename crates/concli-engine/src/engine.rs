//! The shared engine: registry, scanner and executor behind one lock.
//!
//! Instances attach their commands and get back an ordinal. The first attach
//! builds the executor and starts the scan loop on it; the detach that brings
//! the active count back to zero cancels the scanner, starts the executor
//! shutdown and drops all state, so the next attach starts from ordinal 0.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use concli_types::config::EngineConfig;
use concli_types::error::{ConcliError, Result};

use crate::adapter::{CliCommandAdapter, namespaced_code};
use crate::command::{Command, Registry, SharedRegistry};
use crate::console::Console;
use crate::dispatcher::CommandDispatcher;
use crate::executor::{ExecutorServiceAdapter, ShutdownOutcome};
use crate::scanner::InputScanner;
use crate::source::{InputSource, stdin_source};

/// Produces a fresh input source for each scan.
pub type InputFactory = Arc<dyn Fn() -> Box<dyn InputSource> + Send + Sync>;

/// State that exists only while at least one instance is attached.
struct EngineState<O> {
    registry: SharedRegistry<O>,
    active_instances: usize,
    next_ordinal: usize,
    executor: Arc<ExecutorServiceAdapter>,
    dispatcher: Arc<CommandDispatcher<O>>,
    scanner: Arc<InputScanner<O>>,
}

/// The outcome of an executor shutdown started by the last detach.
#[derive(Debug)]
pub struct PendingShutdown {
    outcome: Receiver<Result<ShutdownOutcome>>,
}

impl PendingShutdown {
    /// Block until the shutdown thread reports, for at most `timeout`.
    pub fn wait(&self, timeout: Duration) -> Result<ShutdownOutcome> {
        match self.outcome.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(ConcliError::ShutdownTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(ConcliError::Executor(
                "shutdown thread exited without reporting".to_string(),
            )),
        }
    }

    /// The outcome if the shutdown has already finished.
    pub fn try_outcome(&self) -> Option<Result<ShutdownOutcome>> {
        self.outcome.try_recv().ok()
    }
}

/// Shared command-line engine for instances of type `O`.
///
/// Build one per process at the composition root and hand an
/// `Arc<CliEngine<O>>` to every [`LifecycleHook`](crate::LifecycleHook).
pub struct CliEngine<O> {
    slot: Mutex<Option<EngineState<O>>>,
    /// Scanner of the current or most recent engine lifetime.
    last_scanner: Mutex<Option<Arc<InputScanner<O>>>>,
    config: EngineConfig,
    input: InputFactory,
    console: Console,
}

impl<O: Send + Sync + 'static> CliEngine<O> {
    /// An engine reading the process's standard input and printing to
    /// standard output.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let input: InputFactory = Arc::new(|| Box::new(stdin_source()) as Box<dyn InputSource>);
        Self::with_io(config, input, Console::stdout())
    }

    /// An engine over custom input and output.
    pub fn with_io(config: EngineConfig, input: InputFactory, console: Console) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            slot: Mutex::new(None),
            last_scanner: Mutex::new(None),
            config,
            input,
            console,
        })
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<EngineState<O>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn new_executor(&self) -> Arc<ExecutorServiceAdapter> {
        Arc::new(ExecutorServiceAdapter::new(
            &self.config.thread_name_prefix,
            self.config.worker_keep_alive(),
            self.config.shutdown_timeout(),
        ))
    }

    fn new_state(&self, executor: Arc<ExecutorServiceAdapter>) -> EngineState<O> {
        let registry: SharedRegistry<O> = Arc::new(Mutex::new(Registry::new()));
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&executor),
            self.console.clone(),
        ));
        let scanner = Arc::new(InputScanner::new(
            Arc::clone(&dispatcher),
            &self.config.sentinel,
            self.config.poll_interval(),
        ));
        EngineState {
            registry,
            active_instances: 0,
            next_ordinal: 0,
            executor,
            dispatcher,
            scanner,
        }
    }

    /// Build fresh state on `executor` and submit its scan loop.
    fn activate(&self, executor: Arc<ExecutorServiceAdapter>) -> Result<EngineState<O>> {
        let state = self.new_state(executor);
        self.start_scanner(&state)?;
        *self
            .last_scanner
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&state.scanner));
        Ok(state)
    }

    fn start_scanner(&self, state: &EngineState<O>) -> Result<()> {
        let scanner = Arc::clone(&state.scanner);
        let input = (self.input)();
        state.executor.execute(move || {
            if let Err(e) = scanner.start(input) {
                log::warn!("scan loop did not run: {e}");
            }
        })
    }

    /// Register `commands` for `owner` and return its ordinal.
    ///
    /// The first attach of an engine lifetime starts the scan loop. Codes are
    /// namespaced by ordinal, so concurrently attached instances never shadow
    /// each other.
    pub fn attach(&self, owner: &Arc<O>, commands: &[Arc<dyn Command<O>>]) -> Result<usize> {
        let mut slot = self.lock_slot();
        let state = match slot.take() {
            Some(state) => state,
            None => {
                let state = self.activate(self.new_executor())?;
                log::debug!("command line engine started");
                state
            },
        };
        let state = slot.insert(state);

        let ordinal = state.next_ordinal;
        state.next_ordinal += 1;
        {
            let mut registry = state.registry.lock().unwrap_or_else(PoisonError::into_inner);
            for command in commands {
                let adapter = CliCommandAdapter::new(Arc::clone(command), Arc::clone(owner), ordinal);
                registry.insert(adapter.code().to_string(), Arc::new(adapter));
            }
        }
        state.active_instances += 1;
        log::debug!(
            "attached instance #{ordinal} with {} commands, {} active",
            commands.len(),
            state.active_instances
        );
        Ok(ordinal)
    }

    /// Remove the commands `owner` attached under `ordinal`.
    ///
    /// Codes that are absent or bound to another instance are left alone.
    /// When this was the last active instance, the scanner is canceled, the
    /// executor shutdown starts and the engine state is dropped; the returned
    /// handle reports how that shutdown ended.
    pub fn detach(
        &self,
        owner: &Arc<O>,
        ordinal: usize,
        commands: &[Arc<dyn Command<O>>],
    ) -> Option<PendingShutdown> {
        let mut slot = self.lock_slot();
        let Some(state) = slot.as_mut() else {
            log::debug!("detach of instance #{ordinal} with no live engine");
            return None;
        };
        {
            let mut registry = state.registry.lock().unwrap_or_else(PoisonError::into_inner);
            for command in commands {
                let code = namespaced_code(command.code(), ordinal);
                let bound_here = registry
                    .get(&code)
                    .is_some_and(|a| a.ordinal() == ordinal && a.is_bound_to(owner));
                if bound_here {
                    registry.remove(&code);
                }
            }
        }
        state.active_instances = state.active_instances.saturating_sub(1);
        log::debug!(
            "detached instance #{ordinal}, {} active",
            state.active_instances
        );
        if state.active_instances > 0 {
            return None;
        }

        let state = slot.take()?;
        state.scanner.cancel();
        let (tx, rx) = mpsc::channel();
        if let Err(e) = state.executor.stop(move |outcome| {
            let _ = tx.send(outcome);
        }) {
            log::error!("could not stop command executor: {e}");
        }
        log::debug!("command line engine stopped");
        Some(PendingShutdown { outcome: rx })
    }

    /// Whether any instance is attached.
    pub fn is_active(&self) -> bool {
        self.lock_slot()
            .as_ref()
            .is_some_and(|state| state.active_instances > 0)
    }

    pub fn active_instances(&self) -> usize {
        self.lock_slot()
            .as_ref()
            .map_or(0, |state| state.active_instances)
    }

    /// Dispatch `token` as if it had been read from the input.
    ///
    /// Ignored while no instance is attached.
    pub fn dispatch(&self, token: &str) {
        let dispatcher = self
            .lock_slot()
            .as_ref()
            .map(|state| Arc::clone(&state.dispatcher));
        match dispatcher {
            Some(dispatcher) => dispatcher.dispatch(token),
            None => log::debug!("ignoring [{token}], no instance attached"),
        }
    }

    /// Wait for the scan loop of the current or most recent engine lifetime
    /// to exit. `true` when it did within `timeout`, or when no scan loop
    /// was ever started.
    pub fn wait_scanner_stopped(&self, timeout: Duration) -> bool {
        let scanner = self
            .last_scanner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Arc::clone);
        scanner.is_none_or(|scanner| scanner.wait_stopped(timeout))
    }

    /// A copy of the current registry; empty while inactive.
    pub fn registry_snapshot(&self) -> Registry<O> {
        self.lock_slot().as_ref().map_or_else(Registry::new, |state| {
            state
                .registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn console(&self) -> &Console {
        &self.console
    }
}
