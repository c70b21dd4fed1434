//! Wiring between a host's lifecycle and the engine.
//!
//! A host calls [`LifecycleHook::on_starting`] while it transitions into its
//! starting phase and [`LifecycleHook::on_stopped`] once it has stopped. The
//! hook remembers the ordinal in between, so a host that is stopped twice
//! detaches once.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use concli_types::error::Result;

use crate::adapter::namespaced_code;
use crate::command::Command;
use crate::engine::{CliEngine, PendingShutdown};

/// One host instance's attachment to a shared [`CliEngine`].
pub struct LifecycleHook<O> {
    engine: Arc<CliEngine<O>>,
    commands: Vec<Arc<dyn Command<O>>>,
    ordinal: Mutex<Option<usize>>,
}

impl<O: Send + Sync + 'static> LifecycleHook<O> {
    pub fn new(engine: Arc<CliEngine<O>>, commands: Vec<Arc<dyn Command<O>>>) -> Self {
        Self {
            engine,
            commands,
            ordinal: Mutex::new(None),
        }
    }

    fn lock_ordinal(&self) -> MutexGuard<'_, Option<usize>> {
        self.ordinal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach `owner`'s commands and log the startup help lines.
    ///
    /// Returns the ordinal; calling it again while attached returns the same
    /// ordinal without attaching twice.
    pub fn on_starting(&self, owner: &Arc<O>) -> Result<usize> {
        let mut slot = self.lock_ordinal();
        if let Some(ordinal) = *slot {
            return Ok(ordinal);
        }
        let ordinal = self.engine.attach(owner, &self.commands)?;
        *slot = Some(ordinal);

        for line in self.startup_help(owner, ordinal) {
            log::info!("{line}");
        }
        Ok(ordinal)
    }

    /// Descriptions of the commands flagged for startup help, under the
    /// codes they get for `ordinal`.
    pub fn startup_help(&self, owner: &O, ordinal: usize) -> Vec<String> {
        self.commands
            .iter()
            .filter(|c| c.print_help_on_startup())
            .map(|c| c.describe(&namespaced_code(c.code(), ordinal), owner))
            .collect()
    }

    /// Detach `owner`'s commands. No-op when not attached.
    pub fn on_stopped(&self, owner: &Arc<O>) -> Option<PendingShutdown> {
        let ordinal = self.lock_ordinal().take()?;
        self.engine.detach(owner, ordinal, &self.commands)
    }

    /// The ordinal while attached.
    pub fn ordinal(&self) -> Option<usize> {
        *self.lock_ordinal()
    }

    pub fn engine(&self) -> &Arc<CliEngine<O>> {
        &self.engine
    }
}
