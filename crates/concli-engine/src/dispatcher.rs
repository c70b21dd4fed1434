//! Token-to-command resolution.

use std::sync::{Arc, PoisonError};

use crate::adapter::CliCommandAdapter;
use crate::command::{CommandOutput, Registry, SharedRegistry};
use crate::console::Console;
use crate::executor::ExecutorServiceAdapter;

/// Resolves scanned tokens against the live registry and runs hits on the
/// executor.
pub struct CommandDispatcher<O> {
    registry: SharedRegistry<O>,
    executor: Arc<ExecutorServiceAdapter>,
    console: Console,
}

impl<O: Send + Sync + 'static> CommandDispatcher<O> {
    pub fn new(
        registry: SharedRegistry<O>,
        executor: Arc<ExecutorServiceAdapter>,
        console: Console,
    ) -> Self {
        Self {
            registry,
            executor,
            console,
        }
    }

    /// Run the command registered under `token`, or print a usage hint.
    ///
    /// Returns as soon as the command is queued; its output and failures are
    /// handled on the worker that runs it.
    pub fn dispatch(&self, token: &str) {
        let command = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .map(Arc::clone);

        let Some(command) = command else {
            self.console.println(self.unknown_command_message(token));
            return;
        };

        let registry = Arc::clone(&self.registry);
        let console = self.console.clone();
        if let Err(e) = self
            .executor
            .execute(move || run_bound(&command, &registry, &console))
        {
            log::warn!("dropping command [{token}]: {e}");
        }
    }

    /// The line printed for a token that matches no registered code.
    pub fn unknown_command_message(&self, token: &str) -> String {
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        format!(
            "Unknown command [{token}]. Type [{}] for help.",
            help_codes(&registry).join(",")
        )
    }
}

/// Codes of every registered help command, sorted.
fn help_codes<O>(registry: &Registry<O>) -> Vec<&str> {
    let mut codes: Vec<&str> = registry
        .values()
        .filter(|c| c.is_help_command())
        .map(|c| c.code())
        .collect();
    codes.sort_unstable();
    codes
}

fn run_bound<O>(command: &CliCommandAdapter<O>, registry: &SharedRegistry<O>, console: &Console) {
    match command.execute(registry) {
        Ok(CommandOutput::Text(text)) => console.println(text),
        Ok(CommandOutput::None) => {},
        Err(e) => log::warn!("command [{}] failed: {e}", command.code()),
    }
}
