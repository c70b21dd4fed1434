//! Command trait and registry types.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use concli_types::error::Result;

use crate::adapter::CliCommandAdapter;

/// Output produced by a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// Text printed to the console, one or more lines.
    Text(String),
    /// Command produced no visible output.
    None,
}

/// Registered commands keyed by their namespaced code.
pub type Registry<O> = HashMap<String, Arc<CliCommandAdapter<O>>>;

/// The engine's live registry.
pub type SharedRegistry<O> = Arc<Mutex<Registry<O>>>;

/// A command an instance of type `O` exposes on the shared console.
///
/// Implementations come from the host application. The engine never looks
/// inside them beyond this capability set.
pub trait Command<O>: Send + Sync {
    /// The bare code the operator types, before instance namespacing.
    fn code(&self) -> &str;

    /// Human-readable name, used to order help output.
    fn name(&self) -> &str;

    /// One-line description. `code` is the namespaced code this command is
    /// reachable under for `owner`.
    fn describe(&self, code: &str, owner: &O) -> String;

    /// Run against `owner`. `registry` is a private copy of the commands
    /// registered at the time of execution.
    fn execute(&self, owner: &Arc<O>, registry: &Registry<O>) -> Result<CommandOutput>;

    /// Whether this command's code is suggested after an unknown command.
    fn is_help_command(&self) -> bool {
        false
    }

    /// Whether the description is logged when the owner starts.
    fn print_help_on_startup(&self) -> bool {
        false
    }
}
