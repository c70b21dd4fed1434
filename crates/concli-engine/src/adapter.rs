//! A provider command bound to one owning instance.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use concli_types::error::Result;

use crate::command::{Command, CommandOutput, Registry};

/// Binds a [`Command`] to the instance that registered it.
///
/// The first attached instance (ordinal 0) keeps the bare codes; every later
/// instance gets its ordinal appended, so `q` becomes `q1`, `q2`, ...
pub struct CliCommandAdapter<O> {
    delegate: Arc<dyn Command<O>>,
    owner: Arc<O>,
    ordinal: usize,
    code: String,
}

/// Code under which a command with bare `code` is registered for `ordinal`.
pub(crate) fn namespaced_code(code: &str, ordinal: usize) -> String {
    if ordinal == 0 {
        code.to_string()
    } else {
        format!("{code}{ordinal}")
    }
}

impl<O> CliCommandAdapter<O> {
    pub fn new(delegate: Arc<dyn Command<O>>, owner: Arc<O>, ordinal: usize) -> Self {
        let code = namespaced_code(delegate.code(), ordinal);
        Self {
            delegate,
            owner,
            ordinal,
            code,
        }
    }

    /// The namespaced code the operator types.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        self.delegate.name()
    }

    pub fn describe(&self) -> String {
        self.delegate.describe(&self.code, &self.owner)
    }

    pub fn is_help_command(&self) -> bool {
        self.delegate.is_help_command()
    }

    pub fn print_help_on_startup(&self) -> bool {
        self.delegate.print_help_on_startup()
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn owner(&self) -> &Arc<O> {
        &self.owner
    }

    /// Whether this adapter was created for `owner`.
    pub fn is_bound_to(&self, owner: &Arc<O>) -> bool {
        Arc::ptr_eq(&self.owner, owner)
    }

    /// Run the command against the bound owner with a copy of `live`.
    ///
    /// The copy is taken here, so the command sees the registry as of its
    /// own execution and cannot touch the engine's map.
    pub fn execute(&self, live: &Mutex<Registry<O>>) -> Result<CommandOutput> {
        let snapshot = live.lock().unwrap_or_else(PoisonError::into_inner).clone();
        self.delegate.execute(&self.owner, &snapshot)
    }
}

impl<O> fmt::Debug for CliCommandAdapter<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliCommandAdapter")
            .field("code", &self.code)
            .field("name", &self.delegate.name())
            .field("ordinal", &self.ordinal)
            .finish()
    }
}
