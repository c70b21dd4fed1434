//! Shared multi-instance command-line engine.
//!
//! Any number of host instances in one process can attach command sets to a
//! single [`CliEngine`]. The engine reads whitespace-delimited tokens from one
//! shared input stream on a pool thread, resolves them against a registry of
//! instance-namespaced codes, and runs the matching command asynchronously
//! against the instance that registered it. When the last instance detaches,
//! the reader is canceled and the pool is shut down.

mod adapter;
pub mod builtin;
mod cancelable;
mod command;
mod console;
mod dispatcher;
mod engine;
mod executor;
mod lifecycle;
mod scanner;
pub mod source;

/// A provider command bound to one owning instance and ordinal.
pub use adapter::CliCommandAdapter;
/// Input stream wrapper whose blocking reads can be canceled.
pub use cancelable::{CancelHandle, CancelableInputStream};
/// Command trait, output type and registry aliases.
pub use command::{Command, CommandOutput, Registry, SharedRegistry};
/// Line-oriented output sink shared by the dispatcher and commands.
pub use console::{CaptureBuffer, Console};
/// Token-to-command resolution and async execution.
pub use dispatcher::CommandDispatcher;
/// The engine handle and the outcome of its teardown.
pub use engine::{CliEngine, InputFactory, PendingShutdown};
/// Cached thread pool with two-phase shutdown.
pub use executor::{ExecutorServiceAdapter, ShutdownOutcome};
/// Wiring between a host's lifecycle and the engine.
pub use lifecycle::LifecycleHook;
/// Token scanner over a cancelable input stream.
pub use scanner::{InputScanner, ScannerState, TokenReader};
/// Input sources with readiness polling.
pub use source::{InputFeeder, InputSource, QueueInput, stdin_source};

pub use concli_types::config::EngineConfig;
pub use concli_types::error::{ConcliError, Result};
