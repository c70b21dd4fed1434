//! Error types for concli.

use std::io;
use std::time::Duration;

/// Errors produced by the command-line engine.
#[derive(Debug, thiserror::Error)]
pub enum ConcliError {
    #[error("config error: {0}")]
    Config(String),

    #[error("command error: {0}")]
    Command(String),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("scanner error: {0}")]
    Scanner(String),

    #[error("executor did not terminate within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ConcliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let e = ConcliError::Config("missing key".into());
        assert_eq!(format!("{e}"), "config error: missing key");
    }

    #[test]
    fn command_error_display() {
        let e = ConcliError::Command("instance already stopped".into());
        assert_eq!(format!("{e}"), "command error: instance already stopped");
    }

    #[test]
    fn executor_error_display() {
        let e = ConcliError::Executor("pool is shut down".into());
        assert_eq!(format!("{e}"), "executor error: pool is shut down");
    }

    #[test]
    fn scanner_error_display() {
        let e = ConcliError::Scanner("already started".into());
        assert_eq!(format!("{e}"), "scanner error: already started");
    }

    #[test]
    fn shutdown_timeout_display_names_duration() {
        let e = ConcliError::ShutdownTimeout(Duration::from_millis(1500));
        let msg = format!("{e}");
        assert!(msg.contains("did not terminate"));
        assert!(msg.contains("1.5s"));
    }

    #[test]
    fn io_error_from_conversion() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "closed");
        let e: ConcliError = io_err.into();
        let msg = format!("{e}");
        assert!(msg.contains("I/O error"));
        assert!(msg.contains("closed"));
    }

    #[test]
    fn toml_error_from_conversion() {
        let toml_err = toml::from_str::<toml::Value>("this is [[[not valid toml").unwrap_err();
        let e: ConcliError = toml_err.into();
        assert!(format!("{e}").contains("TOML parse error"));
    }

    #[test]
    fn result_alias_err() {
        let r: Result<i32> = Err(ConcliError::Executor("oops".into()));
        assert!(r.is_err());
    }
}
