//! Console commands every host registers.

use std::sync::Arc;

use concli_engine::builtin::HelpCommand;
use concli_engine::{Command, CommandOutput, Registry, Result};

use crate::host::Host;

/// Help, quit, status and restart, in that order.
pub fn host_commands() -> Vec<Arc<dyn Command<Host>>> {
    vec![
        Arc::new(HelpCommand::default()) as Arc<dyn Command<Host>>,
        Arc::new(QuitCommand),
        Arc::new(StatusCommand),
        Arc::new(RestartCommand),
    ]
}

// ---------------------------------------------------------------------------
// q
// ---------------------------------------------------------------------------

struct QuitCommand;

impl Command<Host> for QuitCommand {
    fn code(&self) -> &str {
        "q"
    }
    fn name(&self) -> &str {
        "Quit"
    }
    fn describe(&self, code: &str, owner: &Host) -> String {
        format!("Type [{code}] to stop {}", owner.name())
    }
    fn execute(&self, owner: &Arc<Host>, _registry: &Registry<Host>) -> Result<CommandOutput> {
        owner.quit();
        Ok(CommandOutput::None)
    }
}

// ---------------------------------------------------------------------------
// s
// ---------------------------------------------------------------------------

struct StatusCommand;

impl Command<Host> for StatusCommand {
    fn code(&self) -> &str {
        "s"
    }
    fn name(&self) -> &str {
        "Status"
    }
    fn describe(&self, code: &str, owner: &Host) -> String {
        format!("Type [{code}] to show the status of {}", owner.name())
    }
    fn execute(&self, owner: &Arc<Host>, registry: &Registry<Host>) -> Result<CommandOutput> {
        let siblings = registry
            .values()
            .filter(|c| !c.is_bound_to(owner))
            .map(|c| c.owner().name())
            .collect::<std::collections::BTreeSet<_>>();
        let mut text = owner.status_line();
        if !siblings.is_empty() {
            let names: Vec<&str> = siblings.into_iter().collect();
            text.push_str(&format!("\nsharing the console with {}", names.join(", ")));
        }
        Ok(CommandOutput::Text(text))
    }
}

// ---------------------------------------------------------------------------
// r
// ---------------------------------------------------------------------------

struct RestartCommand;

impl Command<Host> for RestartCommand {
    fn code(&self) -> &str {
        "r"
    }
    fn name(&self) -> &str {
        "Restart"
    }
    fn describe(&self, code: &str, owner: &Host) -> String {
        format!("Type [{code}] to restart {}", owner.name())
    }
    fn execute(&self, owner: &Arc<Host>, _registry: &Registry<Host>) -> Result<CommandOutput> {
        owner.restart()?;
        Ok(CommandOutput::Text(format!("{} restarted", owner.name())))
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use concli_engine::{
        CaptureBuffer, CliEngine, Console, EngineConfig, InputFactory, InputFeeder, InputSource,
        QueueInput,
    };

    use super::*;

    fn engine() -> (Arc<CliEngine<Host>>, InputFeeder, CaptureBuffer) {
        let (feeder, input) = QueueInput::pair();
        let factory: InputFactory =
            Arc::new(move || Box::new(input.clone()) as Box<dyn InputSource>);
        let config = EngineConfig {
            poll_interval_ms: 5,
            ..EngineConfig::default()
        };
        let (console, output) = Console::capture();
        let engine = Arc::new(CliEngine::with_io(config, factory, console).unwrap());
        (engine, feeder, output)
    }

    fn eventually(mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn command_set_codes() {
        let codes: Vec<String> = host_commands()
            .iter()
            .map(|c| c.code().to_string())
            .collect();
        assert_eq!(codes, vec!["h", "q", "s", "r"]);
    }

    #[test]
    fn q1_stops_only_second_host() {
        let (engine, feeder, _) = engine();
        let first = Host::new("first", Arc::clone(&engine));
        let second = Host::new("second", Arc::clone(&engine));
        first.start().unwrap();
        second.start().unwrap();

        feeder.push_line("q1");
        assert!(eventually(|| second.is_finished()));
        assert!(!first.is_finished());
        assert!(engine.registry_snapshot().contains_key("q"));
        assert!(!engine.registry_snapshot().contains_key("q1"));
        first.quit();
    }

    #[test]
    fn status_reports_siblings() {
        let (engine, feeder, output) = engine();
        let first = Host::new("first", Arc::clone(&engine));
        let second = Host::new("second", Arc::clone(&engine));
        first.start().unwrap();
        second.start().unwrap();

        feeder.push_line("s");
        assert!(eventually(|| output.contents().contains("sharing the console with second")));
        assert!(output.contents().contains("first: Running"));
        first.quit();
        second.quit();
    }

    #[test]
    fn restart_from_console_reattaches() {
        let (engine, feeder, output) = engine();
        let host = Host::new("solo", Arc::clone(&engine));
        host.start().unwrap();

        feeder.push_line("r");
        assert!(eventually(|| output.contents().contains("solo restarted")));
        assert_eq!(host.restarts(), 1);
        assert!(engine.is_active());
        assert_eq!(host.ordinal(), Some(0));
        host.quit();
    }
}
