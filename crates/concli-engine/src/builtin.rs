//! Commands every host can register as-is.

use std::sync::Arc;

use concli_types::error::Result;

use crate::command::{Command, CommandOutput, Registry};

/// First line of the help listing.
pub const HELP_HEADER: &str = "Available commands:";

/// Lists every registered command, across all attached instances.
#[derive(Debug, Clone)]
pub struct HelpCommand {
    code: String,
}

impl HelpCommand {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
        }
    }
}

impl Default for HelpCommand {
    fn default() -> Self {
        Self::new("h")
    }
}

impl<O> Command<O> for HelpCommand {
    fn code(&self) -> &str {
        &self.code
    }

    fn name(&self) -> &str {
        "Help"
    }

    fn describe(&self, code: &str, _owner: &O) -> String {
        format!("Type [{code}] to list the available commands")
    }

    fn execute(&self, _owner: &Arc<O>, registry: &Registry<O>) -> Result<CommandOutput> {
        Ok(CommandOutput::Text(render_help(registry)))
    }

    fn is_help_command(&self) -> bool {
        true
    }

    fn print_help_on_startup(&self) -> bool {
        true
    }
}

/// Header line, then a `<name> [<code>]:` / description pair per command,
/// ordered by name and then code.
pub fn render_help<O>(registry: &Registry<O>) -> String {
    let mut commands: Vec<_> = registry.values().collect();
    commands.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.code().cmp(b.code())));

    let mut lines = vec![HELP_HEADER.to_string()];
    for command in commands {
        lines.push(format!("{} [{}]:", command.name(), command.code()));
        lines.push(format!("  {}", command.describe()));
    }
    lines.join("\n")
}
