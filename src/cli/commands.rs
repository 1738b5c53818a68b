//! CLI commands
//!
//! Special commands that can be executed in the REPL. Anything else,
//! `@agent` and `@all` addressing included, goes to the council as a message.

use crate::agent::{AgentRegistry, Council, CycleOutcome};
use crate::core::ToolOrigin;

/// Result of parsing a command
#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    /// Process as a council message
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
    /// Reset the conversation
    Clear,
    /// No output needed
    None,
}

/// Whether a line typed during an in-flight cycle should abort it
pub fn is_interrupt(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "exit" | "quit" | "reset")
}

/// Parse and handle special commands
pub fn handle_command(input: &str, council: &Council) -> CommandResult {
    let input = input.trim();
    if input.is_empty() {
        return CommandResult::None;
    }

    match input.to_lowercase().as_str() {
        "exit" | "quit" => CommandResult::Exit,
        "reset" => CommandResult::Clear,
        "help" | "?" => CommandResult::Handled(help_text()),
        "agents" => CommandResult::Handled(agents_text(council.registry())),
        "status" => CommandResult::Handled(status_text(council)),
        _ => CommandResult::Continue(input.to_string()),
    }
}

/// Generate help text
pub fn help_text() -> String {
    r#"Council Commands:
─────────────────────────────────────────────
  help, ?          Show this help message
  exit, quit       Leave the council
  reset            Clear the conversation (cancels a running cycle)
  agents           List the council members and their tools
  status           Show models and context window usage

  @<agent> <text>  Ask one member directly, e.g. @saul
  @all <text>      Ask every member
  <text>           Let the council decide who answers
─────────────────────────────────────────────"#
        .to_string()
}

/// List agents with their roles and tools
pub fn agents_text(registry: &AgentRegistry) -> String {
    let mut output = String::from("Council Members:\n");
    for agent in registry.agents() {
        output.push_str(&format!("  @{:<10} {} ({})\n", agent.id.as_str(), agent.name, agent.role));
        if agent.tools.is_empty() {
            output.push_str("               tools: none\n");
        } else {
            let names: Vec<&str> = agent.tools.iter().map(|t| t.name.as_str()).collect();
            output.push_str(&format!("               tools: {}\n", names.join(", ")));
        }
    }
    output
}

/// Models and window usage
pub fn status_text(council: &Council) -> String {
    let config = council.config();
    let status = council.context_status();
    format!(
        "Council Status:\n\
         ─────────────────────────────\n\
         Provider:     {}\n\
         Primary:      {}\n\
         Fast:         {}\n\
         Window:       {}/{} messages\n\
         Complexity:   {:.1}x\n\
         Summaries:    {}\n\
         Tool servers: {}",
        council.provider_name(),
        config.models.primary,
        config.models.fast,
        status.messages,
        status.capacity,
        status.complexity,
        status.summaries,
        config.tools.servers.keys().cloned().collect::<Vec<_>>().join(", ")
    )
}

/// Render a finished cycle as transcript text
pub fn render_outcome(outcome: &CycleOutcome, registry: &AgentRegistry) -> String {
    let mut output = String::new();

    for turn in &outcome.turns {
        let name = registry.display_name(&turn.agent);
        if turn.interjection {
            output.push_str(&format!("\n{} (jumping in):\n", name));
        } else {
            output.push_str(&format!("\n{}:\n", name));
        }
        for result in &turn.tool_results {
            let mark = match result.origin {
                ToolOrigin::Remote => "remote",
                ToolOrigin::Local => "local",
                ToolOrigin::Error => "failed",
            };
            output.push_str(&format!("  [{} {}]\n", result.tool_name, mark));
        }
        output.push_str(&turn.text);
        if turn.incomplete {
            output.push_str(" …");
        }
        output.push('\n');
    }

    for failure in &outcome.failures {
        output.push_str(&format!(
            "\n{} could not answer: {}\n",
            registry.display_name(&failure.agent),
            failure.error
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::default_roster;

    #[test]
    fn test_interrupt_words() {
        assert!(is_interrupt(" reset "));
        assert!(is_interrupt("EXIT"));
        assert!(!is_interrupt("@saul reset the deadline"));
    }

    #[test]
    fn test_agents_text_lists_tools() {
        let registry = AgentRegistry::new(default_roster()).unwrap();
        let text = agents_text(&registry);
        assert!(text.contains("@saul"));
        assert!(text.contains("kubectl_pods"));
        assert!(text.contains("tools: none"));
    }

    #[test]
    fn test_help_mentions_addressing() {
        assert!(help_text().contains("@all"));
    }
}
