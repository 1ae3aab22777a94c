#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Clear,
    Commit,
    Skills,
    History,
    Exit,
    Unknown(String),
}

pub const HELP_TEXT: &str = "Available Commands:
  /clear   - Clear conversation history
  /commit  - Generate and propose a git commit
  /skills  - List available skills
  /history - Show history stats
  /help    - Show this help message
  /exit    - Exit the agent";

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let command = trimmed
        .split_whitespace()
        .next()
        .unwrap_or(trimmed)
        .to_string();

    let parsed = match command.as_str() {
        "/help" => SlashCommand::Help,
        "/clear" => SlashCommand::Clear,
        "/commit" => SlashCommand::Commit,
        "/skills" => SlashCommand::Skills,
        "/history" => SlashCommand::History,
        "/exit" | "/quit" => SlashCommand::Exit,
        _ => SlashCommand::Unknown(command),
    };

    Some(parsed)
}
