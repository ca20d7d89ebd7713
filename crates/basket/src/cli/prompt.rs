//! Line commands read by `basket start`.

use thiserror::Error;

pub const HELP: &str = "\
Commands:
  add <item>        add an item to the to-buy list
  buy <item>        check an item off
  unbuy <item>      put an item back on the to-buy list
  suggest <text>    best completion for <text>
  list              all items, most recent first
  offline | online  simulate losing or regaining the network
  status            connection status
  help              this text
  quit              leave";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptCommand {
    Add(String),
    Buy(String),
    Unbuy(String),
    Suggest(String),
    List,
    Offline,
    Online,
    Status,
    Help,
    Quit,
    /// Blank line.
    Nothing,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
}

/// Parse one input line. Item names keep their inner spacing and case.
pub fn parse_line(line: &str) -> Result<PromptCommand, PromptError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let argument = |name: &'static str| {
        if rest.is_empty() {
            Err(PromptError::MissingArgument(name))
        } else {
            Ok(rest.to_string())
        }
    };

    match word.to_lowercase().as_str() {
        "" => Ok(PromptCommand::Nothing),
        "add" => argument("add").map(PromptCommand::Add),
        "buy" => argument("buy").map(PromptCommand::Buy),
        "unbuy" => argument("unbuy").map(PromptCommand::Unbuy),
        "suggest" => argument("suggest").map(PromptCommand::Suggest),
        "list" | "ls" => Ok(PromptCommand::List),
        "offline" => Ok(PromptCommand::Offline),
        "online" => Ok(PromptCommand::Online),
        "status" => Ok(PromptCommand::Status),
        "help" | "?" => Ok(PromptCommand::Help),
        "quit" | "exit" => Ok(PromptCommand::Quit),
        _ => Err(PromptError::Unknown(word.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_names_keep_spacing_and_case() {
        assert_eq!(
            parse_line("  add   Oat milk  "),
            Ok(PromptCommand::Add("Oat milk".to_string()))
        );
        assert_eq!(
            parse_line("BUY Bread"),
            Ok(PromptCommand::Buy("Bread".to_string()))
        );
    }

    #[test]
    fn test_bare_commands() {
        assert_eq!(parse_line("list"), Ok(PromptCommand::List));
        assert_eq!(parse_line("offline"), Ok(PromptCommand::Offline));
        assert_eq!(parse_line("quit"), Ok(PromptCommand::Quit));
        assert_eq!(parse_line("   "), Ok(PromptCommand::Nothing));
    }

    #[test]
    fn test_missing_argument() {
        assert_eq!(parse_line("unbuy"), Err(PromptError::MissingArgument("unbuy")));
        assert_eq!(parse_line("suggest  "), Err(PromptError::MissingArgument("suggest")));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_line("remove Milk"),
            Err(PromptError::Unknown("remove".to_string()))
        );
    }
}
