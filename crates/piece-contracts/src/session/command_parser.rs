use std::path::PathBuf;

use super::command_registry::{CommandSpec, NO_ARG_COMMANDS, PATH_COMMANDS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Open(PathBuf),
    Reset,
    Status,
    Help,
    Quit,
    Noop,
    /// A slash command that is unknown or missing its argument.
    Invalid(String),
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

/// Terminals quote dropped paths that contain spaces.
fn unquote_path(raw: &str) -> &str {
    let trimmed = raw.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.trim();
        }
    }
    trimmed
}

pub fn parse_command(input: &str) -> SessionCommand {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return SessionCommand::Noop;
    }

    let Some(body) = trimmed.strip_prefix('/') else {
        return SessionCommand::Open(PathBuf::from(unquote_path(trimmed)));
    };
    let (command, arg) = match body.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (body, ""),
    };
    let command = command.to_ascii_lowercase();

    if find_action(&command, PATH_COMMANDS).is_some() {
        let path = unquote_path(arg);
        if path.is_empty() {
            return SessionCommand::Invalid(format!("/{command} requires a path"));
        }
        return SessionCommand::Open(PathBuf::from(path));
    }

    match find_action(&command, NO_ARG_COMMANDS) {
        Some("reset") => SessionCommand::Reset,
        Some("status") => SessionCommand::Status,
        Some("help") => SessionCommand::Help,
        Some("quit") => SessionCommand::Quit,
        _ => SessionCommand::Invalid(format!("Unknown command: /{command}")),
    }
}
