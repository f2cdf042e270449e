//! Parsing of the line-oriented terminal commands.

use magic_stories_core::catalog::Category;
use std::io::BufRead;
use std::str::FromStr;
use std::thread;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Pick an option; the query is a 1-based number, an id or a name.
    Select(Category, String),
    Create,
    Play,
    New,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("comando vazio")]
    Empty,
    #[error("não conheço o comando '{0}'; digite 'ajuda'")]
    Unknown(String),
    #[error("diga qual {0} você quer (número ou nome)")]
    MissingArgument(Category),
}

impl FromStr for UserCommand {
    type Err = InputError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        if word.is_empty() {
            return Err(InputError::Empty);
        }

        let select = |category| {
            if rest.is_empty() {
                Err(InputError::MissingArgument(category))
            } else {
                Ok(UserCommand::Select(category, rest.to_string()))
            }
        };

        match word.to_lowercase().as_str() {
            "heroi" | "herói" | "h" => select(Category::Hero),
            "mundo" | "w" => select(Category::World),
            "aventura" | "q" => select(Category::Quest),
            "criar" | "go" => Ok(UserCommand::Create),
            "ouvir" | "parar" | "play" => Ok(UserCommand::Play),
            "nova" | "new" => Ok(UserCommand::New),
            "ajuda" | "help" | "?" => Ok(UserCommand::Help),
            "sair" | "quit" | "exit" => Ok(UserCommand::Quit),
            other => Err(InputError::Unknown(other.to_string())),
        }
    }
}

/// Forwards stdin lines to the event loop from a dedicated thread.
///
/// The channel closes at end of input. A blocking reader thread keeps the
/// async runtime free to shut down while a read is still pending.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read from stdin");
                    break;
                }
            }
        }
        debug!("Stdin reader finished");
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_commands_take_the_rest_of_the_line() {
        assert_eq!(
            "h 2".parse(),
            Ok(UserCommand::Select(Category::Hero, "2".to_string()))
        );
        assert_eq!(
            "  mundo   Reino Subaquático ".parse(),
            Ok(UserCommand::Select(
                Category::World,
                "Reino Subaquático".to_string()
            ))
        );
        assert_eq!(
            "Aventura festa".parse(),
            Ok(UserCommand::Select(Category::Quest, "festa".to_string()))
        );
        assert_eq!(
            "herói fada".parse(),
            Ok(UserCommand::Select(Category::Hero, "fada".to_string()))
        );
    }

    #[test]
    fn selection_without_argument_is_rejected() {
        assert_eq!(
            "q".parse::<UserCommand>(),
            Err(InputError::MissingArgument(Category::Quest))
        );
    }

    #[test]
    fn action_aliases() {
        for (line, expected) in [
            ("criar", UserCommand::Create),
            ("GO", UserCommand::Create),
            ("ouvir", UserCommand::Play),
            ("play", UserCommand::Play),
            ("nova", UserCommand::New),
            ("new", UserCommand::New),
            ("ajuda", UserCommand::Help),
            ("sair", UserCommand::Quit),
            ("quit", UserCommand::Quit),
        ] {
            assert_eq!(line.parse(), Ok(expected), "parsing {line:?}");
        }
    }

    #[test]
    fn blank_and_unknown_lines() {
        assert_eq!("   ".parse::<UserCommand>(), Err(InputError::Empty));
        assert_eq!(
            "dance".parse::<UserCommand>(),
            Err(InputError::Unknown("dance".to_string()))
        );
    }
}
