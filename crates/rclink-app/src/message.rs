//! Input messages handled by the control engine
//!
//! A driver (keyboard, stdin, script) turns user input into [`Message`]s.
//! The line syntax is:
//!
//! ```text
//! press <key>          release <key>        toggle <key>
//! set <key> <value>    status               quit
//! ```

use std::str::FromStr;

use rclink_core::prelude::*;
use rclink_core::{CommandKey, Value};

/// All user intents the engine understands
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A control was pressed (may repeat while held)
    Press(CommandKey),

    /// A control was released
    Release(CommandKey),

    /// Flip a control regardless of its class
    Toggle(CommandKey),

    /// Write a raw value
    Set(CommandKey, Value),

    /// Report the dashboard
    Status,

    /// Close the session
    Quit,
}

impl FromStr for Message {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let verb = words
            .next()
            .ok_or_else(|| Error::invalid_command("empty command"))?;

        let message = match verb {
            "press" => Message::Press(key_arg(words.next())?),
            "release" => Message::Release(key_arg(words.next())?),
            "toggle" => Message::Toggle(key_arg(words.next())?),
            "set" => {
                let key = key_arg(words.next())?;
                let literal = words
                    .next()
                    .ok_or_else(|| Error::invalid_command("set needs a value"))?;
                let value = Value::parse_literal(literal)
                    .ok_or_else(|| Error::invalid_command(format!("not a value: {literal}")))?;
                Message::Set(key, value)
            }
            "status" => Message::Status,
            "quit" | "exit" => Message::Quit,
            other => return Err(Error::invalid_command(format!("unknown command: {other}"))),
        };

        if let Some(extra) = words.next() {
            return Err(Error::invalid_command(format!("unexpected argument: {extra}")));
        }
        Ok(message)
    }
}

fn key_arg(word: Option<&str>) -> Result<CommandKey> {
    word.ok_or_else(|| Error::invalid_command("missing control name"))?
        .parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_press_and_release() {
        assert_eq!(
            "press forward".parse::<Message>().unwrap(),
            Message::Press(CommandKey::Forward)
        );
        assert_eq!(
            "  release   turn_left ".parse::<Message>().unwrap(),
            Message::Release(CommandKey::TurnLeft)
        );
    }

    #[test]
    fn test_parse_set_value() {
        assert_eq!(
            "set lights on".parse::<Message>().unwrap(),
            Message::Set(CommandKey::Lights, Value::Bool(true))
        );
        assert_eq!(
            "set horn 1".parse::<Message>().unwrap(),
            Message::Set(CommandKey::Horn, Value::Int(1))
        );
    }

    #[test]
    fn test_parse_bare_verbs() {
        assert_eq!("status".parse::<Message>().unwrap(), Message::Status);
        assert_eq!("quit".parse::<Message>().unwrap(), Message::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<Message>().is_err());
        assert!("press".parse::<Message>().is_err());
        assert!(matches!(
            "press warp_drive".parse::<Message>(),
            Err(Error::UnknownKey { .. })
        ));
        assert!("set lights".parse::<Message>().is_err());
        assert!("set lights maybe".parse::<Message>().is_err());
        assert!("toggle lights now".parse::<Message>().is_err());
        assert!(matches!(
            "fly".parse::<Message>(),
            Err(Error::InvalidCommand { message }) if message == "unknown command: fly"
        ));
    }
}
