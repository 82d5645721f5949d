//! Line-oriented console input.
//!
//! Plain lines are player chat. Lines starting with `/` stand in for the
//! remote dialogue service so a scene can be driven without it.

use npc_core::FunctionCall;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("Usage: /call <function> [json arguments]")]
    MissingFunctionName,
    #[error("Invalid JSON arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),
    #[error("Usage: /reply <text>")]
    MissingReplyText,
    #[error("Unknown console directive: /{0}")]
    UnknownDirective(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    /// Nothing to do.
    Empty,
    /// Player text for the NPC.
    Chat(String),
    /// Simulated remote function call, broadcast through the registry.
    Call(FunctionCall),
    /// Simulated remote reply, delivered to the NPC's session.
    Reply(String),
    Quit,
}

impl ConsoleInput {
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Self::Empty);
        }
        let Some(directive) = line.strip_prefix('/') else {
            return Ok(Self::Chat(line.to_string()));
        };

        let (word, rest) = match directive.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (directive, ""),
        };
        match word {
            "quit" | "exit" => Ok(Self::Quit),
            "reply" if rest.is_empty() => Err(ConsoleError::MissingReplyText),
            "reply" => Ok(Self::Reply(rest.to_string())),
            "call" => {
                let (name, json) = match rest.split_once(char::is_whitespace) {
                    Some((name, json)) => (name, json.trim()),
                    None => (rest, ""),
                };
                if name.is_empty() {
                    return Err(ConsoleError::MissingFunctionName);
                }
                let arguments = if json.is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(json)?
                };
                Ok(Self::Call(FunctionCall::new(name, arguments)))
            }
            other => Err(ConsoleError::UnknownDirective(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_text_is_chat() {
        assert_eq!(
            ConsoleInput::parse("  move_to 3 4 ").unwrap(),
            ConsoleInput::Chat("move_to 3 4".into())
        );
        assert_eq!(ConsoleInput::parse("   ").unwrap(), ConsoleInput::Empty);
    }

    #[test]
    fn test_call_with_and_without_arguments() {
        assert_eq!(
            ConsoleInput::parse("/call attack_target").unwrap(),
            ConsoleInput::Call(FunctionCall::new("attack_target", json!({})))
        );
        assert_eq!(
            ConsoleInput::parse(r#"/call move_to {"x": 1, "z": 2}"#).unwrap(),
            ConsoleInput::Call(FunctionCall::new("move_to", json!({ "x": 1, "z": 2 })))
        );
    }

    #[test]
    fn test_call_errors() {
        assert!(matches!(
            ConsoleInput::parse("/call"),
            Err(ConsoleError::MissingFunctionName)
        ));
        assert!(matches!(
            ConsoleInput::parse("/call move {distance"),
            Err(ConsoleError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_reply_and_quit() {
        assert_eq!(
            ConsoleInput::parse("/reply Gold lies to the east.").unwrap(),
            ConsoleInput::Reply("Gold lies to the east.".into())
        );
        assert!(matches!(
            ConsoleInput::parse("/reply"),
            Err(ConsoleError::MissingReplyText)
        ));
        assert_eq!(ConsoleInput::parse("/quit").unwrap(), ConsoleInput::Quit);
        assert_eq!(ConsoleInput::parse("/exit").unwrap(), ConsoleInput::Quit);
    }

    #[test]
    fn test_unknown_directive() {
        let err = ConsoleInput::parse("/dance now").unwrap_err();
        assert_eq!(err.to_string(), "Unknown console directive: /dance");
    }
}
