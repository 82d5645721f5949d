use crate::math::Vec3;

/// Why a command was dropped. The agent's intent is untouched whenever one of
/// these is produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: '{0}'")]
    UnknownCommand(String),
    #[error("Cannot parse '{token}' as a number for argument '{argument}'")]
    ParseError { argument: String, token: String },
    #[error("Missing required argument '{0}'")]
    MissingArgument(&'static str),
    #[error("Invalid value for argument '{argument}': {value}")]
    InvalidArgument { argument: String, value: String },
    #[error("No navigable surface near {0}")]
    NotOnNavigableSurface(Vec3),
    #[error("No target found with tag '{tag}'")]
    TargetNotFound { tag: String },
}

/// Failures talking to the remote dialogue service.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Remote service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed response: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No remote session has been spawned")]
    SessionUnavailable,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("No listener registered under '{0}'")]
    UnknownListener(String),
    #[error("Listener '{0}' is no longer receiving")]
    ListenerClosed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        assert_eq!(
            CommandError::UnknownCommand("hello".into()).to_string(),
            "Unknown command: 'hello'"
        );
        assert_eq!(
            CommandError::ParseError {
                argument: "x".into(),
                token: "abc".into()
            }
            .to_string(),
            "Cannot parse 'abc' as a number for argument 'x'"
        );
        assert_eq!(
            CommandError::TargetNotFound { tag: "enemy".into() }.to_string(),
            "No target found with tag 'enemy'"
        );
    }

    #[test]
    fn test_session_error_wraps_transport() {
        let err: SessionError = TransportError::Status {
            status: 503,
            body: "busy".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Remote service returned 503: busy");
    }
}
