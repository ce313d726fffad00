use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, WireError};

/// Text message type carrying a viewer control command.
pub const TYPE_CONTROL: &str = "control";
/// Text message type selecting a person to track.
pub const TYPE_TRACK: &str = "pt_track";

/// Control command: restart the producer's algorithm.
pub const COMMAND_RESET: &str = "reset";
/// Control command: stop streaming.
pub const COMMAND_STOP: &str = "stop";
/// Control command: load the recognition database.
pub const COMMAND_LOAD_DATABASE: &str = "load_pt_db";

/// Inbound command from the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Reset,
    Stop,
    LoadDatabase,
    /// Track the person with this identifier.
    Track(String),
}

#[derive(Deserialize)]
struct RawControl {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(default)]
    command: Value,
}

impl ControlCommand {
    /// Serialize as the viewer would send it.
    pub fn to_json(&self) -> String {
        let (msg_type, command) = match self {
            Self::Reset => (TYPE_CONTROL, COMMAND_RESET),
            Self::Stop => (TYPE_CONTROL, COMMAND_STOP),
            Self::LoadDatabase => (TYPE_CONTROL, COMMAND_LOAD_DATABASE),
            Self::Track(id) => (TYPE_TRACK, id.as_str()),
        };
        serde_json::json!({ "type": msg_type, "command": command }).to_string()
    }
}

/// Parse an inbound text message into a control command.
///
/// `pt_track` accepts the id as a string or a number. Anything else that is
/// valid JSON yields [`WireError::Unhandled`].
pub fn parse_control(text: &str) -> Result<ControlCommand> {
    let raw: RawControl = serde_json::from_str(text)?;
    let command = match &raw.command {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };

    match (raw.msg_type.as_str(), command.as_deref()) {
        (TYPE_CONTROL, Some(COMMAND_RESET)) => Ok(ControlCommand::Reset),
        (TYPE_CONTROL, Some(COMMAND_STOP)) => Ok(ControlCommand::Stop),
        (TYPE_CONTROL, Some(COMMAND_LOAD_DATABASE)) => Ok(ControlCommand::LoadDatabase),
        (TYPE_TRACK, Some(id)) => Ok(ControlCommand::Track(id.to_string())),
        _ => Err(WireError::Unhandled {
            msg_type: raw.msg_type,
            command,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_commands() {
        assert_eq!(
            parse_control(r#"{"type":"control","command":"reset"}"#).unwrap(),
            ControlCommand::Reset
        );
        assert_eq!(
            parse_control(r#"{"type":"control","command":"stop"}"#).unwrap(),
            ControlCommand::Stop
        );
        assert_eq!(
            parse_control(r#"{"type":"control","command":"load_pt_db"}"#).unwrap(),
            ControlCommand::LoadDatabase
        );
    }

    #[test]
    fn track_accepts_string_or_number() {
        assert_eq!(
            parse_control(r#"{"type":"pt_track","command":"7"}"#).unwrap(),
            ControlCommand::Track("7".into())
        );
        assert_eq!(
            parse_control(r#"{"type":"pt_track","command":12}"#).unwrap(),
            ControlCommand::Track("12".into())
        );
    }

    #[test]
    fn unknown_command_is_unhandled() {
        let err = parse_control(r#"{"type":"control","command":"jump"}"#).unwrap_err();
        assert!(matches!(
            err,
            WireError::Unhandled { ref msg_type, command: Some(ref c) }
                if msg_type == "control" && c == "jump"
        ));
        assert!(matches!(
            parse_control(r#"{"type":"hello"}"#),
            Err(WireError::Unhandled { command: None, .. })
        ));
    }

    #[test]
    fn non_json_is_rejected() {
        assert!(matches!(parse_control("not json"), Err(WireError::Json(_))));
        assert!(matches!(parse_control(r#"{"command":"reset"}"#), Err(WireError::Json(_))));
    }

    #[test]
    fn to_json_parses_back() {
        for cmd in [
            ControlCommand::Reset,
            ControlCommand::Stop,
            ControlCommand::LoadDatabase,
            ControlCommand::Track("3".into()),
        ] {
            assert_eq!(parse_control(&cmd.to_json()).unwrap(), cmd);
        }
    }
}
