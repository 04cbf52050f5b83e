use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A queue retains at most this many commands per device; older entries
/// are dropped when new ones arrive.
pub const MAX_QUEUED_COMMANDS: usize = 10;

/// Commands a device understands (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    StayAwake,
    ForceUpdate,
    UpdateNow,
    EnableStreaming,
    DisableStreaming,
}

/// Body of `POST /api/device-command/:deviceId`.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommandRequest {
    pub command: CommandKind,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// A command waiting for the device's next poll.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueuedCommand {
    pub command: CommandKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_kind_snake_case() {
        assert_eq!(
            serde_json::to_string(&CommandKind::StayAwake).unwrap(),
            "\"stay_awake\""
        );
        let parsed: CommandKind = serde_json::from_str("\"force_update\"").unwrap();
        assert_eq!(parsed, CommandKind::ForceUpdate);
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(serde_json::from_str::<CommandKind>("\"self_destruct\"").is_err());
    }

    #[test]
    fn test_request_rejects_unknown_fields() {
        let body = r#"{"command":"stay_awake","ttl":5}"#;
        assert!(serde_json::from_str::<CommandRequest>(body).is_err());
    }
}
