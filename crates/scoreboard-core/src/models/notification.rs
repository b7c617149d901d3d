use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A message for a team, or a broadcast when `team_id` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default)]
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i64>,
    pub message: String,
    #[serde(rename = "type", default)]
    pub severity: Severity,
    #[serde(default)]
    pub read: bool,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: 0,
            team_id: None,
            message: message.into(),
            severity,
            read: false,
            timestamp: Utc::now(),
        }
    }

    /// Whether the notification is addressed to `team_id` (broadcasts match every team).
    pub fn is_for(&self, team_id: i64) -> bool {
        self.team_id.map_or(true, |id| id == team_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_defaults_to_info() {
        let json = r#"{"message": "Новое задание доступно"}"#;
        let n: Notification = serde_json::from_str(json).expect("notification parses");
        assert_eq!(n.severity, Severity::Info);
        assert!(!n.read);
    }

    #[test]
    fn test_broadcast_is_for_every_team() {
        let mut n = Notification::new("Старт через 5 минут", Severity::Warning);
        assert!(n.is_for(1));
        n.team_id = Some(2);
        assert!(!n.is_for(1));
        assert!(n.is_for(2));
    }
}
