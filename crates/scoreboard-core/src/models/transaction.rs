use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded point change for a team. Read-only on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub id: i64,
    pub team_id: i64,
    pub points: i64,
    pub reason: String,
    pub moderator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Signed point delta, e.g. `+50` or `-10`.
    pub fn display_points(&self) -> String {
        crate::utils::format_delta(self.points)
    }
}

/// Body of an `addPoints` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointGrant {
    pub team_id: i64,
    pub points: i64,
    pub reason: String,
    pub moderator: String,
    #[serde(default)]
    pub comment: String,
}
