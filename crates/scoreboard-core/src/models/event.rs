//! Event-level models: achievements, tasks, statistics and event info.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: i64,
    pub name: String,
    #[serde(rename = "desc", default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub earned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub reward: i64,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(default)]
    pub teams: usize,
    #[serde(default)]
    pub total_points: i64,
    #[serde(default)]
    pub total_members: u64,
    #[serde(default)]
    pub tasks: usize,
    #[serde(default)]
    pub transactions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub starts: Option<String>,
    #[serde(default)]
    pub ends: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    pub username: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Number of earned achievements.
pub fn earned_count(achievements: &[Achievement]) -> usize {
    achievements.iter().filter(|a| a.earned).count()
}
