use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub members: u32,
}

impl Team {
    /// Whether `id_or_code` names this team, by numeric id or by code.
    pub fn matches(&self, id_or_code: &str) -> bool {
        let needle = id_or_code.trim();
        match needle.parse::<i64>() {
            Ok(id) => id == self.id,
            Err(_) => self.code.eq_ignore_ascii_case(needle),
        }
    }

    pub fn display_members(&self) -> String {
        match self.members {
            1 => "1 member".to_string(),
            n => format!("{} members", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(id: i64, code: &str) -> Team {
        Team {
            id,
            code: code.to_string(),
            name: "Титаны".to_string(),
            score: 0,
            color: None,
            members: 4,
        }
    }

    #[test]
    fn test_matches_by_id_or_code() {
        let t = team(3, "TEAM03");
        assert!(t.matches("3"));
        assert!(t.matches("TEAM03"));
        assert!(t.matches("team03"));
        assert!(t.matches(" TEAM03 "));
        assert!(!t.matches("4"));
        assert!(!t.matches("TEAM04"));
    }

    #[test]
    fn test_deserialize_minimal_team() {
        let json = r#"{"id": 7, "code": "TEAM07", "name": "Орлы"}"#;
        let t: Team = serde_json::from_str(json).expect("minimal team should parse");
        assert_eq!(t.score, 0);
        assert_eq!(t.members, 0);
        assert!(t.color.is_none());
    }
}
