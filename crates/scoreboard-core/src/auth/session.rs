use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::cache::{NamespacedStore, Storage};
use crate::models::{Admin, Team};

const NAMESPACE: &str = "session";

const TEAM_KEY: &str = "team";
const PLAYER_KEY: &str = "player";
const ADMIN_KEY: &str = "admin";
const TOKEN_KEY: &str = "token";

/// Moderator name used when the admin has no username.
pub const DEFAULT_MODERATOR: &str = "Администратор";

#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    Team {
        team: Team,
        player_name: String,
        token: Option<String>,
    },
    Admin {
        admin: Admin,
        token: Option<String>,
    },
}

impl Session {
    pub fn token(&self) -> Option<&str> {
        match self {
            Session::Team { token, .. } | Session::Admin { token, .. } => token.as_deref(),
        }
    }

    pub fn team(&self) -> Option<&Team> {
        match self {
            Session::Team { team, .. } => Some(team),
            Session::Admin { .. } => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Session::Admin { .. })
    }

    /// Name recorded on point grants made in this session.
    pub fn moderator(&self) -> String {
        match self {
            Session::Admin { admin, .. } if !admin.username.trim().is_empty() => {
                admin.username.clone()
            }
            _ => DEFAULT_MODERATOR.to_string(),
        }
    }
}

/// Session persistence under `session_*` storage keys.
#[derive(Debug, Clone)]
pub struct SessionStore {
    store: NamespacedStore,
}

impl SessionStore {
    pub fn new(storage: Storage) -> Self {
        Self {
            store: NamespacedStore::new(storage),
        }
    }

    /// Load the saved session. Unreadable entries are dropped; when both a
    /// team and an admin session are present the team session wins.
    pub fn load(&self) -> Result<Option<Session>> {
        let token: Option<String> = self.store.get(NAMESPACE, TOKEN_KEY);
        let team: Option<Team> = self.store.get(NAMESPACE, TEAM_KEY);
        let player: Option<String> = self.store.get(NAMESPACE, PLAYER_KEY);
        let admin: Option<Admin> = self.store.get(NAMESPACE, ADMIN_KEY);

        match (team, player, admin) {
            (Some(team), Some(player_name), admin) => {
                if admin.is_some() {
                    warn!("Both team and admin sessions stored, keeping the team session");
                    self.remove(&[ADMIN_KEY])?;
                }
                debug!(team = %team.code, "Restored team session");
                Ok(Some(Session::Team {
                    team,
                    player_name,
                    token,
                }))
            }
            (team, player, Some(admin)) => {
                if team.is_some() || player.is_some() {
                    self.remove(&[TEAM_KEY, PLAYER_KEY])?;
                }
                debug!(admin = %admin.username, "Restored admin session");
                Ok(Some(Session::Admin { admin, token }))
            }
            (team, player, None) => {
                if team.is_some() || player.is_some() {
                    warn!("Incomplete team session stored, clearing it");
                    self.clear()?;
                }
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        match session {
            Session::Team {
                team,
                player_name,
                token,
            } => {
                self.remove(&[ADMIN_KEY])?;
                self.set(TEAM_KEY, team)?;
                self.set(PLAYER_KEY, player_name)?;
                self.set_token(token.as_deref())
            }
            Session::Admin { admin, token } => {
                self.remove(&[TEAM_KEY, PLAYER_KEY])?;
                self.set(ADMIN_KEY, admin)?;
                self.set_token(token.as_deref())
            }
        }
    }

    /// Replace the stored team after a refresh, keeping the rest of the session.
    pub fn update_team(&self, team: &Team) -> Result<()> {
        self.set(TEAM_KEY, team)
    }

    pub fn clear(&self) -> Result<()> {
        self.store
            .clear(NAMESPACE)
            .context("Failed to clear session")?;
        Ok(())
    }

    fn set<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.store
            .set(NAMESPACE, key, value, None)
            .with_context(|| format!("Failed to save session {}", key))
    }

    fn set_token(&self, token: Option<&str>) -> Result<()> {
        match token {
            Some(token) => self.set(TOKEN_KEY, &token),
            None => self.remove(&[TOKEN_KEY]),
        }
    }

    fn remove(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.store
                .remove(NAMESPACE, key)
                .with_context(|| format!("Failed to remove session {}", key))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team() -> Team {
        Team {
            id: 3,
            code: "TEAM03".to_string(),
            name: "Драконы".to_string(),
            score: 520,
            color: Some("#45B7D1".to_string()),
            members: 4,
        }
    }

    fn admin(username: &str) -> Admin {
        Admin {
            username: username.to_string(),
            role: None,
        }
    }

    fn team_session() -> Session {
        Session::Team {
            team: team(),
            player_name: "Аня".to_string(),
            token: Some("t-1".to_string()),
        }
    }

    #[test]
    fn test_round_trip_team_session() {
        let sessions = SessionStore::new(Storage::in_memory());
        sessions.save(&team_session()).unwrap();
        assert_eq!(sessions.load().unwrap(), Some(team_session()));
    }

    #[test]
    fn test_saving_admin_clears_team() {
        let storage = Storage::in_memory();
        let sessions = SessionStore::new(storage.clone());
        sessions.save(&team_session()).unwrap();
        sessions
            .save(&Session::Admin {
                admin: admin("root"),
                token: None,
            })
            .unwrap();

        assert_eq!(storage.keys(), vec!["session_admin".to_string()]);
        assert!(sessions.load().unwrap().unwrap().is_admin());
    }

    #[test]
    fn test_conflict_resolves_to_team() {
        let storage = Storage::in_memory();
        let sessions = SessionStore::new(storage.clone());
        sessions.save(&team_session()).unwrap();
        storage
            .set_item("session_admin", r#"{"data":{"username":"root"},"expires":null}"#)
            .unwrap();

        let loaded = sessions.load().unwrap().unwrap();
        assert_eq!(loaded.team().map(|t| t.id), Some(3));
        assert!(storage.get_item("session_admin").is_none());
    }

    #[test]
    fn test_corrupt_entry_is_dropped() {
        let storage = Storage::in_memory();
        storage.set_item("session_team", "{not json").unwrap();
        storage
            .set_item("session_player", r#"{"data":"Аня","expires":null}"#)
            .unwrap();
        let sessions = SessionStore::new(storage.clone());

        assert_eq!(sessions.load().unwrap(), None);
        assert!(storage.keys().is_empty());
    }

    #[test]
    fn test_clear_leaves_cache_entries() {
        let storage = Storage::in_memory();
        storage.set_item("cache_teams", "{}").unwrap();
        let sessions = SessionStore::new(storage.clone());
        sessions.save(&team_session()).unwrap();
        sessions.clear().unwrap();
        assert_eq!(storage.keys(), vec!["cache_teams".to_string()]);
    }

    #[test]
    fn test_moderator_name() {
        let named = Session::Admin {
            admin: admin("Ольга"),
            token: None,
        };
        let unnamed = Session::Admin {
            admin: admin(" "),
            token: None,
        };
        assert_eq!(named.moderator(), "Ольга");
        assert_eq!(unnamed.moderator(), DEFAULT_MODERATOR);
        assert_eq!(team_session().moderator(), DEFAULT_MODERATOR);
    }
}
