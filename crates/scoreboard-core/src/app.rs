//! Application controller.
//!
//! `App` owns configuration, client storage, the signed-in session, the data
//! access layer, the notification list and the periodic background tasks.
//! Front ends call its flows (`login_team`, `add_points`, ...) and render the
//! dashboards it keeps up to date.

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, ApiResponse, DataAccess};
use crate::auth::{Session, SessionStore};
use crate::cache::Storage;
use crate::config::Config;
use crate::lifecycle::{TaskManager, POLL_TASK, REFRESH_TASK};
use crate::models::{
    gap_to_next, Achievement, Admin, EventInfo, Notification, PointGrant, RatingEntry, Severity,
    Stats, Task, Team, Transaction,
};
use crate::notifications::NotificationCenter;
use crate::prefs::Preferences;

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Transactions shown on the admin dashboard.
const ADMIN_TRANSACTION_LIMIT: usize = 50;

const OFFLINE_NOTICE: &str = "Сервер недоступен. Включен демо-режим";

/// Data shown to a signed-in team.
#[derive(Debug, Clone, Default)]
pub struct TeamDashboard {
    pub team: Option<Team>,
    pub rating: Vec<RatingEntry>,
    pub transactions: Vec<Transaction>,
    pub achievements: Vec<Achievement>,
    pub tasks: Vec<Task>,
}

impl TeamDashboard {
    /// 1-based rating position of the signed-in team.
    pub fn position(&self) -> Option<usize> {
        let id = self.team.as_ref()?.id;
        self.rating.iter().find(|r| r.team.id == id).map(|r| r.position)
    }

    /// Points needed to catch the team ranked just above.
    pub fn points_to_next(&self) -> Option<i64> {
        gap_to_next(&self.rating, self.team.as_ref()?.id)
    }
}

/// Data shown to a signed-in admin.
#[derive(Debug, Clone, Default)]
pub struct AdminDashboard {
    pub teams: Vec<Team>,
    pub transactions: Vec<Transaction>,
    pub stats: Option<Stats>,
    pub event: Option<EventInfo>,
}

/// What the background refresh fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshScope {
    Team(i64),
    Admin,
}

/// Results delivered by dashboard loads and background tasks.
#[derive(Debug)]
pub enum RefreshResult {
    Team(Team),
    Teams(Vec<Team>),
    Rating(Vec<RatingEntry>),
    /// Transactions for one team, or for all teams when `None`
    Transactions(Option<i64>, Vec<Transaction>),
    Achievements(Vec<Achievement>),
    Tasks(Vec<Task>),
    Stats(Stats),
    Event(EventInfo),
    Notifications(Vec<Notification>),
    Error(String),
}

/// A background result stamped with the task generation that produced it.
#[derive(Debug)]
struct Tagged {
    generation: u64,
    result: RefreshResult,
}

fn to_result<T>(
    name: &str,
    result: Result<T, ApiError>,
    wrapper: impl FnOnce(T) -> RefreshResult,
) -> RefreshResult {
    match result {
        Ok(data) => {
            debug!("{} fetched successfully", name);
            wrapper(data)
        }
        Err(e) => {
            warn!(error = %e, "{} fetch failed", name);
            RefreshResult::Error(format!("{}: {}", name, e.user_message()))
        }
    }
}

/// Error for the user: the server message, or the generic connectivity notice.
fn user_error(e: ApiError) -> anyhow::Error {
    error!(error = %e, "Request failed");
    anyhow::anyhow!(e.user_message())
}

pub struct App {
    pub config: Config,
    storage: Storage,
    sessions: SessionStore,
    pub prefs: Preferences,
    data: DataAccess,
    session: Option<Session>,

    pub notifications: NotificationCenter,
    pub team_dashboard: TeamDashboard,
    pub admin_dashboard: AdminDashboard,
    pub status_message: Option<String>,

    tasks: TaskManager,
    refresh_rx: mpsc::Receiver<Tagged>,
    refresh_tx: mpsc::Sender<Tagged>,
}

impl App {
    /// Create the app with client storage in the cache directory.
    pub fn new(config: Config) -> Result<Self> {
        let path = config.storage_path()?;
        let storage = Storage::open(&path)
            .with_context(|| format!("Failed to open storage at {}", path.display()))?;
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: Config, storage: Storage) -> Result<Self> {
        let data = DataAccess::from_config(&config, storage.clone())
            .context("Failed to create API client")?;
        debug!(source = data.source_name(), "Data access configured");

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        Ok(Self {
            sessions: SessionStore::new(storage.clone()),
            prefs: Preferences::new(storage.clone()),
            storage,
            config,
            data,
            session: None,
            notifications: NotificationCenter::new(),
            team_dashboard: TeamDashboard::default(),
            admin_dashboard: AdminDashboard::default(),
            status_message: None,
            tasks: TaskManager::new(),
            refresh_rx: rx,
            refresh_tx: tx,
        })
    }

    pub fn data(&self) -> &DataAccess {
        &self.data
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_demo(&self) -> bool {
        self.data.is_demo()
    }

    pub fn active_tasks(&self) -> Vec<&'static str> {
        self.tasks.active()
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub async fn login_team(&mut self, code: &str, player_name: &str) -> Result<Session> {
        let code = code.trim();
        let player_name = player_name.trim();
        if code.is_empty() {
            bail!("Введите код команды");
        }
        if player_name.is_empty() {
            bail!("Введите ваше имя");
        }

        let response = self
            .data
            .login_team(code)
            .await
            .and_then(ApiResponse::into_result)
            .map_err(user_error)?;
        let team = response
            .require::<Team>("team")
            .map_err(user_error)?;

        info!(team = %team.code, "Team signed in");
        let session = Session::Team {
            team: team.clone(),
            player_name: player_name.to_string(),
            token: response.token().map(str::to_string),
        };
        self.start_session(session.clone())?;
        self.team_dashboard.team = Some(team);
        Ok(session)
    }

    pub async fn login_admin(&mut self, username: &str, password: &str) -> Result<Session> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            bail!("Введите логин и пароль");
        }

        let response = self
            .data
            .login_admin(username, password)
            .await
            .and_then(ApiResponse::into_result)
            .map_err(user_error)?;
        let admin = response
            .admin()
            .map_err(user_error)?
            .unwrap_or_else(|| Admin {
                username: username.to_string(),
                role: None,
            });

        info!(admin = %admin.username, "Admin signed in");
        let session = Session::Admin {
            admin,
            token: response.token().map(str::to_string),
        };
        self.start_session(session.clone())?;
        Ok(session)
    }

    fn start_session(&mut self, session: Session) -> Result<()> {
        self.tasks.shutdown();
        self.team_dashboard = TeamDashboard::default();
        self.admin_dashboard = AdminDashboard::default();
        self.sessions.save(&session)?;
        self.session = Some(session);
        Ok(())
    }

    /// Stop background work and forget the session and cached data.
    pub fn logout(&mut self) -> Result<()> {
        self.tasks.shutdown();
        self.sessions.clear()?;
        self.data.clear_cache();
        self.session = None;
        self.team_dashboard = TeamDashboard::default();
        self.admin_dashboard = AdminDashboard::default();
        self.notifications.clear();
        info!("Signed out");
        Ok(())
    }

    /// Check connectivity, then bring back a saved session.
    ///
    /// When the service is unreachable the app switches to demo data. A saved
    /// team is revalidated; it is dropped only if the service says it no
    /// longer exists.
    pub async fn restore_session(&mut self) -> Result<Option<&Session>> {
        if !self.data.is_demo() {
            if let Err(e) = self.data.health_check().await {
                warn!(error = %e, "Health check failed");
                self.data.switch_to_demo();
                self.notifications.push(OFFLINE_NOTICE, Severity::Warning);
            }
        }

        let Some(saved) = self.sessions.load()? else {
            return Ok(None);
        };

        let session = match saved {
            Session::Team {
                team,
                player_name,
                token,
            } => match self.data.get_team(&team.id.to_string()).await {
                Ok(fresh) => {
                    self.sessions.update_team(&fresh)?;
                    Session::Team {
                        team: fresh,
                        player_name,
                        token,
                    }
                }
                Err(ApiError::Api(msg)) => {
                    warn!(team = %team.code, %msg, "Saved team rejected, clearing session");
                    self.sessions.clear()?;
                    return Ok(None);
                }
                Err(e) => {
                    warn!(error = %e, "Could not revalidate team, using saved data");
                    Session::Team {
                        team,
                        player_name,
                        token,
                    }
                }
            },
            admin @ Session::Admin { .. } => admin,
        };

        self.team_dashboard.team = session.team().cloned();
        self.session = Some(session);
        Ok(self.session.as_ref())
    }

    // =========================================================================
    // Dashboards
    // =========================================================================

    /// Load everything the team view shows. Returns how many parts failed.
    pub async fn load_team_dashboard(&mut self) -> Result<usize> {
        let team_id = match self.session {
            Some(Session::Team { ref team, .. }) => team.id,
            _ => bail!("Требуется вход команды"),
        };
        let id = team_id.to_string();

        let data = &self.data;
        let (team, rating, transactions, achievements, tasks, notifications) = tokio::join!(
            data.get_team(&id),
            data.get_rating(),
            data.get_transactions(Some(team_id), None),
            data.get_achievements(),
            data.get_tasks(),
            data.get_notifications(Some(team_id), false),
        );

        let results = vec![
            to_result("Team", team, RefreshResult::Team),
            to_result("Rating", rating, RefreshResult::Rating),
            to_result("Transactions", transactions, |t| {
                RefreshResult::Transactions(Some(team_id), t)
            }),
            to_result("Achievements", achievements, RefreshResult::Achievements),
            to_result("Tasks", tasks, RefreshResult::Tasks),
            to_result("Notifications", notifications, RefreshResult::Notifications),
        ];
        Ok(self.apply_all(results))
    }

    /// Load everything the admin view shows. Returns how many parts failed.
    pub async fn load_admin_dashboard(&mut self) -> Result<usize> {
        if !self.session.as_ref().is_some_and(Session::is_admin) {
            bail!("Требуется вход администратора");
        }

        let data = &self.data;
        let (teams, transactions, stats, event) = tokio::join!(
            data.get_teams(),
            data.get_transactions(None, Some(ADMIN_TRANSACTION_LIMIT)),
            data.get_stats(),
            data.get_event_info(),
        );

        let results = vec![
            to_result("Teams", teams, RefreshResult::Teams),
            to_result("Transactions", transactions, |t| {
                RefreshResult::Transactions(None, t)
            }),
            to_result("Stats", stats, RefreshResult::Stats),
            to_result("Event", event, RefreshResult::Event),
        ];
        Ok(self.apply_all(results))
    }

    fn apply_all(&mut self, results: Vec<RefreshResult>) -> usize {
        let mut failed = 0;
        for result in results {
            if matches!(result, RefreshResult::Error(_)) {
                failed += 1;
            }
            self.process_refresh_result(result);
        }
        failed
    }

    // =========================================================================
    // Admin actions
    // =========================================================================

    /// Grant points to a team as the signed-in admin. Returns the updated
    /// team when the service reports it.
    pub async fn add_points(
        &mut self,
        team_id: i64,
        points: i64,
        reason: &str,
        comment: &str,
    ) -> Result<Option<Team>> {
        let moderator = match self.session {
            Some(ref session @ Session::Admin { .. }) => session.moderator(),
            _ => bail!("Требуется вход администратора"),
        };
        if team_id <= 0 {
            bail!("Выберите команду");
        }
        if points == 0 {
            bail!("Укажите количество баллов");
        }
        let reason = reason.trim();
        if reason.is_empty() {
            bail!("Укажите причину начисления");
        }

        let grant = PointGrant {
            team_id,
            points,
            reason: reason.to_string(),
            moderator,
            comment: comment.trim().to_string(),
        };
        let response = self
            .data
            .add_points(&grant)
            .await
            .and_then(ApiResponse::into_result)
            .map_err(user_error)?;

        self.data.clear_cache();
        let team = response.team().map_err(user_error)?;
        let label = team
            .as_ref()
            .map_or_else(|| format!("#{}", team_id), |t| t.name.clone());
        info!(team_id, points, "Points granted");
        self.notifications.push(
            format!("Команде {} начислено {} баллов", label, points),
            Severity::Success,
        );
        Ok(team)
    }

    /// Mark a notification read locally and on the service.
    pub async fn mark_notification_read(&mut self, id: i64) -> Result<()> {
        self.notifications.mark_read(id);
        if id > 0 {
            self.data
                .mark_notification_read(id)
                .await
                .map_err(user_error)?;
        }
        Ok(())
    }

    // =========================================================================
    // Background refresh
    // =========================================================================

    fn refresh_scope(&self) -> Option<RefreshScope> {
        match self.session.as_ref()? {
            Session::Team { team, .. } => Some(RefreshScope::Team(team.id)),
            Session::Admin { .. } => Some(RefreshScope::Admin),
        }
    }

    /// Start the periodic dashboard refresh and, for teams, notification polling.
    pub fn start_background(&mut self) {
        let Some(scope) = self.refresh_scope() else {
            debug!("No session, background tasks not started");
            return;
        };
        self.tasks.shutdown();

        let data = self.data.clone();
        let tx = self.refresh_tx.clone();
        self.tasks
            .spawn_periodic(REFRESH_TASK, self.config.refresh_interval(), move |generation| {
                let data = data.clone();
                let tx = tx.clone();
                async move { Self::execute_background_refresh(tx, generation, data, scope).await }
            });

        if let RefreshScope::Team(team_id) = scope {
            let data = self.data.clone();
            let tx = self.refresh_tx.clone();
            self.tasks
                .spawn_periodic(POLL_TASK, self.config.poll_interval(), move |generation| {
                    let data = data.clone();
                    let tx = tx.clone();
                    async move {
                        let result = to_result(
                            "Notifications",
                            data.get_notifications(Some(team_id), true).await,
                            RefreshResult::Notifications,
                        );
                        Self::send_result(&tx, generation, result).await;
                    }
                });
        }
        info!(?scope, "Background tasks started");
    }

    pub fn stop_background(&mut self) {
        self.tasks.shutdown();
    }

    /// Helper to send refresh results, logging any channel errors
    async fn send_result(tx: &mpsc::Sender<Tagged>, generation: u64, result: RefreshResult) {
        if let Err(e) = tx.send(Tagged { generation, result }).await {
            error!(error = %e, "Failed to send refresh result - channel closed");
        }
    }

    async fn execute_background_refresh(
        tx: mpsc::Sender<Tagged>,
        generation: u64,
        data: DataAccess,
        scope: RefreshScope,
    ) {
        let results = match scope {
            RefreshScope::Team(team_id) => {
                let id = team_id.to_string();
                let (team, rating, transactions) = tokio::join!(
                    data.get_team(&id),
                    data.get_rating(),
                    data.get_transactions(Some(team_id), None),
                );
                vec![
                    to_result("Team", team, RefreshResult::Team),
                    to_result("Rating", rating, RefreshResult::Rating),
                    to_result("Transactions", transactions, |t| {
                        RefreshResult::Transactions(Some(team_id), t)
                    }),
                ]
            }
            RefreshScope::Admin => {
                let (teams, transactions, stats) = tokio::join!(
                    data.get_teams(),
                    data.get_transactions(None, Some(ADMIN_TRANSACTION_LIMIT)),
                    data.get_stats(),
                );
                vec![
                    to_result("Teams", teams, RefreshResult::Teams),
                    to_result("Transactions", transactions, |t| {
                        RefreshResult::Transactions(None, t)
                    }),
                    to_result("Stats", stats, RefreshResult::Stats),
                ]
            }
        };

        for result in results {
            Self::send_result(&tx, generation, result).await;
        }
    }

    /// Apply finished background results. Results from tasks stopped since
    /// they were sent are dropped. Returns how many were applied.
    pub fn check_background_tasks(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(tagged) = self.refresh_rx.try_recv() {
            if !self.tasks.is_current(tagged.generation) {
                debug!(generation = tagged.generation, "Dropping stale refresh result");
                continue;
            }
            self.process_refresh_result(tagged.result);
            applied += 1;
        }
        applied
    }

    fn process_refresh_result(&mut self, result: RefreshResult) {
        match result {
            RefreshResult::Team(team) => {
                if let Some(Session::Team { team: ref mut current, .. }) = self.session {
                    if current.id == team.id {
                        *current = team.clone();
                        if let Err(e) = self.sessions.update_team(&team) {
                            warn!(error = %e, "Failed to save refreshed team");
                        }
                    }
                }
                self.team_dashboard.team = Some(team);
            }
            RefreshResult::Teams(teams) => self.admin_dashboard.teams = teams,
            RefreshResult::Rating(rating) => self.team_dashboard.rating = rating,
            RefreshResult::Transactions(Some(_), list) => self.team_dashboard.transactions = list,
            RefreshResult::Transactions(None, list) => self.admin_dashboard.transactions = list,
            RefreshResult::Achievements(list) => self.team_dashboard.achievements = list,
            RefreshResult::Tasks(list) => self.team_dashboard.tasks = list,
            RefreshResult::Stats(stats) => self.admin_dashboard.stats = Some(stats),
            RefreshResult::Event(event) => self.admin_dashboard.event = Some(event),
            RefreshResult::Notifications(list) => {
                let added = self.notifications.merge(list);
                if added > 0 {
                    debug!(added, "New notifications");
                }
            }
            RefreshResult::Error(msg) => self.status_message = Some(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn demo_config() -> Config {
        Config {
            demo_mode: true,
            demo_delay_ms: 0,
            refresh_interval_ms: 10,
            poll_interval_ms: 5,
            ..Config::default()
        }
    }

    fn demo_app() -> App {
        App::with_storage(demo_config(), Storage::in_memory()).unwrap()
    }

    async fn admin_app() -> App {
        let mut app = demo_app();
        app.login_admin("admin", "admin").await.unwrap();
        app
    }

    #[tokio::test]
    async fn test_login_team_saves_session() {
        let storage = Storage::in_memory();
        let mut app = App::with_storage(demo_config(), storage.clone()).unwrap();

        let session = app.login_team("team03", "Аня").await.unwrap();
        assert_eq!(session.team().map(|t| t.code.as_str()), Some("TEAM03"));
        assert!(storage.get_item("session_team").is_some());
        assert!(storage.get_item("session_player").is_some());
    }

    #[tokio::test]
    async fn test_login_errors_are_user_messages() {
        let mut app = demo_app();
        let err = app.login_team("TEAM99", "Аня").await.unwrap_err();
        assert_eq!(err.to_string(), "Команда не найдена");
        assert!(app.login_team(" ", "Аня").await.is_err());
        assert!(app.session().is_none());

        let err = app.login_admin("admin", "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), "Неверные учетные данные");
    }

    #[tokio::test]
    async fn test_admin_grants_points() {
        let mut app = admin_app().await;
        let team = app.add_points(3, 50, "Викторина", "").await.unwrap().unwrap();
        assert_eq!(team.score, 570);
        assert_eq!(app.data().get_team("3").await.unwrap().score, 570);

        let history = app.data().get_transactions(Some(3), Some(1)).await.unwrap();
        assert_eq!(history[0].moderator, "admin");
        assert_eq!(history[0].reason, "Викторина");
        assert_eq!(app.notifications.unread_count(), 1);
    }

    #[tokio::test]
    async fn test_add_points_validation() {
        let mut app = demo_app();
        assert!(app.add_points(3, 50, "Викторина", "").await.is_err());

        let mut app = admin_app().await;
        assert!(app.add_points(0, 50, "Викторина", "").await.is_err());
        assert!(app.add_points(3, 50, "   ", "").await.is_err());
        assert!(app.add_points(3, 0, "Викторина", "").await.is_err());
        assert_eq!(app.data().get_team("3").await.unwrap().score, 520);
    }

    #[tokio::test]
    async fn test_logout_clears_session_and_cache() {
        let storage = Storage::in_memory();
        let mut app = App::with_storage(demo_config(), storage.clone()).unwrap();
        app.prefs.set_theme(crate::prefs::Theme::Light).unwrap();
        app.login_team("TEAM01", "Аня").await.unwrap();
        app.load_team_dashboard().await.unwrap();
        assert!(storage.get_item("cache_rating").is_some());

        app.logout().unwrap();
        assert!(app.session().is_none());
        assert_eq!(storage.keys(), vec!["prefs_theme".to_string()]);
    }

    #[tokio::test]
    async fn test_restore_session_revalidates_team() {
        let storage = Storage::in_memory();
        {
            let mut app = App::with_storage(demo_config(), storage.clone()).unwrap();
            app.login_team("TEAM02", "Миша").await.unwrap();
        }

        let mut app = App::with_storage(demo_config(), storage).unwrap();
        let restored = app.restore_session().await.unwrap().cloned();
        match restored {
            Some(Session::Team { team, player_name, .. }) => {
                assert_eq!(team.id, 2);
                assert_eq!(player_name, "Миша");
            }
            other => panic!("unexpected session: {other:?}"),
        }
        assert_eq!(app.team_dashboard.team.as_ref().map(|t| t.id), Some(2));
    }

    #[tokio::test]
    async fn test_restore_offline_switches_to_demo() {
        let config = Config {
            api_url: "http://127.0.0.1:1/exec".to_string(),
            demo_delay_ms: 0,
            request_timeout_secs: 5,
            ..Config::default()
        };
        let mut app = App::with_storage(config, Storage::in_memory()).unwrap();
        assert!(!app.is_demo());

        assert!(app.restore_session().await.unwrap().is_none());
        assert!(app.is_demo());
        let notice = app.notifications.iter().next().unwrap();
        assert_eq!(notice.severity, Severity::Warning);
    }

    #[tokio::test]
    async fn test_team_dashboard_loads_all_parts() {
        let mut app = demo_app();
        app.login_team("TEAM03", "Аня").await.unwrap();
        assert_eq!(app.load_team_dashboard().await.unwrap(), 0);

        let dash = &app.team_dashboard;
        assert_eq!(dash.position(), Some(3));
        assert_eq!(dash.points_to_next(), Some(60));
        assert!(!dash.achievements.is_empty());
        assert!(!dash.tasks.is_empty());
        assert!(app.notifications.len() > 0);
        assert!(app.load_admin_dashboard().await.is_err());
    }

    #[tokio::test]
    async fn test_admin_dashboard_loads_all_parts() {
        let mut app = admin_app().await;
        assert_eq!(app.load_admin_dashboard().await.unwrap(), 0);
        assert_eq!(app.admin_dashboard.teams.len(), 6);
        assert_eq!(app.admin_dashboard.stats.as_ref().map(|s| s.teams), Some(6));
        assert!(app.admin_dashboard.event.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_results_applied_then_dropped_after_stop() {
        let mut app = demo_app();
        app.login_team("TEAM01", "Аня").await.unwrap();
        app.start_background();
        assert_eq!(app.active_tasks(), vec![POLL_TASK, REFRESH_TASK]);

        tokio::time::sleep(Duration::from_millis(12)).await;
        assert!(app.check_background_tasks() > 0);
        assert!(!app.team_dashboard.rating.is_empty());

        tokio::time::sleep(Duration::from_millis(12)).await;
        app.stop_background();
        assert_eq!(app.check_background_tasks(), 0);
        assert!(app.active_tasks().is_empty());
    }
}
