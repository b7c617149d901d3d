use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::debug;

use super::seed::{DemoDataset, DEMO_ADMIN_PASSWORD, DEMO_ADMIN_USERNAME};
use crate::api::{Action, ApiError, ApiRequest, ApiResponse, DataSource};
use crate::models::{rank_teams, Admin, Notification, Severity, Stats, Transaction};

const DEFAULT_TRANSACTION_LIMIT: usize = 20;

/// Data source answering from an in-memory dataset.
pub struct DemoSource {
    data: Mutex<DemoDataset>,
    delay: Duration,
}

impl DemoSource {
    pub fn new(delay: Duration) -> Self {
        Self::with_dataset(DemoDataset::seed(), delay)
    }

    pub fn with_dataset(dataset: DemoDataset, delay: Duration) -> Self {
        Self {
            data: Mutex::new(dataset),
            delay,
        }
    }

    fn data(&self) -> MutexGuard<'_, DemoDataset> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current dataset.
    pub fn snapshot(&self) -> DemoDataset {
        self.data().clone()
    }

    /// Answer `request` without the artificial delay.
    pub fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let Some(action) = request.known_action() else {
            return ApiResponse::failure(format!("Неизвестное действие: {}", request.action));
        };

        let mut data = self.data();
        match action {
            Action::LoginTeam => login_team(&data, request),
            Action::LoginAdmin => login_admin(request),
            Action::GetTeams => ApiResponse::ok().with("teams", &data.teams),
            Action::GetTeam => get_team(&data, request),
            Action::AddPoints => add_points(&mut data, request),
            Action::GetTransactions => get_transactions(&data, request),
            Action::GetRating => ApiResponse::ok().with("rating", rank_teams(&data.teams)),
            Action::GetTasks => ApiResponse::ok().with("tasks", &data.tasks),
            Action::GetAchievements => ApiResponse::ok().with("achievements", &data.achievements),
            Action::GetNotifications => get_notifications(&data, request),
            Action::MarkNotificationRead => mark_notification_read(&mut data, request),
            Action::GetStats => ApiResponse::ok().with("stats", stats(&data)),
            Action::HealthCheck => ApiResponse::ok()
                .with("status", "ok")
                .with("mode", "demo")
                .with("timestamp", Utc::now().to_rfc3339()),
            Action::GetEventInfo => ApiResponse::ok().with("event", &data.event),
        }
    }
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[async_trait]
impl DataSource for DemoSource {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn fetch(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        debug!(action = %request.action, "Serving demo response");
        Ok(self.handle(request))
    }
}

fn login_team(data: &DemoDataset, request: &ApiRequest) -> ApiResponse {
    let code = request.arg_str("code").unwrap_or_default();
    match data
        .teams
        .iter()
        .find(|t| t.code.eq_ignore_ascii_case(code.trim()))
    {
        Some(team) => ApiResponse::ok()
            .with("team", team)
            .with("token", format!("demo-team-{}", team.id)),
        None => ApiResponse::failure("Команда не найдена"),
    }
}

fn login_admin(request: &ApiRequest) -> ApiResponse {
    let username = request.arg_str("username").unwrap_or_default();
    let password = request.arg_str("password").unwrap_or_default();
    if username == DEMO_ADMIN_USERNAME && password == DEMO_ADMIN_PASSWORD {
        let admin = Admin {
            username,
            role: Some("admin".to_string()),
        };
        ApiResponse::ok()
            .with("admin", admin)
            .with("token", "demo-admin")
    } else {
        ApiResponse::failure("Неверные учетные данные")
    }
}

fn get_team(data: &DemoDataset, request: &ApiRequest) -> ApiResponse {
    let key = request
        .arg_str("id")
        .or_else(|| request.arg_str("code"))
        .unwrap_or_default();
    match data.find_team(&key) {
        Some(team) => ApiResponse::ok().with("team", team),
        None => ApiResponse::failure("Команда не найдена"),
    }
}

fn add_points(data: &mut DemoDataset, request: &ApiRequest) -> ApiResponse {
    let Some(team_id) = request.arg_i64("teamId") else {
        return ApiResponse::failure("Не указана команда");
    };
    let Some(points) = request.arg_i64("points") else {
        return ApiResponse::failure("Не указано количество баллов");
    };
    let reason = request.arg_str("reason").unwrap_or_default();
    if reason.trim().is_empty() {
        return ApiResponse::failure("Не указана причина");
    }

    let Some(team) = data.team_by_id_mut(team_id) else {
        return ApiResponse::failure("Команда не найдена");
    };
    let Some(score) = team.score.checked_add(points) else {
        return ApiResponse::failure("Недопустимое количество баллов");
    };
    team.score = score;
    let team = team.clone();

    let comment = request.arg_str("comment").filter(|c| !c.trim().is_empty());
    let transaction = data.record_transaction(Transaction {
        id: 0,
        team_id,
        points,
        reason: reason.clone(),
        moderator: request.arg_str("moderator").unwrap_or_default(),
        comment,
        timestamp: Utc::now(),
    });

    let message = if points >= 0 {
        format!("Вашей команде начислено {} баллов: {}", points, reason)
    } else {
        format!("С вашей команды списано {} баллов: {}", points.unsigned_abs(), reason)
    };
    let severity = if points >= 0 {
        Severity::Success
    } else {
        Severity::Warning
    };
    let mut notification = Notification::new(message, severity);
    notification.team_id = Some(team_id);
    data.push_notification(notification);

    ApiResponse::ok()
        .with("team", team)
        .with("transaction", transaction)
}

fn get_transactions(data: &DemoDataset, request: &ApiRequest) -> ApiResponse {
    let team_id = request.arg_i64("teamId");
    let limit = request
        .arg_i64("limit")
        .and_then(|l| usize::try_from(l).ok())
        .unwrap_or(DEFAULT_TRANSACTION_LIMIT);

    let transactions: Vec<&Transaction> = data
        .transactions
        .iter()
        .filter(|t| team_id.map_or(true, |id| t.team_id == id))
        .take(limit)
        .collect();
    ApiResponse::ok().with("transactions", transactions)
}

fn get_notifications(data: &DemoDataset, request: &ApiRequest) -> ApiResponse {
    let team_id = request.arg_i64("teamId");
    let unread_only = request.arg_bool("unreadOnly").unwrap_or(false);

    let notifications: Vec<&Notification> = data
        .notifications
        .iter()
        .filter(|n| team_id.map_or(true, |id| n.is_for(id)))
        .filter(|n| !unread_only || !n.read)
        .collect();
    ApiResponse::ok().with("notifications", notifications)
}

fn mark_notification_read(data: &mut DemoDataset, request: &ApiRequest) -> ApiResponse {
    let id = request.arg_i64("id");
    match data.notifications.iter_mut().find(|n| Some(n.id) == id) {
        Some(notification) => {
            notification.read = true;
            ApiResponse::ok().with("id", json!(notification.id))
        }
        None => ApiResponse::failure("Уведомление не найдено"),
    }
}

fn stats(data: &DemoDataset) -> Stats {
    Stats {
        teams: data.teams.len(),
        total_points: data
            .teams
            .iter()
            .fold(0i64, |sum, t| sum.saturating_add(t.score)),
        total_members: data
            .teams
            .iter()
            .fold(0u64, |sum, t| sum.saturating_add(u64::from(t.members))),
        tasks: data.tasks.len(),
        transactions: data.transactions.len(),
    }
}
