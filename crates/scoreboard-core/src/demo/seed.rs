use chrono::{DateTime, Duration, Utc};

use crate::models::{Achievement, EventInfo, Notification, Severity, Task, Team, Transaction};

pub const DEMO_ADMIN_USERNAME: &str = "admin";
pub const DEMO_ADMIN_PASSWORD: &str = "admin";

/// Mutable state behind `DemoSource`.
#[derive(Debug, Clone)]
pub struct DemoDataset {
    pub teams: Vec<Team>,
    pub achievements: Vec<Achievement>,
    pub tasks: Vec<Task>,
    /// Newest first
    pub transactions: Vec<Transaction>,
    pub notifications: Vec<Notification>,
    pub event: EventInfo,
    next_transaction_id: i64,
    next_notification_id: i64,
}

fn team(id: i64, name: &str, score: i64, color: &str, members: u32) -> Team {
    Team {
        id,
        code: format!("TEAM{:02}", id),
        name: name.to_string(),
        score,
        color: Some(color.to_string()),
        members,
    }
}

fn achievement(id: i64, name: &str, description: &str, icon: &str, earned: bool) -> Achievement {
    Achievement {
        id,
        name: name.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        earned,
    }
}

fn task(id: i64, title: &str, reward: i64, time: &str, description: &str) -> Task {
    Task {
        id,
        title: title.to_string(),
        reward,
        time: time.to_string(),
        description: description.to_string(),
    }
}

impl DemoDataset {
    /// The seed used by demo mode, with history stamped relative to `now`.
    pub fn seed_at(now: DateTime<Utc>) -> Self {
        let teams = vec![
            team(1, "Фениксы", 650, "#FF6B6B", 4),
            team(2, "Титаны", 580, "#4ECDC4", 5),
            team(3, "Драконы", 520, "#45B7D1", 4),
            team(4, "Орлы", 490, "#96CEB4", 3),
            team(5, "Волки", 450, "#FFEAA7", 4),
            team(6, "Кометы", 410, "#DDA0DD", 3),
        ];

        let achievements = vec![
            achievement(1, "Первые шаги", "Получить первые баллы", "fa-shoe-prints", true),
            achievement(2, "Командный дух", "Все участники в сборе", "fa-users", true),
            achievement(3, "Эрудиты", "Победить в викторине", "fa-brain", true),
            achievement(4, "Спринтеры", "Выполнить задание за 10 минут", "fa-bolt", false),
            achievement(5, "Лидеры", "Занять первое место в рейтинге", "fa-crown", false),
            achievement(6, "Коллекционеры", "Набрать 1000 баллов", "fa-gem", false),
        ];

        let tasks = vec![
            task(1, "Квест кампуса", 50, "30 мин", "Найдите все контрольные точки на территории"),
            task(2, "Викторина", 30, "15 мин", "Ответьте на вопросы о мероприятии"),
            task(3, "Фотоохота", 40, "20 мин", "Сделайте командное фото у каждого объекта"),
            task(4, "Креативный питч", 60, "45 мин", "Представьте идею проекта жюри"),
        ];

        let history = [
            (1, 20, "Активность на лекции", "Иван Петров", 30),
            (1, 50, "Победа в квесте", "Мария Сидорова", 75),
            (2, 30, "Креативное решение", "Алексей Иванов", 135),
            (3, 10, "Помощь другой команде", "Ольга Смирнова", 180),
            (1, 40, "Выполнение задания", "Дмитрий Кузнецов", 270),
        ];
        let transactions: Vec<Transaction> = history
            .iter()
            .enumerate()
            .map(|(i, &(team_id, points, reason, moderator, minutes_ago))| Transaction {
                id: (history.len() - i) as i64,
                team_id,
                points,
                reason: reason.to_string(),
                moderator: moderator.to_string(),
                comment: None,
                timestamp: now - Duration::minutes(minutes_ago),
            })
            .collect();

        let seed_notifications = [
            (Some(1), "Вашей команде начислено 20 баллов за активность", Severity::Success, false, 5),
            (None, "Новое задание доступно: 'Квест кампуса'", Severity::Info, false, 15),
            (Some(1), "Команда 'Титаны' обогнала вас в рейтинге", Severity::Warning, true, 30),
        ];
        let notifications: Vec<Notification> = seed_notifications
            .iter()
            .enumerate()
            .map(|(i, &(team_id, message, severity, read, minutes_ago))| Notification {
                id: (i + 1) as i64,
                team_id,
                message: message.to_string(),
                severity,
                read,
                timestamp: now - Duration::minutes(minutes_ago),
            })
            .collect();

        let event = EventInfo {
            name: "Командный квест".to_string(),
            description: "Соревнование команд: задания, викторины и достижения".to_string(),
            starts: Some((now - Duration::hours(5)).to_rfc3339()),
            ends: Some((now + Duration::hours(3)).to_rfc3339()),
        };

        let next_transaction_id = transactions.len() as i64 + 1;
        let next_notification_id = notifications.len() as i64 + 1;

        Self {
            teams,
            achievements,
            tasks,
            transactions,
            notifications,
            event,
            next_transaction_id,
            next_notification_id,
        }
    }

    pub fn seed() -> Self {
        Self::seed_at(Utc::now())
    }

    pub fn find_team(&self, id_or_code: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.matches(id_or_code))
    }

    pub fn team_by_id_mut(&mut self, id: i64) -> Option<&mut Team> {
        self.teams.iter_mut().find(|t| t.id == id)
    }

    /// Record a transaction as the newest entry.
    pub fn record_transaction(&mut self, mut transaction: Transaction) -> Transaction {
        transaction.id = self.next_transaction_id;
        self.next_transaction_id += 1;
        self.transactions.insert(0, transaction.clone());
        transaction
    }

    pub fn push_notification(&mut self, mut notification: Notification) {
        notification.id = self.next_notification_id;
        self.next_notification_id += 1;
        self.notifications.push(notification);
    }
}

impl Default for DemoDataset {
    fn default() -> Self {
        Self::seed()
    }
}
