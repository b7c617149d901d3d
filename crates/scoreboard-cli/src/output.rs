//! Plain-text rendering of core data for the terminal.

use scoreboard_core::models::event::earned_count;
use scoreboard_core::models::{
    Achievement, EventInfo, Notification, RatingEntry, Stats, Task, Team, Transaction,
};
use scoreboard_core::utils::{format_delta, format_timestamp, pad_display, truncate_string};
use scoreboard_core::TeamDashboard;

const NAME_WIDTH: usize = 20;
const REASON_WIDTH: usize = 32;

pub fn team_line(team: &Team) -> String {
    format!(
        "{:>3}  {:<8} {} {:>6}  {}",
        team.id,
        team.code,
        pad_display(&team.name, NAME_WIDTH),
        team.score,
        team.display_members()
    )
}

pub fn print_teams(teams: &[Team]) {
    for team in teams {
        println!("{}", team_line(team));
    }
}

pub fn print_rating(rating: &[RatingEntry]) {
    for entry in rating {
        println!(
            "{:>2}. {} {:>6}",
            entry.position,
            pad_display(&entry.team.name, NAME_WIDTH),
            entry.team.score
        );
    }
}

pub fn print_transactions(transactions: &[Transaction]) {
    if transactions.is_empty() {
        println!("Нет операций");
        return;
    }
    for t in transactions {
        let comment = t
            .comment
            .as_deref()
            .map(|c| format!(" ({})", truncate_string(c, REASON_WIDTH)))
            .unwrap_or_default();
        println!(
            "{}  #{:<3} {:>5}  {} {}{}",
            format_timestamp(&t.timestamp),
            t.team_id,
            t.display_points(),
            pad_display(&t.reason, REASON_WIDTH),
            t.moderator,
            comment
        );
    }
}

pub fn print_tasks(tasks: &[Task]) {
    for task in tasks {
        println!("{:>3}  {} +{} ({})", task.id, task.title, task.reward, task.time);
        if !task.description.is_empty() {
            println!("     {}", task.description);
        }
    }
}

pub fn print_achievements(achievements: &[Achievement]) {
    println!("Получено {} из {}", earned_count(achievements), achievements.len());
    for a in achievements {
        let mark = if a.earned { "[x]" } else { "[ ]" };
        println!("{} {} - {}", mark, a.name, a.description);
    }
}

pub fn notification_line(n: &Notification) -> String {
    let unread = if n.read { " " } else { "*" };
    format!(
        "{} {}  [{}] {}",
        unread,
        format_timestamp(&n.timestamp),
        n.severity.label(),
        n.message
    )
}

pub fn print_notifications<'a>(notifications: impl IntoIterator<Item = &'a Notification>) {
    let mut any = false;
    for n in notifications {
        println!("{}", notification_line(n));
        any = true;
    }
    if !any {
        println!("Нет уведомлений");
    }
}

pub fn print_stats(stats: &Stats) {
    println!("Команд:      {}", stats.teams);
    println!("Участников:  {}", stats.total_members);
    println!("Всего баллов: {}", stats.total_points);
    println!("Заданий:     {}", stats.tasks);
    println!("Операций:    {}", stats.transactions);
}

pub fn print_event(event: &EventInfo) {
    println!("{}", event.name);
    if !event.description.is_empty() {
        println!("{}", event.description);
    }
    if let Some(ref starts) = event.starts {
        println!("Начало: {}", starts);
    }
    if let Some(ref ends) = event.ends {
        println!("Конец:  {}", ends);
    }
}

pub fn print_team_summary(dashboard: &TeamDashboard) {
    let Some(ref team) = dashboard.team else {
        return;
    };
    let position = dashboard
        .position()
        .map_or_else(|| "-".to_string(), |p| p.to_string());
    print!("{} ({}): {} баллов, место {}", team.name, team.code, team.score, position);
    match dashboard.points_to_next() {
        Some(gap) => println!(", до следующего места {}", format_delta(gap)),
        None => println!(),
    }
}
