//! scoreboard - command-line client for team event points and ratings.
//!
//! Talks to the event service, or to built-in demo data with `--demo` or
//! when the service is unreachable.

mod output;

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use scoreboard_core::auth::{CredentialStore, Session};
use scoreboard_core::{App, Config};

/// Maximum concurrent lookups for `team` with several arguments.
const MAX_CONCURRENT_REQUESTS: usize = 4;

/// How often `watch` applies background results.
const WATCH_TICK_MS: u64 = 500;

#[derive(Parser)]
#[command(name = "scoreboard")]
#[command(about = "Team event points, ratings and achievements", long_about = None)]
struct Cli {
    /// Use built-in demo data instead of the event service
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the event service answers
    Health,
    /// List all teams
    Teams,
    /// Show the rating
    Rating,
    /// Look up teams by id or code
    Team {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show recent point operations
    Transactions {
        #[arg(long)]
        team: Option<i64>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List event tasks
    Tasks,
    /// List achievements
    Achievements,
    /// Show notifications for the signed-in team
    Notifications {
        #[arg(long)]
        unread: bool,
    },
    /// Show event statistics
    Stats,
    /// Show event information
    Event,
    /// Sign in as a team member
    LoginTeam { code: String, player: String },
    /// Sign in as an administrator
    LoginAdmin {
        username: String,
        /// Remember the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },
    /// Grant (or deduct) points as the signed-in administrator
    AddPoints {
        team: i64,
        #[arg(allow_hyphen_values = true)]
        points: i64,
        reason: String,
        #[arg(long, default_value = "")]
        comment: String,
    },
    /// Show the dashboard for the current session
    Status,
    /// Sign out and clear cached data
    Logout,
    /// Keep the dashboard refreshed until Ctrl-C
    Watch,
    /// Remove cached responses
    ClearCache,
    /// Show or set the theme preference (dark, light or toggle)
    Theme { value: Option<String> },
}

/// Initialize logging: stderr plus a daily log file in the cache directory.
/// The returned guard flushes the file writer on drop.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.log_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "scoreboard.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn prompt_password() -> Result<String> {
    rpassword::prompt_password("Пароль: ").context("Failed to read password")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config, using defaults: {:#}", e);
            Config::default().with_overrides(|name| std::env::var(name).ok())
        }
    };
    if cli.demo {
        config.demo_mode = true;
    }

    let _guard = init_tracing(&config);
    info!(demo = config.demo_mode, "scoreboard starting");

    let mut app = App::new(config)?;
    if let Err(e) = run(&mut app, cli.command).await {
        eprintln!("Ошибка: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(app: &mut App, command: Commands) -> Result<()> {
    match command {
        Commands::Health => match app.data().health_check().await {
            Ok(response) => {
                let status = response.fields.get("status").and_then(|v| v.as_str()).unwrap_or("ok");
                println!("{} ({})", status, app.data().source_name());
            }
            Err(e) => {
                println!("недоступен ({})", app.data().source_name());
                return Err(e.into());
            }
        },
        Commands::Teams => output::print_teams(&app.data().get_teams().await?),
        Commands::Rating => output::print_rating(&app.data().get_rating().await?),
        Commands::Team { ids } => {
            let data = app.data().clone();
            let lookups: Vec<_> = stream::iter(ids)
                .map(|id| {
                    let data = data.clone();
                    async move {
                        let result = data.get_team(&id).await;
                        (id, result)
                    }
                })
                .buffered(MAX_CONCURRENT_REQUESTS)
                .collect()
                .await;
            for (id, result) in lookups {
                match result {
                    Ok(team) => println!("{}", output::team_line(&team)),
                    Err(e) => println!("{}: {}", id, e.user_message()),
                }
            }
        }
        Commands::Transactions { team, limit } => {
            let list = app.data().get_transactions(team, Some(limit)).await?;
            output::print_transactions(&list);
        }
        Commands::Tasks => output::print_tasks(&app.data().get_tasks().await?),
        Commands::Achievements => output::print_achievements(&app.data().get_achievements().await?),
        Commands::Notifications { unread } => {
            let team_id = match app.restore_session().await? {
                Some(Session::Team { team, .. }) => Some(team.id),
                _ => None,
            };
            let list = app.data().get_notifications(team_id, unread).await?;
            output::print_notifications(&list);
        }
        Commands::Stats => output::print_stats(&app.data().get_stats().await?),
        Commands::Event => output::print_event(&app.data().get_event_info().await?),
        Commands::LoginTeam { code, player } => {
            let session = app.login_team(&code, &player).await?;
            if let Some(team) = session.team() {
                println!("Добро пожаловать, {}! Команда: {}", player.trim(), team.name);
            }
        }
        Commands::LoginAdmin { username, remember } => {
            let password = match CredentialStore::get_password(&username) {
                Ok(saved) => saved,
                Err(_) => prompt_password()?,
            };
            app.login_admin(&username, &password).await?;
            if remember {
                if let Err(e) = CredentialStore::store(&username, &password) {
                    warn!(error = %e, "Failed to remember password");
                }
            }
            println!("Вход выполнен: {}", username);
        }
        Commands::AddPoints {
            team,
            points,
            reason,
            comment,
        } => {
            app.restore_session().await?;
            let updated = app.add_points(team, points, &reason, &comment).await?;
            match updated {
                Some(team) => println!("{}", output::team_line(&team)),
                None => println!("Готово"),
            }
        }
        Commands::Status => match app.restore_session().await?.cloned() {
            Some(session) => show_dashboard(app, &session).await?,
            None => println!("Не выполнен вход"),
        },
        Commands::Logout => {
            if let Some(Session::Admin { admin, .. }) = app.restore_session().await?.cloned() {
                if let Err(e) = CredentialStore::delete(&admin.username) {
                    warn!(error = %e, "Failed to forget password");
                }
            }
            app.logout()?;
            println!("Выход выполнен");
        }
        Commands::Watch => watch(app).await?,
        Commands::ClearCache => {
            let removed = app.data().clear_cache();
            println!("Удалено записей: {}", removed);
            if let Some(path) = app.storage().path() {
                println!("Хранилище: {}", path.display());
            }
        }
        Commands::Theme { value } => {
            if let Some(value) = value {
                let theme = if value.trim().eq_ignore_ascii_case("toggle") {
                    app.prefs.theme().toggled()
                } else {
                    value.parse()?
                };
                app.prefs.set_theme(theme)?;
            }
            println!("{}", app.prefs.theme());
        }
    }
    Ok(())
}

async fn show_dashboard(app: &mut App, session: &Session) -> Result<()> {
    if app.is_demo() {
        println!("Демо-режим");
    }

    match session {
        Session::Team { player_name, .. } => {
            let failed = app.load_team_dashboard().await?;
            println!("Игрок: {}", player_name);
            output::print_team_summary(&app.team_dashboard);
            output::print_transactions(&app.team_dashboard.transactions);
            println!();
            output::print_notifications(app.notifications.unread());
            report_failures(failed, app);
        }
        Session::Admin { admin, .. } => {
            let failed = app.load_admin_dashboard().await?;
            println!("Администратор: {}", admin.username);
            if let Some(ref stats) = app.admin_dashboard.stats {
                output::print_stats(stats);
            }
            println!();
            output::print_teams(&app.admin_dashboard.teams);
            report_failures(failed, app);
        }
    }
    Ok(())
}

fn report_failures(failed: usize, app: &App) {
    if failed > 0 {
        let detail = app.status_message.as_deref().unwrap_or_default();
        eprintln!("Не удалось загрузить частей: {} {}", failed, detail);
    }
}

async fn watch(app: &mut App) -> Result<()> {
    let Some(session) = app.restore_session().await?.cloned() else {
        anyhow::bail!("Сначала выполните вход");
    };
    show_dashboard(app, &session).await?;
    app.notifications.mark_all_read();
    app.start_background();

    let mut ticker = tokio::time::interval(Duration::from_millis(WATCH_TICK_MS));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                if app.check_background_tasks() == 0 {
                    continue;
                }
                if app.team_dashboard.team.is_some() {
                    output::print_team_summary(&app.team_dashboard);
                } else if let Some(ref stats) = app.admin_dashboard.stats {
                    println!("Команд: {}, всего баллов: {}", stats.teams, stats.total_points);
                }
                if app.notifications.unread_count() > 0 {
                    output::print_notifications(app.notifications.unread());
                    app.notifications.mark_all_read();
                }
            }
        }
    }

    app.stop_background();
    info!("Watch stopped");
    Ok(())
}
