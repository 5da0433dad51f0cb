use std::sync::Arc;

use anyhow::{Context, Result};
use cadence_core::clock::SystemClock;
use cadence_core::config::{self, CadenceConfig};
use cadence_core::history::{EventAction, HabitEvent};
use cadence_core::model::*;
use cadence_core::service::{CompleteRequest, DayState, HabitService};
use cadence_core::storage::{create_backend, SqliteStorage};
use cadence_core::streak;
use chrono::{NaiveDate, Weekday};
use clap::Parser;
use owo_colors::OwoColorize;
use serde::Serialize;
use uuid::Uuid;

type Service = HabitService<SqliteStorage>;

#[derive(Parser)]
#[command(name = "cadence", about = "Cadence: habit streaks without the guilt", version)]
enum Cli {
    /// Create a new habit
    Add {
        /// Habit name
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Category (defaults to the configured one, usually "general")
        #[arg(short, long)]
        category: Option<String>,
        /// Target number of days per week (1-7)
        #[arg(long, default_value = "7")]
        days_per_week: u8,
        /// Planned rest weekdays, comma separated (e.g. sat,sun)
        #[arg(long, value_delimiter = ',')]
        rest: Vec<Weekday>,
        /// Minimum session length in minutes (1-480)
        #[arg(short, long)]
        minutes: Option<u32>,
        /// Ask for an honesty review after each completion
        #[arg(long)]
        accountability: bool,
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// List habits
    List {
        /// Include archived habits
        #[arg(short, long)]
        all: bool,
        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a habit with its recent entries
    Show {
        /// Habit ID (full UUID or short 8-char prefix)
        id: String,
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a habit's settings
    Edit {
        /// Habit ID (full UUID or short 8-char prefix)
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(long)]
        days_per_week: Option<u8>,
        /// Replace the rest weekdays, comma separated
        #[arg(long, value_delimiter = ',')]
        rest: Option<Vec<Weekday>>,
        #[arg(short, long)]
        minutes: Option<u32>,
        #[arg(long)]
        accountability: Option<bool>,
    },
    /// Start the timer for a habit
    Start {
        /// Habit ID (full UUID or short 8-char prefix)
        id: String,
    },
    /// Pause the running timer
    Pause {
        /// Habit ID (full UUID or short 8-char prefix)
        id: String,
    },
    /// Mark today as done
    Done {
        /// Habit ID (full UUID or short 8-char prefix)
        id: String,
        /// Session length in minutes (defaults to the tracked timer time)
        #[arg(short, long)]
        minutes: Option<u64>,
        /// A few words on how it went (at least 5 characters)
        #[arg(short, long)]
        reflection: Option<String>,
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Skip a day without breaking the streak (once per week, never two days in a row)
    Skip {
        /// Habit ID (full UUID or short 8-char prefix)
        id: String,
        /// Day to skip, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Remove today's entry
    Undo {
        /// Habit ID (full UUID or short 8-char prefix)
        id: String,
    },
    /// Zero a habit's streak, keeping its history
    ResetStreak {
        /// Habit ID (full UUID or short 8-char prefix)
        id: String,
    },
    /// Rebuild a habit's streak from its history
    Recompute {
        /// Habit ID (full UUID or short 8-char prefix)
        id: String,
    },
    /// Record an honesty status for one completed day
    Honesty {
        /// Habit ID (full UUID or short 8-char prefix)
        id: String,
        /// Day, YYYY-MM-DD
        date: NaiveDate,
        /// honest or not-really
        status: HonestyStatus,
    },
    /// List completions awaiting review, or review several days at once
    Review {
        /// Habit ID to review (omit to list pending reviews)
        id: Option<String>,
        /// Days to mark honest, comma separated
        #[arg(long, value_delimiter = ',')]
        honest: Vec<NaiveDate>,
        /// Days to mark not-really, comma separated
        #[arg(long, value_delimiter = ',')]
        not_really: Vec<NaiveDate>,
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Today's progress across active habits
    Today {
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// This week's grid
    Week {
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Show audit history for a habit or your recent events
    History {
        /// Habit ID (omit for recent events)
        id: Option<String>,
        /// Maximum number of events to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Archive a habit (soft delete)
    Archive {
        /// Habit ID (full UUID or short 8-char prefix)
        id: String,
    },
    /// Permanently delete a habit and its history
    Delete {
        /// Habit ID (full UUID or short 8-char prefix)
        id: String,
        /// Required: confirm the deletion
        #[arg(long)]
        confirm: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let config = CadenceConfig::load(Some(cwd.as_path())).unwrap_or_else(|e| {
        tracing::warn!("failed to load config, using defaults: {e}");
        CadenceConfig::default_config()
    });
    let user_id = config::resolve_user_id(&config.user);

    let service = make_service(&config)?;
    run(cli, &service, &user_id).await
}

fn make_service(config: &CadenceConfig) -> Result<Service> {
    let storage = create_backend(config).context("failed to open habit database")?;
    Ok(HabitService::from_config(
        storage,
        Arc::new(SystemClock),
        config,
    ))
}

async fn run(cli: Cli, service: &Service, user_id: &str) -> Result<()> {
    match cli {
        Cli::Add {
            name,
            description,
            category,
            days_per_week,
            rest,
            minutes,
            accountability,
            json,
        } => {
            let input = CreateHabitInput {
                name,
                description,
                category,
                days_per_week,
                skip_days: rest,
                minimum_duration: minutes,
                accountability_mode: accountability,
            };
            let habit = service.create_habit(user_id, input).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&habit)?);
            } else {
                println!(
                    "{} {} {}",
                    "Created".green(),
                    habit.name.bold(),
                    short_id(habit.id).cyan()
                );
            }
            Ok(())
        }
        Cli::List {
            all,
            category,
            json,
        } => cmd_list(service, user_id, all, category, json).await,
        Cli::Show { id, json } => {
            let id = resolve_habit_id(service, user_id, &id).await?;
            cmd_show(service, user_id, id, json).await
        }
        Cli::Edit {
            id,
            name,
            description,
            category,
            days_per_week,
            rest,
            minutes,
            accountability,
        } => {
            let id = resolve_habit_id(service, user_id, &id).await?;
            let input = UpdateHabitInput {
                name,
                description,
                category,
                days_per_week,
                skip_days: rest,
                minimum_duration: minutes,
                accountability_mode: accountability,
            };
            let habit = service.update_habit(user_id, id, input).await?;
            println!("{} {}", "Updated".green(), habit.name.bold());
            Ok(())
        }
        Cli::Start { id } => {
            let id = resolve_habit_id(service, user_id, &id).await?;
            let habit = service.start(user_id, id).await?;
            println!("{} {}", "▶ Started".green(), habit.name.bold());
            Ok(())
        }
        Cli::Pause { id } => {
            let id = resolve_habit_id(service, user_id, &id).await?;
            let habit = service.pause(user_id, id).await?;
            println!(
                "{} {} {}",
                "⏸ Paused".yellow(),
                habit.name.bold(),
                format!("({} tracked today)", format_duration(habit.paused_duration)).dimmed()
            );
            Ok(())
        }
        Cli::Done {
            id,
            minutes,
            reflection,
            json,
        } => {
            let id = resolve_habit_id(service, user_id, &id).await?;
            let request = CompleteRequest {
                duration: minutes_to_secs(minutes)?,
                reflection,
            };
            let (habit, outcome) = service.complete(user_id, id, request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
                return Ok(());
            }
            println!(
                "{} {} {}",
                "✓ Done".green(),
                habit.name.bold(),
                format!("streak {}", outcome.streak).cyan()
            );
            if let Some(secs) = outcome.duration {
                println!("  {} {}", "Duration:".dimmed(), format_duration(secs));
            }
            for flag in &outcome.flags {
                println!("  {} {}", "note:".yellow(), flag);
            }
            Ok(())
        }
        Cli::Skip { id, date } => {
            let id = resolve_habit_id(service, user_id, &id).await?;
            let habit = service.skip_day(user_id, id, date).await?;
            println!(
                "{} {} {}",
                "~ Skipped".yellow(),
                habit.name.bold(),
                format!("streak {}", habit.streak).cyan()
            );
            Ok(())
        }
        Cli::Undo { id } => {
            let id = resolve_habit_id(service, user_id, &id).await?;
            let habit = service.uncomplete(user_id, id).await?;
            println!(
                "{} {} {}",
                "Removed today's entry for".yellow(),
                habit.name.bold(),
                format!("streak {}", habit.streak).cyan()
            );
            Ok(())
        }
        Cli::ResetStreak { id } => {
            let id = resolve_habit_id(service, user_id, &id).await?;
            let habit = service.reset_streak(user_id, id).await?;
            println!(
                "{} {} {}",
                "Streak reset for".yellow(),
                habit.name.bold(),
                "(run `cadence recompute` to rebuild it from history)".dimmed()
            );
            Ok(())
        }
        Cli::Recompute { id } => {
            let id = resolve_habit_id(service, user_id, &id).await?;
            let habit = service.recompute_streak(user_id, id).await?;
            println!(
                "{} {} {}",
                "Recomputed".green(),
                habit.name.bold(),
                format!("streak {}", habit.streak).cyan()
            );
            Ok(())
        }
        Cli::Honesty { id, date, status } => {
            let id = resolve_habit_id(service, user_id, &id).await?;
            let habit = service.set_honesty(user_id, id, date, status).await?;
            println!("{} {} on {}: {}", "Reviewed".green(), habit.name.bold(), date, status);
            Ok(())
        }
        Cli::Review {
            id,
            honest,
            not_really,
            json,
        } => cmd_review(service, user_id, id, honest, not_really, json).await,
        Cli::Today { json } => cmd_today(service, user_id, json).await,
        Cli::Week { json } => cmd_week(service, user_id, json).await,
        Cli::History { id, limit, json } => cmd_history(service, user_id, id, limit, json).await,
        Cli::Archive { id } => {
            let id = resolve_habit_id(service, user_id, &id).await?;
            let habit = service.archive_habit(user_id, id).await?;
            println!("{} {}", "Archived".dimmed(), habit.name.bold());
            Ok(())
        }
        Cli::Delete { id, confirm } => {
            if !confirm {
                anyhow::bail!("refusing to delete without --confirm");
            }
            let id = resolve_habit_id(service, user_id, &id).await?;
            service.delete_habit(user_id, id).await?;
            println!("{} {}", "Deleted".red(), short_id(id).cyan());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn minutes_to_secs(minutes: Option<u64>) -> Result<Option<u64>> {
    minutes
        .map(|m| m.checked_mul(60).context("--minutes is too large"))
        .transpose()
}

fn format_duration(secs: u64) -> String {
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{s}s"),
        (0, m, 0) => format!("{m}m"),
        (0, m, s) => format!("{m}m {s}s"),
        (h, m, _) => format!("{h}h {m}m"),
    }
}

/// Resolve a full UUID or a unique prefix among the user's habits.
async fn resolve_habit_id(service: &Service, user_id: &str, id: &str) -> Result<Uuid> {
    if id.len() >= 32 {
        return Uuid::parse_str(id).context("invalid habit ID");
    }
    let habits = service
        .list_habits(&HabitQuery {
            owner_id: user_id.to_string(),
            include_inactive: true,
            category: None,
        })
        .await
        .context("failed to list habits")?;
    let matches: Vec<&Habit> = habits
        .iter()
        .filter(|h| h.id.to_string().starts_with(id))
        .collect();
    match matches.len() {
        0 => anyhow::bail!("no habit found matching prefix '{id}'"),
        1 => Ok(matches[0].id),
        n => anyhow::bail!("ambiguous prefix '{id}' matches {n} habits. Use a longer prefix."),
    }
}

fn colored_state(state: DayState) -> String {
    let symbol = state.symbol();
    match state {
        DayState::Completed => symbol.green().to_string(),
        DayState::Skipped => symbol.yellow().to_string(),
        DayState::Incomplete | DayState::Missed => symbol.red().to_string(),
        DayState::Rest => symbol.blue().to_string(),
        DayState::Pending => symbol.cyan().to_string(),
        DayState::Upcoming => symbol.dimmed().to_string(),
    }
}

// ---------------------------------------------------------------------------
// commands
// ---------------------------------------------------------------------------

async fn cmd_list(
    service: &Service,
    user_id: &str,
    all: bool,
    category: Option<String>,
    json: bool,
) -> Result<()> {
    let habits = service
        .list_habits(&HabitQuery {
            owner_id: user_id.to_string(),
            include_inactive: all,
            category,
        })
        .await?;
    let summaries: Vec<HabitSummary> = habits.iter().map(HabitSummary::from).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    if summaries.is_empty() {
        println!("{}", "No habits yet. Add one with `cadence add <name>`.".dimmed());
        return Ok(());
    }

    println!(
        "{:<8} {:<28} {:<12} {:>6}  {}",
        "ID".dimmed(),
        "Name".dimmed(),
        "Category".dimmed(),
        "Streak".dimmed(),
        "Last".dimmed()
    );
    for s in &summaries {
        let name = if s.status == HabitStatus::InProgress {
            format!("{} ▶", s.name).green().to_string()
        } else if !s.is_active {
            s.name.dimmed().to_string()
        } else {
            s.name.clone()
        };
        println!(
            "{:<8} {:<28} {:<12} {:>6}  {}",
            short_id(s.id).cyan(),
            name,
            s.category.magenta(),
            s.streak,
            s.last_completed
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into())
                .dimmed()
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    #[serde(flatten)]
    habit: &'a Habit,
    longest_streak: u32,
    streak_in_sync: bool,
}

async fn cmd_show(service: &Service, user_id: &str, id: Uuid, json: bool) -> Result<()> {
    let habit = service.get_habit(user_id, id).await?;
    let longest = streak::longest_run(&habit.completion_history);
    let in_sync = streak::is_consistent(&habit);

    if json {
        let out = ShowOutput {
            habit: &habit,
            longest_streak: longest,
            streak_in_sync: in_sync,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", habit.name.bold());
    println!(
        "{} {} {}",
        habit.category.magenta(),
        habit.status.to_string().dimmed(),
        if habit.is_active { "" } else { "archived" }.dimmed()
    );
    if !habit.description.is_empty() {
        println!();
        println!("{}", habit.description);
    }
    println!();
    println!("{}", "--- Details ---".dimmed());
    println!("  {}  {}", "ID:".dimmed(), habit.id.to_string().cyan());
    println!("  {}  {}", "Streak:".dimmed(), habit.streak.to_string().cyan());
    if !in_sync {
        println!(
            "  {}  {}",
            "".dimmed(),
            "differs from history, run `cadence recompute`".yellow()
        );
    }
    println!("  {}  {}", "Longest:".dimmed(), longest);
    println!(
        "  {}  {} days/week, {} min sessions",
        "Target:".dimmed(),
        habit.days_per_week,
        habit.minimum_duration
    );
    if !habit.skip_days.is_empty() {
        let rest: Vec<String> = habit.skip_days.iter().map(|d| d.to_string()).collect();
        println!("  {}  {}", "Rest days:".dimmed(), rest.join(", "));
    }
    if habit.accountability_mode {
        println!("  {}  on", "Accountability:".dimmed());
    }
    println!(
        "  {}  {}",
        "Created:".dimmed(),
        habit.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    if !habit.completion_history.is_empty() {
        println!();
        println!(
            "{} ({})",
            "--- Recent entries ---".dimmed(),
            habit.completion_history.len().to_string().cyan()
        );
        let mut entries: Vec<&CompletionEntry> = habit.completion_history.iter().collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        for entry in entries.iter().take(14) {
            let status = match entry.status {
                CompletionStatus::Completed => entry.status.to_string().green().to_string(),
                CompletionStatus::Skipped => entry.status.to_string().yellow().to_string(),
                CompletionStatus::Incomplete => entry.status.to_string().red().to_string(),
            };
            print!("  {}  {:<20}", entry.date, status);
            if let Some(secs) = entry.duration {
                print!(" {}", format_duration(secs).dimmed());
            }
            if let Some(honesty) = entry.honesty_status {
                print!(" [{}]", honesty);
            }
            if let Some(ref reflection) = entry.reflection {
                print!("  {}", reflection.dimmed());
            }
            println!();
        }
    }
    Ok(())
}

async fn cmd_review(
    service: &Service,
    user_id: &str,
    id: Option<String>,
    honest: Vec<NaiveDate>,
    not_really: Vec<NaiveDate>,
    json: bool,
) -> Result<()> {
    let Some(id) = id else {
        let pending = service.pending_reviews(user_id).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&pending)?);
            return Ok(());
        }
        if pending.is_empty() {
            println!("{}", "Nothing to review.".dimmed());
            return Ok(());
        }
        for p in &pending {
            print!(
                "  {}  {:<8} {}",
                p.date,
                short_id(p.habit_id).cyan(),
                p.habit_name.bold()
            );
            if let Some(secs) = p.duration {
                print!(" {}", format_duration(secs).dimmed());
            }
            println!();
        }
        return Ok(());
    };

    let reviews: Vec<(NaiveDate, HonestyStatus)> = honest
        .into_iter()
        .map(|d| (d, HonestyStatus::Honest))
        .chain(not_really.into_iter().map(|d| (d, HonestyStatus::NotReally)))
        .collect();
    if reviews.is_empty() {
        anyhow::bail!("nothing to review: pass --honest and/or --not-really dates");
    }

    let id = resolve_habit_id(service, user_id, &id).await?;
    let (habit, outcome) = service.review_honesty(user_id, id, &reviews).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    println!(
        "{} {} day(s) for {}",
        "Reviewed".green(),
        outcome.applied.len(),
        habit.name.bold()
    );
    for date in &outcome.unmatched {
        println!("  {} no entry on {}", "skipped:".yellow(), date);
    }
    Ok(())
}

async fn cmd_today(service: &Service, user_id: &str, json: bool) -> Result<()> {
    let daily = service.daily_analytics(user_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&daily)?);
        return Ok(());
    }

    println!("{}", daily.date.format("%A, %d %B %Y").to_string().bold());
    println!(
        "  {} completed  {} skipped  {} not done  {}",
        daily.counts.completed.to_string().green(),
        daily.counts.skipped.to_string().yellow(),
        daily.counts.not_done.to_string().red(),
        format!("of {}", daily.counts.total).dimmed()
    );
    if !daily.categories.is_empty() {
        println!();
        for c in &daily.categories {
            println!(
                "  {:<16} {}/{}",
                c.category.magenta(),
                c.counts.completed + c.counts.skipped,
                c.counts.total
            );
        }
    }
    Ok(())
}

async fn cmd_week(service: &Service, user_id: &str, json: bool) -> Result<()> {
    let weekly = service.weekly_analytics(user_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&weekly)?);
        return Ok(());
    }

    println!(
        "{}",
        format!("Week of {}", weekly.week_start.format("%d %b %Y")).bold()
    );
    let header: Vec<String> = weekly
        .days
        .iter()
        .map(|d| d.format("%a").to_string()[..2].to_string())
        .collect();
    println!("{:<24} {}  {}", "", header.join(" ").dimmed(), "Streak".dimmed());
    for habit in &weekly.habits {
        let cells: Vec<String> = habit
            .cells
            .iter()
            .map(|c| format!("{} ", colored_state(c.state)))
            .collect();
        let name: String = habit.name.chars().take(24).collect();
        println!(
            "{:<24} {} {:>6}  {}",
            name,
            cells.join(" "),
            habit.streak.to_string().cyan(),
            format!("{}/{}", habit.active_days, habit.days_per_week).dimmed()
        );
    }
    Ok(())
}

async fn cmd_history(
    service: &Service,
    user_id: &str,
    id: Option<String>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let events: Vec<HabitEvent> = match id {
        Some(ref id) => {
            let habit_id = resolve_habit_id(service, user_id, id).await?;
            service.history_for(user_id, habit_id).await?
        }
        None => service.recent_events(user_id, limit),
    };

    if events.is_empty() {
        println!("{}", "No history events found.".dimmed());
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    println!(
        "{:<20} {:<18} {:<8} {}",
        "Timestamp".dimmed(),
        "Action".dimmed(),
        "ID".dimmed(),
        "Habit".dimmed()
    );
    for event in events.iter().take(limit) {
        let action_str = event.action.to_string();
        let action_colored = match event.action {
            EventAction::Created | EventAction::Completed => action_str.green().to_string(),
            EventAction::Updated | EventAction::Skipped | EventAction::StreakReset => {
                action_str.yellow().to_string()
            }
            EventAction::Deleted | EventAction::Uncompleted => action_str.red().to_string(),
            EventAction::Archived => action_str.dimmed().to_string(),
            _ => action_str.cyan().to_string(),
        };
        print!(
            "{:<20} {:<27} {:<8} {}",
            event
                .timestamp
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed(),
            action_colored,
            short_id(event.habit_id).cyan(),
            event.habit_name.as_deref().unwrap_or("-")
        );
        if let Some(date) = event.date {
            print!("  {}", date.to_string().dimmed());
        }
        if !event.changes.is_empty() {
            let changes: Vec<String> = event
                .changes
                .iter()
                .map(|c| {
                    format!(
                        "{}: {} -> {}",
                        c.field.bold(),
                        c.old_value.dimmed(),
                        c.new_value.green()
                    )
                })
                .collect();
            print!("  {}", changes.join(", ").dimmed());
        }
        if !event.notes.is_empty() {
            print!("  {}", event.notes.join("; ").dimmed());
        }
        println!();
    }
    Ok(())
}
