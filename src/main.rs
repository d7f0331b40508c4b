use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use ulid::Ulid;

use slotwise::clock::SystemClock;
use slotwise::config::Config;
use slotwise::engine::LeadTimePolicy;
use slotwise::model::*;
use slotwise::notify::NotifyHub;
use slotwise::service::AvailabilityService;
use slotwise::store::{BookingStore, DurableStore, ScheduleStore};

/// Slotwise - availability and blockade management for a single provider calendar
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory holding the WAL. Overrides SLOTWISE_DATA_DIR.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Expose Prometheus metrics on this port. Overrides SLOTWISE_METRICS_PORT.
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Overrides SLOTWISE_MIN_LEAD_HOURS.
    #[arg(long)]
    min_lead_hours: Option<u32>,

    /// `day` or `slot`. Overrides SLOTWISE_LEAD_POLICY.
    #[arg(long)]
    lead_policy: Option<LeadTimePolicy>,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set the opening hours of one weekday
    Hours {
        #[arg(long)]
        provider: Ulid,
        #[arg(long, value_parser = parse_weekday)]
        weekday: Weekday,
        /// Opening time, HH:MM
        #[arg(long, value_parser = parse_time, required_unless_present = "closed")]
        start: Option<NaiveTime>,
        /// Closing time, HH:MM. 00:00 means until end of day.
        #[arg(long, value_parser = parse_time, required_unless_present = "closed")]
        end: Option<NaiveTime>,
        #[arg(long, conflicts_with_all = ["start", "end"])]
        closed: bool,
    },
    /// Record an appointment
    Book {
        #[arg(long)]
        provider: Ulid,
        /// Start, "YYYY-MM-DD HH:MM"
        #[arg(long, value_parser = parse_datetime)]
        at: NaiveDateTime,
        /// 0 means the configured service duration.
        #[arg(long, default_value_t = 0)]
        minutes: u32,
        #[arg(long, default_value = "scheduled")]
        status: AppointmentStatus,
    },
    /// Cancel an appointment, freeing its slots
    Cancel {
        #[arg(long)]
        provider: Ulid,
        #[arg(long)]
        id: Ulid,
    },
    /// Block a slot, once or on a recurring cadence
    Block {
        #[arg(long)]
        provider: Ulid,
        /// Date of the (first) occurrence
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, value_parser = parse_time)]
        slot: NaiveTime,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        description: Option<String>,
        /// none, daily, weekly or monthly
        #[arg(long, default_value = "none")]
        recurrence: Recurrence,
        /// Last date of the series (inclusive). Omit for an indefinite series.
        #[arg(long)]
        until: Option<NaiveDate>,
    },
    /// Remove a one-off blockade
    Unblock {
        #[arg(long)]
        provider: Ulid,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, value_parser = parse_time)]
        slot: NaiveTime,
    },
    /// Remove a whole recurring series
    UnblockSeries {
        #[arg(long)]
        provider: Ulid,
        #[arg(long)]
        id: Ulid,
    },
    /// List bookable slots for a date
    Slots {
        #[arg(long)]
        provider: Ulid,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        service_minutes: Option<u32>,
    },
    /// Show the state of every hour of a date
    Grid {
        #[arg(long)]
        provider: Ulid,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        service_minutes: Option<u32>,
    },
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("expected HH:MM: {e}"))
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .map_err(|e| format!("expected \"YYYY-MM-DD HH:MM\": {e}"))
}

fn parse_weekday(s: &str) -> Result<Weekday, String> {
    s.parse().map_err(|_| format!("unknown weekday: {s}"))
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    slotwise::observability::init_tracing();
    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if args.metrics_port.is_some() {
        config.metrics_port = args.metrics_port;
    }
    if let Some(hours) = args.min_lead_hours {
        config.min_lead_hours = hours;
    }
    if let Some(policy) = args.lead_policy {
        config.lead_policy = policy;
    }
    config.validate()?;
    slotwise::observability::init_metrics(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let notify = Arc::new(NotifyHub::new());
    let store = Arc::new(
        DurableStore::open(&config.wal_path(), notify.clone(), config.compact_threshold)?
            .with_service_minutes(config.service_minutes),
    );
    let service = AvailabilityService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(SystemClock),
        notify,
    )
    .with_config(&config);
    info!(data_dir = %config.data_dir.display(), "slotwise ready");

    let json = args.json;
    match args.command {
        Command::Hours {
            provider,
            weekday,
            start,
            end,
            closed,
        } => {
            let day = match (closed, start, end) {
                (false, Some(start), Some(end)) => DaySchedule::open(start, end),
                _ => DaySchedule::closed(),
            };
            let mut schedule = store
                .weekly_schedule(provider)
                .await?
                .unwrap_or_else(WeeklySchedule::closed);
            schedule.set(weekday, day);
            store.put_schedule(provider, schedule.clone()).await?;
            emit(json, &schedule, || format!("{weekday}: {}", describe_day(&day)))?;
        }
        Command::Book {
            provider,
            at,
            minutes,
            status,
        } => {
            let appointment = store.resolve_duration(Appointment {
                id: Ulid::new(),
                provider,
                start: at,
                duration_minutes: minutes,
                status,
            });
            store.record_appointment(appointment.clone()).await?;
            emit(json, &appointment, || appointment.id.to_string())?;
        }
        Command::Cancel { provider, id } => {
            store
                .set_status(provider, id, AppointmentStatus::Cancelled)
                .await?;
            emit(json, &id, || format!("cancelled {id}"))?;
        }
        Command::Block {
            provider,
            date,
            slot,
            reason,
            description,
            recurrence,
            until,
        } => {
            let end = until.map_or(RecurrenceEnd::Indefinite, RecurrenceEnd::Until);
            let mut blockade = Blockade::recurring(date, slot, reason, recurrence, end);
            blockade.description = description;
            let id = service.create_blockade(provider, blockade).await?;
            emit(json, &id, || id.to_string())?;
        }
        Command::Unblock {
            provider,
            date,
            slot,
        } => {
            let removed = service.remove_blockade(provider, date, slot).await?;
            emit(json, &removed, || format!("removed {}", removed.id))?;
        }
        Command::UnblockSeries { provider, id } => {
            let removed = service.remove_series(provider, id).await?;
            emit(json, &removed, || format!("removed series {}", removed.id))?;
        }
        Command::Slots {
            provider,
            date,
            service_minutes,
        } => {
            let slots = service
                .available_slots(provider, date, service_minutes)
                .await?;
            emit(json, &slots, || {
                slots
                    .iter()
                    .map(|t| t.format("%H:%M").to_string())
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Command::Grid {
            provider,
            date,
            service_minutes,
        } => {
            let grid = service.day_grid(provider, date, service_minutes).await?;
            emit(json, &grid, || {
                grid.iter()
                    .map(|s| format!("{}  {}", s.time.format("%H:%M"), describe_state(&s.state)))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
    }
    Ok(())
}

fn describe_day(day: &DaySchedule) -> String {
    if !day.enabled {
        return "closed".into();
    }
    format!("{}-{}", day.start.format("%H:%M"), day.end.format("%H:%M"))
}

fn describe_state(state: &SlotState) -> String {
    match state {
        SlotState::Available => "available".into(),
        SlotState::Occupied => "occupied".into(),
        SlotState::Blocked { reason } => format!("blocked ({reason})"),
        SlotState::LunchExcluded => "lunch".into(),
        SlotState::OutsideSchedule => "closed".into(),
        SlotState::TooSoon => "too soon".into(),
    }
}
