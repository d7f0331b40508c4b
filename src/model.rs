use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Provider (venue / court operator) identifier.
pub type ProviderId = Ulid;

/// Midnight, also the "until end of day" sentinel for closing times.
pub const MIDNIGHT: NaiveTime = NaiveTime::MIN;

/// Hour-aligned time of day, `HH:00`. Returns `None` for hours past 23.
pub fn hour(h: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(h, 0, 0)
}

/// Operating hours for a single weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DaySchedule {
    pub fn open(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            enabled: true,
            start,
            end,
        }
    }

    pub fn closed() -> Self {
        Self {
            enabled: false,
            start: MIDNIGHT,
            end: MIDNIGHT,
        }
    }

    /// `end == 00:00` means "until end of day", never "wraps to the next day".
    pub fn ends_at_midnight(&self) -> bool {
        self.end == MIDNIGHT
    }

    /// True when the open window runs through midnight into the early hours.
    /// The midnight sentinel is checked before comparing the range.
    pub fn crosses_midnight(&self) -> bool {
        !self.ends_at_midnight() && self.end < self.start
    }
}

/// Per-weekday operating hours, indexed Monday first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    days: [DaySchedule; 7],
}

impl Default for WeeklySchedule {
    fn default() -> Self {
        Self::closed()
    }
}

impl WeeklySchedule {
    /// Every day disabled. Used when a provider has no configuration at all.
    pub fn closed() -> Self {
        Self {
            days: [DaySchedule::closed(); 7],
        }
    }

    /// The same hours on every day of the week.
    pub fn every_day(day: DaySchedule) -> Self {
        Self { days: [day; 7] }
    }

    pub fn with_day(mut self, weekday: Weekday, day: DaySchedule) -> Self {
        self.set(weekday, day);
        self
    }

    pub fn set(&mut self, weekday: Weekday, day: DaySchedule) {
        self.days[weekday.num_days_from_monday() as usize] = day;
    }

    pub fn day(&self, weekday: Weekday) -> &DaySchedule {
        &self.days[weekday.num_days_from_monday() as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    ToCollect,
    Paid,
    Cancelled,
    Scheduled,
}

impl AppointmentStatus {
    pub fn is_active(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::ToCollect => "to-collect",
            AppointmentStatus::Paid => "paid",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Scheduled => "scheduled",
        }
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "to-collect" => Ok(AppointmentStatus::ToCollect),
            "paid" => Ok(AppointmentStatus::Paid),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            other => Err(format!("unknown appointment status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub provider: ProviderId,
    pub start: NaiveDateTime,
    /// Zero means "use the service duration".
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
}

impl Appointment {
    /// The hour-aligned slot this appointment starts in.
    pub fn slot(&self) -> Slot {
        Slot::containing(self.start)
    }
}

/// How often a blockade repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn is_recurring(&self) -> bool {
        !matches!(self, Recurrence::None)
    }
}

impl std::str::FromStr for Recurrence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Recurrence::None),
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            other => Err(format!("unknown recurrence: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecurrenceEnd {
    /// Last date (inclusive) an occurrence may fall on.
    Until(NaiveDate),
    Indefinite,
}

/// A provider-declared closure of one slot, one-off or recurring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blockade {
    pub id: Ulid,
    pub date: NaiveDate,
    pub slot: NaiveTime,
    pub reason: String,
    pub description: Option<String>,
    pub recurrence: Recurrence,
    pub recurrence_end: RecurrenceEnd,
    /// First occurrence of a recurring series. Equal to `date` for one-offs.
    pub origin: NaiveDate,
}

impl Blockade {
    pub fn one_off(date: NaiveDate, slot: NaiveTime, reason: impl Into<String>) -> Self {
        Self {
            id: Ulid::new(),
            date,
            slot,
            reason: reason.into(),
            description: None,
            recurrence: Recurrence::None,
            recurrence_end: RecurrenceEnd::Indefinite,
            origin: date,
        }
    }

    pub fn recurring(
        origin: NaiveDate,
        slot: NaiveTime,
        reason: impl Into<String>,
        recurrence: Recurrence,
        recurrence_end: RecurrenceEnd,
    ) -> Self {
        Self {
            id: Ulid::new(),
            date: origin,
            slot,
            reason: reason.into(),
            description: None,
            recurrence,
            recurrence_end,
            origin,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A discrete hour-aligned booking opportunity. Computed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Slot {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }

    /// The slot whose hour contains `at` (minutes are truncated).
    pub fn containing(at: NaiveDateTime) -> Self {
        let time = NaiveTime::from_hms_opt(at.hour(), 0, 0).unwrap_or(MIDNIGHT);
        Self {
            date: at.date(),
            time,
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time.format("%H:%M"))
    }
}

/// Why a slot is or isn't bookable. Exactly one state applies to every slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum SlotState {
    Occupied,
    Blocked { reason: String },
    LunchExcluded,
    OutsideSchedule,
    TooSoon,
    Available,
}

impl SlotState {
    pub fn is_available(&self) -> bool {
        matches!(self, SlotState::Available)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatus {
    pub time: NaiveTime,
    #[serde(flatten)]
    pub state: SlotState,
}

/// Store mutations, flat with no nesting. This is the WAL record format and the
/// payload of change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ScheduleSet {
        provider: ProviderId,
        schedule: WeeklySchedule,
    },
    AppointmentRecorded {
        appointment: Appointment,
    },
    AppointmentStatusChanged {
        id: Ulid,
        provider: ProviderId,
        status: AppointmentStatus,
    },
    BlockadeCreated {
        provider: ProviderId,
        blockade: Blockade,
    },
    BlockadeRemoved {
        id: Ulid,
        provider: ProviderId,
    },
}

impl Event {
    pub fn provider(&self) -> ProviderId {
        match self {
            Event::ScheduleSet { provider, .. }
            | Event::AppointmentStatusChanged { provider, .. }
            | Event::BlockadeCreated { provider, .. }
            | Event::BlockadeRemoved { provider, .. } => *provider,
            Event::AppointmentRecorded { appointment } => appointment.provider,
        }
    }
}
