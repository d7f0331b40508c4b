use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::limits::LUNCH_HOUR;
use crate::model::*;

use super::blockade::BlockadeRegistry;
use super::candidates::candidate_slots;
use super::occupancy::occupied_on;
use super::schedule::WeeklyScheduleTable;

// ── Availability Algorithm ────────────────────────────────────────

/// How the minimum lead time is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeadTimePolicy {
    /// Compare the start of the requested day against `now + lead`. A day that
    /// starts inside the lead window is closed entirely, including later hours
    /// that would individually satisfy the lead time.
    #[default]
    DayStart,
    /// Compare each slot's own start against `now + lead`.
    SlotStart,
}

impl std::str::FromStr for LeadTimePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" | "day-start" => Ok(LeadTimePolicy::DayStart),
            "slot" | "slot-start" => Ok(LeadTimePolicy::SlotStart),
            other => Err(format!("unknown lead time policy: {other}")),
        }
    }
}

/// Everything one availability computation reads. Nothing here is mutated.
#[derive(Debug, Clone, Copy)]
pub struct DayQuery<'a> {
    pub date: NaiveDate,
    pub schedule: &'a WeeklySchedule,
    /// Bookings on `date`, plus any from the previous day that may spill over.
    pub bookings: &'a [Appointment],
    pub blockades: &'a BlockadeRegistry,
    pub min_lead_hours: u32,
    pub service_minutes: u32,
    pub now: NaiveDateTime,
}

impl DayQuery<'_> {
    fn earliest_bookable(&self) -> NaiveDateTime {
        self.now + Duration::hours(i64::from(self.min_lead_hours))
    }

    fn day_too_soon(&self) -> bool {
        self.date.and_time(MIDNIGHT) < self.earliest_bookable()
    }

    fn slot_too_soon(&self, time: NaiveTime) -> bool {
        self.date.and_time(time) < self.earliest_bookable()
    }
}

/// Reconciles operating hours, bookings, blockades, the lunch hour and the
/// lead time into the list of bookable slots for a single date.
///
/// Pure and synchronous: identical queries (including `now`) always return
/// identical output.
#[derive(Debug, Clone, Copy, Default)]
pub struct AvailabilityEngine {
    lead_policy: LeadTimePolicy,
}

impl AvailabilityEngine {
    pub fn new(lead_policy: LeadTimePolicy) -> Self {
        Self { lead_policy }
    }

    /// Bookable slots for `query.date`, ascending, without duplicates.
    pub fn available_slots(&self, query: &DayQuery<'_>) -> Vec<NaiveTime> {
        let table = WeeklyScheduleTable::new(query.schedule);
        let Some(day) = table.schedule_for(query.date.weekday()) else {
            return Vec::new();
        };
        if self.lead_policy == LeadTimePolicy::DayStart && query.day_too_soon() {
            return Vec::new();
        }

        let occupied = occupied_on(query.date, query.bookings, query.service_minutes);

        let free: BTreeSet<NaiveTime> = candidate_slots(day)
            .into_iter()
            .filter(|time| !occupied.contains(time))
            .filter(|time| !query.blockades.is_blocked(query.date, *time))
            .filter(|time| time.hour() != LUNCH_HOUR)
            .filter(|time| {
                self.lead_policy != LeadTimePolicy::SlotStart || !query.slot_too_soon(*time)
            })
            .collect();

        free.into_iter().collect()
    }

    /// State of a single hour on `query.date`. Agrees with `available_slots`:
    /// a time is listed there iff it classifies as `Available` here.
    pub fn classify(&self, query: &DayQuery<'_>, time: NaiveTime) -> SlotState {
        let table = WeeklyScheduleTable::new(query.schedule);
        let Some(day) = table.schedule_for(query.date.weekday()) else {
            return SlotState::OutsideSchedule;
        };
        if time.hour() == LUNCH_HOUR {
            return SlotState::LunchExcluded;
        }
        if !candidate_slots(day).contains(&time) {
            return SlotState::OutsideSchedule;
        }
        if self.lead_policy == LeadTimePolicy::DayStart && query.day_too_soon() {
            return SlotState::TooSoon;
        }
        if occupied_on(query.date, query.bookings, query.service_minutes).contains(&time) {
            return SlotState::Occupied;
        }
        if let Some(reason) = query.blockades.reason_for(query.date, time) {
            return SlotState::Blocked {
                reason: reason.to_string(),
            };
        }
        if self.lead_policy == LeadTimePolicy::SlotStart && query.slot_too_soon(time) {
            return SlotState::TooSoon;
        }
        SlotState::Available
    }

    /// One status per hour of the day, 00:00 through 23:00, for calendar grids.
    pub fn day_grid(&self, query: &DayQuery<'_>) -> Vec<SlotStatus> {
        (0..24)
            .filter_map(hour)
            .map(|time| SlotStatus {
                time,
                state: self.classify(query, time),
            })
            .collect()
    }
}
