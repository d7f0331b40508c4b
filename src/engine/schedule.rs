use chrono::Weekday;

use crate::model::{DaySchedule, WeeklySchedule};

/// Read-only view over a provider's weekly operating hours.
#[derive(Debug, Clone, Copy)]
pub struct WeeklyScheduleTable<'a> {
    schedule: &'a WeeklySchedule,
}

impl<'a> WeeklyScheduleTable<'a> {
    pub fn new(schedule: &'a WeeklySchedule) -> Self {
        Self { schedule }
    }

    /// Hours for `weekday`, or `None` when the provider is closed that day.
    pub fn schedule_for(&self, weekday: Weekday) -> Option<&'a DaySchedule> {
        let day = self.schedule.day(weekday);
        day.enabled.then_some(day)
    }
}
