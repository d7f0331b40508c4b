use chrono::{NaiveTime, Timelike};

use crate::limits::LUNCH_HOUR;
use crate::model::{hour, DaySchedule};

/// Hour-aligned candidate slots for one day's operating hours, before any
/// occupancy or blockade filtering.
///
/// Non-crossing windows enumerate `start..=end`, with the midnight sentinel
/// clamped to 23. Windows that run through midnight enumerate `start..=23`
/// and then `0..end`. The lunch hour is never produced. Slots come back in
/// generation order, so a crossing window yields its late hours first.
pub fn candidate_slots(day: &DaySchedule) -> Vec<NaiveTime> {
    if !day.enabled {
        return Vec::new();
    }

    let start = day.start.hour();
    let hours: Vec<u32> = if day.ends_at_midnight() {
        (start..=23).collect()
    } else if day.crosses_midnight() {
        (start..=23).chain(0..day.end.hour()).collect()
    } else {
        (start..=day.end.hour()).collect()
    };

    hours
        .into_iter()
        .filter(|h| *h != LUNCH_HOUR)
        .filter_map(hour)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MIDNIGHT;

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn hours(slots: &[NaiveTime]) -> Vec<u32> {
        slots.iter().map(|s| s.hour()).collect()
    }

    #[test]
    fn disabled_day_yields_nothing() {
        let mut day = DaySchedule::open(t(8), t(20));
        day.enabled = false;
        assert!(candidate_slots(&day).is_empty());
    }

    #[test]
    fn regular_day_is_inclusive_and_skips_lunch() {
        let slots = candidate_slots(&DaySchedule::open(t(9), t(14)));
        assert_eq!(hours(&slots), vec![9, 10, 11, 13, 14]);
    }

    #[test]
    fn evening_into_early_hours() {
        let slots = candidate_slots(&DaySchedule::open(t(18), t(2)));
        assert_eq!(hours(&slots), vec![18, 19, 20, 21, 22, 23, 0, 1]);
        assert_eq!(slots.len(), 8);
    }

    #[test]
    fn midnight_close_runs_to_end_of_day() {
        let slots = candidate_slots(&DaySchedule::open(t(8), MIDNIGHT));
        assert_eq!(slots.len(), 15);
        assert_eq!(hours(&slots), vec![8, 9, 10, 11, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23]);
    }

    #[test]
    fn all_day_schedule_still_drops_lunch() {
        let slots = candidate_slots(&DaySchedule::open(MIDNIGHT, MIDNIGHT));
        assert_eq!(slots.len(), 23);
        assert!(!slots.contains(&t(12)));
        assert_eq!(slots.first(), Some(&t(0)));
        assert_eq!(slots.last(), Some(&t(23)));
    }

    #[test]
    fn crossing_window_drops_lunch_in_morning_tail() {
        let slots = candidate_slots(&DaySchedule::open(t(20), t(14)));
        assert_eq!(
            hours(&slots),
            vec![20, 21, 22, 23, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 13]
        );
    }

    #[test]
    fn closing_at_one_leaves_only_midnight_hour() {
        let slots = candidate_slots(&DaySchedule::open(t(22), t(1)));
        assert_eq!(hours(&slots), vec![22, 23, 0]);
    }

    #[test]
    fn half_hour_bounds_use_the_hour() {
        let start = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
        let end = NaiveTime::from_hms_opt(10, 30, 0).unwrap();
        let slots = candidate_slots(&DaySchedule::open(start, end));
        assert_eq!(hours(&slots), vec![8, 9, 10]);
        assert!(slots.iter().all(|s| s.minute() == 0));
    }
}
