use chrono::{Days, Months, NaiveDate};

use crate::limits::MAX_RECURRENCE_ITERATIONS;
use crate::model::{Recurrence, RecurrenceEnd};

/// Lazy walk over the dates of a blockade series, starting at its origin.
///
/// The n-th occurrence is computed from the origin rather than from the
/// previous occurrence, so monthly series anchored on the 31st land on the
/// last day of short months without drifting. Indefinite series stop after
/// `MAX_RECURRENCE_ITERATIONS` steps past the origin; bounded series stop
/// after their last date.
#[derive(Debug, Clone)]
pub struct Occurrences {
    origin: NaiveDate,
    cadence: Recurrence,
    end: RecurrenceEnd,
    step: u32,
    ceiling_reached: bool,
    done: bool,
}

impl Occurrences {
    pub fn new(origin: NaiveDate, cadence: Recurrence, end: RecurrenceEnd) -> Self {
        Self {
            origin,
            cadence,
            end,
            step: 0,
            ceiling_reached: false,
            done: false,
        }
    }

    /// True once an indefinite series was cut off by the iteration cap.
    pub fn ceiling_reached(&self) -> bool {
        self.ceiling_reached
    }

    fn nth_date(&self, n: u32) -> Option<NaiveDate> {
        match self.cadence {
            Recurrence::None => (n == 0).then_some(self.origin),
            Recurrence::Daily => self.origin.checked_add_days(Days::new(u64::from(n))),
            Recurrence::Weekly => self.origin.checked_add_days(Days::new(u64::from(n) * 7)),
            Recurrence::Monthly => self.origin.checked_add_months(Months::new(n)),
        }
    }
}

impl Iterator for Occurrences {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        if self.done {
            return None;
        }
        if self.end == RecurrenceEnd::Indefinite && self.step as usize > MAX_RECURRENCE_ITERATIONS {
            self.ceiling_reached = true;
            self.done = true;
            return None;
        }
        let date = match self.nth_date(self.step) {
            Some(date) => date,
            None => {
                self.done = true;
                return None;
            }
        };
        if let RecurrenceEnd::Until(last) = self.end
            && date > last
        {
            self.done = true;
            return None;
        }
        self.step += 1;
        Some(date)
    }
}

/// Outcome of testing one date against a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Hit,
    Miss,
    /// The walk hit the iteration cap before reaching the target date.
    CeilingReached,
}

/// Walk the series forward until it lands on or passes `target`.
pub fn membership(
    origin: NaiveDate,
    cadence: Recurrence,
    end: RecurrenceEnd,
    target: NaiveDate,
) -> Membership {
    if target < origin {
        return Membership::Miss;
    }
    let mut walk = Occurrences::new(origin, cadence, end);
    for date in walk.by_ref() {
        if date == target {
            return Membership::Hit;
        }
        if date > target {
            return Membership::Miss;
        }
    }
    if walk.ceiling_reached() {
        Membership::CeilingReached
    } else {
        Membership::Miss
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn one_off_yields_origin_only() {
        let dates: Vec<_> =
            Occurrences::new(d(2025, 1, 6), Recurrence::None, RecurrenceEnd::Indefinite).collect();
        assert_eq!(dates, vec![d(2025, 1, 6)]);
    }

    #[test]
    fn weekly_steps_seven_days() {
        let dates: Vec<_> =
            Occurrences::new(d(2025, 1, 6), Recurrence::Weekly, RecurrenceEnd::Indefinite)
                .take(3)
                .collect();
        assert_eq!(dates, vec![d(2025, 1, 6), d(2025, 1, 13), d(2025, 1, 20)]);
    }

    #[test]
    fn monthly_clamps_to_month_end_without_drift() {
        let dates: Vec<_> =
            Occurrences::new(d(2025, 1, 31), Recurrence::Monthly, RecurrenceEnd::Indefinite)
                .take(4)
                .collect();
        assert_eq!(
            dates,
            vec![d(2025, 1, 31), d(2025, 2, 28), d(2025, 3, 31), d(2025, 4, 30)]
        );
    }

    #[test]
    fn bounded_series_includes_last_date() {
        let dates: Vec<_> = Occurrences::new(
            d(2025, 1, 1),
            Recurrence::Daily,
            RecurrenceEnd::Until(d(2025, 1, 3)),
        )
        .collect();
        assert_eq!(dates, vec![d(2025, 1, 1), d(2025, 1, 2), d(2025, 1, 3)]);
    }

    #[test]
    fn indefinite_daily_is_capped() {
        let mut walk = Occurrences::new(d(2025, 1, 1), Recurrence::Daily, RecurrenceEnd::Indefinite);
        let count = walk.by_ref().count();
        assert_eq!(count, MAX_RECURRENCE_ITERATIONS + 1);
        assert!(walk.ceiling_reached());
    }

    #[test]
    fn bounded_series_never_reports_ceiling() {
        let mut walk = Occurrences::new(
            d(2025, 1, 1),
            Recurrence::Daily,
            RecurrenceEnd::Until(d(2027, 1, 1)),
        );
        assert_eq!(walk.by_ref().count(), 731);
        assert!(!walk.ceiling_reached());
    }

    #[test]
    fn membership_hits_and_misses() {
        let origin = d(2025, 1, 6);
        let weekly = |target| membership(origin, Recurrence::Weekly, RecurrenceEnd::Indefinite, target);
        assert_eq!(weekly(d(2025, 1, 6)), Membership::Hit);
        assert_eq!(weekly(d(2025, 3, 3)), Membership::Hit);
        assert_eq!(weekly(d(2025, 3, 4)), Membership::Miss);
        assert_eq!(weekly(d(2024, 12, 30)), Membership::Miss);
    }

    #[test]
    fn membership_respects_end_bound() {
        let end = RecurrenceEnd::Until(d(2025, 1, 20));
        assert_eq!(
            membership(d(2025, 1, 6), Recurrence::Weekly, end, d(2025, 1, 20)),
            Membership::Hit
        );
        assert_eq!(
            membership(d(2025, 1, 6), Recurrence::Weekly, end, d(2025, 1, 27)),
            Membership::Miss
        );
    }

    #[test]
    fn membership_past_cap_reports_ceiling() {
        let origin = d(2025, 1, 1);
        assert_eq!(
            membership(origin, Recurrence::Daily, RecurrenceEnd::Indefinite, d(2026, 1, 1)),
            Membership::Hit
        );
        assert_eq!(
            membership(origin, Recurrence::Daily, RecurrenceEnd::Indefinite, d(2026, 1, 2)),
            Membership::CeilingReached
        );
    }
}
