use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, NaiveTime};

use crate::limits::SLOT_MINUTES;
use crate::model::{Appointment, Slot};

/// Number of whole slots a booking of `minutes` covers. Partial hours round up.
pub fn slots_spanned(minutes: u32) -> u32 {
    minutes.div_ceil(SLOT_MINUTES).max(1)
}

/// Every slot held by the given appointments, across dates.
///
/// Each active appointment holds the slot it starts in plus
/// `ceil(duration / 60) - 1` following slots. Minute precision is dropped in
/// favour of never understating occupancy. Appointments without a duration
/// use `service_minutes`. Cancelled appointments hold nothing.
pub fn occupied_slots(appointments: &[Appointment], service_minutes: u32) -> BTreeSet<Slot> {
    let mut occupied = BTreeSet::new();
    for appointment in appointments.iter().filter(|a| a.status.is_active()) {
        let minutes = match appointment.duration_minutes {
            0 => service_minutes,
            m => m,
        };
        let first = appointment.slot().start();
        for step in 0..slots_spanned(minutes) {
            let at = first + Duration::minutes(i64::from(step * SLOT_MINUTES));
            occupied.insert(Slot::containing(at));
        }
    }
    occupied
}

/// Occupied times on `date` only. Hours spilling over from a booking that
/// started the day before are included when that booking is passed in.
pub fn occupied_on(
    date: NaiveDate,
    appointments: &[Appointment],
    service_minutes: u32,
) -> BTreeSet<NaiveTime> {
    occupied_slots(appointments, service_minutes)
        .into_iter()
        .filter(|slot| slot.date == date)
        .map(|slot| slot.time)
        .collect()
}

#[cfg(test)]
mod tests {
    use ulid::Ulid;

    use super::*;
    use crate::model::AppointmentStatus;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn appt(day: u32, h: u32, m: u32, minutes: u32, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Ulid::new(),
            provider: Ulid::nil(),
            start: d(day).and_hms_opt(h, m, 0).unwrap(),
            duration_minutes: minutes,
            status,
        }
    }

    #[test]
    fn ninety_minutes_holds_two_hours() {
        let booked = [appt(6, 14, 0, 90, AppointmentStatus::Paid)];
        let occupied = occupied_on(d(6), &booked, 60);
        assert_eq!(occupied, BTreeSet::from([t(14), t(15)]));
    }

    #[test]
    fn exact_hour_holds_one_slot() {
        let booked = [appt(6, 9, 0, 60, AppointmentStatus::Scheduled)];
        assert_eq!(occupied_on(d(6), &booked, 60), BTreeSet::from([t(9)]));
    }

    #[test]
    fn cancelled_bookings_hold_nothing() {
        let booked = [appt(6, 9, 0, 120, AppointmentStatus::Cancelled)];
        assert!(occupied_on(d(6), &booked, 60).is_empty());
    }

    #[test]
    fn zero_duration_falls_back_to_service_length() {
        let booked = [appt(6, 10, 0, 0, AppointmentStatus::ToCollect)];
        let occupied = occupied_on(d(6), &booked, 180);
        assert_eq!(occupied, BTreeSet::from([t(10), t(11), t(12)]));
    }

    #[test]
    fn off_hour_start_marks_its_own_hour() {
        let booked = [appt(6, 10, 30, 60, AppointmentStatus::Paid)];
        // 10:30-11:30 really touches 11:00 too, but the model counts from the
        // start hour only.
        assert_eq!(occupied_on(d(6), &booked, 60), BTreeSet::from([t(10)]));
    }

    #[test]
    fn late_booking_spills_into_next_day() {
        let booked = [appt(6, 23, 0, 150, AppointmentStatus::Paid)];
        assert_eq!(occupied_on(d(6), &booked, 60), BTreeSet::from([t(23)]));
        assert_eq!(occupied_on(d(7), &booked, 60), BTreeSet::from([t(0), t(1)]));
    }

    #[test]
    fn overlapping_bookings_deduplicate() {
        let booked = [
            appt(6, 14, 0, 120, AppointmentStatus::Paid),
            appt(6, 15, 0, 60, AppointmentStatus::Paid),
        ];
        assert_eq!(occupied_on(d(6), &booked, 60), BTreeSet::from([t(14), t(15)]));
    }

    #[test]
    fn spanned_rounds_up() {
        assert_eq!(slots_spanned(1), 1);
        assert_eq!(slots_spanned(60), 1);
        assert_eq!(slots_spanned(61), 2);
        assert_eq!(slots_spanned(90), 2);
        assert_eq!(slots_spanned(0), 1);
    }
}
