use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate, NaiveTime};
use ulid::Ulid;

use slotwise::engine::{AvailabilityEngine, BlockadeRegistry, DayQuery};
use slotwise::model::*;

const QUERIES: usize = 2_000;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.1}us, p50={:.1}us, p95={:.1}us, p99={:.1}us, max={:.1}us",
        latencies.len(),
        avg.as_secs_f64() * 1e6,
        percentile(latencies, 50.0).as_secs_f64() * 1e6,
        percentile(latencies, 95.0).as_secs_f64() * 1e6,
        percentile(latencies, 99.0).as_secs_f64() * 1e6,
        latencies.last().copied().unwrap_or_default().as_secs_f64() * 1e6,
    );
}

fn t(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap()
}

/// A busy provider: a series in every slot across all cadences, plus a
/// year of one-offs and bookings.
fn registry(origin: NaiveDate) -> BlockadeRegistry {
    let mut records = Vec::new();
    let cadences = [Recurrence::Daily, Recurrence::Weekly, Recurrence::Monthly];
    for h in (0..24).filter(|&h| h != 12) {
        for (i, cadence) in cadences.iter().enumerate() {
            let start = origin + Days::new(i as u64 * 3 + u64::from(h % 5));
            records.push(Blockade::recurring(
                start,
                t(h),
                "Series",
                *cadence,
                RecurrenceEnd::Indefinite,
            ));
        }
    }
    for day in 0..365u64 {
        records.push(Blockade::one_off(origin + Days::new(day), t((day % 23) as u32), "One-off"));
    }
    BlockadeRegistry::from_records(records)
}

fn bookings(origin: NaiveDate) -> Vec<Appointment> {
    (0..365u64)
        .map(|day| Appointment {
            id: Ulid::new(),
            provider: Ulid::nil(),
            start: (origin + Days::new(day)).and_time(t((day % 20) as u32)),
            duration_minutes: 90,
            status: AppointmentStatus::Paid,
        })
        .collect()
}

fn main() {
    let origin = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let schedule = WeeklySchedule::every_day(DaySchedule::open(t(20), t(18)));
    let registry = registry(origin);
    let bookings = bookings(origin);
    let engine = AvailabilityEngine::default();
    let now = origin.and_time(MIDNIGHT);

    println!("=== slotwise recurrence bench ===");
    println!("  blockades: {}, bookings: {}", registry.len(), bookings.len());

    let mut membership = Vec::with_capacity(QUERIES);
    let mut blocked = 0usize;
    for i in 0..QUERIES {
        let date = origin + Days::new((i % 366) as u64);
        let slot = t((i % 24) as u32);
        let started = Instant::now();
        if registry.is_blocked(date, slot) {
            blocked += 1;
        }
        membership.push(started.elapsed());
    }
    print_latency("is_blocked", &mut membership);
    println!("    blocked: {blocked}/{QUERIES}");

    let mut availability = Vec::with_capacity(QUERIES);
    let mut open = 0usize;
    for i in 0..QUERIES {
        let date = origin + Days::new((i % 366) as u64);
        let query = DayQuery {
            date,
            schedule: &schedule,
            bookings: &bookings,
            blockades: &registry,
            min_lead_hours: 0,
            service_minutes: 60,
            now,
        };
        let started = Instant::now();
        open += engine.available_slots(&query).len();
        availability.push(started.elapsed());
    }
    print_latency("available_slots", &mut availability);
    println!("    open slots returned: {open}");
}
