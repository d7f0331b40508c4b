//! The pure availability engine. No I/O, no locking, no clock reads: callers
//! fetch schedule, bookings and blockades, then ask for a day's slots.

mod availability;
mod blockade;
mod candidates;
mod error;
mod occupancy;
mod recurrence;
mod schedule;

pub use availability::{AvailabilityEngine, DayQuery, LeadTimePolicy};
pub use blockade::{validate as validate_blockade, BlockadeRegistry, SeriesKey};
pub use candidates::candidate_slots;
pub use error::BlockadeError;
pub use occupancy::{occupied_on, occupied_slots, slots_spanned};
pub use recurrence::{membership, Membership, Occurrences};
pub use schedule::WeeklyScheduleTable;
