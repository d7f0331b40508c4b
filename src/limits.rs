/// Hour that is never bookable, on any day, for any provider.
pub const LUNCH_HOUR: u32 = 12;

/// Fixed slot granularity. Occupancy and candidates both use it.
pub const SLOT_MINUTES: u32 = 60;

/// Maximum cadence steps walked for an indefinite recurring blockade.
pub const MAX_RECURRENCE_ITERATIONS: usize = 365;

pub const MAX_REASON_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 4096;
pub const MAX_BLOCKADES_PER_PROVIDER: usize = 100_000;

/// Longest appointment accepted by the stores (one week).
pub const MAX_APPOINTMENT_MINUTES: u32 = 7 * 24 * 60;

/// Days before a queried date on which a still-running appointment may have
/// started.
pub const MAX_SPILL_DAYS: u64 = MAX_APPOINTMENT_MINUTES.div_ceil(24 * 60) as u64;

/// Length given to appointments recorded without a duration.
pub const DEFAULT_SERVICE_MINUTES: u32 = 60;

/// Widest lead time accepted by configuration (one year).
pub const MAX_MIN_LEAD_HOURS: u32 = 366 * 24;
