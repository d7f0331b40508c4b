//! Store ports the availability service reads through, plus two adapters:
//! an in-memory store and a durable WAL-backed one.

mod durable;
mod memory;

pub use durable::DurableStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use ulid::Ulid;

use crate::engine::BlockadeError;
use crate::model::*;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing source could not be reached or read.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("slot {slot} is already booked for provider {provider}")]
    SlotTaken { provider: ProviderId, slot: Slot },
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("already exists: {0}")]
    AlreadyExists(Ulid),
    #[error(transparent)]
    Blockade(#[from] BlockadeError),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("WAL error: {0}")]
    Wal(String),
}

/// Weekly operating hours per provider.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// `Ok(None)` when the provider has never been configured.
    async fn weekly_schedule(&self, provider: ProviderId)
        -> Result<Option<WeeklySchedule>, StoreError>;

    async fn put_schedule(
        &self,
        provider: ProviderId,
        schedule: WeeklySchedule,
    ) -> Result<(), StoreError>;
}

/// Appointments per provider. Recording enforces that no two active
/// appointments of a provider hold the same slot.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Non-cancelled appointments starting on any date in `from..=to`,
    /// ordered by start.
    async fn active_appointments(
        &self,
        provider: ProviderId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn record_appointment(&self, appointment: Appointment) -> Result<(), StoreError>;

    async fn set_status(
        &self,
        provider: ProviderId,
        id: Ulid,
        status: AppointmentStatus,
    ) -> Result<(), StoreError>;
}

/// One-off and recurring blockade records per provider.
#[async_trait]
pub trait BlockadeStore: Send + Sync {
    async fn blockades(&self, provider: ProviderId) -> Result<Vec<Blockade>, StoreError>;

    async fn insert_blockade(
        &self,
        provider: ProviderId,
        blockade: Blockade,
    ) -> Result<(), StoreError>;

    async fn delete_blockade(&self, provider: ProviderId, id: Ulid) -> Result<Blockade, StoreError>;
}
