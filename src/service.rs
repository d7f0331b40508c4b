use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Days, NaiveDate, NaiveTime};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::clock::Clock;
use crate::config::Config;
use crate::engine::{
    validate_blockade, AvailabilityEngine, BlockadeError, BlockadeRegistry, DayQuery,
};
use crate::limits::MAX_SPILL_DAYS;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability::*;
use crate::store::{BlockadeStore, BookingStore, ScheduleStore, StoreError};

/// Which input of the computation could not be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Schedule,
    Bookings,
    Blockades,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Schedule => "schedule",
            DataSource::Bookings => "bookings",
            DataSource::Blockades => "blockades",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AvailabilityError {
    /// An input could not be read, so availability is unknown. Neither
    /// "all open" nor "all closed" is assumed.
    #[error("availability unknown: {input} unavailable: {reason}")]
    DataUnavailable { input: DataSource, reason: String },
    #[error(transparent)]
    InvalidBlockade(#[from] BlockadeError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AvailabilityError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Blockade(e) => AvailabilityError::InvalidBlockade(e),
            other => AvailabilityError::Store(other),
        }
    }
}

fn unavailable(input: DataSource, err: StoreError) -> AvailabilityError {
    warn!(%input, error = %err, "availability input unavailable");
    metrics::counter!(DATA_UNAVAILABLE_TOTAL, "source" => input.as_str()).increment(1);
    AvailabilityError::DataUnavailable {
        input,
        reason: err.to_string(),
    }
}

/// Everything fetched for one provider and date.
struct DayInputs {
    schedule: WeeklySchedule,
    bookings: Vec<Appointment>,
    blockades: BlockadeRegistry,
}

/// The single entry point for availability. Fetches the three inputs
/// concurrently through the store ports, reads the clock once, and hands
/// everything to the pure engine.
pub struct AvailabilityService {
    schedules: Arc<dyn ScheduleStore>,
    bookings: Arc<dyn BookingStore>,
    blockades: Arc<dyn BlockadeStore>,
    clock: Arc<dyn Clock>,
    notify: Arc<NotifyHub>,
    engine: AvailabilityEngine,
    min_lead_hours: u32,
    service_minutes: u32,
}

impl AvailabilityService {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        bookings: Arc<dyn BookingStore>,
        blockades: Arc<dyn BlockadeStore>,
        clock: Arc<dyn Clock>,
        notify: Arc<NotifyHub>,
    ) -> Self {
        let defaults = Config::default();
        Self {
            schedules,
            bookings,
            blockades,
            clock,
            notify,
            engine: AvailabilityEngine::new(defaults.lead_policy),
            min_lead_hours: defaults.min_lead_hours,
            service_minutes: defaults.service_minutes,
        }
    }

    /// Apply lead time, lead policy and default service length from config.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.engine = AvailabilityEngine::new(config.lead_policy);
        self.min_lead_hours = config.min_lead_hours;
        self.service_minutes = config.service_minutes;
        self
    }

    pub fn with_min_lead_hours(mut self, hours: u32) -> Self {
        self.min_lead_hours = hours;
        self
    }

    /// Changes to any input of `provider` arrive here; re-query on receipt.
    pub fn subscribe(&self, provider: ProviderId) -> broadcast::Receiver<Event> {
        self.notify.subscribe(provider)
    }

    async fn fetch(&self, provider: ProviderId, date: NaiveDate) -> Result<DayInputs, AvailabilityError> {
        // The longest accepted booking can run this many days past its start.
        let from = date
            .checked_sub_days(Days::new(MAX_SPILL_DAYS))
            .unwrap_or(NaiveDate::MIN);
        let (schedule, bookings, blockades) = futures::try_join!(
            async {
                self.schedules
                    .weekly_schedule(provider)
                    .await
                    .map_err(|e| unavailable(DataSource::Schedule, e))
            },
            async {
                self.bookings
                    .active_appointments(provider, from, date)
                    .await
                    .map_err(|e| unavailable(DataSource::Bookings, e))
            },
            async {
                self.blockades
                    .blockades(provider)
                    .await
                    .map_err(|e| unavailable(DataSource::Blockades, e))
            },
        )?;

        let schedule = schedule.unwrap_or_else(|| {
            debug!(%provider, "no schedule configured; treating provider as closed");
            WeeklySchedule::closed()
        });
        Ok(DayInputs {
            schedule,
            bookings,
            blockades: BlockadeRegistry::from_records(blockades),
        })
    }

    fn query<'a>(
        &self,
        date: NaiveDate,
        inputs: &'a DayInputs,
        service_minutes: Option<u32>,
    ) -> DayQuery<'a> {
        DayQuery {
            date,
            schedule: &inputs.schedule,
            bookings: &inputs.bookings,
            blockades: &inputs.blockades,
            min_lead_hours: self.min_lead_hours,
            service_minutes: service_minutes.unwrap_or(self.service_minutes),
            now: self.clock.now(),
        }
    }

    /// Bookable slots for `date`, ascending. `service_minutes` overrides the
    /// configured length used for bookings without a duration.
    pub async fn available_slots(
        &self,
        provider: ProviderId,
        date: NaiveDate,
        service_minutes: Option<u32>,
    ) -> Result<Vec<NaiveTime>, AvailabilityError> {
        let started = Instant::now();
        let result = self.fetch(provider, date).await.map(|inputs| {
            let query = self.query(date, &inputs, service_minutes);
            self.engine.available_slots(&query)
        });
        let outcome = if result.is_ok() { "ok" } else { "unavailable" };
        metrics::counter!(AVAILABILITY_QUERIES_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(AVAILABILITY_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        result
    }

    /// Per-hour status of `date`, for calendar grids.
    pub async fn day_grid(
        &self,
        provider: ProviderId,
        date: NaiveDate,
        service_minutes: Option<u32>,
    ) -> Result<Vec<SlotStatus>, AvailabilityError> {
        let inputs = self.fetch(provider, date).await?;
        let query = self.query(date, &inputs, service_minutes);
        Ok(self.engine.day_grid(&query))
    }

    /// Reason of the blockade closing `(date, slot)`, for tooltips.
    pub async fn reason_for(
        &self,
        provider: ProviderId,
        date: NaiveDate,
        slot: NaiveTime,
    ) -> Result<Option<String>, AvailabilityError> {
        let registry = self.registry(provider).await?;
        Ok(registry.reason_for(date, slot).map(str::to_string))
    }

    async fn registry(&self, provider: ProviderId) -> Result<BlockadeRegistry, AvailabilityError> {
        let records = self
            .blockades
            .blockades(provider)
            .await
            .map_err(|e| unavailable(DataSource::Blockades, e))?;
        Ok(BlockadeRegistry::from_records(records))
    }

    /// Validate and persist a blockade. Invalid input never reaches the store.
    pub async fn create_blockade(
        &self,
        provider: ProviderId,
        blockade: Blockade,
    ) -> Result<Ulid, AvailabilityError> {
        let result = self.try_create_blockade(provider, blockade).await;
        record_mutation("create", result.is_ok());
        result
    }

    async fn try_create_blockade(
        &self,
        provider: ProviderId,
        blockade: Blockade,
    ) -> Result<Ulid, AvailabilityError> {
        validate_blockade(&blockade)?;
        self.registry(provider).await?.check_create(&blockade)?;
        let id = blockade.id;
        self.blockades.insert_blockade(provider, blockade).await?;
        Ok(id)
    }

    /// Delete the one-off blockade at `(date, slot)`.
    pub async fn remove_blockade(
        &self,
        provider: ProviderId,
        date: NaiveDate,
        slot: NaiveTime,
    ) -> Result<Blockade, AvailabilityError> {
        let result = self.try_remove_blockade(provider, date, slot).await;
        record_mutation("remove", result.is_ok());
        result
    }

    async fn try_remove_blockade(
        &self,
        provider: ProviderId,
        date: NaiveDate,
        slot: NaiveTime,
    ) -> Result<Blockade, AvailabilityError> {
        let id = self.registry(provider).await?.remove(date, slot)?.id;
        Ok(self.blockades.delete_blockade(provider, id).await?)
    }

    /// Delete a whole recurring series.
    pub async fn remove_series(
        &self,
        provider: ProviderId,
        id: Ulid,
    ) -> Result<Blockade, AvailabilityError> {
        let result = self.try_remove_series(provider, id).await;
        record_mutation("remove_series", result.is_ok());
        result
    }

    async fn try_remove_series(
        &self,
        provider: ProviderId,
        id: Ulid,
    ) -> Result<Blockade, AvailabilityError> {
        self.registry(provider).await?.remove_series(id)?;
        Ok(self.blockades.delete_blockade(provider, id).await?)
    }
}

fn record_mutation(op: &'static str, ok: bool) {
    let status = if ok { "ok" } else { "rejected" };
    metrics::counter!(BLOCKADE_MUTATIONS_TOTAL, "op" => op, "status" => status).increment(1);
}
