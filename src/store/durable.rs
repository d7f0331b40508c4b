use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::{error, info};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

use super::{BlockadeStore, BookingStore, MemoryStore, ScheduleStore, StoreError};

/// WAL-backed store. State lives in a `MemoryStore`; every mutation is
/// checked, appended and fsynced, then applied and broadcast.
pub struct DurableStore {
    state: MemoryStore,
    wal: Mutex<Wal>,
    compact_threshold: u64,
}

impl DurableStore {
    /// Replay the WAL at `path` (if any) and open it for appending.
    pub fn open(path: &Path, notify: Arc<NotifyHub>, compact_threshold: u64) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let state = MemoryStore::new(notify);
        for event in &events {
            state.apply_event(event);
        }
        let wal = Wal::open(path)?;
        info!(path = %path.display(), events = events.len(), "store opened");
        Ok(Self {
            state,
            wal: Mutex::new(wal),
            compact_threshold,
        })
    }

    /// Length given to appointments recorded without one.
    pub fn with_service_minutes(mut self, minutes: u32) -> Self {
        self.state = self.state.with_service_minutes(minutes);
        self
    }

    pub fn resolve_duration(&self, appointment: Appointment) -> Appointment {
        self.state.resolve_duration(appointment)
    }

    pub fn notify(&self) -> &Arc<NotifyHub> {
        self.state.notify()
    }

    async fn commit(&self, event: Event) -> Result<(), StoreError> {
        let mut wal = self.wal.lock().await;
        self.state.check(&event)?;
        wal.append(&event).map_err(|e| {
            error!("WAL append failed: {e}");
            StoreError::Wal(e.to_string())
        })?;
        metrics::counter!(crate::observability::WAL_APPENDS_TOTAL).increment(1);
        self.state.apply_event(&event);

        if self.compact_threshold > 0 && wal.appends_since_compact() >= self.compact_threshold {
            let snapshot = self.state.snapshot_events();
            match wal.compact(&snapshot) {
                Ok(()) => info!(events = snapshot.len(), "WAL compacted"),
                // The append above is durable; compaction can wait for the next one.
                Err(e) => error!("WAL compaction failed: {e}"),
            }
        }
        drop(wal);

        self.state.notify().send(&event);
        Ok(())
    }
}

#[async_trait]
impl ScheduleStore for DurableStore {
    async fn weekly_schedule(
        &self,
        provider: ProviderId,
    ) -> Result<Option<WeeklySchedule>, StoreError> {
        Ok(self.state.schedule(&provider))
    }

    async fn put_schedule(
        &self,
        provider: ProviderId,
        schedule: WeeklySchedule,
    ) -> Result<(), StoreError> {
        self.commit(Event::ScheduleSet { provider, schedule }).await
    }
}

#[async_trait]
impl BookingStore for DurableStore {
    async fn active_appointments(
        &self,
        provider: ProviderId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        Ok(self.state.appointments_between(&provider, from, to))
    }

    async fn record_appointment(&self, appointment: Appointment) -> Result<(), StoreError> {
        let appointment = self.state.resolve_duration(appointment);
        self.commit(Event::AppointmentRecorded { appointment }).await
    }

    async fn set_status(
        &self,
        provider: ProviderId,
        id: Ulid,
        status: AppointmentStatus,
    ) -> Result<(), StoreError> {
        self.commit(Event::AppointmentStatusChanged {
            id,
            provider,
            status,
        })
        .await
    }
}

#[async_trait]
impl BlockadeStore for DurableStore {
    async fn blockades(&self, provider: ProviderId) -> Result<Vec<Blockade>, StoreError> {
        Ok(self.state.blockade_records(&provider))
    }

    async fn insert_blockade(
        &self,
        provider: ProviderId,
        blockade: Blockade,
    ) -> Result<(), StoreError> {
        self.commit(Event::BlockadeCreated { provider, blockade }).await
    }

    async fn delete_blockade(&self, provider: ProviderId, id: Ulid) -> Result<Blockade, StoreError> {
        let existing = self
            .state
            .blockade_records(&provider)
            .into_iter()
            .find(|b| b.id == id)
            .ok_or(StoreError::NotFound(id))?;
        self.commit(Event::BlockadeRemoved { id, provider }).await?;
        Ok(existing)
    }
}
