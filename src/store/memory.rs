use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::engine::{occupied_slots, BlockadeRegistry};
use crate::limits::*;
use crate::model::*;
use crate::notify::NotifyHub;

use super::{BlockadeStore, BookingStore, ScheduleStore, StoreError};

/// In-memory state for every provider. Also the materialized view behind
/// `DurableStore`, which replays its WAL into one of these.
pub struct MemoryStore {
    schedules: DashMap<ProviderId, WeeklySchedule>,
    /// Per provider, sorted by start.
    appointments: DashMap<ProviderId, Vec<Appointment>>,
    blockades: DashMap<ProviderId, Vec<Blockade>>,
    notify: Arc<NotifyHub>,
    /// Length of appointments recorded without one.
    service_minutes: u32,
    /// Serializes check + apply so two writers can't both pass validation.
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new(notify: Arc<NotifyHub>) -> Self {
        Self {
            schedules: DashMap::new(),
            appointments: DashMap::new(),
            blockades: DashMap::new(),
            notify,
            service_minutes: DEFAULT_SERVICE_MINUTES,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_service_minutes(mut self, minutes: u32) -> Self {
        self.service_minutes = minutes;
        self
    }

    /// Give an appointment without a duration the service length, so the
    /// recorded booking holds exactly the slots availability reports.
    pub fn resolve_duration(&self, mut appointment: Appointment) -> Appointment {
        if appointment.duration_minutes == 0 {
            appointment.duration_minutes = self.service_minutes;
        }
        appointment
    }

    pub fn notify(&self) -> &Arc<NotifyHub> {
        &self.notify
    }

    // ── Reads ────────────────────────────────────────────────

    pub fn schedule(&self, provider: &ProviderId) -> Option<WeeklySchedule> {
        self.schedules.get(provider).map(|e| e.value().clone())
    }

    pub fn appointments_between(
        &self,
        provider: &ProviderId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<Appointment> {
        self.appointments
            .get(provider)
            .map(|list| {
                list.iter()
                    .filter(|a| a.status.is_active())
                    .filter(|a| (from..=to).contains(&a.start.date()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn blockade_records(&self, provider: &ProviderId) -> Vec<Blockade> {
        self.blockades
            .get(provider)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    // ── Validation ───────────────────────────────────────────

    /// Check an event against current state without applying it.
    pub fn check(&self, event: &Event) -> Result<(), StoreError> {
        match event {
            Event::ScheduleSet { .. } => Ok(()),
            Event::AppointmentRecorded { appointment } => {
                if appointment.duration_minutes > MAX_APPOINTMENT_MINUTES {
                    return Err(StoreError::LimitExceeded("appointment too long"));
                }
                if self.find_appointment(&appointment.provider, appointment.id).is_some() {
                    return Err(StoreError::AlreadyExists(appointment.id));
                }
                if appointment.status.is_active() {
                    self.check_slots_free(appointment)?;
                }
                Ok(())
            }
            Event::AppointmentStatusChanged {
                id,
                provider,
                status,
            } => {
                let current = self
                    .find_appointment(provider, *id)
                    .ok_or(StoreError::NotFound(*id))?;
                if status.is_active() && !current.status.is_active() {
                    self.check_slots_free(&Appointment {
                        status: *status,
                        ..current
                    })?;
                }
                Ok(())
            }
            Event::BlockadeCreated { provider, blockade } => {
                BlockadeRegistry::from_records(self.blockade_records(provider))
                    .check_create(blockade)?;
                Ok(())
            }
            Event::BlockadeRemoved { id, provider } => {
                let exists = self
                    .blockades
                    .get(provider)
                    .is_some_and(|list| list.iter().any(|b| b.id == *id));
                if exists {
                    Ok(())
                } else {
                    Err(StoreError::NotFound(*id))
                }
            }
        }
    }

    fn find_appointment(&self, provider: &ProviderId, id: Ulid) -> Option<Appointment> {
        self.appointments
            .get(provider)
            .and_then(|list| list.iter().find(|a| a.id == id).cloned())
    }

    /// The uniqueness constraint on `(provider, date, slot)`: a new active
    /// appointment may not hold any slot an existing active one holds.
    fn check_slots_free(&self, appointment: &Appointment) -> Result<(), StoreError> {
        let wanted = occupied_slots(std::slice::from_ref(appointment), self.service_minutes);
        let Some(list) = self.appointments.get(&appointment.provider) else {
            return Ok(());
        };
        let others: Vec<Appointment> = list
            .iter()
            .filter(|a| a.id != appointment.id)
            .cloned()
            .collect();
        let held: BTreeSet<Slot> = occupied_slots(&others, self.service_minutes);
        match wanted.intersection(&held).next() {
            Some(slot) => Err(StoreError::SlotTaken {
                provider: appointment.provider,
                slot: *slot,
            }),
            None => Ok(()),
        }
    }

    // ── Event application ────────────────────────────────────

    /// Apply an already-checked event. Used by replay as well.
    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::ScheduleSet { provider, schedule } => {
                self.schedules.insert(*provider, schedule.clone());
            }
            Event::AppointmentRecorded { appointment } => {
                let mut list = self.appointments.entry(appointment.provider).or_default();
                let pos = list
                    .binary_search_by_key(&appointment.start, |a| a.start)
                    .unwrap_or_else(|e| e);
                list.insert(pos, appointment.clone());
            }
            Event::AppointmentStatusChanged {
                id,
                provider,
                status,
            } => {
                if let Some(mut list) = self.appointments.get_mut(provider)
                    && let Some(appointment) = list.iter_mut().find(|a| a.id == *id)
                {
                    appointment.status = *status;
                }
            }
            Event::BlockadeCreated { provider, blockade } => {
                self.blockades
                    .entry(*provider)
                    .or_default()
                    .push(blockade.clone());
            }
            Event::BlockadeRemoved { id, provider } => {
                if let Some(mut list) = self.blockades.get_mut(provider) {
                    list.retain(|b| b.id != *id);
                }
            }
        }
    }

    /// Minimal event list that recreates the current state. Used for WAL
    /// compaction.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::new();
        for entry in self.schedules.iter() {
            events.push(Event::ScheduleSet {
                provider: *entry.key(),
                schedule: entry.value().clone(),
            });
        }
        for entry in self.appointments.iter() {
            for appointment in entry.value() {
                events.push(Event::AppointmentRecorded {
                    appointment: appointment.clone(),
                });
            }
        }
        for entry in self.blockades.iter() {
            for blockade in entry.value() {
                events.push(Event::BlockadeCreated {
                    provider: *entry.key(),
                    blockade: blockade.clone(),
                });
            }
        }
        events
    }

    async fn commit(&self, event: Event) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.check(&event)?;
        self.apply_event(&event);
        self.notify.send(&event);
        Ok(())
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn weekly_schedule(
        &self,
        provider: ProviderId,
    ) -> Result<Option<WeeklySchedule>, StoreError> {
        Ok(self.schedule(&provider))
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
impl BookingStore for MemoryStore {
    async fn active_appointments(
        &self,
        provider: ProviderId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        Ok(self.appointments_between(&provider, from, to))
    }

    async fn record_appointment(&self, appointment: Appointment) -> Result<(), StoreError> {
        let appointment = self.resolve_duration(appointment);
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
impl BlockadeStore for MemoryStore {
    async fn blockades(&self, provider: ProviderId) -> Result<Vec<Blockade>, StoreError> {
        Ok(self.blockade_records(&provider))
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
            .blockade_records(&provider)
            .into_iter()
            .find(|b| b.id == id)
            .ok_or(StoreError::NotFound(id))?;
        self.commit(Event::BlockadeRemoved { id, provider }).await?;
        Ok(existing)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDateTime, NaiveTime};

    use super::*;
    use crate::engine::BlockadeError;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        d(day).and_hms_opt(h, m, 0).unwrap()
    }

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn appt(provider: ProviderId, start: NaiveDateTime, minutes: u32) -> Appointment {
        Appointment {
            id: Ulid::new(),
            provider,
            start,
            duration_minutes: minutes,
            status: AppointmentStatus::Scheduled,
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new(Arc::new(NotifyHub::new()))
    }

    #[tokio::test]
    async fn missing_schedule_reads_as_none() {
        let store = store();
        assert_eq!(store.weekly_schedule(Ulid::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn overlapping_booking_rejected() {
        let store = store();
        let provider = Ulid::new();
        store.record_appointment(appt(provider, at(6, 14, 0), 90)).await.unwrap();

        let clash = store.record_appointment(appt(provider, at(6, 15, 0), 60)).await;
        assert!(matches!(clash, Err(StoreError::SlotTaken { .. })));

        // Different provider, same slot: fine.
        store.record_appointment(appt(Ulid::new(), at(6, 14, 0), 60)).await.unwrap();
        // Adjacent slot: fine.
        store.record_appointment(appt(provider, at(6, 16, 0), 60)).await.unwrap();
    }

    #[tokio::test]
    async fn zero_duration_booking_holds_the_service_length() {
        let store = store().with_service_minutes(120);
        let provider = Ulid::new();
        store.record_appointment(appt(provider, at(6, 14, 0), 0)).await.unwrap();

        let stored = store.appointments_between(&provider, d(6), d(6));
        assert_eq!(stored[0].duration_minutes, 120);

        let clash = store.record_appointment(appt(provider, at(6, 15, 0), 60)).await;
        assert!(matches!(clash, Err(StoreError::SlotTaken { .. })));
        store.record_appointment(appt(provider, at(6, 16, 0), 60)).await.unwrap();
    }

    #[tokio::test]
    async fn cancelling_frees_the_slot() {
        let store = store();
        let provider = Ulid::new();
        let first = appt(provider, at(6, 10, 0), 60);
        let first_id = first.id;
        store.record_appointment(first).await.unwrap();
        store
            .set_status(provider, first_id, AppointmentStatus::Cancelled)
            .await
            .unwrap();
        store.record_appointment(appt(provider, at(6, 10, 0), 60)).await.unwrap();

        // Re-activating the cancelled one would now double-book.
        let revived = store
            .set_status(provider, first_id, AppointmentStatus::Paid)
            .await;
        assert!(matches!(revived, Err(StoreError::SlotTaken { .. })));
    }

    #[tokio::test]
    async fn active_appointments_skip_cancelled_and_other_dates() {
        let store = store();
        let provider = Ulid::new();
        let cancelled = Appointment {
            status: AppointmentStatus::Cancelled,
            ..appt(provider, at(6, 9, 0), 60)
        };
        store.record_appointment(cancelled).await.unwrap();
        store.record_appointment(appt(provider, at(6, 11, 0), 60)).await.unwrap();
        store.record_appointment(appt(provider, at(5, 11, 0), 60)).await.unwrap();
        store.record_appointment(appt(provider, at(8, 11, 0), 60)).await.unwrap();

        let on_sixth = store.active_appointments(provider, d(6), d(6)).await.unwrap();
        assert_eq!(on_sixth.len(), 1);
        let span = store.active_appointments(provider, d(5), d(6)).await.unwrap();
        assert_eq!(span.len(), 2);
        assert!(span[0].start < span[1].start);
    }

    #[tokio::test]
    async fn blockade_insert_is_validated() {
        let store = store();
        let provider = Ulid::new();
        let blank = Blockade::one_off(d(6), t(9), "");
        let result = store.insert_blockade(provider, blank).await;
        assert!(matches!(
            result,
            Err(StoreError::Blockade(BlockadeError::MissingReason))
        ));
        assert!(store.blockades(provider).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blockade_delete_returns_record() {
        let store = store();
        let provider = Ulid::new();
        let blockade = Blockade::one_off(d(6), t(9), "Repair");
        let id = blockade.id;
        store.insert_blockade(provider, blockade).await.unwrap();

        let removed = store.delete_blockade(provider, id).await.unwrap();
        assert_eq!(removed.reason, "Repair");
        assert!(matches!(
            store.delete_blockade(provider, id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn mutations_are_broadcast() {
        let store = store();
        let provider = Ulid::new();
        let mut rx = store.notify().subscribe(provider);
        store
            .put_schedule(provider, WeeklySchedule::closed())
            .await
            .unwrap();
        assert!(matches!(rx.recv().await.unwrap(), Event::ScheduleSet { .. }));
    }

    #[test]
    fn snapshot_recreates_state() {
        let store = store();
        let provider = Ulid::new();
        let events = vec![
            Event::ScheduleSet {
                provider,
                schedule: WeeklySchedule::closed(),
            },
            Event::AppointmentRecorded {
                appointment: appt(provider, at(6, 9, 0), 60),
            },
            Event::BlockadeCreated {
                provider,
                blockade: Blockade::one_off(d(6), t(10), "x"),
            },
        ];
        for event in &events {
            store.apply_event(event);
        }
        let replica = MemoryStore::new(Arc::new(NotifyHub::new()));
        for event in store.snapshot_events() {
            replica.apply_event(&event);
        }
        assert_eq!(replica.schedule(&provider), Some(WeeklySchedule::closed()));
        assert_eq!(replica.appointments_between(&provider, d(6), d(6)).len(), 1);
        assert_eq!(replica.blockade_records(&provider).len(), 1);
    }
}
