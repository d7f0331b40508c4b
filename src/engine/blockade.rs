use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveTime, Timelike};
use tracing::warn;
use ulid::Ulid;

use crate::limits::*;
use crate::model::{Blockade, Recurrence, RecurrenceEnd};

use super::recurrence::{membership, Membership};
use super::BlockadeError;

/// Lookup key for one-off blockades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SlotKey {
    date: NaiveDate,
    slot: NaiveTime,
}

/// Identity of a recurring series. The end bound lives on the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    pub origin: NaiveDate,
    pub slot: NaiveTime,
    pub cadence: Recurrence,
}

/// Check a blockade against the mutation contract without touching any state.
pub fn validate(blockade: &Blockade) -> Result<(), BlockadeError> {
    if blockade.reason.trim().is_empty() {
        return Err(BlockadeError::MissingReason);
    }
    if blockade.reason.len() > MAX_REASON_LEN {
        return Err(BlockadeError::LimitExceeded("reason too long"));
    }
    if let Some(ref description) = blockade.description
        && description.len() > MAX_DESCRIPTION_LEN
    {
        return Err(BlockadeError::LimitExceeded("description too long"));
    }
    let slot = blockade.slot;
    if slot.minute() != 0 || slot.second() != 0 || slot.nanosecond() != 0 {
        return Err(BlockadeError::NotHourAligned(slot));
    }
    if blockade.recurrence.is_recurring()
        && let RecurrenceEnd::Until(end) = blockade.recurrence_end
        && end < blockade.origin
    {
        return Err(BlockadeError::EndBeforeOrigin {
            origin: blockade.origin,
            end,
        });
    }
    Ok(())
}

/// All manual closures for one provider.
///
/// One-off blockades sit in a hash map keyed by `(date, slot)`. Recurring
/// series are stored once and their membership for a date is computed on
/// demand, so indefinite series cost a single record.
#[derive(Debug, Clone, Default)]
pub struct BlockadeRegistry {
    one_off: HashMap<SlotKey, Blockade>,
    series: BTreeMap<SeriesKey, Blockade>,
}

impl BlockadeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from stored records. Records are trusted; later
    /// duplicates replace earlier ones.
    pub fn from_records(records: impl IntoIterator<Item = Blockade>) -> Self {
        let mut registry = Self::new();
        for blockade in records {
            registry.insert(blockade);
        }
        registry
    }

    fn insert(&mut self, blockade: Blockade) {
        if blockade.recurrence.is_recurring() {
            self.series.insert(series_key(&blockade), blockade);
        } else {
            self.one_off.insert(slot_key(&blockade), blockade);
        }
    }

    pub fn len(&self) -> usize {
        self.one_off.len() + self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate and add a blockade.
    pub fn create(&mut self, blockade: Blockade) -> Result<(), BlockadeError> {
        self.check_create(&blockade)?;
        self.insert(blockade);
        Ok(())
    }

    /// Everything `create` would check, without inserting.
    pub fn check_create(&self, blockade: &Blockade) -> Result<(), BlockadeError> {
        validate(blockade)?;
        if self.len() >= MAX_BLOCKADES_PER_PROVIDER {
            return Err(BlockadeError::LimitExceeded("too many blockades"));
        }
        let taken = if blockade.recurrence.is_recurring() {
            self.series.contains_key(&series_key(blockade))
        } else {
            self.one_off.contains_key(&slot_key(blockade))
        };
        if taken {
            return Err(BlockadeError::AlreadyBlocked {
                date: blockade.date,
                slot: blockade.slot,
            });
        }
        Ok(())
    }

    /// Delete the one-off blockade at `(date, slot)`. Occurrences of a
    /// recurring series can't be removed individually.
    pub fn remove(&mut self, date: NaiveDate, slot: NaiveTime) -> Result<Blockade, BlockadeError> {
        self.one_off
            .remove(&SlotKey { date, slot })
            .ok_or(BlockadeError::NotFound { date, slot })
    }

    /// Delete a whole recurring series.
    pub fn remove_series(&mut self, id: Ulid) -> Result<Blockade, BlockadeError> {
        let key = self
            .series
            .iter()
            .find(|(_, b)| b.id == id)
            .map(|(k, _)| *k)
            .ok_or(BlockadeError::SeriesNotFound(id))?;
        self.series
            .remove(&key)
            .ok_or(BlockadeError::SeriesNotFound(id))
    }

    /// The blockade closing `(date, slot)`, if any. One-offs win over series;
    /// among series the earliest origin wins.
    pub fn blocking(&self, date: NaiveDate, slot: NaiveTime) -> Option<&Blockade> {
        if let Some(blockade) = self.one_off.get(&SlotKey { date, slot }) {
            return Some(blockade);
        }
        self.series
            .iter()
            .filter(|(key, _)| key.slot == slot && key.origin <= date)
            .find_map(|(key, blockade)| {
                match membership(key.origin, key.cadence, blockade.recurrence_end, date) {
                    Membership::Hit => Some(blockade),
                    Membership::Miss => None,
                    Membership::CeilingReached => {
                        warn!(
                            series = %blockade.id,
                            origin = %key.origin,
                            %date,
                            "recurrence iteration ceiling reached; treating slot as not blocked"
                        );
                        metrics::counter!(crate::observability::RECURRENCE_CEILING_TOTAL).increment(1);
                        None
                    }
                }
            })
    }

    pub fn is_blocked(&self, date: NaiveDate, slot: NaiveTime) -> bool {
        self.blocking(date, slot).is_some()
    }

    pub fn reason_for(&self, date: NaiveDate, slot: NaiveTime) -> Option<&str> {
        self.blocking(date, slot).map(|b| b.reason.as_str())
    }
}

fn slot_key(blockade: &Blockade) -> SlotKey {
    SlotKey {
        date: blockade.date,
        slot: blockade.slot,
    }
}

fn series_key(blockade: &Blockade) -> SeriesKey {
    SeriesKey {
        origin: blockade.origin,
        slot: blockade.slot,
        cadence: blockade.recurrence,
    }
}
