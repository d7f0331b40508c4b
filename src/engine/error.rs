use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use ulid::Ulid;

/// Rejections from the blockade mutation contract. All of these are raised
/// before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockadeError {
    #[error("blockade reason is required")]
    MissingReason,
    #[error("blockade slot {0} is not hour-aligned")]
    NotHourAligned(NaiveTime),
    #[error("recurrence ends on {end}, before its origin {origin}")]
    EndBeforeOrigin { origin: NaiveDate, end: NaiveDate },
    #[error("slot {date} {slot} is already blocked")]
    AlreadyBlocked { date: NaiveDate, slot: NaiveTime },
    #[error("no one-off blockade at {date} {slot}")]
    NotFound { date: NaiveDate, slot: NaiveTime },
    #[error("no recurring blockade series with id {0}")]
    SeriesNotFound(Ulid),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
}
