use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::error::{AppError, AppResult};

/// Stored booking status.
///
/// `Waiting` is the only initial state and the only state that may be
/// decided. `Approved` and `Rejected` are final for the decision path.
/// `Canceled` is reserved and has no transition leading into it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Waiting,
    Approved,
    Rejected,
    Canceled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Waiting => "WAITING",
            BookingStatus::Approved => "APPROVED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Canceled => "CANCELED",
        }
    }

    /// Target of an owner decision taken on a `Waiting` booking.
    pub fn decided(approved: bool) -> Self {
        if approved {
            BookingStatus::Approved
        } else {
            BookingStatus::Rejected
        }
    }

    /// Applies an owner decision. Fails `Conflict` from any state but `Waiting`.
    pub fn decide(self, approved: bool) -> AppResult<Self> {
        match self {
            BookingStatus::Waiting => Ok(Self::decided(approved)),
            other => Err(AppError::Conflict(format!(
                "Booking status is already {other}; it can not be changed again"
            ))),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "WAITING" => Ok(BookingStatus::Waiting),
            "APPROVED" => Ok(BookingStatus::Approved),
            "REJECTED" => Ok(BookingStatus::Rejected),
            "CANCELED" => Ok(BookingStatus::Canceled),
            other => Err(AppError::InvalidState(format!(
                "unknown stored booking status: {other}"
            ))),
        }
    }
}

/// Logical state a caller filters a booking list by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookingState {
    #[default]
    All,
    Current,
    Past,
    Future,
    Waiting,
    Rejected,
}

impl FromStr for BookingState {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(BookingState::All),
            "CURRENT" => Ok(BookingState::Current),
            "PAST" => Ok(BookingState::Past),
            "FUTURE" => Ok(BookingState::Future),
            "WAITING" => Ok(BookingState::Waiting),
            "REJECTED" => Ok(BookingState::Rejected),
            _ => Err(AppError::Validation(format!("Unknown state: {s}"))),
        }
    }
}

/// Store-level predicate a `BookingState` resolves to at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingFilter {
    All,
    /// `start <= now <= end`
    Current(OffsetDateTime),
    /// `end < now`
    Past(OffsetDateTime),
    /// `start > now`
    Future(OffsetDateTime),
    Status(BookingStatus),
}

impl BookingFilter {
    pub fn resolve(state: BookingState, now: OffsetDateTime) -> Self {
        match state {
            BookingState::All => BookingFilter::All,
            BookingState::Current => BookingFilter::Current(now),
            BookingState::Past => BookingFilter::Past(now),
            BookingState::Future => BookingFilter::Future(now),
            BookingState::Waiting => BookingFilter::Status(BookingStatus::Waiting),
            BookingState::Rejected => BookingFilter::Status(BookingStatus::Rejected),
        }
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        match *self {
            BookingFilter::All => true,
            BookingFilter::Current(now) => booking.start <= now && now <= booking.end,
            BookingFilter::Past(now) => booking.end < now,
            BookingFilter::Future(now) => booking.start > now,
            BookingFilter::Status(status) => booking.status == status,
        }
    }
}

/// The slice of the item a booking needs for guards and projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookedItem {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub id: i64,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub status: BookingStatus,
    pub item: BookedItem,
    pub booker_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub item_id: i64,
    pub booker_id: i64,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

/// Row shape of `bookings JOIN items`.
#[derive(Debug, FromRow)]
pub struct BookingRow {
    pub id: i64,
    pub start_at: OffsetDateTime,
    pub end_at: OffsetDateTime,
    pub status: String,
    pub item_id: i64,
    pub item_name: String,
    pub owner_id: i64,
    pub booker_id: i64,
}

impl TryFrom<BookingRow> for Booking {
    type Error = AppError;

    fn try_from(r: BookingRow) -> AppResult<Self> {
        Ok(Self {
            id: r.id,
            start: r.start_at,
            end: r.end_at,
            status: r.status.parse()?,
            item: BookedItem {
                id: r.item_id,
                name: r.item_name,
                owner_id: r.owner_id,
            },
            booker_id: r.booker_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn booking(start: OffsetDateTime, end: OffsetDateTime, status: BookingStatus) -> Booking {
        Booking {
            id: 1,
            start,
            end,
            status,
            item: BookedItem {
                id: 1,
                name: "drill".into(),
                owner_id: 1,
            },
            booker_id: 2,
        }
    }

    #[test]
    fn only_waiting_can_be_decided() {
        assert_eq!(BookingStatus::Waiting.decide(true).unwrap(), BookingStatus::Approved);
        assert_eq!(BookingStatus::Waiting.decide(false).unwrap(), BookingStatus::Rejected);
        for status in [
            BookingStatus::Approved,
            BookingStatus::Rejected,
            BookingStatus::Canceled,
        ] {
            for approved in [true, false] {
                assert!(matches!(status.decide(approved), Err(AppError::Conflict(_))));
            }
        }
    }

    #[test]
    fn unknown_stored_status_is_invalid_state() {
        assert!(matches!(
            "PENDING".parse::<BookingStatus>(),
            Err(AppError::InvalidState(_))
        ));
        assert_eq!("CANCELED".parse::<BookingStatus>().unwrap(), BookingStatus::Canceled);
    }

    #[test]
    fn parses_requested_state_ignoring_case() {
        assert_eq!("current".parse::<BookingState>().unwrap(), BookingState::Current);
        assert_eq!("ALL".parse::<BookingState>().unwrap(), BookingState::All);
        let err = "UNSUPPORTED_STATUS".parse::<BookingState>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown state: UNSUPPORTED_STATUS");
    }

    #[test]
    fn time_filters_use_inclusive_current_window() {
        let now = datetime!(2026-01-10 12:00 UTC);
        let ending_now = booking(datetime!(2026-01-10 10:00 UTC), now, BookingStatus::Approved);
        let past = booking(
            datetime!(2026-01-01 10:00 UTC),
            datetime!(2026-01-02 10:00 UTC),
            BookingStatus::Approved,
        );
        let future = booking(
            datetime!(2026-01-11 10:00 UTC),
            datetime!(2026-01-12 10:00 UTC),
            BookingStatus::Waiting,
        );

        let current = BookingFilter::resolve(BookingState::Current, now);
        assert!(current.matches(&ending_now));
        assert!(!current.matches(&past));

        let past_filter = BookingFilter::resolve(BookingState::Past, now);
        assert!(past_filter.matches(&past));
        assert!(!past_filter.matches(&ending_now));

        let future_filter = BookingFilter::resolve(BookingState::Future, now);
        assert!(future_filter.matches(&future));
        assert!(!future_filter.matches(&ending_now));

        let waiting = BookingFilter::resolve(BookingState::Waiting, now);
        assert!(waiting.matches(&future));
        assert!(!waiting.matches(&past));
    }
}
