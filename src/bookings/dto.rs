use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::bookings::repo_types::{Booking, BookingStatus};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub item_id: Option<i64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end: Option<OffsetDateTime>,
}

/// A create request whose fields are present and whose window is well-formed.
#[derive(Debug, Clone, Copy)]
pub struct BookingWindow {
    pub item_id: i64,
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl CreateBookingRequest {
    pub fn validate(&self) -> AppResult<BookingWindow> {
        let item_id = self
            .item_id
            .ok_or_else(|| AppError::Validation("itemId is required".into()))?;
        let start = self
            .start
            .ok_or_else(|| AppError::Validation("start is required".into()))?;
        let end = self
            .end
            .ok_or_else(|| AppError::Validation("end is required".into()))?;
        if end <= start {
            return Err(AppError::Validation("end must be after start".into()));
        }
        Ok(BookingWindow {
            item_id,
            start,
            end,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ApproveParams {
    pub approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct StateParam {
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookerRef {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingDto {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
    pub status: BookingStatus,
    pub booker: BookerRef,
    pub item: ItemRef,
}

impl From<Booking> for BookingDto {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            start: b.start,
            end: b.end,
            status: b.status,
            booker: BookerRef { id: b.booker_id },
            item: ItemRef {
                id: b.item.id,
                name: b.item.name,
            },
        }
    }
}
