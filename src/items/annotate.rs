//! Last/next booking derivation for item views.
//!
//! The single-item path asks the store for the two bookings directly. The
//! owner listing fetches every approved booking and comment for all of the
//! owner's items at once and partitions them here; both paths pick the same
//! bookings.

use std::cmp::Ordering;
use std::collections::HashMap;

use time::OffsetDateTime;

use crate::bookings::repo_types::{Booking, BookingStatus};
use crate::items::dto::{BookingForItem, CommentDto, ItemDto};
use crate::items::repo_types::{Comment, Item};

/// Later start wins; on equal starts the lower id wins.
fn later(a: &Booking, b: &Booking) -> Ordering {
    a.start.cmp(&b.start).then(b.id.cmp(&a.id))
}

/// Earlier start wins; on equal starts the lower id wins.
fn earlier(a: &Booking, b: &Booking) -> Ordering {
    a.start.cmp(&b.start).then(a.id.cmp(&b.id))
}

/// Approved booking with the greatest `start` strictly before `now`.
pub fn last_booking<'a, I>(bookings: I, now: OffsetDateTime) -> Option<&'a Booking>
where
    I: IntoIterator<Item = &'a Booking>,
{
    bookings
        .into_iter()
        .filter(|b| b.status == BookingStatus::Approved && b.start < now)
        .max_by(|a, b| later(a, b))
}

/// Approved booking with the smallest `start` strictly after `now`.
pub fn next_booking<'a, I>(bookings: I, now: OffsetDateTime) -> Option<&'a Booking>
where
    I: IntoIterator<Item = &'a Booking>,
{
    bookings
        .into_iter()
        .filter(|b| b.status == BookingStatus::Approved && b.start > now)
        .min_by(|a, b| earlier(a, b))
}

/// Builds owner views for many items from pre-fetched bookings and comments.
///
/// `comments` must already be in creation order; it is grouped per item
/// without reordering.
pub fn annotate_owned(
    items: Vec<Item>,
    bookings: &[Booking],
    comments: Vec<Comment>,
    now: OffsetDateTime,
) -> Vec<ItemDto> {
    let mut bookings_by_item: HashMap<i64, Vec<&Booking>> = HashMap::new();
    for b in bookings {
        bookings_by_item.entry(b.item.id).or_default().push(b);
    }
    let mut comments_by_item: HashMap<i64, Vec<CommentDto>> = HashMap::new();
    for c in comments {
        comments_by_item.entry(c.item_id).or_default().push(c.into());
    }

    items
        .into_iter()
        .map(|item| {
            let own = bookings_by_item.remove(&item.id).unwrap_or_default();
            let last = last_booking(own.iter().copied(), now).map(BookingForItem::from);
            let next = next_booking(own.iter().copied(), now).map(BookingForItem::from);
            let comments = comments_by_item.remove(&item.id).unwrap_or_default();
            ItemDto::annotated(item, last, next, comments)
        })
        .collect()
}
