//! Precondition checks over already-loaded records.
//!
//! Each guard is pure and fails fast with the error kind the caller should
//! see. Lookups happen in the services; the `require_*_exists` guards only
//! turn an empty lookup into `NotFound`.

use crate::bookings::repo_types::{Booking, BookingStatus};
use crate::error::{AppError, AppResult};
use crate::items::repo_types::Item;
use crate::users::repo_types::User;

pub fn require_booking_exists(booking: Option<Booking>, id: i64) -> AppResult<Booking> {
    booking.ok_or_else(|| AppError::NotFound(format!("Booking not found: {id}")))
}

pub fn require_user_exists(user: Option<User>, id: i64) -> AppResult<User> {
    user.ok_or_else(|| AppError::NotFound(format!("User not found: {id}")))
}

pub fn require_item_exists(item: Option<Item>, id: i64) -> AppResult<Item> {
    item.ok_or_else(|| AppError::NotFound(format!("Item not found: {id}")))
}

/// Only the owner of the booked item may decide a booking.
pub fn require_owner(booking: &Booking, actor_id: i64) -> AppResult<()> {
    if booking.item.owner_id != actor_id {
        return Err(AppError::Forbidden(
            "Only the item owner can change the booking status".into(),
        ));
    }
    Ok(())
}

/// The booker and the item owner may read a booking; nobody else.
pub fn require_access(booking: &Booking, actor_id: i64) -> AppResult<()> {
    if booking.booker_id != actor_id && booking.item.owner_id != actor_id {
        return Err(AppError::Forbidden(format!(
            "User {actor_id} has no access to booking {}",
            booking.id
        )));
    }
    Ok(())
}

pub fn require_waiting(booking: &Booking) -> AppResult<()> {
    if booking.status != BookingStatus::Waiting {
        return Err(AppError::Conflict(format!(
            "Booking {} is already {}; it can not be decided again",
            booking.id, booking.status
        )));
    }
    Ok(())
}

pub fn require_ownership(item: &Item, actor_id: i64) -> AppResult<()> {
    let owner_id = item
        .owner_id
        .ok_or_else(|| AppError::InvalidState(format!("Item {} has no owner", item.id)))?;
    if owner_id != actor_id {
        return Err(AppError::Forbidden(format!(
            "Only the owner can edit item {}",
            item.id
        )));
    }
    Ok(())
}
