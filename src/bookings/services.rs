use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::actor::ActorContext;
use crate::bookings::dto::{BookingDto, CreateBookingRequest};
use crate::bookings::repo::BookingStore;
use crate::bookings::repo_types::{BookingFilter, BookingState, BookingStatus, NewBooking};
use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::guards;
use crate::items::repo::ItemStore;
use crate::pagination::PageRequest;
use crate::users::repo::UserStore;

/// Booking lifecycle: creation, the owner decision, and booker/owner views.
#[derive(Clone)]
pub struct BookingService {
    users: Arc<dyn UserStore>,
    items: Arc<dyn ItemStore>,
    bookings: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(
        users: Arc<dyn UserStore>,
        items: Arc<dyn ItemStore>,
        bookings: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            items,
            bookings,
            clock,
        }
    }

    async fn require_user(&self, user_id: i64) -> AppResult<()> {
        let user = self.users.find_by_id(user_id).await?;
        guards::require_user_exists(user, user_id)?;
        Ok(())
    }

    /// Books an item for the actor. The new booking always starts `WAITING`.
    /// Overlapping windows on the same item are not rejected.
    #[instrument(skip(self, req), fields(actor_id = actor.user_id))]
    pub async fn create(
        &self,
        actor: ActorContext,
        req: CreateBookingRequest,
    ) -> AppResult<BookingDto> {
        let window = req.validate()?;
        self.require_user(actor.user_id).await?;
        let item = guards::require_item_exists(
            self.items.find_by_id(window.item_id).await?,
            window.item_id,
        )?;
        if !item.available {
            warn!(item_id = item.id, "booking requested for unavailable item");
            return Err(AppError::Validation(format!(
                "Item {} is not available for booking",
                item.id
            )));
        }

        let booking = self
            .bookings
            .insert(NewBooking {
                item_id: item.id,
                booker_id: actor.user_id,
                start: window.start,
                end: window.end,
            })
            .await?;
        info!(booking_id = booking.id, item_id = item.id, "booking created");
        Ok(booking.into())
    }

    /// The only status transition: `WAITING -> APPROVED | REJECTED`, by the
    /// item owner.
    #[instrument(skip(self), fields(actor_id = actor.user_id))]
    pub async fn approve(
        &self,
        actor: ActorContext,
        booking_id: i64,
        approved: bool,
    ) -> AppResult<BookingDto> {
        let booking =
            guards::require_booking_exists(self.bookings.find_by_id(booking_id).await?, booking_id)?;
        guards::require_owner(&booking, actor.user_id)?;
        guards::require_waiting(&booking)?;
        let target = booking.status.decide(approved)?;

        // conditional write re-checks WAITING; losing a race surfaces as Conflict
        let updated = self
            .bookings
            .update_status(booking.id, BookingStatus::Waiting, target)
            .await?
            .ok_or_else(|| {
                warn!(booking_id, "booking decided concurrently");
                AppError::Conflict(format!(
                    "Booking {booking_id} was decided by another request"
                ))
            })?;
        info!(booking_id, status = %updated.status, "booking decided");
        Ok(updated.into())
    }

    /// Decides the lowest-id `WAITING` booking on any of the actor's items.
    #[instrument(skip(self), fields(actor_id = actor.user_id))]
    pub async fn approve_first_waiting(
        &self,
        actor: ActorContext,
        approved: bool,
    ) -> AppResult<BookingDto> {
        let booking = self
            .bookings
            .first_waiting_for_owner(actor.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No bookings in WAITING status".into()))?;
        debug!(booking_id = booking.id, "selected first waiting booking");
        self.approve(actor, booking.id, approved).await
    }

    #[instrument(skip(self), fields(actor_id = actor.user_id))]
    pub async fn get_by_id(&self, actor: ActorContext, booking_id: i64) -> AppResult<BookingDto> {
        let booking =
            guards::require_booking_exists(self.bookings.find_by_id(booking_id).await?, booking_id)?;
        guards::require_access(&booking, actor.user_id)?;
        Ok(booking.into())
    }

    #[instrument(skip(self), fields(actor_id = actor.user_id))]
    pub async fn find_by_booker(
        &self,
        actor: ActorContext,
        state: BookingState,
        page: PageRequest,
    ) -> AppResult<Vec<BookingDto>> {
        self.require_user(actor.user_id).await?;
        let filter = BookingFilter::resolve(state, self.clock.now());
        let bookings = self
            .bookings
            .list_by_booker(actor.user_id, filter, page)
            .await?;
        Ok(bookings.into_iter().map(BookingDto::from).collect())
    }

    #[instrument(skip(self), fields(actor_id = actor.user_id))]
    pub async fn find_by_owner(
        &self,
        actor: ActorContext,
        state: BookingState,
        page: PageRequest,
    ) -> AppResult<Vec<BookingDto>> {
        self.require_user(actor.user_id).await?;
        let filter = BookingFilter::resolve(state, self.clock.now());
        let bookings = self
            .bookings
            .list_by_owner(actor.user_id, filter, page)
            .await?;
        Ok(bookings.into_iter().map(BookingDto::from).collect())
    }
}
