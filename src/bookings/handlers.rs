use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::actor::ActorContext;
use crate::bookings::dto::{ApproveParams, BookingDto, CreateBookingRequest, StateParam};
use crate::bookings::repo_types::BookingState;
use crate::error::{AppError, AppResult};
use crate::pagination::{PageRequest, Pagination};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/bookings",
            get(list_for_booker)
                .post(create_booking)
                .patch(approve_first_waiting),
        )
        .route("/bookings/owner", get(list_for_owner))
        .route("/bookings/:id", get(get_booking).patch(approve_booking))
}

fn parse_state(param: StateParam) -> AppResult<BookingState> {
    param
        .state
        .as_deref()
        .map(str::parse::<BookingState>)
        .transpose()
        .map(Option::unwrap_or_default)
}

#[instrument(skip(state, body))]
pub async fn create_booking(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingDto>), AppError> {
    let booking = state.bookings.create(actor, body).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[instrument(skip(state))]
pub async fn approve_booking(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<i64>,
    Query(params): Query<ApproveParams>,
) -> Result<Json<BookingDto>, AppError> {
    Ok(Json(state.bookings.approve(actor, id, params.approved).await?))
}

#[instrument(skip(state))]
pub async fn approve_first_waiting(
    State(state): State<AppState>,
    actor: ActorContext,
    Query(params): Query<ApproveParams>,
) -> Result<Json<BookingDto>, AppError> {
    Ok(Json(
        state
            .bookings
            .approve_first_waiting(actor, params.approved)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn get_booking(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<i64>,
) -> Result<Json<BookingDto>, AppError> {
    Ok(Json(state.bookings.get_by_id(actor, id).await?))
}

#[instrument(skip(state))]
pub async fn list_for_booker(
    State(state): State<AppState>,
    actor: ActorContext,
    Query(param): Query<StateParam>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<BookingDto>>, AppError> {
    let booking_state = parse_state(param)?;
    let page = PageRequest::try_from(page)?;
    Ok(Json(
        state
            .bookings
            .find_by_booker(actor, booking_state, page)
            .await?,
    ))
}

#[instrument(skip(state))]
pub async fn list_for_owner(
    State(state): State<AppState>,
    actor: ActorContext,
    Query(param): Query<StateParam>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<BookingDto>>, AppError> {
    let booking_state = parse_state(param)?;
    let page = PageRequest::try_from(page)?;
    Ok(Json(
        state
            .bookings
            .find_by_owner(actor, booking_state, page)
            .await?,
    ))
}
