use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::actor::ActorContext;
use crate::error::AppError;
use crate::items::dto::{
    CommentDto, CreateCommentRequest, CreateItemRequest, ItemDto, SearchParams,
    UpdateItemRequest,
};
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_owned_items))
        .route("/items/search", get(search_items))
        .route("/items/:id", get(get_item))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/items", post(create_item))
        .route("/items/:id", axum::routing::put(update_item).patch(update_item))
        .route("/items/:id/comment", post(add_comment))
}

#[instrument(skip(state, body))]
pub async fn create_item(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(body): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<ItemDto>), AppError> {
    let item = state.items.create_item(actor, body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state, body))]
pub async fn update_item(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<i64>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<ItemDto>, AppError> {
    Ok(Json(state.items.update_item(actor, id, body).await?))
}

#[instrument(skip(state))]
pub async fn get_item(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<i64>,
) -> Result<Json<ItemDto>, AppError> {
    Ok(Json(state.items.get_item(actor, id).await?))
}

#[instrument(skip(state))]
pub async fn list_owned_items(
    State(state): State<AppState>,
    actor: ActorContext,
) -> Result<Json<Vec<ItemDto>>, AppError> {
    Ok(Json(state.items.list_owned(actor).await?))
}

/// Search does not depend on who asks, so the actor header is optional here.
#[instrument(skip(state))]
pub async fn search_items(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ItemDto>>, AppError> {
    Ok(Json(state.items.search(params.text.as_deref()).await?))
}

#[instrument(skip(state, body))]
pub async fn add_comment(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(id): Path<i64>,
    Json(body): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentDto>), AppError> {
    let comment = state.items.add_comment(actor, id, body).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
