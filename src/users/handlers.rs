use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;
use crate::users::dto::{CreateUserRequest, UpdateUserRequest, UserDto};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserDto>), AppError> {
    let user = state.users.create_user(body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserDto>>, AppError> {
    Ok(Json(state.users.list_users().await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserDto>, AppError> {
    Ok(Json(state.users.get_user(id).await?))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserDto>, AppError> {
    Ok(Json(state.users.update_user(id, body).await?))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.users.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
