use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};

use super::dto::{CreatedUserResponse, MessageResponse, PageQuery, UserListResponse};
use super::extractors::{JsonBody, UserId};
use super::services::{self, Pagination};
use crate::{error::ApiResult, state::AppState, store::User};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

/// GET /users?page=&limit=
#[instrument(skip(state, query))]
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<UserListResponse>> {
    let Query(query) = query.map_err(|e| {
        warn!(error = %e, "unparsable pagination query");
        crate::error::ApiError::InvalidPagination
    })?;
    let pagination = Pagination::from_query(&query)?;
    let page = services::list_users(state.store.as_ref(), pagination).await?;
    Ok(Json(page))
}

/// GET /users/:id
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    UserId(id): UserId,
) -> ApiResult<Json<User>> {
    let user = services::get_user(state.store.as_ref(), id).await?;
    Ok(Json(user))
}

/// POST /users
#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<(StatusCode, Json<CreatedUserResponse>)> {
    let user_id = services::create_user(state.store.as_ref(), body).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse {
            message: "User created successfully",
            user_id,
        }),
    ))
}

/// PUT /users/:id
#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    UserId(id): UserId,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<MessageResponse>> {
    services::update_user(state.store.as_ref(), id, body).await?;
    Ok(Json(MessageResponse {
        message: "User updated successfully",
    }))
}

/// DELETE /users/:id
#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    UserId(id): UserId,
) -> ApiResult<Json<MessageResponse>> {
    services::delete_user(state.store.as_ref(), id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted successfully",
    }))
}
