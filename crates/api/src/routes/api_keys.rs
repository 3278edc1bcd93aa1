use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use docshelf_core::api_key::{ApiKeyView, IssuedApiKey, NewApiKey, UsageStats};
use docshelf_core::pagination::Paginated;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api-keys", get(list).post(create))
        .route("/api-keys/{id}", get(fetch).delete(remove))
        .route("/api-keys/{id}/revoke", post(revoke))
        .route("/api-keys/{id}/usage-stats", get(usage_stats))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

async fn list(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Paginated<ApiKeyView>>> {
    let page = super::page(&state, query.page, query.limit)?;
    Ok(Json(state.shelf().list_api_keys(&principal, page).await?))
}

/// The response is the only place the plaintext key ever appears.
async fn create(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiJson(input): ApiJson<NewApiKey>,
) -> ApiResult<(StatusCode, Json<IssuedApiKey>)> {
    let issued = state.shelf().create_api_key(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

async fn fetch(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiKeyView>> {
    let key = state.shelf().get_api_key(&principal, id).await?;
    Ok(Json(key.view(Utc::now())))
}

async fn revoke(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiKeyView>> {
    Ok(Json(state.shelf().revoke_api_key(&principal, id).await?))
}

async fn remove(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.shelf().delete_api_key(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn usage_stats(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<UsageStats>> {
    Ok(Json(
        state
            .shelf()
            .api_key_usage_stats(&principal, id)
            .await?,
    ))
}
