use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use docshelf_core::environment::{Environment, EnvironmentPatch, NewEnvironment};
use docshelf_core::pagination::Paginated;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/environments", get(list).post(create))
        .route(
            "/environments/{id}",
            get(fetch).put(update).delete(remove),
        )
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

async fn list(
    State(state): State<AppState>,
    Caller(_): Caller,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Paginated<Environment>>> {
    let page = super::page(&state, query.page, query.limit)?;
    Ok(Json(state.shelf().list_environments(page).await?))
}

async fn create(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiJson(input): ApiJson<NewEnvironment>,
) -> ApiResult<(StatusCode, Json<Environment>)> {
    let environment = state.shelf().create_environment(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(environment)))
}

async fn fetch(
    State(state): State<AppState>,
    Caller(_): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Environment>> {
    Ok(Json(state.shelf().get_environment(id).await?))
}

async fn update(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<EnvironmentPatch>,
) -> ApiResult<Json<Environment>> {
    Ok(Json(
        state
            .shelf()
            .update_environment(&principal, id, patch)
            .await?,
    ))
}

async fn remove(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.shelf().delete_environment(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
