use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use docshelf_core::pagination::Paginated;
use docshelf_core::project::{NewProject, Project, ProjectFilter, ProjectPatch};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list).post(create))
        .route("/projects/{id}", get(fetch).put(update).delete(remove))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    environment_id: Option<Uuid>,
    page: Option<u32>,
    limit: Option<u32>,
}

async fn list(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Paginated<Project>>> {
    let page = super::page(&state, query.page, query.limit)?;
    let filter = ProjectFilter {
        environment_id: query.environment_id,
    };
    Ok(Json(
        state
            .shelf()
            .list_projects(&principal, filter, page)
            .await?,
    ))
}

async fn create(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiJson(input): ApiJson<NewProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let project = state.shelf().create_project(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn fetch(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.shelf().get_project(&principal, id).await?))
}

async fn update(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<ProjectPatch>,
) -> ApiResult<Json<Project>> {
    Ok(Json(state.shelf().update_project(&principal, id, patch).await?))
}

async fn remove(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.shelf().delete_project(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
