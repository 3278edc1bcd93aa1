use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use docshelf_core::api_spec::editor::OperationFields;
use docshelf_core::api_spec::openapi::{HttpMethod, OperationKey};
use docshelf_core::api_spec::{
    ApiSpec, ApiSpecFilter, ApiSpecHistoryEntry, ApiSpecPatch, ApiSpecVersion, NewApiSpec,
    OperationChange,
};
use docshelf_core::pagination::Paginated;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api-specs", get(list).post(create))
        .route("/api-specs/{id}", get(fetch).put(update).delete(remove))
        .route("/api-specs/{id}/versions", get(versions))
        .route("/api-specs/{id}/versions/{version_id}", get(version))
        .route(
            "/api-specs/{id}/versions/{version_id}/restore",
            post(restore),
        )
        .route(
            "/api-specs/{id}/operations",
            post(add_operation)
                .put(edit_operation)
                .delete(delete_operation),
        )
        .route("/api-specs/{id}/enhance", post(enhance))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    project_id: Option<Uuid>,
    #[serde(default)]
    unassigned: bool,
    page: Option<u32>,
    limit: Option<u32>,
}

/// Where an operation lives: `{"path": "/pets", "method": "get"}`.
#[derive(Debug, Deserialize)]
struct Location {
    path: String,
    method: String,
}

impl Location {
    fn key(&self) -> ApiResult<OperationKey> {
        let method = self
            .method
            .parse::<HttpMethod>()
            .map_err(ApiError::BadRequest)?;
        Ok(OperationKey::new(self.path.trim(), method))
    }
}

#[derive(Debug, Deserialize)]
struct AddOperation {
    #[serde(flatten)]
    location: Location,
    #[serde(flatten)]
    fields: OperationFields,
}

/// `original` is where the operation is now; `path` / `method` is where it
/// should end up.
#[derive(Debug, Deserialize)]
struct EditOperation {
    original: Location,
    #[serde(flatten)]
    location: Location,
    #[serde(flatten)]
    fields: OperationFields,
}

async fn list(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Paginated<ApiSpec>>> {
    let page = super::page(&state, query.page, query.limit)?;
    let filter = ApiSpecFilter {
        project_id: query.project_id,
        unassigned: query.unassigned,
    };
    Ok(Json(
        state
            .shelf()
            .list_api_specs(&principal, filter, page)
            .await?,
    ))
}

async fn create(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiJson(input): ApiJson<NewApiSpec>,
) -> ApiResult<(StatusCode, Json<ApiSpec>)> {
    let spec = state.shelf().create_api_spec(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(spec)))
}

async fn fetch(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiSpec>> {
    Ok(Json(state.shelf().get_api_spec(&principal, id).await?))
}

async fn update(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<ApiSpecPatch>,
) -> ApiResult<Json<ApiSpec>> {
    Ok(Json(state.shelf().update_api_spec(&principal, id, patch).await?))
}

async fn remove(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.shelf().delete_api_spec(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn versions(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<ApiSpecHistoryEntry>>> {
    Ok(Json(
        state
            .shelf()
            .list_api_spec_versions(&principal, id)
            .await?,
    ))
}

async fn version(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath((id, version_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<ApiSpecVersion>> {
    Ok(Json(
        state
            .shelf()
            .get_api_spec_version(&principal, id, version_id)
            .await?,
    ))
}

async fn restore(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath((id, version_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<ApiSpec>> {
    Ok(Json(
        state
            .shelf()
            .restore_api_spec_version(&principal, id, version_id)
            .await?,
    ))
}

async fn add_operation(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<AddOperation>,
) -> ApiResult<(StatusCode, Json<ApiSpec>)> {
    let change = OperationChange::Add {
        key: body.location.key()?,
        fields: body.fields,
    };
    let spec = state
        .shelf()
        .apply_operation_change(&principal, id, change)
        .await?;
    Ok((StatusCode::CREATED, Json(spec)))
}

async fn edit_operation(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<EditOperation>,
) -> ApiResult<Json<ApiSpec>> {
    let change = OperationChange::Edit {
        original: body.original.key()?,
        updated: body.location.key()?,
        fields: body.fields,
    };
    Ok(Json(
        state
            .shelf()
            .apply_operation_change(&principal, id, change)
            .await?,
    ))
}

async fn delete_operation(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(location): ApiQuery<Location>,
) -> ApiResult<Json<ApiSpec>> {
    let change = OperationChange::Delete {
        key: location.key()?,
    };
    Ok(Json(
        state
            .shelf()
            .apply_operation_change(&principal, id, change)
            .await?,
    ))
}

async fn enhance(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiSpec>> {
    Ok(Json(state.shelf().enhance_api_spec(&principal, id).await?))
}
