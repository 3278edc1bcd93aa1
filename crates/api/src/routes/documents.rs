use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use docshelf_core::document::{
    Document, DocumentDiff, DocumentFilter, DocumentHistoryEntry, DocumentPatch, DocumentType,
    NewDocument,
};
use docshelf_core::pagination::Paginated;
use docshelf_core::versioning::VersionRef;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/documents", get(list).post(create))
        .route("/documents/{id}", get(fetch).put(update).delete(remove))
        .route("/documents/{id}/versions", get(versions))
        .route(
            "/documents/{id}/versions/{version_id}/restore",
            post(restore),
        )
        .route("/documents/{id}/versions/{reference}/diff", get(diff))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    project_id: Option<Uuid>,
    #[serde(rename = "type")]
    doc_type: Option<DocumentType>,
    page: Option<u32>,
    limit: Option<u32>,
}

async fn list(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Paginated<Document>>> {
    let page = super::page(&state, query.page, query.limit)?;
    let filter = DocumentFilter {
        project_id: query.project_id,
        doc_type: query.doc_type,
    };
    Ok(Json(
        state
            .shelf()
            .list_documents(&principal, filter, page)
            .await?,
    ))
}

async fn create(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiJson(input): ApiJson<NewDocument>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let document = state.shelf().create_document(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn fetch(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Document>> {
    Ok(Json(state.shelf().get_document(&principal, id).await?))
}

async fn update(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<DocumentPatch>,
) -> ApiResult<Json<Document>> {
    Ok(Json(
        state
            .shelf()
            .update_document(&principal, id, patch)
            .await?,
    ))
}

async fn remove(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.shelf().delete_document(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn versions(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<DocumentHistoryEntry>>> {
    Ok(Json(
        state
            .shelf()
            .list_document_versions(&principal, id)
            .await?,
    ))
}

async fn restore(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath((id, version_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<Document>> {
    Ok(Json(
        state
            .shelf()
            .restore_document_version(&principal, id, version_id)
            .await?,
    ))
}

async fn diff(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath((id, reference)): ApiPath<(Uuid, String)>,
) -> ApiResult<Json<DocumentDiff>> {
    let reference = reference
        .parse::<VersionRef>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(
        state
            .shelf()
            .document_version_diff(&principal, id, reference)
            .await?,
    ))
}
