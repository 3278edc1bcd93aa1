use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use docshelf_core::api_spec::ApiSpec;
use docshelf_core::source::{
    AnalyzeRequest, ConnectionInput, ProviderKind, RepoSummary, SourceConnection,
};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, Caller};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/source-control/connections", get(connections))
        .route(
            "/source-control/{provider}/connection",
            put(connect).delete(disconnect),
        )
        .route("/source-control/{provider}/repos", get(repos))
        .route(
            "/source-control/{provider}/repos/{owner}/{repo}/analyze",
            post(analyze),
        )
}

fn provider(raw: &str) -> ApiResult<ProviderKind> {
    raw.parse().map_err(ApiError::BadRequest)
}

async fn connections(
    State(state): State<AppState>,
    Caller(principal): Caller,
) -> ApiResult<Json<Vec<SourceConnection>>> {
    Ok(Json(state.shelf().list_source_connections(&principal).await?))
}

async fn connect(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(raw): ApiPath<String>,
    ApiJson(input): ApiJson<ConnectionInput>,
) -> ApiResult<Json<SourceConnection>> {
    let kind = provider(&raw)?;
    Ok(Json(
        state
            .shelf()
            .connect_source(&principal, kind, input)
            .await?,
    ))
}

async fn disconnect(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(raw): ApiPath<String>,
) -> ApiResult<StatusCode> {
    state
        .shelf()
        .disconnect_source(&principal, provider(&raw)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn repos(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath(raw): ApiPath<String>,
) -> ApiResult<Json<Vec<RepoSummary>>> {
    let kind = provider(&raw)?;
    Ok(Json(state.shelf().list_repositories(&principal, kind).await?))
}

/// The body is optional; an empty one analyzes the default branch.
async fn analyze(
    State(state): State<AppState>,
    Caller(principal): Caller,
    ApiPath((raw, owner, repo)): ApiPath<(String, String, String)>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ApiSpec>)> {
    let kind = provider(&raw)?;
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        AnalyzeRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };
    let spec = state
        .shelf()
        .analyze_repository(&principal, kind, &owner, &repo, request)
        .await?;
    Ok((StatusCode::CREATED, Json(spec)))
}
