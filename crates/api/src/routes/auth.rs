use axum::{extract::State, http::StatusCode, routing::{get, post}, Json, Router};
use docshelf_core::user::{Credentials, NewUser, User};
use serde::Serialize;

use crate::error::ApiResult;
use crate::extract::{ApiJson, Caller};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(me))
}

async fn register(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewUser>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let user = state.shelf().register_user(input).await?;
    let token = state.jwt().issue(&user)?;
    Ok((StatusCode::CREATED, Json(Session { token, user })))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> ApiResult<Json<Session>> {
    let user = state.shelf().authenticate_user(credentials).await?;
    let token = state.jwt().issue(&user)?;
    tracing::info!(user_id = %user.id, "session issued");
    Ok(Json(Session { token, user }))
}

async fn me(State(state): State<AppState>, Caller(principal): Caller) -> ApiResult<Json<User>> {
    Ok(Json(state.shelf().get_user(principal.user_id).await?))
}
