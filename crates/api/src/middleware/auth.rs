use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, OriginalUri, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use docshelf_core::api_key::{secret, UsageRecord};
use docshelf_core::auth::Principal;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Resolve the caller from `Authorization: Bearer <jwt>` or `X-API-Key`, and
/// after a successful response record the use of the key, if one was used.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let principal = resolve_principal(&state, req.headers()).await?;

    let usage = principal.api_key_id().map(|key_id| {
        let record = UsageRecord {
            method: req.method().to_string(),
            endpoint: endpoint(&req),
            ip_address: client_ip(&req),
        };
        (key_id, record)
    });
    req.extensions_mut().insert(principal);

    let response = next.run(req).await;

    if let Some((key_id, record)) = usage {
        if response.status().is_success() {
            if let Err(e) = state.shelf().record_api_key_usage(key_id, record).await {
                tracing::warn!(api_key_id = %key_id, error = %e, "failed to record api key usage");
            }
        }
    }
    Ok(response)
}

pub async fn resolve_principal(state: &AppState, headers: &HeaderMap) -> ApiResult<Principal> {
    if let Some(key) = header_str(headers, API_KEY_HEADER) {
        return Ok(state.shelf().authenticate_api_key(key).await?);
    }

    let bearer = header_str(headers, header::AUTHORIZATION.as_str())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".into()))?;

    if bearer.starts_with(secret::KEY_MARKER) {
        return Ok(state.shelf().authenticate_api_key(bearer).await?);
    }
    session_principal(state, bearer)
}

/// A principal from a session token alone.
pub fn session_principal(state: &AppState, token: &str) -> ApiResult<Principal> {
    let claims = state.jwt().verify(token)?;
    Ok(Principal::session(claims.sub, claims.username))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn endpoint(req: &Request) -> String {
    req.extensions()
        .get::<OriginalUri>()
        .map_or_else(|| req.uri().path().to_string(), |uri| uri.path().to_string())
}

/// First hop of `X-Forwarded-For`, else the peer address.
fn client_ip(req: &Request) -> Option<String> {
    let forwarded = header_str(req.headers(), "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    forwarded.or_else(|| {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    })
}
