pub mod api_keys;
pub mod api_specs;
pub mod auth;
pub mod documents;
pub mod environments;
pub mod health;
pub mod projects;
pub mod source_control;
pub mod ws;

use axum::{middleware::from_fn_with_state, Router};
use docshelf_core::pagination::{Page, PageRequest};

use crate::error::ApiResult;
use crate::middleware::auth::authenticate;
use crate::state::AppState;

/// Assemble the full router with all route groups.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(auth::protected_routes())
        .merge(environments::routes())
        .merge(projects::routes())
        .merge(documents::routes())
        .merge(api_specs::routes())
        .merge(api_keys::routes())
        .merge(source_control::routes())
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(ws::routes())
        .merge(protected)
        .with_state(state)
}

/// Resolve `page` / `limit` query values against the configured bounds.
pub(crate) fn page(state: &AppState, page: Option<u32>, limit: Option<u32>) -> ApiResult<Page> {
    Ok(state.shelf().page(PageRequest { page, limit })?)
}
