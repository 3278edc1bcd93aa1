//! HTTP server for docshelf: routes, auth middleware, the push channel and
//! the Postgres and outbound adapters.

pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod outbound;
pub mod routes;
pub mod state;
pub mod store;

use std::sync::Arc;

use axum::Router;
use docshelf_core::events::EventBus;
use docshelf_core::source::SpecEnhancer;
use docshelf_core::store::Store;
use docshelf_core::ShelfBuilder;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::AppConfig;
use crate::outbound::{http_client, BitbucketProvider, GitHubProvider, HttpEnhancer};
use crate::state::AppState;

/// Request bodies above this are rejected before reaching a handler.
const BODY_LIMIT: usize = 8 * 1024 * 1024;

/// The full application: routes plus the tracing, CORS and body-limit layers.
pub fn app(state: AppState) -> Router {
    routes::build_router(state)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::request_tracing::trace_layer())
        .layer(middleware::cors::cors_layer())
}

/// A shelf over `store` wired to the configured retention, page bounds,
/// event bus and outbound adapters.
pub fn shelf_builder(config: &AppConfig, store: Arc<dyn Store>) -> ShelfBuilder {
    let http = http_client(config.upstream_timeout);
    let mut builder = ShelfBuilder::new(store)
        .retention(config.retention())
        .page_limits(config.page_limits())
        .bus(EventBus::new(config.event_bus_capacity))
        .provider(Arc::new(GitHubProvider::new(
            http.clone(),
            config.github_api_url.clone(),
        )))
        .provider(Arc::new(BitbucketProvider::new(
            http.clone(),
            config.bitbucket_api_url.clone(),
        )));
    if let Some(enhancer) = &config.enhancer {
        let enhancer: Arc<dyn SpecEnhancer> = Arc::new(HttpEnhancer::new(
            http,
            enhancer.url.clone(),
            enhancer.api_key.clone(),
            enhancer.model.clone(),
        ));
        builder = builder.enhancer(enhancer);
    }
    builder
}
