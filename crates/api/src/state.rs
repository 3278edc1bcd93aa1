use std::sync::Arc;

use docshelf_core::auth::JwtKeys;
use docshelf_core::Shelf;

use crate::config::AppConfig;

/// Handler state: the service facade, the loaded config and the JWT keys
/// derived from it.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    shelf: Shelf,
    config: AppConfig,
    jwt: JwtKeys,
}

impl AppState {
    pub fn new(shelf: Shelf, config: AppConfig) -> Self {
        let jwt = JwtKeys::new(&config.jwt_secret, config.jwt_ttl());
        Self {
            inner: Arc::new(InnerState { shelf, config, jwt }),
        }
    }

    pub fn shelf(&self) -> &Shelf {
        &self.inner.shelf
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn jwt(&self) -> &JwtKeys {
        &self.inner.jwt
    }
}
