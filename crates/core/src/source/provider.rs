use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::model::{ProviderKind, RepoSummary, SourceFile};
use crate::error::{CoreError, CoreResult};

/// Upper bound on files fetched for one analysis.
pub const MAX_SOURCE_FILES: usize = 200;

const SOURCE_EXTENSIONS: [&str; 9] = ["js", "jsx", "ts", "tsx", "mjs", "cjs", "java", "go", "php"];
const SKIPPED_DIRS: [&str; 5] = ["node_modules/", "vendor/", "dist/", "build/", ".git/"];

/// Whether a repository path is worth scanning for annotations.
pub fn is_candidate_source(path: &str) -> bool {
    if SKIPPED_DIRS
        .iter()
        .any(|dir| path.starts_with(dir) || path.contains(&format!("/{dir}")))
    {
        return false;
    }
    path.rsplit_once('.')
        .is_some_and(|(_, ext)| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// A source-control host. Failures surface as `CoreError::Upstream`.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn list_repos(&self, token: &str) -> CoreResult<Vec<RepoSummary>>;

    /// Candidate source files of `owner/repo` at `branch` (the default branch
    /// when `None`), at most [`MAX_SOURCE_FILES`].
    async fn fetch_sources(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        branch: Option<&str>,
    ) -> CoreResult<Vec<SourceFile>>;
}

/// Turns a spec into a better documented one.
#[async_trait]
pub trait SpecEnhancer: Send + Sync {
    async fn enhance(&self, title: &str, spec: &Value) -> CoreResult<Value>;
}

/// Used when no enhancer endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEnhancer;

#[async_trait]
impl SpecEnhancer for DisabledEnhancer {
    async fn enhance(&self, _title: &str, _spec: &Value) -> CoreResult<Value> {
        Err(CoreError::Upstream("spec enhancement is not configured".into()))
    }
}

/// Registered providers by kind.
#[derive(Clone, Default)]
pub struct SourceProviders {
    providers: HashMap<ProviderKind, Arc<dyn SourceProvider>>,
}

impl SourceProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Arc<dyn SourceProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    pub fn get(&self, kind: ProviderKind) -> CoreResult<&Arc<dyn SourceProvider>> {
        self.providers
            .get(&kind)
            .ok_or_else(|| CoreError::Upstream(format!("{kind} integration is not configured")))
    }
}

impl std::fmt::Debug for SourceProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.providers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_sources() {
        assert!(is_candidate_source("src/routes/users.ts"));
        assert!(is_candidate_source("api/Handler.JAVA"));
        assert!(!is_candidate_source("README.md"));
        assert!(!is_candidate_source("node_modules/express/index.js"));
        assert!(!is_candidate_source("web/node_modules/x/index.js"));
        assert!(!is_candidate_source("Makefile"));
    }

    #[tokio::test]
    async fn disabled_enhancer_is_an_upstream_error() {
        let err = DisabledEnhancer
            .enhance("x", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Upstream(_)));
    }
}
