use chrono::Utc;
use uuid::Uuid;

use super::model::{AnalyzeRequest, ConnectionInput, ProviderKind, RepoSummary, SourceConnection};
use crate::api_spec::{no_operations, swagger, ApiSpec, ApiSpecDraft, SourceType};
use crate::auth::Principal;
use crate::error::{CoreError, CoreResult};
use crate::shelf::Shelf;
use crate::validate;

impl Shelf {
    /// Store (or replace) the caller's token for `provider`.
    pub async fn connect_source(
        &self,
        principal: &Principal,
        provider: ProviderKind,
        input: ConnectionInput,
    ) -> CoreResult<SourceConnection> {
        principal.require_session()?;
        let access_token = validate::required_text("access_token", &input.access_token)?;
        let account = validate::required_text("account", &input.account)?;

        let now = Utc::now();
        let existing = self
            .store()
            .find_source_connection(principal.user_id, provider)
            .await?;
        let connection = SourceConnection {
            id: existing.as_ref().map_or_else(Uuid::now_v7, |c| c.id),
            user_id: principal.user_id,
            provider,
            account,
            access_token,
            created_at: existing.as_ref().map_or(now, |c| c.created_at),
            updated_at: now,
        };
        self.store().upsert_source_connection(&connection).await?;
        tracing::info!(user_id = %principal.user_id, %provider, "source-control connection saved");
        Ok(connection)
    }

    pub async fn disconnect_source(
        &self,
        principal: &Principal,
        provider: ProviderKind,
    ) -> CoreResult<()> {
        principal.require_session()?;
        if !self
            .store()
            .delete_source_connection(principal.user_id, provider)
            .await?
        {
            return Err(CoreError::not_found("source connection", provider));
        }
        tracing::info!(user_id = %principal.user_id, %provider, "source-control connection removed");
        Ok(())
    }

    pub async fn list_source_connections(
        &self,
        principal: &Principal,
    ) -> CoreResult<Vec<SourceConnection>> {
        principal.require_session()?;
        Ok(self
            .store()
            .list_source_connections(principal.user_id)
            .await?)
    }

    pub async fn list_repositories(
        &self,
        principal: &Principal,
        provider: ProviderKind,
    ) -> CoreResult<Vec<RepoSummary>> {
        let connection = self.connection(principal, provider).await?;
        self.providers()
            .get(provider)?
            .list_repos(&connection.access_token)
            .await
    }

    /// Fetch the repository's sources, build a spec from their annotations
    /// and save it as a new swagger-comments ApiSpec.
    pub async fn analyze_repository(
        &self,
        principal: &Principal,
        provider: ProviderKind,
        owner: &str,
        repo: &str,
        request: AnalyzeRequest,
    ) -> CoreResult<ApiSpec> {
        let connection = self.connection(principal, provider).await?;
        if let Some(project_id) = request.project_id {
            self.owned_project(principal, project_id).await?;
        }
        let branch = validate::optional_text(request.branch);
        let files = self
            .providers()
            .get(provider)?
            .fetch_sources(&connection.access_token, owner, repo, branch.as_deref())
            .await?;

        let name = validate::optional_text(request.name).unwrap_or_else(|| format!("{owner}/{repo}"));
        let extracted = swagger::build_spec(&name, &files);
        tracing::info!(
            %provider,
            repository = %format!("{owner}/{repo}"),
            files = files.len(),
            annotations = extracted.annotations.len(),
            operations = extracted.operation_count,
            "repository analyzed"
        );
        if extracted.operation_count == 0 {
            return Err(no_operations(&extracted.warnings));
        }

        let description = match &branch {
            Some(branch) => format!("Extracted from {provider}:{owner}/{repo}@{branch}"),
            None => format!("Extracted from {provider}:{owner}/{repo}"),
        };
        self.insert_api_spec(ApiSpecDraft {
            owner: principal.user_id,
            project_id: request.project_id,
            name,
            description: Some(description),
            source_code: Some(extracted.source_code()),
            spec_content: extracted.spec,
            source_type: SourceType::SwaggerComments,
        })
        .await
    }

    async fn connection(
        &self,
        principal: &Principal,
        provider: ProviderKind,
    ) -> CoreResult<SourceConnection> {
        principal.require_session()?;
        self.store()
            .find_source_connection(principal.user_id, provider)
            .await?
            .ok_or_else(|| CoreError::not_found("source connection", provider))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::shelf::tests::{fixture, fixture_with};
    use crate::source::{SourceFile, SourceProvider};

    struct FakeGitHub;

    #[async_trait]
    impl SourceProvider for FakeGitHub {
        fn kind(&self) -> ProviderKind {
            ProviderKind::GitHub
        }

        async fn list_repos(&self, token: &str) -> CoreResult<Vec<RepoSummary>> {
            if token != "gh-token" {
                return Err(CoreError::Upstream("bad credentials".into()));
            }
            Ok(vec![RepoSummary {
                owner: "acme".into(),
                name: "api".into(),
                full_name: "acme/api".into(),
                default_branch: "main".into(),
                private: false,
                description: None,
            }])
        }

        async fn fetch_sources(
            &self,
            _token: &str,
            _owner: &str,
            repo: &str,
            _branch: Option<&str>,
        ) -> CoreResult<Vec<SourceFile>> {
            if repo == "empty" {
                return Ok(vec![SourceFile {
                    path: "index.js".into(),
                    content: "console.log(1)".into(),
                }]);
            }
            Ok(vec![SourceFile {
                path: "src/users.js".into(),
                content: "/**\n * @openapi\n * /users:\n *   get:\n *     summary: Users\n */".into(),
            }])
        }
    }

    fn token() -> ConnectionInput {
        ConnectionInput {
            access_token: "gh-token".into(),
            account: "ada-gh".into(),
        }
    }

    #[tokio::test]
    async fn connection_lifecycle() {
        let f = fixture().await;
        let first = f
            .shelf
            .connect_source(&f.owner, ProviderKind::GitHub, token())
            .await
            .unwrap();
        let again = f
            .shelf
            .connect_source(&f.owner, ProviderKind::GitHub, token())
            .await
            .unwrap();
        assert_eq!(first.id, again.id);

        let listed = f.shelf.list_source_connections(&f.owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        let json = serde_json::to_value(&listed[0]).unwrap();
        assert!(json.get("access_token").is_none());

        f.shelf
            .disconnect_source(&f.owner, ProviderKind::GitHub)
            .await
            .unwrap();
        assert!(matches!(
            f.shelf.disconnect_source(&f.owner, ProviderKind::GitHub).await,
            Err(CoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn analysis_creates_a_swagger_comments_spec() {
        let f = fixture_with(|b| b.provider(Arc::new(FakeGitHub))).await;
        f.shelf
            .connect_source(&f.owner, ProviderKind::GitHub, token())
            .await
            .unwrap();

        let repos = f
            .shelf
            .list_repositories(&f.owner, ProviderKind::GitHub)
            .await
            .unwrap();
        assert_eq!(repos[0].full_name, "acme/api");

        let spec = f
            .shelf
            .analyze_repository(
                &f.owner,
                ProviderKind::GitHub,
                "acme",
                "api",
                AnalyzeRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(spec.name, "acme/api");
        assert_eq!(spec.source_type, SourceType::SwaggerComments);
        assert_eq!(spec.spec_content["paths"]["/users"]["get"]["summary"], "Users");
        assert!(spec.source_code.unwrap().contains("src/users.js"));
    }

    #[tokio::test]
    async fn analysis_without_annotations_is_a_validation_error() {
        let f = fixture_with(|b| b.provider(Arc::new(FakeGitHub))).await;
        f.shelf
            .connect_source(&f.owner, ProviderKind::GitHub, token())
            .await
            .unwrap();
        let err = f
            .shelf
            .analyze_repository(
                &f.owner,
                ProviderKind::GitHub,
                "acme",
                "empty",
                AnalyzeRequest::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn unconfigured_provider_is_an_upstream_error() {
        let f = fixture().await;
        f.shelf
            .connect_source(
                &f.owner,
                ProviderKind::Bitbucket,
                ConnectionInput {
                    access_token: "bb".into(),
                    account: "ada".into(),
                },
            )
            .await
            .unwrap();
        let err = f
            .shelf
            .list_repositories(&f.owner, ProviderKind::Bitbucket)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Upstream(_)));
    }

    #[tokio::test]
    async fn api_keys_cannot_use_source_control() {
        let f = fixture().await;
        let key = Principal::api_key(f.owner.user_id, "ada", uuid::Uuid::now_v7(), None);
        let err = f
            .shelf
            .connect_source(&key, ProviderKind::GitHub, token())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }
}
