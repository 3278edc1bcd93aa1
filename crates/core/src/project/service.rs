use chrono::Utc;
use uuid::Uuid;

use super::model::{NewProject, Project, ProjectFilter, ProjectPatch};
use crate::auth::Principal;
use crate::error::{CoreError, CoreResult};
use crate::pagination::{Page, Paginated};
use crate::shelf::Shelf;
use crate::store::StoreError;
use crate::validate;

impl Shelf {
    pub async fn create_project(
        &self,
        principal: &Principal,
        input: NewProject,
    ) -> CoreResult<Project> {
        principal.require_unpinned()?;
        self.owned_environment(principal, input.environment_id).await?;

        let code = validate::project_code(&input.code)?;
        self.ensure_code_free(&code, None).await?;

        let project = Project {
            id: Uuid::now_v7(),
            user_id: principal.user_id,
            environment_id: input.environment_id,
            code,
            name: validate::required_text("name", &input.name)?,
            description: validate::optional_text(input.description),
            color: validate::color(input.color)?,
            created_at: Utc::now(),
        };
        self.store()
            .insert_project(&project)
            .await
            .map_err(|e| code_conflict(e, &project.code))?;
        tracing::info!(project_id = %project.id, code = %project.code, "project created");
        Ok(project)
    }

    pub async fn list_projects(
        &self,
        principal: &Principal,
        filter: ProjectFilter,
        page: Page,
    ) -> CoreResult<Paginated<Project>> {
        if let Some(pinned) = principal.pinned_project() {
            let project = self.get_project(principal, pinned).await?;
            let visible = filter
                .environment_id
                .map_or(true, |env| env == project.environment_id);
            let items = if visible { vec![project] } else { Vec::new() };
            return Ok(page.slice(items));
        }
        Ok(self.store().list_projects(filter, page).await?)
    }

    pub async fn get_project(&self, principal: &Principal, id: Uuid) -> CoreResult<Project> {
        principal.ensure_project(Some(id))?;
        self.store()
            .find_project(id)
            .await?
            .ok_or_else(|| CoreError::not_found("project", id))
    }

    /// A project the caller may add documents, specs or keys to.
    pub(crate) async fn owned_project(&self, principal: &Principal, id: Uuid) -> CoreResult<Project> {
        let project = self.get_project(principal, id).await?;
        if project.user_id != principal.user_id {
            return Err(CoreError::Forbidden(
                "only the project owner may add to this project".into(),
            ));
        }
        Ok(project)
    }

    async fn owned_environment(&self, principal: &Principal, id: Uuid) -> CoreResult<()> {
        let environment = self.get_environment(id).await?;
        if environment.user_id != principal.user_id {
            return Err(CoreError::Forbidden(
                "only the environment owner may add projects to it".into(),
            ));
        }
        Ok(())
    }

    pub async fn update_project(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: ProjectPatch,
    ) -> CoreResult<Project> {
        principal.require_unpinned()?;
        let mut project = self.get_project(principal, id).await?;
        principal.ensure_owner(project.user_id, "project")?;

        if let Some(environment_id) = patch.environment_id {
            self.owned_environment(principal, environment_id).await?;
            project.environment_id = environment_id;
        }
        if let Some(code) = patch.code {
            let code = validate::project_code(&code)?;
            if !code.eq_ignore_ascii_case(&project.code) {
                self.ensure_code_free(&code, Some(project.id)).await?;
            }
            project.code = code;
        }
        if let Some(name) = patch.name {
            project.name = validate::required_text("name", &name)?;
        }
        if patch.description.is_some() {
            project.description = validate::optional_text(patch.description);
        }
        if patch.color.is_some() {
            project.color = validate::color(patch.color)?;
        }
        self.store()
            .update_project(&project)
            .await
            .map_err(|e| code_conflict(e, &project.code))?;
        Ok(project)
    }

    /// Deletes the project's documents with their history, detaches its API
    /// specs and removes the API keys scoped to it, in one store operation.
    pub async fn delete_project(&self, principal: &Principal, id: Uuid) -> CoreResult<()> {
        principal.require_unpinned()?;
        let project = self.get_project(principal, id).await?;
        principal.ensure_owner(project.user_id, "project")?;

        if !self.store().delete_project_cascade(id).await? {
            return Err(CoreError::not_found("project", id));
        }
        tracing::info!(project_id = %id, code = %project.code, "project deleted");
        Ok(())
    }

    async fn ensure_code_free(&self, code: &str, except: Option<Uuid>) -> CoreResult<()> {
        match self.store().find_project_by_code(code).await? {
            Some(existing) if Some(existing.id) != except => Err(CoreError::Conflict(format!(
                "project code {code} is already in use"
            ))),
            _ => Ok(()),
        }
    }
}

fn code_conflict(err: StoreError, code: &str) -> CoreError {
    match err {
        StoreError::UniqueViolation { .. } => {
            CoreError::Conflict(format!("project code {code} is already in use"))
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_key::NewApiKey;
    use crate::api_spec::{NewApiSpec, SourceType};
    use crate::document::{DocumentType, NewDocument};
    use crate::shelf::tests::fixture;

    #[tokio::test]
    async fn codes_are_unique_ignoring_case() {
        let f = fixture().await;
        let env = f.environment("Prod").await;
        f.project(&env, "PRY").await;

        let err = f
            .shelf
            .create_project(
                &f.owner,
                NewProject {
                    environment_id: env.id,
                    code: "pry".into(),
                    name: "Again".into(),
                    description: None,
                    color: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn overlong_code_is_rejected() {
        let f = fixture().await;
        let env = f.environment("Prod").await;
        let err = f
            .shelf
            .create_project(
                &f.owner,
                NewProject {
                    environment_id: env.id,
                    code: "ELEVENCHARS".into(),
                    name: "Too long".into(),
                    description: None,
                    color: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn renaming_to_the_same_code_in_other_case_is_allowed() {
        let f = fixture().await;
        let env = f.environment("Prod").await;
        let project = f.project(&env, "PRY").await;
        let updated = f
            .shelf
            .update_project(
                &f.owner,
                project.id,
                ProjectPatch {
                    code: Some("pry".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.code, "pry");
    }

    #[tokio::test]
    async fn environment_with_projects_is_guarded() {
        let f = fixture().await;
        let env = f.environment("Prod").await;
        let project = f.project(&env, "PRY").await;

        let err = f.shelf.delete_environment(&f.owner, env.id).await.unwrap_err();
        assert!(matches!(err, CoreError::PreconditionFailed(_)));

        f.shelf.delete_project(&f.owner, project.id).await.unwrap();
        f.shelf.delete_environment(&f.owner, env.id).await.unwrap();
    }

    #[tokio::test]
    async fn deleting_a_project_cascades() {
        let f = fixture().await;
        let env = f.environment("Prod").await;
        let project = f.project(&env, "PRY").await;

        let doc = f
            .shelf
            .create_document(
                &f.owner,
                NewDocument {
                    project_id: project.id,
                    doc_type: DocumentType::Requisitos,
                    title: "Reqs".into(),
                    description: None,
                    author: None,
                    version: None,
                    content: "must".into(),
                },
            )
            .await
            .unwrap();
        let spec = f
            .shelf
            .create_api_spec(
                &f.owner,
                NewApiSpec {
                    project_id: Some(project.id),
                    name: "Spec".into(),
                    description: None,
                    spec_content: Some(serde_json::json!({ "openapi": "3.0.0", "paths": {} })),
                    source_type: SourceType::Json,
                    source_code: None,
                },
            )
            .await
            .unwrap();
        let key = f
            .shelf
            .create_api_key(
                &f.owner,
                NewApiKey {
                    name: "scoped".into(),
                    project_id: Some(project.id),
                    expires_at: None,
                },
            )
            .await
            .unwrap();

        f.shelf.delete_project(&f.owner, project.id).await.unwrap();

        assert!(matches!(
            f.shelf.get_document(&f.owner, doc.id).await,
            Err(CoreError::NotFound { .. })
        ));
        let spec = f.shelf.get_api_spec(&f.owner, spec.id).await.unwrap();
        assert_eq!(spec.project_id, None);
        assert!(f.shelf.authenticate_api_key(&key.key).await.is_err());
    }

    #[tokio::test]
    async fn children_need_an_owned_parent() {
        let f = fixture().await;
        let env = f.environment("Prod").await;
        let project = f.project(&env, "PRY").await;

        let err = f
            .shelf
            .create_project(
                &f.stranger,
                NewProject {
                    environment_id: env.id,
                    code: "INTR".into(),
                    name: "Intruder".into(),
                    description: None,
                    color: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));

        let err = f
            .shelf
            .create_document(
                &f.stranger,
                NewDocument {
                    project_id: project.id,
                    doc_type: DocumentType::Api,
                    title: "X".into(),
                    description: None,
                    author: None,
                    version: None,
                    content: "mine now".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));

        let listed = f
            .shelf
            .list_projects(&f.owner, ProjectFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(listed.total, 1);
    }

    #[tokio::test]
    async fn strangers_cannot_delete_projects() {
        let f = fixture().await;
        let env = f.environment("Prod").await;
        let project = f.project(&env, "PRY").await;
        let err = f
            .shelf
            .delete_project(&f.stranger, project.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }
}
