use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::editor;
use super::model::{
    ApiSpec, ApiSpecFilter, ApiSpecHistoryEntry, ApiSpecPatch, ApiSpecVersion, NewApiSpec,
    OperationChange, SourceType,
};
use super::openapi::OpenApiDocument;
use super::swagger;
use crate::auth::Principal;
use crate::error::{CoreError, CoreResult};
use crate::pagination::{Page, Paginated};
use crate::shelf::Shelf;
use crate::source::SourceFile;
use crate::store::VersionStore;
use crate::validate;

impl Shelf {
    pub async fn create_api_spec(
        &self,
        principal: &Principal,
        input: NewApiSpec,
    ) -> CoreResult<ApiSpec> {
        let project_id = self.resolve_spec_project(principal, input.project_id).await?;
        let name = validate::required_text("name", &input.name)?;

        let (spec_content, source_code) = match input.source_type {
            SourceType::Json => {
                let content = input
                    .spec_content
                    .ok_or_else(|| CoreError::validation("spec_content is required"))?;
                OpenApiDocument::from_value(content.clone())?;
                (content, input.source_code)
            }
            SourceType::SwaggerComments => {
                let source = input
                    .source_code
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| CoreError::validation("source_code is required"))?;
                let files = [SourceFile {
                    path: "source".into(),
                    content: source.clone(),
                }];
                let extracted = swagger::build_spec(&name, &files);
                if extracted.operation_count == 0 {
                    return Err(no_operations(&extracted.warnings));
                }
                (extracted.spec, Some(source))
            }
        };

        self.insert_api_spec(ApiSpecDraft {
            owner: principal.user_id,
            project_id,
            name,
            description: validate::optional_text(input.description),
            spec_content,
            source_type: input.source_type,
            source_code,
        })
        .await
    }

    /// Shared by direct creation and repository analysis.
    pub(crate) async fn insert_api_spec(&self, draft: ApiSpecDraft) -> CoreResult<ApiSpec> {
        let now = Utc::now();
        let spec = ApiSpec {
            id: Uuid::now_v7(),
            project_id: draft.project_id,
            user_id: draft.owner,
            name: draft.name,
            description: draft.description,
            spec_content: draft.spec_content,
            source_type: draft.source_type,
            source_code: draft.source_code,
            created_at: now,
            updated_at: now,
        };
        self.store().insert_api_spec(&spec).await?;
        tracing::info!(api_spec_id = %spec.id, source_type = spec.source_type.as_str(), "api spec created");
        Ok(spec)
    }

    pub async fn list_api_specs(
        &self,
        principal: &Principal,
        mut filter: ApiSpecFilter,
        page: Page,
    ) -> CoreResult<Paginated<ApiSpec>> {
        if let Some(pinned) = principal.pinned_project() {
            if filter.unassigned || filter.project_id.is_some_and(|p| p != pinned) {
                return Ok(page.slice(Vec::new()));
            }
            filter.project_id = Some(pinned);
        }
        Ok(self.store().list_api_specs(filter, page).await?)
    }

    pub async fn get_api_spec(&self, principal: &Principal, id: Uuid) -> CoreResult<ApiSpec> {
        let spec = self
            .store()
            .find_api_spec(id)
            .await?
            .ok_or_else(|| CoreError::not_found("api spec", id))?;
        principal.ensure_project(spec.project_id)?;
        Ok(spec)
    }

    async fn owned_api_spec(&self, principal: &Principal, id: Uuid) -> CoreResult<ApiSpec> {
        let spec = self.get_api_spec(principal, id).await?;
        principal.ensure_owner(spec.user_id, "api spec")?;
        Ok(spec)
    }

    /// Metadata changes are written in place; a changed `spec_content` is
    /// committed as a new version carrying the metadata along.
    pub async fn update_api_spec(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: ApiSpecPatch,
    ) -> CoreResult<ApiSpec> {
        let current = self.owned_api_spec(principal, id).await?;

        let mut updated = current.clone();
        if let Some(name) = patch.name {
            updated.name = validate::required_text("name", &name)?;
        }
        if patch.description.is_some() {
            updated.description = validate::optional_text(patch.description);
        }
        if let Some(project_id) = patch.project_id {
            updated.project_id = self.resolve_spec_project(principal, project_id).await?;
        }

        match patch.spec_content {
            Some(content) if content != current.spec_content => {
                OpenApiDocument::from_value(content.clone())?;
                updated.spec_content = content;
                let (updated, _) = self
                    .engine()
                    .apply_update(
                        self.store(),
                        &current,
                        updated,
                        &principal.username,
                        validate::optional_text(patch.change_summary),
                    )
                    .await?;
                Ok(updated)
            }
            _ => {
                updated.updated_at = Utc::now();
                self.store().update_api_spec_metadata(&updated).await?;
                self.store()
                    .find_api_spec(id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("api spec", id))
            }
        }
    }

    pub async fn delete_api_spec(&self, principal: &Principal, id: Uuid) -> CoreResult<()> {
        self.owned_api_spec(principal, id).await?;
        if !self.store().delete_api_spec(id).await? {
            return Err(CoreError::not_found("api spec", id));
        }
        tracing::info!(api_spec_id = %id, "api spec deleted");
        Ok(())
    }

    pub async fn list_api_spec_versions(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> CoreResult<Vec<ApiSpecHistoryEntry>> {
        let spec = self.get_api_spec(principal, id).await?;
        self.engine().list_versions(self.store(), &spec).await
    }

    pub async fn get_api_spec_version(
        &self,
        principal: &Principal,
        id: Uuid,
        version_id: Uuid,
    ) -> CoreResult<ApiSpecVersion> {
        let spec = self.get_api_spec(principal, id).await?;
        VersionStore::<ApiSpec>::find_version(self.store(), spec.id, version_id)
            .await?
            .ok_or_else(|| CoreError::not_found("version", version_id))
    }

    pub async fn restore_api_spec_version(
        &self,
        principal: &Principal,
        id: Uuid,
        version_id: Uuid,
    ) -> CoreResult<ApiSpec> {
        let current = self.owned_api_spec(principal, id).await?;
        let (restored, _) = self
            .engine()
            .restore_version(self.store(), &current, version_id, &principal.username)
            .await?;
        Ok(restored)
    }

    /// Apply one structural edit and commit it as a single version. Deleting
    /// an operation that does not exist changes nothing and writes no version.
    pub async fn apply_operation_change(
        &self,
        principal: &Principal,
        id: Uuid,
        change: OperationChange,
    ) -> CoreResult<ApiSpec> {
        let current = self.owned_api_spec(principal, id).await?;
        let document = OpenApiDocument::from_value(current.spec_content.clone())?;

        let (edited, summary) = match change {
            OperationChange::Add { key, fields } => {
                let edited = editor::add_operation(&document, &key, fields)?;
                (edited, format!("Added {key}"))
            }
            OperationChange::Edit {
                original,
                updated,
                fields,
            } => {
                let edited = editor::edit_operation(&document, &original, &updated, fields)?;
                let summary = if original == updated {
                    format!("Updated {original}")
                } else {
                    format!("Moved {original} to {updated}")
                };
                (edited, summary)
            }
            OperationChange::Delete { key } => {
                let (edited, removed) = editor::delete_operation(&document, &key);
                if !removed {
                    tracing::debug!(api_spec_id = %id, operation = %key, "delete of absent operation ignored");
                    return Ok(current);
                }
                (edited, format!("Deleted {key}"))
            }
        };

        let mut updated = current.clone();
        updated.spec_content = edited.into_value()?;
        let (updated, _) = self
            .engine()
            .apply_update(
                self.store(),
                &current,
                updated,
                &principal.username,
                Some(summary),
            )
            .await?;
        Ok(updated)
    }

    /// Hand the spec to the enhancer and commit its answer as a new version.
    /// An upstream failure leaves the stored spec untouched.
    pub async fn enhance_api_spec(&self, principal: &Principal, id: Uuid) -> CoreResult<ApiSpec> {
        let current = self.owned_api_spec(principal, id).await?;
        let enhanced = self
            .enhancer()
            .enhance(&current.name, &current.spec_content)
            .await?;
        OpenApiDocument::from_value(enhanced.clone()).map_err(|e| {
            CoreError::Upstream(format!("enhancer returned an invalid document: {e}"))
        })?;

        if enhanced == current.spec_content {
            return Ok(current);
        }
        let mut updated = current.clone();
        updated.spec_content = enhanced;
        let (updated, _) = self
            .engine()
            .apply_update(
                self.store(),
                &current,
                updated,
                &principal.username,
                Some("Enhanced documentation".into()),
            )
            .await?;
        Ok(updated)
    }

    /// A spec may live outside any project, except when the caller is an API
    /// key pinned to one, in which case it must land in that project.
    async fn resolve_spec_project(
        &self,
        principal: &Principal,
        project_id: Option<Uuid>,
    ) -> CoreResult<Option<Uuid>> {
        match project_id {
            Some(project_id) => Ok(Some(self.owned_project(principal, project_id).await?.id)),
            None => {
                principal.ensure_project(None)?;
                Ok(None)
            }
        }
    }
}

pub(crate) struct ApiSpecDraft {
    pub owner: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub spec_content: Value,
    pub source_type: SourceType,
    pub source_code: Option<String>,
}

pub(crate) fn no_operations(warnings: &[String]) -> CoreError {
    let mut message = String::from("no @swagger or @openapi annotated operations found");
    if let Some(first) = warnings.first() {
        message.push_str(&format!(" ({first})"));
    }
    CoreError::validation(message)
}
