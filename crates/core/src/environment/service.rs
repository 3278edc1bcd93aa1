use chrono::Utc;
use uuid::Uuid;

use super::model::{Environment, EnvironmentPatch, NewEnvironment};
use crate::auth::Principal;
use crate::error::{CoreError, CoreResult};
use crate::pagination::{Page, Paginated};
use crate::shelf::Shelf;
use crate::store::StoreError;
use crate::validate;

impl Shelf {
    pub async fn create_environment(
        &self,
        principal: &Principal,
        input: NewEnvironment,
    ) -> CoreResult<Environment> {
        principal.require_unpinned()?;
        let environment = Environment {
            id: Uuid::now_v7(),
            user_id: principal.user_id,
            name: validate::required_text("name", &input.name)?,
            description: validate::optional_text(input.description),
            color: validate::color(input.color)?,
            created_at: Utc::now(),
        };
        self.store().insert_environment(&environment).await?;
        tracing::info!(environment_id = %environment.id, name = %environment.name, "environment created");
        Ok(environment)
    }

    pub async fn list_environments(&self, page: Page) -> CoreResult<Paginated<Environment>> {
        Ok(self.store().list_environments(page).await?)
    }

    pub async fn get_environment(&self, id: Uuid) -> CoreResult<Environment> {
        self.store()
            .find_environment(id)
            .await?
            .ok_or_else(|| CoreError::not_found("environment", id))
    }

    pub async fn update_environment(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: EnvironmentPatch,
    ) -> CoreResult<Environment> {
        principal.require_unpinned()?;
        let mut environment = self.get_environment(id).await?;
        principal.ensure_owner(environment.user_id, "environment")?;

        if let Some(name) = patch.name {
            environment.name = validate::required_text("name", &name)?;
        }
        if patch.description.is_some() {
            environment.description = validate::optional_text(patch.description);
        }
        if patch.color.is_some() {
            environment.color = validate::color(patch.color)?;
        }
        self.store().update_environment(&environment).await?;
        Ok(environment)
    }

    /// Environments are only deleted once they own no projects.
    pub async fn delete_environment(&self, principal: &Principal, id: Uuid) -> CoreResult<()> {
        principal.require_unpinned()?;
        let environment = self.get_environment(id).await?;
        principal.ensure_owner(environment.user_id, "environment")?;

        let projects = self.store().count_projects_in(id).await?;
        if projects > 0 {
            return Err(CoreError::PreconditionFailed(format!(
                "environment still owns {projects} project(s)"
            )));
        }
        match self.store().delete_environment(id).await {
            Ok(true) => {}
            Ok(false) => return Err(CoreError::not_found("environment", id)),
            // A project was attached between the count and the delete.
            Err(StoreError::ReferenceViolation { .. }) => {
                return Err(CoreError::PreconditionFailed(
                    "environment still owns projects".into(),
                ))
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(environment_id = %id, "environment deleted");
        Ok(())
    }
}
