use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// How the caller authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Interactive session (JWT).
    Session,
    /// Machine access through an API key, optionally pinned to one project.
    ApiKey {
        key_id: Uuid,
        project_id: Option<Uuid>,
    },
}

/// The authenticated caller. Every service operation takes one explicitly;
/// there is no ambient "current user".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub scope: Scope,
}

impl Principal {
    pub fn session(user_id: Uuid, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            scope: Scope::Session,
        }
    }

    pub fn api_key(
        user_id: Uuid,
        username: impl Into<String>,
        key_id: Uuid,
        project_id: Option<Uuid>,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            scope: Scope::ApiKey { key_id, project_id },
        }
    }

    pub fn api_key_id(&self) -> Option<Uuid> {
        match self.scope {
            Scope::ApiKey { key_id, .. } => Some(key_id),
            Scope::Session => None,
        }
    }

    /// The single project a key is pinned to, if any.
    pub fn pinned_project(&self) -> Option<Uuid> {
        match self.scope {
            Scope::ApiKey { project_id, .. } => project_id,
            Scope::Session => None,
        }
    }

    pub fn can_reach_project(&self, project_id: Option<Uuid>) -> bool {
        match self.pinned_project() {
            None => true,
            Some(pinned) => project_id == Some(pinned),
        }
    }

    pub fn ensure_project(&self, project_id: Option<Uuid>) -> CoreResult<()> {
        if self.can_reach_project(project_id) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(
                "api key is scoped to a different project".into(),
            ))
        }
    }

    pub fn ensure_owner(&self, owner_id: Uuid, what: &str) -> CoreResult<()> {
        if self.user_id == owner_id {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "only the owner may modify this {what}"
            )))
        }
    }

    /// Account-level actions (key management, source-control connections)
    /// are not available to API keys.
    pub fn require_session(&self) -> CoreResult<()> {
        match self.scope {
            Scope::Session => Ok(()),
            Scope::ApiKey { .. } => Err(CoreError::Forbidden(
                "this action requires an interactive session".into(),
            )),
        }
    }

    /// Workspace structure (environments, projects) may be changed by
    /// sessions and unscoped keys only.
    pub fn require_unpinned(&self) -> CoreResult<()> {
        if self.pinned_project().is_some() {
            return Err(CoreError::Forbidden(
                "project-scoped api keys cannot change workspace structure".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_key_only_reaches_its_project() {
        let project = Uuid::now_v7();
        let principal = Principal::api_key(Uuid::now_v7(), "bot", Uuid::now_v7(), Some(project));
        assert!(principal.can_reach_project(Some(project)));
        assert!(!principal.can_reach_project(Some(Uuid::now_v7())));
        assert!(!principal.can_reach_project(None));
        assert!(principal.require_session().is_err());
    }

    #[test]
    fn session_reaches_everything() {
        let principal = Principal::session(Uuid::now_v7(), "ada");
        assert!(principal.can_reach_project(None));
        assert!(principal.require_session().is_ok());
        assert!(principal.require_unpinned().is_ok());
    }
}
