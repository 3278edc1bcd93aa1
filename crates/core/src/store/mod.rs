//! Repository ports. Services only talk to storage through these traits;
//! the HTTP crate plugs in Postgres, tests use [`memory::MemoryStore`].

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::api_key::{ApiKey, UsageLogEntry, UsageSnapshot};
use crate::api_spec::{ApiSpec, ApiSpecFilter};
use crate::document::{Document, DocumentFilter};
use crate::environment::Environment;
use crate::pagination::{Page, Paginated};
use crate::project::{Project, ProjectFilter};
use crate::source::{ProviderKind, SourceConnection};
use crate::user::User;
use crate::versioning::{Commit, VersionRecord, Versioned};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage connection failed: {message}")]
    Connection { message: String },

    #[error("storage query failed: {message}")]
    Query { message: String },

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("referential constraint violated: {constraint}")]
    ReferenceViolation { constraint: String },

    #[error("{entity} row missing: {id}")]
    RowMissing { entity: &'static str, id: String },

    #[error("stored data is corrupt: {message}")]
    Corrupt { message: String },
}

impl StoreError {
    pub fn row_missing(entity: &'static str, id: impl ToString) -> Self {
        StoreError::RowMissing {
            entity,
            id: id.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    /// Case-insensitive.
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait EnvironmentRepository: Send + Sync {
    async fn insert_environment(&self, environment: &Environment) -> StoreResult<()>;
    async fn find_environment(&self, id: Uuid) -> StoreResult<Option<Environment>>;
    async fn list_environments(&self, page: Page) -> StoreResult<Paginated<Environment>>;
    async fn update_environment(&self, environment: &Environment) -> StoreResult<()>;
    async fn count_projects_in(&self, environment_id: Uuid) -> StoreResult<u64>;
    /// Fails with `ReferenceViolation` while projects still point at it.
    async fn delete_environment(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn insert_project(&self, project: &Project) -> StoreResult<()>;
    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>>;
    /// Case-insensitive.
    async fn find_project_by_code(&self, code: &str) -> StoreResult<Option<Project>>;
    async fn list_projects(
        &self,
        filter: ProjectFilter,
        page: Page,
    ) -> StoreResult<Paginated<Project>>;
    async fn update_project(&self, project: &Project) -> StoreResult<()>;
    /// Atomically delete the project and its documents (with history),
    /// detach its API specs and delete the API keys scoped to it.
    async fn delete_project_cascade(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn insert_document(&self, document: &Document) -> StoreResult<()>;
    async fn find_document(&self, id: Uuid) -> StoreResult<Option<Document>>;
    async fn list_documents(
        &self,
        filter: DocumentFilter,
        page: Page,
    ) -> StoreResult<Paginated<Document>>;
    /// Writes the non-versioned fields of the live row. Title and content
    /// only change through [`VersionStore::commit_version`].
    async fn update_document_metadata(&self, document: &Document) -> StoreResult<()>;
    async fn delete_document(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait ApiSpecRepository: Send + Sync {
    async fn insert_api_spec(&self, spec: &ApiSpec) -> StoreResult<()>;
    async fn find_api_spec(&self, id: Uuid) -> StoreResult<Option<ApiSpec>>;
    async fn list_api_specs(
        &self,
        filter: ApiSpecFilter,
        page: Page,
    ) -> StoreResult<Paginated<ApiSpec>>;
    /// Writes name, description and project. `spec_content` only changes
    /// through [`VersionStore::commit_version`].
    async fn update_api_spec_metadata(&self, spec: &ApiSpec) -> StoreResult<()>;
    async fn delete_api_spec(&self, id: Uuid) -> StoreResult<bool>;
}

/// History storage for one versioned entity type.
#[async_trait]
pub trait VersionStore<E: Versioned>: Send + Sync {
    /// In one atomic step: lock the live row, allocate the entity's next
    /// version number, insert a snapshot of the locked row under it, write
    /// the new live row, prune to the retention.
    /// `RowMissing` if the entity no longer exists.
    async fn commit_version(&self, commit: Commit<E>) -> StoreResult<VersionRecord<E::Snapshot>>;

    /// Newest first.
    async fn list_versions(&self, entity_id: Uuid) -> StoreResult<Vec<VersionRecord<E::Snapshot>>>;

    /// `None` unless the version belongs to `entity_id`.
    async fn find_version(
        &self,
        entity_id: Uuid,
        version_id: Uuid,
    ) -> StoreResult<Option<VersionRecord<E::Snapshot>>>;
}

#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    async fn insert_api_key(&self, key: &ApiKey) -> StoreResult<()>;
    async fn find_api_key(&self, id: Uuid) -> StoreResult<Option<ApiKey>>;
    async fn find_api_key_by_prefix(&self, prefix: &str) -> StoreResult<Option<ApiKey>>;
    async fn list_api_keys(&self, user_id: Uuid, page: Page) -> StoreResult<Paginated<ApiKey>>;
    /// Writes name, expiry and the active flag. Usage counters are owned by
    /// `record_usage`.
    async fn update_api_key(&self, key: &ApiKey) -> StoreResult<()>;
    async fn delete_api_key(&self, id: Uuid) -> StoreResult<bool>;
    /// Atomically bump `usage_count`, set `last_used_at` and append the
    /// entry. `None` if the key is gone.
    async fn record_usage(&self, entry: &UsageLogEntry) -> StoreResult<Option<UsageSnapshot>>;
    /// Newest first.
    async fn recent_usage(&self, key_id: Uuid, limit: u32) -> StoreResult<Vec<UsageLogEntry>>;
}

#[async_trait]
pub trait SourceConnectionRepository: Send + Sync {
    async fn upsert_source_connection(&self, connection: &SourceConnection) -> StoreResult<()>;
    async fn find_source_connection(
        &self,
        user_id: Uuid,
        provider: ProviderKind,
    ) -> StoreResult<Option<SourceConnection>>;
    async fn list_source_connections(&self, user_id: Uuid) -> StoreResult<Vec<SourceConnection>>;
    async fn delete_source_connection(
        &self,
        user_id: Uuid,
        provider: ProviderKind,
    ) -> StoreResult<bool>;
}

/// Everything a [`crate::Shelf`] needs from storage.
#[async_trait]
pub trait Store:
    UserRepository
    + EnvironmentRepository
    + ProjectRepository
    + DocumentRepository
    + ApiSpecRepository
    + VersionStore<Document>
    + VersionStore<ApiSpec>
    + ApiKeyRepository
    + SourceConnectionRepository
{
    /// Cheap liveness check for health endpoints.
    async fn ping(&self) -> StoreResult<()>;
}
