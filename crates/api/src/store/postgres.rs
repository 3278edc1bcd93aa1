//! PostgreSQL adapter for the repository ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docshelf_core::api_key::{ApiKey, UsageLogEntry, UsageSnapshot};
use docshelf_core::api_spec::{ApiSpec, ApiSpecFilter, ApiSpecSnapshot, ApiSpecVersion};
use docshelf_core::document::{Document, DocumentFilter, DocumentSnapshot, DocumentVersion};
use docshelf_core::environment::Environment;
use docshelf_core::pagination::{Page, Paginated};
use docshelf_core::project::{Project, ProjectFilter};
use docshelf_core::source::{ProviderKind, SourceConnection};
use docshelf_core::store::{
    ApiKeyRepository, ApiSpecRepository, DocumentRepository, EnvironmentRepository,
    ProjectRepository, SourceConnectionRepository, Store, StoreError, StoreResult,
    UserRepository, VersionStore,
};
use docshelf_core::user::User;
use docshelf_core::versioning::{Commit, Retention};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

/// Repository ports over a sqlx pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) => {
            let constraint = db.constraint().unwrap_or_default().to_string();
            match db.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation { constraint },
                Some("23503") => StoreError::ReferenceViolation { constraint },
                _ => StoreError::Query {
                    message: err.to_string(),
                },
            }
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Connection {
            message: err.to_string(),
        },
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => StoreError::Corrupt {
            message: err.to_string(),
        },
        _ => StoreError::Query {
            message: err.to_string(),
        },
    }
}

fn corrupt(column: &str, reason: String) -> StoreError {
    StoreError::Corrupt {
        message: format!("{column}: {reason}"),
    }
}

/// LIMIT and OFFSET for a page.
fn window(page: Page) -> (i64, i64) {
    (
        i64::from(page.limit),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

fn paginated<T>(items: Vec<T>, total: i64, page: Page) -> Paginated<T> {
    Paginated {
        items,
        page: page.page,
        limit: page.limit,
        total: u64::try_from(total).unwrap_or_default(),
    }
}

/// Highest version number that falls outside the retained window.
fn prune_floor(seq: i32, retention: Retention) -> Option<i32> {
    let limit = retention.limit()?;
    let limit = i32::try_from(limit).unwrap_or(i32::MAX);
    Some(seq.saturating_sub(limit))
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct EnvironmentRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    description: Option<String>,
    color: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<EnvironmentRow> for Environment {
    fn from(row: EnvironmentRow) -> Self {
        Environment {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            color: row.color,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: Uuid,
    user_id: Uuid,
    environment_id: Uuid,
    code: String,
    name: String,
    description: Option<String>,
    color: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.id,
            user_id: row.user_id,
            environment_id: row.environment_id,
            code: row.code,
            name: row.name,
            description: row.description,
            color: row.color,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    project_id: Uuid,
    user_id: Uuid,
    doc_type: String,
    title: String,
    description: Option<String>,
    author: Option<String>,
    version: Option<String>,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> StoreResult<Self> {
        Ok(Document {
            doc_type: row
                .doc_type
                .parse()
                .map_err(|e| corrupt("documents.doc_type", e))?,
            id: row.id,
            project_id: row.project_id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            author: row.author,
            version: row.version,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DocumentVersionRow {
    id: Uuid,
    document_id: Uuid,
    version_number: i32,
    title: String,
    content: String,
    created_by: String,
    change_summary: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<DocumentVersionRow> for DocumentVersion {
    fn from(row: DocumentVersionRow) -> Self {
        DocumentVersion {
            id: row.id,
            entity_id: row.document_id,
            version_number: row.version_number,
            snapshot: DocumentSnapshot {
                title: row.title,
                content: row.content,
            },
            created_by: row.created_by,
            change_summary: row.change_summary,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ApiSpecRow {
    id: Uuid,
    project_id: Option<Uuid>,
    user_id: Uuid,
    name: String,
    description: Option<String>,
    spec_content: Value,
    source_type: String,
    source_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ApiSpecRow> for ApiSpec {
    type Error = StoreError;

    fn try_from(row: ApiSpecRow) -> StoreResult<Self> {
        Ok(ApiSpec {
            source_type: row
                .source_type
                .parse()
                .map_err(|e| corrupt("api_specs.source_type", e))?,
            id: row.id,
            project_id: row.project_id,
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            spec_content: row.spec_content,
            source_code: row.source_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ApiSpecVersionRow {
    id: Uuid,
    api_spec_id: Uuid,
    version_number: i32,
    spec_content: Value,
    created_by: String,
    change_summary: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ApiSpecVersionRow> for ApiSpecVersion {
    fn from(row: ApiSpecVersionRow) -> Self {
        ApiSpecVersion {
            id: row.id,
            entity_id: row.api_spec_id,
            version_number: row.version_number,
            snapshot: ApiSpecSnapshot {
                spec_content: row.spec_content,
            },
            created_by: row.created_by,
            change_summary: row.change_summary,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ApiKeyRow {
    id: Uuid,
    user_id: Uuid,
    project_id: Option<Uuid>,
    name: String,
    prefix: String,
    key_hash: String,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
    usage_count: i64,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ApiKeyRow> for ApiKey {
    fn from(row: ApiKeyRow) -> Self {
        ApiKey {
            id: row.id,
            user_id: row.user_id,
            project_id: row.project_id,
            name: row.name,
            prefix: row.prefix,
            key_hash: row.key_hash,
            expires_at: row.expires_at,
            is_active: row.is_active,
            usage_count: row.usage_count,
            last_used_at: row.last_used_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct UsageRow {
    id: Uuid,
    api_key_id: Uuid,
    used_at: DateTime<Utc>,
    method: String,
    endpoint: String,
    ip_address: Option<String>,
}

impl From<UsageRow> for UsageLogEntry {
    fn from(row: UsageRow) -> Self {
        UsageLogEntry {
            id: row.id,
            api_key_id: row.api_key_id,
            used_at: row.used_at,
            method: row.method,
            endpoint: row.endpoint,
            ip_address: row.ip_address,
        }
    }
}

#[derive(Debug, FromRow)]
struct ConnectionRow {
    id: Uuid,
    user_id: Uuid,
    provider: String,
    account: String,
    access_token: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ConnectionRow> for SourceConnection {
    type Error = StoreError;

    fn try_from(row: ConnectionRow) -> StoreResult<Self> {
        Ok(SourceConnection {
            provider: row
                .provider
                .parse()
                .map_err(|e| corrupt("source_connections.provider", e))?,
            id: row.id,
            user_id: row.user_id,
            account: row.account,
            access_token: row.access_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";
const ENVIRONMENT_COLUMNS: &str = "id, user_id, name, description, color, created_at";
const PROJECT_COLUMNS: &str =
    "id, user_id, environment_id, code, name, description, color, created_at";
const DOCUMENT_COLUMNS: &str = "id, project_id, user_id, doc_type, title, description, author, \
                                version, content, created_at, updated_at";
const DOCUMENT_VERSION_COLUMNS: &str =
    "id, document_id, version_number, title, content, created_by, change_summary, created_at";
const API_SPEC_COLUMNS: &str = "id, project_id, user_id, name, description, spec_content, \
                                source_type, source_code, created_at, updated_at";
const API_SPEC_VERSION_COLUMNS: &str =
    "id, api_spec_id, version_number, spec_content, created_by, change_summary, created_at";
const API_KEY_COLUMNS: &str = "id, user_id, project_id, name, prefix, key_hash, expires_at, \
                               is_active, usage_count, last_used_at, created_at";
const CONNECTION_COLUMNS: &str =
    "id, user_id, provider, account, access_token, created_at, updated_at";

async fn write_document<'e, E>(executor: E, document: &Document) -> StoreResult<u64>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "UPDATE documents SET project_id = $2, doc_type = $3, title = $4, description = $5, \
         author = $6, version = $7, content = $8, updated_at = $9 WHERE id = $1",
    )
    .bind(document.id)
    .bind(document.project_id)
    .bind(document.doc_type.as_str())
    .bind(&document.title)
    .bind(&document.description)
    .bind(&document.author)
    .bind(&document.version)
    .bind(&document.content)
    .bind(document.updated_at)
    .execute(executor)
    .await
    .map_err(db_error)?;
    Ok(result.rows_affected())
}

async fn write_api_spec<'e, E>(executor: E, spec: &ApiSpec) -> StoreResult<u64>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "UPDATE api_specs SET project_id = $2, name = $3, description = $4, spec_content = $5, \
         source_type = $6, source_code = $7, updated_at = $8 WHERE id = $1",
    )
    .bind(spec.id)
    .bind(spec.project_id)
    .bind(&spec.name)
    .bind(&spec.description)
    .bind(&spec.spec_content)
    .bind(spec.source_type.as_str())
    .bind(&spec.source_code)
    .bind(spec.updated_at)
    .execute(executor)
    .await
    .map_err(db_error)?;
    Ok(result.rows_affected())
}

#[async_trait]
impl UserRepository for PgStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(username) = lower($1)"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(User::from))
    }
}

#[async_trait]
impl EnvironmentRepository for PgStore {
    async fn insert_environment(&self, environment: &Environment) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO environments (id, user_id, name, description, color, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(environment.id)
        .bind(environment.user_id)
        .bind(&environment.name)
        .bind(&environment.description)
        .bind(&environment.color)
        .bind(environment.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_environment(&self, id: Uuid) -> StoreResult<Option<Environment>> {
        let row: Option<EnvironmentRow> = sqlx::query_as(&format!(
            "SELECT {ENVIRONMENT_COLUMNS} FROM environments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(Environment::from))
    }

    async fn list_environments(&self, page: Page) -> StoreResult<Paginated<Environment>> {
        let (limit, offset) = window(page);
        let total: i64 = sqlx::query_scalar("SELECT count(*) FROM environments")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        let rows: Vec<EnvironmentRow> = sqlx::query_as(&format!(
            "SELECT {ENVIRONMENT_COLUMNS} FROM environments \
             ORDER BY lower(name), id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(paginated(
            rows.into_iter().map(Environment::from).collect(),
            total,
            page,
        ))
    }

    async fn update_environment(&self, environment: &Environment) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE environments SET name = $2, description = $3, color = $4 WHERE id = $1",
        )
        .bind(environment.id)
        .bind(&environment.name)
        .bind(&environment.description)
        .bind(&environment.color)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::row_missing("environment", environment.id));
        }
        Ok(())
    }

    async fn count_projects_in(&self, environment_id: Uuid) -> StoreResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT count(*) FROM projects WHERE environment_id = $1")
                .bind(environment_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn delete_environment(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM environments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProjectRepository for PgStore {
    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO projects (id, user_id, environment_id, code, name, description, color, \
             created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(project.id)
        .bind(project.user_id)
        .bind(project.environment_id)
        .bind(&project.code)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.color)
        .bind(project.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        let row: Option<ProjectRow> =
            sqlx::query_as(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(Project::from))
    }

    async fn find_project_by_code(&self, code: &str) -> StoreResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE lower(code) = lower($1)"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(Project::from))
    }

    async fn list_projects(
        &self,
        filter: ProjectFilter,
        page: Page,
    ) -> StoreResult<Paginated<Project>> {
        let (limit, offset) = window(page);
        let total: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM projects WHERE ($1::uuid IS NULL OR environment_id = $1)",
        )
        .bind(filter.environment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        let rows: Vec<ProjectRow> = sqlx::query_as(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects \
             WHERE ($1::uuid IS NULL OR environment_id = $1) \
             ORDER BY lower(code) LIMIT $2 OFFSET $3"
        ))
        .bind(filter.environment_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(paginated(
            rows.into_iter().map(Project::from).collect(),
            total,
            page,
        ))
    }

    async fn update_project(&self, project: &Project) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE projects SET environment_id = $2, code = $3, name = $4, description = $5, \
             color = $6 WHERE id = $1",
        )
        .bind(project.id)
        .bind(project.environment_id)
        .bind(&project.code)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.color)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::row_missing("project", project.id));
        }
        Ok(())
    }

    async fn delete_project_cascade(&self, id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        // Histories and usage logs follow through ON DELETE CASCADE; specs
        // are detached by ON DELETE SET NULL.
        let documents = sqlx::query("DELETE FROM documents WHERE project_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();
        let keys = sqlx::query("DELETE FROM api_keys WHERE project_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();
        let removed = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected()
            > 0;
        tx.commit().await.map_err(db_error)?;
        if removed {
            tracing::debug!(project_id = %id, documents, api_keys = keys, "project rows removed");
        }
        Ok(removed)
    }
}

#[async_trait]
impl DocumentRepository for PgStore {
    async fn insert_document(&self, document: &Document) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO documents (id, project_id, user_id, doc_type, title, description, \
             author, version, content, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(document.id)
        .bind(document.project_id)
        .bind(document.user_id)
        .bind(document.doc_type.as_str())
        .bind(&document.title)
        .bind(&document.description)
        .bind(&document.author)
        .bind(&document.version)
        .bind(&document.content)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_document(&self, id: Uuid) -> StoreResult<Option<Document>> {
        let row: Option<DocumentRow> =
            sqlx::query_as(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        row.map(Document::try_from).transpose()
    }

    async fn list_documents(
        &self,
        filter: DocumentFilter,
        page: Page,
    ) -> StoreResult<Paginated<Document>> {
        let (limit, offset) = window(page);
        let doc_type = filter.doc_type.map(|t| t.as_str());
        let total: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM documents \
             WHERE ($1::uuid IS NULL OR project_id = $1) AND ($2::text IS NULL OR doc_type = $2)",
        )
        .bind(filter.project_id)
        .bind(doc_type)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        let rows: Vec<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents \
             WHERE ($1::uuid IS NULL OR project_id = $1) AND ($2::text IS NULL OR doc_type = $2) \
             ORDER BY updated_at DESC, id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(filter.project_id)
        .bind(doc_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        let items = rows
            .into_iter()
            .map(Document::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(paginated(items, total, page))
    }

    async fn update_document_metadata(&self, document: &Document) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE documents SET project_id = $2, doc_type = $3, description = $4, \
             author = $5, version = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(document.id)
        .bind(document.project_id)
        .bind(document.doc_type.as_str())
        .bind(&document.description)
        .bind(&document.author)
        .bind(&document.version)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::row_missing("document", document.id));
        }
        Ok(())
    }

    async fn delete_document(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl VersionStore<Document> for PgStore {
    async fn commit_version(&self, commit: Commit<Document>) -> StoreResult<DocumentVersion> {
        let id = commit.entity.id;
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // The row lock taken here serialises allocation per document, and the
        // returned title and content are the live state being overwritten.
        let locked: Option<(i32, String, String)> = sqlx::query_as(
            "UPDATE documents SET version_seq = version_seq + 1 WHERE id = $1 \
             RETURNING version_seq, title, content",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;
        let Some((seq, title, content)) = locked else {
            return Err(StoreError::row_missing("document", id));
        };

        let record = commit.record(seq, DocumentSnapshot { title, content });
        sqlx::query(
            "INSERT INTO document_versions (id, document_id, version_number, title, content, \
             created_by, change_summary, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(record.id)
        .bind(record.entity_id)
        .bind(record.version_number)
        .bind(&record.snapshot.title)
        .bind(&record.snapshot.content)
        .bind(&record.created_by)
        .bind(&record.change_summary)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        write_document(&mut *tx, &commit.entity).await?;

        if let Some(floor) = prune_floor(seq, commit.retention) {
            let pruned = sqlx::query(
                "DELETE FROM document_versions WHERE document_id = $1 AND version_number <= $2",
            )
            .bind(id)
            .bind(floor)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();
            if pruned > 0 {
                tracing::debug!(document_id = %id, pruned, "version history pruned");
            }
        }

        tx.commit().await.map_err(db_error)?;
        Ok(record)
    }

    async fn list_versions(&self, entity_id: Uuid) -> StoreResult<Vec<DocumentVersion>> {
        let rows: Vec<DocumentVersionRow> = sqlx::query_as(&format!(
            "SELECT {DOCUMENT_VERSION_COLUMNS} FROM document_versions \
             WHERE document_id = $1 ORDER BY version_number DESC"
        ))
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(DocumentVersion::from).collect())
    }

    async fn find_version(
        &self,
        entity_id: Uuid,
        version_id: Uuid,
    ) -> StoreResult<Option<DocumentVersion>> {
        let row: Option<DocumentVersionRow> = sqlx::query_as(&format!(
            "SELECT {DOCUMENT_VERSION_COLUMNS} FROM document_versions \
             WHERE id = $1 AND document_id = $2"
        ))
        .bind(version_id)
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(DocumentVersion::from))
    }
}

#[async_trait]
impl ApiSpecRepository for PgStore {
    async fn insert_api_spec(&self, spec: &ApiSpec) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO api_specs (id, project_id, user_id, name, description, spec_content, \
             source_type, source_code, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(spec.id)
        .bind(spec.project_id)
        .bind(spec.user_id)
        .bind(&spec.name)
        .bind(&spec.description)
        .bind(&spec.spec_content)
        .bind(spec.source_type.as_str())
        .bind(&spec.source_code)
        .bind(spec.created_at)
        .bind(spec.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_api_spec(&self, id: Uuid) -> StoreResult<Option<ApiSpec>> {
        let row: Option<ApiSpecRow> =
            sqlx::query_as(&format!("SELECT {API_SPEC_COLUMNS} FROM api_specs WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        row.map(ApiSpec::try_from).transpose()
    }

    async fn list_api_specs(
        &self,
        filter: ApiSpecFilter,
        page: Page,
    ) -> StoreResult<Paginated<ApiSpec>> {
        const WHERE: &str = "WHERE CASE WHEN $1 THEN project_id IS NULL \
                             ELSE ($2::uuid IS NULL OR project_id = $2) END";
        let (limit, offset) = window(page);
        let total: i64 = sqlx::query_scalar(&format!("SELECT count(*) FROM api_specs {WHERE}"))
            .bind(filter.unassigned)
            .bind(filter.project_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        let rows: Vec<ApiSpecRow> = sqlx::query_as(&format!(
            "SELECT {API_SPEC_COLUMNS} FROM api_specs {WHERE} \
             ORDER BY updated_at DESC, id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(filter.unassigned)
        .bind(filter.project_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        let items = rows
            .into_iter()
            .map(ApiSpec::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(paginated(items, total, page))
    }

    async fn update_api_spec_metadata(&self, spec: &ApiSpec) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE api_specs SET project_id = $2, name = $3, description = $4, \
             updated_at = $5 WHERE id = $1",
        )
        .bind(spec.id)
        .bind(spec.project_id)
        .bind(&spec.name)
        .bind(&spec.description)
        .bind(spec.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::row_missing("api spec", spec.id));
        }
        Ok(())
    }

    async fn delete_api_spec(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM api_specs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl VersionStore<ApiSpec> for PgStore {
    async fn commit_version(&self, commit: Commit<ApiSpec>) -> StoreResult<ApiSpecVersion> {
        let id = commit.entity.id;
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let locked: Option<(i32, Value)> = sqlx::query_as(
            "UPDATE api_specs SET version_seq = version_seq + 1 WHERE id = $1 \
             RETURNING version_seq, spec_content",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;
        let Some((seq, spec_content)) = locked else {
            return Err(StoreError::row_missing("api spec", id));
        };

        let record = commit.record(seq, ApiSpecSnapshot { spec_content });
        sqlx::query(
            "INSERT INTO api_spec_versions (id, api_spec_id, version_number, spec_content, \
             created_by, change_summary, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(record.id)
        .bind(record.entity_id)
        .bind(record.version_number)
        .bind(&record.snapshot.spec_content)
        .bind(&record.created_by)
        .bind(&record.change_summary)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        write_api_spec(&mut *tx, &commit.entity).await?;

        if let Some(floor) = prune_floor(seq, commit.retention) {
            let pruned = sqlx::query(
                "DELETE FROM api_spec_versions WHERE api_spec_id = $1 AND version_number <= $2",
            )
            .bind(id)
            .bind(floor)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();
            if pruned > 0 {
                tracing::debug!(api_spec_id = %id, pruned, "version history pruned");
            }
        }

        tx.commit().await.map_err(db_error)?;
        Ok(record)
    }

    async fn list_versions(&self, entity_id: Uuid) -> StoreResult<Vec<ApiSpecVersion>> {
        let rows: Vec<ApiSpecVersionRow> = sqlx::query_as(&format!(
            "SELECT {API_SPEC_VERSION_COLUMNS} FROM api_spec_versions \
             WHERE api_spec_id = $1 ORDER BY version_number DESC"
        ))
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(ApiSpecVersion::from).collect())
    }

    async fn find_version(
        &self,
        entity_id: Uuid,
        version_id: Uuid,
    ) -> StoreResult<Option<ApiSpecVersion>> {
        let row: Option<ApiSpecVersionRow> = sqlx::query_as(&format!(
            "SELECT {API_SPEC_VERSION_COLUMNS} FROM api_spec_versions \
             WHERE id = $1 AND api_spec_id = $2"
        ))
        .bind(version_id)
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(ApiSpecVersion::from))
    }
}

#[async_trait]
impl ApiKeyRepository for PgStore {
    async fn insert_api_key(&self, key: &ApiKey) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO api_keys (id, user_id, project_id, name, prefix, key_hash, expires_at, \
             is_active, usage_count, last_used_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(key.id)
        .bind(key.user_id)
        .bind(key.project_id)
        .bind(&key.name)
        .bind(&key.prefix)
        .bind(&key.key_hash)
        .bind(key.expires_at)
        .bind(key.is_active)
        .bind(key.usage_count)
        .bind(key.last_used_at)
        .bind(key.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_api_key(&self, id: Uuid) -> StoreResult<Option<ApiKey>> {
        let row: Option<ApiKeyRow> =
            sqlx::query_as(&format!("SELECT {API_KEY_COLUMNS} FROM api_keys WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(ApiKey::from))
    }

    async fn find_api_key_by_prefix(&self, prefix: &str) -> StoreResult<Option<ApiKey>> {
        let row: Option<ApiKeyRow> =
            sqlx::query_as(&format!("SELECT {API_KEY_COLUMNS} FROM api_keys WHERE prefix = $1"))
                .bind(prefix)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(ApiKey::from))
    }

    async fn list_api_keys(&self, user_id: Uuid, page: Page) -> StoreResult<Paginated<ApiKey>> {
        let (limit, offset) = window(page);
        let total: i64 = sqlx::query_scalar("SELECT count(*) FROM api_keys WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        let rows: Vec<ApiKeyRow> = sqlx::query_as(&format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(paginated(
            rows.into_iter().map(ApiKey::from).collect(),
            total,
            page,
        ))
    }

    async fn update_api_key(&self, key: &ApiKey) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE api_keys SET name = $2, expires_at = $3, is_active = $4 WHERE id = $1",
        )
        .bind(key.id)
        .bind(&key.name)
        .bind(key.expires_at)
        .bind(key.is_active)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::row_missing("api key", key.id));
        }
        Ok(())
    }

    async fn delete_api_key(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_usage(&self, entry: &UsageLogEntry) -> StoreResult<Option<UsageSnapshot>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let bumped: Option<(Uuid, i64)> = sqlx::query_as(
            "UPDATE api_keys SET usage_count = usage_count + 1, last_used_at = $2 \
             WHERE id = $1 RETURNING user_id, usage_count",
        )
        .bind(entry.api_key_id)
        .bind(entry.used_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;
        let Some((owner_id, usage_count)) = bumped else {
            return Ok(None);
        };
        sqlx::query(
            "INSERT INTO api_key_usage (id, api_key_id, used_at, method, endpoint, ip_address) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.id)
        .bind(entry.api_key_id)
        .bind(entry.used_at)
        .bind(&entry.method)
        .bind(&entry.endpoint)
        .bind(&entry.ip_address)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        Ok(Some(UsageSnapshot {
            owner_id,
            usage_count,
            last_used_at: entry.used_at,
        }))
    }

    async fn recent_usage(&self, key_id: Uuid, limit: u32) -> StoreResult<Vec<UsageLogEntry>> {
        let rows: Vec<UsageRow> = sqlx::query_as(
            "SELECT id, api_key_id, used_at, method, endpoint, ip_address FROM api_key_usage \
             WHERE api_key_id = $1 ORDER BY used_at DESC, id DESC LIMIT $2",
        )
        .bind(key_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(UsageLogEntry::from).collect())
    }
}

#[async_trait]
impl SourceConnectionRepository for PgStore {
    async fn upsert_source_connection(&self, connection: &SourceConnection) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO source_connections (id, user_id, provider, account, access_token, \
             created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (user_id, provider) DO UPDATE SET account = EXCLUDED.account, \
             access_token = EXCLUDED.access_token, updated_at = EXCLUDED.updated_at",
        )
        .bind(connection.id)
        .bind(connection.user_id)
        .bind(connection.provider.as_str())
        .bind(&connection.account)
        .bind(&connection.access_token)
        .bind(connection.created_at)
        .bind(connection.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn find_source_connection(
        &self,
        user_id: Uuid,
        provider: ProviderKind,
    ) -> StoreResult<Option<SourceConnection>> {
        let row: Option<ConnectionRow> = sqlx::query_as(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM source_connections \
             WHERE user_id = $1 AND provider = $2"
        ))
        .bind(user_id)
        .bind(provider.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(SourceConnection::try_from).transpose()
    }

    async fn list_source_connections(&self, user_id: Uuid) -> StoreResult<Vec<SourceConnection>> {
        let rows: Vec<ConnectionRow> = sqlx::query_as(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM source_connections \
             WHERE user_id = $1 ORDER BY provider"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        rows.into_iter().map(SourceConnection::try_from).collect()
    }

    async fn delete_source_connection(
        &self,
        user_id: Uuid,
        provider: ProviderKind,
    ) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM source_connections WHERE user_id = $1 AND provider = $2")
                .bind(user_id)
                .bind(provider.as_str())
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;

    #[test]
    fn prune_floor_keeps_the_window() {
        let four = Retention::Latest(NonZeroUsize::new(4).unwrap());
        assert_eq!(prune_floor(6, four), Some(2));
        assert_eq!(prune_floor(3, four), Some(-1));
        assert_eq!(prune_floor(6, Retention::Unbounded), None);
    }

    #[test]
    fn window_from_page() {
        assert_eq!(window(Page { page: 3, limit: 25 }), (25, 50));
    }

    #[test]
    fn pool_errors_are_connection_errors() {
        assert!(matches!(
            db_error(sqlx::Error::PoolTimedOut),
            StoreError::Connection { .. }
        ));
        assert!(matches!(
            db_error(sqlx::Error::RowNotFound),
            StoreError::Query { .. }
        ));
    }

    #[test]
    fn unknown_provider_is_corrupt() {
        let row = ConnectionRow {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            provider: "gitlab".into(),
            account: "acme".into(),
            access_token: "t".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(
            SourceConnection::try_from(row),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
