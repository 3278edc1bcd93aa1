//! In-process adapter used by tests and by `STORAGE_BACKEND=memory`.
//! Every operation holds one write lock, so multi-step operations are atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    ApiKeyRepository, ApiSpecRepository, DocumentRepository, EnvironmentRepository,
    ProjectRepository, SourceConnectionRepository, Store, StoreError, StoreResult,
    UserRepository, VersionStore,
};
use crate::api_key::{ApiKey, UsageLogEntry, UsageSnapshot};
use crate::api_spec::{ApiSpec, ApiSpecFilter, ApiSpecVersion};
use crate::document::{Document, DocumentFilter, DocumentVersion};
use crate::environment::Environment;
use crate::pagination::{Page, Paginated};
use crate::project::{Project, ProjectFilter};
use crate::source::{ProviderKind, SourceConnection};
use crate::user::User;
use crate::versioning::{Commit, Retention, VersionRecord, Versioned};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    environments: HashMap<Uuid, Environment>,
    projects: HashMap<Uuid, Project>,
    documents: HashMap<Uuid, Document>,
    document_versions: Vec<DocumentVersion>,
    api_specs: HashMap<Uuid, ApiSpec>,
    api_spec_versions: Vec<ApiSpecVersion>,
    version_seq: HashMap<Uuid, i32>,
    api_keys: HashMap<Uuid, ApiKey>,
    usage_log: Vec<UsageLogEntry>,
    connections: HashMap<(Uuid, ProviderKind), SourceConnection>,
}

impl Tables {
    fn next_version(&mut self, entity_id: Uuid) -> i32 {
        let seq = self.version_seq.entry(entity_id).or_insert(0);
        *seq += 1;
        *seq
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_page<T, K: Ord>(mut rows: Vec<T>, key: impl FnMut(&T) -> K, page: Page) -> Paginated<T> {
    rows.sort_by_key(key);
    page.slice(rows)
}

fn prune<S>(rows: &mut Vec<VersionRecord<S>>, entity_id: Uuid, retention: Retention) {
    let numbers: Vec<i32> = rows
        .iter()
        .filter(|r| r.entity_id == entity_id)
        .map(|r| r.version_number)
        .collect();
    let victims = retention.prune_candidates(&numbers);
    if victims.is_empty() {
        return;
    }
    rows.retain(|r| r.entity_id != entity_id || !victims.contains(&r.version_number));
    tracing::debug!(%entity_id, pruned = victims.len(), "version history pruned");
}

fn history<S: Clone>(rows: &[VersionRecord<S>], entity_id: Uuid) -> Vec<VersionRecord<S>> {
    let mut found: Vec<_> = rows
        .iter()
        .filter(|r| r.entity_id == entity_id)
        .cloned()
        .collect();
    found.sort_by(|a, b| b.version_number.cmp(&a.version_number));
    found
}

fn unique(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if t
            .users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(&user.username))
        {
            return Err(unique("users_username_key"));
        }
        t.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }
}

#[async_trait]
impl EnvironmentRepository for MemoryStore {
    async fn insert_environment(&self, environment: &Environment) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        t.environments.insert(environment.id, environment.clone());
        Ok(())
    }

    async fn find_environment(&self, id: Uuid) -> StoreResult<Option<Environment>> {
        Ok(self.tables.read().await.environments.get(&id).cloned())
    }

    async fn list_environments(&self, page: Page) -> StoreResult<Paginated<Environment>> {
        let t = self.tables.read().await;
        let rows = t.environments.values().cloned().collect();
        Ok(sorted_page(rows, |e: &Environment| (e.name.to_lowercase(), e.id), page))
    }

    async fn update_environment(&self, environment: &Environment) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let slot = t
            .environments
            .get_mut(&environment.id)
            .ok_or_else(|| StoreError::row_missing("environment", environment.id))?;
        *slot = environment.clone();
        Ok(())
    }

    async fn count_projects_in(&self, environment_id: Uuid) -> StoreResult<u64> {
        let t = self.tables.read().await;
        Ok(t.projects
            .values()
            .filter(|p| p.environment_id == environment_id)
            .count() as u64)
    }

    async fn delete_environment(&self, id: Uuid) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        if t.projects.values().any(|p| p.environment_id == id) {
            return Err(StoreError::ReferenceViolation {
                constraint: "projects_environment_id_fkey".into(),
            });
        }
        Ok(t.environments.remove(&id).is_some())
    }
}

#[async_trait]
impl ProjectRepository for MemoryStore {
    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if !t.environments.contains_key(&project.environment_id) {
            return Err(StoreError::ReferenceViolation {
                constraint: "projects_environment_id_fkey".into(),
            });
        }
        if t
            .projects
            .values()
            .any(|p| p.code.eq_ignore_ascii_case(&project.code))
        {
            return Err(unique("projects_code_lower_key"));
        }
        t.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        Ok(self.tables.read().await.projects.get(&id).cloned())
    }

    async fn find_project_by_code(&self, code: &str) -> StoreResult<Option<Project>> {
        let t = self.tables.read().await;
        Ok(t.projects
            .values()
            .find(|p| p.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn list_projects(
        &self,
        filter: ProjectFilter,
        page: Page,
    ) -> StoreResult<Paginated<Project>> {
        let t = self.tables.read().await;
        let rows = t
            .projects
            .values()
            .filter(|p| filter.environment_id.map_or(true, |env| p.environment_id == env))
            .cloned()
            .collect();
        Ok(sorted_page(rows, |p: &Project| p.code.to_lowercase(), page))
    }

    async fn update_project(&self, project: &Project) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if t
            .projects
            .values()
            .any(|p| p.id != project.id && p.code.eq_ignore_ascii_case(&project.code))
        {
            return Err(unique("projects_code_lower_key"));
        }
        let slot = t
            .projects
            .get_mut(&project.id)
            .ok_or_else(|| StoreError::row_missing("project", project.id))?;
        *slot = project.clone();
        Ok(())
    }

    async fn delete_project_cascade(&self, id: Uuid) -> StoreResult<bool> {
        let mut guard = self.tables.write().await;
        let t = &mut *guard;
        if t.projects.remove(&id).is_none() {
            return Ok(false);
        }
        let doomed: Vec<Uuid> = t
            .documents
            .values()
            .filter(|d| d.project_id == id)
            .map(|d| d.id)
            .collect();
        for doc_id in &doomed {
            t.documents.remove(doc_id);
            t.version_seq.remove(doc_id);
        }
        t.document_versions
            .retain(|v| !doomed.contains(&v.entity_id));
        for spec in t.api_specs.values_mut() {
            if spec.project_id == Some(id) {
                spec.project_id = None;
            }
        }
        let keys: Vec<Uuid> = t
            .api_keys
            .values()
            .filter(|k| k.project_id == Some(id))
            .map(|k| k.id)
            .collect();
        for key_id in &keys {
            t.api_keys.remove(key_id);
        }
        t.usage_log.retain(|u| !keys.contains(&u.api_key_id));
        Ok(true)
    }
}

#[async_trait]
impl DocumentRepository for MemoryStore {
    async fn insert_document(&self, document: &Document) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        t.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn find_document(&self, id: Uuid) -> StoreResult<Option<Document>> {
        Ok(self.tables.read().await.documents.get(&id).cloned())
    }

    async fn list_documents(
        &self,
        filter: DocumentFilter,
        page: Page,
    ) -> StoreResult<Paginated<Document>> {
        let t = self.tables.read().await;
        let rows = t
            .documents
            .values()
            .filter(|d| filter.project_id.map_or(true, |p| d.project_id == p))
            .filter(|d| filter.doc_type.map_or(true, |ty| d.doc_type == ty))
            .cloned()
            .collect();
        Ok(sorted_page(
            rows,
            |d: &Document| std::cmp::Reverse((d.updated_at, d.id)),
            page,
        ))
    }

    async fn update_document_metadata(&self, document: &Document) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let slot = t
            .documents
            .get_mut(&document.id)
            .ok_or_else(|| StoreError::row_missing("document", document.id))?;
        slot.project_id = document.project_id;
        slot.doc_type = document.doc_type;
        slot.description = document.description.clone();
        slot.author = document.author.clone();
        slot.version = document.version.clone();
        slot.updated_at = document.updated_at;
        Ok(())
    }

    async fn delete_document(&self, id: Uuid) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        let removed = t.documents.remove(&id).is_some();
        if removed {
            t.document_versions.retain(|v| v.entity_id != id);
            t.version_seq.remove(&id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl VersionStore<Document> for MemoryStore {
    async fn commit_version(&self, commit: Commit<Document>) -> StoreResult<DocumentVersion> {
        let mut guard = self.tables.write().await;
        let t = &mut *guard;
        let id = commit.entity.id;
        let live = t
            .documents
            .get(&id)
            .map(Versioned::capture)
            .ok_or_else(|| StoreError::row_missing("document", id))?;
        let record = commit.record(t.next_version(id), live);
        t.document_versions.push(record.clone());
        t.documents.insert(id, commit.entity);
        prune(&mut t.document_versions, id, commit.retention);
        Ok(record)
    }

    async fn list_versions(&self, entity_id: Uuid) -> StoreResult<Vec<DocumentVersion>> {
        Ok(history(&self.tables.read().await.document_versions, entity_id))
    }

    async fn find_version(
        &self,
        entity_id: Uuid,
        version_id: Uuid,
    ) -> StoreResult<Option<DocumentVersion>> {
        let t = self.tables.read().await;
        Ok(t.document_versions
            .iter()
            .find(|v| v.id == version_id && v.entity_id == entity_id)
            .cloned())
    }
}

#[async_trait]
impl ApiSpecRepository for MemoryStore {
    async fn insert_api_spec(&self, spec: &ApiSpec) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        t.api_specs.insert(spec.id, spec.clone());
        Ok(())
    }

    async fn find_api_spec(&self, id: Uuid) -> StoreResult<Option<ApiSpec>> {
        Ok(self.tables.read().await.api_specs.get(&id).cloned())
    }

    async fn list_api_specs(
        &self,
        filter: ApiSpecFilter,
        page: Page,
    ) -> StoreResult<Paginated<ApiSpec>> {
        let t = self.tables.read().await;
        let rows = t
            .api_specs
            .values()
            .filter(|s| {
                if filter.unassigned {
                    s.project_id.is_none()
                } else {
                    filter.project_id.map_or(true, |p| s.project_id == Some(p))
                }
            })
            .cloned()
            .collect();
        Ok(sorted_page(
            rows,
            |s: &ApiSpec| std::cmp::Reverse((s.updated_at, s.id)),
            page,
        ))
    }

    async fn update_api_spec_metadata(&self, spec: &ApiSpec) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let slot = t
            .api_specs
            .get_mut(&spec.id)
            .ok_or_else(|| StoreError::row_missing("api spec", spec.id))?;
        slot.project_id = spec.project_id;
        slot.name = spec.name.clone();
        slot.description = spec.description.clone();
        slot.updated_at = spec.updated_at;
        Ok(())
    }

    async fn delete_api_spec(&self, id: Uuid) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        let removed = t.api_specs.remove(&id).is_some();
        if removed {
            t.api_spec_versions.retain(|v| v.entity_id != id);
            t.version_seq.remove(&id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl VersionStore<ApiSpec> for MemoryStore {
    async fn commit_version(&self, commit: Commit<ApiSpec>) -> StoreResult<ApiSpecVersion> {
        let mut guard = self.tables.write().await;
        let t = &mut *guard;
        let id = commit.entity.id;
        let live = t
            .api_specs
            .get(&id)
            .map(Versioned::capture)
            .ok_or_else(|| StoreError::row_missing("api spec", id))?;
        let record = commit.record(t.next_version(id), live);
        t.api_spec_versions.push(record.clone());
        t.api_specs.insert(id, commit.entity);
        prune(&mut t.api_spec_versions, id, commit.retention);
        Ok(record)
    }

    async fn list_versions(&self, entity_id: Uuid) -> StoreResult<Vec<ApiSpecVersion>> {
        Ok(history(&self.tables.read().await.api_spec_versions, entity_id))
    }

    async fn find_version(
        &self,
        entity_id: Uuid,
        version_id: Uuid,
    ) -> StoreResult<Option<ApiSpecVersion>> {
        let t = self.tables.read().await;
        Ok(t.api_spec_versions
            .iter()
            .find(|v| v.id == version_id && v.entity_id == entity_id)
            .cloned())
    }
}

#[async_trait]
impl ApiKeyRepository for MemoryStore {
    async fn insert_api_key(&self, key: &ApiKey) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if t.api_keys.values().any(|k| k.prefix == key.prefix) {
            return Err(unique("api_keys_prefix_key"));
        }
        t.api_keys.insert(key.id, key.clone());
        Ok(())
    }

    async fn find_api_key(&self, id: Uuid) -> StoreResult<Option<ApiKey>> {
        Ok(self.tables.read().await.api_keys.get(&id).cloned())
    }

    async fn find_api_key_by_prefix(&self, prefix: &str) -> StoreResult<Option<ApiKey>> {
        let t = self.tables.read().await;
        Ok(t.api_keys.values().find(|k| k.prefix == prefix).cloned())
    }

    async fn list_api_keys(&self, user_id: Uuid, page: Page) -> StoreResult<Paginated<ApiKey>> {
        let t = self.tables.read().await;
        let rows = t
            .api_keys
            .values()
            .filter(|k| k.user_id == user_id)
            .cloned()
            .collect();
        Ok(sorted_page(
            rows,
            |k: &ApiKey| std::cmp::Reverse((k.created_at, k.id)),
            page,
        ))
    }

    async fn update_api_key(&self, key: &ApiKey) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let slot = t
            .api_keys
            .get_mut(&key.id)
            .ok_or_else(|| StoreError::row_missing("api key", key.id))?;
        slot.name = key.name.clone();
        slot.expires_at = key.expires_at;
        slot.is_active = key.is_active;
        Ok(())
    }

    async fn delete_api_key(&self, id: Uuid) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        let removed = t.api_keys.remove(&id).is_some();
        if removed {
            t.usage_log.retain(|u| u.api_key_id != id);
        }
        Ok(removed)
    }

    async fn record_usage(&self, entry: &UsageLogEntry) -> StoreResult<Option<UsageSnapshot>> {
        let mut guard = self.tables.write().await;
        let t = &mut *guard;
        let Some(key) = t.api_keys.get_mut(&entry.api_key_id) else {
            return Ok(None);
        };
        key.usage_count += 1;
        key.last_used_at = Some(entry.used_at);
        let snapshot = UsageSnapshot {
            owner_id: key.user_id,
            usage_count: key.usage_count,
            last_used_at: entry.used_at,
        };
        t.usage_log.push(entry.clone());
        Ok(Some(snapshot))
    }

    async fn recent_usage(&self, key_id: Uuid, limit: u32) -> StoreResult<Vec<UsageLogEntry>> {
        let t = self.tables.read().await;
        Ok(t.usage_log
            .iter()
            .rev()
            .filter(|u| u.api_key_id == key_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SourceConnectionRepository for MemoryStore {
    async fn upsert_source_connection(&self, connection: &SourceConnection) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        t.connections.insert(
            (connection.user_id, connection.provider),
            connection.clone(),
        );
        Ok(())
    }

    async fn find_source_connection(
        &self,
        user_id: Uuid,
        provider: ProviderKind,
    ) -> StoreResult<Option<SourceConnection>> {
        let t = self.tables.read().await;
        Ok(t.connections.get(&(user_id, provider)).cloned())
    }

    async fn list_source_connections(&self, user_id: Uuid) -> StoreResult<Vec<SourceConnection>> {
        let t = self.tables.read().await;
        let mut rows: Vec<_> = t
            .connections
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.provider.as_str());
        Ok(rows)
    }

    async fn delete_source_connection(
        &self,
        user_id: Uuid,
        provider: ProviderKind,
    ) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        Ok(t.connections.remove(&(user_id, provider)).is_some())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentType;
    use chrono::Utc;

    fn environment() -> Environment {
        Environment {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            name: "Prod".into(),
            description: None,
            color: None,
            created_at: Utc::now(),
        }
    }

    fn project(environment: &Environment, code: &str) -> Project {
        Project {
            id: Uuid::now_v7(),
            user_id: environment.user_id,
            environment_id: environment.id,
            code: code.into(),
            name: code.into(),
            description: None,
            color: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn project_codes_are_unique_ignoring_case() {
        let store = MemoryStore::new();
        let env = environment();
        store.insert_environment(&env).await.unwrap();
        store.insert_project(&project(&env, "PRY")).await.unwrap();

        let err = store.insert_project(&project(&env, "pry")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
        assert!(store.find_project_by_code("Pry").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn environment_with_projects_cannot_be_deleted() {
        let store = MemoryStore::new();
        let env = environment();
        store.insert_environment(&env).await.unwrap();
        let p = project(&env, "A");
        store.insert_project(&p).await.unwrap();

        let err = store.delete_environment(env.id).await.unwrap_err();
        assert!(matches!(err, StoreError::ReferenceViolation { .. }));

        assert!(store.delete_project_cascade(p.id).await.unwrap());
        assert!(store.delete_environment(env.id).await.unwrap());
    }

    #[tokio::test]
    async fn project_cascade_removes_documents_and_detaches_specs() {
        let store = MemoryStore::new();
        let env = environment();
        store.insert_environment(&env).await.unwrap();
        let p = project(&env, "DOCS");
        store.insert_project(&p).await.unwrap();

        let now = Utc::now();
        let doc = Document {
            id: Uuid::now_v7(),
            project_id: p.id,
            user_id: p.user_id,
            doc_type: DocumentType::Tecnica,
            title: "t".into(),
            description: None,
            author: None,
            version: None,
            content: String::new(),
            created_at: now,
            updated_at: now,
        };
        store.insert_document(&doc).await.unwrap();
        let spec = ApiSpec {
            id: Uuid::now_v7(),
            project_id: Some(p.id),
            user_id: p.user_id,
            name: "s".into(),
            description: None,
            spec_content: serde_json::json!({}),
            source_type: Default::default(),
            source_code: None,
            created_at: now,
            updated_at: now,
        };
        store.insert_api_spec(&spec).await.unwrap();

        assert!(store.delete_project_cascade(p.id).await.unwrap());
        assert!(store.find_document(doc.id).await.unwrap().is_none());
        let detached = store.find_api_spec(spec.id).await.unwrap().unwrap();
        assert_eq!(detached.project_id, None);
        assert!(!store.delete_project_cascade(p.id).await.unwrap());
    }

    #[tokio::test]
    async fn commit_on_a_vanished_row_reports_row_missing() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let doc = Document {
            id: Uuid::now_v7(),
            project_id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            doc_type: DocumentType::Api,
            title: "t".into(),
            description: None,
            author: None,
            version: None,
            content: "x".into(),
            created_at: now,
            updated_at: now,
        };
        let commit = Commit {
            entity: doc,
            author: "ada".into(),
            change_summary: None,
            retention: Retention::Unbounded,
            at: now,
        };
        let err = VersionStore::<Document>::commit_version(&store, commit)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RowMissing { .. }));
    }

    fn document(content: &str) -> Document {
        let now = Utc::now();
        Document {
            id: Uuid::now_v7(),
            project_id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            doc_type: DocumentType::Api,
            title: "t".into(),
            description: None,
            author: None,
            version: None,
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn metadata_write_keeps_committed_content() {
        let store = MemoryStore::new();
        let stale = document("v0");
        store.insert_document(&stale).await.unwrap();

        let mut edited = stale.clone();
        edited.content = "v1".into();
        let commit = Commit {
            entity: edited,
            author: "ada".into(),
            change_summary: None,
            retention: Retention::Unbounded,
            at: Utc::now(),
        };
        VersionStore::<Document>::commit_version(&store, commit)
            .await
            .unwrap();

        let mut described = stale.clone();
        described.description = Some("notes".into());
        store.update_document_metadata(&described).await.unwrap();

        let live = store.find_document(stale.id).await.unwrap().unwrap();
        assert_eq!(live.content, "v1");
        assert_eq!(live.description.as_deref(), Some("notes"));
    }

    #[tokio::test]
    async fn revoking_from_a_stale_read_keeps_usage() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let key = ApiKey {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            project_id: None,
            name: "ci".into(),
            prefix: "dsk_00000000".into(),
            key_hash: "hash".into(),
            expires_at: None,
            is_active: true,
            usage_count: 0,
            last_used_at: None,
            created_at: now,
        };
        store.insert_api_key(&key).await.unwrap();

        let used_at = Utc::now();
        let snapshot = store
            .record_usage(&UsageLogEntry {
                id: Uuid::now_v7(),
                api_key_id: key.id,
                used_at,
                method: "GET".into(),
                endpoint: "/documents".into(),
                ip_address: None,
            })
            .await
            .unwrap();
        assert_eq!(snapshot.map(|s| s.usage_count), Some(1));

        let mut revoked = key.clone();
        revoked.is_active = false;
        store.update_api_key(&revoked).await.unwrap();

        let live = store.find_api_key(key.id).await.unwrap().unwrap();
        assert!(!live.is_active);
        assert_eq!(live.usage_count, 1);
        assert_eq!(live.last_used_at, Some(used_at));
    }
}
