use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::history::{synthesize, HistoryEntry};
use super::retention::{EntityKind, Retention, RetentionPolicy};
use crate::error::{CoreError, CoreResult};
use crate::store::{StoreError, VersionStore};

/// An entity whose content-affecting state can be snapshotted and restored.
pub trait Versioned: Clone + Send + Sync + 'static {
    /// The part of the entity captured in a history row.
    type Snapshot: Clone + std::fmt::Debug + Serialize + Send + Sync + 'static;

    const KIND: EntityKind;

    fn id(&self) -> Uuid;
    fn updated_at(&self) -> DateTime<Utc>;
    fn capture(&self) -> Self::Snapshot;
    fn restore(&mut self, snapshot: &Self::Snapshot);
    fn touch(&mut self, at: DateTime<Utc>);
}

/// An immutable history row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord<S> {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub version_number: i32,
    #[serde(flatten)]
    pub snapshot: S,
    #[serde(rename = "created_by_username")]
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One atomic unit handed to the store: lock the live row, allocate the next
/// version number, insert a snapshot of the locked row under it, write
/// `entity` as the new live row, then prune history down to `retention`.
///
/// The snapshot is taken from the row as stored at commit time, never from
/// the caller's earlier read, so a concurrent writer's state is kept.
pub struct Commit<E: Versioned> {
    pub entity: E,
    pub author: String,
    pub change_summary: Option<String>,
    pub retention: Retention,
    pub at: DateTime<Utc>,
}

impl<E: Versioned> Commit<E> {
    /// Build the history row this commit inserts once the store has
    /// allocated `version_number` and captured the live row.
    pub fn record(&self, version_number: i32, snapshot: E::Snapshot) -> VersionRecord<E::Snapshot> {
        VersionRecord {
            id: Uuid::now_v7(),
            entity_id: self.entity.id(),
            version_number,
            snapshot,
            created_by: self.author.clone(),
            change_summary: self.change_summary.clone(),
            created_at: self.at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VersioningEngine {
    policy: RetentionPolicy,
}

impl VersioningEngine {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Snapshot the live state, then replace it with `updated`. `current` is
    /// the caller's read and only fixes the identity; last writer wins, and
    /// whatever it overwrote lands in history.
    ///
    /// The caller must already have authorized the actor as owner.
    pub async fn apply_update<E, S>(
        &self,
        store: &S,
        current: &E,
        mut updated: E,
        author: &str,
        change_summary: Option<String>,
    ) -> CoreResult<(E, VersionRecord<E::Snapshot>)>
    where
        E: Versioned,
        S: VersionStore<E> + ?Sized,
    {
        if updated.id() != current.id() {
            return Err(CoreError::validation(
                "an update cannot change the identity of the entity",
            ));
        }
        let at = Utc::now();
        updated.touch(at);

        let commit = Commit {
            entity: updated.clone(),
            author: author.to_string(),
            change_summary,
            retention: self.policy.for_kind(E::KIND),
            at,
        };
        let record = store
            .commit_version(commit)
            .await
            .map_err(|e| match e {
                StoreError::RowMissing { .. } => CoreError::not_found(E::KIND.as_str(), current.id()),
                other => other.into(),
            })?;

        tracing::info!(
            entity = E::KIND.as_str(),
            entity_id = %current.id(),
            version_number = record.version_number,
            "version snapshot committed"
        );
        Ok((updated, record))
    }

    /// Overwrite the live entity with a stored snapshot. The pre-restore state
    /// is itself committed as a new version first.
    pub async fn restore_version<E, S>(
        &self,
        store: &S,
        current: &E,
        version_id: Uuid,
        author: &str,
    ) -> CoreResult<(E, VersionRecord<E::Snapshot>)>
    where
        E: Versioned,
        S: VersionStore<E> + ?Sized,
    {
        let target = store
            .find_version(current.id(), version_id)
            .await?
            .ok_or_else(|| CoreError::not_found("version", version_id))?;

        let mut restored = current.clone();
        restored.restore(&target.snapshot);
        let summary = format!("Restored version {}", target.version_number);
        let outcome = self
            .apply_update(store, current, restored, author, Some(summary))
            .await?;

        tracing::info!(
            entity = E::KIND.as_str(),
            entity_id = %current.id(),
            restored_from = target.version_number,
            "version restored"
        );
        Ok(outcome)
    }

    /// The live state as a synthetic `current` entry, followed by stored rows
    /// newest first.
    pub async fn list_versions<E, S>(
        &self,
        store: &S,
        current: &E,
    ) -> CoreResult<Vec<HistoryEntry<E::Snapshot>>>
    where
        E: Versioned,
        S: VersionStore<E> + ?Sized,
    {
        let stored = store.list_versions(current.id()).await?;
        Ok(synthesize(current, stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_spec::ApiSpec;
    use crate::document::{Document, DocumentType};
    use crate::store::memory::MemoryStore;
    use crate::store::{ApiSpecRepository, DocumentRepository};
    use serde_json::json;

    fn document(content: &str) -> Document {
        let now = Utc::now();
        Document {
            id: Uuid::now_v7(),
            project_id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            doc_type: DocumentType::Api,
            title: "X".into(),
            description: None,
            author: None,
            version: None,
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn with_content(doc: &Document, content: &str) -> Document {
        let mut next = doc.clone();
        next.content = content.into();
        next
    }

    #[tokio::test]
    async fn version_numbers_are_gapless_and_increasing() {
        let store = MemoryStore::new();
        let engine = VersioningEngine::default();
        let mut doc = document("c0");
        store.insert_document(&doc).await.unwrap();

        for i in 1..=5 {
            let next = with_content(&doc, &format!("c{i}"));
            doc = engine.apply_update(&store, &doc, next, "ada", None).await.unwrap().0;
        }

        let history = engine.list_versions(&store, &doc).await.unwrap();
        let numbers: Vec<i32> = history.iter().filter_map(|e| e.version_number).collect();
        assert_eq!(numbers, vec![5, 4, 3, 2, 1]);
        assert!(history[0].is_current());
        assert_eq!(history[0].snapshot.content, "c5");
        assert_eq!(history[1].snapshot.content, "c4");
        assert_eq!(history[5].snapshot.content, "c0");
    }

    #[tokio::test]
    async fn restore_keeps_both_states_recoverable() {
        let store = MemoryStore::new();
        let engine = VersioningEngine::default();
        let doc = document("C1");
        store.insert_document(&doc).await.unwrap();

        let (doc, v1) = engine
            .apply_update(&store, &doc, with_content(&doc, "C2"), "ada", None)
            .await
            .unwrap();
        let (doc, v2) = engine.restore_version(&store, &doc, v1.id, "ada").await.unwrap();

        assert_eq!(doc.content, "C1");
        assert_eq!(v2.version_number, 2);
        assert_eq!(v2.snapshot.content, "C2");
        assert_eq!(v2.change_summary.as_deref(), Some("Restored version 1"));

        let live = store.find_document(doc.id).await.unwrap().unwrap();
        assert_eq!(live.content, "C1");

        let contents: Vec<String> = engine
            .list_versions(&store, &doc)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.snapshot.content)
            .collect();
        assert_eq!(contents, vec!["C1", "C2", "C1"]);
    }

    #[tokio::test]
    async fn restoring_a_foreign_version_is_not_found() {
        let store = MemoryStore::new();
        let engine = VersioningEngine::default();
        let a = document("a");
        let b = document("b");
        store.insert_document(&a).await.unwrap();
        store.insert_document(&b).await.unwrap();
        let (_, foreign) = engine
            .apply_update(&store, &b, with_content(&b, "b2"), "ada", None)
            .await
            .unwrap();

        let err = engine
            .restore_version(&store, &a, foreign.id, "ada")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "version", .. }));
        let untouched = store.find_document(a.id).await.unwrap().unwrap();
        assert_eq!(untouched.content, "a");
    }

    #[tokio::test]
    async fn writers_racing_from_one_read_lose_nothing() {
        let store = MemoryStore::new();
        let engine = VersioningEngine::default();
        let stale = document("S0");
        store.insert_document(&stale).await.unwrap();

        engine
            .apply_update(&store, &stale, with_content(&stale, "SA"), "ada", None)
            .await
            .unwrap();
        let (_, second) = engine
            .apply_update(&store, &stale, with_content(&stale, "SB"), "bob", None)
            .await
            .unwrap();
        assert_eq!(second.snapshot.content, "SA");

        let live = store.find_document(stale.id).await.unwrap().unwrap();
        let contents: Vec<String> = engine
            .list_versions(&store, &live)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.snapshot.content)
            .collect();
        assert_eq!(contents, vec!["SB", "SA", "S0"]);
    }

    #[tokio::test]
    async fn api_spec_history_is_pruned_to_the_four_latest() {
        let store = MemoryStore::new();
        let engine = VersioningEngine::default();
        let now = Utc::now();
        let mut spec = ApiSpec {
            id: Uuid::now_v7(),
            project_id: None,
            user_id: Uuid::now_v7(),
            name: "pets".into(),
            description: None,
            spec_content: json!({ "rev": 0 }),
            source_type: Default::default(),
            source_code: None,
            created_at: now,
            updated_at: now,
        };
        store.insert_api_spec(&spec).await.unwrap();

        for rev in 1..=7 {
            let mut next = spec.clone();
            next.spec_content = json!({ "rev": rev });
            spec = engine.apply_update(&store, &spec, next, "ada", None).await.unwrap().0;
        }

        let stored = VersionStore::<ApiSpec>::list_versions(&store, spec.id).await.unwrap();
        let numbers: Vec<i32> = stored.iter().map(|r| r.version_number).collect();
        assert_eq!(numbers, vec![7, 6, 5, 4]);
        let revs: Vec<i64> = stored
            .iter()
            .map(|r| r.snapshot.spec_content["rev"].as_i64().unwrap())
            .collect();
        assert_eq!(revs, vec![6, 5, 4, 3]);

        let mut next = spec.clone();
        next.spec_content = json!({ "rev": 8 });
        let (_, record) = engine.apply_update(&store, &spec, next, "ada", None).await.unwrap();
        assert_eq!(record.version_number, 8, "numbers are never reused after pruning");
    }
}
