use chrono::Utc;
use uuid::Uuid;

use super::model::{
    Document, DocumentDiff, DocumentFilter, DocumentHistoryEntry, DocumentPatch, NewDocument,
};
use crate::auth::Principal;
use crate::diff;
use crate::error::{CoreError, CoreResult};
use crate::pagination::{Page, Paginated};
use crate::shelf::Shelf;
use crate::validate;
use crate::versioning::{predecessor_of, VersionRef};

impl Shelf {
    pub async fn create_document(
        &self,
        principal: &Principal,
        input: NewDocument,
    ) -> CoreResult<Document> {
        self.owned_project(principal, input.project_id).await?;

        let now = Utc::now();
        let document = Document {
            id: Uuid::now_v7(),
            project_id: input.project_id,
            user_id: principal.user_id,
            doc_type: input.doc_type,
            title: validate::required_text("title", &input.title)?,
            description: validate::optional_text(input.description),
            author: validate::optional_text(input.author),
            version: validate::optional_text(input.version),
            content: input.content,
            created_at: now,
            updated_at: now,
        };
        self.store().insert_document(&document).await?;
        tracing::info!(document_id = %document.id, project_id = %document.project_id, "document created");
        Ok(document)
    }

    pub async fn list_documents(
        &self,
        principal: &Principal,
        mut filter: DocumentFilter,
        page: Page,
    ) -> CoreResult<Paginated<Document>> {
        if let Some(pinned) = principal.pinned_project() {
            if filter.project_id.is_some_and(|p| p != pinned) {
                return Ok(page.slice(Vec::new()));
            }
            filter.project_id = Some(pinned);
        }
        Ok(self.store().list_documents(filter, page).await?)
    }

    pub async fn get_document(&self, principal: &Principal, id: Uuid) -> CoreResult<Document> {
        let document = self
            .store()
            .find_document(id)
            .await?
            .ok_or_else(|| CoreError::not_found("document", id))?;
        principal.ensure_project(Some(document.project_id))?;
        Ok(document)
    }

    async fn owned_document(&self, principal: &Principal, id: Uuid) -> CoreResult<Document> {
        let document = self.get_document(principal, id).await?;
        principal.ensure_owner(document.user_id, "document")?;
        Ok(document)
    }

    /// Title or content changes go through the versioning engine; the other
    /// fields are updated in place.
    pub async fn update_document(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: DocumentPatch,
    ) -> CoreResult<Document> {
        let current = self.owned_document(principal, id).await?;
        let content_affecting = patch.is_content_affecting(&current);

        let mut updated = current.clone();
        if let Some(doc_type) = patch.doc_type {
            updated.doc_type = doc_type;
        }
        if let Some(title) = patch.title {
            updated.title = validate::required_text("title", &title)?;
        }
        if patch.description.is_some() {
            updated.description = validate::optional_text(patch.description);
        }
        if patch.author.is_some() {
            updated.author = validate::optional_text(patch.author);
        }
        if patch.version.is_some() {
            updated.version = validate::optional_text(patch.version);
        }
        if let Some(content) = patch.content {
            updated.content = content;
        }

        if content_affecting {
            let (updated, _) = self
                .engine()
                .apply_update(self.store(), &current, updated, &principal.username, None)
                .await?;
            return Ok(updated);
        }

        updated.updated_at = Utc::now();
        self.store().update_document_metadata(&updated).await?;
        self.store()
            .find_document(id)
            .await?
            .ok_or_else(|| CoreError::not_found("document", id))
    }

    pub async fn delete_document(&self, principal: &Principal, id: Uuid) -> CoreResult<()> {
        self.owned_document(principal, id).await?;
        if !self.store().delete_document(id).await? {
            return Err(CoreError::not_found("document", id));
        }
        tracing::info!(document_id = %id, "document deleted");
        Ok(())
    }

    pub async fn list_document_versions(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> CoreResult<Vec<DocumentHistoryEntry>> {
        let document = self.get_document(principal, id).await?;
        self.engine().list_versions(self.store(), &document).await
    }

    pub async fn restore_document_version(
        &self,
        principal: &Principal,
        id: Uuid,
        version_id: Uuid,
    ) -> CoreResult<Document> {
        let current = self.owned_document(principal, id).await?;
        let (restored, _) = self
            .engine()
            .restore_version(self.store(), &current, version_id, &principal.username)
            .await?;
        Ok(restored)
    }

    /// Diff one history entry against the entry just below it. The oldest
    /// entry is compared with an empty document.
    pub async fn document_version_diff(
        &self,
        principal: &Principal,
        id: Uuid,
        reference: VersionRef,
    ) -> CoreResult<DocumentDiff> {
        let history = self.list_document_versions(principal, id).await?;
        let (entry, previous) = predecessor_of(&history, reference)
            .ok_or_else(|| CoreError::not_found("version", reference))?;

        let old = previous.map_or("", |p| p.snapshot.content.as_str());
        let segments = diff::diff_words(old, &entry.snapshot.content);
        Ok(DocumentDiff {
            label: entry.label.clone(),
            compared_to: previous.map(|p| p.label.clone()),
            stats: diff::stats(&segments),
            segments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{Segment, SegmentKind};
    use crate::document::DocumentType;
    use crate::shelf::tests::{fixture, Fixture};

    async fn document(f: &Fixture, content: &str) -> Document {
        let env = f.environment("Prod").await;
        let project = f.project(&env, "PRY").await;
        f.shelf
            .create_document(
                &f.owner,
                NewDocument {
                    project_id: project.id,
                    doc_type: DocumentType::Api,
                    title: "X".into(),
                    description: None,
                    author: None,
                    version: None,
                    content: content.into(),
                },
            )
            .await
            .unwrap()
    }

    fn content_patch(content: &str) -> DocumentPatch {
        DocumentPatch {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn edit_then_list_then_diff() {
        let f = fixture().await;
        let doc = document(&f, "hello").await;

        f.shelf
            .update_document(&f.owner, doc.id, content_patch("hello world"))
            .await
            .unwrap();

        let history = f.shelf.list_document_versions(&f.owner, doc.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].label, "current");
        assert_eq!(history[0].snapshot.content, "hello world");
        assert_eq!(history[1].version_number, Some(1));
        assert_eq!(history[1].snapshot.content, "hello");
        assert_eq!(history[1].created_by_username.as_deref(), Some("ada"));

        let diff = f
            .shelf
            .document_version_diff(&f.owner, doc.id, VersionRef::Current)
            .await
            .unwrap();
        assert_eq!(diff.compared_to.as_deref(), Some("v1"));
        assert_eq!(
            diff.segments,
            vec![
                Segment::new(SegmentKind::Unchanged, "hello"),
                Segment::new(SegmentKind::Added, " world"),
            ]
        );
    }

    #[tokio::test]
    async fn oldest_entry_diffs_against_nothing() {
        let f = fixture().await;
        let doc = document(&f, "first draft").await;
        f.shelf
            .update_document(&f.owner, doc.id, content_patch("second"))
            .await
            .unwrap();
        let history = f.shelf.list_document_versions(&f.owner, doc.id).await.unwrap();
        let oldest = history[1].version_id.unwrap();

        let diff = f
            .shelf
            .document_version_diff(&f.owner, doc.id, VersionRef::Stored(oldest))
            .await
            .unwrap();
        assert_eq!(diff.compared_to, None);
        assert_eq!(diff.segments, vec![Segment::new(SegmentKind::Added, "first draft")]);
    }

    #[tokio::test]
    async fn metadata_only_updates_write_no_version() {
        let f = fixture().await;
        let doc = document(&f, "body").await;
        let updated = f
            .shelf
            .update_document(
                &f.owner,
                doc.id,
                DocumentPatch {
                    author: Some("Ada".into()),
                    content: Some("body".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.author.as_deref(), Some("Ada"));
        let history = f.shelf.list_document_versions(&f.owner, doc.id).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn restore_brings_back_the_old_content() {
        let f = fixture().await;
        let doc = document(&f, "C1").await;
        f.shelf
            .update_document(&f.owner, doc.id, content_patch("C2"))
            .await
            .unwrap();
        let history = f.shelf.list_document_versions(&f.owner, doc.id).await.unwrap();
        let v1 = history[1].version_id.unwrap();

        let restored = f
            .shelf
            .restore_document_version(&f.owner, doc.id, v1)
            .await
            .unwrap();
        assert_eq!(restored.content, "C1");
        let contents: Vec<_> = f
            .shelf
            .list_document_versions(&f.owner, doc.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.snapshot.content)
            .collect();
        assert_eq!(contents, vec!["C1", "C2", "C1"]);
    }

    #[tokio::test]
    async fn only_the_owner_writes_but_anyone_reads() {
        let f = fixture().await;
        let doc = document(&f, "mine").await;

        assert!(f.shelf.get_document(&f.stranger, doc.id).await.is_ok());
        let err = f
            .shelf
            .update_document(&f.stranger, doc.id, content_patch("theirs"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
        let err = f.shelf.delete_document(&f.stranger, doc.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[tokio::test]
    async fn pinned_keys_only_see_their_project() {
        let f = fixture().await;
        let doc = document(&f, "scoped").await;
        let other = Principal::api_key(f.owner.user_id, "ada", Uuid::now_v7(), Some(Uuid::now_v7()));

        let err = f.shelf.get_document(&other, doc.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
        let page = f
            .shelf
            .list_documents(&other, DocumentFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);

        let mine = Principal::api_key(f.owner.user_id, "ada", Uuid::now_v7(), Some(doc.project_id));
        let page = f
            .shelf
            .list_documents(&mine, DocumentFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let f = fixture().await;
        let doc = document(&f, "x").await;
        let err = f
            .shelf
            .update_document(
                &f.owner,
                doc.id,
                DocumentPatch {
                    title: Some("   ".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
