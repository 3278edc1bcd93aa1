use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diff::{DiffStats, Segment};
use crate::versioning::{EntityKind, HistoryEntry, VersionRecord, Versioned};

/// Document categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Api,
    Usuario,
    Tecnica,
    Procesos,
    Proyecto,
    Requisitos,
}

impl DocumentType {
    pub const ALL: [DocumentType; 6] = [
        DocumentType::Api,
        DocumentType::Usuario,
        DocumentType::Tecnica,
        DocumentType::Procesos,
        DocumentType::Proyecto,
        DocumentType::Requisitos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Api => "api",
            DocumentType::Usuario => "usuario",
            DocumentType::Tecnica => "tecnica",
            DocumentType::Procesos => "procesos",
            DocumentType::Proyecto => "proyecto",
            DocumentType::Requisitos => "requisitos",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown document type {s:?}"))
    }
}

/// A Markdown document. Only its owner may change it; any authenticated
/// caller may read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    /// Free-text release label, unrelated to the history counter.
    pub version: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The content-affecting fields captured in a history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub title: String,
    pub content: String,
}

pub type DocumentVersion = VersionRecord<DocumentSnapshot>;
pub type DocumentHistoryEntry = HistoryEntry<DocumentSnapshot>;

impl Versioned for Document {
    type Snapshot = DocumentSnapshot;

    const KIND: EntityKind = EntityKind::Document;

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn capture(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }

    fn restore(&mut self, snapshot: &DocumentSnapshot) {
        self.title = snapshot.title.clone();
        self.content = snapshot.content.clone();
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDocument {
    pub project_id: Uuid,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentPatch {
    #[serde(rename = "type")]
    pub doc_type: Option<DocumentType>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub version: Option<String>,
    pub content: Option<String>,
}

impl DocumentPatch {
    /// Whether applying the patch would change the title or the content.
    pub fn is_content_affecting(&self, document: &Document) -> bool {
        let title_changes = self
            .title
            .as_deref()
            .is_some_and(|t| t.trim() != document.title);
        let content_changes = self
            .content
            .as_deref()
            .is_some_and(|c| c != document.content);
        title_changes || content_changes
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DocumentFilter {
    pub project_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub doc_type: Option<DocumentType>,
}

/// A history entry compared against its immediate predecessor.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentDiff {
    pub label: String,
    pub compared_to: Option<String>,
    pub segments: Vec<Segment>,
    pub stats: DiffStats,
}
