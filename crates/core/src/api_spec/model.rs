use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::editor::OperationFields;
use super::openapi::OperationKey;
use crate::versioning::{EntityKind, HistoryEntry, VersionRecord, Versioned};

/// Where a spec's content came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    #[default]
    Json,
    SwaggerComments,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Json => "json",
            SourceType::SwaggerComments => "swagger-comments",
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(SourceType::Json),
            "swagger-comments" => Ok(SourceType::SwaggerComments),
            other => Err(format!("unknown source type {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSpec {
    pub id: Uuid,
    /// `None` places the spec in the "no project" bucket.
    pub project_id: Option<Uuid>,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub spec_content: Value,
    pub source_type: SourceType,
    /// Original source when the spec was extracted from comments.
    pub source_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSpecSnapshot {
    pub spec_content: Value,
}

pub type ApiSpecVersion = VersionRecord<ApiSpecSnapshot>;
pub type ApiSpecHistoryEntry = HistoryEntry<ApiSpecSnapshot>;

impl Versioned for ApiSpec {
    type Snapshot = ApiSpecSnapshot;

    const KIND: EntityKind = EntityKind::ApiSpec;

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn capture(&self) -> ApiSpecSnapshot {
        ApiSpecSnapshot {
            spec_content: self.spec_content.clone(),
        }
    }

    fn restore(&mut self, snapshot: &ApiSpecSnapshot) {
        self.spec_content = snapshot.spec_content.clone();
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewApiSpec {
    #[serde(default)]
    pub project_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub spec_content: Option<Value>,
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default)]
    pub source_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiSpecPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Absent leaves the project untouched, `null` detaches the spec.
    #[serde(default, deserialize_with = "double_option")]
    pub project_id: Option<Option<Uuid>>,
    pub spec_content: Option<Value>,
    pub change_summary: Option<String>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ApiSpecFilter {
    pub project_id: Option<Uuid>,
    /// Only specs without a project.
    #[serde(default)]
    pub unassigned: bool,
}

/// One structural edit requested through the operations endpoints.
#[derive(Debug, Clone)]
pub enum OperationChange {
    Add {
        key: OperationKey,
        fields: OperationFields,
    },
    Edit {
        original: OperationKey,
        updated: OperationKey,
        fields: OperationFields,
    },
    Delete {
        key: OperationKey,
    },
}
