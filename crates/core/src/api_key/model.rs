use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::secret;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub user_id: Uuid,
    /// `None` scopes the key to every project of its issuer.
    pub project_id: Option<Uuid>,
    pub name: String,
    pub prefix: String,
    #[serde(skip_serializing, default)]
    pub key_hash: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub usage_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Revoked,
    Expired,
}

impl ApiKey {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Active and not yet expired.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now)
    }

    pub fn status(&self, now: DateTime<Utc>) -> KeyStatus {
        if !self.is_active {
            KeyStatus::Revoked
        } else if self.is_expired(now) {
            KeyStatus::Expired
        } else {
            KeyStatus::Active
        }
    }

    pub fn view(self, now: DateTime<Utc>) -> ApiKeyView {
        ApiKeyView {
            masked_key: secret::mask(&self.prefix),
            status: self.status(now),
            key: self,
        }
    }
}

/// What clients see of a key after creation.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyView {
    #[serde(flatten)]
    pub key: ApiKey,
    pub masked_key: String,
    pub status: KeyStatus,
}

/// Returned once, by the create call. `key` is never retrievable again.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedApiKey {
    #[serde(flatten)]
    pub api_key: ApiKeyView,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewApiKey {
    pub name: String,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLogEntry {
    pub id: Uuid,
    pub api_key_id: Uuid,
    pub used_at: DateTime<Utc>,
    pub method: String,
    pub endpoint: String,
    pub ip_address: Option<String>,
}

/// Request details captured for one authenticated use of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub method: String,
    pub endpoint: String,
    pub ip_address: Option<String>,
}

/// Counters after a use was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub owner_id: Uuid,
    pub usage_count: i64,
    pub last_used_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageStats {
    pub api_key_id: Uuid,
    pub usage_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub recent_uses: Vec<UsageLogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn key(is_active: bool, expires_at: Option<DateTime<Utc>>) -> ApiKey {
        ApiKey {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            project_id: None,
            name: "ci".into(),
            prefix: "dsk_0123abcd".into(),
            key_hash: "hash".into(),
            expires_at,
            is_active,
            usage_count: 0,
            last_used_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn status_follows_lifecycle() {
        let now = Utc::now();
        assert_eq!(key(true, None).status(now), KeyStatus::Active);
        assert_eq!(
            key(true, Some(now + Duration::days(1))).status(now),
            KeyStatus::Active
        );
        assert_eq!(
            key(true, Some(now - Duration::seconds(1))).status(now),
            KeyStatus::Expired
        );
        assert_eq!(key(false, None).status(now), KeyStatus::Revoked);
        assert!(!key(false, None).is_usable(now));
    }

    #[test]
    fn view_never_serializes_the_hash() {
        let value = serde_json::to_value(key(true, None).view(Utc::now())).unwrap();
        assert!(value.get("key_hash").is_none());
        assert_eq!(value["status"], "active");
        assert_eq!(value["masked_key"], "dsk_0123abcd.****************");
    }
}
