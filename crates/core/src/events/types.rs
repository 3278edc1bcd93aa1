use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events pushed to connected client sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubEvent {
    Welcome,
    ApiKeyUsageUpdated(UsageEvent),
    /// Sent when a subscriber fell behind and missed events; clients should
    /// re-fetch authoritative state.
    Reconnect,
}

/// Summary of an API key after a recorded use. A latency hint only; the
/// store stays the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    pub key_id: Uuid,
    /// Routing only, never sent to clients.
    #[serde(skip)]
    pub owner_id: Uuid,
    pub usage_count: i64,
    pub last_used_at: DateTime<Utc>,
}

/// Subscription topics. A usage event goes to the key's own topic and to its
/// owner's topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    ApiKey(Uuid),
    Owner(Uuid),
}

impl UsageEvent {
    pub fn topics(&self) -> [Topic; 2] {
        [Topic::ApiKey(self.key_id), Topic::Owner(self.owner_id)]
    }
}
