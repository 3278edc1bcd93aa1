use chrono::Utc;
use uuid::Uuid;

use super::model::{ApiKey, ApiKeyView, IssuedApiKey, NewApiKey, UsageLogEntry, UsageRecord, UsageStats};
use super::secret;
use crate::auth::password::{hash_secret, verify_secret};
use crate::auth::Principal;
use crate::error::{CoreError, CoreResult};
use crate::events::UsageEvent;
use crate::pagination::{Page, Paginated};
use crate::shelf::Shelf;
use crate::validate;

/// How many log entries the usage-stats view carries.
pub const RECENT_USES_LIMIT: u32 = 10;

impl Shelf {
    /// Issue a key. The plaintext is only ever returned from this call.
    pub async fn create_api_key(
        &self,
        principal: &Principal,
        input: NewApiKey,
    ) -> CoreResult<IssuedApiKey> {
        principal.require_session()?;
        let name = validate::required_text("name", &input.name)?;
        if let Some(project_id) = input.project_id {
            self.owned_project(principal, project_id).await?;
        }
        let now = Utc::now();
        if input.expires_at.is_some_and(|at| at <= now) {
            return Err(CoreError::validation("expires_at must be in the future"));
        }

        let generated = secret::generate();
        let key = ApiKey {
            id: Uuid::now_v7(),
            user_id: principal.user_id,
            project_id: input.project_id,
            name,
            prefix: generated.prefix,
            key_hash: hash_secret(&generated.plaintext)?,
            expires_at: input.expires_at,
            is_active: true,
            usage_count: 0,
            last_used_at: None,
            created_at: now,
        };
        self.store().insert_api_key(&key).await?;
        tracing::info!(api_key_id = %key.id, prefix = %key.prefix, "api key issued");

        Ok(IssuedApiKey {
            api_key: key.view(now),
            key: generated.plaintext,
        })
    }

    pub async fn list_api_keys(
        &self,
        principal: &Principal,
        page: Page,
    ) -> CoreResult<Paginated<ApiKeyView>> {
        principal.require_session()?;
        let now = Utc::now();
        let keys = self.store().list_api_keys(principal.user_id, page).await?;
        Ok(keys.map(|key| key.view(now)))
    }

    pub async fn get_api_key(&self, principal: &Principal, id: Uuid) -> CoreResult<ApiKey> {
        principal.require_session()?;
        let key = self
            .store()
            .find_api_key(id)
            .await?
            .ok_or_else(|| CoreError::not_found("api key", id))?;
        principal.ensure_owner(key.user_id, "api key")?;
        Ok(key)
    }

    /// Immediate and irreversible; usage history is kept.
    pub async fn revoke_api_key(&self, principal: &Principal, id: Uuid) -> CoreResult<ApiKeyView> {
        let mut key = self.get_api_key(principal, id).await?;
        if key.is_active {
            key.is_active = false;
            self.store().update_api_key(&key).await?;
            tracing::info!(api_key_id = %id, "api key revoked");
        }
        Ok(key.view(Utc::now()))
    }

    /// Only revoked or expired keys may be deleted.
    pub async fn delete_api_key(&self, principal: &Principal, id: Uuid) -> CoreResult<()> {
        let key = self.get_api_key(principal, id).await?;
        if key.is_usable(Utc::now()) {
            return Err(CoreError::PreconditionFailed(
                "api key is still active; revoke it before deleting".into(),
            ));
        }
        if !self.store().delete_api_key(id).await? {
            return Err(CoreError::not_found("api key", id));
        }
        tracing::info!(api_key_id = %id, "api key deleted");
        Ok(())
    }

    pub async fn api_key_usage_stats(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> CoreResult<UsageStats> {
        let key = self.get_api_key(principal, id).await?;
        let recent_uses = self.store().recent_usage(id, RECENT_USES_LIMIT).await?;
        Ok(UsageStats {
            api_key_id: key.id,
            usage_count: key.usage_count,
            last_used_at: key.last_used_at,
            recent_uses,
        })
    }

    /// Resolve a presented plaintext key to the principal it acts for.
    pub async fn authenticate_api_key(&self, plaintext: &str) -> CoreResult<Principal> {
        let invalid = || CoreError::Unauthorized("invalid api key".into());
        let prefix = secret::prefix_of(plaintext.trim()).ok_or_else(invalid)?;
        let key = self
            .store()
            .find_api_key_by_prefix(prefix)
            .await?
            .ok_or_else(invalid)?;
        if !verify_secret(plaintext.trim(), &key.key_hash) {
            return Err(invalid());
        }
        if !key.is_active {
            return Err(CoreError::Unauthorized("api key has been revoked".into()));
        }
        if key.is_expired(Utc::now()) {
            return Err(CoreError::Unauthorized("api key has expired".into()));
        }
        let user = self
            .store()
            .find_user(key.user_id)
            .await?
            .ok_or_else(invalid)?;
        Ok(Principal::api_key(user.id, user.username, key.id, key.project_id))
    }

    /// Count one successful use, append it to the log, then tell subscribers.
    /// Returns `None` if the key disappeared in the meantime.
    pub async fn record_api_key_usage(
        &self,
        key_id: Uuid,
        record: UsageRecord,
    ) -> CoreResult<Option<UsageEvent>> {
        let entry = UsageLogEntry {
            id: Uuid::now_v7(),
            api_key_id: key_id,
            used_at: Utc::now(),
            method: record.method,
            endpoint: record.endpoint,
            ip_address: record.ip_address,
        };
        let Some(snapshot) = self.store().record_usage(&entry).await? else {
            return Ok(None);
        };

        let event = UsageEvent {
            key_id,
            owner_id: snapshot.owner_id,
            usage_count: snapshot.usage_count,
            last_used_at: snapshot.last_used_at,
        };
        self.bus().publish_usage(event.clone());
        Ok(Some(event))
    }
}
