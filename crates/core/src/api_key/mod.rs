//! API keys: issuance, the revoke/delete lifecycle, authentication and
//! usage tracking.

mod model;
pub mod secret;
mod service;

pub use model::{
    ApiKey, ApiKeyView, IssuedApiKey, KeyStatus, NewApiKey, UsageLogEntry, UsageRecord,
    UsageSnapshot, UsageStats,
};
pub use service::RECENT_USES_LIMIT;
