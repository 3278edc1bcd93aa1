//! Version references as they appear in request paths.
//!
//! - Live state: `current` (alias `actual`)
//! - Stored snapshot: `{uuid}`

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

const CURRENT: &str = "current";
const CURRENT_ALIAS: &str = "actual";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRef {
    Current,
    Stored(Uuid),
}

#[derive(Debug, thiserror::Error)]
#[error("invalid version reference {0:?}: expected \"current\" or a version id")]
pub struct VersionRefError(String);

impl FromStr for VersionRef {
    type Err = VersionRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(CURRENT) || s.eq_ignore_ascii_case(CURRENT_ALIAS) {
            return Ok(VersionRef::Current);
        }
        Uuid::parse_str(s)
            .map(VersionRef::Stored)
            .map_err(|_| VersionRefError(s.to_string()))
    }
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRef::Current => f.write_str(CURRENT),
            VersionRef::Stored(id) => write!(f, "{id}"),
        }
    }
}
