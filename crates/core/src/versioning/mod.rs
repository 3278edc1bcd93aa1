//! Non-destructive updates for documents and API specs.
//!
//! Every content-affecting update first snapshots the entity's prior state
//! into a history row, then writes the new live state. Both happen inside a
//! single store commit, so a snapshot is never persisted without its update.

mod engine;
mod history;
mod reference;
mod retention;

pub use engine::{Commit, VersionRecord, Versioned, VersioningEngine};
pub use history::{predecessor_of, synthesize, HistoryEntry, CURRENT_LABEL};
pub use reference::{VersionRef, VersionRefError};
pub use retention::{EntityKind, Retention, RetentionPolicy};
