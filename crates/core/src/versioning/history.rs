use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::engine::{VersionRecord, Versioned};
use super::reference::VersionRef;

pub const CURRENT_LABEL: &str = "current";

/// One row of a version listing. Rank 0 is always the live state.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry<S> {
    pub rank: usize,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_number: Option<i32>,
    #[serde(flatten)]
    pub snapshot: S,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl<S> HistoryEntry<S> {
    pub fn is_current(&self) -> bool {
        self.version_id.is_none()
    }

    pub fn matches(&self, reference: VersionRef) -> bool {
        match reference {
            VersionRef::Current => self.is_current(),
            VersionRef::Stored(id) => self.version_id == Some(id),
        }
    }
}

impl<S> From<(usize, VersionRecord<S>)> for HistoryEntry<S> {
    fn from((rank, record): (usize, VersionRecord<S>)) -> Self {
        Self {
            rank,
            label: format!("v{}", record.version_number),
            version_id: Some(record.id),
            version_number: Some(record.version_number),
            snapshot: record.snapshot,
            created_by_username: Some(record.created_by),
            change_summary: record.change_summary,
            created_at: record.created_at,
        }
    }
}

/// Prepend the live state to the stored rows, ordered newest first.
pub fn synthesize<E: Versioned>(
    current: &E,
    mut stored: Vec<VersionRecord<E::Snapshot>>,
) -> Vec<HistoryEntry<E::Snapshot>> {
    stored.sort_by(|a, b| b.version_number.cmp(&a.version_number));

    let head = HistoryEntry {
        rank: 0,
        label: CURRENT_LABEL.to_string(),
        version_id: None,
        version_number: None,
        snapshot: current.capture(),
        created_by_username: None,
        change_summary: None,
        created_at: current.updated_at(),
    };
    std::iter::once(head)
        .chain(
            stored
                .into_iter()
                .enumerate()
                .map(|(i, record)| HistoryEntry::from((i + 1, record))),
        )
        .collect()
}

/// Locate `reference` in a listing together with the entry it is compared
/// against: the next older one, if any.
pub fn predecessor_of<S>(
    entries: &[HistoryEntry<S>],
    reference: VersionRef,
) -> Option<(&HistoryEntry<S>, Option<&HistoryEntry<S>>)> {
    let index = entries.iter().position(|e| e.matches(reference))?;
    Some((&entries[index], entries.get(index + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rank: usize, id: Option<Uuid>) -> HistoryEntry<String> {
        HistoryEntry {
            rank,
            label: String::new(),
            version_id: id,
            version_number: id.map(|_| rank as i32),
            snapshot: format!("s{rank}"),
            created_by_username: None,
            change_summary: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn predecessor_pairs_with_next_older() {
        let v2 = Uuid::now_v7();
        let v1 = Uuid::now_v7();
        let entries = vec![entry(0, None), entry(1, Some(v2)), entry(2, Some(v1))];

        let (hit, prev) = predecessor_of(&entries, VersionRef::Current).unwrap();
        assert_eq!(hit.snapshot, "s0");
        assert_eq!(prev.unwrap().snapshot, "s1");

        let (hit, prev) = predecessor_of(&entries, VersionRef::Stored(v1)).unwrap();
        assert_eq!(hit.snapshot, "s2");
        assert!(prev.is_none());

        assert!(predecessor_of(&entries, VersionRef::Stored(Uuid::now_v7())).is_none());
    }
}
