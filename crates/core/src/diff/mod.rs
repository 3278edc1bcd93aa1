//! Word-level diff between two text blobs for version previews.
//!
//! Whitespace runs are diff tokens of their own, so reformatting shows up
//! in the output. Concatenating `unchanged` + `removed` segments gives back
//! the old text; `unchanged` + `added` gives back the new text.

use serde::{Deserialize, Serialize};
use similar::{Algorithm, ChangeTag, TextDiff};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Added,
    Removed,
    Unchanged,
}

impl From<ChangeTag> for SegmentKind {
    fn from(tag: ChangeTag) -> Self {
        match tag {
            ChangeTag::Equal => SegmentKind::Unchanged,
            ChangeTag::Delete => SegmentKind::Removed,
            ChangeTag::Insert => SegmentKind::Added,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
}

impl Segment {
    pub fn new(kind: SegmentKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Word counts per segment kind, for the preview header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub added_words: usize,
    pub removed_words: usize,
    pub unchanged_words: usize,
}

/// Align `old` and `new` word by word (Myers) and merge adjacent tokens of
/// the same kind into segments.
pub fn diff_words(old: &str, new: &str) -> Vec<Segment> {
    if old.is_empty() && new.is_empty() {
        return Vec::new();
    }
    if old.is_empty() {
        return vec![Segment::new(SegmentKind::Added, new)];
    }
    if new.is_empty() {
        return vec![Segment::new(SegmentKind::Removed, old)];
    }

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_words(old, new);

    let mut segments: Vec<Segment> = Vec::new();
    for change in diff.iter_all_changes() {
        let kind = SegmentKind::from(change.tag());
        match segments.last_mut() {
            Some(last) if last.kind == kind => last.text.push_str(change.value()),
            _ => segments.push(Segment::new(kind, change.value())),
        }
    }
    segments
}

/// Rebuild the old text from a segment list.
pub fn old_text(segments: &[Segment]) -> String {
    collect(segments, SegmentKind::Removed)
}

/// Rebuild the new text from a segment list.
pub fn new_text(segments: &[Segment]) -> String {
    collect(segments, SegmentKind::Added)
}

fn collect(segments: &[Segment], side: SegmentKind) -> String {
    segments
        .iter()
        .filter(|s| s.kind == SegmentKind::Unchanged || s.kind == side)
        .map(|s| s.text.as_str())
        .collect()
}

pub fn stats(segments: &[Segment]) -> DiffStats {
    segments.iter().fold(DiffStats::default(), |mut acc, s| {
        let words = s.text.split_whitespace().count();
        match s.kind {
            SegmentKind::Added => acc.added_words += words,
            SegmentKind::Removed => acc.removed_words += words,
            SegmentKind::Unchanged => acc.unchanged_words += words,
        }
        acc
    })
}
