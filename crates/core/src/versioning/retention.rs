use std::num::NonZeroUsize;

/// The versioned entity families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Document,
    ApiSpec,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Document => "document",
            EntityKind::ApiSpec => "api_spec",
        }
    }
}

/// How many history rows a single entity keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    Unbounded,
    /// Keep only the `n` highest version numbers.
    Latest(NonZeroUsize),
}

impl Retention {
    /// `0` means unbounded.
    pub fn from_limit(limit: usize) -> Self {
        NonZeroUsize::new(limit).map_or(Retention::Unbounded, Retention::Latest)
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            Retention::Unbounded => None,
            Retention::Latest(n) => Some(n.get()),
        }
    }

    /// Version numbers that fall outside the retained window, oldest first.
    pub fn prune_candidates(&self, version_numbers: &[i32]) -> Vec<i32> {
        let Some(limit) = self.limit() else {
            return Vec::new();
        };
        let mut sorted = version_numbers.to_vec();
        sorted.sort_unstable();
        let excess = sorted.len().saturating_sub(limit);
        sorted.truncate(excess);
        sorted
    }
}

/// Retention per entity family. Document history is unbounded and API spec
/// history keeps four rows unless configured otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub documents: Retention,
    pub api_specs: Retention,
}

impl RetentionPolicy {
    pub fn for_kind(&self, kind: EntityKind) -> Retention {
        match kind {
            EntityKind::Document => self.documents,
            EntityKind::ApiSpec => self.api_specs,
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            documents: Retention::Unbounded,
            api_specs: Retention::from_limit(4),
        }
    }
}
