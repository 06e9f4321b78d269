use crate::{Identifier, RelationSet};

/// Which accounts a run intends to unfollow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    /// Everyone followed, except the whitelist.
    #[default]
    Everyone,
    /// Only accounts that do not follow back, except the whitelist.
    NonReciprocal,
}

/// Ordered, deduplicated targets for one run, ascending by normalized handle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetList(Vec<Identifier>);

impl TargetList {
    /// Build from any collection; sorts and deduplicates.
    pub fn from_identifiers<I: IntoIterator<Item = Identifier>>(ids: I) -> Self {
        let set: RelationSet = ids.into_iter().collect();
        Self(set.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Identifier> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Identifier] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a TargetList {
    type Item = &'a Identifier;
    type IntoIter = std::slice::Iter<'a, Identifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Compute the targets: `following - whitelist`, additionally minus
/// `followers` when a followers set is supplied.
///
/// Inputs are already normalized by `Identifier`; the `BTreeSet` ordering is
/// the normalized lexicographic order, which makes the output deterministic.
pub fn resolve(
    following: &RelationSet,
    whitelist: &RelationSet,
    followers: Option<&RelationSet>,
) -> TargetList {
    let targets = following
        .iter()
        .filter(|id| !whitelist.contains(*id))
        .filter(|id| followers.is_none_or(|f| !f.contains(*id)))
        .cloned();
    TargetList(targets.collect())
}
