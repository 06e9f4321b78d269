use engine_logging::engine_info;
use follow_core::{resolve, RelationSet, TargetList};

use crate::{PersistError, RecordStore};

/// Target selection that records its result before handing it out.
pub struct SetResolver<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> SetResolver<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// `following - whitelist`, minus `followers` when given. The list is
    /// persisted so an interrupted run can skip the harvest.
    pub fn resolve(
        &self,
        following: &RelationSet,
        whitelist: &RelationSet,
        followers: Option<&RelationSet>,
    ) -> Result<TargetList, PersistError> {
        let targets = resolve(following, whitelist, followers);
        engine_info!(
            "Resolved {} target(s) from {} followed, {} whitelisted{}",
            targets.len(),
            following.len(),
            whitelist.len(),
            followers
                .map(|f| format!(", {} followers", f.len()))
                .unwrap_or_default()
        );
        self.store.save_targets(&targets)?;
        Ok(targets)
    }
}
