//! Harvest, snapshot and resolve: everything that happens before the first
//! target is touched.
use engine_logging::{engine_info, engine_warn};
use follow_core::{Direction, Identifier, RelationSet, ResolveMode, TargetList};

use crate::{
    EngineError, ListHarvester, ProgressSink, RecordStore, RelationSource, SetResolver, Throttle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrepareOptions {
    pub mode: ResolveMode,
    /// Reuse the persisted target list or snapshots instead of harvesting.
    pub skip_harvest: bool,
}

/// Produce this run's target list, harvesting `handle`'s relations unless
/// `options.skip_harvest` is set.
pub async fn prepare_targets(
    source: &mut dyn RelationSource,
    handle: &Identifier,
    store: &dyn RecordStore,
    harvester: &ListHarvester,
    throttle: &mut Throttle,
    sink: &dyn ProgressSink,
    options: PrepareOptions,
) -> Result<TargetList, EngineError> {
    let whitelist = store.load_whitelist()?;
    engine_info!("Whitelist holds {} handle(s)", whitelist.len());

    if options.skip_harvest {
        return from_snapshots(store, &whitelist, options.mode);
    }

    let following = harvest_and_save(
        source,
        handle,
        Direction::Following,
        store,
        harvester,
        throttle,
        sink,
    )
    .await?;
    let followers = match options.mode {
        ResolveMode::Everyone => None,
        ResolveMode::NonReciprocal => Some(
            harvest_and_save(
                source,
                handle,
                Direction::Followers,
                store,
                harvester,
                throttle,
                sink,
            )
            .await?,
        ),
    };
    Ok(SetResolver::new(store).resolve(&following, &whitelist, followers.as_ref())?)
}

async fn harvest_and_save(
    source: &mut dyn RelationSource,
    handle: &Identifier,
    direction: Direction,
    store: &dyn RecordStore,
    harvester: &ListHarvester,
    throttle: &mut Throttle,
    sink: &dyn ProgressSink,
) -> Result<RelationSet, EngineError> {
    let set = harvester
        .harvest(source, handle, direction, throttle, sink)
        .await?;
    store.save_relation(direction, &set)?;
    Ok(set)
}

fn from_snapshots(
    store: &dyn RecordStore,
    whitelist: &RelationSet,
    mode: ResolveMode,
) -> Result<TargetList, EngineError> {
    if let Some(saved) = store.load_targets()? {
        let kept = saved.iter().filter(|id| !whitelist.contains(*id)).cloned();
        let targets = TargetList::from_identifiers(kept);
        if targets.len() < saved.len() {
            engine_warn!(
                "Dropped {} saved target(s) that are now whitelisted",
                saved.len() - targets.len()
            );
        }
        engine_info!("Loaded {} saved target(s)", targets.len());
        return Ok(targets);
    }

    let following = load_snapshot(store, Direction::Following)?;
    let followers = match mode {
        ResolveMode::Everyone => None,
        ResolveMode::NonReciprocal => Some(load_snapshot(store, Direction::Followers)?),
    };
    Ok(SetResolver::new(store).resolve(&following, whitelist, followers.as_ref())?)
}

fn load_snapshot(store: &dyn RecordStore, direction: Direction) -> Result<RelationSet, EngineError> {
    store
        .load_relation(direction)?
        .ok_or_else(|| EngineError::MissingSnapshot(format!("{direction} snapshot")))
}
