//! Bevy plugin for grammar_growth: runs SOSMC growth jobs a burst per frame and
//! reports their outcome through entity events and messages.
#![forbid(unsafe_code)]

use std::marker::PhantomData;
use std::sync::{Mutex, PoisonError};

#[cfg(feature = "ron")]
pub use assets::{GrowthSettingsAsset, GrowthSettingsAssetLoader};
use bevy::prelude::*;
pub use events::{ChannelSink, GrowthBus, GrowthMessage};
use grammar_growth::prelude::{Burst, CancelHandle, GrowthOutcome, SosmcRun, TaskStats};
use grammar_growth::task::Task as GrowthTask;

#[cfg(feature = "ron")]
mod assets;
mod events;

/// Convenient re-exports for common types. Import with `use bevy_grammar_growth::prelude::*;`.
pub mod prelude {
    pub use grammar_growth::prelude::*;

    #[cfg(feature = "ron")]
    pub use crate::assets::{GrowthSettingsAsset, GrowthSettingsAssetLoader};
    pub use crate::events::{ChannelSink, GrowthBus, GrowthMessage};
    pub use crate::{
        CancelGrowth, GrammarGrowthPlugin, GrowthCancel, GrowthFailed, GrowthFinished, GrowthJob,
        GrowthNode, GrowthRequest, GrowthSystems,
    };
}

/// Node types a plugin instance can grow.
pub trait GrowthNode: Clone + Send + Sync + 'static {}

impl<N: Clone + Send + Sync + 'static> GrowthNode for N {}

/// Bevy plugin running growth jobs for node type `N`.
///
/// Add one instance per node type. Shared resources, messages and assets are
/// only registered once.
pub struct GrammarGrowthPlugin<N> {
    _marker: PhantomData<fn() -> N>,
}

impl<N> Default for GrammarGrowthPlugin<N> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<N: GrowthNode> Plugin for GrammarGrowthPlugin<N> {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<GrowthBus>() {
            app.add_message::<GrowthMessage>()
                .init_resource::<GrowthBus>()
                .add_systems(Update, events::drain_growth_messages.after(GrowthSystems))
                .add_observer(cancel_growth_job);
            #[cfg(feature = "ron")]
            app.init_asset::<GrowthSettingsAsset>()
                .init_asset_loader::<GrowthSettingsAssetLoader>();
        }

        app.add_systems(Update, run_growth_jobs::<N>.in_set(GrowthSystems))
            .add_observer(spawn_growth_job::<N>);
    }
}

/// System set containing the per-frame burst systems of every plugin instance.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct GrowthSystems;

/// A request to run a prepared [`SosmcRun`] on an entity.
///
/// The run's events are routed through the [`GrowthBus`]; any sink set on the
/// run beforehand is replaced.
#[derive(EntityEvent)]
pub struct GrowthRequest<N: GrowthNode> {
    /// Entity the job is attached to.
    pub entity: Entity,
    run: Mutex<Option<SosmcRun<N>>>,
}

impl<N: GrowthNode> GrowthRequest<N> {
    pub fn new(entity: Entity, run: SosmcRun<N>) -> Self {
        Self {
            entity,
            run: Mutex::new(Some(run)),
        }
    }
}

/// Component holding a running growth task.
/// This is added to entities with a [`GrowthRequest`] when a job is spawned.
#[derive(Component)]
pub struct GrowthJob<N: GrowthNode> {
    task: Mutex<GrowthTask<SosmcRun<N>>>,
    cancel: CancelHandle,
}

impl<N: GrowthNode> GrowthJob<N> {
    /// Wraps an already built task, e.g. one with its own sinks or callbacks.
    pub fn new(task: GrowthTask<SosmcRun<N>>) -> Self {
        let cancel = task.cancel_handle();
        Self {
            task: Mutex::new(task),
            cancel,
        }
    }

    /// Handle that cancels the job at its next burst.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Task statistics so far.
    pub fn stats(&self) -> TaskStats {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats()
    }

    /// Fraction of generations grown so far.
    pub fn progress(&self) -> f64 {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .computation()
            .progress()
    }
}

/// Cancel handle inserted next to every job spawned from a [`GrowthRequest`],
/// so [`CancelGrowth`] can reach jobs of any node type.
#[derive(Component, Clone, Debug)]
pub struct GrowthCancel(pub CancelHandle);

/// [`EntityEvent`] triggered when a growth job has finished.
#[derive(EntityEvent, Clone)]
pub struct GrowthFinished<N: GrowthNode> {
    /// Entity the job was attached to.
    pub entity: Entity,
    /// Survivor produced by the run.
    pub outcome: GrowthOutcome<N>,
    /// Timing of the task that produced it.
    pub stats: TaskStats,
}

/// [`EntityEvent`] triggered when a growth job failed with an error.
#[derive(EntityEvent, Clone, Debug)]
pub struct GrowthFailed {
    pub entity: Entity,
    pub error: String,
}

/// [`EntityEvent`] cancelling the growth job on an entity.
#[derive(EntityEvent, Clone, Debug)]
pub struct CancelGrowth {
    pub entity: Entity,
}

fn spawn_growth_job<N: GrowthNode>(
    request: On<GrowthRequest<N>>,
    mut commands: Commands,
    bus: Res<GrowthBus>,
) {
    let entity = request.entity;
    let run = request
        .run
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    let Some(run) = run else {
        warn!("GrowthRequest for {:?} was already consumed", entity);
        return;
    };

    let budget = run.config().burst_budget;
    let run = run.with_event_sink(bus.sink_for(entity));
    debug!(
        "Starting growth job on {:?} from rule '{}'",
        entity,
        run.start_rule()
    );
    let job = GrowthJob::new(GrowthTask::new(run, budget));
    let cancel = GrowthCancel(job.cancel_handle());
    commands.entity(entity).insert((job, cancel));
}

fn run_growth_jobs<N: GrowthNode>(
    mut commands: Commands,
    mut jobs: Query<(Entity, &mut GrowthJob<N>)>,
) {
    for (entity, mut job) in jobs.iter_mut() {
        let task = job
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);

        match task.run_burst() {
            Ok(Burst::Pending) => {}
            Ok(Burst::Completed) => {
                let stats = task.stats();
                commands.entity(entity).remove::<(GrowthJob<N>, GrowthCancel)>();
                match task.take_output() {
                    Some(outcome) => {
                        commands.trigger(GrowthFinished {
                            entity,
                            outcome,
                            stats,
                        });
                    }
                    None => warn!("Growth job on {:?} completed without output", entity),
                }
            }
            Ok(Burst::Cancelled) => {
                debug!("Growth job on {:?} cancelled", entity);
                commands.entity(entity).remove::<(GrowthJob<N>, GrowthCancel)>();
            }
            Err(err) => {
                warn!("Growth job on {:?} failed: {}", entity, err);
                commands.entity(entity).remove::<(GrowthJob<N>, GrowthCancel)>();
                commands.trigger(GrowthFailed {
                    entity,
                    error: err.to_string(),
                });
            }
        }
    }
}

fn cancel_growth_job(cancel: On<CancelGrowth>, handles: Query<&GrowthCancel>) {
    match handles.get(cancel.entity) {
        Ok(target) => target.0.cancel(),
        Err(_) => debug!("No growth job to cancel on {:?}", cancel.entity),
    }
}
