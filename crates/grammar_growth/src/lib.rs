#![forbid(unsafe_code)]
//! grammar_growth: Weighted-grammar growth of branching structures steered by
//! sequential Monte-Carlo resampling.
//!
//! Modules:
//! - structure: append-only node sequences with O(1) forks sharing their prefix
//! - grammar: named rules of weighted productions, wrap-up productions, post-skeleton components
//! - particle: one candidate expansion with its spawn queues, cost and proposal probability
//! - sosmc: population search that resamples particles by cost between generations
//! - task: time-sliced executor for resumable computations
//! - generator: entry points for unguided and SOSMC generation
//! - config, cost, events, selection, error: supporting types
//!
//! For examples and docs, see README and docs.rs.
pub mod config;
pub mod cost;
pub mod error;
pub mod events;
pub mod generator;
pub mod grammar;
pub mod particle;
pub mod selection;
pub mod sosmc;
pub mod structure;
pub mod task;

/// Convenient re-exports for common types. Import with `use grammar_growth::prelude::*;`.
pub mod prelude {
    pub use crate::config::{Schedule, SosmcConfig};
    pub use crate::cost::{AddedNodes, Cost, CostFunction, FnCost, ZeroCost};
    pub use crate::error::{Error, Result};
    pub use crate::events::{
        EventSink, FilterSink, FnSink, GrowthEvent, GrowthEventKind, MultiSink, VecSink,
    };
    pub use crate::generator::Generator;
    pub use crate::grammar::{production, Absent, Grammar, Production};
    pub use crate::particle::{Expansion, Particle, ParticleId, Phase, SpawnPoint};
    pub use crate::sosmc::{GrowthOutcome, SosmcRun, SosmcStage};
    pub use crate::structure::{NodeId, Structure};
    pub use crate::task::{Burst, CancelHandle, Step, Stepwise, Task, TaskState, TaskStats};
}
