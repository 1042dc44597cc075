//! Event types and sinks for observing growth runs.
//!
//! This module defines [`GrowthEvent`] and a set of sinks and adapters to emit,
//! collect, or forward events while a [`crate::sosmc::SosmcRun`] advances,
//! whether driven step by step through a [`crate::task::Task`] or run to completion.
use crate::cost::Cost;
use crate::particle::ParticleId;

/// Describes events emitted by growth runs.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum GrowthEvent {
    /// Emitted once the initial population exists.
    RunStarted {
        /// Rule every particle starts from.
        start_rule: String,
        /// Number of generations the run will execute.
        generations: usize,
        /// Size of the initial population.
        population: usize,
    },

    /// Emitted after every particle of a generation has grown.
    GenerationGrown {
        /// Zero-based generation index.
        generation: usize,
        /// Population size during this generation.
        population: usize,
        /// Heuristic scale in effect for this generation.
        heuristic_scale: f64,
        /// Lowest `real + heuristic` cost in the population.
        best: Cost,
        /// Mean `real + heuristic` cost of the population.
        mean_total_cost: f64,
    },

    /// Emitted after the population was resampled for the next generation.
    Resampled {
        /// Generation whose weights drove the resampling.
        generation: usize,
        /// Population size before resampling.
        from: usize,
        /// Population size after resampling.
        to: usize,
        /// Number of distinct particles selected at least once.
        distinct_parents: usize,
        /// Effective sample size `(Σw)² / Σw²` of the weights used.
        effective_sample_size: f64,
        /// Whether degenerate weights forced uniform resampling.
        uniform_fallback: bool,
    },

    /// Emitted when the lowest-cost particle has been chosen.
    SurvivorSelected {
        /// Id of the surviving particle.
        particle: ParticleId,
        /// Its cost at selection time.
        cost: Cost,
        /// Number of nodes in its structure at selection time.
        nodes: usize,
    },

    /// Emitted when forced termination and detail growth are done.
    Finalized {
        /// Wrap-up productions applied to close the skeleton.
        wrap_ups: usize,
        /// Post-skeleton growth steps performed.
        detail_growths: usize,
    },

    /// Emitted when the run produced its final structure.
    RunFinished {
        /// Number of nodes in the final structure.
        nodes: usize,
        /// Cost of the survivor.
        cost: Cost,
    },

    /// Non-fatal warning generated during the run.
    Warning {
        /// Context string (e.g. generation index).
        context: String,
        /// Human-readable message.
        message: String,
    },
}

/// Discriminant of [`GrowthEvent`], used to filter what a sink receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrowthEventKind {
    RunStarted,
    GenerationGrown,
    Resampled,
    SurvivorSelected,
    Finalized,
    RunFinished,
    Warning,
}

impl GrowthEvent {
    pub fn kind(&self) -> GrowthEventKind {
        match self {
            GrowthEvent::RunStarted { .. } => GrowthEventKind::RunStarted,
            GrowthEvent::GenerationGrown { .. } => GrowthEventKind::GenerationGrown,
            GrowthEvent::Resampled { .. } => GrowthEventKind::Resampled,
            GrowthEvent::SurvivorSelected { .. } => GrowthEventKind::SurvivorSelected,
            GrowthEvent::Finalized { .. } => GrowthEventKind::Finalized,
            GrowthEvent::RunFinished { .. } => GrowthEventKind::RunFinished,
            GrowthEvent::Warning { .. } => GrowthEventKind::Warning,
        }
    }
}

/// A generic event sink that accepts [`GrowthEvent`]s.
pub trait EventSink {
    fn send(&mut self, event: GrowthEvent);

    /// Whether events of `kind` should be built and sent at all.
    #[inline]
    fn wants(&self, _kind: GrowthEventKind) -> bool {
        true
    }

    fn send_many<I>(&mut self, events: I)
    where
        Self: Sized,
        I: IntoIterator<Item = GrowthEvent>,
    {
        for e in events {
            self.send(e);
        }
    }
}

/// A no-op event sink.
impl EventSink for () {
    #[inline]
    fn send(&mut self, _event: GrowthEvent) {}

    #[inline]
    fn wants(&self, _kind: GrowthEventKind) -> bool {
        false
    }
}

/// An event sink that forwards to a user-provided closure.
pub struct FnSink<F>
where
    F: FnMut(GrowthEvent),
{
    f: F,
}

impl<F> FnSink<F>
where
    F: FnMut(GrowthEvent),
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: FnMut(GrowthEvent),
{
    #[inline]
    fn send(&mut self, event: GrowthEvent) {
        (self.f)(event);
    }
}

/// An event sink that collects all events in a `Vec`.
#[derive(Default)]
pub struct VecSink {
    events: Vec<GrowthEvent>,
}

impl VecSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            events: Vec::with_capacity(cap),
        }
    }

    pub fn into_inner(self) -> Vec<GrowthEvent> {
        self.events
    }

    pub fn as_slice(&self) -> &[GrowthEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for VecSink {
    #[inline]
    fn send(&mut self, event: GrowthEvent) {
        self.events.push(event);
    }
}

/// Fan-out sink that forwards each event to all contained sinks.
pub struct MultiSink<S: EventSink> {
    pub(crate) sinks: Vec<S>,
}

impl<S: EventSink> MultiSink<S> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_sinks(sinks: Vec<S>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: S) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }
}

impl<S: EventSink> Default for MultiSink<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EventSink> EventSink for MultiSink<S> {
    fn send(&mut self, event: GrowthEvent) {
        let kind = event.kind();
        let targets: Vec<usize> = (0..self.sinks.len())
            .filter(|&i| self.sinks[i].wants(kind))
            .collect();
        let Some((&last, rest)) = targets.split_last() else {
            return;
        };
        for &i in rest {
            self.sinks[i].send(event.clone());
        }
        self.sinks[last].send(event);
    }

    fn wants(&self, kind: GrowthEventKind) -> bool {
        self.sinks.iter().any(|s| s.wants(kind))
    }
}

/// Sink wrapper that only forwards the listed event kinds.
pub struct FilterSink<S: EventSink> {
    inner: S,
    kinds: Vec<GrowthEventKind>,
}

impl<S: EventSink> FilterSink<S> {
    pub fn new(inner: S, kinds: impl IntoIterator<Item = GrowthEventKind>) -> Self {
        Self {
            inner,
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: EventSink> EventSink for FilterSink<S> {
    fn send(&mut self, event: GrowthEvent) {
        if self.wants(event.kind()) {
            self.inner.send(event);
        }
    }

    fn wants(&self, kind: GrowthEventKind) -> bool {
        self.kinds.contains(&kind) && self.inner.wants(kind)
    }
}
