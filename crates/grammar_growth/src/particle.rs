//! Generator particles: one candidate expansion of the grammar each.
//!
//! A [`Particle`] owns a [`Structure`], two queues of pending [`SpawnPoint`]s
//! (skeleton and post-skeleton), its latest [`Cost`] and the proposal
//! probability of the random choices that produced it. Productions talk to the
//! particle they are expanding through an [`Expansion`] handle.
use std::fmt;
use std::sync::Arc;

use rand::RngCore;

use crate::cost::{AddedNodes, Cost, CostFunction};
use crate::error::Result;
use crate::grammar::Grammar;
use crate::selection::{pick_uniform, rand01};
use crate::structure::{NodeId, Structure};

/// Growth phase a spawn queue belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Grown during the cost-guided search.
    Skeleton,
    /// Grown unconditionally after the survivor has been chosen.
    PostSkeleton,
}

/// A pending expansion: rule `component` attached at node `at`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SpawnPoint {
    pub component: Arc<str>,
    pub at: NodeId,
}

impl SpawnPoint {
    pub fn new(component: impl Into<Arc<str>>, at: NodeId) -> Self {
        Self {
            component: component.into(),
            at,
        }
    }
}

/// Stable identity of a particle; forks get a fresh id and remember their parent's.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParticleId(pub u64);

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// One candidate expansion.
pub struct Particle<N> {
    id: ParticleId,
    parent: Option<ParticleId>,
    structure: Structure<N>,
    cost: Cost,
    // Kept in log space: long runs multiply many 1/len factors.
    log_probability: f64,
    skeleton: Vec<SpawnPoint>,
    post_skeleton: Vec<SpawnPoint>,
}

impl<N> Particle<N> {
    /// Creates a particle whose structure holds only `root` and whose queues are empty.
    pub fn new(id: ParticleId, root: N) -> Self {
        Self {
            id,
            parent: None,
            structure: Structure::new(root),
            cost: Cost::ZERO,
            log_probability: 0.0,
            skeleton: Vec::new(),
            post_skeleton: Vec::new(),
        }
    }

    /// Creates a particle ready to expand `start_rule` from `root`.
    pub fn seeded(id: ParticleId, start_rule: &str, root: N) -> Self {
        let mut particle = Self::new(id, root);
        particle
            .skeleton
            .push(SpawnPoint::new(start_rule, NodeId::ROOT));
        particle
    }

    /// Resets cost, probability and queues, restarts the structure from `root`
    /// and enqueues one skeleton spawn point of `start_rule` at the root.
    pub fn initialize(&mut self, start_rule: &str, root: N) {
        self.cost = Cost::ZERO;
        self.log_probability = 0.0;
        self.skeleton.clear();
        self.post_skeleton.clear();
        self.structure.reset(root);
        self.skeleton.push(SpawnPoint::new(start_rule, NodeId::ROOT));
    }

    pub fn id(&self) -> ParticleId {
        self.id
    }

    /// Id of the particle this one was forked from, if any.
    pub fn parent(&self) -> Option<ParticleId> {
        self.parent
    }

    pub fn structure(&self) -> &Structure<N> {
        &self.structure
    }

    pub fn into_structure(self) -> Structure<N> {
        self.structure
    }

    pub fn cost(&self) -> Cost {
        self.cost
    }

    /// Proposal probability of the random picks that produced this particle.
    pub fn probability(&self) -> f64 {
        self.log_probability.exp()
    }

    pub fn log_probability(&self) -> f64 {
        self.log_probability
    }

    pub fn spawn_points(&self, phase: Phase) -> &[SpawnPoint] {
        match phase {
            Phase::Skeleton => &self.skeleton,
            Phase::PostSkeleton => &self.post_skeleton,
        }
    }

    /// Whether both queues are empty.
    pub fn is_complete(&self) -> bool {
        self.skeleton.is_empty() && self.post_skeleton.is_empty()
    }

    fn queue_mut(&mut self, phase: Phase) -> &mut Vec<SpawnPoint> {
        match phase {
            Phase::Skeleton => &mut self.skeleton,
            Phase::PostSkeleton => &mut self.post_skeleton,
        }
    }

    /// Queues `spawn` on the post-skeleton queue if its component is declared
    /// post-skeleton by `grammar`, otherwise on the skeleton queue.
    pub fn add_detail(&mut self, spawn: SpawnPoint, grammar: &Grammar<N>) {
        if grammar.is_post_skeleton(&spawn.component) {
            self.post_skeleton.push(spawn);
        } else {
            self.skeleton.push(spawn);
        }
    }

    /// Expands random spawn points of `phase` until the structure grows or the
    /// queue runs dry, then replaces the cost with `cost_fn`'s evaluation.
    ///
    /// Returns whether any node was appended. An empty queue is a no-op and
    /// does not consult the cost function.
    pub fn grow_if_possible(
        &mut self,
        phase: Phase,
        use_heuristic: bool,
        grammar: &Grammar<N>,
        cost_fn: &mut dyn CostFunction<N>,
        rng: &mut dyn RngCore,
    ) -> Result<bool> {
        if self.spawn_points(phase).is_empty() {
            return Ok(false);
        }

        let start = self.structure.len();
        while self.structure.len() == start {
            let queue = self.queue_mut(phase);
            let len = queue.len();
            let Some(idx) = pick_uniform(len, rng) else {
                break;
            };
            let spawn = queue.remove(idx);
            self.log_probability -= (len as f64).ln();

            let body = grammar.get_production(&spawn.component, rng)?;
            let mut expansion = Expansion::new(self, grammar, rng);
            body.apply(spawn.at, &mut expansion);
        }

        let grew = self.structure.len() > start;
        let added = self.structure.appended_since(start).unwrap_or(&[]);
        let added = AddedNodes::new(NodeId(start), added);
        self.cost = cost_fn.evaluate(self, added, use_heuristic);
        Ok(grew)
    }

    /// Pops the most recent skeleton spawn point and applies its wrap-up production.
    ///
    /// Returns the consumed spawn point, or `None` when the skeleton queue is empty.
    pub fn wrap_up_next(
        &mut self,
        grammar: &Grammar<N>,
        rng: &mut dyn RngCore,
    ) -> Result<Option<SpawnPoint>> {
        let Some(spawn) = self.skeleton.pop() else {
            return Ok(None);
        };
        let body = grammar.wrap_up_for(&spawn.component)?;
        let mut expansion = Expansion::new(self, grammar, rng);
        body.apply(spawn.at, &mut expansion);
        Ok(Some(spawn))
    }

    /// Branches this particle. The fork shares the structure's history, copies
    /// cost and probability, and owns copies of both queues.
    pub fn fork(&mut self, id: ParticleId) -> Self {
        Self {
            id,
            parent: Some(self.id),
            structure: self.structure.fork(),
            cost: self.cost,
            log_probability: self.log_probability,
            skeleton: self.skeleton.clone(),
            post_skeleton: self.post_skeleton.clone(),
        }
    }

    /// `1 / exp(real + heuristic * heuristic_scale)`; lower cost gives higher weight.
    pub fn cost_weight(&self, heuristic_scale: f64) -> f64 {
        1.0 / self.scaled_cost(heuristic_scale).exp()
    }

    /// Importance weight used for resampling: `probability * cost_weight`.
    pub fn weight(&self, heuristic_scale: f64) -> f64 {
        self.probability() * self.cost_weight(heuristic_scale)
    }

    /// Natural log of [`Particle::weight`], finite even where the weight underflows.
    pub fn log_weight(&self, heuristic_scale: f64) -> f64 {
        self.log_probability - self.scaled_cost(heuristic_scale)
    }

    #[inline]
    fn scaled_cost(&self, heuristic_scale: f64) -> f64 {
        self.cost.real + self.cost.heuristic * heuristic_scale
    }
}

impl<N> fmt::Debug for Particle<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Particle")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("nodes", &self.structure.len())
            .field("cost", &self.cost)
            .field("log_probability", &self.log_probability)
            .field("skeleton", &self.skeleton.len())
            .field("post_skeleton", &self.post_skeleton.len())
            .finish()
    }
}

/// Handle given to productions while they expand one spawn point of a particle.
pub struct Expansion<'a, N> {
    particle: &'a mut Particle<N>,
    grammar: &'a Grammar<N>,
    rng: &'a mut dyn RngCore,
}

impl<'a, N> Expansion<'a, N> {
    pub fn new(
        particle: &'a mut Particle<N>,
        grammar: &'a Grammar<N>,
        rng: &'a mut dyn RngCore,
    ) -> Self {
        Self {
            particle,
            grammar,
            rng,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&N> {
        self.particle.structure.get(id)
    }

    pub fn structure(&self) -> &Structure<N> {
        &self.particle.structure
    }

    pub fn particle_id(&self) -> ParticleId {
        self.particle.id
    }

    /// Appends a node to the particle's structure and returns its id.
    pub fn push(&mut self, node: N) -> NodeId {
        self.particle.structure.push(node)
    }

    /// Registers a spawn point of `component` at `at`, routed by the grammar's
    /// post-skeleton declarations.
    pub fn add_detail(&mut self, component: &str, at: NodeId) {
        self.particle
            .add_detail(SpawnPoint::new(component, at), self.grammar);
    }

    /// Uniform draw in `[0, 1)` from the run's random source.
    pub fn random(&mut self) -> f64 {
        rand01(&mut *self.rng)
    }

    /// Uniform draw in `[low, high)`.
    pub fn random_range(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.random()
    }

    pub fn rng(&mut self) -> &mut dyn RngCore {
        &mut *self.rng
    }
}
