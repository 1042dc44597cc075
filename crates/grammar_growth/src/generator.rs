//! Entry points tying a grammar and a root node to the two generation modes.
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::debug;

use crate::config::SosmcConfig;
use crate::cost::{CostFunction, ZeroCost};
use crate::error::{Error, Result};
use crate::grammar::Grammar;
use crate::particle::{Particle, ParticleId, Phase};
use crate::sosmc::SosmcRun;
use crate::structure::Structure;
use crate::task::Task;

/// A grammar together with the node every structure starts from.
pub struct Generator<N> {
    grammar: Arc<Grammar<N>>,
    root: N,
}

impl<N> Generator<N> {
    pub fn new(grammar: Grammar<N>, root: N) -> Self {
        Self::from_shared(Arc::new(grammar), root)
    }

    pub fn from_shared(grammar: Arc<Grammar<N>>, root: N) -> Self {
        Self { grammar, root }
    }

    pub fn grammar(&self) -> &Arc<Grammar<N>> {
        &self.grammar
    }

    pub fn root(&self) -> &N {
        &self.root
    }
}

impl<N: Clone + 'static> Generator<N> {
    /// Expands `start_rule` for up to `depth` skeleton growth steps without
    /// cost guidance, resampling, wrap-up or detail growth.
    ///
    /// Growth stops early once no spawn points remain, so a rule that opens no
    /// further spawn points yields the root plus its own nodes regardless of `depth`.
    pub fn generate(
        &self,
        start_rule: &str,
        depth: usize,
        rng: &mut impl RngCore,
    ) -> Result<Structure<N>> {
        if !self.grammar.contains(start_rule) {
            return Err(Error::UnknownRule {
                rule: start_rule.to_owned(),
            });
        }

        let mut particle = Particle::seeded(ParticleId(0), start_rule, self.root.clone());
        let mut steps = 0;
        while steps < depth && !particle.spawn_points(Phase::Skeleton).is_empty() {
            particle.grow_if_possible(Phase::Skeleton, false, &self.grammar, &mut ZeroCost, rng)?;
            steps += 1;
        }
        debug!(
            start_rule,
            depth,
            steps,
            nodes = particle.structure().len(),
            "structure generated"
        );
        Ok(particle.into_structure())
    }

    /// Prepares a SOSMC run seeded with `seed`, ready for hooks and sinks.
    pub fn sosmc_run<C>(
        &self,
        start_rule: &str,
        config: SosmcConfig,
        cost_fn: C,
        seed: u64,
    ) -> Result<SosmcRun<N>>
    where
        C: CostFunction<N> + Send + 'static,
    {
        SosmcRun::new(
            Arc::clone(&self.grammar),
            self.root.clone(),
            start_rule,
            config,
            cost_fn,
            StdRng::seed_from_u64(seed),
        )
    }

    /// Wraps a SOSMC run in a [`Task`] using the config's burst budget.
    pub fn generate_sosmc<C>(
        &self,
        start_rule: &str,
        config: SosmcConfig,
        cost_fn: C,
        seed: u64,
    ) -> Result<Task<SosmcRun<N>>>
    where
        C: CostFunction<N> + Send + 'static,
    {
        let budget = config.burst_budget;
        let run = self.sosmc_run(start_rule, config, cost_fn, seed)?;
        Ok(Task::new(run, budget))
    }
}

impl<N: Clone> Clone for Generator<N> {
    fn clone(&self) -> Self {
        Self {
            grammar: Arc::clone(&self.grammar),
            root: self.root.clone(),
        }
    }
}
