//! Sequential Monte-Carlo search over grammar expansions.
//!
//! A [`SosmcRun`] keeps a population of [`Particle`]s. Every generation grows
//! each particle by one skeleton node, then resamples the population in
//! proportion to [`Particle::weight`] so that cheap expansions multiply and
//! expensive ones die out. After the last generation the cheapest particle
//! survives; its open skeleton spawn points are closed with wrap-up
//! productions and its post-skeleton queue is grown without optimization.
//!
//! The run is a [`Stepwise`] state machine with fine-grained steps (one
//! particle growth, one resampling pass, one wrap-up or one detail growth), so
//! a [`crate::task::Task`] can interleave it with a frame loop.
use std::fmt;
use std::sync::Arc;

use rand::RngCore;
use tracing::{debug, info, warn};

use crate::config::SosmcConfig;
use crate::cost::{Cost, CostFunction};
use crate::error::{Error, Result};
use crate::events::{EventSink, GrowthEvent, GrowthEventKind};
use crate::grammar::Grammar;
use crate::particle::{Particle, ParticleId, Phase};
use crate::selection::{pick_lowest, pick_weighted};
use crate::structure::Structure;
use crate::task::{Step, Stepwise};

/// Callback invoked with the population after every generation.
pub type GenerationHook<N> = Box<dyn FnMut(usize, &[Particle<N>]) + Send>;

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct GrowthOutcome<N> {
    /// Final structure of the survivor, wrap-ups and details included.
    pub structure: Structure<N>,
    /// Cost of the survivor after its last evaluation.
    pub cost: Cost,
    /// Proposal probability of the survivor's random picks.
    pub probability: f64,
    /// Id of the surviving particle.
    pub particle: ParticleId,
}

/// Where a [`SosmcRun`] currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SosmcStage {
    Initialize,
    /// Growing particle `next` of generation `generation`.
    Grow { generation: usize, next: usize },
    /// Resampling after `generation` has grown.
    Resample { generation: usize },
    SelectSurvivor,
    WrapUp,
    Detail,
    Done,
}

/// One SOSMC search, advanced through [`Stepwise::step`].
pub struct SosmcRun<N> {
    grammar: Arc<Grammar<N>>,
    root: N,
    start_rule: String,
    config: SosmcConfig,
    cost_fn: Box<dyn CostFunction<N> + Send>,
    rng: Box<dyn RngCore + Send>,
    hook: Option<GenerationHook<N>>,
    sink: Box<dyn EventSink + Send>,
    population: Vec<Particle<N>>,
    survivor: Option<Particle<N>>,
    next_id: u64,
    stage: SosmcStage,
    wrap_ups: usize,
    detail_growths: usize,
}

impl<N: Clone + 'static> SosmcRun<N> {
    /// Prepares a run expanding `start_rule` from `root`.
    ///
    /// Fails with [`Error::InvalidConfig`] for an invalid `config` and with
    /// [`Error::UnknownRule`] when `start_rule` is not defined.
    pub fn new<C, R>(
        grammar: Arc<Grammar<N>>,
        root: N,
        start_rule: impl Into<String>,
        config: SosmcConfig,
        cost_fn: C,
        rng: R,
    ) -> Result<Self>
    where
        C: CostFunction<N> + Send + 'static,
        R: RngCore + Send + 'static,
    {
        config.validate()?;
        let start_rule = start_rule.into();
        if !grammar.contains(&start_rule) {
            return Err(Error::UnknownRule { rule: start_rule });
        }
        Ok(Self {
            grammar,
            root,
            start_rule,
            config,
            cost_fn: Box::new(cost_fn),
            rng: Box::new(rng),
            hook: None,
            sink: Box::new(()),
            population: Vec::new(),
            survivor: None,
            next_id: 0,
            stage: SosmcStage::Initialize,
            wrap_ups: 0,
            detail_growths: 0,
        })
    }

    /// Installs a callback that sees the population after every generation.
    pub fn with_generation_hook<F>(mut self, hook: F) -> Self
    where
        F: FnMut(usize, &[Particle<N>]) + Send + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Routes run events to `sink`.
    pub fn with_event_sink<S>(mut self, sink: S) -> Self
    where
        S: EventSink + Send + 'static,
    {
        self.sink = Box::new(sink);
        self
    }
}

impl<N> SosmcRun<N> {
    pub fn stage(&self) -> SosmcStage {
        self.stage
    }

    pub fn config(&self) -> &SosmcConfig {
        &self.config
    }

    pub fn start_rule(&self) -> &str {
        &self.start_rule
    }

    /// Current population; empty once the survivor was chosen.
    pub fn population(&self) -> &[Particle<N>] {
        &self.population
    }

    /// The survivor while it is being finalized.
    pub fn survivor(&self) -> Option<&Particle<N>> {
        self.survivor.as_ref()
    }

    /// Fraction of generations fully grown, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let generations = self.config.generations.max(1) as f64;
        match self.stage {
            SosmcStage::Initialize => 0.0,
            SosmcStage::Grow { generation, next } => {
                let within = next as f64 / self.population.len().max(1) as f64;
                (generation as f64 + within) / generations
            }
            SosmcStage::Resample { generation } => (generation + 1) as f64 / generations,
            _ => 1.0,
        }
    }

    fn allocate_id(&mut self) -> ParticleId {
        let id = ParticleId(self.next_id);
        self.next_id += 1;
        id
    }

    fn missing_survivor() -> Error {
        Error::Other("no survivor selected".into())
    }
}

impl<N: Clone> SosmcRun<N> {
    fn initialize(&mut self) {
        let count = self.config.sample_count_at(0);
        self.population = Vec::with_capacity(count);
        for _ in 0..count {
            let id = self.allocate_id();
            let particle = Particle::seeded(id, &self.start_rule, self.root.clone());
            self.population.push(particle);
        }

        info!(
            start_rule = %self.start_rule,
            generations = self.config.generations,
            population = count,
            "growth run started"
        );
        if self.sink.wants(GrowthEventKind::RunStarted) {
            self.sink.send(GrowthEvent::RunStarted {
                start_rule: self.start_rule.clone(),
                generations: self.config.generations,
                population: count,
            });
        }
        self.stage = SosmcStage::Grow {
            generation: 0,
            next: 0,
        };
    }
}

impl<N> SosmcRun<N> {
    fn grow(&mut self, generation: usize, next: usize) -> Result<()> {
        let scale = self.config.heuristic_scale_at(generation);
        let Some(particle) = self.population.get_mut(next) else {
            self.finish_generation(generation, scale);
            return Ok(());
        };

        particle.grow_if_possible(
            Phase::Skeleton,
            scale == 0.0,
            &self.grammar,
            self.cost_fn.as_mut(),
            self.rng.as_mut(),
        )?;
        self.stage = SosmcStage::Grow {
            generation,
            next: next + 1,
        };
        Ok(())
    }

    fn finish_generation(&mut self, generation: usize, heuristic_scale: f64) {
        let population = self.population.len();
        let best = pick_lowest(self.population.iter().map(|p| p.cost().total()))
            .map(|i| self.population[i].cost())
            .unwrap_or(Cost::ZERO);
        let mean_total_cost = self
            .population
            .iter()
            .map(|p| p.cost().total())
            .sum::<f64>()
            / population.max(1) as f64;

        debug!(
            generation,
            population,
            heuristic_scale,
            best_real = best.real,
            best_heuristic = best.heuristic,
            mean_total_cost,
            "generation grown"
        );
        if self.sink.wants(GrowthEventKind::GenerationGrown) {
            self.sink.send(GrowthEvent::GenerationGrown {
                generation,
                population,
                heuristic_scale,
                best,
                mean_total_cost,
            });
        }

        if generation + 1 < self.config.generations {
            self.stage = SosmcStage::Resample { generation };
        } else {
            self.call_hook(generation);
            self.stage = SosmcStage::SelectSurvivor;
        }
    }

    /// Multinomial resampling with replacement into `sample_count(generation + 1)` forks.
    fn resample(&mut self, generation: usize) {
        let scale = self.config.heuristic_scale_at(generation);
        let target = self.config.sample_count_at(generation + 1);
        let from = self.population.len();

        let log_weights: Vec<f64> = self
            .population
            .iter()
            .map(|p| p.log_weight(scale))
            .collect();
        let mut weights = relative_weights(&log_weights);
        let mut total: f64 = weights.iter().sum();

        let uniform_fallback = !(total.is_finite() && total > 0.0);
        if uniform_fallback {
            warn!(
                generation,
                population = from,
                total,
                "degenerate resampling weights, resampling uniformly"
            );
            if self.sink.wants(GrowthEventKind::Warning) {
                self.sink.send(GrowthEvent::Warning {
                    context: format!("generation {generation}"),
                    message: format!(
                        "total resampling weight {total} is degenerate; resampled uniformly"
                    ),
                });
            }
            weights = vec![1.0; from];
            total = from as f64;
        }

        let mut selected = vec![false; from];
        let mut next = Vec::with_capacity(target);
        for _ in 0..target {
            let Some(idx) = pick_weighted(&weights, total, self.rng.as_mut()) else {
                break;
            };
            selected[idx] = true;
            let id = self.allocate_id();
            next.push(self.population[idx].fork(id));
        }
        self.population = next;

        let distinct_parents = selected.iter().filter(|&&s| s).count();
        let square_sum: f64 = weights.iter().map(|w| w * w).sum();
        let effective_sample_size = if square_sum > 0.0 {
            total * total / square_sum
        } else {
            0.0
        };

        debug!(
            generation,
            from,
            to = self.population.len(),
            distinct_parents,
            effective_sample_size,
            "population resampled"
        );
        if self.sink.wants(GrowthEventKind::Resampled) {
            self.sink.send(GrowthEvent::Resampled {
                generation,
                from,
                to: self.population.len(),
                distinct_parents,
                effective_sample_size,
                uniform_fallback,
            });
        }

        self.call_hook(generation);
        self.stage = SosmcStage::Grow {
            generation: generation + 1,
            next: 0,
        };
    }

    fn call_hook(&mut self, generation: usize) {
        if let Some(hook) = self.hook.as_mut() {
            hook(generation, &self.population);
        }
    }

    fn select_survivor(&mut self) -> Result<()> {
        let idx = pick_lowest(self.population.iter().map(|p| p.cost().total()))
            .ok_or_else(|| Error::Other("population is empty".into()))?;
        let survivor = self.population.swap_remove(idx);
        self.population.clear();

        let cost = survivor.cost();
        let nodes = survivor.structure().len();
        info!(
            particle = %survivor.id(),
            real = cost.real,
            heuristic = cost.heuristic,
            nodes,
            "survivor selected"
        );
        if self.sink.wants(GrowthEventKind::SurvivorSelected) {
            self.sink.send(GrowthEvent::SurvivorSelected {
                particle: survivor.id(),
                cost,
                nodes,
            });
        }
        self.survivor = Some(survivor);
        self.stage = SosmcStage::WrapUp;
        Ok(())
    }

    fn wrap_up(&mut self) -> Result<()> {
        let survivor = self.survivor.as_mut().ok_or_else(Self::missing_survivor)?;
        match survivor.wrap_up_next(&self.grammar, self.rng.as_mut())? {
            Some(_) => self.wrap_ups += 1,
            None => self.stage = SosmcStage::Detail,
        }
        Ok(())
    }

    fn grow_detail(&mut self) -> Result<Step<GrowthOutcome<N>>> {
        let survivor = self.survivor.as_mut().ok_or_else(Self::missing_survivor)?;
        if !survivor.spawn_points(Phase::PostSkeleton).is_empty() {
            survivor.grow_if_possible(
                Phase::PostSkeleton,
                false,
                &self.grammar,
                self.cost_fn.as_mut(),
                self.rng.as_mut(),
            )?;
            self.detail_growths += 1;
            return Ok(Step::Pending);
        }

        let survivor = self.survivor.take().ok_or_else(Self::missing_survivor)?;
        self.stage = SosmcStage::Done;

        let cost = survivor.cost();
        let nodes = survivor.structure().len();
        if self.sink.wants(GrowthEventKind::Finalized) {
            self.sink.send(GrowthEvent::Finalized {
                wrap_ups: self.wrap_ups,
                detail_growths: self.detail_growths,
            });
        }
        info!(
            nodes,
            real = cost.real,
            heuristic = cost.heuristic,
            wrap_ups = self.wrap_ups,
            detail_growths = self.detail_growths,
            "growth run finished"
        );
        if self.sink.wants(GrowthEventKind::RunFinished) {
            self.sink.send(GrowthEvent::RunFinished { nodes, cost });
        }

        Ok(Step::Done(GrowthOutcome {
            cost,
            probability: survivor.probability(),
            particle: survivor.id(),
            structure: survivor.into_structure(),
        }))
    }
}

impl<N: Clone> Stepwise for SosmcRun<N> {
    type Output = GrowthOutcome<N>;

    fn step(&mut self) -> Result<Step<GrowthOutcome<N>>> {
        match self.stage {
            SosmcStage::Initialize => self.initialize(),
            SosmcStage::Grow { generation, next } => self.grow(generation, next)?,
            SosmcStage::Resample { generation } => self.resample(generation),
            SosmcStage::SelectSurvivor => self.select_survivor()?,
            SosmcStage::WrapUp => self.wrap_up()?,
            SosmcStage::Detail => return self.grow_detail(),
            SosmcStage::Done => return Err(Error::Other("growth run already finished".into())),
        }
        Ok(Step::Pending)
    }
}

impl<N> fmt::Debug for SosmcRun<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SosmcRun")
            .field("start_rule", &self.start_rule)
            .field("config", &self.config)
            .field("stage", &self.stage)
            .field("population", &self.population.len())
            .field("wrap_ups", &self.wrap_ups)
            .field("detail_growths", &self.detail_growths)
            .finish()
    }
}

/// Weights proportional to `exp(log_weight)`, scaled by the largest finite one.
///
/// Scaling every weight by the same factor leaves the multinomial distribution
/// unchanged but keeps it representable when raw weights underflow. NaN maps to
/// zero; `+inf` stays infinite so the caller sees a degenerate total.
fn relative_weights(log_weights: &[f64]) -> Vec<f64> {
    let max = log_weights
        .iter()
        .copied()
        .filter(|w| w.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return log_weights
            .iter()
            .map(|&w| if w == f64::INFINITY { w } else { 0.0 })
            .collect();
    }
    log_weights
        .iter()
        .map(|&w| if w.is_nan() { 0.0 } else { (w - max).exp() })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::config::Schedule;
    use crate::cost::{AddedNodes, FnCost, ZeroCost};
    use crate::events::FnSink;
    use crate::particle::Expansion;
    use crate::task::Task;

    type Tag = &'static str;

    /// Each slot appends either a cheap or an expensive node and reopens itself.
    fn slot_grammar() -> Grammar<Tag> {
        let mut g = Grammar::new();
        g.define("slot", |at, x: &mut Expansion<'_, Tag>| {
            x.push("cheap");
            x.add_detail("slot", at);
        });
        g.define("slot", |at, x: &mut Expansion<'_, Tag>| {
            x.push("expensive");
            x.add_detail("slot", at);
        });
        g.wrap_up("slot", |_, _: &mut Expansion<'_, Tag>| {});
        g
    }

    fn block_grammar() -> Grammar<Tag> {
        let mut g = Grammar::new();
        g.define("block", |_, x: &mut Expansion<'_, Tag>| {
            let id = x.push("block");
            x.add_detail("block", id);
        });
        g.wrap_up("block", |_, x: &mut Expansion<'_, Tag>| {
            let cap = x.push("cap");
            x.add_detail("leaf", cap);
        });
        g.define("leaf", |_, x: &mut Expansion<'_, Tag>| {
            x.push("leaf");
        });
        g.post_skeleton("leaf");
        g
    }

    fn tag_cost() -> FnCost<impl FnMut(&Particle<Tag>, AddedNodes<'_, Tag>, bool) -> Cost> {
        FnCost::new(
            |particle: &Particle<Tag>, added: AddedNodes<'_, Tag>, _: bool| {
                let extra: f64 = added
                    .iter()
                    .map(|(_, &tag)| if tag == "expensive" { 100.0 } else { 0.0 })
                    .sum();
                Cost::from_real(particle.cost().real + extra)
            },
        )
    }

    fn run<C>(
        grammar: Grammar<Tag>,
        start: &str,
        config: SosmcConfig,
        cost: C,
        seed: u64,
    ) -> SosmcRun<Tag>
    where
        C: CostFunction<Tag> + Send + 'static,
    {
        SosmcRun::new(
            Arc::new(grammar),
            "root",
            start,
            config,
            cost,
            StdRng::seed_from_u64(seed),
        )
        .unwrap()
    }

    fn finish(run: SosmcRun<Tag>) -> Result<GrowthOutcome<Tag>> {
        Task::new(run, Duration::from_secs(60))
            .run_to_completion()
            .map(|(outcome, _)| outcome)
    }

    #[test]
    fn cheap_expansions_survive() {
        let runs = 40;
        let mut all_cheap = 0;
        for seed in 0..runs {
            let config = SosmcConfig::new(6).with_sample_count(24.0);
            let outcome = finish(run(slot_grammar(), "slot", config, tag_cost(), seed)).unwrap();
            assert_eq!(outcome.structure.len(), 7);
            if outcome.structure.iter().skip(1).all(|&tag| tag == "cheap") {
                all_cheap += 1;
            }
        }
        assert!(
            all_cheap as f64 / runs as f64 > 0.95,
            "all-cheap survivors: {all_cheap}/{runs}"
        );
    }

    #[test]
    fn funnel_schedule_sets_population_sizes() {
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&sizes);
        let config = SosmcConfig::new(4).with_sample_count(Schedule::Linear {
            start: 40.0,
            end: 10.0,
        });
        let run = run(slot_grammar(), "slot", config, tag_cost(), 7).with_generation_hook(
            move |generation, population: &[Particle<Tag>]| {
                seen.lock().unwrap().push((generation, population.len()));
            },
        );
        finish(run).unwrap();
        assert_eq!(
            *sizes.lock().unwrap(),
            vec![(0, 30), (1, 20), (2, 10), (3, 10)]
        );
    }

    #[test]
    fn resampled_particles_are_forks_of_previous_generation() {
        let history = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&history);
        let config = SosmcConfig::new(3).with_sample_count(12.0);
        let run = run(slot_grammar(), "slot", config, tag_cost(), 3).with_generation_hook(
            move |_, population: &[Particle<Tag>]| {
                let ids: Vec<(ParticleId, Option<ParticleId>, usize)> = population
                    .iter()
                    .map(|p| (p.id(), p.parent(), p.structure().len()))
                    .collect();
                seen.lock().unwrap().push(ids);
            },
        );
        finish(run).unwrap();

        let history = history.lock().unwrap();
        // Generation 0 starts with ids 0..12; its resampled forks point at them.
        for (id, parent, nodes) in &history[0] {
            assert!(id.0 >= 12);
            assert!(parent.is_some_and(|p| p.0 < 12));
            assert_eq!(*nodes, 2);
        }
        let previous: Vec<ParticleId> = history[0].iter().map(|(id, _, _)| *id).collect();
        for (_, parent, _) in &history[1] {
            assert!(parent.is_some_and(|p| previous.contains(&p)));
        }
    }

    #[test]
    fn resampling_prefers_low_cost_particles() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&sink);
        let config = SosmcConfig::new(2).with_sample_count(50.0);
        let run = run(slot_grammar(), "slot", config, tag_cost(), 11).with_generation_hook(
            move |generation, population: &[Particle<Tag>]| {
                if generation == 0 {
                    let tags: Vec<Tag> = population
                        .iter()
                        .filter_map(|p| p.structure().latest().copied())
                        .collect();
                    seen.lock().unwrap().extend(tags);
                }
            },
        );
        finish(run).unwrap();
        let tags = sink.lock().unwrap();
        assert_eq!(tags.len(), 50);
        assert!(tags.iter().all(|&t| t == "cheap"));
    }

    #[test]
    fn degenerate_weights_fall_back_to_uniform_resampling() {
        let infinite = FnCost::new(|_: &Particle<Tag>, _: AddedNodes<'_, Tag>, _: bool| {
            Cost::from_real(f64::INFINITY)
        });
        let config = SosmcConfig::new(3).with_sample_count(8.0);
        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&events);
        let run = run(slot_grammar(), "slot", config, infinite, 5).with_event_sink(
            FnSink::new(move |event| seen.lock().unwrap().push(event)),
        );
        let outcome = finish(run).unwrap();
        assert_eq!(outcome.structure.len(), 4);

        let events = events.lock().unwrap();
        let warnings = events
            .iter()
            .filter(|e| matches!(e, GrowthEvent::Warning { .. }))
            .count();
        assert_eq!(warnings, 2);
        assert!(events.iter().any(|e| matches!(
            e,
            GrowthEvent::Resampled {
                uniform_fallback: true,
                to: 8,
                ..
            }
        )));
    }

    #[test]
    fn relative_weights_handle_underflow_and_nan() {
        let w = relative_weights(&[-2000.0, -2001.0, f64::NAN]);
        assert_eq!(w[0], 1.0);
        assert!((w[1] - (-1.0f64).exp()).abs() < 1e-12);
        assert_eq!(w[2], 0.0);
        let all_bad = relative_weights(&[f64::NEG_INFINITY, f64::NAN]);
        assert_eq!(all_bad.iter().sum::<f64>(), 0.0);
    }

    #[test]
    fn forced_termination_closes_skeleton_and_grows_details() {
        let config = SosmcConfig::new(3).with_sample_count(4.0);
        let outcome = finish(run(block_grammar(), "block", config, ZeroCost, 1)).unwrap();
        let tags: Vec<Tag> = outcome.structure.iter().copied().collect();
        assert_eq!(tags, vec!["root", "block", "block", "block", "cap", "leaf"]);
    }

    #[test]
    fn long_single_lineage_keeps_history_flat() {
        let generations = 20_000;
        let config = SosmcConfig::new(generations).with_sample_count(1.0);
        let outcome = finish(run(block_grammar(), "block", config, ZeroCost, 2)).unwrap();
        assert_eq!(outcome.structure.len(), generations + 3);
        assert!(outcome.structure.segment_depth() <= 1);
        assert_eq!(outcome.structure.latest(), Some(&"leaf"));
    }

    #[test]
    fn stepping_reports_stages_in_order() {
        let config = SosmcConfig::new(2).with_sample_count(2.0);
        let mut run = run(block_grammar(), "block", config, ZeroCost, 4);
        let mut stages = vec![run.stage()];
        loop {
            match run.step().unwrap() {
                Step::Pending => {
                    if stages.last() != Some(&run.stage()) {
                        stages.push(run.stage());
                    }
                }
                Step::Done(outcome) => {
                    assert!(run.survivor().is_none());
                    assert_eq!(outcome.structure.len(), 5);
                    break;
                }
            }
        }
        assert_eq!(run.stage(), SosmcStage::Done);
        assert!(stages.contains(&SosmcStage::Resample { generation: 0 }));
        assert!(stages.contains(&SosmcStage::SelectSurvivor));
        assert!(stages.contains(&SosmcStage::WrapUp));
        assert!(stages.contains(&SosmcStage::Detail));
        assert!(run.step().is_err());
    }

    #[test]
    fn missing_wrap_up_fails_the_run() {
        let mut g = Grammar::new();
        g.define("block", |_, x: &mut Expansion<'_, Tag>| {
            let id = x.push("block");
            x.add_detail("block", id);
        });
        let config = SosmcConfig::new(2).with_sample_count(3.0);
        let err = finish(run(g, "block", config, ZeroCost, 0)).unwrap_err();
        assert!(matches!(err, Error::MissingWrapUpRule { ref rule } if rule == "block"));
    }

    #[test]
    fn unknown_start_rule_is_rejected() {
        let result = SosmcRun::new(
            Arc::new(block_grammar()),
            "root",
            "nope",
            SosmcConfig::new(2),
            ZeroCost,
            StdRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(Error::UnknownRule { .. })));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = SosmcRun::new(
            Arc::new(block_grammar()),
            "root",
            "block",
            SosmcConfig::new(0),
            ZeroCost,
            StdRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn heuristic_flag_is_set_when_scale_is_zero() {
        let flags = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&flags);
        let cost = FnCost::new(
            move |_: &Particle<Tag>, _: AddedNodes<'_, Tag>, use_heuristic: bool| {
                seen.lock().unwrap().push(use_heuristic);
                Cost::ZERO
            },
        );
        let config = SosmcConfig::new(2)
            .with_sample_count(1.0)
            .with_heuristic_scale(Schedule::Explicit(vec![1.0, 0.0]));
        finish(run(slot_grammar(), "slot", config, cost, 2)).unwrap();
        assert_eq!(*flags.lock().unwrap(), vec![false, true]);
    }

    #[test]
    fn same_seed_reproduces_the_run() {
        let config = SosmcConfig::new(5).with_sample_count(16.0);
        let a = finish(run(slot_grammar(), "slot", config.clone(), tag_cost(), 99)).unwrap();
        let b = finish(run(slot_grammar(), "slot", config, tag_cost(), 99)).unwrap();
        assert_eq!(a.structure.to_vec(), b.structure.to_vec());
        assert_eq!(a.particle, b.particle);
        assert_eq!(a.cost, b.cost);
    }

    #[test]
    fn event_sequence_brackets_the_run() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&events);
        let config = SosmcConfig::new(3).with_sample_count(5.0);
        let run = run(slot_grammar(), "slot", config, tag_cost(), 8).with_event_sink(
            FnSink::new(move |event: GrowthEvent| {
                seen.lock().unwrap().push(event.kind())
            }),
        );
        finish(run).unwrap();
        use GrowthEventKind::*;
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                RunStarted,
                GenerationGrown,
                Resampled,
                GenerationGrown,
                Resampled,
                GenerationGrown,
                SurvivorSelected,
                Finalized,
                RunFinished,
            ]
        );
    }

    #[test]
    fn progress_reaches_one() {
        let config = SosmcConfig::new(2).with_sample_count(2.0);
        let mut run = run(slot_grammar(), "slot", config, tag_cost(), 0);
        assert_eq!(run.progress(), 0.0);
        let mut last = 0.0;
        while let Step::Pending = run.step().unwrap() {
            let p = run.progress();
            assert!(p >= last && p <= 1.0);
            last = p;
        }
        assert_eq!(run.progress(), 1.0);
    }
}
