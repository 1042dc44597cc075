//! Grammar table: named rules with weighted alternative productions.
//!
//! A [`Grammar`] maps rule names to a [`Rule`] holding one or more weighted
//! [`Definition`]s. Particles sample a definition proportionally to its weight
//! each time they expand a spawn point of that rule. Separately, each rule may
//! carry a single deterministic wrap-up production used only to close the
//! skeleton of the final survivor, and may be declared post-skeleton so its
//! spawn points are grown after the optimized phase instead of during it.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use rand::RngCore;

use crate::error::{Error, Result};
use crate::particle::Expansion;
use crate::selection::rand01;
use crate::structure::NodeId;

/// A production body: expands one spawn point of a rule.
///
/// `apply` receives the attachment node of the spawn point and an [`Expansion`]
/// handle through which it may append nodes and register further spawn points.
/// Appending nothing is valid and models an absent optional part.
pub trait Production<N>: Send + Sync {
    fn apply(&self, at: NodeId, expansion: &mut Expansion<'_, N>);
}

impl<N, F> Production<N> for F
where
    F: Fn(NodeId, &mut Expansion<'_, N>) + Send + Sync,
{
    #[inline]
    fn apply(&self, at: NodeId, expansion: &mut Expansion<'_, N>) {
        (self)(at, expansion)
    }
}

/// Production that appends nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct Absent;

impl<N> Production<N> for Absent {
    #[inline]
    fn apply(&self, _at: NodeId, _expansion: &mut Expansion<'_, N>) {}
}

/// Wraps a closure as a shareable production, e.g. for [`Grammar::choice`].
pub fn production<N, F>(f: F) -> Arc<dyn Production<N>>
where
    N: 'static,
    F: Fn(NodeId, &mut Expansion<'_, N>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// One weighted alternative of a rule.
pub struct Definition<N> {
    weight: f64,
    body: Arc<dyn Production<N>>,
}

impl<N> Definition<N> {
    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn body(&self) -> &dyn Production<N> {
        self.body.as_ref()
    }
}

impl<N> fmt::Debug for Definition<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

/// A named rule and its weighted definitions.
#[derive(Debug)]
pub struct Rule<N> {
    name: String,
    total_weight: f64,
    definitions: Vec<Definition<N>>,
}

impl<N> Rule<N> {
    fn new(name: String) -> Self {
        Self {
            name,
            total_weight: 0.0,
            definitions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sum of all definition weights.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn definitions(&self) -> &[Definition<N>] {
        &self.definitions
    }

    fn push(&mut self, weight: f64, body: Arc<dyn Production<N>>) {
        self.total_weight += weight;
        self.definitions.push(Definition { weight, body });
    }

    /// Maps a uniform draw `u` in `[0, 1)` to a definition index: the first
    /// definition whose cumulative weight reaches `u * total_weight`.
    pub fn index_for(&self, u: f64) -> Option<usize> {
        let target = u * self.total_weight;
        let mut cumulative = 0.0;
        for (i, def) in self.definitions.iter().enumerate() {
            cumulative += def.weight;
            if cumulative >= target {
                return Some(i);
            }
        }
        None
    }
}

/// Table of rules, wrap-up productions and post-skeleton declarations.
pub struct Grammar<N> {
    rules: HashMap<String, Rule<N>>,
    wrap_ups: HashMap<String, Arc<dyn Production<N>>>,
    post_skeleton: HashSet<String>,
}

impl<N> Grammar<N> {
    /// Creates an empty grammar.
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
            wrap_ups: HashMap::new(),
            post_skeleton: HashSet::new(),
        }
    }

    pub fn rule(&self, name: &str) -> Option<&Rule<N>> {
        self.rules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Names of all defined rules, sorted.
    pub fn rule_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_post_skeleton(&self, name: &str) -> bool {
        self.post_skeleton.contains(name)
    }

    pub fn has_wrap_up(&self, name: &str) -> bool {
        self.wrap_ups.contains_key(name)
    }

    /// Skeleton rules that would fail forced termination, sorted.
    pub fn rules_without_wrap_up(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .rules
            .keys()
            .filter(|name| {
                !self.post_skeleton.contains(name.as_str())
                    && !self.wrap_ups.contains_key(name.as_str())
            })
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    /// Samples a definition of `name` proportionally to its weight.
    pub fn sample_definition(
        &self,
        name: &str,
        rng: &mut dyn RngCore,
    ) -> Result<&Definition<N>> {
        let rule = self.rules.get(name).ok_or_else(|| Error::UnknownRule {
            rule: name.to_owned(),
        })?;
        rule.index_for(rand01(rng))
            .and_then(|i| rule.definitions.get(i))
            .ok_or_else(|| Error::Weighting {
                rule: name.to_owned(),
            })
    }

    /// Samples a production body of `name` proportionally to its weight.
    pub fn get_production(
        &self,
        name: &str,
        rng: &mut dyn RngCore,
    ) -> Result<&dyn Production<N>> {
        self.sample_definition(name, rng).map(Definition::body)
    }

    /// The wrap-up production registered for `name`.
    pub fn wrap_up_for(&self, name: &str) -> Result<&dyn Production<N>> {
        self.wrap_ups
            .get(name)
            .map(|body| body.as_ref())
            .ok_or_else(|| Error::MissingWrapUpRule {
                rule: name.to_owned(),
            })
    }
}

impl<N: 'static> Grammar<N> {
    /// Registers `body` under `name` with weight 1.
    pub fn define<F>(&mut self, name: impl Into<String>, body: F) -> &mut Self
    where
        F: Fn(NodeId, &mut Expansion<'_, N>) + Send + Sync + 'static,
    {
        self.rule_entry(name.into()).push(1.0, Arc::new(body));
        self
    }

    /// Registers `body` under `name` with the given weight.
    pub fn define_weighted<F>(
        &mut self,
        name: impl Into<String>,
        weight: f64,
        body: F,
    ) -> Result<&mut Self>
    where
        F: Fn(NodeId, &mut Expansion<'_, N>) + Send + Sync + 'static,
    {
        self.define_production(name, weight, Arc::new(body))
    }

    /// Registers an already shared production under `name` with the given weight.
    pub fn define_production(
        &mut self,
        name: impl Into<String>,
        weight: f64,
        body: Arc<dyn Production<N>>,
    ) -> Result<&mut Self> {
        let name = name.into();
        if !(weight > 0.0 && weight.is_finite()) {
            return Err(Error::InvalidWeight { rule: name, weight });
        }
        self.rule_entry(name).push(weight, body);
        Ok(self)
    }

    /// Registers `body` and an empty alternative with equal weight.
    pub fn maybe<F>(&mut self, name: impl Into<String>, body: F) -> &mut Self
    where
        F: Fn(NodeId, &mut Expansion<'_, N>) + Send + Sync + 'static,
    {
        let rule = self.rule_entry(name.into());
        rule.push(1.0, Arc::new(body));
        rule.push(1.0, Arc::new(Absent));
        self
    }

    /// Registers each body under `name` with weight 1.
    pub fn choice<I>(&mut self, name: impl Into<String>, bodies: I) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn Production<N>>>,
    {
        let rule = self.rule_entry(name.into());
        for body in bodies {
            rule.push(1.0, body);
        }
        self
    }

    /// Sets the wrap-up production of `name`, replacing any previous one.
    pub fn wrap_up<F>(&mut self, name: impl Into<String>, body: F) -> &mut Self
    where
        F: Fn(NodeId, &mut Expansion<'_, N>) + Send + Sync + 'static,
    {
        self.wrap_ups.insert(name.into(), Arc::new(body));
        self
    }

    /// Sets one shared wrap-up production for every name in `names`.
    pub fn wrap_up_many<I, S, F>(&mut self, names: I, body: F) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(NodeId, &mut Expansion<'_, N>) + Send + Sync + 'static,
    {
        let body: Arc<dyn Production<N>> = Arc::new(body);
        for name in names {
            self.wrap_ups.insert(name.into(), body.clone());
        }
        self
    }

    /// Declares `name` post-skeleton: its spawn points bypass the optimized phase.
    pub fn post_skeleton(&mut self, name: impl Into<String>) -> &mut Self {
        self.post_skeleton.insert(name.into());
        self
    }

    pub fn post_skeleton_many<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.post_skeleton.extend(names.into_iter().map(Into::into));
        self
    }

    fn rule_entry(&mut self, name: String) -> &mut Rule<N> {
        self.rules
            .entry(name)
            .or_insert_with_key(|key| Rule::new(key.clone()))
    }
}

impl<N> Default for Grammar<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> fmt::Debug for Grammar<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("rules", &self.rule_names())
            .field("wrap_ups", &self.wrap_ups.len())
            .field("post_skeleton", &self.post_skeleton)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn noop(_: NodeId, _: &mut Expansion<'_, u32>) {}

    #[test]
    fn define_accumulates_total_weight() {
        let mut g = Grammar::<u32>::new();
        g.define("a", noop);
        g.define_weighted("a", 2.5, noop).unwrap();
        let rule = g.rule("a").unwrap();
        assert_eq!(rule.definitions().len(), 2);
        assert_eq!(rule.total_weight(), 3.5);
        let sum: f64 = rule.definitions().iter().map(Definition::weight).sum();
        assert_eq!(sum, rule.total_weight());
    }

    #[test]
    fn non_positive_weights_are_rejected() {
        let mut g = Grammar::<u32>::new();
        for weight in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = g.define_weighted("a", weight, noop).unwrap_err();
            assert!(matches!(err, Error::InvalidWeight { ref rule, .. } if rule == "a"));
        }
        assert!(!g.contains("a"));
    }

    #[test]
    fn maybe_registers_empty_alternative() {
        let mut g = Grammar::<u32>::new();
        g.maybe("leaf", noop);
        let rule = g.rule("leaf").unwrap();
        assert_eq!(rule.definitions().len(), 2);
        assert_eq!(rule.definitions()[0].weight(), rule.definitions()[1].weight());
    }

    #[test]
    fn choice_registers_uniform_alternatives() {
        let mut g = Grammar::<u32>::new();
        g.choice(
            "shape",
            vec![production(noop), production(noop), Arc::new(Absent) as _],
        );
        let rule = g.rule("shape").unwrap();
        assert_eq!(rule.total_weight(), 3.0);
    }

    #[test]
    fn unknown_rule_is_an_error() {
        let g = Grammar::<u32>::new();
        let mut rng = StdRng::seed_from_u64(1);
        let err = g.get_production("missing", &mut rng).err().unwrap();
        assert!(matches!(err, Error::UnknownRule { ref rule } if rule == "missing"));
    }

    #[test]
    fn index_for_follows_cumulative_weights() {
        let mut g = Grammar::<u32>::new();
        g.define_weighted("r", 1.0, noop).unwrap();
        g.define_weighted("r", 3.0, noop).unwrap();
        let rule = g.rule("r").unwrap();
        assert_eq!(rule.index_for(0.0), Some(0));
        assert_eq!(rule.index_for(0.25), Some(0));
        assert_eq!(rule.index_for(0.26), Some(1));
        assert_eq!(rule.index_for(0.999), Some(1));
    }

    #[test]
    fn sampling_frequencies_match_weights() {
        let mut g = Grammar::<u32>::new();
        let weights = [1.0, 2.0, 5.0];
        for w in weights {
            g.define_weighted("r", w, noop).unwrap();
        }
        let rule = g.rule("r").unwrap();
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let draws = 40_000;
        let mut counts = [0usize; 3];
        for _ in 0..draws {
            let def = g.sample_definition("r", &mut rng).unwrap();
            let idx = rule
                .definitions()
                .iter()
                .position(|d| std::ptr::eq(d, def))
                .unwrap();
            counts[idx] += 1;
        }
        let total: f64 = weights.iter().sum();
        for (count, w) in counts.iter().zip(weights) {
            let freq = *count as f64 / draws as f64;
            assert!(
                (freq - w / total).abs() < 0.02,
                "frequency {freq} too far from {}",
                w / total
            );
        }
    }

    #[test]
    fn wrap_up_lookup_and_missing_error() {
        let mut g = Grammar::<u32>::new();
        g.define("a", noop).define("b", noop).define("c", noop);
        g.wrap_up_many(["a", "b"], noop);
        assert!(g.wrap_up_for("a").is_ok());
        assert!(g.has_wrap_up("b"));
        let err = g.wrap_up_for("c").err().unwrap();
        assert!(matches!(err, Error::MissingWrapUpRule { ref rule } if rule == "c"));
        assert_eq!(g.rules_without_wrap_up(), vec!["c"]);
    }

    #[test]
    fn post_skeleton_rules_need_no_wrap_up() {
        let mut g = Grammar::<u32>::new();
        g.define("leaf", noop).define("stem", noop);
        g.post_skeleton("leaf");
        assert!(g.is_post_skeleton("leaf"));
        assert!(!g.is_post_skeleton("stem"));
        assert_eq!(g.rules_without_wrap_up(), vec!["stem"]);
    }
}
