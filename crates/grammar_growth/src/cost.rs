//! Cost values and the cost-function contract consumed by the growth engine.
use std::ops::Add;

use crate::particle::Particle;
use crate::structure::NodeId;

/// Cost of a particle: exact cost of committed nodes plus an estimate for open spawn points.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cost {
    /// Cost attributable to nodes already in the structure.
    pub real: f64,
    /// Provisional estimate for still-open spawn points; only biases search.
    pub heuristic: f64,
}

impl Cost {
    pub const ZERO: Cost = Cost {
        real: 0.0,
        heuristic: 0.0,
    };

    pub fn new(real: f64, heuristic: f64) -> Self {
        Self { real, heuristic }
    }

    pub fn from_real(real: f64) -> Self {
        Self {
            real,
            heuristic: 0.0,
        }
    }

    /// `real + heuristic`, the quantity minimized when picking the survivor.
    #[inline]
    pub fn total(&self) -> f64 {
        self.real + self.heuristic
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost {
            real: self.real + rhs.real,
            heuristic: self.heuristic + rhs.heuristic,
        }
    }
}

/// Nodes appended to a particle during one growth step.
#[derive(Debug)]
pub struct AddedNodes<'a, N> {
    first: NodeId,
    nodes: &'a [N],
}

impl<'a, N> AddedNodes<'a, N> {
    pub fn new(first: NodeId, nodes: &'a [N]) -> Self {
        Self { first, nodes }
    }

    /// Id of the first appended node (or of the next node to come, when empty).
    pub fn first_id(&self) -> NodeId {
        self.first
    }

    pub fn as_slice(&self) -> &'a [N] {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &'a N)> + 'a {
        let first = self.first.0;
        self.nodes
            .iter()
            .enumerate()
            .map(move |(i, n)| (NodeId(first + i), n))
    }
}

impl<N> Clone for AddedNodes<'_, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N> Copy for AddedNodes<'_, N> {}

/// Scores a particle after each growth step.
///
/// The returned cost replaces the particle's previous cost, so incremental
/// implementations fold `particle.cost()` themselves. Implementations may keep
/// caches keyed by [`Particle::id`], [`Particle::parent`] and [`NodeId`], all of
/// which stay stable across forks of a shared prefix. Results must not depend
/// on the order in which different particles are evaluated.
pub trait CostFunction<N> {
    fn evaluate(&mut self, particle: &Particle<N>, added: AddedNodes<'_, N>, use_heuristic: bool)
        -> Cost;
}

/// Cost function that forwards to a user-provided closure.
pub struct FnCost<F> {
    f: F,
}

impl<F> FnCost<F> {
    pub fn new<N>(f: F) -> Self
    where
        F: FnMut(&Particle<N>, AddedNodes<'_, N>, bool) -> Cost,
    {
        Self { f }
    }
}

impl<N, F> CostFunction<N> for FnCost<F>
where
    F: FnMut(&Particle<N>, AddedNodes<'_, N>, bool) -> Cost,
{
    #[inline]
    fn evaluate(
        &mut self,
        particle: &Particle<N>,
        added: AddedNodes<'_, N>,
        use_heuristic: bool,
    ) -> Cost {
        (self.f)(particle, added, use_heuristic)
    }
}

/// Cost function that scores every particle zero; used for unguided expansion.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZeroCost;

impl<N> CostFunction<N> for ZeroCost {
    #[inline]
    fn evaluate(&mut self, _: &Particle<N>, _: AddedNodes<'_, N>, _: bool) -> Cost {
        Cost::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_sums_real_and_heuristic() {
        assert_eq!(Cost::new(1.5, 2.0).total(), 3.5);
        assert_eq!(Cost::ZERO.total(), 0.0);
        assert_eq!(Cost::default(), Cost::ZERO);
    }

    #[test]
    fn add_is_componentwise() {
        let c = Cost::new(1.0, 2.0) + Cost::from_real(3.0);
        assert_eq!(c, Cost::new(4.0, 2.0));
    }

    #[test]
    fn added_nodes_iterates_with_global_ids() {
        let nodes = [10, 11, 12];
        let added = AddedNodes::new(NodeId(4), &nodes);
        let ids: Vec<_> = added.iter().map(|(id, n)| (id.0, *n)).collect();
        assert_eq!(ids, vec![(4, 10), (5, 11), (6, 12)]);
        assert_eq!(added.len(), 3);
    }
}
