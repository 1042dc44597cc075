#![allow(dead_code)]

use std::time::Duration;

use criterion::{Criterion, Throughput};
use grammar_growth::prelude::{Expansion, NodeId, SosmcConfig};

pub const SAMPLE_SIZE: usize = 20;
pub const WARM_UP: Duration = Duration::from_secs(1);
pub const MEASUREMENT_TIME: Duration = Duration::from_secs(2);

/// Burst budget large enough for any benchmarked run to finish in one burst.
pub const WHOLE_RUN: Duration = Duration::from_secs(60);

pub fn default_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .sample_size(SAMPLE_SIZE)
        .warm_up_time(WARM_UP)
        .measurement_time(MEASUREMENT_TIME)
}

pub fn elements_throughput(elements: usize) -> Throughput {
    Throughput::Elements(elements.max(1) as u64)
}

/// Minimal tree node used by all benchmark grammars.
#[derive(Clone, Copy, Debug)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub depth: u32,
}

impl Node {
    pub const ROOT: Node = Node {
        parent: None,
        depth: 0,
    };
}

/// Appends a child of the node at `at`, one level deeper.
pub fn push_child(at: NodeId, x: &mut Expansion<'_, Node>) -> NodeId {
    let depth = x.node(at).map_or(0, |n| n.depth) + 1;
    x.push(Node {
        parent: Some(at),
        depth,
    })
}

pub fn unbounded(config: SosmcConfig) -> SosmcConfig {
    config.with_burst_budget(WHOLE_RUN)
}
