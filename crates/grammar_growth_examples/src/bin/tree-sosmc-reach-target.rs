use glam::Vec2;
use grammar_growth::prelude::*;
use grammar_growth_examples::{
    init_tracing, render_tree_to_png, tree_grammar, ReachCost, RenderConfig, Segment, TreeParams,
};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let target = Vec2::new(90.0, 220.0);
    let grammar = tree_grammar(TreeParams::default())?;
    let generator = Generator::new(grammar, Segment::root(Vec2::ZERO));

    let config = SosmcConfig::new(24)
        .with_sample_count(120usize)
        .with_heuristic_scale(1.0);
    let task = generator.generate_sosmc("trunk", config, ReachCost::new(target), 3)?;
    let (outcome, stats) = task.run_to_completion()?;

    tracing::info!(
        nodes = outcome.structure.len(),
        cost = outcome.cost.total(),
        probability = outcome.probability,
        bursts = stats.bursts,
        busy_ms = stats.busy.as_secs_f64() * 1000.0,
        "tree grown toward target"
    );

    render_tree_to_png(
        &outcome.structure,
        &[],
        Some(target),
        &RenderConfig::default(),
        "tree-sosmc-reach-target.png",
    )
}
