use std::time::Duration;

use glam::Vec2;
use grammar_growth::prelude::*;
use grammar_growth_examples::{
    init_tracing, render_tree_to_png, tree_grammar, Disc, ReachCost, RenderConfig, Segment,
    TreeParams,
};

fn main() -> anyhow::Result<()> {
    init_tracing();

    let target = Vec2::new(-40.0, 260.0);
    let obstacles = vec![
        Disc::new(Vec2::new(-10.0, 120.0), 28.0),
        Disc::new(Vec2::new(-85.0, 190.0), 22.0),
        Disc::new(Vec2::new(45.0, 200.0), 18.0),
    ];

    let params = TreeParams {
        spread: 0.9,
        split_chance: 0.45,
        ..TreeParams::default()
    };
    let grammar = tree_grammar(params)?;
    let generator = Generator::new(grammar, Segment::root(Vec2::ZERO));

    let cost = ReachCost::new(target).with_obstacles(obstacles.clone());
    let config = SosmcConfig::new(30)
        .with_sample_count(150usize)
        .with_heuristic_scale(Schedule::Linear {
            start: 1.0,
            end: 0.0,
        });

    let run = generator
        .sosmc_run("trunk", config, cost, 21)?
        .with_generation_hook(move |generation, population| {
            let best = population
                .iter()
                .map(|p| p.cost().total())
                .fold(f64::INFINITY, f64::min);
            tracing::debug!(generation, best, "generation done");
        });

    let (outcome, stats) = Task::new(run, Duration::from_millis(8)).run_to_completion()?;
    tracing::info!(
        nodes = outcome.structure.len(),
        cost = outcome.cost.total(),
        bursts = stats.bursts,
        "tree grown around obstacles"
    );

    render_tree_to_png(
        &outcome.structure,
        &obstacles,
        Some(target),
        &RenderConfig::default(),
        "tree-sosmc-obstacles.png",
    )
}
