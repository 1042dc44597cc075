use glam::Vec2;
use grammar_growth::prelude::*;
use grammar_growth_examples::{
    init_tracing, render_tree_to_png, tree_grammar, RenderConfig, Segment, TreeParams,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let grammar = tree_grammar(TreeParams::default())?;
    let generator = Generator::new(grammar, Segment::root(Vec2::ZERO));

    let mut rng = StdRng::seed_from_u64(11);
    let tree = generator.generate("trunk", 40, &mut rng)?;
    tracing::info!(nodes = tree.len(), "unguided tree");

    render_tree_to_png(
        &tree,
        &[],
        None,
        &RenderConfig::default(),
        "tree-generate-basic.png",
    )
}
