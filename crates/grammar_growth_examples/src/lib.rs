#![forbid(unsafe_code)]

mod rendering;
mod tree;

pub use rendering::{init_tracing, render_tree_to_png, RenderConfig};
pub use tree::{tree_grammar, Disc, Part, ReachCost, Segment, TreeParams};
