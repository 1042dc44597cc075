use glam::Vec2;
use grammar_growth::prelude::*;

/// Role of a segment in the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Part {
    Root,
    Trunk,
    Branch,
    Tip,
    Leaf,
}

/// A straight piece of the tree, hanging off its parent's end.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub part: Part,
    pub start: Vec2,
    pub end: Vec2,
    pub width: f32,
    pub depth: u32,
}

impl Segment {
    pub fn root(at: Vec2) -> Self {
        Self {
            part: Part::Root,
            start: at,
            end: at,
            width: 8.0,
            depth: 0,
        }
    }

    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }

    /// Unit direction, pointing up for degenerate segments.
    pub fn direction(&self) -> Vec2 {
        (self.end - self.start).try_normalize().unwrap_or(Vec2::Y)
    }

    /// Next segment continuing from this one's end.
    fn grow(&self, part: Part, angle: f32, length: f32, width: f32) -> Self {
        let dir = Vec2::from_angle(angle).rotate(self.direction());
        Self {
            part,
            start: self.end,
            end: self.end + dir * length,
            width,
            depth: self.depth + 1,
        }
    }

    fn distance_to_point(&self, p: Vec2) -> f32 {
        let ab = self.end - self.start;
        let len2 = ab.length_squared();
        if len2 <= f32::EPSILON {
            return self.start.distance(p);
        }
        let t = ((p - self.start).dot(ab) / len2).clamp(0.0, 1.0);
        (self.start + ab * t).distance(p)
    }
}

/// Shape parameters of [`tree_grammar`].
#[derive(Clone, Copy, Debug)]
pub struct TreeParams {
    pub trunk_length: f32,
    pub trunk_width: f32,
    /// Length and width factor from a segment to its children.
    pub shrink: f32,
    /// Maximum branch angle off the parent direction, in radians.
    pub spread: f32,
    /// Chance that a branch splits into two.
    pub split_chance: f64,
    pub leaf_size: f32,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            trunk_length: 22.0,
            trunk_width: 7.0,
            shrink: 0.86,
            spread: 0.7,
            split_chance: 0.35,
            leaf_size: 5.0,
        }
    }
}

/// Grammar of a 2D tree.
///
/// `trunk` and `branch` are skeleton rules closed by a short tip when the
/// search ends; `leaf` is post-skeleton decoration.
pub fn tree_grammar(params: TreeParams) -> Result<Grammar<Segment>> {
    let mut g = Grammar::new();

    g.define_weighted("trunk", 3.0, move |at, x: &mut Expansion<'_, Segment>| {
        let Some(parent) = x.node(at).copied() else {
            return;
        };
        let angle = x.random_range(-0.12, 0.12) as f32;
        let length = if parent.part == Part::Root {
            params.trunk_length
        } else {
            parent.length() * params.shrink.sqrt()
        };
        let width = if parent.part == Part::Root {
            params.trunk_width
        } else {
            parent.width * params.shrink
        };
        let id = x.push(parent.grow(Part::Trunk, angle, length, width));
        x.add_detail("trunk", id);
        if x.random() < 0.5 {
            x.add_detail("branch", id);
        }
    })?;

    g.define_weighted("trunk", 1.0, move |at, x: &mut Expansion<'_, Segment>| {
        let Some(parent) = x.node(at).copied() else {
            return;
        };
        let length = parent.length().max(params.trunk_length) * params.shrink;
        let width = parent.width.max(1.0) * params.shrink;
        let id = x.push(parent.grow(Part::Trunk, 0.0, length, width));
        x.add_detail("branch", id);
        x.add_detail("branch", id);
    })?;

    g.define_weighted("branch", 5.0, move |at, x: &mut Expansion<'_, Segment>| {
        let Some(parent) = x.node(at).copied() else {
            return;
        };
        let spread = params.spread as f64;
        let angle = x.random_range(-spread, spread) as f32;
        let length = parent.length() * params.shrink;
        let width = (parent.width * params.shrink).max(0.8);
        let id = x.push(parent.grow(Part::Branch, angle, length, width));
        x.add_detail("branch", id);
        if x.random() < params.split_chance {
            x.add_detail("branch", id);
        }
        x.add_detail("leaf", id);
    })?;

    // Dead end: a bud that never grows.
    g.define_weighted("branch", 1.0, |_, _: &mut Expansion<'_, Segment>| {})?;

    g.define("leaf", move |at, x: &mut Expansion<'_, Segment>| {
        let Some(parent) = x.node(at).copied() else {
            return;
        };
        let side = if x.random() < 0.5 { -1.1 } else { 1.1 };
        let mut leaf = parent.grow(Part::Leaf, side, params.leaf_size, params.leaf_size * 0.6);
        leaf.depth = parent.depth;
        x.push(leaf);
    });

    g.wrap_up_many(["trunk", "branch"], move |at, x: &mut Expansion<'_, Segment>| {
        let Some(parent) = x.node(at).copied() else {
            return;
        };
        let length = (parent.length() * 0.4).max(1.0);
        let tip = parent.grow(Part::Tip, 0.0, length, (parent.width * 0.6).max(0.6));
        let id = x.push(tip);
        x.add_detail("leaf", id);
    });

    g.post_skeleton("leaf");
    Ok(g)
}

/// Circular obstacle or marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Disc {
    pub center: Vec2,
    pub radius: f32,
}

impl Disc {
    pub fn new(center: Vec2, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn hits(&self, segment: &Segment) -> bool {
        segment.distance_to_point(self.center) < self.radius + segment.width * 0.5
    }
}

/// Cost of a tree that should reach `target` while avoiding `obstacles`.
///
/// Real cost: wood used, collisions, and the remaining gap between the closest
/// segment end and the target. Heuristic: wood the open spawn points are
/// still expected to add.
#[derive(Clone, Debug)]
pub struct ReachCost {
    pub target: Vec2,
    pub obstacles: Vec<Disc>,
    pub wood_weight: f64,
    pub collision_penalty: f64,
    pub reach_weight: f64,
    pub open_point_estimate: f64,
}

impl ReachCost {
    pub fn new(target: Vec2) -> Self {
        Self {
            target,
            obstacles: Vec::new(),
            wood_weight: 0.004,
            collision_penalty: 4.0,
            reach_weight: 0.08,
            open_point_estimate: 0.05,
        }
    }

    pub fn with_obstacles(mut self, obstacles: Vec<Disc>) -> Self {
        self.obstacles = obstacles;
        self
    }

    fn segment_cost(&self, segment: &Segment) -> f64 {
        let wood = (segment.length() * segment.width) as f64 * self.wood_weight;
        let collisions = self.obstacles.iter().filter(|o| o.hits(segment)).count();
        wood + collisions as f64 * self.collision_penalty
    }
}

impl CostFunction<Segment> for ReachCost {
    fn evaluate(
        &mut self,
        particle: &Particle<Segment>,
        _added: AddedNodes<'_, Segment>,
        _use_heuristic: bool,
    ) -> Cost {
        let structure = particle.structure();
        let mut real = 0.0;
        let mut gap = f32::INFINITY;
        for segment in structure.iter() {
            real += self.segment_cost(segment);
            gap = gap.min(segment.end.distance(self.target));
        }
        if gap.is_finite() {
            real += gap as f64 * self.reach_weight;
        }
        let open = particle.spawn_points(Phase::Skeleton).len() as f64;
        Cost::new(real, open * self.open_point_estimate)
    }
}
