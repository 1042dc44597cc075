use std::path::Path;

use glam::Vec2;
use grammar_growth::prelude::Structure;
use image::{Rgb, RgbImage};
use tracing_subscriber::EnvFilter;

use crate::tree::{Disc, Part, Segment};

/// Installs a `fmt` subscriber honoring `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Image size and the world rectangle mapped onto it.
#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub world_min: Vec2,
    pub world_max: Vec2,
    pub background: [u8; 3],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            world_min: Vec2::new(-160.0, -10.0),
            world_max: Vec2::new(160.0, 310.0),
            background: [244, 240, 228],
        }
    }
}

impl RenderConfig {
    fn scale(&self) -> Vec2 {
        let extent = (self.world_max - self.world_min).max(Vec2::splat(f32::EPSILON));
        Vec2::new(self.width as f32, self.height as f32) / extent
    }

    fn to_pixel(&self, p: Vec2) -> Vec2 {
        let local = (p - self.world_min) * self.scale();
        Vec2::new(local.x, self.height as f32 - local.y)
    }
}

fn part_color(part: Part) -> [u8; 3] {
    match part {
        Part::Root => [90, 60, 40],
        Part::Trunk => [101, 67, 33],
        Part::Branch => [130, 90, 50],
        Part::Tip => [160, 120, 70],
        Part::Leaf => [70, 140, 60],
    }
}

fn stamp(img: &mut RgbImage, center: Vec2, radius: f32, color: [u8; 3]) {
    let r = radius.max(0.5);
    let min_x = (center.x - r).floor().max(0.0) as i64;
    let max_x = (center.x + r).ceil().min(img.width() as f32 - 1.0) as i64;
    let min_y = (center.y - r).floor().max(0.0) as i64;
    let max_y = (center.y + r).ceil().min(img.height() as f32 - 1.0) as i64;
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let d = Vec2::new(x as f32 + 0.5, y as f32 + 0.5).distance(center);
            if d <= r {
                img.put_pixel(x as u32, y as u32, Rgb(color));
            }
        }
    }
}

fn draw_segment(img: &mut RgbImage, a: Vec2, b: Vec2, radius: f32, color: [u8; 3]) {
    let steps = (a.distance(b) * 2.0).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        stamp(img, a.lerp(b, t), radius, color);
    }
}

fn draw_ring(img: &mut RgbImage, center: Vec2, radius: f32, color: [u8; 3]) {
    let steps = (radius * 8.0).ceil().max(16.0) as usize;
    for i in 0..steps {
        let angle = i as f32 / steps as f32 * std::f32::consts::TAU;
        stamp(img, center + Vec2::from_angle(angle) * radius, 1.0, color);
    }
}

/// Renders a tree, optional obstacles and an optional target marker to a PNG.
pub fn render_tree_to_png(
    tree: &Structure<Segment>,
    obstacles: &[Disc],
    target: Option<Vec2>,
    config: &RenderConfig,
    out_path: impl AsRef<Path>,
) -> anyhow::Result<()> {
    let mut img = RgbImage::from_pixel(config.width, config.height, Rgb(config.background));
    let scale = config.scale().min_element();

    for disc in obstacles {
        let center = config.to_pixel(disc.center);
        stamp(&mut img, center, disc.radius * scale, [205, 200, 195]);
        draw_ring(&mut img, center, disc.radius * scale, [150, 140, 130]);
    }

    // Wood first so leaves stay visible on top.
    let (leaves, wood): (Vec<&Segment>, Vec<&Segment>) =
        tree.iter().partition(|s| s.part == Part::Leaf);
    for segment in wood.into_iter().chain(leaves) {
        let a = config.to_pixel(segment.start);
        let b = config.to_pixel(segment.end);
        let radius = (segment.width * 0.5 * scale).max(0.6);
        draw_segment(&mut img, a, b, radius, part_color(segment.part));
    }

    if let Some(target) = target {
        let center = config.to_pixel(target);
        draw_ring(&mut img, center, 6.0, [200, 40, 40]);
        stamp(&mut img, center, 2.0, [200, 40, 40]);
    }

    img.save(out_path.as_ref())?;
    tracing::info!(path = %out_path.as_ref().display(), nodes = tree.len(), "wrote image");
    Ok(())
}
